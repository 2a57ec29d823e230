use std::collections::{HashMap, HashSet};

use crate::accessor::{IndexAccessor, ScoredDoc, TopDocs};
use crate::error::{FeatureError, Result};
use crate::index::{DocId, Field, FieldIndex, InvertedIndex, Posting, ProductId};
use crate::query::{BooleanQuery, Occur, Query};
use crate::similarity::{CollectionStats, Similarity};
use crate::tokenizer;

/// Documents a (sub)query is evaluated against.
#[derive(Clone, Copy)]
enum Scope<'a> {
    All,
    Docs(&'a HashSet<DocId>),
}

/// In-memory [`IndexAccessor`] over an [`InvertedIndex`].
pub struct Searcher {
    index: InvertedIndex,
    avg_title_length: f32,
    avg_description_length: f32,
}

impl Searcher {
    pub fn new(index: InvertedIndex) -> Self {
        let n = index.num_docs.max(1) as f32;
        let avg_title_length = index.title.total_length as f32 / n;
        let avg_description_length = index.description.total_length as f32 / n;
        Self { index, avg_title_length, avg_description_length }
    }

    pub fn index(&self) -> &InvertedIndex { &self.index }

    fn stats(&self, field: Field) -> CollectionStats {
        let avg_field_length = match field {
            Field::Title => self.avg_title_length,
            Field::Description => self.avg_description_length,
        };
        CollectionStats { num_docs: self.index.num_docs as u64, avg_field_length }
    }

    fn eval(&self, query: &Query, sim: Similarity, scope: Scope<'_>) -> HashMap<DocId, f32> {
        match query {
            Query::Term { field, term } => self.eval_phrase(*field, std::slice::from_ref(term), 0, sim, scope),
            Query::Phrase { field, terms, slop } => self.eval_phrase(*field, terms, *slop, sim, scope),
            Query::ProductId(id) => self
                .index
                .doc_ids(*id)
                .iter()
                .filter(|d| in_scope(scope, **d))
                .map(|&d| (d, 0.0))
                .collect(),
            Query::Boolean(bq) => self.eval_boolean(bq, sim, scope),
        }
    }

    /// A single term is scored as a one-term phrase: its frequency is the posting count.
    fn eval_phrase(&self, field: Field, terms: &[String], slop: u32, sim: Similarity, scope: Scope<'_>) -> HashMap<DocId, f32> {
        let mut out = HashMap::new();
        let Some((first, rest)) = terms.split_first() else { return out };
        let fi = self.index.field(field);
        let stats = self.stats(field);
        let idf: f32 = terms.iter().map(|t| sim.idf(fi.document_frequency(t), &stats)).sum();

        for posting in scoped(fi, first, scope) {
            let mut lists: Vec<&[u32]> = Vec::with_capacity(terms.len());
            lists.push(&posting.positions);
            for term in rest {
                match fi.posting(term, posting.doc_id) {
                    Some(p) => lists.push(&p.positions),
                    None => break,
                }
            }
            if lists.len() < terms.len() {
                continue;
            }
            let freq = phrase_freq(&lists, slop);
            if freq > 0.0 {
                out.insert(posting.doc_id, sim.score(freq, idf, fi.length(posting.doc_id), &stats));
            }
        }
        out
    }

    fn eval_boolean(&self, bq: &BooleanQuery, sim: Similarity, scope: Scope<'_>) -> HashMap<DocId, f32> {
        // Required clauses first so optional ones only touch surviving documents.
        let mut required: Option<HashMap<DocId, f32>> = None;
        for clause in bq.clauses().iter().filter(|c| c.occur != Occur::Should) {
            let keys: HashSet<DocId>;
            let clause_scope = match &required {
                Some(docs) => {
                    keys = docs.keys().copied().collect();
                    Scope::Docs(&keys)
                }
                None => scope,
            };
            let matches = self.eval(&clause.query, sim, clause_scope);
            let weight = if clause.occur == Occur::Must { 1.0 } else { 0.0 };
            required = Some(match required {
                None => matches.into_iter().map(|(d, s)| (d, s * weight)).collect(),
                Some(prev) => prev
                    .into_iter()
                    .filter_map(|(d, acc)| matches.get(&d).map(|s| (d, acc + s * weight)))
                    .collect(),
            });
        }

        let should: Vec<&Query> = bq.clauses().iter().filter(|c| c.occur == Occur::Should).map(|c| &c.query).collect();
        match required {
            Some(mut docs) => {
                let keys: HashSet<DocId> = docs.keys().copied().collect();
                for q in should {
                    for (d, s) in self.eval(q, sim, Scope::Docs(&keys)) {
                        if let Some(acc) = docs.get_mut(&d) {
                            *acc += s;
                        }
                    }
                }
                docs
            }
            None => {
                let mut docs: HashMap<DocId, f32> = HashMap::new();
                for q in should {
                    for (d, s) in self.eval(q, sim, scope) {
                        *docs.entry(d).or_insert(0.0) += s;
                    }
                }
                docs
            }
        }
    }
}

fn in_scope(scope: Scope<'_>, doc: DocId) -> bool {
    match scope {
        Scope::All => true,
        Scope::Docs(docs) => docs.contains(&doc),
    }
}

fn scoped<'a>(fi: &'a FieldIndex, term: &str, scope: Scope<'_>) -> Vec<&'a Posting> {
    let postings = fi.postings(term);
    match scope {
        Scope::All => postings.iter().collect(),
        Scope::Docs(docs) if docs.len() < postings.len() => {
            let mut found: Vec<&Posting> = docs.iter().filter_map(|&d| fi.posting(term, d)).collect();
            found.sort_by_key(|p| p.doc_id);
            found
        }
        Scope::Docs(docs) => postings.iter().filter(|p| docs.contains(&p.doc_id)).collect(),
    }
}

/// Sloppy phrase frequency over per-term position lists.
///
/// Each occurrence of the first term anchors a candidate match; every later term takes
/// its closest unused position. The match counts when the summed distance from strict
/// adjacency is within `slop`, weighted `1 / (1 + distance)`.
pub(crate) fn phrase_freq(lists: &[&[u32]], slop: u32) -> f32 {
    let mut freq = 0.0;
    'anchor: for &start in lists[0] {
        let mut distance: u64 = 0;
        let mut used = vec![start];
        for (offset, list) in lists.iter().enumerate().skip(1) {
            let expected = start as i64 + offset as i64;
            let best = list
                .iter()
                .filter(|p| !used.contains(p))
                .map(|&p| (p, (p as i64 - expected).unsigned_abs()))
                .min_by_key(|&(_, d)| d);
            match best {
                Some((p, d)) => {
                    distance += d;
                    used.push(p);
                }
                None => continue 'anchor,
            }
            if distance > slop as u64 {
                continue 'anchor;
            }
        }
        freq += 1.0 / (1.0 + distance as f32);
    }
    freq
}

impl IndexAccessor for Searcher {
    fn find_document(&self, product_id: ProductId) -> Result<DocId> {
        match self.index.doc_ids(product_id) {
            [doc] => Ok(*doc),
            docs => Err(FeatureError::not_found(product_id, docs.len())),
        }
    }

    fn search(&self, query: &Query, similarity: Similarity, limit: usize) -> TopDocs {
        let matches = self.eval(query, similarity, Scope::All);
        let total_hits = matches.len();
        let mut hits: Vec<ScoredDoc> = matches.into_iter().map(|(doc, score)| ScoredDoc { doc, score }).collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.doc.cmp(&b.doc)));
        hits.truncate(limit);
        TopDocs { total_hits, hits }
    }

    fn stored_field(&self, doc: DocId, field: Field) -> &str {
        self.index.docs.get(doc as usize).map(|p| p.field(field)).unwrap_or("")
    }

    fn document_frequency(&self, field: Field, term: &str) -> u64 {
        self.index.field(field).document_frequency(term)
    }

    fn total_term_frequency(&self, field: Field, term: &str) -> u64 {
        self.index.field(field).total_term_frequency(term)
    }

    fn corpus_size(&self) -> u64 { self.index.num_docs as u64 }

    fn field_length(&self, doc: DocId, field: Field) -> u32 {
        self.index.field(field).length(doc)
    }

    fn term_frequency(&self, doc: DocId, field: Field, term: &str) -> u32 {
        self.index.field(field).posting(term, doc).map(Posting::freq).unwrap_or(0)
    }

    fn analyze(&self, text: &str) -> Vec<String> { tokenizer::analyze(text) }
}
