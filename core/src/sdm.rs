//! Sequential dependence model query construction.
//!
//! One query blends three views of the search text: the bag of words, exact
//! adjacent pairs, and pairs that may sit up to [`WINDOW_SLOP`] positions apart.

use crate::accessor::IndexAccessor;
use crate::index::Field;
use crate::query::{escape, parse, query_tokens, BooleanQuery, Query};

/// Intervening positions allowed for the windowed pair clause.
pub const WINDOW_SLOP: u32 = 8;

pub struct SdmQueryBuilder<'a> {
    accessor: &'a dyn IndexAccessor,
}

/// The three clauses of an SDM query, kept apart for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct SdmClauses {
    pub unordered: BooleanQuery,
    pub adjacency: BooleanQuery,
    pub windowed: BooleanQuery,
}

impl SdmClauses {
    pub fn into_query(self) -> Query {
        let mut bq = BooleanQuery::new();
        bq.add_should(Query::Boolean(self.unordered));
        bq.add_should(Query::Boolean(self.adjacency));
        bq.add_should(Query::Boolean(self.windowed));
        Query::Boolean(bq)
    }
}

impl<'a> SdmQueryBuilder<'a> {
    pub fn new(accessor: &'a dyn IndexAccessor) -> Self { Self { accessor } }

    /// Build the composite query for `text` on `field`.
    ///
    /// Falls back to a direct parse of the whole escaped text when no tokens survive.
    pub fn build(&self, text: &str, field: Field) -> Query {
        match self.clauses(text, field) {
            Some(clauses) => clauses.into_query(),
            None => self.direct_parse(text, field),
        }
    }

    /// `None` when no tokens survive the reduction.
    pub fn clauses(&self, text: &str, field: Field) -> Option<SdmClauses> {
        let tokens = query_tokens(text);
        if tokens.is_empty() {
            return None;
        }

        let mut unordered = BooleanQuery::new();
        // Pair terms come from the same parse; a side that is not exactly one term drops the pair.
        let mut singles: Vec<Option<String>> = Vec::with_capacity(tokens.len());
        for token in &tokens {
            match self.parse_token(token, field) {
                Some(Query::Term { term, .. }) => {
                    unordered.add_should(Query::term(field, term.clone()));
                    singles.push(Some(term));
                }
                Some(q) => {
                    singles.push(None);
                    if !q.is_empty() {
                        unordered.add_should(q);
                    }
                }
                None => {
                    singles.push(None);
                    tracing::debug!(token = token.as_str(), "skipping unparsable token");
                }
            }
        }

        let mut adjacency = BooleanQuery::new();
        let mut windowed = BooleanQuery::new();
        for pair in singles.windows(2) {
            if let [Some(a), Some(b)] = pair {
                let terms = vec![a.clone(), b.clone()];
                adjacency.add_should(Query::phrase(field, terms.clone(), 0));
                windowed.add_should(Query::phrase(field, terms, WINDOW_SLOP));
            }
        }

        Some(SdmClauses { unordered, adjacency, windowed })
    }

    fn parse_token(&self, token: &str, field: Field) -> Option<Query> {
        parse(token, field, |t| self.accessor.analyze(t)).ok()
    }

    fn direct_parse(&self, text: &str, field: Field) -> Query {
        match parse(&escape(text), field, |t| self.accessor.analyze(t)) {
            Ok(q) => q,
            Err(err) => {
                tracing::debug!(%err, "direct parse failed, query matches nothing");
                Query::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::searcher;
    use crate::similarity::Similarity;

    #[test]
    fn builds_all_three_clauses() {
        let s = searcher();
        let clauses = SdmQueryBuilder::new(&s).clauses("Door Hinge latch", Field::Title).unwrap();
        assert_eq!(clauses.unordered.clauses().len(), 3);
        assert_eq!(clauses.adjacency.clauses().len(), 2);
        assert_eq!(clauses.windowed.clauses().len(), 2);
        match &clauses.windowed.clauses()[0].query {
            Query::Phrase { slop, terms, .. } => {
                assert_eq!(*slop, WINDOW_SLOP);
                assert_eq!(terms[0], "door");
            }
            other => panic!("expected phrase, got {other:?}"),
        }
    }

    #[test]
    fn pairs_with_stopwords_are_skipped() {
        let s = searcher();
        let clauses = SdmQueryBuilder::new(&s).clauses("hinge for door", Field::Title).unwrap();
        // "for" analyzes to nothing, so neither pair is a valid phrase
        assert!(clauses.adjacency.is_empty());
        assert!(clauses.windowed.is_empty());
        assert_eq!(clauses.unordered.clauses().len(), 2);
    }

    #[test]
    fn multi_term_tokens_join_unordered_but_break_pairs() {
        let s = searcher();
        let clauses = SdmQueryBuilder::new(&s).clauses("door 3/4 hinge", Field::Title).unwrap();
        assert_eq!(clauses.unordered.clauses().len(), 3);
        assert!(matches!(clauses.unordered.clauses()[0].query, Query::Term { .. }));
        assert!(matches!(clauses.unordered.clauses()[1].query, Query::Boolean(_)));
        assert!(clauses.adjacency.is_empty());
        assert!(clauses.windowed.is_empty());
    }

    #[test]
    fn single_token_scores_like_unordered_clause() {
        let s = searcher();
        let builder = SdmQueryBuilder::new(&s);
        let clauses = builder.clauses("door", Field::Title).unwrap();
        assert!(clauses.adjacency.is_empty());
        assert!(clauses.windowed.is_empty());

        let unordered = Query::Boolean(clauses.unordered.clone());
        let full = clauses.into_query();
        let a = s.search(&full, Similarity::Bm25, 10);
        let b = s.search(&unordered, Similarity::Bm25, 10);
        assert_eq!(a, b);
        assert!(a.total_hits > 0);
    }

    #[test]
    fn empty_text_falls_back_to_direct_parse() {
        let s = searcher();
        let builder = SdmQueryBuilder::new(&s);
        assert!(builder.clauses("   ", Field::Title).is_none());
        assert_eq!(builder.build("   ", Field::Title), Query::empty());
        assert_eq!(builder.build("and or", Field::Title), Query::empty());
    }

    #[test]
    fn syntax_characters_are_matched_literally() {
        let s = searcher();
        let q = SdmQueryBuilder::new(&s).build("door (hinge", Field::Title);
        assert!(s.search(&q, Similarity::Bm25, 10).total_hits > 0);
    }

    #[test]
    fn adjacency_rewards_ordered_pairs() {
        let s = searcher();
        let builder = SdmQueryBuilder::new(&s);
        let q = builder.build("door hinge", Field::Description);
        let top = s.search(&q, Similarity::Bm25, 10);
        assert_eq!(top.hits[0].doc, s.find_document(100).unwrap());
    }
}
