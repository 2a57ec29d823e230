use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::FeatureError;
use crate::tokenizer::tokenize;

pub type TermId = u32;
pub type DocId = u32;
pub type ProductId = u64;

/// Analyzed text fields of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Description,
}

impl Field {
    pub const ALL: [Field; 2] = [Field::Title, Field::Description];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Field {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(Field::Title),
            "description" => Ok(Field::Description),
            other => Err(FeatureError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProduct {
    pub product_id: ProductId,
    pub title: String,
    pub description: String,
}

impl StoredProduct {
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Description => &self.description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub positions: Vec<u32>, // ascending token positions within the field
}

impl Posting {
    pub fn freq(&self) -> u32 { self.positions.len() as u32 }
}

/// Postings and length norms for one analyzed field.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FieldIndex {
    pub dictionary: HashMap<String, TermId>,
    pub df: Vec<u32>,
    pub ttf: Vec<u64>,
    pub postings: HashMap<TermId, Vec<Posting>>, // postings sorted by doc_id
    pub lengths: Vec<u32>,
    pub total_length: u64,
}

impl FieldIndex {
    pub fn postings(&self, term: &str) -> &[Posting] {
        self.dictionary
            .get(term)
            .and_then(|tid| self.postings.get(tid))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn posting(&self, term: &str, doc_id: DocId) -> Option<&Posting> {
        let list = self.postings(term);
        list.binary_search_by_key(&doc_id, |p| p.doc_id).ok().map(|i| &list[i])
    }

    pub fn document_frequency(&self, term: &str) -> u64 {
        self.dictionary.get(term).map(|&tid| self.df[tid as usize] as u64).unwrap_or(0)
    }

    pub fn total_term_frequency(&self, term: &str) -> u64 {
        self.dictionary.get(term).map(|&tid| self.ttf[tid as usize]).unwrap_or(0)
    }

    pub fn length(&self, doc_id: DocId) -> u32 {
        self.lengths.get(doc_id as usize).copied().unwrap_or(0)
    }

    fn add(&mut self, doc_id: DocId, text: &str) {
        let mut positions: HashMap<TermId, Vec<u32>> = HashMap::new();
        let tokens = tokenize(text);
        let length = tokens.len() as u32;
        for (term, pos) in tokens {
            let next_id = self.df.len() as TermId;
            let tid = *self.dictionary.entry(term).or_insert(next_id);
            if tid == next_id {
                self.df.push(0);
                self.ttf.push(0);
            }
            positions.entry(tid).or_default().push(pos as u32);
        }
        for (tid, positions) in positions {
            self.df[tid as usize] += 1;
            self.ttf[tid as usize] += positions.len() as u64;
            // doc ids are assigned in increasing order, so pushing keeps lists sorted
            self.postings.entry(tid).or_default().push(Posting { doc_id, positions });
        }
        self.lengths.push(length);
        self.total_length += length as u64;
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub title: FieldIndex,
    pub description: FieldIndex,
    pub docs: Vec<StoredProduct>,
    pub doc_id_map: HashMap<ProductId, Vec<DocId>>,
    pub num_docs: u32,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Analyze and append one product. Ids are not deduplicated here; lookups report duplicates.
    pub fn add_product(&mut self, product_id: ProductId, title: &str, description: &str) -> DocId {
        let doc_id = self.num_docs;
        self.num_docs += 1;
        self.title.add(doc_id, title);
        self.description.add(doc_id, description);
        self.docs.push(StoredProduct { product_id, title: title.to_string(), description: description.to_string() });
        self.doc_id_map.entry(product_id).or_default().push(doc_id);
        doc_id
    }

    pub fn field(&self, field: Field) -> &FieldIndex {
        match field {
            Field::Title => &self.title,
            Field::Description => &self.description,
        }
    }

    pub fn doc_ids(&self, product_id: ProductId) -> &[DocId] {
        self.doc_id_map.get(&product_id).map(Vec::as_slice).unwrap_or(&[])
    }
}
