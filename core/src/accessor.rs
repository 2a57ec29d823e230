//! The single point of contact between the feature engine and the search backend.

use crate::error::Result;
use crate::index::{DocId, Field, ProductId};
use crate::query::Query;
use crate::similarity::Similarity;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDoc {
    pub doc: DocId,
    pub score: f32,
}

/// Ranked results of one search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopDocs {
    /// Number of matching documents before truncation.
    pub total_hits: usize,
    pub hits: Vec<ScoredDoc>,
}

/// Read-only view of an index.
///
/// Every method takes `&self` and mutates nothing, so one accessor can be shared
/// across rows and worker threads.
pub trait IndexAccessor: Send + Sync {
    /// Resolve a product id to its document. Zero or several matches is `NotFound`.
    fn find_document(&self, product_id: ProductId) -> Result<DocId>;

    fn search(&self, query: &Query, similarity: Similarity, limit: usize) -> TopDocs;

    fn stored_field(&self, doc: DocId, field: Field) -> &str;

    fn document_frequency(&self, field: Field, term: &str) -> u64;

    fn total_term_frequency(&self, field: Field, term: &str) -> u64;

    fn corpus_size(&self) -> u64;

    /// Indexed token count of `field` in `doc`.
    fn field_length(&self, doc: DocId, field: Field) -> u32;

    fn term_frequency(&self, doc: DocId, field: Field, term: &str) -> u32;

    /// Run text through the index analyzer.
    fn analyze(&self, text: &str) -> Vec<String>;
}
