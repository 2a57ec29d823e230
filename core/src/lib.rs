//! Query/product relevance features computed against a positional inverted index.
//!
//! The [`IndexAccessor`] trait is the only path to index data. On top of it sit the
//! SDM query builder ([`sdm`]), per-term statistics ([`stats`]), the named
//! [`FeatureCatalog`], and the CSV [`FeaturePipeline`].

pub mod accessor;
pub mod baseline;
pub mod error;
pub mod features;
pub mod index;
pub mod persist;
pub mod pipeline;
pub mod query;
pub mod sdm;
pub mod search;
pub mod similarity;
pub mod stats;
pub mod tokenizer;

pub use accessor::{IndexAccessor, ScoredDoc, TopDocs};
pub use error::{FeatureError, Result};
pub use features::{Feature, FeatureCatalog};
pub use index::{DocId, Field, InvertedIndex, Posting, ProductId, StoredProduct, TermId};
pub use pipeline::{FeaturePipeline, PipelineConfig, PipelineSummary, QueryRow};
pub use query::Query;
pub use search::Searcher;
pub use similarity::Similarity;

#[cfg(test)]
pub(crate) mod fixtures {
    use super::{InvertedIndex, Searcher};

    pub fn searcher() -> Searcher {
        let mut index = InvertedIndex::new();
        index.add_product(100, "red door hinge", "a sturdy red door hinge for outdoor use");
        index.add_product(200, "white door stop", "door stop with spring hinge");
        index.add_product(300, "garden hose", "green garden hose");
        index.add_product(300, "garden hose reel", "green garden hose");
        index.add_product(400, "table lamp", "brass lamp with linen shade");
        Searcher::new(index)
    }
}
