//! Error type shared by the feature engine.

use thiserror::Error;

use crate::index::ProductId;

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Debug, Error)]
pub enum FeatureError {
    /// The product id resolved to zero or several indexed documents. Always fatal.
    #[error("couldn't find document with product id {product_id} ({matches} matches)")]
    NotFound { product_id: ProductId, matches: usize },

    #[error("query syntax error: {0}")]
    QuerySyntax(String),

    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("duplicate feature name `{0}`")]
    DuplicateFeature(String),

    #[error("unknown feature `{0}`")]
    UnknownFeature(String),

    #[error("missing column `{0}`")]
    MissingColumn(String),

    #[error("relevance column must be the last column of the feature file")]
    RelevanceNotLast,

    #[error("row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    #[error("row count mismatch: query file has {queries} rows, feature file has {features}")]
    RowCountMismatch { queries: usize, features: usize },

    #[error("row {row} (product {product_id}): {source}")]
    Row {
        row: usize,
        product_id: ProductId,
        #[source]
        source: Box<FeatureError>,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FeatureError {
    pub fn not_found(product_id: ProductId, matches: usize) -> Self {
        FeatureError::NotFound { product_id, matches }
    }

    /// Attach the row diagnostic to a fatal evaluation error.
    pub fn at_row(self, row: usize, product_id: ProductId) -> Self {
        FeatureError::Row { row, product_id, source: Box::new(self) }
    }

    /// The underlying error, looking through row context.
    pub fn root(&self) -> &FeatureError {
        match self {
            FeatureError::Row { source, .. } => source.root(),
            other => other,
        }
    }
}
