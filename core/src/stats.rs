//! Per-term statistics against one (product, field), and the log-dampened
//! measures built from them.

use crate::accessor::IndexAccessor;
use crate::error::Result;
use crate::index::{DocId, Field, ProductId};
use crate::query::{parse, query_tokens, Query};

/// Raw counts for one term in one document field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermStatistics {
    pub term_frequency: u32,
    pub field_length: u32,
    pub document_frequency: u64,
    pub total_term_frequency: u64,
    pub corpus_size: u64,
}

impl TermStatistics {
    pub fn collect(accessor: &dyn IndexAccessor, doc: DocId, field: Field, term: &str) -> Self {
        Self {
            term_frequency: accessor.term_frequency(doc, field, term),
            field_length: accessor.field_length(doc, field),
            document_frequency: accessor.document_frequency(field, term),
            total_term_frequency: accessor.total_term_frequency(field, term),
            corpus_size: accessor.corpus_size(),
        }
    }

    pub fn normalized_term_frequency(&self) -> f64 {
        normalized_term_frequency(self.term_frequency, self.field_length)
    }

    pub fn inverse_document_frequency(&self) -> f64 {
        inverse_document_frequency(self.corpus_size, self.document_frequency)
    }
}

/// `tf / length`, defined as 0 for an empty field.
pub fn normalized_term_frequency(term_frequency: u32, field_length: u32) -> f64 {
    if field_length == 0 {
        return 0.0;
    }
    term_frequency as f64 / field_length as f64
}

/// `N / (df + 1)`; the smoothing keeps unseen terms finite.
pub fn inverse_document_frequency(corpus_size: u64, document_frequency: u64) -> f64 {
    corpus_size as f64 / (document_frequency as f64 + 1.0)
}

pub fn term_frequency(accessor: &dyn IndexAccessor, product_id: ProductId, field: Field, term: &str) -> Result<u32> {
    let doc = accessor.find_document(product_id)?;
    Ok(accessor.term_frequency(doc, field, term))
}

pub fn field_length(accessor: &dyn IndexAccessor, product_id: ProductId, field: Field) -> Result<u32> {
    let doc = accessor.find_document(product_id)?;
    Ok(accessor.field_length(doc, field))
}

/// A per-term measure, summed over the query's terms by [`sum_over_query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermMeasure {
    Tf,
    TfSigir,
    TfNorm,
    TfNormSigir,
    Idf,
    IdfSigir,
    IdfSigir2,
    IdfSigir3,
    TfIdfSigir,
}

impl TermMeasure {
    pub const ALL: [TermMeasure; 9] = [
        TermMeasure::Tf,
        TermMeasure::TfSigir,
        TermMeasure::TfNorm,
        TermMeasure::TfNormSigir,
        TermMeasure::Idf,
        TermMeasure::IdfSigir,
        TermMeasure::IdfSigir2,
        TermMeasure::IdfSigir3,
        TermMeasure::TfIdfSigir,
    ];

    /// Column name for this measure on `field`, e.g. `tf_title_norm_sigir`.
    pub fn feature_name(&self, field: Field) -> String {
        match self {
            TermMeasure::Tf => format!("tf_{field}"),
            TermMeasure::TfSigir => format!("tf_{field}_sigir"),
            TermMeasure::TfNorm => format!("tf_{field}_norm"),
            TermMeasure::TfNormSigir => format!("tf_{field}_norm_sigir"),
            TermMeasure::Idf => format!("idf_{field}"),
            TermMeasure::IdfSigir => format!("idf_{field}_sigir"),
            TermMeasure::IdfSigir2 => format!("idf_{field}_sigir2"),
            TermMeasure::IdfSigir3 => format!("idf_{field}_sigir3"),
            TermMeasure::TfIdfSigir => format!("tfidf_sigir_{field}"),
        }
    }

    pub fn compute(&self, s: &TermStatistics) -> f64 {
        let tf = s.term_frequency as f64;
        match self {
            TermMeasure::Tf => tf,
            TermMeasure::TfSigir => (1.0 + tf).ln(),
            TermMeasure::TfNorm => s.normalized_term_frequency(),
            TermMeasure::TfNormSigir => (s.normalized_term_frequency() + 1.0).ln(),
            TermMeasure::Idf => s.inverse_document_frequency().ln(),
            TermMeasure::IdfSigir => {
                let idf = s.inverse_document_frequency();
                // ln(ln(x)) needs x > 1; terms at least that common contribute nothing.
                if idf <= 1.0 {
                    tracing::debug!(idf, df = s.document_frequency, "idf_sigir outside its domain, contributing 0");
                    return 0.0;
                }
                idf.ln().ln()
            }
            TermMeasure::IdfSigir2 => (s.inverse_document_frequency() + 1.0).ln(),
            TermMeasure::IdfSigir3 => (s.normalized_term_frequency() * s.inverse_document_frequency().ln() + 1.0).ln(),
            TermMeasure::TfIdfSigir => {
                let collection_probability = if s.corpus_size == 0 {
                    0.0
                } else {
                    s.total_term_frequency as f64 / s.corpus_size as f64
                };
                (s.normalized_term_frequency() * collection_probability + 1.0).ln()
            }
        }
    }
}

/// Reduce query text to index terms: each surviving token that analyzes to exactly one term.
pub fn query_terms(accessor: &dyn IndexAccessor, text: &str, field: Field) -> Vec<String> {
    query_tokens(text)
        .iter()
        .filter_map(|token| match parse(token, field, |t| accessor.analyze(t)) {
            Ok(Query::Term { term, .. }) => Some(term),
            _ => None,
        })
        .collect()
}

/// Sum `measure` over the query's terms for one product's field.
pub fn sum_over_query(
    accessor: &dyn IndexAccessor,
    product_id: ProductId,
    field: Field,
    text: &str,
    measure: TermMeasure,
) -> Result<f64> {
    let doc = accessor.find_document(product_id)?;
    Ok(query_terms(accessor, text, field)
        .iter()
        .map(|term| measure.compute(&TermStatistics::collect(accessor, doc, field, term)))
        .sum())
}
