//! Named feature variants and the ordered catalog that turns them into columns.

use std::collections::HashSet;
use std::fmt;

use crate::accessor::IndexAccessor;
use crate::error::{FeatureError, Result};
use crate::index::{Field, ProductId};
use crate::query::Query;
use crate::sdm::SdmQueryBuilder;
use crate::similarity::Similarity;
use crate::stats::{sum_over_query, TermMeasure};

/// A stateless `(product, query) -> score` computation with a stable column name.
pub trait Feature: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, accessor: &dyn IndexAccessor, product_id: ProductId, query: &str) -> Result<f32>;
}

/// Backend relevance score of the product for the SDM query on one field.
pub struct SearchScoreFeature {
    name: String,
    field: Field,
    similarity: Similarity,
}

impl SearchScoreFeature {
    pub fn new(field: Field, similarity: Similarity) -> Self {
        let prefix = match similarity {
            Similarity::Bm25 => "bm25",
            Similarity::Classic => "tfidf",
        };
        Self { name: format!("{prefix}_{field}"), field, similarity }
    }
}

impl Feature for SearchScoreFeature {
    fn name(&self) -> &str { &self.name }

    fn evaluate(&self, accessor: &dyn IndexAccessor, product_id: ProductId, query: &str) -> Result<f32> {
        let text = SdmQueryBuilder::new(accessor).build(query, self.field);
        let top = accessor.search(&Query::filtered_to(product_id, text), self.similarity, 1);
        match (top.total_hits, top.hits.first()) {
            (1, Some(hit)) => Ok(hit.score),
            (matches, _) => Err(FeatureError::not_found(product_id, matches)),
        }
    }
}

/// Literal, case-insensitive count of the whole query string inside the stored field.
pub struct OverlapFeature {
    name: String,
    field: Field,
}

impl OverlapFeature {
    pub fn new(field: Field) -> Self {
        Self { name: format!("overlap_{field}"), field }
    }
}

impl Feature for OverlapFeature {
    fn name(&self) -> &str { &self.name }

    fn evaluate(&self, accessor: &dyn IndexAccessor, product_id: ProductId, query: &str) -> Result<f32> {
        let doc = accessor.find_document(product_id)?;
        let text = accessor.stored_field(doc, self.field).to_lowercase();
        Ok(count_matches(&text, &query.to_lowercase()) as f32)
    }
}

/// Non-overlapping occurrences of `needle`; an empty needle never matches.
fn count_matches(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// A [`TermMeasure`] summed over the query's terms.
pub struct TermStatFeature {
    name: String,
    field: Field,
    measure: TermMeasure,
}

impl TermStatFeature {
    pub fn new(field: Field, measure: TermMeasure) -> Self {
        Self { name: measure.feature_name(field), field, measure }
    }
}

impl Feature for TermStatFeature {
    fn name(&self) -> &str { &self.name }

    fn evaluate(&self, accessor: &dyn IndexAccessor, product_id: ProductId, query: &str) -> Result<f32> {
        Ok(sum_over_query(accessor, product_id, self.field, query, self.measure)? as f32)
    }
}

/// Ordered, uniquely named features. Order is column order.
pub struct FeatureCatalog {
    features: Vec<Box<dyn Feature>>,
}

impl fmt::Debug for FeatureCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl FeatureCatalog {
    pub fn new(features: Vec<Box<dyn Feature>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for feature in &features {
            if !seen.insert(feature.name().to_string()) {
                return Err(FeatureError::DuplicateFeature(feature.name().to_string()));
            }
        }
        Ok(Self { features })
    }

    /// The full-build set: per field, search scores, overlap and term-frequency variants.
    pub fn standard() -> Self {
        let mut features: Vec<Box<dyn Feature>> = Vec::new();
        for field in Field::ALL {
            features.push(Box::new(SearchScoreFeature::new(field, Similarity::Bm25)));
            features.push(Box::new(SearchScoreFeature::new(field, Similarity::Classic)));
            features.push(Box::new(OverlapFeature::new(field)));
            for measure in [TermMeasure::Tf, TermMeasure::TfSigir, TermMeasure::TfNorm, TermMeasure::TfNormSigir] {
                features.push(Box::new(TermStatFeature::new(field, measure)));
            }
        }
        Self { features }
    }

    /// The idf variants added to existing feature files, title and description interleaved.
    pub fn idf_extension() -> Self {
        let measures = [
            TermMeasure::Idf,
            TermMeasure::IdfSigir,
            TermMeasure::IdfSigir2,
            TermMeasure::IdfSigir3,
            TermMeasure::TfIdfSigir,
        ];
        let mut features: Vec<Box<dyn Feature>> = Vec::new();
        for measure in measures {
            for field in Field::ALL {
                features.push(Box::new(TermStatFeature::new(field, measure)));
            }
        }
        Self { features }
    }

    pub fn all() -> Self {
        let mut features = Self::standard().features;
        features.extend(Self::idf_extension().features);
        Self { features }
    }

    /// Pick features from [`FeatureCatalog::all`] by name, in the given order.
    pub fn select<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut pool: Vec<Option<Box<dyn Feature>>> = Self::all().features.into_iter().map(Some).collect();
        let mut features = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let slot = pool
                .iter_mut()
                .find(|f| f.as_ref().is_some_and(|f| f.name() == name))
                .ok_or_else(|| {
                    if Self::all().names().any(|n| n == name) {
                        FeatureError::DuplicateFeature(name.to_string())
                    } else {
                        FeatureError::UnknownFeature(name.to_string())
                    }
                })?;
            features.extend(slot.take());
        }
        Ok(Self { features })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.features.iter().map(|f| f.name())
    }

    pub fn features(&self) -> &[Box<dyn Feature>] { &self.features }

    pub fn len(&self) -> usize { self.features.len() }

    pub fn is_empty(&self) -> bool { self.features.is_empty() }

    /// Evaluate every feature in order.
    pub fn evaluate(&self, accessor: &dyn IndexAccessor, product_id: ProductId, query: &str) -> Result<Vec<f32>> {
        self.features.iter().map(|f| f.evaluate(accessor, product_id, query)).collect()
    }
}
