//! Row-by-row feature extraction over query files.

use std::io;

use csv::StringRecord;
use rayon::prelude::*;

use crate::accessor::IndexAccessor;
use crate::error::{FeatureError, Result};
use crate::features::FeatureCatalog;
use crate::index::ProductId;

pub const CSV_ID: &str = "id";
pub const CSV_PRODUCT_ID: &str = "product_uid";
pub const CSV_SEARCH_TERM: &str = "search_term";
pub const CSV_RELEVANCE: &str = "relevance";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Rows read, evaluated and written together.
    pub batch_size: usize,
    /// Evaluate the rows of a batch on the rayon pool.
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self { Self { batch_size: 1024, parallel: false } }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRow {
    pub product_id: ProductId,
    pub search_term: String,
    /// Copied to the output verbatim.
    pub relevance: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSummary {
    pub rows: usize,
    pub features: usize,
}

/// Column positions of a query file.
pub(crate) struct QueryColumns {
    pub(crate) id: Option<usize>,
    product_id: usize,
    search_term: usize,
    relevance: Option<usize>,
}

impl QueryColumns {
    pub(crate) fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        Ok(Self {
            id: find(CSV_ID),
            product_id: find(CSV_PRODUCT_ID).ok_or_else(|| FeatureError::MissingColumn(CSV_PRODUCT_ID.into()))?,
            search_term: find(CSV_SEARCH_TERM).ok_or_else(|| FeatureError::MissingColumn(CSV_SEARCH_TERM.into()))?,
            relevance: find(CSV_RELEVANCE),
        })
    }

    /// `row` is the 1-based data row number, used in diagnostics.
    pub(crate) fn parse(&self, record: &StringRecord, row: usize) -> Result<QueryRow> {
        let invalid = |message: String| FeatureError::InvalidRow { row, message };
        let raw_id = record.get(self.product_id).ok_or_else(|| invalid(format!("missing {CSV_PRODUCT_ID}")))?;
        let product_id = raw_id
            .trim()
            .parse::<ProductId>()
            .map_err(|e| invalid(format!("invalid {CSV_PRODUCT_ID} `{raw_id}`: {e}")))?;
        let search_term = record
            .get(self.search_term)
            .ok_or_else(|| invalid(format!("missing {CSV_SEARCH_TERM}")))?
            .to_string();
        let relevance = self.relevance.and_then(|i| record.get(i)).map(str::to_string);
        Ok(QueryRow { product_id, search_term, relevance })
    }
}

/// Read up to `size` records; `offset` is the number of rows already consumed.
fn read_batch<R: io::Read>(
    records: &mut csv::StringRecordsIter<'_, R>,
    columns: &QueryColumns,
    offset: usize,
    size: usize,
) -> Result<Vec<QueryRow>> {
    let mut batch = Vec::new();
    for record in records.by_ref().take(size.max(1)) {
        let record = record?;
        batch.push(columns.parse(&record, offset + batch.len() + 1)?);
    }
    Ok(batch)
}

/// Existing header with unseen feature names inserted one by one at the front.
///
/// A `relevance` column, if present, must already be last and stays last.
pub fn augmented_header<'n, I>(existing: &[String], new_names: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = &'n str>,
{
    if let Some(pos) = existing.iter().position(|h| h == CSV_RELEVANCE) {
        if pos + 1 != existing.len() {
            return Err(FeatureError::RelevanceNotLast);
        }
    }
    let mut header = existing.to_vec();
    for name in new_names {
        if !header.iter().any(|h| h == name) {
            header.insert(0, name.to_string());
        }
    }
    Ok(header)
}

/// Feature value as written to CSV; integral values keep a trailing `.0` (`1.0`, not `1`).
pub fn format_value(value: f32) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

enum Cell {
    Existing(usize),
    Computed(usize),
}

pub struct FeaturePipeline<'a> {
    accessor: &'a dyn IndexAccessor,
    catalog: &'a FeatureCatalog,
    config: PipelineConfig,
}

impl<'a> FeaturePipeline<'a> {
    pub fn new(accessor: &'a dyn IndexAccessor, catalog: &'a FeatureCatalog) -> Self {
        Self { accessor, catalog, config: PipelineConfig::default() }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Every catalog feature for one row, in catalog order.
    pub fn feature_vector(&self, row: &QueryRow) -> Result<Vec<f32>> {
        self.catalog.evaluate(self.accessor, row.product_id, &row.search_term)
    }

    fn evaluate_batch(&self, offset: usize, rows: &[QueryRow]) -> Result<Vec<Vec<f32>>> {
        let eval = |(i, row): (usize, &QueryRow)| {
            self.feature_vector(row).map_err(|e| e.at_row(offset + i + 1, row.product_id))
        };
        if self.config.parallel {
            rows.par_iter().enumerate().map(eval).collect()
        } else {
            rows.iter().enumerate().map(eval).collect()
        }
    }

    /// Compute the full feature file for a query file.
    ///
    /// Output columns are the catalog names, then `relevance` when the input has it.
    pub fn build<R: io::Read, W: io::Write>(&self, queries: R, output: W) -> Result<PipelineSummary> {
        let mut reader = csv::Reader::from_reader(queries);
        let columns = QueryColumns::from_headers(reader.headers()?)?;
        let mut writer = csv::Writer::from_writer(output);

        let mut header: Vec<&str> = self.catalog.names().collect();
        if columns.relevance.is_some() {
            header.push(CSV_RELEVANCE);
        }
        writer.write_record(&header)?;

        let mut rows = 0;
        let mut records = reader.records();
        loop {
            let batch = read_batch(&mut records, &columns, rows, self.config.batch_size)?;
            if batch.is_empty() {
                break;
            }
            let vectors = self.evaluate_batch(rows, &batch)?;
            for (row, values) in batch.iter().zip(vectors) {
                let mut record: Vec<String> = values.iter().copied().map(format_value).collect();
                if let Some(relevance) = &row.relevance {
                    record.push(relevance.clone());
                }
                writer.write_record(&record)?;
            }
            rows += batch.len();
            tracing::debug!(rows, "batch written");
        }
        writer.flush()?;

        let summary = PipelineSummary { rows, features: self.catalog.len() };
        tracing::info!(rows, features = summary.features, "feature build complete");
        Ok(summary)
    }

    /// Add the catalog's features to an existing feature file.
    ///
    /// Rows are joined by position: row N of `queries` is row N of `existing`, and
    /// both files must hold the same number of rows. Existing cells are copied
    /// verbatim; catalog features are recomputed, so re-running is idempotent.
    pub fn augment<Q, E, W>(&self, queries: Q, existing: E, output: W) -> Result<PipelineSummary>
    where
        Q: io::Read,
        E: io::Read,
        W: io::Write,
    {
        let mut query_reader = csv::Reader::from_reader(queries);
        let columns = QueryColumns::from_headers(query_reader.headers()?)?;
        let mut feature_reader = csv::Reader::from_reader(existing);
        let existing_header: Vec<String> = feature_reader.headers()?.iter().map(str::to_string).collect();

        let header = augmented_header(&existing_header, self.catalog.names())?;
        let cells = header
            .iter()
            .map(|h| match self.catalog.names().position(|n| n == h.as_str()) {
                Some(i) => Ok(Cell::Computed(i)),
                None => existing_header
                    .iter()
                    .position(|e| e == h)
                    .map(Cell::Existing)
                    .ok_or_else(|| FeatureError::MissingColumn(h.clone())),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut writer = csv::Writer::from_writer(output);
        writer.write_record(&header)?;

        let mut rows = 0;
        let mut query_records = query_reader.records();
        let mut feature_records = feature_reader.records();
        loop {
            let batch = read_batch(&mut query_records, &columns, rows, self.config.batch_size)?;
            let existing_rows = feature_records
                .by_ref()
                .take(batch.len().max(1))
                .collect::<std::result::Result<Vec<StringRecord>, csv::Error>>()?;
            if batch.len() != existing_rows.len() {
                return Err(FeatureError::RowCountMismatch {
                    queries: rows + batch.len() + query_records.by_ref().count(),
                    features: rows + existing_rows.len() + feature_records.by_ref().count(),
                });
            }
            if batch.is_empty() {
                break;
            }

            let vectors = self.evaluate_batch(rows, &batch)?;
            for (values, existing) in vectors.iter().zip(&existing_rows) {
                let record: Vec<String> = cells
                    .iter()
                    .map(|cell| match cell {
                        Cell::Computed(i) => format_value(values[*i]),
                        Cell::Existing(i) => existing.get(*i).unwrap_or_default().to_string(),
                    })
                    .collect();
                writer.write_record(&record)?;
            }
            rows += batch.len();
            tracing::debug!(rows, "batch written");
        }
        writer.flush()?;

        let summary = PipelineSummary { rows, features: self.catalog.len() };
        tracing::info!(rows, columns = header.len(), "feature augmentation complete");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> { v.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn header_prepends_new_names_in_reverse() {
        let header = augmented_header(&names(&["tf_title", "relevance"]), ["idf_title", "idf_description", "tf_title"]).unwrap();
        assert_eq!(header, names(&["idf_description", "idf_title", "tf_title", "relevance"]));
    }

    #[test]
    fn header_is_idempotent() {
        let once = augmented_header(&names(&["tf_title"]), ["idf_title"]).unwrap();
        let twice = augmented_header(&once, ["idf_title"]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn relevance_must_be_last() {
        let err = augmented_header(&names(&["relevance", "tf_title"]), ["idf_title"]).unwrap_err();
        assert!(matches!(err, FeatureError::RelevanceNotLast));
    }

    #[test]
    fn integral_values_keep_a_decimal_point() {
        assert_eq!(format_value(1.0), "1.0");
        assert_eq!(format_value(0.0), "0.0");
        assert_eq!(format_value(-2.0), "-2.0");
        assert_eq!(format_value(0.25), "0.25");
        assert_eq!(format_value(f32::NAN), "NaN");
    }

    #[test]
    fn query_rows_report_bad_ids() {
        let headers = StringRecord::from(vec!["id", "product_uid", "search_term"]);
        let columns = QueryColumns::from_headers(&headers).unwrap();
        let row = columns.parse(&StringRecord::from(vec!["1", "100", "door"]), 1).unwrap();
        assert_eq!(row, QueryRow { product_id: 100, search_term: "door".into(), relevance: None });

        let err = columns.parse(&StringRecord::from(vec!["2", "x1", "door"]), 2).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidRow { row: 2, .. }));
    }

    #[test]
    fn missing_columns_are_reported() {
        let headers = StringRecord::from(vec!["product_uid"]);
        assert!(matches!(QueryColumns::from_headers(&headers), Err(FeatureError::MissingColumn(c)) if c == "search_term"));
    }
}
