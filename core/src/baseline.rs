//! Rank-based relevance guess used as a no-model baseline.

use std::io;

use crate::accessor::IndexAccessor;
use crate::error::{FeatureError, Result};
use crate::index::{Field, ProductId};
use crate::pipeline::{QueryColumns, CSV_ID, CSV_RELEVANCE};
use crate::query::{escape, parse, BooleanQuery, Query};
use crate::similarity::Similarity;

pub const NAIVE_SEARCH_LIMIT: usize = 1000;
pub const NAIVE_TOP_RANKS: usize = 100;

/// 3 when the product ranks in the top 100 for the query over title and description,
/// 2 when it ranks lower within the first 1000 results, 1 otherwise.
pub fn naive_relevance(accessor: &dyn IndexAccessor, product_id: ProductId, query: &str) -> Result<u8> {
    let doc = accessor.find_document(product_id)?;
    let escaped = escape(query);
    let mut bq = BooleanQuery::new();
    for field in Field::ALL {
        bq.add_should(parse(&escaped, field, |t| accessor.analyze(t))?);
    }
    let top = accessor.search(&Query::Boolean(bq), Similarity::Bm25, NAIVE_SEARCH_LIMIT);
    Ok(match top.hits.iter().position(|h| h.doc == doc) {
        None => 1,
        Some(rank) if rank < NAIVE_TOP_RANKS => 3,
        Some(_) => 2,
    })
}

/// Score every row of a query file, writing `id,relevance`.
pub fn run_baseline<R: io::Read, W: io::Write>(accessor: &dyn IndexAccessor, queries: R, output: W) -> Result<usize> {
    let mut reader = csv::Reader::from_reader(queries);
    let columns = QueryColumns::from_headers(reader.headers()?)?;
    let id_column = columns.id.ok_or_else(|| FeatureError::MissingColumn(CSV_ID.into()))?;
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record([CSV_ID, CSV_RELEVANCE])?;

    let mut rows = 0;
    for record in reader.records() {
        let record = record?;
        rows += 1;
        let row = columns.parse(&record, rows)?;
        let score = naive_relevance(accessor, row.product_id, &row.search_term)
            .map_err(|e| e.at_row(rows, row.product_id))?;
        let score = score.to_string();
        writer.write_record([record.get(id_column).unwrap_or_default(), score.as_str()])?;
    }
    writer.flush()?;
    tracing::info!(rows, "baseline scoring complete");
    Ok(rows)
}
