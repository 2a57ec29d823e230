use std::fs;

use relfeat_core::persist::{open_index, save_index, save_meta, IndexPaths, MetaFile, INDEX_VERSION};
use relfeat_core::{FeatureCatalog, FeatureError, FeaturePipeline, InvertedIndex, PipelineConfig, Searcher};
use tempfile::tempdir;

const QUERIES: &str = "id,product_uid,search_term,relevance\n\
1,100,door hinge,3\n\
2,101,cabinet pull,2.67\n\
3,102,\"steel door, exterior\",1\n";

fn searcher() -> Searcher {
    let mut index = InvertedIndex::new();
    index.add_product(100, "red door hinge", "a sturdy red door hinge for outdoor use");
    index.add_product(101, "brushed nickel cabinet pull", "cabinet pull with mounting screws");
    index.add_product(102, "exterior door", "steel exterior door with frame");
    Searcher::new(index)
}

fn build(s: &Searcher, catalog: &FeatureCatalog, config: PipelineConfig) -> String {
    let mut out = Vec::new();
    FeaturePipeline::new(s, catalog).with_config(config).build(QUERIES.as_bytes(), &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn build_writes_header_vectors_and_relevance() {
    let s = searcher();
    let catalog = FeatureCatalog::select(&["overlap_title", "tf_title"]).unwrap();
    let out = build(&s, &catalog, PipelineConfig::default());
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "overlap_title,tf_title,relevance");
    assert_eq!(lines[1], "1.0,2.0,3");
    assert_eq!(lines[2], "1.0,2.0,2.67");
    assert_eq!(lines.len(), 4);
}

#[test]
fn parallel_batches_keep_row_order() {
    let s = searcher();
    let catalog = FeatureCatalog::all();
    let sequential = build(&s, &catalog, PipelineConfig { batch_size: 2, parallel: false });
    let parallel = build(&s, &catalog, PipelineConfig { batch_size: 2, parallel: true });
    assert_eq!(sequential, parallel);
}

#[test]
fn build_without_relevance_has_no_label_column() {
    let s = searcher();
    let catalog = FeatureCatalog::select(&["tf_title"]).unwrap();
    let mut out = Vec::new();
    let input = "product_uid,search_term\n100,door\n";
    FeaturePipeline::new(&s, &catalog).build(input.as_bytes(), &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "tf_title\n1.0\n");
}

#[test]
fn augmentation_prepends_and_is_idempotent() {
    let s = searcher();
    let standard = FeatureCatalog::select(&["overlap_title", "tf_title"]).unwrap();
    let existing = build(&s, &standard, PipelineConfig::default());

    let extension = FeatureCatalog::select(&["idf_title", "tf_title_sigir"]).unwrap();
    let pipeline = FeaturePipeline::new(&s, &extension);
    let mut once = Vec::new();
    let summary = pipeline.augment(QUERIES.as_bytes(), existing.as_bytes(), &mut once).unwrap();
    assert_eq!(summary.rows, 3);

    let once = String::from_utf8(once).unwrap();
    let header = once.lines().next().unwrap();
    assert_eq!(header, "tf_title_sigir,idf_title,overlap_title,tf_title,relevance");
    assert!(once.lines().nth(1).unwrap().ends_with(",1.0,2.0,3"));

    let mut twice = Vec::new();
    pipeline.augment(QUERIES.as_bytes(), once.as_bytes(), &mut twice).unwrap();
    assert_eq!(once, String::from_utf8(twice).unwrap());
}

#[test]
fn augmentation_rejects_misaligned_files() {
    let s = searcher();
    let catalog = FeatureCatalog::select(&["tf_title"]).unwrap();
    let existing = "overlap_title,relevance\n1,3\n1,2.67\n";
    let err = FeaturePipeline::new(&s, &catalog)
        .augment(QUERIES.as_bytes(), existing.as_bytes(), Vec::new())
        .unwrap_err();
    assert!(matches!(err, FeatureError::RowCountMismatch { queries: 3, features: 2 }));
}

#[test]
fn augmentation_requires_relevance_last() {
    let s = searcher();
    let catalog = FeatureCatalog::select(&["tf_title"]).unwrap();
    let existing = "relevance,overlap_title\n3,1\n2.67,1\n1,0\n";
    let err = FeaturePipeline::new(&s, &catalog)
        .augment(QUERIES.as_bytes(), existing.as_bytes(), Vec::new())
        .unwrap_err();
    assert!(matches!(err, FeatureError::RelevanceNotLast));
}

#[test]
fn missing_product_aborts_the_batch() {
    let s = searcher();
    let catalog = FeatureCatalog::standard();
    let input = "product_uid,search_term\n100,door\n999,door\n";
    let mut out = Vec::new();
    let err = FeaturePipeline::new(&s, &catalog).build(input.as_bytes(), &mut out).unwrap_err();
    assert!(matches!(err, FeatureError::Row { row: 2, product_id: 999, .. }));
    assert!(matches!(err.root(), FeatureError::NotFound { product_id: 999, .. }));
    // only the header made it out; no row of the failed batch was written
    let written = String::from_utf8(out).unwrap();
    assert_eq!(written.lines().count(), 1);
}

#[test]
fn persisted_index_yields_identical_features() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let s = searcher();
    save_index(&paths, s.index()).unwrap();
    save_meta(&paths, &MetaFile { num_docs: 3, created_at: "2024-01-01T00:00:00Z".into(), version: INDEX_VERSION }).unwrap();
    assert!(fs::metadata(dir.path().join("index.bin")).is_ok());

    let reloaded = Searcher::new(open_index(&paths).unwrap());
    let catalog = FeatureCatalog::all();
    assert_eq!(build(&s, &catalog, PipelineConfig::default()), build(&reloaded, &catalog, PipelineConfig::default()));
}
