use relfeat_core::features::{OverlapFeature, TermStatFeature};
use relfeat_core::stats::TermMeasure;
use relfeat_core::{Feature, FeatureCatalog, FeatureError, FeaturePipeline, Field, IndexAccessor, InvertedIndex, QueryRow, Searcher};

fn home_improvement_index() -> Searcher {
    let mut index = InvertedIndex::new();
    index.add_product(100, "red door hinge", "a sturdy red door hinge for outdoor use");
    index.add_product(101, "brushed nickel cabinet pull", "cabinet pull with mounting screws");
    index.add_product(102, "exterior door", "steel exterior door with frame");
    Searcher::new(index)
}

#[test]
fn door_hinge_scenario() {
    let s = home_improvement_index();
    let query = "door hinge";

    let overlap = OverlapFeature::new(Field::Title).evaluate(&s, 100, query).unwrap();
    assert_eq!(overlap, 1.0);

    let tf = TermStatFeature::new(Field::Title, TermMeasure::Tf).evaluate(&s, 100, query).unwrap();
    assert_eq!(tf, 2.0);

    let tf_sigir = TermStatFeature::new(Field::Title, TermMeasure::TfSigir).evaluate(&s, 100, query).unwrap();
    assert!((tf_sigir - 2.0 * 2f32.ln()).abs() < 1e-6);
    assert!((tf_sigir - 1.386).abs() < 1e-3);

    let tf_norm = TermStatFeature::new(Field::Title, TermMeasure::TfNorm).evaluate(&s, 100, query).unwrap();
    assert!((tf_norm - 2.0 / 3.0).abs() < 1e-6);
}

#[test]
fn full_vector_matches_catalog_order() {
    let s = home_improvement_index();
    let catalog = FeatureCatalog::standard();
    let pipeline = FeaturePipeline::new(&s, &catalog);
    let row = QueryRow { product_id: 100, search_term: "door hinge".into(), relevance: Some("3".into()) };
    let vector = pipeline.feature_vector(&row).unwrap();

    assert_eq!(vector.len(), catalog.len());
    let names: Vec<&str> = catalog.names().collect();
    let at = |name: &str| vector[names.iter().position(|n| *n == name).unwrap()];
    assert_eq!(at("overlap_title"), 1.0);
    assert_eq!(at("tf_title"), 2.0);
    assert!(at("bm25_title") > 0.0);
    assert!(at("tfidf_description") > 0.0);
}

#[test]
fn missing_product_is_fatal() {
    let s = home_improvement_index();
    assert!(matches!(s.find_document(999), Err(FeatureError::NotFound { product_id: 999, matches: 0 })));

    let catalog = FeatureCatalog::all();
    for feature in catalog.features() {
        let err = feature.evaluate(&s, 999, "door").unwrap_err();
        assert!(matches!(err, FeatureError::NotFound { product_id: 999, .. }), "{}: {err}", feature.name());
    }
}

#[test]
fn idf_features_are_finite_for_common_terms() {
    let s = home_improvement_index();
    // "door" appears in two of three titles: idf = 3 / 3 = 1
    let catalog = FeatureCatalog::idf_extension();
    for value in catalog.evaluate(&s, 102, "door").unwrap() {
        assert!(value.is_finite());
    }
    let idf_sigir = TermStatFeature::new(Field::Title, TermMeasure::IdfSigir).evaluate(&s, 102, "door").unwrap();
    assert_eq!(idf_sigir, 0.0);
}
