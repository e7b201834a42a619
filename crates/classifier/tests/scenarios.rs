use litmap_classifier::{
    ClusteringMethod, CoverageGuarantor, CoverageStatus, EmbeddingCapability, EngineConfig, Item,
    ItemField, Label, LabelSource, MappingEngine, PatternScorer, ReassignReason,
};
use pretty_assertions::assert_eq;

fn offline_engine(configure: impl FnOnce(&mut EngineConfig)) -> MappingEngine {
    let mut config = EngineConfig::builtin().expect("builtin profile");
    configure(&mut config);
    MappingEngine::new(config, EmbeddingCapability::unavailable("embeddings disabled in tests"))
        .expect("engine")
}

fn titled(id: i64, title: &str) -> Item {
    Item::new(id).with(ItemField::Title, title)
}

#[test]
fn contact_tracing_corpus_matches_contact_tracking() {
    let config = EngineConfig::builtin().unwrap();
    let scorer = PatternScorer::new(&config.categories, config.keyword_weight_divisor).unwrap();
    let best = scorer
        .best_match("contact tracing app proximity exposure")
        .expect("pattern signal");
    assert_eq!(config.categories.categories[best].name, "Contact Tracking");
}

#[tokio::test]
async fn contact_tracing_item_is_pattern_labelled() {
    let engine = offline_engine(|config| config.enforce_coverage = false);
    let outcome = engine
        .classify(&[titled(1, "contact tracing app proximity exposure")])
        .await;
    assert_eq!(outcome.labels, vec!["Contact Tracking"]);
    assert_eq!(outcome.sources, vec![LabelSource::Pattern]);
}

#[tokio::test]
async fn empty_corpus_gets_sentinel_label() {
    let engine = offline_engine(|config| config.enforce_coverage = false);
    let outcome = engine
        .classify(&[Item::new(1).with(ItemField::Abstract, "")])
        .await;
    assert_eq!(outcome.labels, vec!["Unclassified"]);
    assert_eq!(outcome.assignments, vec![Label::Unclassified]);

    let engine = offline_engine(|_| {});
    let outcome = engine.classify(&[Item::default()]).await;
    assert_eq!(outcome.labels.len(), 1);
}

#[test]
fn overrepresented_categories_donate_to_missing_ones() {
    let config = EngineConfig::builtin().unwrap();
    let taxonomy = &config.categories;
    let scorer = PatternScorer::new(taxonomy, config.keyword_weight_divisor).unwrap();
    let (a, b) = (Label::Category(0), Label::Category(1));
    let mut labels = vec![a, a, a, b, b];
    let corpora = vec![String::new(); 5];

    let report = CoverageGuarantor::new(taxonomy, &scorer).repair(&mut labels, &corpora);

    for category in 0..taxonomy.len() {
        assert!(
            labels.contains(&Label::Category(category)),
            "missing {category} in {labels:?}"
        );
    }
    assert_eq!(report.status, CoverageStatus::Repaired);
    assert_eq!(report.reassignments.len(), 3);
    assert!(report
        .reassignments
        .iter()
        .all(|r| r.from == "Contact Tracking" || r.from == "Symptom Monitoring"));
}

#[tokio::test]
async fn identity_grouping_without_embeddings() {
    let engine = offline_engine(|_| {});
    let labels: Vec<String> = ["Survey", "Case Study", "Simulation/Modeling", "Qualitative"]
        .iter()
        .map(ToString::to_string)
        .collect();

    let outcome = engine.cluster_labels(&labels).await;

    assert_eq!(outcome.grouped_labels, labels);
    assert_eq!(outcome.cluster_ids, vec![0, 1, 2, 3]);
    assert_eq!(outcome.clusters.len(), 4);
    assert!(matches!(outcome.method, ClusteringMethod::Identity { .. }));
    assert!(!outcome.embedding.available);
}

#[tokio::test]
async fn single_item_gets_partial_coverage() {
    let engine = offline_engine(|_| {});
    let outcome = engine
        .classify(&[titled(1, "contact tracing app proximity exposure")])
        .await;

    assert_eq!(outcome.labels.len(), 1);
    assert!(outcome.assignments[0].category().is_some());
    assert_eq!(outcome.coverage.status, CoverageStatus::Partial);
    assert_eq!(outcome.coverage.missing.len(), 4);
    assert!(outcome
        .coverage
        .reassignments
        .iter()
        .any(|r| r.reason == ReassignReason::Forced));
    assert_eq!(outcome.sources, vec![LabelSource::Reassigned]);
}

#[tokio::test]
async fn spanish_records_are_classified() {
    let items: Vec<Item> = serde_json::from_str(
        r#"[
            {"id": 1, "titulo": "Rastreo de contactos", "palabras_clave": ["contact tracing", "bluetooth"]},
            {"id": 2, "titulo": "Encuesta", "resumen": "A questionnaire survey on privacy and data protection"}
        ]"#,
    )
    .unwrap();
    let engine = offline_engine(|config| config.enforce_coverage = false);
    let outcome = engine.classify(&items).await;
    assert_eq!(outcome.labels, vec!["Contact Tracking", "Privacy and Security"]);

    let approaches = engine.extract_approaches(&items).await;
    assert_eq!(approaches.labels[1], "Survey");
}
