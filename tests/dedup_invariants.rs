//! Deduplication invariants observed through full pipeline runs

mod common;

use common::{dedup_pipeline, post, FlakyStore, DEDUP_KINDS};
use sift::concept::ConceptManager;
use sift::dedup::{copied_marker, primary_record_marker, Decision, DecisionReason, DeduplicationEngine};
use sift::storage::MemoryStore;
use sift::{AnalysisKind, ConceptId, EnrichmentStore, FieldValue, Record, RunOptions, ServiceKind};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[tokio::test]
async fn fitness_app_variants_share_one_analysis() {
    let store = Arc::new(MemoryStore::new());
    let harness = dedup_pipeline(store.clone(), &[]);
    let mut source = vec![
        post("r1", "Fitness tracking app"),
        post("r2", "FITNESS TRACKING APP"),
    ]
    .into_iter();

    let report = harness.orchestrator.run(&mut source, &RunOptions::default()).await;

    let profiler = &report.service("profiler").unwrap().statistics;
    assert_eq!(profiler.analyzed, 1);
    assert_eq!(profiler.copied, 1);
    assert_eq!(harness.provider(ServiceKind::Profiler).call_count(), 1);

    let r1 = store.load_record("r1").unwrap().unwrap();
    let r2 = store.load_record("r2").unwrap().unwrap();
    assert_eq!(r1.concept_id, r2.concept_id);

    let concept = store.load_concept(r1.concept_id.unwrap()).unwrap().unwrap();
    assert_eq!(concept.submission_count, 2);
    assert_eq!(concept.primary_record_id, "r1");
    for kind in AnalysisKind::ALL {
        assert!(concept.has_analysis(kind), "{kind} flag not set");
    }
}

/// 100 records in groups of 7 consecutive records per concept, with
/// case variation inside each group and two provider failures.
#[tokio::test]
async fn hundred_record_batch_respects_counters() {
    let store = Arc::new(MemoryStore::new());
    let harness = dedup_pipeline(store.clone(), &["r14", "r50"]);

    let records: Vec<Record> = (0..100)
        .map(|i| {
            let title = format!("Concept number {}", i / 7);
            let title = if i % 2 == 0 { title.to_uppercase() } else { title };
            post(&format!("r{i}"), &title)
        })
        .collect();
    let distinct_concepts = (0..100).map(|i| i / 7).collect::<HashSet<_>>().len() as u64;

    let report = harness
        .orchestrator
        .run(&mut records.into_iter(), &RunOptions::default())
        .await;

    assert_eq!(report.fetched, 100);
    assert_eq!(report.persisted, 100);
    assert_eq!(report.concepts_created as u64, distinct_concepts);
    assert_eq!(report.concepts_reused, 100 - distinct_concepts as usize);

    for kind in DEDUP_KINDS {
        let stats = &report.service(kind.as_str()).unwrap().statistics;
        assert_eq!(
            stats.analyzed + stats.copied + stats.errors,
            100,
            "{kind}: {stats:?}"
        );
        assert_eq!(stats.skipped, 0);
        assert!(stats.analyzed <= distinct_concepts, "{kind}: {stats:?}");
        assert!(stats.copied > 0);
    }

    // Group 0 never failed: every follower copied from r0.
    for i in 1..7 {
        let stored = store.load_record(&format!("r{i}")).unwrap().unwrap();
        for kind in DEDUP_KINDS.iter().filter_map(|k| k.analysis_kind()) {
            assert_eq!(stored.fields.get(&copied_marker(kind)), Some(&FieldValue::Bool(true)));
            assert_eq!(
                stored.fields.get(&primary_record_marker(kind)),
                Some(&FieldValue::String("r0".into()))
            );
        }
    }
}

#[tokio::test]
async fn copied_output_equals_primary_output() {
    let store = Arc::new(MemoryStore::new());
    let harness = dedup_pipeline(store.clone(), &[]);
    let mut source = vec![
        post("p", "Invoice reminder bot"),
        post("c1", "invoice   reminder BOT"),
        post("c2", "App idea: Invoice reminder bot"),
    ]
    .into_iter();
    harness.orchestrator.run(&mut source, &RunOptions::default()).await;

    let primary = store.load_record("p").unwrap().unwrap();
    for id in ["c1", "c2"] {
        let copy = store.load_record(id).unwrap().unwrap();
        for kind in DEDUP_KINDS {
            for key in kind.default_output_fields() {
                assert_eq!(
                    copy.fields.get(*key),
                    primary.fields.get(*key),
                    "{id}.{key} differs from primary"
                );
                assert!(primary.has_field(key));
            }
        }
    }
}

#[tokio::test]
async fn at_most_one_fresh_per_concept_and_kind() {
    let store = Arc::new(MemoryStore::new());
    let harness = dedup_pipeline(store.clone(), &[]);
    let titles = ["Dog walker", "DOG WALKER", "Plant watering", "dog walker", "plant  watering"];
    let records: Vec<Record> = titles
        .iter()
        .enumerate()
        .map(|(i, t)| post(&format!("r{i}"), t))
        .collect();
    harness
        .orchestrator
        .run(&mut records.into_iter(), &RunOptions::default())
        .await;

    let mut fresh_per_concept: HashMap<(ConceptId, AnalysisKind), usize> = HashMap::new();
    for i in 0..titles.len() {
        let stored = store.load_record(&format!("r{i}")).unwrap().unwrap();
        let concept_id = stored.concept_id.unwrap();
        for kind in AnalysisKind::ALL {
            if !stored.fields.contains_key(&copied_marker(kind)) {
                *fresh_per_concept.entry((concept_id, kind)).or_default() += 1;
            }
        }
    }
    assert_eq!(fresh_per_concept.len(), 2 * AnalysisKind::ALL.len());
    assert!(fresh_per_concept.values().all(|&n| n == 1));
    assert_eq!(harness.provider(ServiceKind::Monetization).call_count(), 2);
}

#[tokio::test]
async fn rerun_of_persisted_records_reuses_concepts() {
    let store = Arc::new(MemoryStore::new());
    let harness = dedup_pipeline(store.clone(), &[]);
    let records = vec![post("r1", "Recipe scaler"), post("r2", "recipe scaler")];

    harness
        .orchestrator
        .run(&mut records.clone().into_iter(), &RunOptions::default())
        .await;
    let report = harness
        .orchestrator
        .run(&mut records.into_iter(), &RunOptions::default())
        .await;

    assert_eq!(report.concepts_created, 0);
    let profiler = &report.service("profiler").unwrap().statistics;
    // r1 is the primary; its own stored output is reused without a call
    assert_eq!(profiler.analyzed, 0);
    assert_eq!(profiler.copied, 2);
    assert_eq!(harness.provider(ServiceKind::Profiler).call_count(), 1);

    let concept_id = store.load_record("r1").unwrap().unwrap().concept_id.unwrap();
    assert_eq!(store.load_concept(concept_id).unwrap().unwrap().submission_count, 2);
    assert!(!store
        .load_record("r1")
        .unwrap()
        .unwrap()
        .fields
        .contains_key(&copied_marker(AnalysisKind::Profiler)));
}

#[tokio::test]
async fn unreachable_concept_store_fails_open() {
    let store = Arc::new(FlakyStore::new());
    store.set_concepts_down(true);
    let harness = dedup_pipeline(store.clone(), &[]);
    let mut source = vec![
        post("r1", "Fitness tracking app"),
        post("r2", "FITNESS TRACKING APP"),
    ]
    .into_iter();

    let report = harness.orchestrator.run(&mut source, &RunOptions::default()).await;

    assert_eq!(report.persisted, 2);
    assert_eq!(report.concepts_created, 0);
    for kind in DEDUP_KINDS {
        let stats = &report.service(kind.as_str()).unwrap().statistics;
        assert_eq!(stats.analyzed, 2, "{kind}");
        assert_eq!(stats.copied, 0);
    }
    for id in ["r1", "r2"] {
        let stored = store.load_record(id).unwrap().unwrap();
        assert!(stored.concept_id.is_none());
        assert!(stored.has_field("app_concept"));
        assert!(stored.has_field("monetization_score"));
    }
    assert_eq!(report.records_with_errors(), 2);
}

#[test]
fn lookup_failure_decides_run_fresh() {
    let store = Arc::new(FlakyStore::new());
    let concepts = ConceptManager::new(store.clone());
    let mut record = Record::new("r1", "Fitness tracking app");
    record.concept_id = Some(concepts.resolve_or_create(&record).unwrap().unwrap().concept_id);
    concepts
        .mark_analysis_complete(record.concept_id.unwrap(), AnalysisKind::Profiler, "r1")
        .unwrap();

    let engine = DeduplicationEngine::new(
        AnalysisKind::Profiler,
        concepts,
        store.clone(),
        vec!["app_concept".into()],
        0.05,
    );
    assert!(matches!(engine.decide(&record).0, Decision::Copy { .. }));

    store.set_concepts_down(true);
    let (decision, reason) = engine.decide(&record);
    assert_eq!(decision, Decision::RunFresh);
    assert!(matches!(reason, DecisionReason::ConceptLookupFailed(_)));
}
