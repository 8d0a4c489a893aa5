//! Two runs sharing one SQLite database

mod common;

use common::{dedup_pipeline, post};
use sift::{EnrichmentStore, OpenStore, Record, RunOptions, SqliteStore};
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_runs_agree_on_concepts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let store_a = Arc::new(SqliteStore::open(&path).unwrap());
    let store_b = Arc::new(SqliteStore::open(&path).unwrap());

    let batch = |prefix: &str| -> Vec<Record> {
        (0..30)
            .map(|i| post(&format!("{prefix}{i}"), &format!("Shared idea {}", i % 5)))
            .collect()
    };
    let records_a = batch("a");
    let records_b = batch("b");

    let run_a = {
        let harness = dedup_pipeline(store_a.clone(), &[]);
        tokio::spawn(async move {
            harness
                .orchestrator
                .run(&mut records_a.into_iter(), &RunOptions::default())
                .await
        })
    };
    let run_b = {
        let harness = dedup_pipeline(store_b.clone(), &[]);
        tokio::spawn(async move {
            harness
                .orchestrator
                .run(&mut records_b.into_iter(), &RunOptions::default())
                .await
        })
    };
    let (report_a, report_b) = (run_a.await.unwrap(), run_b.await.unwrap());

    assert_eq!(report_a.persisted + report_b.persisted, 60);
    assert_eq!(report_a.concepts_created + report_b.concepts_created, 5);

    let mut concept_ids = HashSet::new();
    for prefix in ["a", "b"] {
        for i in 0..30 {
            let stored = store_a.load_record(&format!("{prefix}{i}")).unwrap().unwrap();
            concept_ids.insert(stored.concept_id.unwrap());
        }
    }
    assert_eq!(concept_ids.len(), 5);

    let total: u64 = concept_ids
        .iter()
        .map(|id| store_a.load_concept(*id).unwrap().unwrap().submission_count)
        .sum();
    assert_eq!(total, 60);
}
