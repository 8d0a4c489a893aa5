//! Store wrapper that simulates outages

use sift::concept::NewConcept;
use sift::storage::MemoryStore;
use sift::{AnalysisKind, Concept, ConceptId, EnrichmentStore, Record, StorageError, StorageResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// `MemoryStore` whose concept table, writes, or individual record ids can
/// be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    concepts_down: AtomicBool,
    writes_down: AtomicBool,
    poisoned: Mutex<HashSet<String>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Every concept operation fails while set
    pub fn set_concepts_down(&self, down: bool) {
        self.concepts_down.store(down, Ordering::SeqCst);
    }

    /// Every upsert fails while set
    pub fn set_writes_down(&self, down: bool) {
        self.writes_down.store(down, Ordering::SeqCst);
    }

    /// Upserts containing this record id fail
    pub fn poison(&self, id: &str) {
        self.poisoned.lock().unwrap().insert(id.to_string());
    }

    fn concepts(&self) -> StorageResult<()> {
        if self.concepts_down.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("concept store unreachable".into()))
        } else {
            Ok(())
        }
    }
}

impl EnrichmentStore for FlakyStore {
    fn insert_concept_if_absent(&self, concept: &NewConcept) -> StorageResult<(Concept, bool)> {
        self.concepts()?;
        self.inner.insert_concept_if_absent(concept)
    }

    fn load_concept(&self, id: ConceptId) -> StorageResult<Option<Concept>> {
        self.concepts()?;
        self.inner.load_concept(id)
    }

    fn increment_submission_count(&self, id: ConceptId) -> StorageResult<u64> {
        self.concepts()?;
        self.inner.increment_submission_count(id)
    }

    fn set_analysis_flag(
        &self,
        id: ConceptId,
        kind: AnalysisKind,
        record_id: &str,
    ) -> StorageResult<bool> {
        self.concepts()?;
        self.inner.set_analysis_flag(id, kind, record_id)
    }

    fn touch_concept(&self, id: ConceptId) -> StorageResult<()> {
        self.concepts()?;
        self.inner.touch_concept(id)
    }

    fn load_record(&self, id: &str) -> StorageResult<Option<Record>> {
        self.inner.load_record(id)
    }

    fn load_records(&self, ids: &[String]) -> StorageResult<HashMap<String, Record>> {
        self.inner.load_records(ids)
    }

    fn upsert_records(&self, records: &[Record]) -> StorageResult<usize> {
        if self.writes_down.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("record store unreachable".into()));
        }
        let poisoned = self.poisoned.lock().unwrap();
        if let Some(record) = records.iter().find(|r| poisoned.contains(&r.id)) {
            return Err(StorageError::Unavailable(format!("write rejected for {}", record.id)));
        }
        drop(poisoned);
        self.inner.upsert_records(records)
    }
}
