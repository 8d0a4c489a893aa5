//! In-memory storage backend
//!
//! Same contract as `SqliteStore`; used for tests and throwaway runs.

use super::traits::{EnrichmentStore, StorageError, StorageResult};
use crate::concept::{AnalysisFlags, AnalysisKind, AnalysisRecords, Concept, ConceptId, NewConcept};
use crate::record::Record;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// DashMap-backed concept and record store
#[derive(Debug, Default)]
pub struct MemoryStore {
    concepts: DashMap<ConceptId, Concept>,
    /// fingerprint -> concept id; the entry lock makes insert-if-absent atomic
    fingerprints: DashMap<String, ConceptId>,
    records: DashMap<String, Record>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored concepts
    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    /// Number of stored records
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    fn with_concept<T>(
        &self,
        id: ConceptId,
        f: impl FnOnce(&mut Concept) -> T,
    ) -> StorageResult<T> {
        let mut concept = self
            .concepts
            .get_mut(&id)
            .ok_or(StorageError::ConceptNotFound(id))?;
        Ok(f(&mut concept))
    }
}

impl EnrichmentStore for MemoryStore {
    fn insert_concept_if_absent(&self, concept: &NewConcept) -> StorageResult<(Concept, bool)> {
        match self.fingerprints.entry(concept.fingerprint.clone()) {
            Entry::Occupied(existing) => {
                let id = *existing.get();
                let stored = self
                    .concepts
                    .get(&id)
                    .map(|c| c.clone())
                    .ok_or(StorageError::ConceptNotFound(id))?;
                Ok((stored, false))
            }
            Entry::Vacant(slot) => {
                let id = ConceptId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
                let now = Utc::now();
                let created = Concept {
                    id,
                    fingerprint: concept.fingerprint.clone(),
                    concept_text: concept.concept_text.clone(),
                    primary_record_id: concept.primary_record_id.clone(),
                    flags: AnalysisFlags::default(),
                    analysis_records: AnalysisRecords::default(),
                    submission_count: 1,
                    created_at: now,
                    last_updated: now,
                };
                // Concept row lands before the fingerprint entry is released
                self.concepts.insert(id, created.clone());
                slot.insert(id);
                Ok((created, true))
            }
        }
    }

    fn load_concept(&self, id: ConceptId) -> StorageResult<Option<Concept>> {
        Ok(self.concepts.get(&id).map(|c| c.clone()))
    }

    fn increment_submission_count(&self, id: ConceptId) -> StorageResult<u64> {
        self.with_concept(id, |concept| {
            concept.submission_count += 1;
            concept.last_updated = Utc::now();
            concept.submission_count
        })
    }

    fn set_analysis_flag(
        &self,
        id: ConceptId,
        kind: AnalysisKind,
        record_id: &str,
    ) -> StorageResult<bool> {
        self.with_concept(id, |concept| {
            let was_set = concept.flags.get(kind);
            if !was_set {
                concept.flags.set(kind);
                concept.analysis_records.set(kind, record_id);
            }
            concept.last_updated = Utc::now();
            !was_set
        })
    }

    fn touch_concept(&self, id: ConceptId) -> StorageResult<()> {
        self.with_concept(id, |concept| concept.last_updated = Utc::now())
    }

    fn load_record(&self, id: &str) -> StorageResult<Option<Record>> {
        Ok(self.records.get(id).map(|r| r.clone()))
    }

    fn load_records(&self, ids: &[String]) -> StorageResult<HashMap<String, Record>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| (id.clone(), r.clone())))
            .collect())
    }

    fn upsert_records(&self, records: &[Record]) -> StorageResult<usize> {
        for record in records {
            let mut stored = record.clone();
            stored.completed_analyses.clear();
            stored.errors.clear();
            self.records.insert(stored.id.clone(), stored);
        }
        Ok(records.len())
    }
}
