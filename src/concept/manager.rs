//! Concept identity resolution

use super::fingerprint::{fingerprint_normalized, normalize_concept_text};
use super::types::{AnalysisKind, Concept, ConceptId, ConceptResolution, NewConcept};
use crate::record::Record;
use crate::storage::{EnrichmentStore, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors from concept lookups and updates.
///
/// Callers treat these as "could not deduplicate" and analyze fresh.
#[derive(Debug, Error)]
pub enum ConceptError {
    #[error("concept store error: {0}")]
    Storage(#[from] StorageError),
}

/// Resolves records to concepts and tracks per-concept analysis state
///
/// Holds no mutable state of its own; every operation is a store call, so
/// one manager can be shared by all services of a run and several runs can
/// share a store.
#[derive(Clone)]
pub struct ConceptManager {
    store: Arc<dyn EnrichmentStore>,
}

impl ConceptManager {
    pub fn new(store: Arc<dyn EnrichmentStore>) -> Self {
        Self { store }
    }

    /// Find or create the concept for a record.
    ///
    /// Returns `None` when the record's concept text normalizes to nothing.
    /// A newly created concept takes the record as its primary. Joining an
    /// existing concept bumps its submission counter, unless the record is
    /// the primary or already belongs to it (in memory or in storage).
    pub fn resolve_or_create(&self, record: &Record) -> Result<Option<ConceptResolution>, ConceptError> {
        let normalized = normalize_concept_text(record.concept_source_text());
        let Some(fingerprint) = fingerprint_normalized(&normalized) else {
            debug!(record_id = %record.id, "no concept text, skipping concept resolution");
            return Ok(None);
        };

        let (concept, is_new) = self.store.insert_concept_if_absent(&NewConcept {
            fingerprint,
            concept_text: normalized,
            primary_record_id: record.id.clone(),
        })?;

        let already_counted = is_new
            || concept.primary_record_id == record.id
            || record.concept_id == Some(concept.id)
            || self.stored_concept_id(&record.id)? == Some(concept.id);

        let submission_count = if already_counted {
            concept.submission_count
        } else {
            self.store.increment_submission_count(concept.id)?
        };

        debug!(
            record_id = %record.id,
            concept_id = %concept.id,
            is_new,
            submission_count,
            "resolved concept"
        );

        Ok(Some(ConceptResolution {
            concept_id: concept.id,
            is_new,
            submission_count,
        }))
    }

    /// Concept a previously persisted copy of the record was filed under
    fn stored_concept_id(&self, record_id: &str) -> Result<Option<ConceptId>, ConceptError> {
        Ok(self
            .store
            .load_record(record_id)?
            .and_then(|stored| stored.concept_id))
    }

    pub fn get_concept(&self, id: ConceptId) -> Result<Option<Concept>, ConceptError> {
        Ok(self.store.load_concept(id)?)
    }

    pub fn get_primary_record_id(&self, id: ConceptId) -> Result<Option<String>, ConceptError> {
        Ok(self.get_concept(id)?.map(|c| c.primary_record_id))
    }

    /// Set the concept's flag for `kind`, recording `record_id` as the
    /// record that holds the analysis. Idempotent; flags never unset and the
    /// first holder is kept.
    ///
    /// Call only once `record_id` has been persisted with the analysis
    /// output, since later duplicates copy from it.
    ///
    /// Returns true if this call flipped the flag.
    pub fn mark_analysis_complete(
        &self,
        id: ConceptId,
        kind: AnalysisKind,
        record_id: &str,
    ) -> Result<bool, ConceptError> {
        let flipped = self.store.set_analysis_flag(id, kind, record_id)?;
        if flipped {
            debug!(concept_id = %id, kind = %kind, record_id, "analysis flag set");
        }
        Ok(flipped)
    }

    /// Refresh the concept's last-updated timestamp
    pub fn touch(&self, id: ConceptId) -> Result<(), ConceptError> {
        Ok(self.store.touch_concept(id)?)
    }
}
