//! Storage trait definitions

use crate::concept::{AnalysisKind, Concept, ConceptId, NewConcept};
use crate::record::Record;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Concept not found: {0}")]
    ConceptNotFound(ConceptId),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for the relational store behind concepts and records
///
/// Implementations must be thread-safe (Send + Sync); several pipeline runs
/// may share one store.
pub trait EnrichmentStore: Send + Sync {
    // === Concept Operations ===

    /// Insert a concept unless one with the same fingerprint exists.
    ///
    /// Returns the surviving row and whether this call created it. Must be
    /// atomic: concurrent callers with the same fingerprint all receive the
    /// same row, and exactly one of them sees `true`.
    fn insert_concept_if_absent(&self, concept: &NewConcept) -> StorageResult<(Concept, bool)>;

    /// Load a concept by ID
    fn load_concept(&self, id: ConceptId) -> StorageResult<Option<Concept>>;

    /// Increment the submission counter, returning the new value
    fn increment_submission_count(&self, id: ConceptId) -> StorageResult<u64>;

    /// Set an analysis flag and refresh `last_updated`.
    ///
    /// When the flag was unset, `record_id` is stored as the kind's analysis
    /// record in the same update and true is returned. An already set flag
    /// keeps its original record.
    fn set_analysis_flag(
        &self,
        id: ConceptId,
        kind: AnalysisKind,
        record_id: &str,
    ) -> StorageResult<bool>;

    /// Refresh `last_updated`
    fn touch_concept(&self, id: ConceptId) -> StorageResult<()>;

    // === Record Operations ===

    /// Load a record by ID
    fn load_record(&self, id: &str) -> StorageResult<Option<Record>>;

    /// Load many records in a single lookup; missing IDs are absent from the map
    fn load_records(&self, ids: &[String]) -> StorageResult<HashMap<String, Record>>;

    /// Insert or replace records by ID in one transaction.
    ///
    /// Callers are responsible for field preservation; see `MergeStore`.
    fn upsert_records(&self, records: &[Record]) -> StorageResult<usize>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: EnrichmentStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
