//! Business concepts: the deduplication key shared by equivalent records
//!
//! A concept is identified by the fingerprint of its normalized text. The
//! first record seen for a fingerprint becomes the concept's primary record
//! and owns the canonical analysis outputs; later records copy from it.

mod fingerprint;
mod manager;
mod types;

pub use fingerprint::{concept_fingerprint, fingerprint_normalized, normalize_concept_text};
pub use manager::{ConceptError, ConceptManager};
pub use types::{AnalysisFlags, AnalysisRecords, AnalysisKind, Concept, ConceptId, ConceptResolution, NewConcept};
