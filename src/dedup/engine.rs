//! Fresh-versus-copy decisions for one enrichment kind
//!
//! Every deduplicable kind follows the same state machine:
//!
//! ```text
//! [Unresolved] --resolve concept--> [HasConcept]
//! [HasConcept] --flag=false--> [RunFresh]
//! [HasConcept] --flag=true, copy succeeds--> [Copied]
//! [HasConcept] --flag=true, copy fails--> [RunFresh]  (fallback)
//! [NoConcept or lookup error] --> [RunFresh]
//! ```
//!
//! Kinds differ only in their concept flag, their output fields and the unit
//! cost used for savings reporting.

use super::stats::{Outcome, RunStatistics, StatsCounter};
use crate::concept::{AnalysisKind, ConceptError, ConceptId, ConceptManager};
use crate::record::{FieldMap, FieldValue, Record};
use crate::storage::{EnrichmentStore, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// What to do for one record and kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Call the provider
    RunFresh,
    /// Reuse the stored output of the record that first completed this
    /// kind for the concept
    Copy {
        concept_id: ConceptId,
        primary_record_id: String,
        source_record_id: String,
    },
    /// The record already carries the complete output
    Skip,
}

/// Why a decision was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionReason {
    AlreadyPresent,
    NoConcept,
    ConceptLookupFailed(String),
    ConceptMissing(ConceptId),
    NotYetAnalyzed(ConceptId),
    AnalysisAvailable(ConceptId),
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyPresent => write!(f, "record already carries this analysis"),
            Self::NoConcept => write!(f, "record has no concept"),
            Self::ConceptLookupFailed(e) => write!(f, "concept lookup failed: {}", e),
            Self::ConceptMissing(id) => write!(f, "concept {} not found", id),
            Self::NotYetAnalyzed(id) => write!(f, "concept {} not analyzed yet", id),
            Self::AnalysisAvailable(id) => write!(f, "concept {} already analyzed", id),
        }
    }
}

/// Why a copy from the concept's analysis record failed
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("concept {0} not found")]
    ConceptMissing(ConceptId),

    #[error("analysis record {0} not stored")]
    SourceMissing(String),

    #[error("analysis record {0} has no stored output")]
    OutputMissing(String),

    #[error(transparent)]
    Concept(#[from] ConceptError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Where an enrichment result came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultProvenance {
    Fresh,
    Copied {
        primary_record_id: String,
        /// Record the output was read from
        source_record_id: String,
        concept_id: ConceptId,
    },
}

/// Output of one service invocation for one record
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResult {
    pub kind: AnalysisKind,
    /// Analysis output fields, without provenance markers
    pub fields: FieldMap,
    pub provenance: ResultProvenance,
}

impl EnrichmentResult {
    pub fn fresh(kind: AnalysisKind, fields: FieldMap) -> Self {
        Self {
            kind,
            fields,
            provenance: ResultProvenance::Fresh,
        }
    }

    pub fn is_copied(&self) -> bool {
        matches!(self.provenance, ResultProvenance::Copied { .. })
    }

    /// Output fields plus copy markers, ready to merge into `record`.
    ///
    /// Markers are omitted when the record is itself the one the output was
    /// read from.
    pub fn fields_for(&self, record: &Record) -> FieldMap {
        let mut fields = self.fields.clone();
        if let ResultProvenance::Copied {
            primary_record_id,
            source_record_id,
            concept_id,
        } = &self.provenance
        {
            if *source_record_id != record.id {
                fields.insert(copied_marker(self.kind), FieldValue::Bool(true));
                fields.insert(
                    primary_record_marker(self.kind),
                    FieldValue::String(primary_record_id.clone()),
                );
                fields.insert(
                    analysis_record_marker(self.kind),
                    FieldValue::String(source_record_id.clone()),
                );
                fields.insert(concept_marker(self.kind), FieldValue::Int(concept_id.value()));
            }
        }
        fields
    }
}

/// `<kind>_copied_from_primary`
pub fn copied_marker(kind: AnalysisKind) -> String {
    format!("{}_copied_from_primary", kind.as_str())
}

/// `<kind>_primary_record_id`
pub fn primary_record_marker(kind: AnalysisKind) -> String {
    format!("{}_primary_record_id", kind.as_str())
}

/// `<kind>_analysis_record_id`
pub fn analysis_record_marker(kind: AnalysisKind) -> String {
    format!("{}_analysis_record_id", kind.as_str())
}

/// `<kind>_concept_id`
pub fn concept_marker(kind: AnalysisKind) -> String {
    format!("{}_concept_id", kind.as_str())
}

/// Skip/copy/fresh decision engine for one analysis kind
pub struct DeduplicationEngine {
    kind: AnalysisKind,
    concepts: ConceptManager,
    store: Arc<dyn EnrichmentStore>,
    output_fields: Vec<String>,
    stats: StatsCounter,
}

impl DeduplicationEngine {
    pub fn new(
        kind: AnalysisKind,
        concepts: ConceptManager,
        store: Arc<dyn EnrichmentStore>,
        output_fields: Vec<String>,
        unit_cost: f64,
    ) -> Self {
        Self {
            kind,
            concepts,
            store,
            output_fields,
            stats: StatsCounter::new(unit_cost),
        }
    }

    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    pub fn output_fields(&self) -> &[String] {
        &self.output_fields
    }

    /// Decide between fresh analysis, copy and skip.
    ///
    /// Lookup failures yield `RunFresh`; deduplication never blocks a record.
    pub fn decide(&self, record: &Record) -> (Decision, DecisionReason) {
        if self.has_complete_output(record) {
            return (Decision::Skip, DecisionReason::AlreadyPresent);
        }

        let Some(concept_id) = record.concept_id else {
            return (Decision::RunFresh, DecisionReason::NoConcept);
        };

        match self.concepts.get_concept(concept_id) {
            Ok(Some(concept)) if concept.has_analysis(self.kind) => (
                Decision::Copy {
                    concept_id,
                    source_record_id: concept.analysis_source(self.kind).to_string(),
                    primary_record_id: concept.primary_record_id,
                },
                DecisionReason::AnalysisAvailable(concept_id),
            ),
            Ok(Some(_)) => (Decision::RunFresh, DecisionReason::NotYetAnalyzed(concept_id)),
            Ok(None) => (Decision::RunFresh, DecisionReason::ConceptMissing(concept_id)),
            Err(e) => (
                Decision::RunFresh,
                DecisionReason::ConceptLookupFailed(e.to_string()),
            ),
        }
    }

    /// Load the stored output for this kind, re-keyed to `record`.
    ///
    /// Reads from the record the concept names as holding this kind's
    /// analysis, or from the primary when none is named.
    pub fn copy_from_primary(
        &self,
        record: &Record,
        concept_id: ConceptId,
    ) -> Result<EnrichmentResult, CopyError> {
        let concept = self
            .concepts
            .get_concept(concept_id)?
            .ok_or(CopyError::ConceptMissing(concept_id))?;
        let source_record_id = concept.analysis_source(self.kind).to_string();

        let source = self
            .store
            .load_record(&source_record_id)?
            .ok_or_else(|| CopyError::SourceMissing(source_record_id.clone()))?;

        let fields = self.output_of(&source);
        if fields.is_empty() {
            return Err(CopyError::OutputMissing(source_record_id));
        }

        debug!(
            record_id = %record.id,
            primary_record_id = %concept.primary_record_id,
            source_record_id = %source_record_id,
            kind = %self.kind,
            fields = fields.len(),
            "copied analysis from concept"
        );

        Ok(EnrichmentResult {
            kind: self.kind,
            fields,
            provenance: ResultProvenance::Copied {
                primary_record_id: concept.primary_record_id,
                source_record_id,
                concept_id,
            },
        })
    }

    /// The record's present output fields for this kind
    pub fn output_of(&self, record: &Record) -> FieldMap {
        self.output_fields
            .iter()
            .filter_map(|key| record.field(key).map(|v| (key.clone(), v.clone())))
            .collect()
    }

    fn has_complete_output(&self, record: &Record) -> bool {
        !self.output_fields.is_empty() && self.output_fields.iter().all(|key| record.has_field(key))
    }

    /// Count one finished call. Call exactly once per record.
    pub fn record_outcome(&self, outcome: Outcome) {
        self.stats.record(outcome);
    }

    pub fn statistics(&self) -> RunStatistics {
        self.stats.snapshot()
    }

    pub fn reset_statistics(&self) {
        self.stats.reset();
    }
}
