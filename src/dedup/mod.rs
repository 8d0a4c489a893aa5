//! Deduplication: deciding when an expensive analysis can be reused

mod engine;
mod stats;

pub use engine::{
    analysis_record_marker, concept_marker, copied_marker, primary_record_marker, CopyError, Decision, DecisionReason,
    DeduplicationEngine, EnrichmentResult, ResultProvenance,
};
pub use stats::{Outcome, RunStatistics, StatsCounter};
