//! Enrichment services
//!
//! Each service wraps one analysis capability behind `EnrichmentService`.
//! Provider-backed services consult a `DeduplicationEngine` before paying for
//! a provider call; rule-based services run locally every time.

mod analysis;
mod factory;
mod noop;
mod rules;
mod scoring;
mod traits;
mod trust;

pub use analysis::AnalysisService;
pub use factory::ServiceFactory;
pub use noop::NoopService;
pub use rules::{Rule, RuleService};
pub use scoring::score_opportunity;
pub use traits::{EnrichmentService, InputValidation, ServiceKind, ServiceSet};
pub use trust::validate_trust;

use crate::provider::ProviderError;

/// Why a service produced nothing for a record
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("missing required fields: {}", .0.join(", "))]
    InvalidInput(Vec<String>),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
