//! The enrichment service interface

use crate::concept::AnalysisKind;
use crate::dedup::RunStatistics;
use crate::record::{FieldMap, Record};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The enrichment capabilities the pipeline knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Profiler,
    OpportunityScoring,
    Monetization,
    TrustValidation,
    MarketValidation,
}

impl ServiceKind {
    /// Default pipeline order
    pub const ALL: [ServiceKind; 5] = [
        ServiceKind::Profiler,
        ServiceKind::OpportunityScoring,
        ServiceKind::Monetization,
        ServiceKind::TrustValidation,
        ServiceKind::MarketValidation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profiler => "profiler",
            Self::OpportunityScoring => "opportunity_scoring",
            Self::Monetization => "monetization",
            Self::TrustValidation => "trust_validation",
            Self::MarketValidation => "market_validation",
        }
    }

    /// The concept flag this service deduplicates on; `None` for rule-based
    /// services
    pub fn analysis_kind(&self) -> Option<AnalysisKind> {
        match self {
            Self::Profiler => Some(AnalysisKind::Profiler),
            Self::Monetization => Some(AnalysisKind::Monetization),
            Self::MarketValidation => Some(AnalysisKind::MarketValidation),
            Self::OpportunityScoring | Self::TrustValidation => None,
        }
    }

    /// Whether the service needs an external provider
    pub fn needs_provider(&self) -> bool {
        self.analysis_kind().is_some()
    }

    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Profiler | Self::Monetization => &["title", "body"],
            Self::OpportunityScoring => &["title"],
            Self::TrustValidation => &["id", "author"],
            Self::MarketValidation => &["title", "app_concept"],
        }
    }

    pub fn default_output_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Profiler => &[
                "problem_description",
                "app_concept",
                "core_functions",
                "target_user",
                "value_proposition",
            ],
            Self::OpportunityScoring => &["opportunity_score", "opportunity_tier", "score_breakdown"],
            Self::Monetization => &[
                "willingness_to_pay_score",
                "customer_segment",
                "revenue_model",
                "price_points",
                "monetization_score",
            ],
            Self::TrustValidation => &["trust_score", "trust_level", "trust_badges"],
            Self::MarketValidation => &[
                "market_validation_score",
                "competitor_count",
                "market_size_estimate",
                "validation_evidence",
            ],
        }
    }

    /// Estimated provider spend per call, used for savings reporting
    pub fn default_unit_cost(&self) -> f64 {
        match self {
            Self::Profiler => 0.05,
            Self::Monetization => 0.03,
            Self::MarketValidation => 0.08,
            Self::OpportunityScoring | Self::TrustValidation => 0.0,
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of checking a record's required fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputValidation {
    pub missing: Vec<String>,
}

impl InputValidation {
    /// Collect the keys in `required` that `record` lacks
    pub fn check(record: &Record, required: &[String]) -> Self {
        Self {
            missing: required
                .iter()
                .filter(|key| record.value_of(key).is_none())
                .cloned()
                .collect(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
    }
}

/// One pluggable enrichment stage
///
/// `enrich` never fails: failures are logged, counted as errors, appended to
/// `record.errors`, and reported as an empty bag so the pipeline can continue
/// with partial enrichment.
#[async_trait]
pub trait EnrichmentService: Send + Sync {
    /// Stable identifier used in statistics and reports
    fn service_name(&self) -> &str;

    /// Check required fields before any provider is called
    fn validate_input(&self, record: &Record) -> InputValidation;

    /// Enrich the record in place and return the fields it gained
    async fn enrich(&self, record: &mut Record) -> FieldMap;

    fn statistics(&self) -> RunStatistics;

    fn reset_statistics(&self);

    /// Whether the service consults a deduplication engine
    fn is_deduplicating(&self) -> bool {
        false
    }

    /// Whether this is a stand-in for a service that could not be built
    fn is_degraded(&self) -> bool {
        false
    }
}

/// Services of one run, in execution order
#[derive(Default, Clone)]
pub struct ServiceSet {
    services: Vec<Arc<dyn EnrichmentService>>,
}

impl ServiceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a service; later services see earlier services' output
    pub fn push(&mut self, service: Arc<dyn EnrichmentService>) {
        self.services.push(service);
    }

    pub fn get_service(&self, name: &str) -> Option<Arc<dyn EnrichmentService>> {
        self.services
            .iter()
            .find(|s| s.service_name() == name)
            .cloned()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.service_name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn EnrichmentService>> {
        self.services.iter()
    }

    pub fn reset_statistics(&self) {
        for service in &self.services {
            service.reset_statistics();
        }
    }
}
