//! Rule-based services: local, zero-cost, never deduplicated

use super::traits::{EnrichmentService, InputValidation, ServiceKind};
use super::ServiceError;
use crate::dedup::{Outcome, RunStatistics, StatsCounter};
use crate::record::{FieldMap, Record};
use async_trait::async_trait;
use tracing::warn;

/// A deterministic scoring function over one record
pub type Rule = fn(&Record) -> FieldMap;

/// Service wrapping a local rule
pub struct RuleService {
    kind: ServiceKind,
    rule: Rule,
    required_fields: Vec<String>,
    stats: StatsCounter,
}

impl RuleService {
    pub fn new(kind: ServiceKind, rule: Rule) -> Self {
        Self {
            kind,
            rule,
            required_fields: kind.required_fields().iter().map(|s| s.to_string()).collect(),
            stats: StatsCounter::new(kind.default_unit_cost()),
        }
    }

    /// The built-in rule for `kind`; `None` for provider-backed kinds
    pub fn for_kind(kind: ServiceKind) -> Option<Self> {
        let rule: Rule = match kind {
            ServiceKind::OpportunityScoring => super::scoring::score_opportunity,
            ServiceKind::TrustValidation => super::trust::validate_trust,
            ServiceKind::Profiler | ServiceKind::Monetization | ServiceKind::MarketValidation => {
                return None
            }
        };
        Some(Self::new(kind, rule))
    }
}

#[async_trait]
impl EnrichmentService for RuleService {
    fn service_name(&self) -> &str {
        self.kind.as_str()
    }

    fn validate_input(&self, record: &Record) -> InputValidation {
        InputValidation::check(record, &self.required_fields)
    }

    async fn enrich(&self, record: &mut Record) -> FieldMap {
        let validation = self.validate_input(record);
        if !validation.is_valid() {
            let error = ServiceError::InvalidInput(validation.missing);
            warn!(record_id = %record.id, service = self.kind.as_str(), error = %error, "enrichment refused");
            record.push_error(format!("{}: {}", self.kind, error));
            self.stats.record(Outcome::Error);
            return FieldMap::new();
        }

        let fields = (self.rule)(record);
        record.merge_fields(&fields);
        self.stats.record(Outcome::Fresh);
        fields
    }

    fn statistics(&self) -> RunStatistics {
        self.stats.snapshot()
    }

    fn reset_statistics(&self) {
        self.stats.reset();
    }
}
