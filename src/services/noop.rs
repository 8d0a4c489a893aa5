//! Stand-in for a service whose dependencies could not be built

use super::traits::{EnrichmentService, InputValidation, ServiceKind};
use crate::dedup::{Outcome, RunStatistics, StatsCounter};
use crate::record::{FieldMap, Record};
use async_trait::async_trait;
use tracing::debug;

/// Returns an empty bag for every record and counts each call as an error,
/// so reports show how much enrichment the missing dependency cost.
pub struct NoopService {
    kind: ServiceKind,
    reason: String,
    stats: StatsCounter,
}

impl NoopService {
    pub fn new(kind: ServiceKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            stats: StatsCounter::new(0.0),
        }
    }

    /// Why the real service is unavailable
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl EnrichmentService for NoopService {
    fn service_name(&self) -> &str {
        self.kind.as_str()
    }

    fn validate_input(&self, _record: &Record) -> InputValidation {
        InputValidation::default()
    }

    async fn enrich(&self, record: &mut Record) -> FieldMap {
        debug!(record_id = %record.id, service = self.kind.as_str(), reason = %self.reason, "no-op service");
        self.stats.record(Outcome::Error);
        FieldMap::new()
    }

    fn statistics(&self) -> RunStatistics {
        self.stats.snapshot()
    }

    fn reset_statistics(&self) {
        self.stats.reset();
    }

    fn is_degraded(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_empty_and_leaves_record_alone() {
        let service = NoopService::new(ServiceKind::Monetization, "no provider configured");
        let mut record = Record::new("r1", "x").with_field("kept", 1i64);
        let before = record.clone();

        assert!(service.enrich(&mut record).await.is_empty());
        assert_eq!(record, before);
        assert!(service.is_degraded());
        assert_eq!(service.service_name(), "monetization");
        assert_eq!(service.statistics().errors, 1);
        assert_eq!(service.reason(), "no provider configured");
    }
}
