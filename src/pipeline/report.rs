//! Run reports

use crate::dedup::RunStatistics;
use crate::services::EnrichmentService;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One service's share of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceReport {
    pub name: String,
    pub deduplicating: bool,
    /// The service is a no-op stand-in
    pub degraded: bool,
    pub statistics: RunStatistics,
    pub cost_saved: f64,
}

impl ServiceReport {
    pub fn from_service(service: &dyn EnrichmentService) -> Self {
        let statistics = service.statistics();
        Self {
            name: service.service_name().to_string(),
            deduplicating: service.is_deduplicating(),
            degraded: service.is_degraded(),
            cost_saved: statistics.cost_saved(),
            statistics,
        }
    }
}

/// Errors collected for one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordErrors {
    pub record_id: String,
    pub errors: Vec<String>,
}

/// Aggregate outcome of one orchestrator run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,

    pub fetched: usize,
    pub passed_prefilter: usize,
    pub filtered: usize,

    pub concepts_created: usize,
    pub concepts_reused: usize,

    /// In execution order
    pub services: Vec<ServiceReport>,

    pub persisted: usize,
    pub failed_persistence: usize,
    /// Records refused by persistence validation
    pub skipped_persistence: usize,

    /// Summed over deduplicating services
    pub total_cost_saved: f64,

    pub record_errors: Vec<RecordErrors>,
    /// The run stopped on a cancellation request
    pub cancelled: bool,
}

impl RunReport {
    pub(crate) fn started(at: DateTime<Utc>) -> Self {
        Self {
            started_at: at,
            finished_at: at,
            duration_ms: 0,
            fetched: 0,
            passed_prefilter: 0,
            filtered: 0,
            concepts_created: 0,
            concepts_reused: 0,
            services: Vec::new(),
            persisted: 0,
            failed_persistence: 0,
            skipped_persistence: 0,
            total_cost_saved: 0.0,
            record_errors: Vec::new(),
            cancelled: false,
        }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceReport> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Records with at least one error
    pub fn records_with_errors(&self) -> usize {
        self.record_errors.len()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "fetched {} | passed prefilter {} | filtered {}{}",
            self.fetched,
            self.passed_prefilter,
            self.filtered,
            if self.cancelled { " | cancelled" } else { "" }
        )?;
        writeln!(
            f,
            "concepts: {} new, {} reused",
            self.concepts_created, self.concepts_reused
        )?;
        for service in &self.services {
            let s = &service.statistics;
            writeln!(
                f,
                "  {:<20} fresh {:>5}  skipped {:>5}  copied {:>5}  errors {:>5}  saved ${:.2}{}",
                service.name,
                s.analyzed,
                s.skipped,
                s.copied,
                s.errors,
                service.cost_saved,
                if service.degraded { "  (degraded)" } else { "" }
            )?;
        }
        writeln!(
            f,
            "persisted {} | failed {} | skipped {}",
            self.persisted, self.failed_persistence, self.skipped_persistence
        )?;
        write!(
            f,
            "total saved ${:.2} in {} ms",
            self.total_cost_saved, self.duration_ms
        )
    }
}
