//! Per-record pipeline driver
//!
//! Records are processed one at a time: fetch, prefilter, concept resolution,
//! every service in configured order, persistence, concept metadata. Each
//! record is persisted before the next is fetched, and a concept is flagged
//! for a kind only after the record holding that analysis is stored, so a
//! later record copying from it always finds it.

use super::cancel::CancellationToken;
use super::prefilter::Prefilter;
use super::report::{RecordErrors, RunReport, ServiceReport};
use super::source::FetchSource;
use crate::concept::ConceptManager;
use crate::record::Record;
use crate::services::{ServiceFactory, ServiceSet};
use crate::storage::MergeStore;
use chrono::Utc;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Fetching,
    Filtering,
    Enriching,
    Persisting,
    Reporting,
}

/// Per-run knobs supplied by the caller
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop after this many fetched records
    pub limit: Option<usize>,
    pub cancel: CancellationToken,
}

impl RunOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Drives records through prefilter, services and persistence
pub struct PipelineOrchestrator {
    services: ServiceSet,
    concepts: ConceptManager,
    merge: MergeStore,
    prefilter: Prefilter,
    phase: Mutex<RunPhase>,
}

impl PipelineOrchestrator {
    pub fn new(
        services: ServiceSet,
        concepts: ConceptManager,
        merge: MergeStore,
        prefilter: Prefilter,
    ) -> Self {
        Self {
            services,
            concepts,
            merge,
            prefilter,
            phase: Mutex::new(RunPhase::Idle),
        }
    }

    /// Build services through the factory and wire the rest from its config
    pub fn from_factory(factory: &mut ServiceFactory) -> Self {
        let services = factory.create_services();
        let config = factory.config().clone();
        let merge = MergeStore::new(factory.store().clone())
            .with_required_fields(config.persistence.required_fields.clone());
        Self::new(
            services,
            factory.concepts().clone(),
            merge,
            Prefilter::new(config.prefilter.clone()),
        )
    }

    pub fn services(&self) -> &ServiceSet {
        &self.services
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: RunPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// Process records from `source` until it ends, the limit is reached or
    /// the run is cancelled. Never fails; problems are counted in the report.
    pub async fn run(
        &self,
        source: &mut (dyn FetchSource + Send),
        options: &RunOptions,
    ) -> RunReport {
        let clock = Instant::now();
        let mut report = RunReport::started(Utc::now());
        self.services.reset_statistics();
        info!(services = ?self.services.names(), limit = ?options.limit, "run started");

        loop {
            if options.cancel.is_cancelled() {
                info!(fetched = report.fetched, "run cancelled");
                report.cancelled = true;
                break;
            }
            if options.limit.is_some_and(|limit| report.fetched >= limit) {
                break;
            }

            self.set_phase(RunPhase::Fetching);
            let Some(mut record) = source.next_record() else {
                break;
            };
            report.fetched += 1;

            self.set_phase(RunPhase::Filtering);
            if let Err(rejection) = self.prefilter.check(&record) {
                debug!(record_id = %record.id, reason = %rejection, "filtered");
                report.filtered += 1;
                continue;
            }
            report.passed_prefilter += 1;

            self.set_phase(RunPhase::Enriching);
            self.resolve_concept(&mut record, &mut report);
            for service in self.services.iter() {
                service.enrich(&mut record).await;
            }

            self.set_phase(RunPhase::Persisting);
            self.persist(&mut record, &mut report);

            if !record.errors.is_empty() {
                report.record_errors.push(RecordErrors {
                    record_id: record.id.clone(),
                    errors: std::mem::take(&mut record.errors),
                });
            }
        }

        self.set_phase(RunPhase::Reporting);
        report.services = self
            .services
            .iter()
            .map(|s| ServiceReport::from_service(s.as_ref()))
            .collect();
        report.total_cost_saved = report
            .services
            .iter()
            .filter(|s| s.deduplicating)
            .map(|s| s.cost_saved)
            .sum();
        report.finished_at = Utc::now();
        report.duration_ms = clock.elapsed().as_millis() as u64;

        info!(
            fetched = report.fetched,
            passed_prefilter = report.passed_prefilter,
            persisted = report.persisted,
            failed_persistence = report.failed_persistence,
            cost_saved = report.total_cost_saved,
            duration_ms = report.duration_ms,
            "run finished"
        );
        self.set_phase(RunPhase::Idle);
        report
    }

    /// Attach the record's concept. Failure leaves the record without one;
    /// every service then analyzes it fresh.
    fn resolve_concept(&self, record: &mut Record, report: &mut RunReport) {
        match self.concepts.resolve_or_create(record) {
            Ok(Some(resolution)) => {
                record.concept_id = Some(resolution.concept_id);
                if resolution.is_new {
                    report.concepts_created += 1;
                } else {
                    report.concepts_reused += 1;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "concept resolution failed");
                record.push_error(format!("concept resolution failed: {}", e));
            }
        }
    }

    fn persist(&self, record: &mut Record, report: &mut RunReport) {
        match self.merge.write(std::slice::from_ref(record)) {
            Ok(summary) if summary.written > 0 => {
                report.persisted += 1;
                self.update_concept(record);
            }
            Ok(_) => {
                let missing = self.merge.missing_fields(record);
                warn!(record_id = %record.id, missing = ?missing, "record not persisted");
                record.push_error(format!("not persisted: missing {}", missing.join(", ")));
                report.skipped_persistence += 1;
            }
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "persistence failed");
                record.push_error(format!("persistence failed: {}", e));
                report.failed_persistence += 1;
            }
        }
    }

    /// Flag the concept for analyses this stored record completed, naming it
    /// as their holder, and refresh the concept. Both are idempotent.
    fn update_concept(&self, record: &Record) {
        let Some(concept_id) = record.concept_id else {
            return;
        };
        for kind in &record.completed_analyses {
            if let Err(e) = self.concepts.mark_analysis_complete(concept_id, *kind, &record.id) {
                warn!(record_id = %record.id, concept_id = %concept_id, kind = %kind, error = %e, "failed to mark concept");
            }
        }
        if let Err(e) = self.concepts.touch(concept_id) {
            warn!(record_id = %record.id, concept_id = %concept_id, error = %e, "failed to touch concept");
        }
    }
}
