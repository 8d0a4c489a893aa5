//! Provider-backed services with concept deduplication
//!
//! Profiling, monetization analysis and market validation share this
//! implementation; they differ in their analysis kind, required fields,
//! output fields and unit cost.

use super::traits::{EnrichmentService, InputValidation, ServiceKind};
use super::ServiceError;
use crate::concept::AnalysisKind;
use crate::dedup::{Decision, DeduplicationEngine, Outcome, RunStatistics};
use crate::provider::{AnalysisProvider, ProviderError};
use crate::record::{FieldMap, Record};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A paid analysis guarded by a deduplication engine
pub struct AnalysisService {
    kind: ServiceKind,
    analysis: AnalysisKind,
    provider: Arc<dyn AnalysisProvider>,
    engine: DeduplicationEngine,
    required_fields: Vec<String>,
    timeout: Duration,
}

impl AnalysisService {
    /// `engine` decides fresh versus copy; its kind must match `kind`.
    pub fn new(
        kind: ServiceKind,
        provider: Arc<dyn AnalysisProvider>,
        engine: DeduplicationEngine,
        timeout: Duration,
    ) -> Self {
        Self {
            kind,
            analysis: engine.kind(),
            provider,
            engine,
            required_fields: kind.required_fields().iter().map(|s| s.to_string()).collect(),
            timeout,
        }
    }

    pub fn engine(&self) -> &DeduplicationEngine {
        &self.engine
    }

    async fn analyze_fresh(&self, record: &Record) -> Result<FieldMap, ServiceError> {
        let validation = self.validate_input(record);
        if !validation.is_valid() {
            return Err(ServiceError::InvalidInput(validation.missing));
        }

        let input = record.provider_input();
        let output = match tokio::time::timeout(self.timeout, self.provider.analyze(&input)).await {
            Ok(result) => result?,
            Err(_) => return Err(ProviderError::Timeout(self.timeout).into()),
        };

        let fields: FieldMap = self
            .engine
            .output_fields()
            .iter()
            .filter_map(|key| {
                output
                    .get(key)
                    .filter(|v| !v.is_null())
                    .map(|v| (key.clone(), v.clone()))
            })
            .collect();

        if fields.is_empty() {
            return Err(ProviderError::Parse(format!(
                "{} returned none of the expected fields",
                self.provider.name()
            ))
            .into());
        }
        Ok(fields)
    }
}

#[async_trait]
impl EnrichmentService for AnalysisService {
    fn service_name(&self) -> &str {
        self.kind.as_str()
    }

    fn validate_input(&self, record: &Record) -> InputValidation {
        InputValidation::check(record, &self.required_fields)
    }

    async fn enrich(&self, record: &mut Record) -> FieldMap {
        let service = self.kind.as_str();
        let (decision, reason) = self.engine.decide(record);
        let mut fallback = false;

        match decision {
            Decision::Skip => {
                debug!(record_id = %record.id, service, %reason, "skipping");
                self.engine.record_outcome(Outcome::Skipped);
                return self.engine.output_of(record);
            }
            Decision::Copy {
                concept_id,
                source_record_id,
                ..
            } => match self.engine.copy_from_primary(record, concept_id) {
                Ok(result) => {
                    let fields = result.fields_for(record);
                    record.merge_fields(&fields);
                    self.engine.record_outcome(Outcome::Copied);
                    return fields;
                }
                Err(e) => {
                    warn!(
                        record_id = %record.id,
                        service,
                        source_record_id = %source_record_id,
                        error = %e,
                        "copy from concept failed, analyzing fresh"
                    );
                    record.push_error(format!("{}: copy failed: {}", service, e));
                    fallback = true;
                }
            },
            Decision::RunFresh => {
                debug!(record_id = %record.id, service, %reason, "analyzing fresh");
            }
        }

        match self.analyze_fresh(record).await {
            Ok(fields) => {
                record.merge_fields(&fields);
                if fallback {
                    // The copy decision already failed; it never counts as fresh.
                    self.engine.record_outcome(Outcome::Error);
                } else {
                    // The concept flag is set once this record is persisted.
                    self.engine.record_outcome(Outcome::Fresh);
                    record.completed_analyses.push(self.analysis);
                }
                fields
            }
            Err(e) => {
                warn!(record_id = %record.id, service, error = %e, "enrichment failed");
                record.push_error(format!("{}: {}", service, e));
                self.engine.record_outcome(Outcome::Error);
                FieldMap::new()
            }
        }
    }

    fn statistics(&self) -> RunStatistics {
        self.engine.statistics()
    }

    fn reset_statistics(&self) {
        self.engine.reset_statistics();
    }

    fn is_deduplicating(&self) -> bool {
        true
    }
}
