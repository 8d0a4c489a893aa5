//! Composition root for enrichment services

use super::analysis::AnalysisService;
use super::noop::NoopService;
use super::rules::RuleService;
use super::traits::{EnrichmentService, ServiceSet};
use crate::concept::ConceptManager;
use crate::config::{PipelineConfig, ProviderConfig, ServiceConfig};
use crate::dedup::DeduplicationEngine;
use crate::provider::{AnalysisProvider, CommandProvider, ProviderCatalog, ProviderError};
use crate::storage::EnrichmentStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Builds the configured services and their dependencies.
///
/// Every deduplicating service gets its own engine, all wired to one shared
/// `ConceptManager`. A service whose provider cannot be built is replaced by
/// a `NoopService`; construction never fails.
pub struct ServiceFactory {
    config: Arc<PipelineConfig>,
    store: Arc<dyn EnrichmentStore>,
    concepts: ConceptManager,
    catalog: ProviderCatalog,
    services: ServiceSet,
}

impl ServiceFactory {
    pub fn new(
        config: Arc<PipelineConfig>,
        store: Arc<dyn EnrichmentStore>,
        catalog: ProviderCatalog,
    ) -> Self {
        let concepts = ConceptManager::new(store.clone());
        Self {
            config,
            store,
            concepts,
            catalog,
            services: ServiceSet::new(),
        }
    }

    /// Build every enabled service in configured order.
    ///
    /// Replaces any previously created set.
    pub fn create_services(&mut self) -> ServiceSet {
        let mut services = ServiceSet::new();
        for service_config in self.config.enabled_services() {
            services.push(self.build(service_config));
        }
        info!(
            services = ?services.names(),
            degraded = services.iter().filter(|s| s.is_degraded()).count(),
            "services created"
        );
        self.services = services.clone();
        services
    }

    pub fn get_service(&self, name: &str) -> Option<Arc<dyn EnrichmentService>> {
        self.services.get_service(name)
    }

    pub fn service_count(&self) -> usize {
        self.services.service_count()
    }

    /// The concept manager shared by all deduplicating services
    pub fn concepts(&self) -> &ConceptManager {
        &self.concepts
    }

    pub fn store(&self) -> &Arc<dyn EnrichmentStore> {
        &self.store
    }

    pub fn config(&self) -> &Arc<PipelineConfig> {
        &self.config
    }

    fn build(&self, config: &ServiceConfig) -> Arc<dyn EnrichmentService> {
        let kind = config.kind;
        if let Some(service) = RuleService::for_kind(kind) {
            return Arc::new(service);
        }
        let Some(analysis) = kind.analysis_kind() else {
            return Arc::new(NoopService::new(kind, "no implementation for this kind"));
        };

        match self.resolve_provider(config) {
            Ok(provider) => {
                let engine = DeduplicationEngine::new(
                    analysis,
                    self.concepts.clone(),
                    self.store.clone(),
                    config.output_fields(),
                    config.unit_cost(),
                );
                Arc::new(AnalysisService::new(kind, provider, engine, config.timeout()))
            }
            Err(e) => {
                warn!(service = kind.as_str(), error = %e, "provider unavailable, using no-op stand-in");
                Arc::new(NoopService::new(kind, e.to_string()))
            }
        }
    }

    fn resolve_provider(
        &self,
        config: &ServiceConfig,
    ) -> Result<Arc<dyn AnalysisProvider>, ProviderError> {
        match &config.provider {
            None => Err(ProviderError::Unavailable("no provider configured".to_string())),
            Some(ProviderConfig::Command { program, args }) => Ok(Arc::new(CommandProvider::new(
                config.kind.as_str(),
                program,
                args.clone(),
            )?)),
            Some(ProviderConfig::Named { name }) => self.catalog.get(name).ok_or_else(|| {
                ProviderError::Unavailable(format!("provider '{}' not registered", name))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use crate::services::ServiceKind;
    use crate::storage::MemoryStore;

    fn factory(config: PipelineConfig, catalog: ProviderCatalog) -> ServiceFactory {
        ServiceFactory::new(Arc::new(config), Arc::new(MemoryStore::new()), catalog)
    }

    fn named(kind: ServiceKind, name: &str) -> ServiceConfig {
        ServiceConfig::new(kind).with_provider(ProviderConfig::Named { name: name.into() })
    }

    #[test]
    fn builds_enabled_services_in_order() {
        let config = PipelineConfig {
            services: vec![
                named(ServiceKind::Monetization, "pricing"),
                ServiceConfig::new(ServiceKind::TrustValidation),
                named(ServiceKind::Profiler, "profile").disabled(),
                ServiceConfig::new(ServiceKind::OpportunityScoring),
            ],
            ..PipelineConfig::default()
        };
        let catalog = ProviderCatalog::new().with(Arc::new(MockProvider::new("pricing")));
        let mut factory = factory(config, catalog);
        let services = factory.create_services();

        assert_eq!(
            services.names(),
            vec!["monetization", "trust_validation", "opportunity_scoring"]
        );
        assert_eq!(factory.service_count(), 3);
        assert!(factory.get_service("profiler").is_none());

        let monetization = factory.get_service("monetization").unwrap();
        assert!(monetization.is_deduplicating());
        assert!(!monetization.is_degraded());
        assert!(!factory.get_service("trust_validation").unwrap().is_deduplicating());
    }

    #[test]
    fn missing_providers_degrade_to_noop() {
        let config = PipelineConfig {
            services: vec![
                ServiceConfig::new(ServiceKind::Profiler),
                named(ServiceKind::Monetization, "unregistered"),
                ServiceConfig::new(ServiceKind::MarketValidation).with_provider(
                    ProviderConfig::Command {
                        program: "no-such-analysis-tool-b41c".into(),
                        args: vec![],
                    },
                ),
            ],
            ..PipelineConfig::default()
        };
        let mut factory = factory(config, ProviderCatalog::new());
        let services = factory.create_services();

        assert_eq!(services.service_count(), 3);
        assert!(services.iter().all(|s| s.is_degraded()));
    }

    #[test]
    fn default_config_builds_all_five() {
        let mut factory = factory(PipelineConfig::default(), ProviderCatalog::new());
        factory.create_services();
        assert_eq!(factory.service_count(), 5);
        assert!(!factory.get_service("opportunity_scoring").unwrap().is_degraded());
        assert!(factory.get_service("profiler").unwrap().is_degraded());
    }
}
