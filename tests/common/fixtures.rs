//! Record builders and scripted pipelines

use sift::config::{PipelineConfig, ProviderConfig, ServiceConfig};
use sift::{
    EnrichmentStore, FieldMap, FieldValue, MockProvider, PipelineOrchestrator, ProviderCatalog,
    ProviderError, Record, ServiceFactory, ServiceKind,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Provider-backed kinds, in pipeline order
pub const DEDUP_KINDS: [ServiceKind; 3] = [
    ServiceKind::Profiler,
    ServiceKind::Monetization,
    ServiceKind::MarketValidation,
];

/// A post that passes every service's input validation
pub fn post(id: &str, title: &str) -> Record {
    Record::new(id, title)
        .with_body(format!("I keep wishing someone would build {}", title))
        .with_author(format!("user_{}", id))
        .with_source("SomebodyMakeThis")
        .with_engagement(25, 6)
}

/// Provider answering every declared output field of `kind` with text
/// derived from the record title. Fails for ids in `fail_ids`.
pub fn scripted_provider(kind: ServiceKind, fail_ids: &[&str]) -> MockProvider {
    let fail: HashSet<String> = fail_ids.iter().map(|s| s.to_string()).collect();
    MockProvider::new(provider_name(kind)).with_responder(move |input| {
        let id = input.get("id").and_then(|v| v.as_str()).unwrap_or_default();
        if fail.contains(id) {
            return Err(ProviderError::InvocationFailed(format!("scripted failure for {}", id)));
        }
        let title = input.get("title").and_then(|v| v.as_str()).unwrap_or_default();
        let mut out = FieldMap::new();
        for key in kind.default_output_fields() {
            out.insert(key.to_string(), FieldValue::from(format!("{} for {}", key, title)));
        }
        Ok(out)
    })
}

fn provider_name(kind: ServiceKind) -> String {
    format!("{}-provider", kind)
}

/// Everything a pipeline test needs to inspect after a run
pub struct PipelineHarness {
    pub orchestrator: PipelineOrchestrator,
    pub providers: Vec<(ServiceKind, Arc<MockProvider>)>,
}

impl PipelineHarness {
    pub fn provider(&self, kind: ServiceKind) -> &MockProvider {
        self.providers
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, p)| p.as_ref())
            .expect("provider registered")
    }
}

/// All five services; the three provider-backed ones use scripted providers
/// that fail for `fail_ids`.
pub fn dedup_pipeline(store: Arc<dyn EnrichmentStore>, fail_ids: &[&str]) -> PipelineHarness {
    let mut catalog = ProviderCatalog::new();
    let mut providers = Vec::new();
    for kind in DEDUP_KINDS {
        let provider = Arc::new(scripted_provider(kind, fail_ids));
        catalog.register(provider.clone());
        providers.push((kind, provider));
    }

    let services = ServiceKind::ALL
        .into_iter()
        .map(|kind| {
            let service = ServiceConfig::new(kind);
            if kind.needs_provider() {
                service.with_provider(ProviderConfig::Named {
                    name: provider_name(kind),
                })
            } else {
                service
            }
        })
        .collect();

    let config = PipelineConfig {
        services,
        ..PipelineConfig::default()
    };
    let mut factory = ServiceFactory::new(Arc::new(config), store, catalog);
    PipelineHarness {
        orchestrator: PipelineOrchestrator::from_factory(&mut factory),
        providers,
    }
}
