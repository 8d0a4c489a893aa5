//! External analysis providers
//!
//! A provider is a black box that turns a record's input fields into output
//! fields. Services call providers; providers know nothing about concepts or
//! deduplication. Two implementations ship with the crate:
//! - `CommandProvider`: runs a child process, JSON over stdin/stdout
//! - `MockProvider`: scripted responses (tests and dry runs)

mod command;
mod mock;

pub use command::CommandProvider;
pub use mock::MockProvider;

use crate::record::FieldMap;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Errors from provider calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("provider not available: {0}")]
    Unavailable(String),
    #[error("invocation failed: {0}")]
    InvocationFailed(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("response parse error: {0}")]
    Parse(String),
}

/// One external analysis capability.
///
/// Abstracts over transport (subprocess, HTTP, mock) so services don't depend
/// on how the analysis is reached.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Stable name, used in logs
    fn name(&self) -> &str;

    /// Analyze one record's input fields.
    async fn analyze(&self, input: &FieldMap) -> Result<FieldMap, ProviderError>;
}

/// Named providers available to the service factory
#[derive(Default, Clone)]
pub struct ProviderCatalog {
    providers: HashMap<String, Arc<dyn AnalysisProvider>>,
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own name
    pub fn register(&mut self, provider: Arc<dyn AnalysisProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn with(mut self, provider: Arc<dyn AnalysisProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AnalysisProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
