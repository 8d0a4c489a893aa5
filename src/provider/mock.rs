//! Scripted provider for tests and dry runs

use super::{AnalysisProvider, ProviderError};
use crate::record::FieldMap;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Responder = Arc<dyn Fn(&FieldMap) -> Result<FieldMap, ProviderError> + Send + Sync>;

/// Mock provider: returns preconfigured output and counts calls.
pub struct MockProvider {
    name: String,
    available: bool,
    responder: Responder,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Available provider that returns an empty bag
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: true,
            responder: Arc::new(|_| Ok(FieldMap::new())),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Provider that fails every call as unavailable
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self {
            available: false,
            ..Self::new(name)
        }
    }

    /// Return `output` for every call
    pub fn with_output(mut self, output: FieldMap) -> Self {
        self.responder = Arc::new(move |_| Ok(output.clone()));
        self
    }

    /// Fail every call with an invocation error
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.responder = Arc::new(move |_| Err(ProviderError::InvocationFailed(message.clone())));
        self
    }

    /// Compute output from the input
    pub fn with_responder(
        mut self,
        responder: impl Fn(&FieldMap) -> Result<FieldMap, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        self.responder = Arc::new(responder);
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `analyze` calls so far, including failed ones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, input: &FieldMap) -> Result<FieldMap, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(ProviderError::Unavailable(
                "mock provider configured as unavailable".to_string(),
            ));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(input)
    }
}
