//! Pipeline configuration
//!
//! One immutable `PipelineConfig` is loaded from YAML and handed to the
//! service factory and the orchestrator. Every section has defaults, so an
//! empty document is a valid configuration.
//!
//! ```yaml
//! services:
//!   - kind: profiler
//!     provider: { type: command, program: profile-post, args: ["--json"] }
//!     timeout_secs: 30
//!   - kind: opportunity_scoring
//!   - kind: monetization
//!     provider: { type: named, name: pricing }
//!     unit_cost: 0.02
//! prefilter:
//!   min_score: 5
//!   excluded_keywords: ["[meta]"]
//! store:
//!   path: /var/lib/sift/sift.db
//! persistence:
//!   batch_size: 50
//! ```

use crate::services::ServiceKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Services in execution order
    pub services: Vec<ServiceConfig>,
    pub prefilter: PrefilterConfig,
    pub store: StoreConfig,
    pub persistence: PersistenceConfig,
}

/// All five services, enabled, with no providers configured
impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            services: ServiceKind::ALL.into_iter().map(ServiceConfig::new).collect(),
            prefilter: PrefilterConfig::default(),
            store: StoreConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for service in &self.services {
            if !seen.insert(service.kind) {
                return Err(ConfigError::Invalid(format!(
                    "service '{}' configured more than once",
                    service.kind
                )));
            }
            if let Some(cost) = service.unit_cost {
                if !cost.is_finite() || cost < 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "service '{}' has invalid unit_cost {}",
                        service.kind, cost
                    )));
                }
            }
            if service.timeout_secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "service '{}' timeout_secs must be positive",
                    service.kind
                )));
            }
            if service.output_fields.is_some() && !service.kind.needs_provider() {
                return Err(ConfigError::Invalid(format!(
                    "service '{}' is rule-based; its output_fields are fixed",
                    service.kind
                )));
            }
            if matches!(&service.output_fields, Some(fields) if fields.is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "service '{}' output_fields must not be empty",
                    service.kind
                )));
            }
        }
        if self.persistence.batch_size == 0 {
            return Err(ConfigError::Invalid("persistence.batch_size must be positive".into()));
        }
        Ok(())
    }

    /// Enabled services in configured order
    pub fn enabled_services(&self) -> impl Iterator<Item = &ServiceConfig> {
        self.services.iter().filter(|s| s.enabled)
    }
}

/// One enrichment stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub kind: ServiceKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Required for provider-backed kinds; ignored by rule-based ones
    #[serde(default)]
    pub provider: Option<ProviderConfig>,
    /// Overrides the kind's default cost per provider call
    #[serde(default)]
    pub unit_cost: Option<f64>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Overrides the kind's default output fields. Provider-backed kinds
    /// only; rule-based kinds always write their fixed fields.
    #[serde(default)]
    pub output_fields: Option<Vec<String>>,
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

impl ServiceConfig {
    pub fn new(kind: ServiceKind) -> Self {
        Self {
            kind,
            enabled: true,
            provider: None,
            unit_cost: None,
            timeout_secs: default_timeout_secs(),
            output_fields: None,
        }
    }

    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn unit_cost(&self) -> f64 {
        self.unit_cost.unwrap_or_else(|| self.kind.default_unit_cost())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn output_fields(&self) -> Vec<String> {
        match &self.output_fields {
            Some(fields) => fields.clone(),
            None => self
                .kind
                .default_output_fields()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// How a service reaches its provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Child process speaking JSON on stdin/stdout
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Provider registered in the catalog under this name
    Named { name: String },
}

/// Cheap local checks applied before any service runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefilterConfig {
    pub min_score: i64,
    pub min_comments: i64,
    /// Minimum characters of title plus body
    pub min_text_length: usize,
    /// At least one must appear (case-insensitive); empty means no check
    pub required_keywords: Vec<String>,
    /// None may appear (case-insensitive)
    pub excluded_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path; the user data directory when absent
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
        }
    }
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Configured path, else `<data dir>/sift/sift.db`
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sift")
                .join("sift.db")
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Records per write when importing; pipeline runs write one record at a
    /// time
    pub batch_size: usize,
    /// Field keys a record must carry to be written, beyond id and title
    pub required_fields: Vec<String>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            required_fields: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_enables_every_service() {
        let config = PipelineConfig::from_yaml_str("").unwrap();
        let kinds: Vec<_> = config.enabled_services().map(|s| s.kind).collect();
        assert_eq!(kinds, ServiceKind::ALL.to_vec());
        assert_eq!(config.persistence.batch_size, 100);
        assert_eq!(config.store.busy_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn parses_full_document() {
        let yaml = r#"
services:
  - kind: profiler
    provider: { type: command, program: profile-post, args: ["--json"] }
    timeout_secs: 30
  - kind: trust_validation
    enabled: false
  - kind: monetization
    provider: { type: named, name: pricing }
    unit_cost: 0.02
    output_fields: [revenue_model]
prefilter:
  min_score: 5
  excluded_keywords: ["[meta]"]
store:
  path: /tmp/sift.db
persistence:
  batch_size: 50
  required_fields: [opportunity_score]
"#;
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.services.len(), 3);
        assert_eq!(
            config.services[0].provider,
            Some(ProviderConfig::Command {
                program: "profile-post".into(),
                args: vec!["--json".into()],
            })
        );
        assert_eq!(config.services[0].timeout(), Duration::from_secs(30));
        assert_eq!(config.services[0].unit_cost(), 0.05);
        assert!(!config.services[1].enabled);
        assert_eq!(config.services[2].unit_cost(), 0.02);
        assert_eq!(config.services[2].output_fields(), vec!["revenue_model".to_string()]);
        assert_eq!(config.enabled_services().count(), 2);
        assert_eq!(config.prefilter.min_score, 5);
        assert_eq!(config.store.resolved_path(), PathBuf::from("/tmp/sift.db"));
        assert_eq!(config.persistence.required_fields, vec!["opportunity_score".to_string()]);
    }

    #[test]
    fn rejects_duplicate_services() {
        let yaml = "services:\n  - kind: profiler\n  - kind: profiler\n";
        let err = PipelineConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_values() {
        for yaml in [
            "services:\n  - kind: profiler\n    unit_cost: -1\n",
            "services:\n  - kind: profiler\n    timeout_secs: 0\n",
            "services:\n  - kind: profiler\n    output_fields: []\n",
            "services:\n  - kind: opportunity_scoring\n    output_fields: [opportunity_score]\n",
            "services:\n  - kind: trust_validation\n    output_fields: [trust_score]\n",
            "persistence:\n  batch_size: 0\n",
        ] {
            assert!(
                matches!(PipelineConfig::from_yaml_str(yaml), Err(ConfigError::Invalid(_))),
                "accepted: {yaml}"
            );
        }
    }

    #[test]
    fn unknown_kind_is_a_yaml_error() {
        let err = PipelineConfig::from_yaml_str("services:\n  - kind: horoscope\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn sections_default_independently() {
        let config = PipelineConfig::from_yaml_str("prefilter:\n  min_comments: 3\n").unwrap();
        assert_eq!(config.services.len(), 5);
        assert_eq!(config.prefilter.min_comments, 3);
        assert_eq!(config.prefilter.min_score, 0);
    }
}
