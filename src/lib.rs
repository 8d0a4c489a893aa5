//! Sift: concept-aware deduplication and enrichment orchestration
//!
//! Sift runs candidate records (e.g. "somebody should build this" posts)
//! through an ordered set of enrichment services and persists the results.
//! Expensive, provider-backed analyses are computed at most once per
//! business concept: records whose normalized text matches an already
//! analyzed concept copy the stored output instead of paying for
//! another provider call.
//!
//! # Core Concepts
//!
//! - **Concept**: equivalence class of records sharing a text fingerprint
//! - **Primary record**: first record of a concept
//! - **Analysis record**: stored record a concept's copies of one analysis
//!   kind are read from; the primary unless the primary's analysis was lost
//! - **Service**: one pluggable enrichment stage, deduplicating or rule-based
//! - **Merge store**: upserts that keep stored fields the current write omits
//!
//! # Example
//!
//! ```
//! use sift::{PipelineConfig, PipelineOrchestrator, ProviderCatalog, Record, RunOptions, ServiceFactory};
//! use sift::storage::MemoryStore;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! let mut factory = ServiceFactory::new(Arc::new(PipelineConfig::default()), store, ProviderCatalog::new());
//! let orchestrator = PipelineOrchestrator::from_factory(&mut factory);
//!
//! let mut records = vec![Record::new("t3_1", "App idea: shared grocery list")].into_iter();
//! let report = orchestrator.run(&mut records, &RunOptions::default()).await;
//! assert_eq!(report.persisted, 1);
//! # });
//! ```

pub mod concept;
pub mod config;
pub mod dedup;
pub mod pipeline;
pub mod provider;
pub mod record;
pub mod services;
pub mod storage;

pub use concept::{AnalysisKind, Concept, ConceptError, ConceptId, ConceptManager, ConceptResolution};
pub use config::{ConfigError, PipelineConfig, ProviderConfig, ServiceConfig};
pub use dedup::{Decision, DecisionReason, DeduplicationEngine, EnrichmentResult, Outcome, RunStatistics};
pub use pipeline::{
    CancellationToken, FetchSource, JsonLinesSource, PipelineOrchestrator, RunOptions, RunPhase, RunReport,
};
pub use provider::{AnalysisProvider, CommandProvider, MockProvider, ProviderCatalog, ProviderError};
pub use record::{FieldMap, FieldValue, Record};
pub use services::{EnrichmentService, ServiceFactory, ServiceKind, ServiceSet};
pub use storage::{EnrichmentStore, MergeStore, OpenStore, SqliteStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
