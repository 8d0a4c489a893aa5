//! Storage backends
//!
//! Concepts and records live behind the `EnrichmentStore` trait. The primary
//! implementation is `SqliteStore`; `MemoryStore` serves tests and throwaway
//! runs. `MergeStore` layers field-preserving writes on top of either.

mod memory;
mod merge;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use merge::{merge_preserving, BatchReport, MergeStore, StoreSummary};
pub use sqlite::{SqliteStore, DEFAULT_BUSY_TIMEOUT};
pub use traits::{EnrichmentStore, OpenStore, StorageError, StorageResult};
