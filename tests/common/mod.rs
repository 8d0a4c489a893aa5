//! Shared helpers for sift integration tests
//!
//! Record builders, scripted providers, pipeline wiring and a store wrapper
//! that can simulate outages.

#![allow(dead_code)]

pub mod fixtures;
pub mod flaky_store;

pub use fixtures::{
    dedup_pipeline, post, scripted_provider, PipelineHarness, DEDUP_KINDS,
};
pub use flaky_store::FlakyStore;
