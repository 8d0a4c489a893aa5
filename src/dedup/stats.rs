//! Per-service run statistics

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// How one service call for one record ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Analysis computed by calling the provider
    Fresh,
    /// Record already carried the output; nothing ran
    Skipped,
    /// Output copied from the concept's primary record
    Copied,
    /// Invalid input, provider failure, or a failed copy
    Error,
}

/// Snapshot of a service's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Fresh analyses
    pub analyzed: u64,
    pub skipped: u64,
    pub copied: u64,
    pub errors: u64,
    /// Configured cost of one provider call
    pub unit_cost: f64,
}

impl RunStatistics {
    /// Provider spend avoided by skipping and copying
    pub fn cost_saved(&self) -> f64 {
        (self.copied + self.skipped) as f64 * self.unit_cost
    }

    /// Number of recorded calls
    pub fn total(&self) -> u64 {
        self.analyzed + self.skipped + self.copied + self.errors
    }

    /// Fraction of calls that avoided the provider
    pub fn dedup_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.copied + self.skipped) as f64 / total as f64
        }
    }
}

/// Live counters owned by one service or engine.
///
/// Lock-free; `snapshot()` returns a copy callers can keep.
#[derive(Debug, Default)]
pub struct StatsCounter {
    analyzed: AtomicU64,
    skipped: AtomicU64,
    copied: AtomicU64,
    errors: AtomicU64,
    unit_cost: f64,
}

impl StatsCounter {
    pub fn new(unit_cost: f64) -> Self {
        Self {
            unit_cost,
            ..Self::default()
        }
    }

    /// Increment exactly one counter
    pub fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Fresh => &self.analyzed,
            Outcome::Skipped => &self.skipped,
            Outcome::Copied => &self.copied,
            Outcome::Error => &self.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunStatistics {
        RunStatistics {
            analyzed: self.analyzed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            copied: self.copied.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            unit_cost: self.unit_cost,
        }
    }

    pub fn reset(&self) {
        self.analyzed.store(0, Ordering::Relaxed);
        self.skipped.store(0, Ordering::Relaxed);
        self.copied.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }
}
