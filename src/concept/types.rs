//! Concept data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a concept row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptId(i64);

impl ConceptId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ConceptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ConceptId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Enrichment kinds whose results can be shared across a concept.
///
/// Each kind owns exactly one flag column on the concept table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Profiler,
    Monetization,
    MarketValidation,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 3] = [
        AnalysisKind::Profiler,
        AnalysisKind::Monetization,
        AnalysisKind::MarketValidation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Profiler => "profiler",
            AnalysisKind::Monetization => "monetization",
            AnalysisKind::MarketValidation => "market_validation",
        }
    }

    /// Column holding this kind's "has analysis" flag
    pub fn flag_column(&self) -> &'static str {
        match self {
            AnalysisKind::Profiler => "has_profiler_analysis",
            AnalysisKind::Monetization => "has_monetization_analysis",
            AnalysisKind::MarketValidation => "has_market_validation_analysis",
        }
    }

    /// Column naming the record whose stored output is this kind's analysis
    pub fn record_column(&self) -> &'static str {
        match self {
            AnalysisKind::Profiler => "profiler_analysis_record_id",
            AnalysisKind::Monetization => "monetization_analysis_record_id",
            AnalysisKind::MarketValidation => "market_validation_analysis_record_id",
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind analysis flags of a concept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisFlags {
    pub has_profiler_analysis: bool,
    pub has_monetization_analysis: bool,
    pub has_market_validation_analysis: bool,
}

impl AnalysisFlags {
    pub fn get(&self, kind: AnalysisKind) -> bool {
        match kind {
            AnalysisKind::Profiler => self.has_profiler_analysis,
            AnalysisKind::Monetization => self.has_monetization_analysis,
            AnalysisKind::MarketValidation => self.has_market_validation_analysis,
        }
    }

    /// Set a flag. Flags only ever move from false to true.
    pub fn set(&mut self, kind: AnalysisKind) {
        match kind {
            AnalysisKind::Profiler => self.has_profiler_analysis = true,
            AnalysisKind::Monetization => self.has_monetization_analysis = true,
            AnalysisKind::MarketValidation => self.has_market_validation_analysis = true,
        }
    }
}

/// Per-kind record holding a concept's canonical analysis
///
/// Set together with the matching flag and never changed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecords {
    pub profiler_analysis_record_id: Option<String>,
    pub monetization_analysis_record_id: Option<String>,
    pub market_validation_analysis_record_id: Option<String>,
}

impl AnalysisRecords {
    pub fn get(&self, kind: AnalysisKind) -> Option<&str> {
        match kind {
            AnalysisKind::Profiler => self.profiler_analysis_record_id.as_deref(),
            AnalysisKind::Monetization => self.monetization_analysis_record_id.as_deref(),
            AnalysisKind::MarketValidation => self.market_validation_analysis_record_id.as_deref(),
        }
    }

    pub fn set(&mut self, kind: AnalysisKind, record_id: impl Into<String>) {
        let slot = match kind {
            AnalysisKind::Profiler => &mut self.profiler_analysis_record_id,
            AnalysisKind::Monetization => &mut self.monetization_analysis_record_id,
            AnalysisKind::MarketValidation => &mut self.market_validation_analysis_record_id,
        };
        *slot = Some(record_id.into());
    }
}

/// A deduplication-equivalence class of records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: ConceptId,
    /// Stable hash of the normalized concept text (unique)
    pub fingerprint: String,
    /// Normalized text the fingerprint was derived from
    pub concept_text: String,
    /// First record associated with the concept; never changes
    pub primary_record_id: String,
    pub flags: AnalysisFlags,
    /// Where each flagged analysis can be copied from
    #[serde(default)]
    pub analysis_records: AnalysisRecords,
    pub submission_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Concept {
    pub fn has_analysis(&self, kind: AnalysisKind) -> bool {
        self.flags.get(kind)
    }

    /// Record to copy `kind` from: the one that produced it, else the primary
    pub fn analysis_source(&self, kind: AnalysisKind) -> &str {
        self.analysis_records
            .get(kind)
            .unwrap_or(self.primary_record_id.as_str())
    }
}

/// Values needed to create a concept row
#[derive(Debug, Clone)]
pub struct NewConcept {
    pub fingerprint: String,
    pub concept_text: String,
    pub primary_record_id: String,
}

/// Outcome of resolving a record to its concept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConceptResolution {
    pub concept_id: ConceptId,
    /// True when this call created the concept
    pub is_new: bool,
    pub submission_count: u64,
}
