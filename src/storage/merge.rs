//! Field-preserving persistence of enriched records
//!
//! Writes are merge-by-identifier: a stored non-null field survives a later
//! write that omits it (or carries null for it). This keeps values computed by
//! an earlier run, such as trust metadata, intact when a later run only
//! touches other fields.

use super::traits::{EnrichmentStore, StorageResult};
use crate::record::Record;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one `write` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    /// Records upserted
    pub written: usize,
    /// Records rejected by validation
    pub skipped: usize,
    /// Stored fields kept because the incoming write omitted them
    pub preserved_fields: usize,
}

/// Outcome of a chunked `store_batch` call
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatchReport {
    pub batches: usize,
    pub successful_batches: usize,
    pub total_records: usize,
    /// `successful_batches / batches`, 0.0 when there were no batches
    pub success_rate: f64,
}

/// Persists records through an `EnrichmentStore` with merge semantics
#[derive(Clone)]
pub struct MergeStore {
    store: Arc<dyn EnrichmentStore>,
    /// Keys that must be present in `fields` for a record to be written
    required_fields: Vec<String>,
}

impl MergeStore {
    pub fn new(store: Arc<dyn EnrichmentStore>) -> Self {
        Self {
            store,
            required_fields: Vec::new(),
        }
    }

    pub fn with_required_fields(mut self, fields: Vec<String>) -> Self {
        self.required_fields = fields;
        self
    }

    /// Names of missing identity or required fields; empty when writable.
    pub fn missing_fields(&self, record: &Record) -> Vec<String> {
        let mut missing = Vec::new();
        if record.id.trim().is_empty() {
            missing.push("id".to_string());
        }
        if record.title.trim().is_empty() {
            missing.push("title".to_string());
        }
        for field in &self.required_fields {
            if !record.has_field(field) {
                missing.push(field.clone());
            }
        }
        missing
    }

    /// Validate, merge against stored rows and upsert.
    ///
    /// Existing rows for the whole batch are fetched with one lookup.
    pub fn write(&self, records: &[Record]) -> StorageResult<StoreSummary> {
        let mut summary = StoreSummary::default();

        let mut valid: Vec<&Record> = Vec::with_capacity(records.len());
        for record in records {
            let missing = self.missing_fields(record);
            if missing.is_empty() {
                valid.push(record);
            } else {
                warn!(record_id = %record.id, missing = ?missing, "skipping record with missing required fields");
                summary.skipped += 1;
            }
        }

        if valid.is_empty() {
            return Ok(summary);
        }

        let ids: Vec<String> = valid.iter().map(|r| r.id.clone()).collect();
        let existing = self.store.load_records(&ids)?;

        // Duplicate ids within one batch merge onto each other in order
        let mut order: Vec<String> = Vec::with_capacity(valid.len());
        let mut merged: HashMap<String, Record> = HashMap::with_capacity(valid.len());

        for incoming in valid {
            let base = match merged.remove(&incoming.id) {
                Some(earlier_in_batch) => Some(earlier_in_batch),
                None => {
                    order.push(incoming.id.clone());
                    existing.get(&incoming.id).cloned()
                }
            };

            let record = match base {
                Some(base) => {
                    let (record, preserved) = merge_preserving(&base, incoming);
                    summary.preserved_fields += preserved;
                    record
                }
                None => strip_transient(incoming),
            };

            merged.insert(incoming.id.clone(), record);
        }

        let to_write: Vec<Record> = order
            .iter()
            .filter_map(|id| merged.remove(id))
            .collect();

        summary.written = self.store.upsert_records(&to_write)?;
        debug!(
            written = summary.written,
            skipped = summary.skipped,
            preserved = summary.preserved_fields,
            "merge write complete"
        );

        Ok(summary)
    }

    /// Write records; true when the write succeeded and wrote something
    /// (or there was nothing to write).
    pub fn store(&self, records: &[Record]) -> bool {
        match self.write(records) {
            Ok(summary) => records.is_empty() || summary.written > 0,
            Err(e) => {
                warn!(error = %e, records = records.len(), "record write failed");
                false
            }
        }
    }

    /// Write in chunks of `batch_size`; a failed chunk doesn't stop the rest.
    pub fn store_batch(&self, records: &[Record], batch_size: usize) -> BatchReport {
        let mut tally = BatchTally::default();
        for chunk in records.chunks(batch_size.max(1)) {
            tally.add(self, chunk);
        }
        tally.finish()
    }

    /// Like `store_batch`, for records produced lazily. At most
    /// `batch_size` records are buffered at a time.
    pub fn store_stream(
        &self,
        records: impl IntoIterator<Item = Record>,
        batch_size: usize,
    ) -> BatchReport {
        let batch_size = batch_size.max(1);
        let mut tally = BatchTally::default();
        let mut chunk = Vec::with_capacity(batch_size);
        for record in records {
            chunk.push(record);
            if chunk.len() == batch_size {
                tally.add(self, &chunk);
                chunk.clear();
            }
        }
        if !chunk.is_empty() {
            tally.add(self, &chunk);
        }
        tally.finish()
    }
}

#[derive(Default)]
struct BatchTally {
    batches: usize,
    successful_batches: usize,
    total_records: usize,
}

impl BatchTally {
    fn add(&mut self, merge: &MergeStore, chunk: &[Record]) {
        if merge.store(chunk) {
            self.successful_batches += 1;
        } else {
            warn!(batch = self.batches, size = chunk.len(), "batch failed");
        }
        self.batches += 1;
        self.total_records += chunk.len();
    }

    fn finish(self) -> BatchReport {
        let success_rate = if self.batches == 0 {
            0.0
        } else {
            self.successful_batches as f64 / self.batches as f64
        };
        BatchReport {
            batches: self.batches,
            successful_batches: self.successful_batches,
            total_records: self.total_records,
            success_rate,
        }
    }
}

/// Overlay `incoming` onto `existing`, keeping stored values the incoming
/// write leaves out. Returns the merged record and the number of preserved
/// enrichment fields.
pub fn merge_preserving(existing: &Record, incoming: &Record) -> (Record, usize) {
    let mut merged = strip_transient(incoming);
    let mut preserved = 0;

    for (key, value) in &existing.fields {
        if value.is_null() {
            continue;
        }
        let keep = match incoming.fields.get(key) {
            None => true,
            Some(v) => v.is_null(),
        };
        if keep {
            merged.fields.insert(key.clone(), value.clone());
            preserved += 1;
        }
    }

    if merged.concept_id.is_none() {
        merged.concept_id = existing.concept_id;
    }
    if merged.author.is_none() {
        merged.author = existing.author.clone();
    }
    if merged.created_utc.is_none() {
        merged.created_utc = existing.created_utc;
    }
    if merged.concept_text.is_none() {
        merged.concept_text = existing.concept_text.clone();
    }
    if merged.body.is_empty() {
        merged.body = existing.body.clone();
    }
    if merged.source.is_empty() {
        merged.source = existing.source.clone();
    }

    (merged, preserved)
}

fn strip_transient(record: &Record) -> Record {
    let mut clean = record.clone();
    clean.completed_analyses.clear();
    clean.errors.clear();
    clean
}
