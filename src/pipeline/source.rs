//! Fetch sources feeding the orchestrator

use crate::record::Record;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

/// Yields records until the stream ends.
///
/// Any `Iterator<Item = Record>` is a source.
pub trait FetchSource {
    fn next_record(&mut self) -> Option<Record>;
}

impl<I: Iterator<Item = Record>> FetchSource for I {
    fn next_record(&mut self) -> Option<Record> {
        self.next()
    }
}

/// One JSON record per line.
///
/// Blank lines are ignored. Malformed JSON and undecodable lines are logged
/// and skipped; the stream ends at EOF or on any other read error.
pub struct JsonLinesSource<R> {
    reader: R,
    line_number: usize,
    skipped: usize,
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            skipped: 0,
        }
    }

    /// Lines dropped as unreadable so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<R: BufRead> Iterator for JsonLinesSource<R> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let mut line = String::new();
        loop {
            line.clear();
            self.line_number += 1;
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) if line.trim().is_empty() => continue,
                Ok(_) => match serde_json::from_str::<Record>(line.trim()) {
                    Ok(record) => return Some(record),
                    Err(e) => {
                        warn!(line = self.line_number, error = %e, "skipping malformed record");
                        self.skipped += 1;
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    warn!(line = self.line_number, error = %e, "skipping unreadable line");
                    self.skipped += 1;
                }
                Err(e) => {
                    warn!(line = self.line_number, error = %e, "input read failed, ending stream");
                    return None;
                }
            }
        }
    }
}
