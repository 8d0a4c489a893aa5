//! SQLite storage backend

use super::traits::{EnrichmentStore, OpenStore, StorageError, StorageResult};
use crate::concept::{AnalysisFlags, AnalysisKind, AnalysisRecords, Concept, ConceptId, NewConcept};
use crate::record::Record;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Default time a statement waits on a locked database before failing
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on bound parameters per `IN (...)` lookup
const MAX_IDS_PER_LOOKUP: usize = 500;

const CONCEPT_COLUMNS: &str = "id, fingerprint, concept_text, primary_record_id, \
     has_profiler_analysis, has_monetization_analysis, has_market_validation_analysis, \
     profiler_analysis_record_id, monetization_analysis_record_id, \
     market_validation_analysis_record_id, \
     submission_count, created_at, last_updated";

const RECORD_COLUMNS: &str = "id, concept_id, title, body, source, author, score, \
     num_comments, created_utc, concept_text, fields_json";

/// Concept row before timestamps are parsed
struct ConceptRow {
    id: i64,
    fingerprint: String,
    concept_text: String,
    primary_record_id: String,
    flags: AnalysisFlags,
    analysis_records: AnalysisRecords,
    submission_count: i64,
    created_at: String,
    last_updated: String,
}

/// SQLite-backed concept and record store
///
/// Uses a single SQLite database file with a `concepts` table (one flag
/// column per deduplicable analysis kind) and a `records` table related by
/// `concept_id`. Thread-safe via internal mutex on the connection; separate
/// processes or stores sharing the file coordinate through SQLite locking
/// bounded by the busy timeout.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a file-backed store with a specific busy timeout
    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Initialize the database schema
    ///
    /// Base tables are created first; flag columns are added by migration so
    /// databases created before a kind existed pick it up on open.
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Concepts table (flag columns added via migration)
            CREATE TABLE IF NOT EXISTS concepts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fingerprint TEXT NOT NULL UNIQUE,
                concept_text TEXT NOT NULL,
                primary_record_id TEXT NOT NULL,
                submission_count INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                last_updated TEXT NOT NULL
            );

            -- Records table
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                concept_id INTEGER,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                source TEXT NOT NULL,
                author TEXT,
                score INTEGER NOT NULL,
                num_comments INTEGER NOT NULL,
                created_utc INTEGER,
                concept_text TEXT,
                fields_json TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (concept_id) REFERENCES concepts(id)
            );

            CREATE INDEX IF NOT EXISTS idx_records_concept
                ON records(concept_id);

            PRAGMA foreign_keys = ON;

            -- Concurrent readers while another run writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;

        Self::migrate_add_flag_columns(conn)?;

        Ok(())
    }

    /// Migration: per analysis kind, a boolean flag column and the id of
    /// the record holding that analysis
    ///
    /// SQLite doesn't support ALTER TABLE ADD COLUMN IF NOT EXISTS,
    /// so we check if columns exist first using table_info pragma.
    fn migrate_add_flag_columns(conn: &Connection) -> StorageResult<()> {
        for kind in AnalysisKind::ALL {
            Self::add_column_if_missing(conn, kind.flag_column(), "INTEGER NOT NULL DEFAULT 0")?;
            Self::add_column_if_missing(conn, kind.record_column(), "TEXT")?;
        }
        Ok(())
    }

    fn add_column_if_missing(conn: &Connection, column: &str, definition: &str) -> StorageResult<()> {
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('concepts') WHERE name = ?1",
            params![column],
            |row| row.get(0),
        )?;

        if !exists {
            conn.execute(
                &format!("ALTER TABLE concepts ADD COLUMN {} {}", column, definition),
                [],
            )?;
        }
        Ok(())
    }

    fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StorageError::DateParse(e.to_string()))
    }

    /// Raw concept columns, in `CONCEPT_COLUMNS` order
    fn read_concept_row(row: &Row<'_>) -> rusqlite::Result<ConceptRow> {
        Ok(ConceptRow {
            id: row.get(0)?,
            fingerprint: row.get(1)?,
            concept_text: row.get(2)?,
            primary_record_id: row.get(3)?,
            flags: AnalysisFlags {
                has_profiler_analysis: row.get(4)?,
                has_monetization_analysis: row.get(5)?,
                has_market_validation_analysis: row.get(6)?,
            },
            analysis_records: AnalysisRecords {
                profiler_analysis_record_id: row.get(7)?,
                monetization_analysis_record_id: row.get(8)?,
                market_validation_analysis_record_id: row.get(9)?,
            },
            submission_count: row.get(10)?,
            created_at: row.get(11)?,
            last_updated: row.get(12)?,
        })
    }

    fn row_to_concept(raw: ConceptRow) -> StorageResult<Concept> {
        Ok(Concept {
            id: ConceptId::new(raw.id),
            fingerprint: raw.fingerprint,
            concept_text: raw.concept_text,
            primary_record_id: raw.primary_record_id,
            flags: raw.flags,
            analysis_records: raw.analysis_records,
            submission_count: raw.submission_count.max(0) as u64,
            created_at: Self::parse_timestamp(&raw.created_at)?,
            last_updated: Self::parse_timestamp(&raw.last_updated)?,
        })
    }

    fn query_concept(
        conn: &Connection,
        where_clause: &str,
        param: &dyn rusqlite::ToSql,
    ) -> StorageResult<Option<Concept>> {
        let sql = format!("SELECT {} FROM concepts WHERE {}", CONCEPT_COLUMNS, where_clause);
        let raw = conn
            .query_row(&sql, [param], Self::read_concept_row)
            .optional()?;
        raw.map(Self::row_to_concept).transpose()
    }

    #[allow(clippy::type_complexity)]
    fn read_record_row(
        row: &Row<'_>,
    ) -> rusqlite::Result<(
        String,
        Option<i64>,
        String,
        String,
        String,
        Option<String>,
        i64,
        i64,
        Option<i64>,
        Option<String>,
        String,
    )> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
            row.get(10)?,
        ))
    }

    #[allow(clippy::type_complexity)]
    fn row_to_record(
        raw: (
            String,
            Option<i64>,
            String,
            String,
            String,
            Option<String>,
            i64,
            i64,
            Option<i64>,
            Option<String>,
            String,
        ),
    ) -> StorageResult<Record> {
        let (id, concept_id, title, body, source, author, score, num_comments, created_utc, concept_text, fields_json) =
            raw;
        let mut record = Record::new(id, title);
        record.concept_id = concept_id.map(ConceptId::new);
        record.body = body;
        record.source = source;
        record.author = author;
        record.score = score;
        record.num_comments = num_comments;
        record.created_utc = created_utc;
        record.concept_text = concept_text;
        record.fields = serde_json::from_str(&fields_json)?;
        Ok(record)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl EnrichmentStore for SqliteStore {
    // === Concept Operations ===

    fn insert_concept_if_absent(&self, concept: &NewConcept) -> StorageResult<(Concept, bool)> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();

        // The UNIQUE constraint on fingerprint decides the race; losers see 0 changes.
        let inserted = conn.execute(
            r#"
            INSERT INTO concepts (fingerprint, concept_text, primary_record_id, submission_count, created_at, last_updated)
            VALUES (?1, ?2, ?3, 1, ?4, ?4)
            ON CONFLICT(fingerprint) DO NOTHING
            "#,
            params![concept.fingerprint, concept.concept_text, concept.primary_record_id, now],
        )? == 1;

        let stored = Self::query_concept(&conn, "fingerprint = ?1", &concept.fingerprint)?
            .ok_or(StorageError::Database(rusqlite::Error::QueryReturnedNoRows))?;

        Ok((stored, inserted))
    }

    fn load_concept(&self, id: ConceptId) -> StorageResult<Option<Concept>> {
        let conn = self.conn()?;
        Self::query_concept(&conn, "id = ?1", &id.value())
    }

    fn increment_submission_count(&self, id: ConceptId) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: Option<i64> = conn
            .query_row(
                r#"
                UPDATE concepts
                SET submission_count = submission_count + 1, last_updated = ?2
                WHERE id = ?1
                RETURNING submission_count
                "#,
                params![id.value(), Utc::now().to_rfc3339()],
                |row| row.get(0),
            )
            .optional()?;

        count
            .map(|c| c.max(0) as u64)
            .ok_or(StorageError::ConceptNotFound(id))
    }

    fn set_analysis_flag(
        &self,
        id: ConceptId,
        kind: AnalysisKind,
        record_id: &str,
    ) -> StorageResult<bool> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();

        // Flag and holder move together; a set flag keeps its first holder.
        let flipped = conn.execute(
            &format!(
                "UPDATE concepts SET {flag} = 1, {holder} = ?3, last_updated = ?2 \
                 WHERE id = ?1 AND {flag} = 0",
                flag = kind.flag_column(),
                holder = kind.record_column()
            ),
            params![id.value(), now, record_id],
        )? == 1;

        if flipped {
            return Ok(true);
        }

        // Already set (or missing): refresh metadata only
        let touched = conn.execute(
            "UPDATE concepts SET last_updated = ?2 WHERE id = ?1",
            params![id.value(), now],
        )?;
        if touched == 0 {
            return Err(StorageError::ConceptNotFound(id));
        }
        Ok(false)
    }

    fn touch_concept(&self, id: ConceptId) -> StorageResult<()> {
        let conn = self.conn()?;
        let touched = conn.execute(
            "UPDATE concepts SET last_updated = ?2 WHERE id = ?1",
            params![id.value(), Utc::now().to_rfc3339()],
        )?;
        if touched == 0 {
            return Err(StorageError::ConceptNotFound(id));
        }
        Ok(())
    }

    // === Record Operations ===

    fn load_record(&self, id: &str) -> StorageResult<Option<Record>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM records WHERE id = ?1", RECORD_COLUMNS);
        let raw = conn
            .query_row(&sql, params![id], Self::read_record_row)
            .optional()?;
        raw.map(Self::row_to_record).transpose()
    }

    fn load_records(&self, ids: &[String]) -> StorageResult<HashMap<String, Record>> {
        let conn = self.conn()?;
        let mut records = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(MAX_IDS_PER_LOOKUP) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT {} FROM records WHERE id IN ({})",
                RECORD_COLUMNS, placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), Self::read_record_row)?;
            for row in rows {
                let record = Self::row_to_record(row?)?;
                records.insert(record.id.clone(), record);
            }
        }

        Ok(records)
    }

    fn upsert_records(&self, records: &[Record]) -> StorageResult<usize> {
        let mut conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO records (id, concept_id, title, body, source, author, score, num_comments,
                                     created_utc, concept_text, fields_json, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                ON CONFLICT(id) DO UPDATE SET
                    concept_id = excluded.concept_id,
                    title = excluded.title,
                    body = excluded.body,
                    source = excluded.source,
                    author = excluded.author,
                    score = excluded.score,
                    num_comments = excluded.num_comments,
                    created_utc = excluded.created_utc,
                    concept_text = excluded.concept_text,
                    fields_json = excluded.fields_json,
                    updated_at = excluded.updated_at
                "#,
            )?;

            for record in records {
                let fields_json = serde_json::to_string(&record.fields)?;
                stmt.execute(params![
                    record.id,
                    record.concept_id.map(|c| c.value()),
                    record.title,
                    record.body,
                    record.source,
                    record.author,
                    record.score,
                    record.num_comments,
                    record.created_utc,
                    record.concept_text,
                    fields_json,
                    now,
                ])?;
            }
        }

        tx.commit()?;
        Ok(records.len())
    }
}
