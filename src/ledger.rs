//! Migration ledger: the authoritative record of what has been applied

use crate::error::FloodgateError;
use chrono::{DateTime, Utc};
use postgres::Client;
use uuid::Uuid;

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "floodgate_migrations";

/// One row of the ledger: a migration that has been applied.
///
/// Created only after a successful apply, never updated, and deleted only by
/// the explicit `rerun` and `reset` operator actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Migration version (`YYYYMMDD_HHMMSS_NNN`), unique
    pub version: String,
    /// File the migration came from
    pub filename: String,
    /// Human-readable description (may be empty)
    pub description: String,
    /// When the migration was applied
    pub executed_at: DateTime<Utc>,
    /// Execution time in milliseconds
    pub execution_time_ms: i64,
    /// Truncated content digest recorded at apply time; immutable ground
    /// truth for drift detection
    pub checksum: String,
    /// Correlation id shared by every entry written in one invocation
    pub batch_id: Uuid,
}

impl LedgerEntry {
    /// Build a `LedgerEntry` from a database row.
    ///
    /// Expected column order: `version`, `filename`, `description`,
    /// `executed_at`, `execution_time_ms`, `checksum`, `batch_id`.
    fn from_row(row: &postgres::Row) -> Self {
        Self {
            version: row.get(0),
            filename: row.get(1),
            description: row.get(2),
            executed_at: row.get(3),
            execution_time_ms: row.get(4),
            checksum: row.get(5),
            batch_id: row.get(6),
        }
    }
}

/// Aggregate statistics over the ledger, for status reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerStats {
    pub count: i64,
    pub avg_execution_time_ms: f64,
    pub max_execution_time_ms: i64,
    pub total_execution_time_ms: i64,
    pub first_applied_at: DateTime<Utc>,
    pub last_applied_at: DateTime<Utc>,
}

/// Handle over the ledger table.
///
/// All access is through parameterized statements; no value is ever spliced
/// into SQL text. The ledger never asks for confirmation itself; destructive
/// operations are guarded at the CLI boundary.
pub struct Ledger<'a> {
    client: &'a mut Client,
}

impl<'a> Ledger<'a> {
    pub fn new(client: &'a mut Client) -> Self {
        Self { client }
    }

    /// Create the ledger table and its indexes if absent.
    ///
    /// Idempotent; the ledger must be usable before any migration has run.
    pub fn ensure_table(&mut self) -> Result<(), FloodgateError> {
        self.client.batch_execute(
            "CREATE TABLE IF NOT EXISTS floodgate_migrations (
                version VARCHAR(32) PRIMARY KEY,
                filename VARCHAR(255) NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                executed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                execution_time_ms BIGINT NOT NULL,
                checksum VARCHAR(16) NOT NULL,
                batch_id UUID NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_floodgate_migrations_executed_at
                ON floodgate_migrations (executed_at);
            CREATE INDEX IF NOT EXISTS idx_floodgate_migrations_batch_id
                ON floodgate_migrations (batch_id)",
        )?;
        Ok(())
    }

    /// Check whether the ledger table itself exists.
    ///
    /// Status reporting must degrade gracefully on a fresh database, before
    /// `ensure_table` has ever run.
    pub fn table_exists(&mut self) -> Result<bool, FloodgateError> {
        let row = self.client.query_one(
            "SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            )",
            &[&LEDGER_TABLE],
        )?;
        Ok(row.get(0))
    }

    /// Indexed point lookup: has this version been applied?
    pub fn exists(&mut self, version: &str) -> Result<bool, FloodgateError> {
        let row = self.client.query_opt(
            "SELECT 1 FROM floodgate_migrations WHERE version = $1",
            &[&version],
        )?;
        Ok(row.is_some())
    }

    /// Fetch the recorded checksum for a version, if applied.
    pub fn recorded_checksum(&mut self, version: &str) -> Result<Option<String>, FloodgateError> {
        let row = self.client.query_opt(
            "SELECT checksum FROM floodgate_migrations WHERE version = $1",
            &[&version],
        )?;
        Ok(row.map(|r| r.get(0)))
    }

    /// Append-only insert of a new entry.
    ///
    /// A duplicate version violates the primary key and fails loudly; that
    /// indicates a coordination bug, not a state the ledger should absorb.
    pub fn record(&mut self, entry: &LedgerEntry) -> Result<(), FloodgateError> {
        self.client
            .execute(
                "INSERT INTO floodgate_migrations
                    (version, filename, description, executed_at,
                     execution_time_ms, checksum, batch_id)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
                &[
                    &entry.version,
                    &entry.filename,
                    &entry.description,
                    &entry.executed_at,
                    &entry.execution_time_ms,
                    &entry.checksum,
                    &entry.batch_id,
                ],
            )
            .map_err(|e| FloodgateError::LedgerWrite {
                version: entry.version.clone(),
                source: e.to_string(),
            })?;
        Ok(())
    }

    /// All entries, sorted by version.
    pub fn list_all(&mut self) -> Result<Vec<LedgerEntry>, FloodgateError> {
        let rows = self.client.query(
            "SELECT version, filename, description, executed_at,
                    execution_time_ms, checksum, batch_id
             FROM floodgate_migrations
             ORDER BY version ASC",
            &[],
        )?;
        Ok(rows.iter().map(LedgerEntry::from_row).collect())
    }

    /// Aggregate statistics, or `None` when the ledger is empty.
    pub fn aggregate(&mut self) -> Result<Option<LedgerStats>, FloodgateError> {
        let row = self.client.query_one(
            "SELECT COUNT(*),
                    AVG(execution_time_ms)::DOUBLE PRECISION,
                    MAX(execution_time_ms),
                    SUM(execution_time_ms)::BIGINT,
                    MIN(executed_at),
                    MAX(executed_at)
             FROM floodgate_migrations",
            &[],
        )?;
        let count: i64 = row.get(0);
        if count == 0 {
            return Ok(None);
        }
        Ok(Some(LedgerStats {
            count,
            avg_execution_time_ms: row.get(1),
            max_execution_time_ms: row.get(2),
            total_execution_time_ms: row.get(3),
            first_applied_at: row.get(4),
            last_applied_at: row.get(5),
        }))
    }

    /// Delete one entry; used only by the explicit `rerun` operator action.
    ///
    /// Returns the number of rows removed (0 when the version was absent).
    pub fn delete(&mut self, version: &str) -> Result<u64, FloodgateError> {
        let removed = self.client.execute(
            "DELETE FROM floodgate_migrations WHERE version = $1",
            &[&version],
        )?;
        if removed > 0 {
            log::info!("Removed ledger entry for {version}");
        }
        Ok(removed)
    }

    /// Delete every entry; used only by the explicit `reset` operator action.
    pub fn clear(&mut self) -> Result<u64, FloodgateError> {
        let removed = self.client.execute("DELETE FROM floodgate_migrations", &[])?;
        log::info!("Cleared {removed} ledger entries");
        Ok(removed)
    }
}
