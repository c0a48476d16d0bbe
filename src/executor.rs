//! Migration executor: applies one unit against the database
//!
//! The executor owns the transactional policy and the structured failure
//! detail. It never touches the ledger; recording is the coordinator's job,
//! so a ledger-write failure after a successful apply stays distinguishable
//! from an apply failure.

use crate::discovery::MigrationUnit;
use crate::error::{FloodgateError, SqlFailure};
use crate::statement::{self, StatementKind};
use postgres::Client;
use std::time::Instant;

/// Result of a successful apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Wall-clock execution time, millisecond precision
    pub execution_time_ms: u64,
    /// Content digest for the ledger to record
    pub checksum: String,
    /// False when the unit ran statement-by-statement outside a transaction
    pub transactional: bool,
}

/// Applies one migration unit under the engine's transactional policy.
#[derive(Debug, Default)]
pub struct Executor;

impl Executor {
    pub fn new() -> Self {
        Self
    }

    /// Apply one unit's body.
    ///
    /// Default policy wraps the whole body in a single transaction so the
    /// unit is atomic. Bodies containing a statement PostgreSQL forbids
    /// inside a transaction block (enum value addition, CONCURRENTLY index
    /// builds, VACUUM) are instead executed statement-by-statement on the
    /// bare connection; the outcome records the reduced atomicity.
    ///
    /// # Errors
    ///
    /// * `Execution` with structured message/detail/hint/line on SQL failure
    /// * `NonTransactionalConflict` when such a body also carries explicit
    ///   BEGIN/COMMIT, which neither policy can honor
    pub fn apply(
        &self,
        client: &mut Client,
        unit: &MigrationUnit,
    ) -> Result<ApplyOutcome, FloodgateError> {
        let start = Instant::now();
        let transactional = !unit.requires_non_transactional;

        if transactional {
            self.apply_transactional(client, unit)?;
        } else {
            self.apply_non_transactional(client, unit)?;
        }

        Ok(ApplyOutcome {
            execution_time_ms: start.elapsed().as_millis() as u64,
            checksum: unit.checksum.clone(),
            transactional,
        })
    }

    fn apply_transactional(
        &self,
        client: &mut Client,
        unit: &MigrationUnit,
    ) -> Result<(), FloodgateError> {
        let mut tx = client.transaction().map_err(FloodgateError::Postgres)?;
        tx.batch_execute(&unit.body)
            .map_err(|e| execution_error(unit, &e, &unit.body))?;
        tx.commit().map_err(FloodgateError::Postgres)?;
        Ok(())
    }

    /// Statement-by-statement execution for bodies that must run outside a
    /// transaction block. Atomicity is per statement; a failure mid-body
    /// leaves earlier statements applied, and the error surface says so.
    fn apply_non_transactional(
        &self,
        client: &mut Client,
        unit: &MigrationUnit,
    ) -> Result<(), FloodgateError> {
        let statements = statement::split(&unit.body);

        // Explicit transaction control in such a body cannot be honored:
        // wrapping the non-transactional statement fails on the server, and
        // ignoring the BEGIN silently changes the author's intent.
        if let Some(control) = statements
            .iter()
            .find(|s| statement::classify(s) == StatementKind::TransactionControl)
        {
            return Err(FloodgateError::NonTransactionalConflict {
                version: unit.version.clone(),
                filename: unit.filename.clone(),
                statement: first_line(control),
            });
        }

        log::warn!(
            "{}: contains non-transactional DDL, executing {} statement(s) \
             individually without a transaction",
            unit.version,
            statements.len()
        );

        for stmt in &statements {
            client
                .batch_execute(stmt)
                .map_err(|e| execution_error(unit, &e, stmt))?;
        }
        Ok(())
    }
}

fn execution_error(unit: &MigrationUnit, err: &postgres::Error, sql: &str) -> FloodgateError {
    FloodgateError::Execution {
        version: unit.version.clone(),
        filename: unit.filename.clone(),
        failure: SqlFailure::from_postgres(err, sql),
    }
}

fn first_line(statement: &str) -> String {
    statement.lines().next().unwrap_or("").trim().to_string()
}
