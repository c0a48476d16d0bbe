//! Database session management
//!
//! Owns everything about a connection that is not a migration: establishing
//! it, bounding it with timeouts, creating the target database on first use,
//! and the session-scoped tuning and maintenance operations.

use crate::config::MigrateConfig;
use crate::error::FloodgateError;
use once_cell::sync::Lazy;
use postgres::{Client, NoTls};
use regex::Regex;

/// Database names come from configuration, not from SQL parameters, so they
/// are validated as plain identifiers before being quoted into DDL.
static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Connect to the configured database, with the session bounded by timeouts.
///
/// Every later operation on this client inherits the statement, lock and
/// idle-in-transaction timeouts, so no call can hang the batch indefinitely.
///
/// # Errors
///
/// Returns `FloodgateError::Connectivity` if the server cannot be reached.
pub fn connect(config: &MigrateConfig) -> Result<Client, FloodgateError> {
    let mut client = open(config, &config.dbname)?;
    apply_session_timeouts(&mut client, config)?;
    Ok(client)
}

fn open(config: &MigrateConfig, dbname: &str) -> Result<Client, FloodgateError> {
    postgres::Config::new()
        .host(&config.host)
        .port(config.port)
        .dbname(dbname)
        .user(&config.user)
        .password(&config.password)
        .connect(NoTls)
        .map_err(|e| {
            FloodgateError::Connectivity(format!(
                "{}@{}:{}/{}: {e}",
                config.user, config.host, config.port, dbname
            ))
        })
}

fn apply_session_timeouts(
    client: &mut Client,
    config: &MigrateConfig,
) -> Result<(), FloodgateError> {
    // GUC values are not bindable as parameters; the values are u64 from
    // config, so interpolation is safe.
    let sql = format!(
        "SET statement_timeout = '{}s'; \
         SET lock_timeout = '{}s'; \
         SET idle_in_transaction_session_timeout = '{}s'",
        config.statement_timeout_seconds,
        config.lock_timeout_seconds,
        config.idle_in_transaction_timeout_seconds,
    );
    client.batch_execute(&sql)?;
    Ok(())
}

/// Create the target database if it does not exist.
///
/// Connects to the maintenance `postgres` database, since the target may not
/// exist yet. `CREATE DATABASE` cannot take bind parameters, so the name is
/// validated as an identifier and quoted.
pub fn ensure_database(config: &MigrateConfig) -> Result<(), FloodgateError> {
    if !IDENTIFIER.is_match(&config.dbname) {
        return Err(FloodgateError::Config(format!(
            "Invalid database name '{}': must be a plain identifier",
            config.dbname
        )));
    }

    let mut admin = open(config, "postgres")?;
    let exists = admin
        .query_opt(
            "SELECT 1 FROM pg_database WHERE datname = $1",
            &[&config.dbname],
        )?
        .is_some();

    if !exists {
        log::info!("Creating database '{}'", config.dbname);
        admin.batch_execute(&format!("CREATE DATABASE \"{}\"", config.dbname))?;
    }

    Ok(())
}

/// Apply opt-in session tuning for a long batch.
///
/// Trades durability for speed for this session only: commits stop waiting
/// for WAL flush and maintenance memory is enlarged. Controlled by
/// `MigrateConfig::session_tuning` and off by default; server-restart GUCs
/// such as `wal_buffers` cannot be set per session and are not attempted.
pub fn apply_session_tuning(client: &mut Client) -> Result<(), FloodgateError> {
    log::warn!("Session tuning enabled: synchronous_commit=off for this batch");
    client.batch_execute(
        "SET synchronous_commit = off; \
         SET maintenance_work_mem = '256MB'",
    )?;
    Ok(())
}

/// Refresh planner statistics for the whole database (the `optimize` command).
pub fn refresh_statistics(client: &mut Client) -> Result<(), FloodgateError> {
    client.batch_execute("ANALYZE")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_validation() {
        assert!(IDENTIFIER.is_match("floodgate_dev"));
        assert!(IDENTIFIER.is_match("_app2"));
        assert!(!IDENTIFIER.is_match("bad-name"));
        assert!(!IDENTIFIER.is_match("1db"));
        assert!(!IDENTIFIER.is_match("db;DROP DATABASE x"));
        assert!(!IDENTIFIER.is_match(""));
    }
}
