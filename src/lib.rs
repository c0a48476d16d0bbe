//! # Floodgate
//!
//! Versioned SQL migration engine for PostgreSQL.
//!
//! Floodgate discovers ordered schema-change files
//! (`YYYYMMDD_HHMMSS_NNN_label.sql`), applies each exactly once, records
//! what was applied in a ledger table with content checksums for drift
//! detection, routes statements PostgreSQL refuses inside a transaction
//! block through a non-transactional path, and reports per-migration
//! performance.
//!
//! # Example
//!
//! ```rust,no_run
//! use floodgate::{BatchCoordinator, MigrateConfig, discovery, session};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MigrateConfig::load()?;
//!     session::ensure_database(&config)?;
//!     let mut client = session::connect(&config)?;
//!
//!     let set = discovery::discover(Path::new("migrations"))?;
//!     let report = BatchCoordinator::new(config).run(&mut client, &set)?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod checksum;
pub mod config;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod session;
pub mod statement;
pub mod status;

pub use batch::{BatchCoordinator, BatchReport, DriftWarning, LedgerWriteWarning};
pub use config::MigrateConfig;
pub use discovery::{DiscoveredSet, DiscoveryWarning, MigrationUnit};
pub use error::{FloodgateError, SqlFailure};
pub use executor::{ApplyOutcome, Executor};
pub use ledger::{Ledger, LedgerEntry, LedgerStats};
pub use status::{PerfBand, StatusReport, StatusRow};
