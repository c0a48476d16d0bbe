//! Read-only status reporting over the ledger

use crate::checksum;
use crate::discovery::DiscoveredSet;
use crate::error::FloodgateError;
use crate::ledger::{Ledger, LedgerEntry, LedgerStats};
use postgres::Client;

/// Performance classification of one applied migration, so regressions are
/// visible without manual inspection of the timing column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerfBand {
    /// Under one second
    Fast,
    /// One to ten seconds
    Slow,
    /// Ten seconds or more
    VerySlow,
}

impl PerfBand {
    const SLOW_MS: i64 = 1_000;
    const VERY_SLOW_MS: i64 = 10_000;

    pub fn classify(execution_time_ms: i64) -> Self {
        if execution_time_ms >= Self::VERY_SLOW_MS {
            PerfBand::VerySlow
        } else if execution_time_ms >= Self::SLOW_MS {
            PerfBand::Slow
        } else {
            PerfBand::Fast
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PerfBand::Fast => "fast",
            PerfBand::Slow => "slow",
            PerfBand::VerySlow => "very-slow",
        }
    }
}

/// One ledger entry with derived reporting fields.
#[derive(Debug, Clone)]
pub struct StatusRow {
    pub entry: LedgerEntry,
    pub band: PerfBand,
    /// True when the on-disk file's checksum no longer matches the entry
    pub drifted: bool,
}

/// Full status report: aggregate statistics plus classified rows.
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// `None` when nothing has been applied yet
    pub stats: Option<LedgerStats>,
    pub rows: Vec<StatusRow>,
    /// True when the ledger table itself does not exist yet
    pub ledger_missing: bool,
}

impl StatusReport {
    fn empty(ledger_missing: bool) -> Self {
        Self {
            stats: None,
            rows: Vec::new(),
            ledger_missing,
        }
    }
}

/// Aggregate the ledger into a report.
///
/// Read-only; operates independently of the batch pipeline. When a
/// discovered set is supplied, each row is also checked for checksum drift
/// against the current file content. A database where the ledger table does
/// not exist yet produces an empty report, not an error.
pub fn report(
    client: &mut Client,
    discovered: Option<&DiscoveredSet>,
) -> Result<StatusReport, FloodgateError> {
    let mut ledger = Ledger::new(client);

    if !ledger.table_exists()? {
        return Ok(StatusReport::empty(true));
    }

    let stats = ledger.aggregate()?;
    let entries = ledger.list_all()?;

    let rows = entries
        .into_iter()
        .map(|entry| {
            let drifted = discovered
                .and_then(|set| set.find(&entry.version))
                .map(|unit| !checksum::matches(&entry.checksum, &unit.checksum))
                .unwrap_or(false);
            StatusRow {
                band: PerfBand::classify(entry.execution_time_ms),
                drifted,
                entry,
            }
        })
        .collect();

    Ok(StatusReport { stats, rows, ledger_missing: false })
}
