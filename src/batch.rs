//! Batch coordination: drives discovery, ledger and executor across one run

use crate::checksum;
use crate::config::MigrateConfig;
use crate::discovery::DiscoveredSet;
use crate::error::FloodgateError;
use crate::executor::Executor;
use crate::ledger::{Ledger, LedgerEntry};
use crate::session;
use chrono::Utc;
use postgres::Client;
use uuid::Uuid;

/// An already-applied migration whose file content no longer matches the
/// recorded checksum. The migration succeeded in the past; this is a
/// provenance signal, not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftWarning {
    pub version: String,
    pub filename: String,
    pub recorded: String,
    pub current: String,
}

impl std::fmt::Display for DriftWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Checksum drift on {} ({}): recorded {}, file now {}",
            self.version, self.filename, self.recorded, self.current
        )
    }
}

/// A migration that applied successfully but could not be recorded.
///
/// Loud by design: the next run would re-attempt the migration unless the
/// ledger is reconciled by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerWriteWarning {
    pub version: String,
    pub detail: String,
}

/// Outcome of one batch invocation.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Correlation id shared by every ledger entry this run wrote
    pub batch_id: Uuid,
    /// Versions applied this run, in order
    pub applied: Vec<String>,
    /// Versions skipped as already applied
    pub skipped: Vec<String>,
    /// Drift detected on already-applied migrations
    pub drift: Vec<DriftWarning>,
    /// Applied-but-unrecorded migrations needing manual reconciliation
    pub unrecorded: Vec<LedgerWriteWarning>,
}

impl BatchReport {
    fn new(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            applied: Vec::new(),
            skipped: Vec::new(),
            drift: Vec::new(),
            unrecorded: Vec::new(),
        }
    }

    /// One-line summary printed at the end of every run.
    pub fn summary(&self) -> String {
        format!(
            "batch {}: {} applied, {} skipped, {} drifted, {} unrecorded",
            self.batch_id,
            self.applied.len(),
            self.skipped.len(),
            self.drift.len(),
            self.unrecorded.len()
        )
    }
}

/// Orchestrates a full run over the discovered, ordered sequence.
///
/// Strictly sequential: migrations encode an ordering dependency graph that
/// is implicit in version order, so no two units ever execute concurrently.
pub struct BatchCoordinator {
    config: MigrateConfig,
    executor: Executor,
}

impl BatchCoordinator {
    pub fn new(config: MigrateConfig) -> Self {
        Self {
            config,
            executor: Executor::new(),
        }
    }

    /// Apply every not-yet-applied unit in version order.
    ///
    /// Per unit: already in the ledger means a logged idempotent skip (with
    /// a drift check); otherwise apply, then record. A failed apply aborts
    /// the remaining sequence immediately. A failed record after a
    /// successful apply is a degraded success: warned loudly, batch
    /// continues.
    pub fn run(
        &self,
        client: &mut Client,
        set: &DiscoveredSet,
    ) -> Result<BatchReport, FloodgateError> {
        let batch_id = Uuid::new_v4();
        let mut report = BatchReport::new(batch_id);

        for warning in &set.warnings {
            log::warn!("{warning}");
        }

        Ledger::new(client).ensure_table()?;

        if self.config.session_tuning {
            session::apply_session_tuning(client)?;
        }

        let total = set.units.len();
        log::info!("Starting batch {batch_id} ({total} migration(s) discovered)");

        for (idx, unit) in set.units.iter().enumerate() {
            let position = format!("[{}/{}]", idx + 1, total);

            let recorded = Ledger::new(client).recorded_checksum(&unit.version)?;
            if let Some(recorded) = recorded {
                if !checksum::matches(&recorded, &unit.checksum) {
                    let warning = DriftWarning {
                        version: unit.version.clone(),
                        filename: unit.filename.clone(),
                        recorded,
                        current: unit.checksum.clone(),
                    };
                    log::warn!("{warning}");
                    report.drift.push(warning);
                }
                log::info!("{position} {} already applied, skipping", unit.version);
                report.skipped.push(unit.version.clone());
                continue;
            }

            // Fail-fast: an Err here propagates and no later unit is
            // attempted, since it may assume this one's effects.
            let outcome = self.executor.apply(client, unit)?;
            log::info!(
                "{position} {} applied in {} ms{}",
                unit.version,
                outcome.execution_time_ms,
                if outcome.transactional {
                    ""
                } else {
                    " (non-transactional)"
                }
            );

            let entry = LedgerEntry {
                version: unit.version.clone(),
                filename: unit.filename.clone(),
                description: unit.description.clone(),
                executed_at: Utc::now(),
                execution_time_ms: outcome.execution_time_ms as i64,
                checksum: outcome.checksum,
                batch_id,
            };

            if let Err(e) = Ledger::new(client).record(&entry) {
                // The schema change is in; only the bookkeeping failed.
                log::warn!(
                    "{} applied but NOT recorded: {e}. \
                     Reconcile the ledger before the next run.",
                    unit.version
                );
                report.unrecorded.push(LedgerWriteWarning {
                    version: unit.version.clone(),
                    detail: e.to_string(),
                });
            }
            report.applied.push(unit.version.clone());
        }

        log::info!("{}", report.summary());
        Ok(report)
    }

    /// Redo a single migration's effect: drop its ledger entry, then run the
    /// full batch, which re-applies only that version.
    ///
    /// Every other entry keeps its executed_at and checksum untouched; the
    /// re-applied version gets this run's batch id.
    pub fn rerun(
        &self,
        client: &mut Client,
        set: &DiscoveredSet,
        version: &str,
    ) -> Result<BatchReport, FloodgateError> {
        let mut ledger = Ledger::new(client);
        ledger.ensure_table()?;
        if ledger.exists(version)? {
            ledger.delete(version)?;
        } else {
            log::warn!("No ledger entry for {version}; running the batch anyway");
        }
        self.run(client, set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drift(version: &str) -> DriftWarning {
        DriftWarning {
            version: version.to_string(),
            filename: format!("{version}_create_tenants.sql"),
            recorded: "0f3a9c1d2b4e6a78".to_string(),
            current: "aa11bb22cc33dd44".to_string(),
        }
    }

    #[test]
    fn summary_counts_every_category() {
        let mut report = BatchReport::new(Uuid::new_v4());
        report.applied.push("20250104_093000_010".to_string());
        report.applied.push("20250104_093000_020".to_string());
        report.skipped.push("20250103_120000_010".to_string());
        report.drift.push(drift("20250103_120000_010"));
        report.unrecorded.push(LedgerWriteWarning {
            version: "20250104_093000_020".to_string(),
            detail: "duplicate key value violates unique constraint".to_string(),
        });

        let summary = report.summary();
        assert!(summary.contains(&report.batch_id.to_string()));
        assert!(summary.contains("2 applied"));
        assert!(summary.contains("1 skipped"));
        assert!(summary.contains("1 drifted"));
        assert!(summary.contains("1 unrecorded"));
    }

    #[test]
    fn empty_report_summary_is_all_zeros() {
        let report = BatchReport::new(Uuid::new_v4());
        let summary = report.summary();
        assert!(summary.contains("0 applied, 0 skipped, 0 drifted, 0 unrecorded"));
    }

    #[test]
    fn drift_warning_names_version_and_both_digests() {
        let warning = drift("20250103_120000_010");
        let rendered = warning.to_string();
        assert!(rendered.contains("20250103_120000_010"));
        assert!(rendered.contains("0f3a9c1d2b4e6a78"));
        assert!(rendered.contains("aa11bb22cc33dd44"));
    }

    #[test]
    fn applied_but_unrecorded_still_counts_as_applied() {
        // Degraded success: the schema change is in even when the ledger
        // write failed, so the version lands in both lists.
        let mut report = BatchReport::new(Uuid::new_v4());
        let version = "20250104_093000_010".to_string();
        report.unrecorded.push(LedgerWriteWarning {
            version: version.clone(),
            detail: "connection reset".to_string(),
        });
        report.applied.push(version.clone());

        assert!(report.applied.contains(&version));
        assert_eq!(report.unrecorded.len(), 1);
        assert!(report.summary().contains("1 applied"));
        assert!(report.summary().contains("1 unrecorded"));
    }
}
