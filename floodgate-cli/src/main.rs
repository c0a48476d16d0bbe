//! Floodgate migration CLI
//!
//! Thin front end over the floodgate library: dispatches subcommands, owns
//! the confirmation prompt for destructive actions, and maps every failure
//! to a non-zero exit code.

use clap::{Parser, Subcommand};
use colored::Colorize;
use floodgate::{discovery, session, status, BatchCoordinator, BatchReport, MigrateConfig};
use std::io::Write;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "floodgate")]
#[command(about = "Versioned SQL migration runner for PostgreSQL")]
#[command(version = "0.1.0")]
struct Cli {
    /// Migrations directory path
    #[arg(long, default_value = "migrations")]
    migrations_dir: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show aggregate statistics and per-migration report
    Status,

    /// Clear the ledger so every migration re-applies on the next run
    Reset {
        /// Skip the interactive confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Delete one version's ledger entry, then run the full batch
    Rerun {
        /// Migration version (YYYYMMDD_HHMMSS_NNN)
        version: String,
    },

    /// Refresh planner statistics (ANALYZE)
    Optimize,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    dotenv::dotenv().ok();

    let config = match MigrateConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {e}", "Error:".red().bold());
            process::exit(1);
        }
    };
    log::debug!(
        "Target database {}:{}/{} as {}",
        config.host,
        config.port,
        config.dbname,
        config.user
    );

    let result = match cli.command {
        None => run_batch(&config, &cli.migrations_dir),
        Some(Commands::Status) => show_status(&config, &cli.migrations_dir),
        Some(Commands::Reset { yes }) => reset_ledger(&config, yes),
        Some(Commands::Rerun { version }) => rerun(&config, &cli.migrations_dir, &version),
        Some(Commands::Optimize) => optimize(&config),
    };

    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            eprintln!("{} run failed", "❌".red());
            process::exit(1);
        }
    }
}

/// Default command: ensure database, ensure ledger, run the batch, print
/// status.
fn run_batch(config: &MigrateConfig, migrations_dir: &PathBuf) -> anyhow::Result<()> {
    session::ensure_database(config)?;
    let mut client = session::connect(config)?;

    let set = discovery::discover(migrations_dir)?;
    for warning in &set.warnings {
        println!("{} {warning}", "⚠".yellow());
    }

    let report = BatchCoordinator::new(config.clone()).run(&mut client, &set)?;
    print_report(&report);

    let status = status::report(&mut client, Some(&set))?;
    print_stats(&status);
    Ok(())
}

fn print_report(report: &BatchReport) {
    for version in &report.applied {
        println!("  {} {version}", "applied".green());
    }
    for version in &report.skipped {
        println!("  {} {version}", "skipped".dimmed());
    }
    for drift in &report.drift {
        println!("  {} {drift}", "drift".yellow().bold());
    }
    for unrecorded in &report.unrecorded {
        println!(
            "  {} {} applied but not recorded: {}",
            "UNRECORDED".red().bold(),
            unrecorded.version,
            unrecorded.detail
        );
    }
    println!("{} {}", "✅".green(), report.summary());
}

fn show_status(config: &MigrateConfig, migrations_dir: &PathBuf) -> anyhow::Result<()> {
    let mut client = session::connect(config)?;

    // Drift flags need the current files; a missing directory just means no
    // drift comparison, status itself stays soft.
    let set = discovery::discover(migrations_dir).ok();
    let report = status::report(&mut client, set.as_ref())?;

    if report.ledger_missing {
        println!("{}", "No migrations yet (ledger table absent)".dimmed());
        return Ok(());
    }

    print_stats(&report);

    for row in &report.rows {
        let drift_marker = if row.drifted {
            " DRIFTED".yellow().bold().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} {:<28} {:>8} ms  {}{}",
            row.entry.version,
            truncate(&row.entry.filename, 28),
            row.entry.execution_time_ms,
            band_colored(row),
            drift_marker
        );
    }
    Ok(())
}

fn band_colored(row: &status::StatusRow) -> colored::ColoredString {
    match row.band {
        status::PerfBand::Fast => row.band.label().green(),
        status::PerfBand::Slow => row.band.label().yellow(),
        status::PerfBand::VerySlow => row.band.label().red().bold(),
    }
}

fn print_stats(report: &status::StatusReport) {
    match &report.stats {
        Some(stats) => {
            println!("\n📋 {} migration(s) applied", stats.count);
            println!(
                "   avg {:.1} ms, max {} ms, total {} ms",
                stats.avg_execution_time_ms,
                stats.max_execution_time_ms,
                stats.total_execution_time_ms
            );
            println!(
                "   first {} / last {}",
                stats.first_applied_at.format("%Y-%m-%d %H:%M:%S UTC"),
                stats.last_applied_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        None => println!("{}", "No migrations yet".dimmed()),
    }
}

fn reset_ledger(config: &MigrateConfig, yes: bool) -> anyhow::Result<()> {
    if !yes && !confirm("Clear the entire migration ledger? Every migration will re-apply on the next run.")? {
        println!("Aborted");
        return Ok(());
    }

    let mut client = session::connect(config)?;
    let mut ledger = floodgate::Ledger::new(&mut client);
    ledger.ensure_table()?;
    let removed = ledger.clear()?;
    println!("{} Cleared {removed} ledger entries", "✅".green());
    Ok(())
}

fn rerun(config: &MigrateConfig, migrations_dir: &PathBuf, version: &str) -> anyhow::Result<()> {
    let mut client = session::connect(config)?;
    let set = discovery::discover(migrations_dir)?;
    let report = BatchCoordinator::new(config.clone()).rerun(&mut client, &set, version)?;
    print_report(&report);
    Ok(())
}

fn optimize(config: &MigrateConfig) -> anyhow::Result<()> {
    let mut client = session::connect(config)?;
    println!("Refreshing planner statistics...");
    session::refresh_statistics(&mut client)?;
    println!("{} Statistics refreshed", "✅".green());
    Ok(())
}

/// Interactive yes/no prompt; only an explicit `yes` proceeds.
fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt} Type 'yes' to continue: ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

/// Character-based truncation; labels are not restricted to ASCII, so byte
/// slicing could land inside a multibyte character.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn truncate_keeps_short_names_unchanged() {
        assert_eq!(truncate("short.sql", 28), "short.sql");
    }

    #[test]
    fn truncate_shortens_long_names_with_ellipsis() {
        let cut = truncate("20250104_093000_010_create_long_named_table.sql", 28);
        assert_eq!(cut.chars().count(), 28);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn truncate_handles_multibyte_labels() {
        // A multibyte character straddling the cut point must not panic
        let name = "20250104_093000_010_abcdefé_long_tail.sql";
        let cut = truncate(name, 28);
        assert_eq!(cut.chars().count(), 28);
        assert!(cut.ends_with('…'));

        let all_multibyte = "ééééééééééééééééééééééééééééééééé.sql";
        assert!(truncate(all_multibyte, 10).chars().count() <= 10);
    }
}
