//! Migration file discovery and parsing

use crate::checksum;
use crate::error::FloodgateError;
use crate::statement;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// Filename pattern: `<8-digit-date>_<6-digit-time>_<3-digit-sequence>_<label>.sql`
///
/// Example: `20250104_093000_010_create_tenants.sql`
static FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{8})_(\d{6})_(\d{3})_(.+)\.sql$").expect("filename pattern is valid")
});

/// How many leading lines are scanned for a `-- Description:` marker.
const DESCRIPTION_SCAN_LINES: usize = 10;

/// One discovered migration file, ready for execution.
///
/// Constructed fresh on every invocation by reading the file system; it has
/// no persistent identity beyond the file.
#[derive(Debug, Clone)]
pub struct MigrationUnit {
    /// Ordered identifier: `YYYYMMDD_HHMMSS_NNN`. The only ordering key.
    pub version: String,
    /// File name the unit came from
    pub filename: String,
    /// Path to the file
    pub path: PathBuf,
    /// Human-readable description from the leading comment lines (may be empty)
    pub description: String,
    /// Full file content, passed to the executor verbatim
    pub body: String,
    /// Truncated content digest for the ledger
    pub checksum: String,
    /// True if the body contains a statement PostgreSQL forbids inside a
    /// transaction block
    pub requires_non_transactional: bool,
}

impl MigrationUnit {
    /// Parse a file name into its version prefix and label.
    ///
    /// Returns `None` for names that do not match the convention.
    pub fn parse_filename(filename: &str) -> Option<(String, String)> {
        FILENAME.captures(filename).map(|caps| {
            let version = format!("{}_{}_{}", &caps[1], &caps[2], &caps[3]);
            (version, caps[4].to_string())
        })
    }
}

/// A file that was present but excluded from the run.
#[derive(Debug, Clone)]
pub enum DiscoveryWarning {
    /// File name does not match the naming convention
    NonConforming { filename: String },
    /// A second file claims an already-seen version prefix
    DuplicateVersion { filename: String, version: String },
}

impl std::fmt::Display for DiscoveryWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryWarning::NonConforming { filename } => {
                write!(
                    f,
                    "Skipping '{filename}': name does not match \
                     YYYYMMDD_HHMMSS_NNN_label.sql"
                )
            }
            DiscoveryWarning::DuplicateVersion { filename, version } => {
                write!(f, "Skipping '{filename}': version {version} already seen")
            }
        }
    }
}

/// Result of a directory scan: ordered units plus non-fatal warnings.
#[derive(Debug, Default)]
pub struct DiscoveredSet {
    /// Units in execution order (version-string ascending)
    pub units: Vec<MigrationUnit>,
    /// Files that were excluded, for operator reporting
    pub warnings: Vec<DiscoveryWarning>,
}

impl DiscoveredSet {
    /// Look up a unit by version.
    pub fn find(&self, version: &str) -> Option<&MigrationUnit> {
        self.units.iter().find(|u| u.version == version)
    }
}

/// Scan a directory for migration files.
///
/// Files matching the naming convention are read, parsed and returned sorted
/// by version string ascending. Directory enumeration order is never trusted;
/// the sort is explicit. Non-conforming names are collected as warnings and
/// excluded, never fatal. A missing or non-directory path is an error.
pub fn discover(migrations_dir: &Path) -> Result<DiscoveredSet, FloodgateError> {
    if !migrations_dir.is_dir() {
        return Err(FloodgateError::Io(format!(
            "Migrations directory not found: {}",
            migrations_dir.display()
        )));
    }

    let entries = fs::read_dir(migrations_dir).map_err(|e| {
        FloodgateError::Io(format!(
            "Failed to read migrations directory {}: {e}",
            migrations_dir.display()
        ))
    })?;

    let mut units: Vec<MigrationUnit> = Vec::new();
    let mut warnings = Vec::new();

    for entry in entries {
        let entry =
            entry.map_err(|e| FloodgateError::Io(format!("Failed to read directory entry: {e}")))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        let Some((version, _label)) = MigrationUnit::parse_filename(&filename) else {
            warnings.push(DiscoveryWarning::NonConforming { filename });
            continue;
        };

        let body = fs::read_to_string(&path).map_err(|e| {
            FloodgateError::Io(format!("Failed to read {}: {e}", path.display()))
        })?;

        units.push(MigrationUnit {
            checksum: checksum::checksum(&body),
            description: extract_description(&body),
            requires_non_transactional: statement::body_requires_non_transactional(&body),
            version,
            filename,
            path,
            body,
        });
    }

    // Explicit ordering: version string first, filename as tie-break so
    // duplicate detection is deterministic regardless of enumeration order.
    units.sort_by(|a, b| {
        a.version
            .cmp(&b.version)
            .then_with(|| a.filename.cmp(&b.filename))
    });

    let mut deduped: Vec<MigrationUnit> = Vec::with_capacity(units.len());
    for unit in units {
        if deduped.last().map(|p| p.version.as_str()) == Some(unit.version.as_str()) {
            warnings.push(DiscoveryWarning::DuplicateVersion {
                filename: unit.filename,
                version: unit.version,
            });
        } else {
            deduped.push(unit);
        }
    }

    Ok(DiscoveredSet {
        units: deduped,
        warnings,
    })
}

/// Scan the leading comment lines for a `-- Description:` marker.
///
/// Absence is not an error; the description just stays empty.
fn extract_description(body: &str) -> String {
    for line in body.lines().take(DESCRIPTION_SCAN_LINES) {
        let trimmed = line.trim_start();
        let Some(comment) = trimmed.strip_prefix("--") else {
            continue;
        };
        let comment = comment.trim_start();
        if let Some(rest) = comment.strip_prefix("Description:") {
            return rest.trim().to_string();
        }
    }
    String::new()
}
