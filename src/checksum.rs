//! Checksum calculation for migration files

use sha2::{Digest, Sha256};

/// Stored digest length in hex characters.
///
/// The digest is used for drift detection, not security-critical identity,
/// so a truncated SHA-256 prefix keeps ledger rows compact while remaining
/// collision-resistant for this purpose.
pub const CHECKSUM_LEN: usize = 16;

/// Calculate the truncated SHA-256 checksum of migration file content.
///
/// Used to detect that migration files haven't been modified after being
/// applied to the database. Pure function: same bytes, same digest.
pub fn checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = hasher.finalize();
    let mut hex = format!("{hash:x}");
    hex.truncate(CHECKSUM_LEN);
    hex
}

/// Compare a stored checksum against one calculated from current content.
#[must_use]
pub fn matches(stored: &str, current: &str) -> bool {
    stored == current
}
