//! SQL statement splitting and classification
//!
//! The executor needs two pieces of lexical knowledge about a migration body:
//! where the statement boundaries are (for the non-transactional path, which
//! executes statements one at a time), and whether any statement belongs to
//! the small family PostgreSQL refuses to run inside a transaction block.
//! Nothing here understands SQL semantics; this is boundary detection only.

use once_cell::sync::Lazy;
use regex::Regex;

/// Classification of a single SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Ordinary statement, safe inside a transaction
    Plain,
    /// Statement PostgreSQL forbids inside a transaction block
    NonTransactional,
    /// Explicit BEGIN/COMMIT/ROLLBACK in the body
    TransactionControl,
}

// Statement shapes PostgreSQL rejects with "cannot run inside a transaction
// block". ALTER TYPE ... ADD VALUE is the one that shows up in practice for
// enum growth; the CONCURRENTLY and VACUUM forms are included for the same
// reason.
static NON_TRANSACTIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^\s*(?:ALTER\s+TYPE\s+.+\bADD\s+VALUE\b|CREATE\s+(?:UNIQUE\s+)?INDEX\s+CONCURRENTLY\b|DROP\s+INDEX\s+CONCURRENTLY\b|REINDEX\s+.*\bCONCURRENTLY\b|VACUUM\b)",
    )
    .expect("non-transactional statement pattern is valid")
});

static TRANSACTION_CONTROL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:BEGIN|COMMIT|ROLLBACK|END|START\s+TRANSACTION)\b")
        .expect("transaction control pattern is valid")
});

/// Classify one statement by its leading keywords.
///
/// Comments ahead of the first keyword are skipped so a commented header
/// cannot hide an `ALTER TYPE ... ADD VALUE` from the policy check.
pub fn classify(statement: &str) -> StatementKind {
    let stripped = strip_leading_comments(statement);
    if NON_TRANSACTIONAL.is_match(stripped) {
        StatementKind::NonTransactional
    } else if TRANSACTION_CONTROL.is_match(stripped) {
        StatementKind::TransactionControl
    } else {
        StatementKind::Plain
    }
}

fn strip_leading_comments(statement: &str) -> &str {
    let mut rest = statement.trim_start();
    loop {
        if let Some(stripped) = rest.strip_prefix("--") {
            rest = match stripped.find('\n') {
                Some(nl) => stripped[nl + 1..].trim_start(),
                None => "",
            };
        } else if let Some(stripped) = rest.strip_prefix("/*") {
            rest = match stripped.find("*/") {
                Some(end) => stripped[end + 2..].trim_start(),
                None => "",
            };
        } else {
            return rest;
        }
    }
}

/// True if any statement in `body` must run outside a transaction block.
pub fn body_requires_non_transactional(body: &str) -> bool {
    split(body)
        .iter()
        .any(|s| classify(s) == StatementKind::NonTransactional)
}

/// Split a migration body into individual statements.
///
/// Splits on top-level semicolons, honoring single-quoted strings (with `''`
/// escapes), dollar-quoted strings (`$tag$ ... $tag$`), line comments and
/// block comments. Empty fragments are dropped; statements keep their
/// original text minus the terminating semicolon.
pub fn split(body: &str) -> Vec<String> {
    let bytes = body.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\'' {
                        // '' is an escaped quote, not a terminator
                        if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'$' => {
                if let Some(tag_end) = dollar_tag_end(bytes, i) {
                    let tag = &body[i..tag_end];
                    // Scan for the matching closing tag
                    if let Some(close) = body[tag_end..].find(tag) {
                        i = tag_end + close + tag.len();
                    } else {
                        // Unterminated dollar quote: consume the rest
                        i = bytes.len();
                    }
                } else {
                    i += 1;
                }
            }
            b'-' if i + 1 < bytes.len() && bytes[i + 1] == b'-' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            b';' => {
                push_statement(&mut statements, &body[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    push_statement(&mut statements, &body[start..]);
    statements
}

/// If `bytes[at]` starts a dollar-quote tag (`$$` or `$ident$`), return the
/// index one past the closing `$` of the tag.
fn dollar_tag_end(bytes: &[u8], at: usize) -> Option<usize> {
    debug_assert_eq!(bytes[at], b'$');
    let mut j = at + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'$' => return Some(j + 1),
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' => j += 1,
            _ => return None,
        }
    }
    None
}

fn push_statement(statements: &mut Vec<String>, fragment: &str) {
    let trimmed = fragment.trim();
    if !trimmed.is_empty() && !is_only_comments(trimmed) {
        statements.push(trimmed.to_string());
    }
}

/// A fragment consisting solely of comments is not a statement.
fn is_only_comments(fragment: &str) -> bool {
    strip_leading_comments(fragment).is_empty()
}
