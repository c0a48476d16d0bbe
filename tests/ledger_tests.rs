//! Ledger tests against a live PostgreSQL instance.
//!
//! Skipped unless `FLOODGATE_TEST_DATABASE_URL` points at a database the
//! suite may write to. Each test works inside its own schema so concurrent
//! runs do not collide.

use chrono::Utc;
use floodgate::ledger::{Ledger, LedgerEntry};
use postgres::{Client, NoTls};
use uuid::Uuid;

fn test_client() -> Option<Client> {
    let url = std::env::var("FLOODGATE_TEST_DATABASE_URL").ok()?;
    let mut client = Client::connect(&url, NoTls).ok()?;
    let schema = format!("floodgate_test_{}", Uuid::new_v4().simple());
    client
        .batch_execute(&format!(
            "CREATE SCHEMA {schema}; SET search_path TO {schema}"
        ))
        .ok()?;
    Some(client)
}

fn entry(version: &str) -> LedgerEntry {
    LedgerEntry {
        version: version.to_string(),
        filename: format!("{version}_create_tenants.sql"),
        description: "create tenants".to_string(),
        executed_at: Utc::now(),
        execution_time_ms: 12,
        checksum: "0f3a9c1d2b4e6a78".to_string(),
        batch_id: Uuid::new_v4(),
    }
}

#[test]
fn exists_tracks_record_and_delete() {
    let Some(mut client) = test_client() else {
        return;
    };
    let mut ledger = Ledger::new(&mut client);
    ledger.ensure_table().unwrap();

    let version = "20250104_093000_010";
    assert!(!ledger.exists(version).unwrap());

    ledger.record(&entry(version)).unwrap();
    assert!(ledger.exists(version).unwrap());
    assert_eq!(
        ledger.recorded_checksum(version).unwrap().as_deref(),
        Some("0f3a9c1d2b4e6a78")
    );

    assert_eq!(ledger.delete(version).unwrap(), 1);
    assert!(!ledger.exists(version).unwrap());
}

#[test]
fn duplicate_record_reports_ledger_write_failure() {
    let Some(mut client) = test_client() else {
        return;
    };
    let mut ledger = Ledger::new(&mut client);
    ledger.ensure_table().unwrap();

    let version = "20250104_093000_020";
    ledger.record(&entry(version)).unwrap();
    let err = ledger.record(&entry(version)).unwrap_err();
    assert!(err.to_string().contains(version));
}
