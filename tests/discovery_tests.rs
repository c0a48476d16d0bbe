//! Tests for migration file discovery

use floodgate::discovery::{self, DiscoveryWarning};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, body: &str) {
    fs::write(dir.path().join(name), body).unwrap();
}

#[test]
fn nonexistent_directory_is_an_error() {
    let missing = PathBuf::from("/nonexistent/path/that/does/not/exist");
    let result = discovery::discover(&missing);

    match result {
        Err(e) => assert!(e.to_string().contains("not found")),
        Ok(_) => panic!("Expected error for nonexistent directory"),
    }
}

#[test]
fn empty_directory_yields_empty_set() {
    let dir = TempDir::new().unwrap();
    let set = discovery::discover(dir.path()).unwrap();
    assert!(set.units.is_empty());
    assert!(set.warnings.is_empty());
}

#[test]
fn units_are_sorted_by_version_not_enumeration_order() {
    let dir = TempDir::new().unwrap();
    // Written in reverse of intended order; sequence numbers differ
    write(&dir, "20250104_093000_010_a.sql", "SELECT 1;");
    write(&dir, "20250104_093000_005_b.sql", "SELECT 2;");
    write(&dir, "20250103_120000_001_c.sql", "SELECT 3;");

    let set = discovery::discover(dir.path()).unwrap();
    let versions: Vec<&str> = set.units.iter().map(|u| u.version.as_str()).collect();
    assert_eq!(
        versions,
        vec![
            "20250103_120000_001",
            "20250104_093000_005",
            "20250104_093000_010",
        ]
    );
}

#[test]
fn nonconforming_files_are_warned_and_excluded() {
    let dir = TempDir::new().unwrap();
    write(&dir, "20250104_093000_010_ok.sql", "SELECT 1;");
    write(&dir, "README.md", "# notes");
    write(&dir, "fix_things.sql", "SELECT 2;");
    write(&dir, "20250104_093000_ok.sql", "SELECT 3;");

    let set = discovery::discover(dir.path()).unwrap();
    assert_eq!(set.units.len(), 1);
    assert_eq!(set.warnings.len(), 3);
    assert!(set
        .warnings
        .iter()
        .all(|w| matches!(w, DiscoveryWarning::NonConforming { .. })));
}

#[test]
fn duplicate_versions_keep_first_and_warn() {
    let dir = TempDir::new().unwrap();
    write(&dir, "20250104_093000_010_alpha.sql", "SELECT 1;");
    write(&dir, "20250104_093000_010_beta.sql", "SELECT 2;");

    let set = discovery::discover(dir.path()).unwrap();
    assert_eq!(set.units.len(), 1);
    assert_eq!(set.units[0].filename, "20250104_093000_010_alpha.sql");
    assert!(matches!(
        set.warnings.as_slice(),
        [DiscoveryWarning::DuplicateVersion { version, .. }] if version == "20250104_093000_010"
    ));
}

#[test]
fn unit_carries_body_description_and_checksum() {
    let dir = TempDir::new().unwrap();
    let body = "-- Description: Adds the tenants table\nCREATE TABLE tenants (id BIGINT);\n";
    write(&dir, "20250104_093000_010_create_tenants.sql", body);

    let set = discovery::discover(dir.path()).unwrap();
    let unit = &set.units[0];
    assert_eq!(unit.description, "Adds the tenants table");
    assert_eq!(unit.body, body);
    assert_eq!(unit.checksum, floodgate::checksum::checksum(body));
    assert!(!unit.requires_non_transactional);
}

#[test]
fn enum_addition_is_flagged_non_transactional() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "20250104_093000_010_grow_enum.sql",
        "ALTER TYPE device_state ADD VALUE 'decommissioned';\n",
    );

    let set = discovery::discover(dir.path()).unwrap();
    assert!(set.units[0].requires_non_transactional);
}

#[test]
fn subdirectories_are_ignored() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("20250104_093000_010_not_a_file.sql")).unwrap();
    write(&dir, "20250104_093000_011_real.sql", "SELECT 1;");

    let set = discovery::discover(dir.path()).unwrap();
    assert_eq!(set.units.len(), 1);
    assert_eq!(set.units[0].version, "20250104_093000_011");
}

#[test]
fn rescan_is_restartable_and_stable() {
    let dir = TempDir::new().unwrap();
    write(&dir, "20250104_093000_005_b.sql", "SELECT 2;");
    write(&dir, "20250104_093000_010_a.sql", "SELECT 1;");

    let first = discovery::discover(dir.path()).unwrap();
    let second = discovery::discover(dir.path()).unwrap();
    let v1: Vec<_> = first.units.iter().map(|u| u.version.clone()).collect();
    let v2: Vec<_> = second.units.iter().map(|u| u.version.clone()).collect();
    assert_eq!(v1, v2);
}
