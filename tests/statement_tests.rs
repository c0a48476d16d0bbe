//! Statement handling over realistic migration bodies

use floodgate::statement::{self, StatementKind};

#[test]
fn realistic_migration_splits_cleanly() {
    let body = r#"
-- Description: audit rules and trigger
CREATE TABLE audit_rules (
    id BIGSERIAL PRIMARY KEY,
    tenant_id BIGINT NOT NULL,
    expression TEXT NOT NULL DEFAULT 'amount > 0; -- not a boundary'
);

CREATE FUNCTION audit_touch() RETURNS trigger AS $$
BEGIN
    NEW.updated_at := now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_audit_touch
    BEFORE UPDATE ON audit_rules
    FOR EACH ROW EXECUTE FUNCTION audit_touch();
"#;

    let stmts = statement::split(body);
    assert_eq!(stmts.len(), 3);
    assert!(stmts.iter().all(|s| statement::classify(s) == StatementKind::Plain));
}

#[test]
fn plpgsql_begin_is_not_transaction_control() {
    // BEGIN inside a dollar-quoted function body must not be classified as
    // explicit transaction control of the migration itself.
    let body = r#"
CREATE FUNCTION f() RETURNS void AS $$
BEGIN
    PERFORM 1;
END;
$$ LANGUAGE plpgsql;
"#;
    let stmts = statement::split(body);
    assert_eq!(stmts.len(), 1);
    assert_eq!(statement::classify(&stmts[0]), StatementKind::Plain);
}

#[test]
fn mixed_enum_growth_body_classification() {
    let body = "ALTER TYPE order_status ADD VALUE 'refunded';\n\
                UPDATE orders SET note = 'see; ticket' WHERE id = 1;\n";
    let stmts = statement::split(body);
    assert_eq!(stmts.len(), 2);
    assert_eq!(statement::classify(&stmts[0]), StatementKind::NonTransactional);
    assert_eq!(statement::classify(&stmts[1]), StatementKind::Plain);
    assert!(statement::body_requires_non_transactional(body));
}

#[test]
fn explicit_begin_commit_detected_at_top_level() {
    let body = "BEGIN;\nALTER TYPE s ADD VALUE 'x';\nCOMMIT;\n";
    let kinds: Vec<_> = statement::split(body)
        .iter()
        .map(|s| statement::classify(s))
        .collect();
    assert_eq!(
        kinds,
        vec![
            StatementKind::TransactionControl,
            StatementKind::NonTransactional,
            StatementKind::TransactionControl,
        ]
    );
}

#[test]
fn vacuum_and_concurrent_index_are_non_transactional() {
    assert!(statement::body_requires_non_transactional(
        "VACUUM ANALYZE transactions;"
    ));
    assert!(statement::body_requires_non_transactional(
        "CREATE INDEX CONCURRENTLY idx_tx_tenant ON transactions (tenant_id);"
    ));
    assert!(!statement::body_requires_non_transactional(
        "CREATE INDEX idx_tx_tenant ON transactions (tenant_id);"
    ));
}
