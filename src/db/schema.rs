pub(crate) const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS transaction_limit (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id  TEXT NOT NULL,
    category        TEXT NOT NULL,
    card_number     TEXT NOT NULL,
    mcc             TEXT NOT NULL,
    status          TEXT NOT NULL,
    transaction_at  TEXT NOT NULL,
    currency        TEXT NOT NULL DEFAULT '',
    amount          TEXT NOT NULL,
    tenant_id       TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_transaction_limit_window
    ON transaction_limit(card_number, category, mcc, transaction_at);

CREATE TABLE IF NOT EXISTS spend_limit (
    category  TEXT NOT NULL,
    mcc       TEXT NOT NULL,
    amount    TEXT NOT NULL,
    day       INTEGER NOT NULL DEFAULT 0,
    hour      INTEGER NOT NULL DEFAULT 0,
    minute    INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (category, mcc)
);

CREATE TABLE IF NOT EXISTS breach_limit (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    fk_id_trans_limit  INTEGER NOT NULL REFERENCES transaction_limit(id),
    transaction_id     TEXT NOT NULL,
    mcc                TEXT NOT NULL,
    status             TEXT NOT NULL,
    amount             TEXT NOT NULL,
    count              INTEGER NOT NULL,
    created_at         TEXT NOT NULL,
    tenant_id          TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS type_limit (
    code        TEXT PRIMARY KEY,
    category    TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS order_limit (
    id                     INTEGER PRIMARY KEY AUTOINCREMENT,
    fk_type_limit_code     TEXT NOT NULL REFERENCES type_limit(code),
    fk_counter_limit_code  TEXT NOT NULL CHECK (fk_counter_limit_code IN ('VALUE', 'QUANTITY', 'MINUTE')),
    type                   TEXT NOT NULL,
    amount                 TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_order_limit_type
    ON order_limit(fk_type_limit_code, type);

CREATE TABLE IF NOT EXISTS limit_transaction (
    id                     INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id         TEXT NOT NULL,
    key                    TEXT NOT NULL,
    fk_type_limit_code     TEXT NOT NULL,
    fk_counter_limit_code  TEXT NOT NULL,
    fk_order_limit_type    TEXT NOT NULL,
    status                 TEXT NOT NULL,
    amount                 TEXT NOT NULL,
    created_at             TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_limit_transaction_window
    ON limit_transaction(key, fk_type_limit_code, fk_order_limit_type, fk_counter_limit_code, created_at);
"#;

pub(crate) const CURRENT_VERSION: i32 = 1;

/// Migrations from version N to N+1.
/// Each entry is (from_version, sql).
pub(crate) const MIGRATIONS: &[(i32, &str)] = &[
    // Future migrations go here:
    // (1, "ALTER TABLE spend_limit ADD COLUMN currency TEXT NOT NULL DEFAULT '';"),
];
