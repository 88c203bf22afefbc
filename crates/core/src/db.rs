//! Database pool construction and schema management.
//!
//! The schema is applied at startup from embedded DDL. Superseding
//! relationships are self-referencing nullable foreign keys
//! (`superseded_by`), and "exactly one current row per logical key" is
//! enforced with partial unique indexes rather than left to application
//! discipline.

use crate::error::BillingResult;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Embedded schema, idempotent (`IF NOT EXISTS` throughout).
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS company (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    company_name TEXT NOT NULL,
    email        TEXT UNIQUE
);

CREATE TABLE IF NOT EXISTS specialty (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    specialty_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS prestation_list (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    prestation_name TEXT NOT NULL,
    prestation_code TEXT NOT NULL,
    specialty_id    INTEGER NOT NULL REFERENCES specialty(id)
);

CREATE TABLE IF NOT EXISTS contract (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    contract_name TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'Pending',
    company_id    INTEGER NOT NULL REFERENCES company(id),
    is_general    INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL DEFAULT (datetime('now'))
);

-- At most one contract may be the designated general/public fallback.
CREATE UNIQUE INDEX IF NOT EXISTS one_general_contract
    ON contract (is_general) WHERE is_general = 1;

CREATE TABLE IF NOT EXISTS avenant (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    contract_id   INTEGER NOT NULL REFERENCES contract(id),
    status        TEXT NOT NULL DEFAULT 'Pending',
    head          INTEGER NOT NULL DEFAULT 0,
    activate_at   TEXT,
    inactive_at   TEXT,
    superseded_by INTEGER REFERENCES avenant(id),
    created_at    TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Activation exclusivity: one Active generation per contract.
CREATE UNIQUE INDEX IF NOT EXISTS one_active_avenant
    ON avenant (contract_id) WHERE status = 'Active';

-- Two concurrent amendment creations cannot both claim descent from the
-- same predecessor.
CREATE UNIQUE INDEX IF NOT EXISTS avenant_successor
    ON avenant (superseded_by) WHERE superseded_by IS NOT NULL;

CREATE TABLE IF NOT EXISTS agreement_details (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    contract_id         INTEGER NOT NULL REFERENCES contract(id),
    avenant_id          INTEGER REFERENCES avenant(id),
    head                INTEGER NOT NULL DEFAULT 0,
    start_date          TEXT NOT NULL,
    end_date            TEXT NOT NULL,
    max_price           REAL,
    min_price           REAL,
    discount_percentage REAL,
    family_auth         TEXT,
    superseded_by       INTEGER REFERENCES agreement_details(id)
);

CREATE UNIQUE INDEX IF NOT EXISTS current_agreement_details
    ON agreement_details (contract_id, ifnull(avenant_id, 0))
    WHERE superseded_by IS NULL;

CREATE TABLE IF NOT EXISTS annex (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    annex_name   TEXT NOT NULL,
    contract_id  INTEGER NOT NULL REFERENCES contract(id),
    specialty_id INTEGER NOT NULL REFERENCES specialty(id),
    created_by   TEXT NOT NULL DEFAULT 'manual',
    created_at   TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS prestation_price (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    price              REAL NOT NULL,
    patient_part       REAL NOT NULL,
    tva                REAL NOT NULL DEFAULT 0,
    annex_id           INTEGER NOT NULL REFERENCES annex(id),
    prestation_list_id INTEGER NOT NULL REFERENCES prestation_list(id),
    avenant_id         INTEGER REFERENCES avenant(id),
    head               INTEGER NOT NULL DEFAULT 0,
    activate_at        TEXT,
    superseded_by      INTEGER REFERENCES prestation_price(id),
    created_at         TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE UNIQUE INDEX IF NOT EXISTS current_prestation_price
    ON prestation_price (annex_id, prestation_list_id, ifnull(avenant_id, 0))
    WHERE superseded_by IS NULL;

CREATE TABLE IF NOT EXISTS medical_record (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    contract_id          INTEGER NOT NULL REFERENCES contract(id),
    status               TEXT NOT NULL DEFAULT 'open',
    prise_en_charge_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS prestation_medical_record (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    medical_record_id   INTEGER NOT NULL REFERENCES medical_record(id),
    prestation_price_id INTEGER NOT NULL REFERENCES prestation_price(id),
    doctor_id           INTEGER NOT NULL,
    prestation_price    REAL NOT NULL,
    payment_status      TEXT NOT NULL DEFAULT 'unpaid',
    created_at          TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Open a pool against `database_url`, creating the SQLite file if needed.
pub async fn connect(database_url: &str) -> BillingResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Apply the embedded schema. Safe to run on every startup.
pub async fn migrate(pool: &SqlitePool) -> BillingResult<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    tracing::debug!("schema applied");
    Ok(())
}

/// In-memory pool with the schema applied, for tests.
///
/// Capped at one connection: every pooled connection to `:memory:` is an
/// independent database, so a larger pool would scatter state.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("memory url should parse")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("in-memory pool should open");
    migrate(&pool).await.expect("schema should apply");
    pool
}
