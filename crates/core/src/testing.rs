//! Shared fixtures for core tests.

use sqlx::SqlitePool;

pub(crate) async fn insert_company(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query("INSERT INTO company (company_name, email) VALUES (?, ?)")
        .bind(name)
        .bind(format!("{}@example.test", name.to_lowercase().replace(' ', ".")))
        .execute(pool)
        .await
        .expect("company insert")
        .last_insert_rowid()
}

pub(crate) async fn insert_specialty(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query("INSERT INTO specialty (specialty_name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await
        .expect("specialty insert")
        .last_insert_rowid()
}

pub(crate) async fn insert_prestation(
    pool: &SqlitePool,
    name: &str,
    code: &str,
    specialty_id: i64,
) -> i64 {
    sqlx::query(
        "INSERT INTO prestation_list (prestation_name, prestation_code, specialty_id) VALUES (?, ?, ?)",
    )
    .bind(name)
    .bind(code)
    .bind(specialty_id)
    .execute(pool)
    .await
    .expect("prestation insert")
    .last_insert_rowid()
}

pub(crate) async fn insert_medical_record(
    pool: &SqlitePool,
    contract_id: i64,
    status: &str,
    care_date: &str,
) -> i64 {
    sqlx::query(
        "INSERT INTO medical_record (contract_id, status, prise_en_charge_date) VALUES (?, ?, ?)",
    )
    .bind(contract_id)
    .bind(status)
    .bind(care_date)
    .execute(pool)
    .await
    .expect("medical record insert")
    .last_insert_rowid()
}
