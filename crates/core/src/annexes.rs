//! Annex management.
//!
//! An annex is a per-specialty price-list container scoped to one
//! contract, created either manually or by the amendment price
//! bootstrap (`created_by` records which). The "no activation without
//! an annex" rule is enforced by the contract lifecycle, not here; this
//! module only answers `has_prestations` so the API layer can block a
//! delete before the cascading model-level delete runs.

use sqlx::SqlitePool;

use crate::error::{BillingError, BillingResult};
use api_shared::dto::{AnnexDetail, AnnexReq, AnnexRes};

#[derive(Clone)]
pub struct AnnexService {
    pool: SqlitePool,
}

impl AnnexService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, contract_id: i64, req: AnnexReq) -> BillingResult<AnnexRes> {
        if req.annex_name.trim().is_empty() {
            return Err(BillingError::InvalidInput("annex_name is required".into()));
        }

        let contract: Option<i64> = sqlx::query_scalar("SELECT id FROM contract WHERE id = ?")
            .bind(contract_id)
            .fetch_optional(&self.pool)
            .await?;
        if contract.is_none() {
            return Err(BillingError::NotFound("Contract not found"));
        }

        let id = sqlx::query(
            "INSERT INTO annex (annex_name, contract_id, specialty_id, created_by)
             VALUES (?, ?, ?, 'manual')",
        )
        .bind(&req.annex_name)
        .bind(contract_id)
        .bind(req.specialty_id)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(AnnexRes {
            id,
            annex_name: req.annex_name,
            contract_id,
            specialty_id: req.specialty_id,
            created_by: "manual".into(),
        })
    }

    pub async fn update(&self, annex_id: i64, req: AnnexReq) -> BillingResult<AnnexRes> {
        let res = sqlx::query("UPDATE annex SET annex_name = ?, specialty_id = ? WHERE id = ?")
            .bind(&req.annex_name)
            .bind(req.specialty_id)
            .bind(annex_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(BillingError::NotFound("Annex not found"));
        }

        let (contract_id, created_by): (i64, String) =
            sqlx::query_as("SELECT contract_id, created_by FROM annex WHERE id = ?")
                .bind(annex_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(AnnexRes {
            id: annex_id,
            annex_name: req.annex_name,
            contract_id,
            specialty_id: req.specialty_id,
            created_by,
        })
    }

    pub async fn get(&self, annex_id: i64) -> BillingResult<AnnexDetail> {
        let row = sqlx::query_as::<_, (i64, String, i64, i64, String, String, String)>(
            "SELECT annex.id, annex.annex_name, annex.contract_id, annex.specialty_id,
                    specialty.specialty_name, annex.created_at, annex.created_by
             FROM annex
             JOIN specialty ON annex.specialty_id = specialty.id
             WHERE annex.id = ?",
        )
        .bind(annex_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(BillingError::NotFound("Annex not found"))?;

        let (id, annex_name, contract_id, specialty_id, specialty_name, created_at, created_by) =
            row;
        Ok(AnnexDetail {
            id,
            annex_name,
            contract_id,
            specialty_id,
            specialty_name,
            created_at,
            created_by,
        })
    }

    pub async fn list_for_contract(&self, contract_id: i64) -> BillingResult<Vec<AnnexDetail>> {
        let rows = sqlx::query_as::<_, (i64, String, i64, i64, String, String, String)>(
            "SELECT annex.id, annex.annex_name, annex.contract_id, annex.specialty_id,
                    specialty.specialty_name, annex.created_at, annex.created_by
             FROM annex
             JOIN specialty ON annex.specialty_id = specialty.id
             WHERE annex.contract_id = ?
             ORDER BY annex.id DESC",
        )
        .bind(contract_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, annex_name, contract_id, specialty_id, specialty_name, created_at, created_by)| {
                    AnnexDetail {
                        id,
                        annex_name,
                        contract_id,
                        specialty_id,
                        specialty_name,
                        created_at,
                        created_by,
                    }
                },
            )
            .collect())
    }

    /// Whether the annex still has current (non-superseded) price rows.
    pub async fn has_prestations(&self, annex_id: i64) -> BillingResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM prestation_price
             WHERE annex_id = ? AND superseded_by IS NULL",
        )
        .bind(annex_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Delete the annex and every price row under it, current or
    /// historical, in one transaction. The annex itself is going away,
    /// so history is not preserved.
    pub async fn delete(&self, annex_id: i64) -> BillingResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM prestation_price WHERE annex_id = ?")
            .bind(annex_id)
            .execute(&mut *tx)
            .await?;

        let res = sqlx::query("DELETE FROM annex WHERE id = ?")
            .bind(annex_id)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(BillingError::NotFound("Annex not found"));
        }

        tx.commit().await?;
        tracing::info!(annex_id, "annex deleted with price rows");
        Ok(())
    }
}
