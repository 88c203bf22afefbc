//! Price resolution.
//!
//! Given a contract, a prestation, a specialty and an act date, find the
//! prestation-price row that governed that act. Resolution walks a fixed
//! candidate list: the contract named on the medical record first, then
//! the designated general contract as the public-tariff fallback.
//!
//! Within a candidate, the shape of the contract decides the lookup:
//!
//! * no avenants at all: the base price set (rows with no avenant) is the
//!   only generation, so look there;
//! * avenants exist: find the generation whose activation window covers
//!   the act date and look among its rows. A date older than every
//!   generation falls back to the same contract's base set (acts billed
//!   before the first amendment). A generation that simply lacks the
//!   prestation falls through to the next candidate, never back to base.
//!
//! None of the lookups filter on `superseded_by`: superseded rows are the
//! historical record, and an act dated inside an old generation's window
//! must resolve to the price that was in force then.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tokio::sync::OnceCell;

use crate::error::{BillingError, BillingResult};

#[derive(Clone)]
pub struct PriceResolver {
    pool: SqlitePool,
    general_contract: std::sync::Arc<OnceCell<i64>>,
}

impl PriceResolver {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            general_contract: std::sync::Arc::new(OnceCell::new()),
        }
    }

    /// Resolve the governing prestation-price row id.
    ///
    /// # Errors
    ///
    /// [`BillingError::NotFound`] when neither the requested contract nor
    /// the general contract carries a price for the prestation on the
    /// act date.
    pub async fn resolve(
        &self,
        contract_id: i64,
        prestation_list_id: i64,
        specialty_id: i64,
        act_date: NaiveDate,
    ) -> BillingResult<i64> {
        let mut candidates = vec![contract_id];
        if let Some(general) = self.general_contract_id().await? {
            if general != contract_id {
                candidates.push(general);
            }
        }

        for candidate in candidates {
            if let Some(id) = self
                .resolve_in_contract(candidate, prestation_list_id, specialty_id, act_date)
                .await?
            {
                tracing::debug!(
                    contract_id,
                    resolved_in = candidate,
                    prestation_price_id = id,
                    "price resolved"
                );
                return Ok(id);
            }
        }

        Err(BillingError::NotFound("No prestation price found"))
    }

    async fn resolve_in_contract(
        &self,
        contract_id: i64,
        prestation_list_id: i64,
        specialty_id: i64,
        act_date: NaiveDate,
    ) -> BillingResult<Option<i64>> {
        let has_avenants: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM avenant WHERE contract_id = ?")
                .bind(contract_id)
                .fetch_one(&self.pool)
                .await?;

        if has_avenants == 0 {
            return self
                .base_price(contract_id, prestation_list_id, specialty_id)
                .await;
        }

        // Generation in force on the act date. Status is deliberately
        // ignored: a generation that was later deactivated still governed
        // the dates inside its window.
        let generation: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM avenant
             WHERE contract_id = ?
               AND activate_at IS NOT NULL
               AND activate_at <= ?
               AND (inactive_at IS NULL OR inactive_at > ?)
             ORDER BY activate_at DESC LIMIT 1",
        )
        .bind(contract_id)
        .bind(act_date)
        .bind(act_date)
        .fetch_optional(&self.pool)
        .await?;

        let Some(generation) = generation else {
            // Act predates every amendment: the base set governed it.
            return self
                .base_price(contract_id, prestation_list_id, specialty_id)
                .await;
        };

        let price: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM prestation_price
             WHERE avenant_id = ? AND prestation_list_id = ?
             ORDER BY id DESC LIMIT 1",
        )
        .bind(generation)
        .bind(prestation_list_id)
        .fetch_optional(&self.pool)
        .await?;

        // A miss inside the generation does not fall back to this
        // contract's base set; the caller moves on to the next candidate.
        Ok(price)
    }

    async fn base_price(
        &self,
        contract_id: i64,
        prestation_list_id: i64,
        specialty_id: i64,
    ) -> BillingResult<Option<i64>> {
        let price: Option<i64> = sqlx::query_scalar(
            "SELECT pp.id FROM prestation_price pp
             JOIN annex ON pp.annex_id = annex.id
             WHERE annex.contract_id = ?
               AND annex.specialty_id = ?
               AND pp.prestation_list_id = ?
               AND pp.avenant_id IS NULL
             ORDER BY pp.id DESC LIMIT 1",
        )
        .bind(contract_id)
        .bind(specialty_id)
        .bind(prestation_list_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(price)
    }

    /// The designated general contract. Cached once found; while none is
    /// designated yet, every resolution checks again so a designation
    /// made after startup takes effect without a restart.
    async fn general_contract_id(&self) -> BillingResult<Option<i64>> {
        if let Some(id) = self.general_contract.get() {
            return Ok(Some(*id));
        }

        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM contract WHERE is_general = 1")
            .fetch_optional(&self.pool)
            .await?;
        match id {
            Some(id) => {
                // A lost race stored the same id: the partial unique
                // index allows only one general contract.
                let _ = self.general_contract.set(id);
                Ok(Some(id))
            }
            None => {
                tracing::debug!("no general contract designated; public-tariff fallback disabled");
                Ok(None)
            }
        }
    }
}
