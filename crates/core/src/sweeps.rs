//! Time-based maintenance sweeps.
//!
//! Both sweeps are idempotent; running them twice in a row, or
//! concurrently from two processes, converges on the same state. The
//! runtime drives them on an interval, but they can also be invoked
//! directly (e.g. from an admin endpoint or a test).

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::avenants::AvenantService;
use crate::error::BillingResult;

#[derive(Clone)]
pub struct SweepService {
    pool: SqlitePool,
    avenants: AvenantService,
}

impl SweepService {
    pub fn new(pool: SqlitePool) -> Self {
        let avenants = AvenantService::new(pool.clone());
        Self { pool, avenants }
    }

    /// Flip Pending avenants whose scheduled activation date has arrived.
    ///
    /// Each promotion goes through the regular activation path, so the
    /// Active predecessor generation is retired (and stamped
    /// `inactive_at`) in the same transaction, exactly as an
    /// operator-triggered activation would do it.
    ///
    /// Returns the number of avenants promoted.
    pub async fn promote_scheduled_avenants(&self) -> BillingResult<u64> {
        let due = sqlx::query_as::<_, (i64, NaiveDate)>(
            "SELECT id, activate_at FROM avenant
             WHERE status = 'Pending'
               AND activate_at IS NOT NULL
               AND activate_at <= date('now')
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut promoted = 0;
        for (avenant_id, activate_at) in due {
            // One bad row must not starve the rest of the batch.
            match self.avenants.activate(avenant_id, Some(activate_at), false).await {
                Ok(_) => promoted += 1,
                Err(err) => {
                    tracing::warn!(avenant_id, error = %err, "scheduled avenant could not be promoted");
                }
            }
        }

        if promoted > 0 {
            tracing::info!(promoted, "scheduled avenants promoted to Active");
        }
        Ok(promoted)
    }

    /// Expire non-general contracts whose head agreement end date has
    /// passed.
    ///
    /// Returns the number of contracts expired.
    pub async fn expire_overdue_contracts(&self) -> BillingResult<u64> {
        let res = sqlx::query(
            "UPDATE contract SET status = 'Expired'
             WHERE is_general = 0
               AND status != 'Expired'
               AND id IN (
                   SELECT contract_id FROM agreement_details
                   WHERE head = 1 AND end_date < date('now')
               )",
        )
        .execute(&self.pool)
        .await?;

        let expired = res.rows_affected();
        if expired > 0 {
            tracing::info!(expired, "overdue contracts expired");
        }
        Ok(expired)
    }

    /// Run both sweeps. Errors are returned to the caller; the runtime
    /// loop logs and keeps going.
    pub async fn run_all(&self) -> BillingResult<()> {
        self.promote_scheduled_avenants().await?;
        self.expire_overdue_contracts().await?;
        Ok(())
    }
}
