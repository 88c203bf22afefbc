//! Avenant (contract amendment) engine.
//!
//! Each avenant is a generation of pricing terms for one contract.
//! Creating a generation duplicates the current price set and agreement
//! terms into rows owned by the new avenant, superseding the originals;
//! the originals stay behind as history so acts dated inside an older
//! generation's window keep resolving against the terms that were in
//! force at the time.
//!
//! Every multi-row mutation here runs inside a single transaction.
//! Dropping an uncommitted `sqlx` transaction rolls it back, so an early
//! `?` return leaves the contract exactly as it was: no orphan avenant,
//! no half-duplicated prices.

use chrono::{NaiveDate, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::domain::Avenant;
use crate::error::{BillingError, BillingResult};
use api_shared::dto::{
    ActivateAvenantRes, AvenantCreatedRes, AvenantRes, PriceSupersession,
};

#[derive(Clone)]
pub struct AvenantService {
    pool: SqlitePool,
}

impl AvenantService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new amendment generation for a contract, duplicating the
    /// generation currently in effect. Dispatches on whether the
    /// contract already has any avenant.
    ///
    /// A contract with a Pending avenant cannot receive another one; the
    /// pending generation must be activated (or abandoned) first.
    pub async fn create_for_contract(&self, contract_id: i64) -> BillingResult<AvenantCreatedRes> {
        if self.pending_exists(contract_id).await? {
            return Err(BillingError::Precondition(
                "A pending avenant already exists for this contract".into(),
            ));
        }

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM avenant WHERE contract_id = ? LIMIT 1")
                .bind(contract_id)
                .fetch_optional(&self.pool)
                .await?;

        if existing.is_none() {
            self.create_first(contract_id).await
        } else {
            self.create_subsequent(contract_id).await
        }
    }

    /// First avenant of a contract: head generation, duplicating every
    /// current base price of every annex plus the head agreement details.
    async fn create_first(&self, contract_id: i64) -> BillingResult<AvenantCreatedRes> {
        let mut tx = self.pool.begin().await?;

        let contract: Option<i64> = sqlx::query_scalar("SELECT id FROM contract WHERE id = ?")
            .bind(contract_id)
            .fetch_optional(&mut *tx)
            .await?;
        if contract.is_none() {
            return Err(BillingError::NotFound("Contract not found"));
        }

        let annex_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM annex WHERE contract_id = ?")
                .bind(contract_id)
                .fetch_one(&mut *tx)
                .await?;
        if annex_count == 0 {
            return Err(BillingError::NotFound("No annexes found for contract"));
        }

        let avenant_id = sqlx::query(
            "INSERT INTO avenant (contract_id, status, head) VALUES (?, 'Pending', 1)",
        )
        .bind(contract_id)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let prestations = duplicate_prices(&mut tx, contract_id, None, avenant_id).await?;
        duplicate_agreement_details(&mut tx, contract_id, None, avenant_id).await?;

        tx.commit().await?;

        tracing::info!(
            contract_id,
            avenant_id,
            duplicated = prestations.len(),
            "head avenant created"
        );
        Ok(AvenantCreatedRes { avenant_id, prestations })
    }

    /// Subsequent avenant: supersede the latest generation and duplicate
    /// only the rows belonging to it.
    async fn create_subsequent(&self, contract_id: i64) -> BillingResult<AvenantCreatedRes> {
        let mut tx = self.pool.begin().await?;

        let old_avenant: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM avenant
             WHERE contract_id = ? AND superseded_by IS NULL
             ORDER BY id DESC LIMIT 1",
        )
        .bind(contract_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(old_avenant) = old_avenant else {
            return Err(BillingError::NotFound("No existing avenant found for contract"));
        };

        let avenant_id = sqlx::query(
            "INSERT INTO avenant (contract_id, status, head) VALUES (?, 'Pending', 0)",
        )
        .bind(contract_id)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        // Compare-and-swap supersede: a concurrent creation that already
        // claimed this predecessor makes the update a no-op, and we abort.
        let res = sqlx::query(
            "UPDATE avenant SET superseded_by = ? WHERE id = ? AND superseded_by IS NULL",
        )
        .bind(avenant_id)
        .bind(old_avenant)
        .execute(&mut *tx)
        .await?;
        if res.rows_affected() != 1 {
            return Err(BillingError::Conflict(
                "avenant was superseded concurrently".into(),
            ));
        }

        let annex_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM annex WHERE contract_id = ?")
                .bind(contract_id)
                .fetch_one(&mut *tx)
                .await?;
        if annex_count == 0 {
            return Err(BillingError::NotFound("No annexes found for contract"));
        }

        let prestations = duplicate_prices(&mut tx, contract_id, Some(old_avenant), avenant_id).await?;
        duplicate_agreement_details(&mut tx, contract_id, Some(old_avenant), avenant_id).await?;

        tx.commit().await?;

        tracing::info!(
            contract_id,
            avenant_id,
            superseded = old_avenant,
            duplicated = prestations.len(),
            "subsequent avenant created"
        );
        Ok(AvenantCreatedRes { avenant_id, prestations })
    }

    /// Activate an avenant, either immediately or as a scheduled
    /// (future-dated) activation.
    ///
    /// Delayed: stamp `activate_at` on the avenant and its price rows
    /// without touching status; the flip to Active is a later explicit
    /// step or the daily sweep.
    ///
    /// Immediate: retire the Active predecessor generation (the one whose
    /// superseded-by pointer names this avenant), or for a head avenant
    /// any Active generation on the contract, then go Active and
    /// propagate the effective date to the generation's prices.
    pub async fn activate(
        &self,
        avenant_id: i64,
        activation_date: Option<NaiveDate>,
        delayed: bool,
    ) -> BillingResult<ActivateAvenantRes> {
        let effective = activation_date.unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.pool.begin().await?;

        let avenant = sqlx::query_as::<_, Avenant>(
            "SELECT id, contract_id, status, head, activate_at, inactive_at, superseded_by
             FROM avenant WHERE id = ?",
        )
        .bind(avenant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BillingError::NotFound("Avenant not found"))?;

        if delayed {
            let scheduled = avenant.state().schedule(effective)?;

            sqlx::query("UPDATE avenant SET activate_at = ? WHERE id = ?")
                .bind(effective)
                .bind(avenant_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE prestation_price SET activate_at = ? WHERE avenant_id = ?")
                .bind(effective)
                .bind(avenant_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            tracing::info!(avenant_id, %effective, "avenant scheduled for activation");
            return Ok(ActivateAvenantRes {
                avenant_id,
                status: scheduled.status().as_str().into(),
                effective_date: effective.to_string(),
                scheduled: true,
            });
        }

        let live = avenant.state().activate(effective)?;

        let predecessor: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM avenant WHERE superseded_by = ? AND status = 'Active'",
        )
        .bind(avenant_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(predecessor) = predecessor {
            sqlx::query(
                "UPDATE avenant SET status = 'Inactive', inactive_at = ? WHERE id = ?",
            )
            .bind(effective)
            .bind(predecessor)
            .execute(&mut *tx)
            .await?;
        } else {
            if !avenant.head {
                // A non-head avenant should always have a predecessor in
                // the chain; reaching this branch means the chain is
                // broken. The defensive deactivation below still keeps
                // activation exclusive.
                tracing::warn!(
                    avenant_id,
                    contract_id = avenant.contract_id,
                    "non-head avenant has no active predecessor; supersession chain may be broken"
                );
            }
            sqlx::query(
                "UPDATE avenant SET status = 'Inactive', inactive_at = ?
                 WHERE contract_id = ? AND status = 'Active'",
            )
            .bind(effective)
            .bind(avenant.contract_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE avenant SET status = 'Active', activate_at = ? WHERE id = ?")
            .bind(effective)
            .bind(avenant_id)
            .execute(&mut *tx)
            .await
            .map_err(BillingError::from_sqlx)?;
        sqlx::query("UPDATE prestation_price SET activate_at = ? WHERE avenant_id = ?")
            .bind(effective)
            .bind(avenant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(avenant_id, %effective, "avenant activated");
        Ok(ActivateAvenantRes {
            avenant_id,
            status: live.status().as_str().into(),
            effective_date: effective.to_string(),
            scheduled: false,
        })
    }

    /// Whether any avenant of the contract is still Pending. Exposed for
    /// the UI gate; also enforced as a creation precondition.
    pub async fn pending_exists(&self, contract_id: i64) -> BillingResult<bool> {
        let row: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM avenant WHERE contract_id = ? AND status = 'Pending' LIMIT 1",
        )
        .bind(contract_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn get(&self, avenant_id: i64) -> BillingResult<AvenantRes> {
        let row = sqlx::query_as::<_, (i64, i64, String, String, Option<NaiveDate>, String)>(
            "SELECT avenant.id, avenant.contract_id, avenant.status, avenant.created_at,
                    avenant.activate_at, contract.status AS contract_status
             FROM avenant
             INNER JOIN contract ON avenant.contract_id = contract.id
             WHERE avenant.id = ?",
        )
        .bind(avenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(BillingError::NotFound("Avenant not found"))?;

        let (id, contract_id, status, created_at, activate_at, contract_status) = row;
        Ok(AvenantRes {
            id,
            contract_id,
            status,
            created_at,
            activate_at: activate_at.map(|d| d.format("%d/%m/%Y").to_string()),
            contract_status: Some(contract_status),
        })
    }

    pub async fn list_for_contract(&self, contract_id: i64) -> BillingResult<Vec<AvenantRes>> {
        let rows = sqlx::query_as::<_, (i64, i64, String, String, Option<NaiveDate>)>(
            "SELECT id, contract_id, status, created_at, activate_at
             FROM avenant WHERE contract_id = ? ORDER BY id DESC",
        )
        .bind(contract_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, contract_id, status, created_at, activate_at)| AvenantRes {
                id,
                contract_id,
                status,
                created_at,
                activate_at: activate_at.map(|d| d.format("%d/%m/%Y").to_string()),
                contract_status: None,
            })
            .collect())
    }

    pub(crate) async fn fetch(&self, avenant_id: i64) -> BillingResult<Avenant> {
        sqlx::query_as::<_, Avenant>(
            "SELECT id, contract_id, status, head, activate_at, inactive_at, superseded_by
             FROM avenant WHERE id = ?",
        )
        .bind(avenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(BillingError::NotFound("Avenant not found"))
    }
}

/// Duplicate the current price rows of a generation into a new avenant.
///
/// `source_avenant = None` selects the base prices of every annex on the
/// contract (first-avenant case); `Some(id)` restricts to the rows owned
/// by that generation. Each duplicate keeps the annex and prestation,
/// points at the new avenant with `head = 0`, and the original is
/// compare-and-swap superseded.
async fn duplicate_prices(
    tx: &mut Transaction<'_, Sqlite>,
    contract_id: i64,
    source_avenant: Option<i64>,
    new_avenant_id: i64,
) -> BillingResult<Vec<PriceSupersession>> {
    let sql = match source_avenant {
        None => {
            "SELECT pp.id, pp.price, pp.patient_part, pp.tva, pp.annex_id, pp.prestation_list_id
             FROM prestation_price pp
             JOIN annex ON pp.annex_id = annex.id
             WHERE annex.contract_id = ? AND pp.superseded_by IS NULL"
        }
        Some(_) => {
            "SELECT pp.id, pp.price, pp.patient_part, pp.tva, pp.annex_id, pp.prestation_list_id
             FROM prestation_price pp
             JOIN annex ON pp.annex_id = annex.id
             WHERE annex.contract_id = ? AND pp.avenant_id = ? AND pp.superseded_by IS NULL"
        }
    };

    let mut query = sqlx::query_as::<_, (i64, f64, f64, f64, i64, i64)>(sql).bind(contract_id);
    if let Some(source) = source_avenant {
        query = query.bind(source);
    }
    let originals = query.fetch_all(&mut **tx).await?;

    let mut mappings = Vec::with_capacity(originals.len());
    for (old_id, price, patient_part, tva, annex_id, prestation_list_id) in originals {
        let new_id = sqlx::query(
            "INSERT INTO prestation_price
                 (price, patient_part, tva, annex_id, prestation_list_id, avenant_id, head)
             VALUES (?, ?, ?, ?, ?, ?, 0)",
        )
        .bind(price)
        .bind(patient_part)
        .bind(tva)
        .bind(annex_id)
        .bind(prestation_list_id)
        .bind(new_avenant_id)
        .execute(&mut **tx)
        .await?
        .last_insert_rowid();

        let res = sqlx::query(
            "UPDATE prestation_price SET superseded_by = ?
             WHERE id = ? AND superseded_by IS NULL",
        )
        .bind(new_id)
        .bind(old_id)
        .execute(&mut **tx)
        .await?;
        if res.rows_affected() != 1 {
            return Err(BillingError::Conflict(
                "price row was superseded concurrently".into(),
            ));
        }

        mappings.push(PriceSupersession { old_id, new_id });
    }

    Ok(mappings)
}

/// Duplicate the current agreement-details row of a generation into a new
/// avenant, superseding the original. A contract without agreement
/// details (not expected, but not this function's problem) is a no-op.
async fn duplicate_agreement_details(
    tx: &mut Transaction<'_, Sqlite>,
    contract_id: i64,
    source_avenant: Option<i64>,
    new_avenant_id: i64,
) -> BillingResult<()> {
    let sql = match source_avenant {
        None => {
            "SELECT id, start_date, end_date, family_auth, max_price, min_price, discount_percentage
             FROM agreement_details
             WHERE contract_id = ? AND avenant_id IS NULL AND superseded_by IS NULL"
        }
        Some(_) => {
            "SELECT id, start_date, end_date, family_auth, max_price, min_price, discount_percentage
             FROM agreement_details
             WHERE contract_id = ? AND avenant_id = ? AND superseded_by IS NULL"
        }
    };

    let mut query = sqlx::query_as::<
        _,
        (i64, NaiveDate, NaiveDate, Option<String>, Option<f64>, Option<f64>, Option<f64>),
    >(sql)
    .bind(contract_id);
    if let Some(source) = source_avenant {
        query = query.bind(source);
    }
    let Some((old_id, start_date, end_date, family_auth, max_price, min_price, discount)) =
        query.fetch_optional(&mut **tx).await?
    else {
        return Ok(());
    };

    let new_id = sqlx::query(
        "INSERT INTO agreement_details
             (contract_id, avenant_id, head, start_date, end_date, family_auth,
              max_price, min_price, discount_percentage)
         VALUES (?, ?, 0, ?, ?, ?, ?, ?, ?)",
    )
    .bind(contract_id)
    .bind(new_avenant_id)
    .bind(start_date)
    .bind(end_date)
    .bind(&family_auth)
    .bind(max_price)
    .bind(min_price)
    .bind(discount)
    .execute(&mut **tx)
    .await?
    .last_insert_rowid();

    let res = sqlx::query(
        "UPDATE agreement_details SET superseded_by = ? WHERE id = ? AND superseded_by IS NULL",
    )
    .bind(new_id)
    .bind(old_id)
    .execute(&mut **tx)
    .await?;
    if res.rows_affected() != 1 {
        return Err(BillingError::Conflict(
            "agreement details were superseded concurrently".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annexes::AnnexService;
    use crate::contracts::ContractService;
    use crate::db::test_pool;
    use crate::domain::{AvenantState, AvenantStatus};
    use crate::testing::{insert_company, insert_prestation, insert_specialty};
    use api_shared::dto::{AnnexReq, CreateContractReq};
    use sqlx::SqlitePool;

    struct Fixture {
        contract_id: i64,
        annex_id: i64,
        prestation_a: i64,
        prestation_b: i64,
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    async fn fixture(pool: &SqlitePool) -> Fixture {
        let company = insert_company(pool, "Acme").await;
        let specialty = insert_specialty(pool, "Cardiology").await;
        let contract_id = ContractService::new(pool.clone())
            .create_for_company(
                company,
                CreateContractReq {
                    contract_name: "Acme".into(),
                    start_date: "2024-01-01".into(),
                    end_date: "2025-01-01".into(),
                    max_price: None,
                    min_price: None,
                    discount_percentage: None,
                    family_auth: None,
                },
            )
            .await
            .unwrap()
            .id;
        let annex_id = AnnexService::new(pool.clone())
            .create(contract_id, AnnexReq { annex_name: "Annex".into(), specialty_id: specialty })
            .await
            .unwrap()
            .id;
        let prestation_a = insert_prestation(pool, "ECG", "CAR01", specialty).await;
        let prestation_b = insert_prestation(pool, "Echo", "CAR02", specialty).await;
        for (prestation, price) in [(prestation_a, 100.0), (prestation_b, 250.0)] {
            sqlx::query(
                "INSERT INTO prestation_price
                     (price, patient_part, tva, annex_id, prestation_list_id, head)
                 VALUES (?, ?, 0, ?, ?, 1)",
            )
            .bind(price)
            .bind(price / 5.0)
            .bind(annex_id)
            .bind(prestation)
            .execute(pool)
            .await
            .unwrap();
        }
        Fixture { contract_id, annex_id, prestation_a, prestation_b }
    }


    #[tokio::test]
    async fn first_avenant_duplicates_current_prices() {
        let pool = test_pool().await;
        let fx = fixture(&pool).await;
        let svc = AvenantService::new(pool.clone());

        let created = svc.create_for_contract(fx.contract_id).await.unwrap();
        assert_eq!(created.prestations.len(), 2);

        let avenant = svc.fetch(created.avenant_id).await.unwrap();
        assert!(avenant.head);
        assert_eq!(avenant.status, AvenantStatus::Pending);

        for mapping in &created.prestations {
            let superseded_by: Option<i64> = sqlx::query_scalar(
                "SELECT superseded_by FROM prestation_price WHERE id = ?",
            )
            .bind(mapping.old_id)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert_eq!(superseded_by, Some(mapping.new_id));

            let (dup_avenant, dup_head): (Option<i64>, bool) = sqlx::query_as(
                "SELECT avenant_id, head FROM prestation_price WHERE id = ?",
            )
            .bind(mapping.new_id)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert_eq!(dup_avenant, Some(created.avenant_id));
            assert!(!dup_head);
        }

        // The agreement details followed the same supersede pattern.
        let (current_contract, current_avenant): (i64, Option<i64>) = sqlx::query_as(
            "SELECT contract_id, avenant_id FROM agreement_details WHERE superseded_by IS NULL",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(current_contract, fx.contract_id);
        assert_eq!(current_avenant, Some(created.avenant_id));
    }

    #[tokio::test]
    async fn first_avenant_requires_an_annex() {
        let pool = test_pool().await;
        let company = insert_company(&pool, "Empty").await;
        let contract_id = ContractService::new(pool.clone())
            .create_for_company(
                company,
                CreateContractReq {
                    contract_name: "Empty".into(),
                    start_date: "2024-01-01".into(),
                    end_date: "2025-01-01".into(),
                    max_price: None,
                    min_price: None,
                    discount_percentage: None,
                    family_auth: None,
                },
            )
            .await
            .unwrap()
            .id;
        let svc = AvenantService::new(pool.clone());

        let err = svc.create_for_contract(contract_id).await.unwrap_err();
        assert!(err.to_string().contains("No annexes found"));

        // Nothing persisted.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM avenant")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn subsequent_avenant_supersedes_only_the_old_generation() {
        let pool = test_pool().await;
        let fx = fixture(&pool).await;
        let svc = AvenantService::new(pool.clone());

        let first = svc.create_for_contract(fx.contract_id).await.unwrap();
        svc.activate(first.avenant_id, Some(d("2024-02-01")), false).await.unwrap();

        let second = svc.create_for_contract(fx.contract_id).await.unwrap();
        assert_eq!(second.prestations.len(), 2);

        let first_row = svc.fetch(first.avenant_id).await.unwrap();
        assert_eq!(first_row.superseded_by, Some(second.avenant_id));

        let second_row = svc.fetch(second.avenant_id).await.unwrap();
        assert!(!second_row.head);
        assert_eq!(second_row.status, AvenantStatus::Pending);

        // The base (avenant-null) historical rows were not touched again.
        let base_rows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM prestation_price WHERE avenant_id IS NULL",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(base_rows, 2);

        // Current-uniqueness invariant over the whole table.
        let duplicate_currents: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM (
                 SELECT annex_id, prestation_list_id, ifnull(avenant_id, 0) AS gen
                 FROM prestation_price WHERE superseded_by IS NULL
                 GROUP BY annex_id, prestation_list_id, gen
                 HAVING COUNT(*) > 1
             )",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(duplicate_currents, 0);
        let _ = (fx.annex_id, fx.prestation_a, fx.prestation_b);
    }

    #[tokio::test]
    async fn pending_avenant_blocks_another_creation() {
        let pool = test_pool().await;
        let fx = fixture(&pool).await;
        let svc = AvenantService::new(pool.clone());

        let first = svc.create_for_contract(fx.contract_id).await.unwrap();
        assert!(svc.pending_exists(fx.contract_id).await.unwrap());

        assert!(matches!(
            svc.create_for_contract(fx.contract_id).await,
            Err(BillingError::Precondition(_))
        ));

        svc.activate(first.avenant_id, None, false).await.unwrap();
        assert!(!svc.pending_exists(fx.contract_id).await.unwrap());
        svc.create_for_contract(fx.contract_id).await.unwrap();
    }


    #[tokio::test]
    async fn activation_retires_the_predecessor() {
        let pool = test_pool().await;
        let fx = fixture(&pool).await;
        let svc = AvenantService::new(pool.clone());

        let first = svc.create_for_contract(fx.contract_id).await.unwrap();
        svc.activate(first.avenant_id, Some(d("2024-01-15")), false).await.unwrap();

        let second = svc.create_for_contract(fx.contract_id).await.unwrap();
        let res = svc.activate(second.avenant_id, Some(d("2024-03-01")), false).await.unwrap();
        assert_eq!(res.status, "Active");
        assert_eq!(res.effective_date, "2024-03-01");

        let first_row = svc.fetch(first.avenant_id).await.unwrap();
        assert_eq!(first_row.status, AvenantStatus::Inactive);
        assert_eq!(first_row.inactive_at, Some(d("2024-03-01")));

        let second_row = svc.fetch(second.avenant_id).await.unwrap();
        assert_eq!(second_row.status, AvenantStatus::Active);
        assert_eq!(second_row.activate_at, Some(d("2024-03-01")));

        // Activation exclusivity.
        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM avenant WHERE contract_id = ? AND status = 'Active'",
        )
        .bind(fx.contract_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(active, 1);
    }

    #[tokio::test]
    async fn delayed_activation_stamps_dates_without_status_change() {
        let pool = test_pool().await;
        let fx = fixture(&pool).await;
        let svc = AvenantService::new(pool.clone());

        let created = svc.create_for_contract(fx.contract_id).await.unwrap();
        let res = svc
            .activate(created.avenant_id, Some(d("2030-01-01")), true)
            .await
            .unwrap();
        assert!(res.scheduled);
        assert_eq!(res.status, "Pending");

        let row = svc.fetch(created.avenant_id).await.unwrap();
        assert_eq!(row.status, AvenantStatus::Pending);
        assert_eq!(row.activate_at, Some(d("2030-01-01")));
        assert_eq!(row.state(), AvenantState::ScheduledFor(d("2030-01-01")));

        // The date propagated to the generation's price rows.
        let stamped: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM prestation_price WHERE avenant_id = ? AND activate_at = ?",
        )
        .bind(created.avenant_id)
        .bind(d("2030-01-01"))
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(stamped, 2);
    }

    #[tokio::test]
    async fn inactive_avenant_cannot_be_reactivated() {
        let pool = test_pool().await;
        let fx = fixture(&pool).await;
        let svc = AvenantService::new(pool.clone());

        let first = svc.create_for_contract(fx.contract_id).await.unwrap();
        svc.activate(first.avenant_id, Some(d("2024-01-15")), false).await.unwrap();
        let second = svc.create_for_contract(fx.contract_id).await.unwrap();
        svc.activate(second.avenant_id, Some(d("2024-03-01")), false).await.unwrap();

        assert!(matches!(
            svc.activate(first.avenant_id, Some(d("2024-04-01")), false).await,
            Err(BillingError::IllegalTransition { .. })
        ));
    }

    // Regression pin for the broken-chain branch: a non-head avenant with
    // no Active predecessor logs and still deactivates whatever is Active
    // on the contract, keeping activation exclusive.
    #[tokio::test]
    async fn orphaned_non_head_avenant_still_takes_defensive_branch() {
        let pool = test_pool().await;
        let fx = fixture(&pool).await;
        let svc = AvenantService::new(pool.clone());

        let first = svc.create_for_contract(fx.contract_id).await.unwrap();
        svc.activate(first.avenant_id, Some(d("2024-01-15")), false).await.unwrap();

        // Forge an orphan: a non-head Pending avenant nobody points at.
        let orphan = sqlx::query(
            "INSERT INTO avenant (contract_id, status, head) VALUES (?, 'Pending', 0)",
        )
        .bind(fx.contract_id)
        .execute(&pool)
        .await
        .unwrap()
        .last_insert_rowid();

        let res = svc.activate(orphan, Some(d("2024-05-01")), false).await.unwrap();
        assert_eq!(res.status, "Active");

        let first_row = svc.fetch(first.avenant_id).await.unwrap();
        assert_eq!(first_row.status, AvenantStatus::Inactive);

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM avenant WHERE contract_id = ? AND status = 'Active'",
        )
        .bind(fx.contract_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(active, 1);
    }

    #[tokio::test]
    async fn get_joins_contract_status() {
        let pool = test_pool().await;
        let fx = fixture(&pool).await;
        let svc = AvenantService::new(pool.clone());
        let created = svc.create_for_contract(fx.contract_id).await.unwrap();

        let fetched = svc.get(created.avenant_id).await.unwrap();
        assert_eq!(fetched.contract_status.as_deref(), Some("Pending"));

        let listed = svc.list_for_contract(fx.contract_id).await.unwrap();
        assert_eq!(listed.len(), 1);

        assert!(matches!(svc.get(404).await, Err(BillingError::NotFound(_))));
    }
}
