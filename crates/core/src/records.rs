//! Prestations performed on medical records.
//!
//! Attaching an act to a record snapshots the resolved price into the
//! link row, so later catalogue edits never rewrite what was billed.
//! Monetary comparisons go through integer cents; comparing raw floats
//! would misjudge a fully-paid act by a rounding hair.

use sqlx::SqlitePool;

use crate::error::{BillingError, BillingResult};
use crate::resolver::PriceResolver;
use api_shared::dto::{AttachPrestationReq, RecordPrestationRes, RecordPrestationRow};

/// Record statuses that no longer accept new acts.
const BILLED_STATUSES: [&str; 2] = ["billed", "closed"];

#[derive(Clone)]
pub struct RecordPrestationService {
    pool: SqlitePool,
    resolver: PriceResolver,
}

impl RecordPrestationService {
    pub fn new(pool: SqlitePool, resolver: PriceResolver) -> Self {
        Self { pool, resolver }
    }

    /// Attach a performed prestation to a medical record.
    ///
    /// The price is resolved against the record's contract as of the
    /// record's care date and copied into the link row.
    ///
    /// # Errors
    ///
    /// [`BillingError::Precondition`] when the record is already billed;
    /// [`BillingError::NotFound`] when the record is unknown or no price
    /// resolves.
    pub async fn attach(&self, req: AttachPrestationReq) -> BillingResult<RecordPrestationRes> {
        let record = sqlx::query_as::<_, (i64, String, String)>(
            "SELECT contract_id, status, prise_en_charge_date FROM medical_record WHERE id = ?",
        )
        .bind(req.medical_record_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(BillingError::NotFound("Medical record not found"))?;
        let (contract_id, status, care_date) = record;

        if BILLED_STATUSES.contains(&status.as_str()) {
            return Err(BillingError::Precondition(
                "Cannot add a prestation to a billed medical record".into(),
            ));
        }
        let care_date = crate::contracts::parse_wire_date(&care_date, "prise_en_charge_date")?;

        let price_id = self
            .resolver
            .resolve(contract_id, req.prestation_id, req.specialty_id, care_date)
            .await?;

        let (price, patient_part): (f64, f64) = sqlx::query_as(
            "SELECT price, patient_part FROM prestation_price WHERE id = ?",
        )
        .bind(price_id)
        .fetch_one(&self.pool)
        .await?;

        let id = sqlx::query(
            "INSERT INTO prestation_medical_record
                 (medical_record_id, prestation_price_id, doctor_id, prestation_price)
             VALUES (?, ?, ?, ?)",
        )
        .bind(req.medical_record_id)
        .bind(price_id)
        .bind(req.doctor_id)
        .bind(price)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        let (prestation_name, prestation_code, specialty_name): (String, String, String) =
            sqlx::query_as(
                "SELECT pl.prestation_name, pl.prestation_code, s.specialty_name
                 FROM prestation_list pl
                 JOIN specialty s ON pl.specialty_id = s.id
                 WHERE pl.id = ?",
            )
            .bind(req.prestation_id)
            .fetch_one(&self.pool)
            .await?;

        tracing::info!(
            medical_record_id = req.medical_record_id,
            prestation_price_id = price_id,
            "prestation attached to record"
        );
        Ok(RecordPrestationRes { id, prestation_name, prestation_code, specialty_name, patient_part })
    }

    /// All acts on a record, newest first, with catalogue names.
    pub async fn list_for_record(
        &self,
        medical_record_id: i64,
    ) -> BillingResult<Vec<RecordPrestationRow>> {
        let rows = sqlx::query_as::<_, (i64, String, String, String, String, f64, f64)>(
            "SELECT pmr.id, pmr.payment_status, pl.prestation_name, pl.prestation_code,
                    s.specialty_name, pp.patient_part, pmr.prestation_price
             FROM prestation_medical_record pmr
             JOIN prestation_price pp ON pmr.prestation_price_id = pp.id
             JOIN prestation_list pl ON pp.prestation_list_id = pl.id
             JOIN specialty s ON pl.specialty_id = s.id
             WHERE pmr.medical_record_id = ?
             ORDER BY pmr.id DESC",
        )
        .bind(medical_record_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, payment_status, prestation_name, prestation_code, specialty_name, patient_part, price)| {
                    RecordPrestationRow {
                        id,
                        payment_status,
                        prestation_name,
                        prestation_code,
                        specialty_name,
                        patient_part,
                        price,
                    }
                },
            )
            .collect())
    }

    /// Remove an act from a record. Paid acts stay.
    pub async fn delete_unpaid(&self, id: i64) -> BillingResult<()> {
        let status: Option<String> = sqlx::query_scalar(
            "SELECT payment_status FROM prestation_medical_record WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(status) = status else {
            return Err(BillingError::NotFound("Prestation not found on record"));
        };
        if status != "unpaid" {
            return Err(BillingError::Precondition(
                "Cannot delete a prestation that has been paid".into(),
            ));
        }

        sqlx::query("DELETE FROM prestation_medical_record WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Expose resolution directly for dry-run price queries.
    pub async fn resolve_price(
        &self,
        contract_id: i64,
        prestation_id: i64,
        specialty_id: i64,
        act_date: chrono::NaiveDate,
    ) -> BillingResult<i64> {
        self.resolver.resolve(contract_id, prestation_id, specialty_id, act_date).await
    }
}

/// Round a monetary amount to integer cents.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Whether the amount paid settles the billed price, compared in cents.
pub fn covers(total_paid: f64, price: f64) -> bool {
    to_cents(total_paid) >= to_cents(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annexes::AnnexService;
    use crate::contracts::ContractService;
    use crate::db::test_pool;
    use crate::testing::{
        insert_company, insert_medical_record, insert_prestation, insert_specialty,
    };
    use api_shared::dto::{AnnexReq, CreateContractReq, PriceReq};
    use sqlx::SqlitePool;

    async fn setup(pool: &SqlitePool) -> (i64, i64, i64) {
        let company = insert_company(pool, "Acme").await;
        let specialty = insert_specialty(pool, "Cardiology").await;
        let prestation = insert_prestation(pool, "ECG", "CAR01", specialty).await;
        let contract_id = ContractService::new(pool.clone())
            .create_for_company(
                company,
                CreateContractReq {
                    contract_name: "Acme".into(),
                    start_date: "2024-01-01".into(),
                    end_date: "2026-01-01".into(),
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
        crate::prices::PrestationPriceService::new(pool.clone())
            .add(
                annex_id,
                PriceReq { prestation_list_id: prestation, price: 100.0, patient_part: 20.0, tva: 0.0 },
            )
            .await
            .unwrap();
        (contract_id, specialty, prestation)
    }

    fn service(pool: &SqlitePool) -> RecordPrestationService {
        RecordPrestationService::new(pool.clone(), PriceResolver::new(pool.clone()))
    }

    #[tokio::test]
    async fn attach_snapshots_resolved_price() {
        let pool = test_pool().await;
        let (contract_id, specialty, prestation) = setup(&pool).await;
        let record = insert_medical_record(&pool, contract_id, "open", "2024-06-01").await;
        let svc = service(&pool);

        let attached = svc
            .attach(AttachPrestationReq {
                medical_record_id: record,
                specialty_id: specialty,
                prestation_id: prestation,
                doctor_id: 7,
            })
            .await
            .unwrap();
        assert_eq!(attached.prestation_code, "CAR01");
        assert_eq!(attached.patient_part, 20.0);

        let rows = svc.list_for_record(record).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].price, 100.0);
        assert_eq!(rows[0].payment_status, "unpaid");
    }

    #[tokio::test]
    async fn billed_record_rejects_new_acts() {
        let pool = test_pool().await;
        let (contract_id, specialty, prestation) = setup(&pool).await;
        let record = insert_medical_record(&pool, contract_id, "billed", "2024-06-01").await;
        let svc = service(&pool);

        assert!(matches!(
            svc.attach(AttachPrestationReq {
                medical_record_id: record,
                specialty_id: specialty,
                prestation_id: prestation,
                doctor_id: 7,
            })
            .await,
            Err(BillingError::Precondition(_))
        ));
    }

    #[tokio::test]
    async fn only_unpaid_acts_can_be_removed() {
        let pool = test_pool().await;
        let (contract_id, specialty, prestation) = setup(&pool).await;
        let record = insert_medical_record(&pool, contract_id, "open", "2024-06-01").await;
        let svc = service(&pool);

        let attached = svc
            .attach(AttachPrestationReq {
                medical_record_id: record,
                specialty_id: specialty,
                prestation_id: prestation,
                doctor_id: 7,
            })
            .await
            .unwrap();

        sqlx::query("UPDATE prestation_medical_record SET payment_status = 'paid' WHERE id = ?")
            .bind(attached.id)
            .execute(&pool)
            .await
            .unwrap();
        assert!(matches!(
            svc.delete_unpaid(attached.id).await,
            Err(BillingError::Precondition(_))
        ));

        sqlx::query("UPDATE prestation_medical_record SET payment_status = 'unpaid' WHERE id = ?")
            .bind(attached.id)
            .execute(&pool)
            .await
            .unwrap();
        svc.delete_unpaid(attached.id).await.unwrap();
        assert!(svc.list_for_record(record).await.unwrap().is_empty());
    }

    #[test]
    fn cent_comparison_survives_float_noise() {
        assert!(covers(0.1 + 0.2, 0.3));
        assert!(covers(100.0, 99.999));
        assert!(!covers(99.98, 99.99));
        assert_eq!(to_cents(19.99), 1999);
    }
}
