//! Prestation price catalogue.
//!
//! Base prices live under an annex with no avenant; generation prices
//! carry the avenant id of the generation that owns them. Deleting a
//! price must first unlink any supersession pointer aimed at it, both to
//! satisfy the self-referencing foreign key and to restore the previous
//! row as current.

use sqlx::SqlitePool;

use crate::error::{BillingError, BillingResult};
use api_shared::dto::{AvenantPriceReq, PriceReq, PriceRes, PriceRow};

#[derive(Clone)]
pub struct PrestationPriceService {
    pool: SqlitePool,
}

impl PrestationPriceService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Add a base price for a prestation under an annex.
    ///
    /// # Errors
    ///
    /// [`BillingError::Conflict`] when the annex already carries a
    /// current price for the prestation.
    pub async fn add(&self, annex_id: i64, req: PriceReq) -> BillingResult<PriceRes> {
        validate_amounts(req.price, req.patient_part, req.tva)?;

        let annex: Option<i64> = sqlx::query_scalar("SELECT id FROM annex WHERE id = ?")
            .bind(annex_id)
            .fetch_optional(&self.pool)
            .await?;
        if annex.is_none() {
            return Err(BillingError::NotFound("Annex not found"));
        }
        let prestation: Option<i64> =
            sqlx::query_scalar("SELECT id FROM prestation_list WHERE id = ?")
                .bind(req.prestation_list_id)
                .fetch_optional(&self.pool)
                .await?;
        if prestation.is_none() {
            return Err(BillingError::NotFound("Prestation not found"));
        }

        let id = sqlx::query(
            "INSERT INTO prestation_price
                 (price, patient_part, tva, annex_id, prestation_list_id, head)
             VALUES (?, ?, ?, ?, ?, 1)",
        )
        .bind(req.price)
        .bind(req.patient_part)
        .bind(req.tva)
        .bind(annex_id)
        .bind(req.prestation_list_id)
        .execute(&self.pool)
        .await
        .map_err(BillingError::from_sqlx)?
        .last_insert_rowid();

        Ok(PriceRes {
            id,
            price: req.price,
            patient_part: req.patient_part,
            tva: req.tva,
            annex_id,
            prestation_list_id: req.prestation_list_id,
            avenant_id: None,
            head: true,
        })
    }

    /// Add a price under an avenant generation.
    ///
    /// When no annex is named, the avenant's contract is searched for an
    /// annex matching the prestation's specialty; if none exists one is
    /// bootstrapped with `created_by = 'avenant'`, so a generation can
    /// price a specialty the base catalogue never covered.
    pub async fn add_in_avenant(&self, req: AvenantPriceReq) -> BillingResult<PriceRes> {
        validate_amounts(req.price, req.patient_part, req.tva)?;

        let mut tx = self.pool.begin().await?;

        let contract_id: Option<i64> =
            sqlx::query_scalar("SELECT contract_id FROM avenant WHERE id = ?")
                .bind(req.avenant_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(contract_id) = contract_id else {
            return Err(BillingError::NotFound("Avenant not found"));
        };

        let annex_id = match req.annex_id {
            Some(annex_id) => {
                let owner: Option<i64> =
                    sqlx::query_scalar("SELECT contract_id FROM annex WHERE id = ?")
                        .bind(annex_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                match owner {
                    Some(owner) if owner == contract_id => annex_id,
                    Some(_) => {
                        return Err(BillingError::InvalidInput(
                            "annex does not belong to the avenant's contract".into(),
                        ))
                    }
                    None => return Err(BillingError::NotFound("Annex not found")),
                }
            }
            None => {
                let specialty = sqlx::query_as::<_, (i64, String)>(
                    "SELECT specialty.id, specialty.specialty_name
                     FROM prestation_list
                     JOIN specialty ON prestation_list.specialty_id = specialty.id
                     WHERE prestation_list.id = ?",
                )
                .bind(req.prestation_list_id)
                .fetch_optional(&mut *tx)
                .await?;
                let Some((specialty_id, specialty_name)) = specialty else {
                    return Err(BillingError::NotFound("Prestation not found"));
                };

                let existing: Option<i64> = sqlx::query_scalar(
                    "SELECT id FROM annex WHERE contract_id = ? AND specialty_id = ?",
                )
                .bind(contract_id)
                .bind(specialty_id)
                .fetch_optional(&mut *tx)
                .await?;
                match existing {
                    Some(id) => id,
                    None => {
                        let id = sqlx::query(
                            "INSERT INTO annex (annex_name, contract_id, specialty_id, created_by)
                             VALUES (?, ?, ?, 'avenant')",
                        )
                        .bind(&specialty_name)
                        .bind(contract_id)
                        .bind(specialty_id)
                        .execute(&mut *tx)
                        .await?
                        .last_insert_rowid();
                        tracing::info!(
                            contract_id,
                            annex_id = id,
                            specialty = %specialty_name,
                            "annex bootstrapped for avenant price"
                        );
                        id
                    }
                }
            }
        };

        let id = sqlx::query(
            "INSERT INTO prestation_price
                 (price, patient_part, tva, annex_id, prestation_list_id, avenant_id, head)
             VALUES (?, ?, ?, ?, ?, ?, 0)",
        )
        .bind(req.price)
        .bind(req.patient_part)
        .bind(req.tva)
        .bind(annex_id)
        .bind(req.prestation_list_id)
        .bind(req.avenant_id)
        .execute(&mut *tx)
        .await
        .map_err(BillingError::from_sqlx)?
        .last_insert_rowid();

        tx.commit().await?;

        Ok(PriceRes {
            id,
            price: req.price,
            patient_part: req.patient_part,
            tva: req.tva,
            annex_id,
            prestation_list_id: req.prestation_list_id,
            avenant_id: Some(req.avenant_id),
            head: false,
        })
    }

    /// Update the amounts of an existing price row in place.
    pub async fn edit(&self, price_id: i64, req: PriceReq) -> BillingResult<PriceRes> {
        validate_amounts(req.price, req.patient_part, req.tva)?;

        let res = sqlx::query(
            "UPDATE prestation_price SET price = ?, patient_part = ?, tva = ? WHERE id = ?",
        )
        .bind(req.price)
        .bind(req.patient_part)
        .bind(req.tva)
        .bind(price_id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(BillingError::NotFound("Prestation price not found"));
        }

        self.get(price_id).await
    }

    /// Delete a price row.
    ///
    /// Any row superseded by this one is unlinked first (restoring it as
    /// current). A row already billed on a medical record cannot go.
    pub async fn delete(&self, price_id: i64) -> BillingResult<()> {
        let mut tx = self.pool.begin().await?;

        let billed: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM prestation_medical_record WHERE prestation_price_id = ?",
        )
        .bind(price_id)
        .fetch_one(&mut *tx)
        .await?;
        if billed > 0 {
            return Err(BillingError::Precondition(
                "price is referenced by billed prestations".into(),
            ));
        }

        sqlx::query("UPDATE prestation_price SET superseded_by = NULL WHERE superseded_by = ?")
            .bind(price_id)
            .execute(&mut *tx)
            .await?;

        let res = sqlx::query("DELETE FROM prestation_price WHERE id = ?")
            .bind(price_id)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(BillingError::NotFound("Prestation price not found"));
        }

        tx.commit().await?;
        tracing::info!(price_id, "prestation price deleted");
        Ok(())
    }

    pub async fn get(&self, price_id: i64) -> BillingResult<PriceRes> {
        let row = sqlx::query_as::<_, (i64, f64, f64, f64, i64, i64, Option<i64>, bool)>(
            "SELECT id, price, patient_part, tva, annex_id, prestation_list_id, avenant_id, head
             FROM prestation_price WHERE id = ?",
        )
        .bind(price_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(BillingError::NotFound("Prestation price not found"))?;

        let (id, price, patient_part, tva, annex_id, prestation_list_id, avenant_id, head) = row;
        Ok(PriceRes { id, price, patient_part, tva, annex_id, prestation_list_id, avenant_id, head })
    }

    /// Current base prices of an annex, with catalogue names.
    pub async fn list_for_annex(&self, annex_id: i64) -> BillingResult<Vec<PriceRow>> {
        self.list_rows(
            "SELECT pp.id, pp.price, pp.patient_part, pp.tva, pp.prestation_list_id,
                    pp.avenant_id, pp.head, pl.prestation_name, pl.prestation_code
             FROM prestation_price pp
             JOIN prestation_list pl ON pp.prestation_list_id = pl.id
             WHERE pp.annex_id = ? AND pp.avenant_id IS NULL AND pp.superseded_by IS NULL
             ORDER BY pl.prestation_code",
            annex_id,
        )
        .await
    }

    /// Current prices of an avenant generation.
    pub async fn list_for_avenant(&self, avenant_id: i64) -> BillingResult<Vec<PriceRow>> {
        self.list_rows(
            "SELECT pp.id, pp.price, pp.patient_part, pp.tva, pp.prestation_list_id,
                    pp.avenant_id, pp.head, pl.prestation_name, pl.prestation_code
             FROM prestation_price pp
             JOIN prestation_list pl ON pp.prestation_list_id = pl.id
             WHERE pp.avenant_id = ? AND pp.superseded_by IS NULL
             ORDER BY pl.prestation_code",
            avenant_id,
        )
        .await
    }

    async fn list_rows(&self, sql: &str, bind: i64) -> BillingResult<Vec<PriceRow>> {
        let rows = sqlx::query_as::<
            _,
            (i64, f64, f64, f64, i64, Option<i64>, bool, String, String),
        >(sql)
        .bind(bind)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, price, patient_part, tva, prestation_list_id, avenant_id, head, name, code)| {
                    PriceRow {
                        id,
                        price,
                        patient_part,
                        tva,
                        prestation_list_id,
                        avenant_id,
                        head,
                        prestation_name: name,
                        prestation_code: code,
                    }
                },
            )
            .collect())
    }
}

fn validate_amounts(price: f64, patient_part: f64, tva: f64) -> BillingResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(BillingError::InvalidInput("price must be a non-negative amount".into()));
    }
    if !patient_part.is_finite() || patient_part < 0.0 || patient_part > price {
        return Err(BillingError::InvalidInput(
            "patient part must be between zero and the full price".into(),
        ));
    }
    if !tva.is_finite() || tva < 0.0 {
        return Err(BillingError::InvalidInput("tva must be non-negative".into()));
    }
    Ok(())
}
