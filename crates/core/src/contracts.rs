//! Contract lifecycle management.
//!
//! A contract is created Pending together with its head agreement-details
//! row (one transaction). Status then moves Pending → Active → Expired
//! under two business rules: activation requires at least one annex, and
//! the designated general contract can never be expired. Deletion is a
//! transactional cascade over every dependent row.

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::domain::{Contract, ContractStatus};
use crate::error::{BillingError, BillingResult};
use api_shared::dto::{ContractDetail, ContractRes, ContractSummary, CreateContractReq};

/// Parse a `YYYY-MM-DD` wire date.
pub(crate) fn parse_wire_date(value: &str, field: &str) -> BillingResult<NaiveDate> {
    value
        .parse()
        .map_err(|_| BillingError::InvalidInput(format!("{field} must be YYYY-MM-DD, got {value:?}")))
}

#[derive(Clone)]
pub struct ContractService {
    pool: SqlitePool,
}

impl ContractService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a Pending contract for a company together with its head
    /// agreement-details row. Both inserts share one transaction; any
    /// failure rolls both back.
    pub async fn create_for_company(
        &self,
        company_id: i64,
        req: CreateContractReq,
    ) -> BillingResult<ContractRes> {
        if req.contract_name.trim().is_empty() {
            return Err(BillingError::InvalidInput(
                "contract_name, start_date, and end_date are required".into(),
            ));
        }
        let start_date = parse_wire_date(&req.start_date, "start_date")?;
        let end_date = parse_wire_date(&req.end_date, "end_date")?;
        if end_date < start_date {
            return Err(BillingError::InvalidInput(
                "end_date must not precede start_date".into(),
            ));
        }

        let company_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM company WHERE id = ?")
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?;
        if company_exists.is_none() {
            return Err(BillingError::NotFound("Company not found"));
        }

        let mut tx = self.pool.begin().await?;

        let contract_id = sqlx::query(
            "INSERT INTO contract (contract_name, status, company_id, is_general)
             VALUES (?, 'Pending', ?, 0)",
        )
        .bind(&req.contract_name)
        .bind(company_id)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query(
            "INSERT INTO agreement_details
                 (contract_id, start_date, end_date, max_price, min_price,
                  discount_percentage, family_auth, head)
             VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(contract_id)
        .bind(start_date)
        .bind(end_date)
        .bind(req.max_price)
        .bind(req.min_price)
        .bind(req.discount_percentage)
        .bind(&req.family_auth)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(contract_id, company_id, "contract created");

        Ok(ContractRes {
            id: contract_id,
            contract_name: req.contract_name,
            status: ContractStatus::Pending.as_str().into(),
            company_id,
        })
    }

    /// Mark an existing contract as the single general/public fallback.
    ///
    /// The partial unique index on `is_general` rejects a second
    /// designation, surfaced as `Conflict`.
    pub async fn designate_general(&self, contract_id: i64) -> BillingResult<()> {
        let res = sqlx::query("UPDATE contract SET is_general = 1 WHERE id = ?")
            .bind(contract_id)
            .execute(&self.pool)
            .await
            .map_err(BillingError::from_sqlx)?;
        if res.rows_affected() == 0 {
            return Err(BillingError::NotFound("Contract not found"));
        }
        Ok(())
    }

    /// Activate a contract. Requires at least one annex.
    pub async fn activate(&self, contract_id: i64) -> BillingResult<ContractRes> {
        let contract = self.fetch(contract_id).await?;

        let annex_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM annex WHERE contract_id = ?")
                .bind(contract_id)
                .fetch_one(&self.pool)
                .await?;
        if annex_count == 0 {
            return Err(BillingError::Precondition(
                "Cannot activate contract: At least one annex is required before activation"
                    .into(),
            ));
        }

        self.set_status(contract_id, ContractStatus::Active).await?;
        Ok(ContractRes {
            id: contract.id,
            contract_name: contract.contract_name,
            status: ContractStatus::Active.as_str().into(),
            company_id: contract.company_id,
        })
    }

    /// Expire a contract. The general contract cannot be terminated.
    pub async fn expire(&self, contract_id: i64) -> BillingResult<ContractRes> {
        let contract = self.fetch(contract_id).await?;
        if contract.is_general {
            return Err(BillingError::Precondition(
                "Cannot terminate general contract".into(),
            ));
        }

        self.set_status(contract_id, ContractStatus::Expired).await?;
        Ok(ContractRes {
            id: contract.id,
            contract_name: contract.contract_name,
            status: ContractStatus::Expired.as_str().into(),
            company_id: contract.company_id,
        })
    }

    /// Delete a contract and every dependent row, one transaction:
    /// agreement details, the prestation prices of its annexes, the
    /// annexes themselves, then the contract.
    pub async fn delete(&self, contract_id: i64) -> BillingResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM agreement_details WHERE contract_id = ?")
            .bind(contract_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "DELETE FROM prestation_price
             WHERE annex_id IN (SELECT id FROM annex WHERE contract_id = ?)",
        )
        .bind(contract_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM annex WHERE contract_id = ?")
            .bind(contract_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM avenant WHERE contract_id = ?")
            .bind(contract_id)
            .execute(&mut *tx)
            .await?;

        let res = sqlx::query("DELETE FROM contract WHERE id = ?")
            .bind(contract_id)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(BillingError::NotFound("Contract not found or already deleted"));
        }

        tx.commit().await?;
        tracing::info!(contract_id, "contract deleted with dependents");
        Ok(())
    }

    /// Contracts of one company with their current agreement window,
    /// optionally filtered by status.
    pub async fn list_for_company(
        &self,
        company_id: i64,
        status: Option<&str>,
    ) -> BillingResult<Vec<ContractSummary>> {
        let mut sql = String::from(
            "SELECT contract.id, contract.contract_name, contract.status,
                    agreement_details.start_date, agreement_details.end_date
             FROM contract
             JOIN agreement_details
                 ON agreement_details.contract_id = contract.id
             WHERE contract.company_id = ?
               AND agreement_details.superseded_by IS NULL",
        );
        if status.is_some() {
            sql.push_str(" AND contract.status = ?");
        }
        sql.push_str(" ORDER BY contract.id DESC");

        let mut query = sqlx::query_as::<_, (i64, String, String, NaiveDate, NaiveDate)>(&sql)
            .bind(company_id);
        if let Some(status) = status {
            query = query.bind(status);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(id, contract_name, status, start, end)| ContractSummary {
                id,
                contract_name,
                status,
                start_date: start.to_string(),
                end_date: end.to_string(),
            })
            .collect())
    }

    /// All contracts with their current agreement window.
    pub async fn list_all(&self) -> BillingResult<Vec<ContractSummary>> {
        let rows = sqlx::query_as::<_, (i64, String, String, NaiveDate, NaiveDate)>(
            "SELECT contract.id, contract.contract_name, contract.status,
                    agreement_details.start_date, agreement_details.end_date
             FROM contract
             JOIN agreement_details
                 ON agreement_details.contract_id = contract.id
             WHERE agreement_details.superseded_by IS NULL
             ORDER BY contract.id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, contract_name, status, start, end)| ContractSummary {
                id,
                contract_name,
                status,
                start_date: start.to_string(),
                end_date: end.to_string(),
            })
            .collect())
    }

    /// One contract joined with its company and current agreement window.
    pub async fn get_detail(&self, contract_id: i64) -> BillingResult<ContractDetail> {
        let row = sqlx::query_as::<
            _,
            (i64, String, String, String, Option<NaiveDate>, Option<NaiveDate>, bool),
        >(
            "SELECT contract.id, contract.contract_name, contract.status,
                    company.company_name,
                    agreement_details.start_date, agreement_details.end_date,
                    contract.is_general
             FROM contract
             JOIN company ON contract.company_id = company.id
             LEFT JOIN agreement_details
                 ON agreement_details.contract_id = contract.id
                 AND agreement_details.superseded_by IS NULL
             WHERE contract.id = ?",
        )
        .bind(contract_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(BillingError::NotFound("Contract not found"))?;

        let (id, contract_name, status, company_name, start, end, is_general) = row;
        Ok(ContractDetail {
            id,
            contract_name,
            status,
            company_name,
            start_date: start.map(|d| d.format("%d/%m/%Y").to_string()),
            end_date: end.map(|d| d.format("%d/%m/%Y").to_string()),
            is_general,
        })
    }

    pub(crate) async fn fetch(&self, contract_id: i64) -> BillingResult<Contract> {
        sqlx::query_as::<_, Contract>(
            "SELECT id, contract_name, status, company_id, is_general
             FROM contract WHERE id = ?",
        )
        .bind(contract_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(BillingError::NotFound("Contract not found"))
    }

    async fn set_status(&self, contract_id: i64, status: ContractStatus) -> BillingResult<()> {
        let res = sqlx::query("UPDATE contract SET status = ? WHERE id = ?")
            .bind(status)
            .bind(contract_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(BillingError::NotFound("Contract not found"));
        }
        tracing::info!(contract_id, status = status.as_str(), "contract status changed");
        Ok(())
    }
}
