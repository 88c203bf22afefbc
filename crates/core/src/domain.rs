//! Domain entities and state machines.
//!
//! Rows carry their versioning metadata directly: a nullable
//! `superseded_by` pointer marks a row as historical and links it to its
//! replacement. A row is "current" while the pointer is null. History is
//! never deleted by a supersede, only by explicit cascading deletes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::BillingError;

// ============================================================================
// CONTRACT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum ContractStatus {
    Pending,
    Active,
    Expired,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Pending => "Pending",
            ContractStatus::Active => "Active",
            ContractStatus::Expired => "Expired",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Contract {
    pub id: i64,
    pub contract_name: String,
    pub status: ContractStatus,
    pub company_id: i64,
    pub is_general: bool,
}

// ============================================================================
// AGREEMENT DETAILS
// ============================================================================

/// Versioned pricing-terms snapshot. Exactly one row per
/// (contract, avenant-or-null) combination is current.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AgreementDetails {
    pub id: i64,
    pub contract_id: i64,
    pub avenant_id: Option<i64>,
    pub head: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_price: Option<f64>,
    pub min_price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub family_auth: Option<String>,
    pub superseded_by: Option<i64>,
}

// ============================================================================
// ANNEX
// ============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Annex {
    pub id: i64,
    pub annex_name: String,
    pub contract_id: i64,
    pub specialty_id: i64,
    pub created_by: String,
}

// ============================================================================
// AVENANT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum AvenantStatus {
    Pending,
    Active,
    Inactive,
}

impl AvenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvenantStatus::Pending => "Pending",
            AvenantStatus::Active => "Active",
            AvenantStatus::Inactive => "Inactive",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Avenant {
    pub id: i64,
    pub contract_id: i64,
    pub status: AvenantStatus,
    pub head: bool,
    pub activate_at: Option<NaiveDate>,
    pub inactive_at: Option<NaiveDate>,
    pub superseded_by: Option<i64>,
}

impl Avenant {
    pub fn state(&self) -> AvenantState {
        AvenantState::from_parts(self.status, self.activate_at, self.inactive_at)
    }
}

/// Explicit avenant lifecycle.
///
/// The database stores `status` plus two date columns; this sum type is
/// the legal-move view over them. `Scheduled` is a Pending avenant that
/// has received a future effective date without changing status; the
/// flip to `Active` is always a second explicit step (operator call or
/// the daily sweep).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvenantState {
    Pending,
    ScheduledFor(NaiveDate),
    Active(NaiveDate),
    Inactive(NaiveDate),
}

impl AvenantState {
    pub fn from_parts(
        status: AvenantStatus,
        activate_at: Option<NaiveDate>,
        inactive_at: Option<NaiveDate>,
    ) -> Self {
        match (status, activate_at, inactive_at) {
            (AvenantStatus::Pending, Some(on), _) => AvenantState::ScheduledFor(on),
            (AvenantStatus::Pending, None, _) => AvenantState::Pending,
            (AvenantStatus::Active, on, _) => {
                // An Active row always has its effective date stamped; fall
                // back to the date itself being absent only for legacy rows.
                AvenantState::Active(on.unwrap_or(NaiveDate::MIN))
            }
            (AvenantStatus::Inactive, _, since) => {
                AvenantState::Inactive(since.unwrap_or(NaiveDate::MIN))
            }
        }
    }

    pub fn status(&self) -> AvenantStatus {
        match self {
            AvenantState::Pending | AvenantState::ScheduledFor(_) => AvenantStatus::Pending,
            AvenantState::Active(_) => AvenantStatus::Active,
            AvenantState::Inactive(_) => AvenantStatus::Inactive,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AvenantState::Pending => "Pending",
            AvenantState::ScheduledFor(_) => "Scheduled",
            AvenantState::Active(_) => "Active",
            AvenantState::Inactive(_) => "Inactive",
        }
    }

    /// Record an intended future activation. Only meaningful before the
    /// avenant has gone live.
    pub fn schedule(self, on: NaiveDate) -> Result<Self, BillingError> {
        match self {
            AvenantState::Pending | AvenantState::ScheduledFor(_) => {
                Ok(AvenantState::ScheduledFor(on))
            }
            other => Err(BillingError::IllegalTransition {
                from: other.name(),
                to: "Scheduled",
            }),
        }
    }

    /// Go live. A superseded Inactive generation is never reactivated; a
    /// brand-new generation is created instead.
    pub fn activate(self, on: NaiveDate) -> Result<Self, BillingError> {
        match self {
            AvenantState::Pending | AvenantState::ScheduledFor(_) => Ok(AvenantState::Active(on)),
            other => Err(BillingError::IllegalTransition {
                from: other.name(),
                to: "Active",
            }),
        }
    }

    /// Retire as the in-force generation.
    pub fn deactivate(self, on: NaiveDate) -> Result<Self, BillingError> {
        match self {
            AvenantState::Active(_) => Ok(AvenantState::Inactive(on)),
            other => Err(BillingError::IllegalTransition {
                from: other.name(),
                to: "Inactive",
            }),
        }
    }
}

// ============================================================================
// PRESTATION PRICE
// ============================================================================

/// Priced catalogue entry: one prestation-list item valued for one
/// annex, optionally overridden within one avenant generation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PrestationPrice {
    pub id: i64,
    pub price: f64,
    pub patient_part: f64,
    pub tva: f64,
    pub annex_id: i64,
    pub prestation_list_id: i64,
    pub avenant_id: Option<i64>,
    pub head: bool,
    pub activate_at: Option<NaiveDate>,
    pub superseded_by: Option<i64>,
}
