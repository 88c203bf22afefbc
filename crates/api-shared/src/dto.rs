//! Request and response DTOs for the REST surface.
//!
//! Dates cross the wire as strings (`YYYY-MM-DD` on input, display
//! formats on output) exactly as the frontend expects; parsing and
//! validation happen in `convia-core`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Generic human-readable message envelope, used by mutations that have
/// nothing structured to return.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageRes {
    pub message: String,
}

// ============================================================================
// CONTRACTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateContractReq {
    pub contract_name: String,
    /// Agreement validity start, `YYYY-MM-DD`.
    pub start_date: String,
    /// Agreement validity end, `YYYY-MM-DD`.
    pub end_date: String,
    pub max_price: Option<f64>,
    pub min_price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub family_auth: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContractRes {
    pub id: i64,
    pub contract_name: String,
    pub status: String,
    pub company_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContractSummary {
    pub id: i64,
    pub contract_name: String,
    pub status: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContractDetail {
    pub id: i64,
    pub contract_name: String,
    pub status: String,
    pub company_name: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub is_general: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContractMutationRes {
    pub message: String,
    pub contract: ContractRes,
}

// ============================================================================
// ANNEXES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnnexReq {
    pub annex_name: String,
    pub specialty_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnnexRes {
    pub id: i64,
    pub annex_name: String,
    pub contract_id: i64,
    pub specialty_id: i64,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnnexDetail {
    pub id: i64,
    pub annex_name: String,
    pub contract_id: i64,
    pub specialty_id: i64,
    pub specialty_name: String,
    pub created_at: String,
    pub created_by: String,
}

// ============================================================================
// AVENANTS
// ============================================================================

/// One price row carried into a new amendment generation: the original
/// row id and the id of its duplicate under the new avenant.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PriceSupersession {
    pub old_id: i64,
    pub new_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvenantCreatedRes {
    pub avenant_id: i64,
    pub prestations: Vec<PriceSupersession>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivateAvenantReq {
    /// Effective date, `YYYY-MM-DD`. Defaults to today when absent.
    pub activation_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivateAvenantRes {
    pub avenant_id: i64,
    pub status: String,
    /// The date the activation takes (or is scheduled to take) effect.
    pub effective_date: String,
    pub scheduled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvenantRes {
    pub id: i64,
    pub contract_id: i64,
    pub status: String,
    pub created_at: String,
    pub activate_at: Option<String>,
    pub contract_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PendingAvenantRes {
    pub has_pending: bool,
}

// ============================================================================
// PRESTATION PRICES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PriceReq {
    pub prestation_list_id: i64,
    pub price: f64,
    pub patient_part: f64,
    pub tva: f64,
}

/// Price creation under an avenant generation. The annex may be omitted;
/// the server locates (or bootstraps) the annex for the prestation's
/// specialty on the avenant's contract.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvenantPriceReq {
    pub avenant_id: i64,
    pub prestation_list_id: i64,
    pub price: f64,
    pub patient_part: f64,
    pub tva: f64,
    pub annex_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PriceRes {
    pub id: i64,
    pub price: f64,
    pub patient_part: f64,
    pub tva: f64,
    pub annex_id: i64,
    pub prestation_list_id: i64,
    pub avenant_id: Option<i64>,
    pub head: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PriceRow {
    pub id: i64,
    pub price: f64,
    pub patient_part: f64,
    pub tva: f64,
    pub prestation_list_id: i64,
    pub avenant_id: Option<i64>,
    pub head: bool,
    pub prestation_name: String,
    pub prestation_code: String,
}

// ============================================================================
// MEDICAL RECORD PRESTATIONS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttachPrestationReq {
    pub medical_record_id: i64,
    pub specialty_id: i64,
    pub prestation_id: i64,
    pub doctor_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecordPrestationRes {
    pub id: i64,
    pub prestation_name: String,
    pub prestation_code: String,
    pub specialty_name: String,
    pub patient_part: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecordPrestationRow {
    pub id: i64,
    pub payment_status: String,
    pub prestation_name: String,
    pub prestation_code: String,
    pub specialty_name: String,
    pub patient_part: f64,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResolvedPriceRes {
    pub prestation_price_id: i64,
}
