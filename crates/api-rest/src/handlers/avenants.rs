//! Avenant endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use api_shared::dto::{
    ActivateAvenantReq, ActivateAvenantRes, AvenantCreatedRes, AvenantRes, PendingAvenantRes,
};
use convia_core::BillingError;

#[derive(Debug, Deserialize)]
pub struct ActivateQuery {
    /// `yes` schedules the activation instead of applying it now.
    pub activate_later: Option<String>,
}

#[utoipa::path(
    post,
    path = "/avenants/avenant_creat/{contract_id}",
    responses(
        (status = 201, description = "Avenant created with duplicated prices", body = AvenantCreatedRes),
        (status = 400, description = "A pending avenant already exists"),
        (status = 404, description = "Contract has no annexes")
    )
)]
/// Open a new amendment generation on a contract.
#[axum::debug_handler]
pub async fn create_avenant(
    State(state): State<AppState>,
    Path(contract_id): Path<i64>,
) -> ApiResult<(StatusCode, Json<AvenantCreatedRes>)> {
    let created = state.avenants.create_for_contract(contract_id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/avenants/activate/{avenant_id}",
    request_body = ActivateAvenantReq,
    params(("activate_later" = Option<String>, Query, description = "`yes` to schedule instead of activating")),
    responses(
        (status = 200, description = "Avenant activated or scheduled", body = ActivateAvenantRes),
        (status = 400, description = "Illegal state transition or bad date"),
        (status = 404, description = "Avenant not found")
    )
)]
/// Activate an avenant immediately, or schedule it when
/// `activate_later=yes`.
#[axum::debug_handler]
pub async fn activate_avenant(
    State(state): State<AppState>,
    Path(avenant_id): Path<i64>,
    Query(query): Query<ActivateQuery>,
    Json(req): Json<ActivateAvenantReq>,
) -> ApiResult<Json<ActivateAvenantRes>> {
    let date = req
        .activation_date
        .as_deref()
        .map(|raw| {
            raw.parse::<NaiveDate>().map_err(|_| {
                ApiError(BillingError::InvalidInput(format!(
                    "activation_date must be YYYY-MM-DD, got '{raw}'"
                )))
            })
        })
        .transpose()?;
    let delayed = query.activate_later.as_deref() == Some("yes");

    let res = state.avenants.activate(avenant_id, date, delayed).await?;
    Ok(Json(res))
}

#[utoipa::path(
    get,
    path = "/avenants/{avenant_id}",
    responses(
        (status = 200, description = "Avenant with its contract status", body = AvenantRes),
        (status = 404, description = "Avenant not found")
    )
)]
#[axum::debug_handler]
pub async fn get_avenant(
    State(state): State<AppState>,
    Path(avenant_id): Path<i64>,
) -> ApiResult<Json<AvenantRes>> {
    Ok(Json(state.avenants.get(avenant_id).await?))
}

#[utoipa::path(
    get,
    path = "/avenants/contract/{contract_id}",
    responses((status = 200, description = "Avenants of a contract, newest first", body = [AvenantRes]))
)]
#[axum::debug_handler]
pub async fn list_contract_avenants(
    State(state): State<AppState>,
    Path(contract_id): Path<i64>,
) -> ApiResult<Json<Vec<AvenantRes>>> {
    Ok(Json(state.avenants.list_for_contract(contract_id).await?))
}

#[utoipa::path(
    get,
    path = "/avenants/pending/check/{contract_id}",
    responses((status = 200, description = "Whether a pending avenant exists", body = PendingAvenantRes))
)]
#[axum::debug_handler]
pub async fn check_pending_avenant(
    State(state): State<AppState>,
    Path(contract_id): Path<i64>,
) -> ApiResult<Json<PendingAvenantRes>> {
    let has_pending = state.avenants.pending_exists(contract_id).await?;
    Ok(Json(PendingAvenantRes { has_pending }))
}
