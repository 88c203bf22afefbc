//! Medical-record prestation endpoints.

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
    AttachPrestationReq, MessageRes, RecordPrestationRes, RecordPrestationRow, ResolvedPriceRes,
};
use convia_core::BillingError;

#[derive(Debug, Deserialize)]
pub struct ResolvePriceQuery {
    pub contract_id: i64,
    pub specialty_id: i64,
    pub prestation_id: i64,
    /// Act date, `YYYY-MM-DD`.
    pub date: String,
}

#[utoipa::path(
    post,
    path = "/record-prestations",
    request_body = AttachPrestationReq,
    responses(
        (status = 201, description = "Prestation attached with its resolved price", body = RecordPrestationRes),
        (status = 400, description = "Record already billed"),
        (status = 404, description = "Record unknown or no price resolves")
    )
)]
/// Attach a performed prestation to a medical record.
#[axum::debug_handler]
pub async fn attach_prestation(
    State(state): State<AppState>,
    Json(req): Json<AttachPrestationReq>,
) -> ApiResult<(StatusCode, Json<RecordPrestationRes>)> {
    let attached = state.records.attach(req).await?;
    Ok((StatusCode::CREATED, Json(attached)))
}

#[utoipa::path(
    get,
    path = "/record-prestations/{medical_record_id}",
    responses((status = 200, description = "Acts on a record, newest first", body = [RecordPrestationRow]))
)]
#[axum::debug_handler]
pub async fn list_record_prestations(
    State(state): State<AppState>,
    Path(medical_record_id): Path<i64>,
) -> ApiResult<Json<Vec<RecordPrestationRow>>> {
    Ok(Json(state.records.list_for_record(medical_record_id).await?))
}

#[utoipa::path(
    get,
    path = "/record-prestations/price",
    params(
        ("contract_id" = i64, Query, description = "Contract of the medical record"),
        ("specialty_id" = i64, Query, description = "Specialty of the act"),
        ("prestation_id" = i64, Query, description = "Prestation performed"),
        ("date" = String, Query, description = "Act date, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Governing price row", body = ResolvedPriceRes),
        (status = 404, description = "No prestation price found")
    )
)]
/// Dry-run price resolution without attaching anything.
#[axum::debug_handler]
pub async fn resolve_price(
    State(state): State<AppState>,
    Query(query): Query<ResolvePriceQuery>,
) -> ApiResult<Json<ResolvedPriceRes>> {
    let date = query.date.parse::<NaiveDate>().map_err(|_| {
        ApiError(BillingError::InvalidInput(format!(
            "date must be YYYY-MM-DD, got '{}'",
            query.date
        )))
    })?;
    let prestation_price_id = state
        .records
        .resolve_price(query.contract_id, query.prestation_id, query.specialty_id, date)
        .await?;
    Ok(Json(ResolvedPriceRes { prestation_price_id }))
}

#[utoipa::path(
    delete,
    path = "/record-prestations/{id}",
    responses(
        (status = 200, description = "Act removed from the record", body = MessageRes),
        (status = 400, description = "Act has been paid"),
        (status = 404, description = "Act not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_record_prestation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageRes>> {
    state.records.delete_unpaid(id).await?;
    Ok(Json(MessageRes {
        message: "Prestation removed from record".into(),
    }))
}
