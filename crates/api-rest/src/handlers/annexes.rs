//! Annex endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use api_shared::dto::{AnnexDetail, AnnexReq, AnnexRes, MessageRes};
use convia_core::BillingError;

#[utoipa::path(
    post,
    path = "/annexes/{contract_id}",
    request_body = AnnexReq,
    responses(
        (status = 201, description = "Annex created", body = AnnexRes),
        (status = 404, description = "Contract not found")
    )
)]
#[axum::debug_handler]
pub async fn create_annex(
    State(state): State<AppState>,
    Path(contract_id): Path<i64>,
    Json(req): Json<AnnexReq>,
) -> ApiResult<(StatusCode, Json<AnnexRes>)> {
    let annex = state.annexes.create(contract_id, req).await?;
    Ok((StatusCode::CREATED, Json(annex)))
}

#[utoipa::path(
    put,
    path = "/annexes/{annex_id}",
    request_body = AnnexReq,
    responses(
        (status = 200, description = "Annex updated", body = AnnexRes),
        (status = 404, description = "Annex not found")
    )
)]
#[axum::debug_handler]
pub async fn update_annex(
    State(state): State<AppState>,
    Path(annex_id): Path<i64>,
    Json(req): Json<AnnexReq>,
) -> ApiResult<Json<AnnexRes>> {
    Ok(Json(state.annexes.update(annex_id, req).await?))
}

#[utoipa::path(
    get,
    path = "/annexes/{annex_id}",
    responses(
        (status = 200, description = "Annex with specialty", body = AnnexDetail),
        (status = 404, description = "Annex not found")
    )
)]
#[axum::debug_handler]
pub async fn get_annex(
    State(state): State<AppState>,
    Path(annex_id): Path<i64>,
) -> ApiResult<Json<AnnexDetail>> {
    Ok(Json(state.annexes.get(annex_id).await?))
}

#[utoipa::path(
    get,
    path = "/annexes/contract/{contract_id}",
    responses((status = 200, description = "Annexes of a contract", body = [AnnexDetail]))
)]
#[axum::debug_handler]
pub async fn list_contract_annexes(
    State(state): State<AppState>,
    Path(contract_id): Path<i64>,
) -> ApiResult<Json<Vec<AnnexDetail>>> {
    Ok(Json(state.annexes.list_for_contract(contract_id).await?))
}

#[utoipa::path(
    delete,
    path = "/annexes/{annex_id}",
    responses(
        (status = 200, description = "Annex deleted", body = MessageRes),
        (status = 400, description = "Annex still carries current prestation prices"),
        (status = 404, description = "Annex not found")
    )
)]
/// Delete an annex. Refused while current prestation prices exist; the
/// caller is expected to clear the catalogue first.
#[axum::debug_handler]
pub async fn delete_annex(
    State(state): State<AppState>,
    Path(annex_id): Path<i64>,
) -> ApiResult<Json<MessageRes>> {
    if state.annexes.has_prestations(annex_id).await? {
        return Err(ApiError(BillingError::Precondition(
            "Cannot delete annex: prestations are attached to it".into(),
        )));
    }
    state.annexes.delete(annex_id).await?;
    Ok(Json(MessageRes {
        message: "Annex deleted".into(),
    }))
}
