//! Prestation price catalogue endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::error::ApiResult;
use crate::AppState;
use api_shared::dto::{AvenantPriceReq, MessageRes, PriceReq, PriceRes, PriceRow};

#[utoipa::path(
    post,
    path = "/prestations/{annex_id}",
    request_body = PriceReq,
    responses(
        (status = 201, description = "Base price created", body = PriceRes),
        (status = 400, description = "Invalid amounts"),
        (status = 404, description = "Annex or prestation not found"),
        (status = 409, description = "A current price already exists for this prestation")
    )
)]
#[axum::debug_handler]
pub async fn create_price(
    State(state): State<AppState>,
    Path(annex_id): Path<i64>,
    Json(req): Json<PriceReq>,
) -> ApiResult<(StatusCode, Json<PriceRes>)> {
    let price = state.prices.add(annex_id, req).await?;
    Ok((StatusCode::CREATED, Json(price)))
}

#[utoipa::path(
    post,
    path = "/prestations/avenant",
    request_body = AvenantPriceReq,
    responses(
        (status = 201, description = "Generation price created", body = PriceRes),
        (status = 404, description = "Avenant, annex or prestation not found")
    )
)]
/// Price a prestation under an avenant generation, bootstrapping the
/// specialty annex when needed.
#[axum::debug_handler]
pub async fn create_avenant_price(
    State(state): State<AppState>,
    Json(req): Json<AvenantPriceReq>,
) -> ApiResult<(StatusCode, Json<PriceRes>)> {
    let price = state.prices.add_in_avenant(req).await?;
    Ok((StatusCode::CREATED, Json(price)))
}

#[utoipa::path(
    put,
    path = "/prestations/{prestation_id}",
    request_body = PriceReq,
    responses(
        (status = 200, description = "Price updated", body = PriceRes),
        (status = 404, description = "Price not found")
    )
)]
#[axum::debug_handler]
pub async fn update_price(
    State(state): State<AppState>,
    Path(prestation_id): Path<i64>,
    Json(req): Json<PriceReq>,
) -> ApiResult<Json<PriceRes>> {
    Ok(Json(state.prices.edit(prestation_id, req).await?))
}

#[utoipa::path(
    delete,
    path = "/prestations/{prestation_id}",
    responses(
        (status = 200, description = "Price deleted", body = MessageRes),
        (status = 400, description = "Price is referenced by billed acts"),
        (status = 404, description = "Price not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_price(
    State(state): State<AppState>,
    Path(prestation_id): Path<i64>,
) -> ApiResult<Json<MessageRes>> {
    state.prices.delete(prestation_id).await?;
    Ok(Json(MessageRes {
        message: "Prestation price deleted".into(),
    }))
}

#[utoipa::path(
    delete,
    path = "/prestations/avenant/{prestation_id}",
    responses(
        (status = 200, description = "Generation price removed, predecessor restored", body = MessageRes),
        (status = 404, description = "Price not found")
    )
)]
/// Remove a price from a generation. The row it superseded becomes
/// current again.
#[axum::debug_handler]
pub async fn delete_avenant_price(
    State(state): State<AppState>,
    Path(prestation_id): Path<i64>,
) -> ApiResult<Json<MessageRes>> {
    state.prices.delete(prestation_id).await?;
    Ok(Json(MessageRes {
        message: "Prestation removed from avenant".into(),
    }))
}

#[utoipa::path(
    get,
    path = "/prestations/annex/{annex_id}",
    responses((status = 200, description = "Current base prices of an annex", body = [PriceRow]))
)]
#[axum::debug_handler]
pub async fn list_annex_prices(
    State(state): State<AppState>,
    Path(annex_id): Path<i64>,
) -> ApiResult<Json<Vec<PriceRow>>> {
    Ok(Json(state.prices.list_for_annex(annex_id).await?))
}

#[utoipa::path(
    get,
    path = "/prestations/avenant/{avenant_id}",
    responses((status = 200, description = "Current prices of a generation", body = [PriceRow]))
)]
#[axum::debug_handler]
pub async fn list_avenant_prices(
    State(state): State<AppState>,
    Path(avenant_id): Path<i64>,
) -> ApiResult<Json<Vec<PriceRow>>> {
    Ok(Json(state.prices.list_for_avenant(avenant_id).await?))
}
