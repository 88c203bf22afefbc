//! Contract endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::AppState;
use api_shared::dto::{
    ContractDetail, ContractMutationRes, ContractRes, ContractSummary, CreateContractReq,
    MessageRes,
};

#[derive(Debug, Deserialize)]
pub struct ContractListQuery {
    pub status: Option<String>,
}

#[utoipa::path(
    post,
    path = "/contracts/company/{company_id}",
    request_body = CreateContractReq,
    responses(
        (status = 201, description = "Contract created with its agreement terms", body = ContractRes),
        (status = 400, description = "Invalid names or dates"),
        (status = 404, description = "Company not found")
    )
)]
/// Create a Pending contract for a company.
#[axum::debug_handler]
pub async fn create_contract(
    State(state): State<AppState>,
    Path(company_id): Path<i64>,
    Json(req): Json<CreateContractReq>,
) -> ApiResult<(StatusCode, Json<ContractRes>)> {
    let contract = state.contracts.create_for_company(company_id, req).await?;
    Ok((StatusCode::CREATED, Json(contract)))
}

#[utoipa::path(
    get,
    path = "/contracts",
    responses((status = 200, description = "All contracts with current terms", body = [ContractSummary]))
)]
#[axum::debug_handler]
pub async fn list_contracts(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ContractSummary>>> {
    Ok(Json(state.contracts.list_all().await?))
}

#[utoipa::path(
    get,
    path = "/contracts/company/{company_id}",
    params(("status" = Option<String>, Query, description = "Filter by contract status")),
    responses((status = 200, description = "Company contracts", body = [ContractSummary]))
)]
#[axum::debug_handler]
pub async fn list_company_contracts(
    State(state): State<AppState>,
    Path(company_id): Path<i64>,
    Query(query): Query<ContractListQuery>,
) -> ApiResult<Json<Vec<ContractSummary>>> {
    let contracts = state
        .contracts
        .list_for_company(company_id, query.status.as_deref())
        .await?;
    Ok(Json(contracts))
}

#[utoipa::path(
    get,
    path = "/contracts/{contract_id}",
    responses(
        (status = 200, description = "Contract with company and current agreement", body = ContractDetail),
        (status = 404, description = "Contract not found")
    )
)]
#[axum::debug_handler]
pub async fn get_contract(
    State(state): State<AppState>,
    Path(contract_id): Path<i64>,
) -> ApiResult<Json<ContractDetail>> {
    Ok(Json(state.contracts.get_detail(contract_id).await?))
}

#[utoipa::path(
    patch,
    path = "/contracts/contract/{contract_id}/activate",
    responses(
        (status = 200, description = "Contract activated", body = ContractMutationRes),
        (status = 400, description = "Contract has no annex yet"),
        (status = 404, description = "Contract not found")
    )
)]
/// Activate a contract. Requires at least one annex.
#[axum::debug_handler]
pub async fn activate_contract(
    State(state): State<AppState>,
    Path(contract_id): Path<i64>,
) -> ApiResult<Json<ContractMutationRes>> {
    let contract = state.contracts.activate(contract_id).await?;
    Ok(Json(ContractMutationRes {
        message: "Contract activated".into(),
        contract,
    }))
}

#[utoipa::path(
    patch,
    path = "/contracts/contract/{contract_id}/expire",
    responses(
        (status = 200, description = "Contract expired", body = ContractMutationRes),
        (status = 400, description = "The general contract cannot be terminated"),
        (status = 404, description = "Contract not found")
    )
)]
#[axum::debug_handler]
pub async fn expire_contract(
    State(state): State<AppState>,
    Path(contract_id): Path<i64>,
) -> ApiResult<Json<ContractMutationRes>> {
    let contract = state.contracts.expire(contract_id).await?;
    Ok(Json(ContractMutationRes {
        message: "Contract terminated".into(),
        contract,
    }))
}

#[utoipa::path(
    delete,
    path = "/contracts/{contract_id}",
    responses(
        (status = 200, description = "Contract and dependents deleted", body = MessageRes),
        (status = 404, description = "Contract not found")
    )
)]
/// Delete a contract with its agreement terms, annexes and prices.
#[axum::debug_handler]
pub async fn delete_contract(
    State(state): State<AppState>,
    Path(contract_id): Path<i64>,
) -> ApiResult<Json<MessageRes>> {
    state.contracts.delete(contract_id).await?;
    Ok(Json(MessageRes {
        message: "Contract deleted".into(),
    }))
}
