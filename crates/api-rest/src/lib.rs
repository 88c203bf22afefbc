//! # API REST
//!
//! REST API implementation for the Convia billing back office.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status mapping)
//!
//! Uses `api-shared` for wire DTOs and `convia-core` for all business
//! logic; nothing in this crate touches SQL directly.

#![warn(rust_2018_idioms)]

use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, patch, post, put},
    Router,
};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::dto;
use api_shared::HealthService;
use convia_core::{
    AnnexService, AvenantService, ContractService, PrestationPriceService, PriceResolver,
    RecordPrestationService,
};

pub mod error;
pub mod handlers;

use handlers::{annexes, avenants, contracts, prices, records};

/// Application state shared across REST API handlers.
///
/// One service per resource, all cloning the same pool.
#[derive(Clone)]
pub struct AppState {
    pub contracts: ContractService,
    pub annexes: AnnexService,
    pub avenants: AvenantService,
    pub prices: PrestationPriceService,
    pub records: RecordPrestationService,
    pub health: HealthService,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Self {
        let resolver = PriceResolver::new(pool.clone());
        Self {
            contracts: ContractService::new(pool.clone()),
            annexes: AnnexService::new(pool.clone()),
            avenants: AvenantService::new(pool.clone()),
            prices: PrestationPriceService::new(pool.clone()),
            records: RecordPrestationService::new(pool, resolver),
            health: HealthService::new(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        contracts::create_contract,
        contracts::list_contracts,
        contracts::list_company_contracts,
        contracts::get_contract,
        contracts::activate_contract,
        contracts::expire_contract,
        contracts::delete_contract,
        annexes::create_annex,
        annexes::update_annex,
        annexes::get_annex,
        annexes::list_contract_annexes,
        annexes::delete_annex,
        avenants::create_avenant,
        avenants::activate_avenant,
        avenants::get_avenant,
        avenants::list_contract_avenants,
        avenants::check_pending_avenant,
        prices::create_price,
        prices::create_avenant_price,
        prices::update_price,
        prices::delete_price,
        prices::delete_avenant_price,
        prices::list_annex_prices,
        prices::list_avenant_prices,
        records::attach_prestation,
        records::list_record_prestations,
        records::resolve_price,
        records::delete_record_prestation,
    ),
    components(schemas(
        dto::HealthRes,
        dto::MessageRes,
        dto::CreateContractReq,
        dto::ContractRes,
        dto::ContractSummary,
        dto::ContractDetail,
        dto::ContractMutationRes,
        dto::AnnexReq,
        dto::AnnexRes,
        dto::AnnexDetail,
        dto::PriceSupersession,
        dto::AvenantCreatedRes,
        dto::ActivateAvenantReq,
        dto::ActivateAvenantRes,
        dto::AvenantRes,
        dto::PendingAvenantRes,
        dto::PriceReq,
        dto::AvenantPriceReq,
        dto::PriceRes,
        dto::PriceRow,
        dto::AttachPrestationReq,
        dto::RecordPrestationRes,
        dto::RecordPrestationRow,
        dto::ResolvedPriceRes,
    ))
)]
pub struct ApiDoc;

/// Build the full application router over a connected pool.
pub fn router(pool: SqlitePool) -> Router {
    let state = AppState::new(pool);

    Router::new()
        .route("/health", get(health))
        .route("/contracts", get(contracts::list_contracts))
        .route(
            "/contracts/company/:company_id",
            post(contracts::create_contract).get(contracts::list_company_contracts),
        )
        .route(
            "/contracts/:contract_id",
            get(contracts::get_contract).delete(contracts::delete_contract),
        )
        .route(
            "/contracts/contract/:contract_id/activate",
            patch(contracts::activate_contract),
        )
        .route(
            "/contracts/contract/:contract_id/expire",
            patch(contracts::expire_contract),
        )
        .route(
            // Creation binds the id to a contract, the rest to an annex.
            "/annexes/:id",
            put(annexes::update_annex)
                .get(annexes::get_annex)
                .delete(annexes::delete_annex)
                .post(annexes::create_annex),
        )
        .route(
            "/annexes/contract/:contract_id",
            get(annexes::list_contract_annexes),
        )
        .route(
            "/avenants/avenant_creat/:contract_id",
            post(avenants::create_avenant),
        )
        .route(
            "/avenants/activate/:avenant_id",
            put(avenants::activate_avenant),
        )
        .route("/avenants/:avenant_id", get(avenants::get_avenant))
        .route(
            "/avenants/contract/:contract_id",
            get(avenants::list_contract_avenants),
        )
        .route(
            "/avenants/pending/check/:contract_id",
            get(avenants::check_pending_avenant),
        )
        .route("/prestations/avenant", post(prices::create_avenant_price))
        .route(
            // Creation binds the id to an annex, the rest to a price row.
            "/prestations/:id",
            post(prices::create_price)
                .put(prices::update_price)
                .delete(prices::delete_price),
        )
        .route(
            // Deletion binds the id to a price row, listing to an avenant.
            "/prestations/avenant/:id",
            delete(prices::delete_avenant_price).get(prices::list_avenant_prices),
        )
        .route("/prestations/annex/:annex_id", get(prices::list_annex_prices))
        .route("/record-prestations", post(records::attach_prestation))
        .route("/record-prestations/price", get(records::resolve_price))
        .route(
            "/record-prestations/:id",
            get(records::list_record_prestations).delete(records::delete_record_prestation),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Health check response", body = dto::HealthRes))
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
async fn health(State(state): State<AppState>) -> Json<dto::HealthRes> {
    Json(state.health.check_health_instance())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;
    use tower::ServiceExt;

    async fn test_router() -> (Router, SqlitePool) {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .expect("memory url")
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("pool");
        convia_core::db::migrate(&pool).await.expect("schema");
        (router(pool.clone()), pool)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_answers() {
        let (app, _pool) = test_router().await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], json!(true));
    }

    #[tokio::test]
    async fn contract_creation_maps_statuses() {
        let (app, pool) = test_router().await;
        sqlx::query("INSERT INTO company (company_name) VALUES ('Acme')")
            .execute(&pool)
            .await
            .unwrap();

        let valid = json!({
            "contract_name": "Acme 2024",
            "start_date": "2024-01-01",
            "end_date": "2025-01-01",
        });
        let response = app
            .clone()
            .oneshot(json_request("POST", "/contracts/company/1", valid))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["status"], json!("Pending"));

        // Inverted dates are a 400.
        let inverted = json!({
            "contract_name": "Bad",
            "start_date": "2025-01-01",
            "end_date": "2024-01-01",
        });
        let response = app
            .clone()
            .oneshot(json_request("POST", "/contracts/company/1", inverted))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Unknown company is a 404.
        let orphan = json!({
            "contract_name": "Orphan",
            "start_date": "2024-01-01",
            "end_date": "2025-01-01",
        });
        let response = app
            .oneshot(json_request("POST", "/contracts/company/99", orphan))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn activation_without_annex_is_rejected() {
        let (app, pool) = test_router().await;
        sqlx::query("INSERT INTO company (company_name) VALUES ('Acme')")
            .execute(&pool)
            .await
            .unwrap();
        let create = json!({
            "contract_name": "Acme",
            "start_date": "2024-01-01",
            "end_date": "2025-01-01",
        });
        app.clone()
            .oneshot(json_request("POST", "/contracts/company/1", create))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::patch("/contracts/contract/1/activate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("At least one annex is required"));

        // With an annex the same call succeeds.
        sqlx::query("INSERT INTO specialty (specialty_name) VALUES ('Cardiology')")
            .execute(&pool)
            .await
            .unwrap();
        let annex = json!({"annex_name": "Cardio", "specialty_id": 1});
        let response = app
            .clone()
            .oneshot(json_request("POST", "/annexes/1", annex))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(
                Request::patch("/contracts/contract/1/activate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn avenant_flow_over_http() {
        let (app, pool) = test_router().await;
        sqlx::query("INSERT INTO company (company_name) VALUES ('Acme')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO specialty (specialty_name) VALUES ('Cardiology')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO prestation_list (prestation_name, prestation_code, specialty_id)
             VALUES ('ECG', 'CAR01', 1)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let create = json!({
            "contract_name": "Acme",
            "start_date": "2024-01-01",
            "end_date": "2026-01-01",
        });
        app.clone()
            .oneshot(json_request("POST", "/contracts/company/1", create))
            .await
            .unwrap();
        app.clone()
            .oneshot(json_request(
                "POST",
                "/annexes/1",
                json!({"annex_name": "Cardio", "specialty_id": 1}),
            ))
            .await
            .unwrap();
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/prestations/1",
                json!({"prestation_list_id": 1, "price": 100.0, "patient_part": 20.0, "tva": 0.0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(
                Request::post("/avenants/avenant_creat/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        let avenant_id = body["avenant_id"].as_i64().unwrap();
        assert_eq!(body["prestations"].as_array().unwrap().len(), 1);

        // Pending check flips on.
        let response = app
            .clone()
            .oneshot(
                Request::get("/avenants/pending/check/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await["has_pending"], json!(true));

        // A second creation while pending is a 400.
        let response = app
            .clone()
            .oneshot(
                Request::post("/avenants/avenant_creat/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/avenants/activate/{avenant_id}"),
                json!({"activation_date": "2024-06-01"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], json!("Active"));
        assert_eq!(body["scheduled"], json!(false));

        // Resolution inside the generation's window lands on its price.
        sqlx::query(
            "INSERT INTO medical_record (contract_id, status, prise_en_charge_date)
             VALUES (1, 'open', '2024-07-01')",
        )
        .execute(&pool)
        .await
        .unwrap();
        let response = app
            .clone()
            .oneshot(
                Request::get(
                    "/record-prestations/price?contract_id=1&specialty_id=1&prestation_id=1&date=2024-07-01",
                )
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(json_request(
                "POST",
                "/record-prestations",
                json!({"medical_record_id": 1, "specialty_id": 1, "prestation_id": 1, "doctor_id": 7}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn unknown_resources_are_404() {
        let (app, _pool) = test_router().await;
        let response = app
            .clone()
            .oneshot(Request::get("/contracts/42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(Request::get("/avenants/42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
