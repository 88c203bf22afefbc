//! Mapping from core billing errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use convia_core::BillingError;

use api_shared::dto::MessageRes;

/// Wrapper so handlers can use `?` on core results directly.
pub struct ApiError(pub BillingError);

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            BillingError::InvalidInput(_)
            | BillingError::Precondition(_)
            | BillingError::IllegalTransition { .. } => {
                tracing::warn!(error = %self.0, "request rejected");
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            BillingError::NotFound(_) => {
                tracing::warn!(error = %self.0, "resource not found");
                (StatusCode::NOT_FOUND, self.0.to_string())
            }
            BillingError::Conflict(_) => {
                tracing::warn!(error = %self.0, "conflicting update");
                (StatusCode::CONFLICT, self.0.to_string())
            }
            BillingError::Database(err) => {
                tracing::error!(error = %err, "database failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
            }
        };
        (status, Json(MessageRes { message })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
