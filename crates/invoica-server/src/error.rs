use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use invoica_store::StoreError;

/// API error taxonomy: validation (400), auth (401/403), not-found (404),
/// conflict (409), upstream-integration (502), internal (500).
///
/// Upstream and internal variants keep full detail for the server log but
/// surface only a generic message to clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound("record not found".to_string()),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ApiError::Upstream(detail) => {
                tracing::error!(detail = %detail, "upstream integration failure");
                (StatusCode::BAD_GATEWAY, "Upstream service error".to_string())
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_404() {
        let api: ApiError = StoreError::NotFound.into();
        assert!(matches!(api, ApiError::NotFound(_)));
    }

    #[test]
    fn store_conflict_maps_to_409() {
        let api: ApiError = StoreError::Conflict("dup".into()).into();
        assert!(matches!(api, ApiError::Conflict(_)));
    }
}
