//! API error type with structured JSON responses.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use meditrack_common::EngineError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// Request-level failures with their HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    #[error("Not trained: {0}")]
    NotTrained(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::InsufficientData(detail) => {
                (StatusCode::BAD_REQUEST, "INSUFFICIENT_DATA", detail)
            }
            ApiError::NotTrained(detail) => (StatusCode::CONFLICT, "NOT_TRAINED", detail),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::InsufficientData(_) => ApiError::InsufficientData(message),
            EngineError::NotTrained(_) => ApiError::NotTrained(message),
            EngineError::NotFound(_) => ApiError::NotFound(message),
            EngineError::DimensionMismatch { .. } | EngineError::InvalidInput(_) => {
                ApiError::BadRequest(message)
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("training task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn not_trained_returns_409() {
        let api_err: ApiError = EngineError::NotTrained("Models").into();
        let response = api_err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "NOT_TRAINED");
        assert_eq!(json["error"]["message"], "Models not trained yet");
    }

    #[tokio::test]
    async fn not_found_returns_404() {
        let api_err: ApiError = EngineError::NotFound("Doctor x not found in trained data".into()).into();
        let response = api_err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "Doctor x not found in trained data");
    }

    #[tokio::test]
    async fn insufficient_data_returns_400() {
        let api_err: ApiError = EngineError::InsufficientData("need more".into()).into();
        let response = api_err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INSUFFICIENT_DATA");
    }

    #[tokio::test]
    async fn dimension_mismatch_returns_400() {
        let api_err: ApiError = EngineError::DimensionMismatch { expected: 3, actual: 1 }.into();
        assert_eq!(api_err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("training task panicked".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }
}
