//! Error body shared by every endpoint.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use spamguard_serving::ServiceError;
use uuid::Uuid;

/// JSON body returned on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code (e.g. `service_unavailable`).
    pub error: String,
    /// Human-readable explanation.
    pub message: String,
    /// Correlation id, also written to the server log.
    pub request_id: String,
}

/// Failures an endpoint can answer with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Body is not parseable JSON or has the wrong content type (400).
    #[error("malformed request: {0}")]
    BadRequest(String),
    /// Body parsed but a field failed validation (422).
    #[error("invalid request: {0}")]
    Unprocessable(String),
    /// No model is ready to classify (503).
    #[error("{0}")]
    ServiceUnavailable(String),
    /// Explicit reload failed (503).
    #[error("{0}")]
    ModelLoadFailed(String),
}

impl ApiError {
    /// HTTP status for the error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ServiceUnavailable(_) | Self::ModelLoadFailed(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Stable code carried in [`ErrorResponse::error`].
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unprocessable(_) => "invalid_input",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::ModelLoadFailed(_) => "model_load_failed",
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::ServiceUnavailable { .. } => Self::ServiceUnavailable(err.to_string()),
            ServiceError::InvalidInput(msg) => Self::Unprocessable(msg),
            ServiceError::ArtifactLoad(_) => Self::ModelLoadFailed(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(_) => Self::Unprocessable(rejection.body_text()),
            _ => Self::BadRequest(rejection.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = Uuid::new_v4().to_string();
        if status.is_server_error() {
            tracing::error!(error_type = self.code(), status = status.as_u16(), %request_id, message = %self, "request failed");
        } else {
            tracing::warn!(error_type = self.code(), status = status.as_u16(), %request_id, message = %self, "request rejected");
        }
        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
            request_id,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_distinct_statuses() {
        let unavailable: ApiError = ServiceError::ServiceUnavailable {
            state: "failed",
            reason: "missing".into(),
        }
        .into();
        assert_eq!(unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unavailable.code(), "service_unavailable");

        let invalid: ApiError = ServiceError::InvalidInput("not a string".into()).into();
        assert_eq!(invalid.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
