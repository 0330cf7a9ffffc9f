use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Config(String),
    #[error("{message}")]
    UpstreamStatus {
        status: u16,
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("{0}")]
    UpstreamData(String),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl AppError {
    pub fn bad_request<T: Into<String>>(message: T) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config(message.into())
    }

    pub fn upstream_status(status: u16, message: impl Into<String>) -> Self {
        Self::UpstreamStatus {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn upstream_data<T: Into<String>>(message: T) -> Self {
        Self::UpstreamData(message.into())
    }

    /// True for the soft failure shape that "nice to have" endpoints
    /// downgrade to a warning payload instead of surfacing.
    pub fn is_data_error(&self) -> bool {
        matches!(self, Self::UpstreamData(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, details) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            AppError::UpstreamStatus {
                status, details, ..
            } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                details.clone(),
            ),
            AppError::UpstreamData(_) => (StatusCode::BAD_GATEWAY, None),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        let body = ErrorBody {
            error: self.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_maps_to_its_own_code() {
        let response = AppError::upstream_status(403, "rate limited").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn bogus_upstream_status_falls_back_to_500() {
        let response = AppError::upstream_status(42, "weird").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bad_request_is_client_error() {
        let response = AppError::bad_request("login is required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
