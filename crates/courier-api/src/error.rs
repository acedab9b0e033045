//! Maps handler failures to `{"detail": ...}` HTTP responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use axum_extra::extract::WithRejection;
use tracing::error;

use courier_tasks::ScheduleError;

/// JSON body extractor whose failures answer 400 `{"detail"}` instead of
/// axum's plain-text 422.
pub type ApiJson<T> = WithRejection<Json<T>, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidBody(#[from] JsonRejection),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::BadRequest(detail.into())
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::Unauthorized(detail.into())
    }

    pub fn forbidden() -> Self {
        Self::Forbidden("You do not have permission to perform this action.".into())
    }

    pub fn not_found() -> Self {
        Self::NotFound("Not found.".into())
    }

    /// Error for a foreign key in the request that matches no row.
    pub fn invalid_pk(field: &str, id: i64) -> Self {
        Self::BadRequest(format!("{field}: Invalid pk \"{id}\" - object does not exist."))
    }
}

impl From<ScheduleError> for ApiError {
    fn from(e: ScheduleError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            Self::Unauthorized(detail) => (StatusCode::UNAUTHORIZED, detail),
            Self::Forbidden(detail) => (StatusCode::FORBIDDEN, detail),
            Self::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            Self::InvalidBody(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
            Self::Internal(e) => {
                error!("Internal server error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}
