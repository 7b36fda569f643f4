//! ABOUTME: Maps `CoreError` onto HTTP status codes via `ErrorOutcome`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sage_core::{CoreError, ErrorOutcome};

use super::dto::ErrorBody;

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.outcome() {
            ErrorOutcome::BadRequest => StatusCode::BAD_REQUEST,
            ErrorOutcome::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorOutcome::Forbidden => StatusCode::FORBIDDEN,
            ErrorOutcome::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorOutcome::Transient | ErrorOutcome::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}
