//! HTTP handlers.

pub mod change_request;
pub mod commits;
pub mod employees;
pub mod health;
pub mod rules;
pub mod schedules;
pub mod ws;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rota_core::RotaError;
use serde::Serialize;

/// Error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub retryable: bool,
}

/// A [`RotaError`] on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub RotaError);

impl From<RotaError> for ApiError {
    fn from(err: RotaError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &RotaError) -> StatusCode {
    match err {
        RotaError::NotFound { .. } => StatusCode::NOT_FOUND,
        RotaError::InvalidInput(_) | RotaError::SerializationError(_) => StatusCode::BAD_REQUEST,
        RotaError::Conflict(_)
        | RotaError::ReferentialIntegrity { .. }
        | RotaError::StaleWrite { .. }
        | RotaError::Cancelled { .. } => StatusCode::CONFLICT,
        RotaError::Contention { .. } | RotaError::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = ErrorBody {
            error: self.0.to_string(),
            retryable: self.0.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Shorthand for a 400 response.
pub fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError(RotaError::InvalidInput(message.into()))
}

/// `?start=&end=` query, both inclusive.
#[derive(Debug, Default, serde::Deserialize)]
pub struct RangeQuery {
    pub start: Option<chrono::NaiveDate>,
    pub end: Option<chrono::NaiveDate>,
}

impl RangeQuery {
    /// The requested range; a missing bound is open.
    pub fn to_range(&self) -> ApiResult<rota_core::DateRange> {
        let start = self.start.unwrap_or(chrono::NaiveDate::MIN);
        let end = self.end.unwrap_or(chrono::NaiveDate::MAX);
        Ok(rota_core::DateRange::new(start, end)?)
    }
}
