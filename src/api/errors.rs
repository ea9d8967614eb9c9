use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::session::{Redirect, SessionError};

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    TooManyRequests(&'static str),
    ServiceUnavailable(String),
    Internal(String),
    /// 303 See Other to `location`.
    Redirect(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    /// Maps controller failures onto HTTP: refusals redirect, store trouble is retryable.
    pub(crate) fn from_session(err: SessionError, api_prefix: &str) -> Self {
        match err {
            SessionError::NotFound(_) => ApiError::NotFound("Test not found".to_string()),
            SessionError::Redirect(Redirect::Catalog) => {
                ApiError::Redirect(format!("{api_prefix}/tests"))
            }
            SessionError::Redirect(Redirect::Results { attempt_id }) => {
                ApiError::Redirect(format!("{api_prefix}/results/{attempt_id}"))
            }
            SessionError::Load(source) => {
                tracing::warn!(error = %source, "Test session load failed");
                ApiError::ServiceUnavailable("Failed to load the test, please retry".to_string())
            }
            SessionError::InvalidSelection(message) => ApiError::BadRequest(message),
            SessionError::InvalidPhase { actual, .. } => {
                ApiError::Conflict(format!("Session is {actual:?}"))
            }
            SessionError::Submit(_) => {
                ApiError::ServiceUnavailable("Submission failed, please retry".to_string())
            }
            SessionError::Store(source) => ApiError::internal(source, "Attempt store failed"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                let status = StatusCode::UNAUTHORIZED;
                let mut response = (
                    status,
                    Json(ErrorResponse { status: status.as_u16(), detail: message.to_string() }),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::Forbidden(message) => {
                let status = StatusCode::FORBIDDEN;
                (
                    status,
                    Json(ErrorResponse { status: status.as_u16(), detail: message.to_string() }),
                )
                    .into_response()
            }
            ApiError::BadRequest(message) => {
                let status = StatusCode::BAD_REQUEST;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::NotFound(message) => {
                let status = StatusCode::NOT_FOUND;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::Conflict(message) => {
                let status = StatusCode::CONFLICT;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::TooManyRequests(message) => {
                let status = StatusCode::TOO_MANY_REQUESTS;
                (
                    status,
                    Json(ErrorResponse { status: status.as_u16(), detail: message.to_string() }),
                )
                    .into_response()
            }
            ApiError::ServiceUnavailable(message) => {
                tracing::error!(error = %message, "Service unavailable");
                let status = StatusCode::SERVICE_UNAVAILABLE;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::Redirect(location) => {
                let status = StatusCode::SEE_OTHER;
                let mut response = (
                    status,
                    Json(ErrorResponse { status: status.as_u16(), detail: location.clone() }),
                )
                    .into_response();
                if let Ok(value) = HeaderValue::from_str(&location) {
                    response.headers_mut().insert(header::LOCATION, value);
                }
                response
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
        }
    }
}
