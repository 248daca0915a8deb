//! # REST API Errors
//!
//! Every failure a handler can produce, and the central translation of
//! those failures into the response envelope.
//!
//! Handlers return [`ApiError`]. Its `IntoResponse` renders a production
//! style body and stashes the error in the response extensions; the
//! [`translate_errors`] middleware then re-renders it for the configured
//! [`Mode`] and logs it.

use std::error::Error as StdError;

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::auth::email::EmailError;
use crate::auth::AuthError;
use crate::config::Mode;
use crate::store::StoreError;

/// Result type for REST operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Message clients see for unclassified failures in production
pub const GENERIC_MESSAGE: &str = "Something went wrong!";

/// REST API errors
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Schema validation failed
    #[error("Invalid input data. {}", .0.join(". "))]
    Validation(Vec<String>),

    /// Resource not found
    #[error("{0}")]
    NotFound(String),

    /// Malformed id or value
    #[error("Invalid {path}: {value}")]
    Cast { path: String, value: String },

    /// Unique index violation
    #[error("Duplicate field value: {0}. Please use another value!")]
    Duplicate(String),

    /// Malformed request
    #[error("{0}")]
    BadRequest(String),

    // ==================
    // Auth Errors
    // ==================
    /// Authentication or authorization error
    #[error("{0}")]
    Auth(#[from] AuthError),

    // ==================
    // Server Errors (5xx)
    // ==================
    /// Mail could not be delivered
    #[error("There was an error sending the email. Try again later!")]
    Email(#[source] EmailError),

    /// Expected failure with a client-safe message and explicit status
    #[error("{message}")]
    Operational { status: u16, message: String },

    /// Unclassified store failure
    #[error("document store failure")]
    Store(#[source] StoreError),

    /// Unclassified internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// 404 for an id that matches nothing
    pub fn no_document() -> Self {
        ApiError::NotFound("No document found with that ID".to_string())
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Cast { .. } => StatusCode::BAD_REQUEST,
            ApiError::Duplicate(_) => StatusCode::BAD_REQUEST,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,

            // 401/403/404 from auth
            ApiError::Auth(auth_err) => StatusCode::from_u16(auth_err.status_code())
                .unwrap_or(StatusCode::UNAUTHORIZED),

            // 404 Not Found
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,

            ApiError::Operational { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }

            // 500 Internal Server Error
            ApiError::Email(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the message is safe to show clients in production
    pub fn is_operational(&self) -> bool {
        match self {
            ApiError::Auth(auth_err) => auth_err.is_client_error(),
            ApiError::Store(_) | ApiError::Internal(_) => false,
            _ => true,
        }
    }

    /// `fail` for 4xx, `error` for 5xx
    pub fn status_label(&self) -> &'static str {
        if self.status_code().is_client_error() {
            "fail"
        } else {
            "error"
        }
    }

    /// Human readable chain of underlying causes
    fn source_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.source();
        while let Some(err) = current {
            chain.push(err.to_string());
            current = err.source();
        }
        chain
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Cast { path, value, .. } => ApiError::Cast { path, value },
            StoreError::DuplicateKey { value, .. } => ApiError::Duplicate(value),
            StoreError::Validation(messages) => ApiError::Validation(messages),
            other => ApiError::Store(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Vec<String>>,
}

impl ErrorBody {
    /// Body for `err` under the given mode
    pub fn render(err: &ApiError, mode: Mode) -> (StatusCode, Self) {
        match mode {
            Mode::Development => (
                err.status_code(),
                Self {
                    status: err.status_label(),
                    message: err.to_string(),
                    error: Some(format!("{err:?}")),
                    detail: Some(err.source_chain()),
                },
            ),
            Mode::Production if err.is_operational() => (
                err.status_code(),
                Self {
                    status: err.status_label(),
                    message: err.to_string(),
                    error: None,
                    detail: None,
                },
            ),
            Mode::Production => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Self {
                    status: "error",
                    message: GENERIC_MESSAGE.to_string(),
                    error: None,
                    detail: None,
                },
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = ErrorBody::render(&self, Mode::Production);
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Re-render every error response for the configured mode
pub async fn translate_errors(State(mode): State<Mode>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;

    let Some(err) = response.extensions().get::<ApiError>().cloned() else {
        return response;
    };

    if err.is_operational() {
        tracing::warn!(%method, %uri, status = err.status_code().as_u16(), error = %err, "request failed");
    } else {
        tracing::error!(%method, %uri, error = ?err, "unhandled error");
    }

    let (status, body) = ErrorBody::render(&err, mode);
    let mut translated = (status, Json(body)).into_response();
    for (name, value) in response.headers() {
        if name != axum::http::header::CONTENT_TYPE && name != axum::http::header::CONTENT_LENGTH {
            translated.headers_mut().append(name.clone(), value.clone());
        }
    }
    translated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Validation(vec![]).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::no_document().status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Internal("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(AuthError::Forbidden).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_store_errors_are_rewritten() {
        let cast = ApiError::from(StoreError::invalid_id("wwwww"));
        assert_eq!(cast.to_string(), "Invalid _id: wwwww");
        assert!(cast.is_operational());

        let dup = ApiError::from(StoreError::DuplicateKey {
            collection: "tours".into(),
            index: "name_1".into(),
            value: "\"The Forest Hiker\"".into(),
        });
        assert_eq!(
            dup.to_string(),
            "Duplicate field value: \"The Forest Hiker\". Please use another value!"
        );

        let invalid = ApiError::from(StoreError::Validation(vec![
            "A tour must have a name".into(),
            "A tour must have a price".into(),
        ]));
        assert_eq!(
            invalid.to_string(),
            "Invalid input data. A tour must have a name. A tour must have a price"
        );

        let backend = ApiError::from(StoreError::Backend("disk full".into()));
        assert!(!backend.is_operational());
    }

    #[test]
    fn test_production_hides_unclassified_detail() {
        let err = ApiError::from(StoreError::Backend("disk full".into()));
        let (status, body) = ErrorBody::render(&err, Mode::Production);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.status, "error");
        assert_eq!(body.message, GENERIC_MESSAGE);
        assert!(body.error.is_none());
    }

    #[test]
    fn test_production_shows_operational_message() {
        let (status, body) = ErrorBody::render(&ApiError::no_document(), Mode::Production);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.status, "fail");
        assert_eq!(body.message, "No document found with that ID");
    }

    #[test]
    fn test_development_shows_detail() {
        let err = ApiError::from(StoreError::Backend("disk full".into()));
        let (status, body) = ErrorBody::render(&err, Mode::Development);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.error.unwrap().contains("Backend"));
        assert_eq!(body.detail, Some(vec!["storage backend error: disk full".to_string()]));
    }

    #[test]
    fn test_status_label() {
        assert_eq!(ApiError::BadRequest("x".into()).status_label(), "fail");
        assert_eq!(ApiError::Email(EmailError("down".into())).status_label(), "error");
    }
}
