//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps identity, gate and validation failures to HTTP status codes and a
//! JSON body carrying a machine-readable code and a client-safe message.
//! Internal error details are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use edu_core::{AccessDenied, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::identity::IdentityError;

/// Message returned for every role-gate rejection.
pub const NOT_AUTHORIZED: &str = "Not authorized to perform this action";

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "FORBIDDEN").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
///
/// The `Display` of every client-facing variant is exactly the message sent
/// to the client.
#[derive(Error, Debug)]
pub enum AppError {
    /// No usable identity: missing, invalid or expired token (401).
    #[error("{0}")]
    Unauthenticated(String),

    /// Login or password-change credentials did not verify (401).
    #[error("{0}")]
    InvalidCredentials(String),

    /// Authenticated but not permitted (403).
    #[error("{0}")]
    Forbidden(String),

    /// Registration for an email that already has a credential (400).
    #[error("User already exists")]
    DuplicateEmail,

    /// Compound uniqueness key violated (400).
    #[error("{0}")]
    AlreadyExists(String),

    /// Registration named an unknown role (400).
    #[error("Invalid role")]
    InvalidRole,

    /// Request failed field validation (400).
    #[error("{0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("{0}")]
    BadRequest(String),

    /// Resource not found (404).
    #[error("{0}")]
    NotFound(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            Self::InvalidCredentials(_) => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::DuplicateEmail => (StatusCode::BAD_REQUEST, "DUPLICATE_EMAIL"),
            Self::AlreadyExists(_) => (StatusCode::BAD_REQUEST, "ALREADY_EXISTS"),
            Self::InvalidRole => (StatusCode::BAD_REQUEST, "INVALID_ROLE"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Ownership rejection naming the refused action, e.g.
    /// `"Not authorized to delete this assignment"`.
    pub fn not_owner(action: &str) -> Self {
        Self::Forbidden(format!("Not authorized to {action}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Role rejections share one message; ownership rejections that reach here
/// without a named action get a generic one.
impl From<AccessDenied> for AppError {
    fn from(err: AccessDenied) -> Self {
        match err {
            AccessDenied::Role { .. } => Self::Forbidden(NOT_AUTHORIZED.to_string()),
            AccessDenied::NotOwner => Self::not_owner("modify this resource"),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::MissingToken => {
                Self::Unauthenticated("Not authorized to access this route".into())
            }
            IdentityError::Token(_) | IdentityError::UnknownUser(_) | IdentityError::Inactive(_) => {
                Self::Unauthenticated("Invalid or expired token".into())
            }
            IdentityError::InvalidCredentials => Self::InvalidCredentials("Invalid credentials".into()),
            IdentityError::WrongCurrentPassword => {
                Self::InvalidCredentials("Current password is incorrect".into())
            }
            IdentityError::DuplicateEmail => Self::DuplicateEmail,
            IdentityError::InvalidRole => Self::InvalidRole,
            IdentityError::Validation(e) => Self::Validation(e.to_string()),
            IdentityError::Crypto(e) => Self::Internal(e.to_string()),
            IdentityError::Database(e) => Self::Internal(e.to_string()),
        }
    }
}
