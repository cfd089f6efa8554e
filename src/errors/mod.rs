//! Error types for the roster.
//!
//! `SyncError` is what the remote sync client reports, `RosterError` what the
//! state machine reports, and `AppError` what the stub sheet server maps onto
//! HTTP responses.

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::EmployeeId;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

// ==================== DRAFT VALIDATION ====================

/// The first required form field that is missing or malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    MissingName,
    InvalidEmail(String),
    MissingJobTitle,
    MissingDepartment,
}

impl fmt::Display for DraftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftError::MissingName => write!(f, "Name is required"),
            DraftError::InvalidEmail(email) if email.is_empty() => write!(f, "Email is required"),
            DraftError::InvalidEmail(email) => write!(f, "Invalid email address: {}", email),
            DraftError::MissingJobTitle => write!(f, "Job title is required"),
            DraftError::MissingDepartment => write!(f, "Department is required"),
        }
    }
}

impl std::error::Error for DraftError {}

// ==================== REMOTE SYNC ====================

/// Why a call to the remote sheet did not succeed.
///
/// Callers usually only branch on success or failure; the variants exist for
/// logging and for the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The request never reached the server or failed in transport
    Network(String),
    /// The server answered, but not with the JSON shape this backend expects
    MalformedResponse(String),
    /// Explicit failure flag or a non-2xx status
    RemoteRejected {
        status: Option<u16>,
        message: String,
    },
    /// Create was accepted but no identifier came back
    MissingIdentifier,
}

impl SyncError {
    pub(crate) fn rejected(status: reqwest::StatusCode, message: impl Into<String>) -> Self {
        SyncError::RemoteRejected {
            status: Some(status.as_u16()),
            message: message.into(),
        }
    }

    /// True when the remote store explicitly answered "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SyncError::RemoteRejected {
                status: Some(404),
                ..
            }
        )
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Network(e) => write!(f, "Network error: {}", e),
            SyncError::MalformedResponse(e) => write!(f, "Malformed response: {}", e),
            SyncError::RemoteRejected {
                status: Some(status),
                message,
            } => write!(f, "Remote store rejected the request ({}): {}", status, message),
            SyncError::RemoteRejected {
                status: None,
                message,
            } => write!(f, "Remote store rejected the request: {}", message),
            SyncError::MissingIdentifier => {
                write!(f, "Remote store accepted the record but returned no id")
            }
        }
    }
}

impl std::error::Error for SyncError {}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::MalformedResponse(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::MalformedResponse(err.to_string())
    }
}

// ==================== ROSTER STATE ====================

/// Errors from the list reconciliation state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    /// The action is not allowed on the current screen
    InvalidTransition {
        screen: &'static str,
        action: &'static str,
    },
    /// No roster entry carries this id
    UnknownEmployee(EmployeeId),
    /// The form is incomplete; nothing was sent
    InvalidDraft(DraftError),
    /// The remote store did not confirm the change; local state is unchanged
    Sync(SyncError),
}

impl fmt::Display for RosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterError::InvalidTransition { screen, action } => {
                write!(f, "Cannot {} while {}", action, screen)
            }
            RosterError::UnknownEmployee(id) => write!(f, "Employee {} not found", id),
            RosterError::InvalidDraft(e) => write!(f, "{}", e),
            RosterError::Sync(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RosterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterError::InvalidDraft(e) => Some(e),
            RosterError::Sync(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SyncError> for RosterError {
    fn from(err: SyncError) -> Self {
        RosterError::Sync(err)
    }
}

impl From<DraftError> for RosterError {
    fn from(err: DraftError) -> Self {
        RosterError::InvalidDraft(err)
    }
}

// ==================== CONFIGURATION ====================

/// An environment variable held a value that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid {} value {:?}: expected {}",
            self.key, self.value, self.expected
        )
    }
}

impl std::error::Error for ConfigError {}

// ==================== STUB SHEET SERVER ====================

/// Stub sheet server error type.
#[derive(Debug)]
pub enum AppError {
    /// Row not found
    NotFound(String),
    /// Validation error
    Validation(String),
    /// Database error
    Database(String),
    /// Internal server error
    Internal(String),
    /// Bad request
    BadRequest(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        match self {
            AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Database(msg)
            | AppError::Internal(msg)
            | AppError::BadRequest(msg) => msg,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message().to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorResponse::new(&self))).into_response()
    }
}
