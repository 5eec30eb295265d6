use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error;
use std::fmt;

use crate::document::DocumentError;
use crate::editor::{EditorError, View};
use crate::images::ImageError;
use crate::locking::LockError;
use crate::paginator::PaginationError;
use crate::process::ProcessError;
use crate::ruleset::RulesetError;

/// The primary error type for the application.
///
/// This enum consolidates all possible errors that can occur within the application,
/// providing a unified way to handle and respond to failures.
#[derive(Debug)]
pub enum AppError {
    /// For internal server errors that are not expected to be handled by the client.
    Internal(anyhow::Error),
    /// For client errors due to invalid requests.
    BadRequest(String),
    /// For when a requested resource is not found.
    NotFound(String),
    /// For when a request conflicts with the current state of the server.
    Conflict(String),
    /// For when a service is temporarily unavailable.
    ServiceUnavailable(String),
    /// For errors related to database operations.
    Database(String),
    /// For when user input is invalid.
    InvalidInput(String),
    /// For when a specific field in a request fails validation.
    ValidationError {
        /// The name of the field that failed validation.
        field: String,
        /// A message describing the validation error.
        message: String,
    },
    /// For errors related to I/O operations.
    IoError(String),
    /// The process is being edited by somebody else.
    Locked {
        /// The user holding the live lock.
        holder: String,
    },
    /// The editing session lost its lock; only a reload is possible.
    LockExpired,
    /// A metadata read is already running for this session.
    LoadInProgress,
    /// The ruleset does not permit the requested structure or metadata type.
    NotAllowed(String),
    /// The metadata file could not be loaded; no session was established.
    LoadFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::ValidationError { field, message } => {
                write!(f, "Validation error on field '{}': {}", field, message)
            }
            AppError::IoError(msg) => write!(f, "I/O error: {}", msg),
            AppError::Locked { holder } => write!(f, "Locked by {}", holder),
            AppError::LockExpired => write!(f, "Lock expired"),
            AppError::LoadInProgress => write!(f, "Load already in progress"),
            AppError::NotAllowed(msg) => write!(f, "Not allowed: {}", msg),
            AppError::LoadFailed(msg) => write!(f, "Load failed: {}", msg),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message, details) = match self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                let error_id = uuid::Uuid::new_v4();
                tracing::error!("Error ID: {}", error_id);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    Some(json!({ "error_id": error_id.to_string() })),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg, None),
            AppError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg, None)
            }
            AppError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    Some(json!({ "details": msg })),
                )
            }
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg, None),
            AppError::ValidationError { field, message } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format!("Validation failed for field '{}'", field),
                Some(json!({ "field": field, "message": message })),
            ),
            AppError::IoError(msg) => {
                tracing::error!("I/O error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "IO_ERROR",
                    "An I/O error occurred".to_string(),
                    Some(json!({ "details": msg })),
                )
            }
            AppError::Locked { holder } => (
                StatusCode::LOCKED,
                "LOCKED",
                format!("Process is being edited by {}", holder),
                Some(json!({ "holder": holder })),
            ),
            AppError::LockExpired => (
                StatusCode::CONFLICT,
                "LOCK_EXPIRED",
                "The lock on this process has expired".to_string(),
                Some(json!({ "view": View::LockExpired.as_str() })),
            ),
            AppError::LoadInProgress => (
                StatusCode::CONFLICT,
                "LOAD_IN_PROGRESS",
                "The metadata is already being read".to_string(),
                None,
            ),
            AppError::NotAllowed(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "NOT_ALLOWED", msg, None),
            AppError::LoadFailed(msg) => {
                tracing::warn!("Load failed: {}", msg);
                (StatusCode::UNPROCESSABLE_ENTITY, "LOAD_FAILED", msg, None)
            }
        };

        let mut body = json!({
            "error": {
                "code": error_code,
                "message": error_message,
            },
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if let Some(details) = details {
            body["error"]["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                if message.to_lowercase().contains("unique") {
                    AppError::Conflict(format!("Duplicate entry: {}", message))
                } else {
                    AppError::Database(format!("Database error: {}", message))
                }
            }
            sqlx::Error::PoolTimedOut => {
                AppError::ServiceUnavailable("Database connection pool timed out".to_string())
            }
            _ => AppError::Database(format!("Database error: {}", err)),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(format!("{}: {}", err.kind(), err))
    }
}

impl From<PaginationError> for AppError {
    fn from(err: PaginationError) -> Self {
        let field = match err {
            PaginationError::EmptySelection | PaginationError::SelectionOutOfRange { .. } => "pages",
            PaginationError::InvalidArabic(_) | PaginationError::InvalidRoman(_) => "start_value",
        };
        AppError::ValidationError { field: field.to_string(), message: err.to_string() }
    }
}

impl From<LockError> for AppError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::HeldByOther { holder, .. } => AppError::Locked { holder },
        }
    }
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::UnknownNode(id) => AppError::NotFound(format!("structure element {}", id)),
            DocumentError::RootImmutable | DocumentError::Cycle(_) => AppError::NotAllowed(err.to_string()),
            DocumentError::Malformed(_) => AppError::LoadFailed(err.to_string()),
            DocumentError::DuplicateNode(_) | DocumentError::AlreadyAttached(_) => {
                AppError::Internal(anyhow::Error::new(err))
            }
        }
    }
}

impl From<RulesetError> for AppError {
    fn from(err: RulesetError) -> Self {
        match err {
            RulesetError::InvalidName(name) => AppError::ValidationError {
                field: "ruleset".to_string(),
                message: format!("invalid ruleset name '{}'", name),
            },
            other => AppError::LoadFailed(other.to_string()),
        }
    }
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::MissingFolder(_) => AppError::NotFound(err.to_string()),
            ImageError::InvalidPattern(msg) => AppError::InvalidInput(msg),
            ImageError::Document(e) => e.into(),
            ImageError::Io { .. } => AppError::IoError(err.to_string()),
            ImageError::ContentServer(_) | ImageError::Scale(_) => AppError::ServiceUnavailable(err.to_string()),
            ImageError::MissingLogicalRoot => AppError::LoadFailed(err.to_string()),
        }
    }
}

impl From<ProcessError> for AppError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::MissingMetadata(_) => AppError::NotFound(err.to_string()),
            ProcessError::Io { .. } => AppError::IoError(err.to_string()),
            ProcessError::Document(e) => e.into(),
        }
    }
}

impl From<EditorError> for AppError {
    fn from(err: EditorError) -> Self {
        match err {
            EditorError::NotLoaded => AppError::Conflict("No document loaded in this session".to_string()),
            EditorError::LockExpired => AppError::LockExpired,
            EditorError::LoadInProgress => AppError::LoadInProgress,
            EditorError::Locked { holder } => AppError::Locked { holder },
            EditorError::NotAllowed(msg) => AppError::NotAllowed(msg),
            EditorError::Validation { field, message } => AppError::ValidationError { field, message },
            EditorError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            EditorError::LoadFailed(msg) => AppError::LoadFailed(msg),
            EditorError::Pagination(e) => e.into(),
            EditorError::Document(e) => e.into(),
            EditorError::Image(e) => e.into(),
            EditorError::Process(e) => e.into(),
            EditorError::Io { .. } => AppError::IoError(err.to_string()),
        }
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

/// An extension trait for `Option` that provides a convenient way to convert
/// an `Option` to a `Result` with a `NotFound` error.
pub trait OptionExt<T> {
    /// Converts an `Option<T>` to a `Result<T, AppError>`.
    ///
    /// # Arguments
    ///
    /// * `entity` - A string describing the entity that was not found.
    fn ok_or_not_found(self, entity: &str) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(format!("{} not found", entity)))
    }
}

/// A module containing helper functions for request validation.
pub mod validation {
    use super::*;

    fn invalid(field: &str, message: impl Into<String>) -> AppError {
        AppError::ValidationError { field: field.to_string(), message: message.into() }
    }

    fn validate_segment(value: &str, field: &str, max_len: usize) -> AppResult<()> {
        if value.trim().is_empty() {
            return Err(invalid(field, format!("{} cannot be empty", field)));
        }
        if value.len() > max_len {
            return Err(invalid(field, format!("{} is longer than {} characters", field, max_len)));
        }
        if value.contains('\0') {
            return Err(invalid(field, format!("{} contains null characters", field)));
        }
        if value.contains(['/', '\\']) || value == "." || value == ".." {
            return Err(invalid(field, format!("{} must be a plain name", field)));
        }
        Ok(())
    }

    /// Validates the name of an uploaded or downloaded file.
    pub fn validate_file_name(name: &str) -> AppResult<()> {
        validate_segment(name, "name", 255)?;
        if name.starts_with('.') {
            return Err(invalid("name", "hidden files are not accepted"));
        }
        Ok(())
    }

    /// Validates the name of an image folder below `images/`.
    pub fn validate_folder_name(name: &str) -> AppResult<()> {
        validate_segment(name, "folder", 255)
    }

    /// Validates a process title. Titles become folder names.
    pub fn validate_title(title: &str) -> AppResult<()> {
        validate_segment(title, "title", 200)?;
        if !title.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.')) {
            return Err(invalid("title", "title may only contain letters, digits, '_', '-' and '.'"));
        }
        Ok(())
    }

    /// Validates that a number is positive.
    pub fn validate_positive_number(value: Option<i64>, field: &str) -> AppResult<()> {
        if let Some(v) = value {
            if v <= 0 {
                return Err(invalid(field, format!("Value must be positive, got {}", v)));
            }
        }
        Ok(())
    }
}
