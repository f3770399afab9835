//! Error types for the airsync CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Retryability flags for scripted consumers
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::airtable::AirtableError;
use crate::store::StoreError;

/// Result type alias for airsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    DatabaseError,

    // Not Found (exit 3)
    MappingNotFound,

    // Validation (exit 4)
    ValidationFailed,
    InvalidArgument,

    // Sync (exit 6)
    TransportError,
    ApiError,
    SyncError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::MappingNotFound => "MAPPING_NOT_FOUND",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::ApiError => "API_ERROR",
            Self::SyncError => "SYNC_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::DatabaseError => 2,
            Self::MappingNotFound => 3,
            Self::ValidationFailed | Self::InvalidArgument => 4,
            Self::TransportError | Self::ApiError | Self::SyncError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether a caller should retry, either as-is (transient) or with
    /// corrected input (validation).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ValidationFailed
                | Self::InvalidArgument
                | Self::TransportError
                | Self::DatabaseError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in airsync CLI operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Config file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Airtable credentials are not configured")]
    MissingCredentials,

    #[error("No table mapping for table id: {table_id}")]
    MappingNotFound { table_id: String },

    #[error("No table mappings configured")]
    NoMappings,

    #[error("Mapping validation failed with {} error(s)", errors.len())]
    Validation { errors: Vec<String> },

    #[error("Airtable error: {0}")]
    Airtable(#[from] AirtableError),

    #[error("Content store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ConfigNotFound { .. }
            | Self::Config(_)
            | Self::MissingCredentials
            | Self::NoMappings => ErrorCode::ConfigError,
            Self::MappingNotFound { .. } => ErrorCode::MappingNotFound,
            Self::Validation { .. } => ErrorCode::ValidationFailed,
            Self::Airtable(e) => match e {
                AirtableError::Transport(_) => ErrorCode::TransportError,
                AirtableError::Api { .. } => ErrorCode::ApiError,
                AirtableError::InvalidAttachment | AirtableError::Download(_) => {
                    ErrorCode::SyncError
                }
            },
            Self::Store(e) => match e {
                StoreError::Database(_) | StoreError::ItemNotFound(_) => {
                    ErrorCode::DatabaseError
                }
                StoreError::Write(_) | StoreError::Import(_) => ErrorCode::SyncError,
                StoreError::Json(_) => ErrorCode::JsonError,
            },
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint for operators and scripts.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::ConfigNotFound { path } => Some(format!(
                "Create {} or point --config (or AIRSYNC_CONFIG) at an existing config file.",
                path.display()
            )),

            Self::MissingCredentials => Some(
                "Set AIRTABLE_API_KEY and AIRTABLE_BASE_ID, or add a `credentials` \
                 section to the config file."
                    .to_string(),
            ),

            Self::MappingNotFound { .. } => Some(
                "Use `airsync list` to see the configured table mappings.".to_string(),
            ),

            Self::NoMappings => {
                Some("Add a `tables` array to the config file.".to_string())
            }

            Self::Validation { errors } => {
                let mut hint = String::from("Fix the mapping configuration:\n");
                for err in errors {
                    hint.push_str(&format!("    - {err}\n"));
                }
                hint.push_str(
                    "  Register content types with `airsync init`, then re-check with \
                     `airsync validate`.",
                );
                Some(hint)
            }

            Self::Airtable(AirtableError::Transport(_)) => Some(
                "Check network connectivity and re-run; the sync pass is idempotent."
                    .to_string(),
            ),

            Self::Airtable(_)
            | Self::Store(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
