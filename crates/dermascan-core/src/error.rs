//! Error types module
//!
//! All fatal pipeline errors are unified under `AppError`. Each variant
//! self-describes its category, stable code and retryability through
//! `ErrorMetadata`, so a presentation layer can offer "retry" only where it
//! makes sense.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected failures such as validation
    Debug,
    /// Recoverable issues
    Warn,
    /// Unexpected failures
    Error,
}

/// Failure taxonomy of the capture pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input or a broken invariant. Never retried.
    Validation,
    /// Diagnosis network/service failure that survived the retry ceiling.
    TransientService,
    /// A collaborator answered with an explicit error.
    Service,
    /// Transfer of an original asset failed.
    Storage,
    /// Decode/resize failure of a single asset.
    AssetTransform,
    Internal,
}

/// Metadata for error presentation
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "EMPTY_INPUT")
    fn error_code(&self) -> &'static str;

    fn category(&self) -> ErrorCategory;

    /// Whether the caller may offer a retry
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// User-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("at least one image required")]
    EmptyInput,

    #[error("uploaded asset count {uploaded} does not match angle label count {labels}")]
    CountMismatch { uploaded: usize, labels: usize },

    #[error("missing credential: no authenticated session")]
    MissingCredential,

    #[error("diagnosis returned no result identifier")]
    MissingResultId,

    #[error("a diagnosis flow is already in progress")]
    Busy,

    #[error("Image decode error: {0}")]
    Decode(String),

    #[error("Capture rejected by quality gate: {0}")]
    QualityGate(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Diagnosis service unavailable after {attempts} attempt(s): {message}")]
    TransientService { attempts: u32, message: String },

    #[error("Diagnosis service error: {0}")]
    ServiceRejected(String),

    #[error("Record persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Result type used across the pipeline
pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, category, recoverable, suggested_action, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    &'static str,
    ErrorCategory,
    bool,
    Option<&'static str>,
    LogLevel,
) {
    use ErrorCategory::*;

    match err {
        AppError::EmptyInput => (
            "EMPTY_INPUT",
            Validation,
            false,
            Some("Capture at least one photo"),
            LogLevel::Debug,
        ),
        AppError::CountMismatch { .. } => (
            "COUNT_MISMATCH",
            Validation,
            false,
            None,
            LogLevel::Error,
        ),
        AppError::MissingCredential => (
            "MISSING_CREDENTIAL",
            Validation,
            false,
            Some("Sign in again"),
            LogLevel::Debug,
        ),
        AppError::MissingResultId => (
            "MISSING_RESULT_ID",
            Validation,
            false,
            None,
            LogLevel::Error,
        ),
        AppError::Busy => (
            "FLOW_BUSY",
            Validation,
            false,
            Some("Wait for the running diagnosis to finish"),
            LogLevel::Debug,
        ),
        AppError::Decode(_) => (
            "IMAGE_DECODE_ERROR",
            AssetTransform,
            false,
            Some("Check image format and try a different file"),
            LogLevel::Warn,
        ),
        AppError::QualityGate(_) => (
            "QUALITY_GATE_REJECTED",
            AssetTransform,
            false,
            Some("Retake the photo following the recommendations"),
            LogLevel::Debug,
        ),
        AppError::Storage(_) => (
            "STORAGE_ERROR",
            Storage,
            true,
            Some("Check your connection and retry"),
            LogLevel::Error,
        ),
        AppError::TransientService { .. } => (
            "DIAGNOSIS_UNAVAILABLE",
            TransientService,
            true,
            Some("Retry after a short delay"),
            LogLevel::Warn,
        ),
        AppError::ServiceRejected(_) => (
            "DIAGNOSIS_REJECTED",
            Service,
            false,
            None,
            LogLevel::Error,
        ),
        AppError::Persistence(_) => (
            "PERSISTENCE_ERROR",
            Service,
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            "INTERNAL_ERROR",
            Internal,
            false,
            Some("Contact support if this error persists"),
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Detailed message including the source chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn category(&self) -> ErrorCategory {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Storage(_) => "Failed to upload photos".to_string(),
            AppError::TransientService { .. } => {
                "The diagnosis service is temporarily unavailable".to_string()
            }
            AppError::ServiceRejected(ref msg) => msg.clone(),
            AppError::Persistence(_) => "Failed to save the diagnosis".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal error".to_string()
            }
            AppError::CountMismatch { .. } | AppError::MissingResultId => {
                "The diagnosis could not be completed".to_string()
            }
            other => other.to_string(),
        }
    }
}
