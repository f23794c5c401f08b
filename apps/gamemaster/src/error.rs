use thiserror::Error;

use crate::errors::{DomainError, ErrorCode};

/// Top-level error for the orchestrator and the operator binary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("I/O error: {detail}")]
    Io {
        detail: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {detail}")]
    Serde {
        detail: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Configuration error: {detail}")]
    Config { detail: String },
    #[error("Game locked: {detail}")]
    Locked { detail: String },
    #[error("Corrupt event log: {detail}")]
    CorruptLog { detail: String },
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Domain(err) => err.code(),
            AppError::Io { .. } => ErrorCode::StorageFault,
            AppError::Serde { .. } => ErrorCode::Internal,
            AppError::Config { .. } => ErrorCode::ConfigError,
            AppError::Locked { .. } => ErrorCode::GameLocked,
            AppError::CorruptLog { .. } => ErrorCode::CorruptLog,
        }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }

    pub fn corrupt_log(detail: impl Into<String>) -> Self {
        Self::CorruptLog {
            detail: detail.into(),
        }
    }

    /// The component error behind this one, if any.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            AppError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io {
            detail: err.to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serde {
            detail: err.to_string(),
            source: err,
        }
    }
}
