//! Component-level error type.
//!
//! Mailbox, router, dispatch and turn machine all return `DomainError`.
//! The orchestrator and binary work in `crate::error::AppError`, which
//! converts from this type.

use thiserror::Error;

use super::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Backing medium for the mailbox or log is unavailable.
    #[error("storage fault: {0}")]
    StorageFault(String),
    /// Recipient is unknown, eliminated, or not allowed for this message.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// Message declared a phase or round other than the current one.
    #[error("stale address: {0}")]
    StaleAddress(String),
    #[error("dispatch timeout: {0}")]
    DispatchTimeout(String),
    #[error("dispatch failure: {0}")]
    DispatchFailure(String),
    #[error("adjudication fault: {0}")]
    AdjudicationFault(String),
    #[error("malformed submission: {0}")]
    MalformedSubmission(String),
    /// Event not accepted in the current turn position.
    #[error("phase mismatch: {0}")]
    PhaseMismatch(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl DomainError {
    pub fn storage(detail: impl Into<String>) -> Self {
        Self::StorageFault(detail.into())
    }

    pub fn invalid_address(detail: impl Into<String>) -> Self {
        Self::InvalidAddress(detail.into())
    }

    pub fn stale_address(detail: impl Into<String>) -> Self {
        Self::StaleAddress(detail.into())
    }

    pub fn phase_mismatch(detail: impl Into<String>) -> Self {
        Self::PhaseMismatch(detail.into())
    }

    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config(detail.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            DomainError::StorageFault(_) => ErrorCode::StorageFault,
            DomainError::InvalidAddress(_) => ErrorCode::InvalidAddress,
            DomainError::StaleAddress(_) => ErrorCode::StaleAddress,
            DomainError::DispatchTimeout(_) => ErrorCode::DispatchTimeout,
            DomainError::DispatchFailure(_) => ErrorCode::DispatchFailure,
            DomainError::AdjudicationFault(_) => ErrorCode::AdjudicationFault,
            DomainError::MalformedSubmission(_) => ErrorCode::MalformedSubmission,
            DomainError::PhaseMismatch(_) => ErrorCode::PhaseMismatch,
            DomainError::Config(_) => ErrorCode::ConfigError,
        }
    }

    /// Fatal errors halt turn progression; the rest are absorbed and logged.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DomainError::StorageFault(_)
                | DomainError::AdjudicationFault(_)
                | DomainError::PhaseMismatch(_)
                | DomainError::Config(_)
        )
    }

    pub fn detail(&self) -> &str {
        match self {
            DomainError::StorageFault(d)
            | DomainError::InvalidAddress(d)
            | DomainError::StaleAddress(d)
            | DomainError::DispatchTimeout(d)
            | DomainError::DispatchFailure(d)
            | DomainError::AdjudicationFault(d)
            | DomainError::MalformedSubmission(d)
            | DomainError::PhaseMismatch(d)
            | DomainError::Config(d) => d,
        }
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::StorageFault(err.to_string())
    }
}
