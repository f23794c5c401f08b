//! Error codes recorded in the event log and printed to operators.
//!
//! Add new codes here; never pass ad-hoc strings as error codes.
//!
//! All codes are SCREAMING_SNAKE_CASE and map 1:1 to the strings that appear
//! in `log.jsonl`.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Centralized error codes.
///
/// Each variant serializes to its canonical SCREAMING_SNAKE_CASE string so the
/// log stays greppable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Storage
    /// Mailbox or log medium unavailable
    StorageFault,
    /// Event log cannot be replayed
    CorruptLog,
    /// Another orchestrator holds the game lock
    GameLocked,

    // Addressing
    /// Recipient is not a live participant
    InvalidAddress,
    /// Message addressed to a phase or round other than the current one
    StaleAddress,

    // Dispatch
    /// Participant work exceeded the deadline
    DispatchTimeout,
    /// Participant work failed or produced nothing usable
    DispatchFailure,

    // Adjudication
    /// Adjudicator unavailable or returned garbage
    AdjudicationFault,
    /// Order submission failed decryption, parsing or validation
    MalformedSubmission,

    // State machine
    /// Transition not legal from the current position
    PhaseMismatch,

    // Setup
    /// Invalid configuration
    ConfigError,
    /// Anything else
    Internal,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StorageFault => "STORAGE_FAULT",
            Self::CorruptLog => "CORRUPT_LOG",
            Self::GameLocked => "GAME_LOCKED",

            Self::InvalidAddress => "INVALID_ADDRESS",
            Self::StaleAddress => "STALE_ADDRESS",

            Self::DispatchTimeout => "DISPATCH_TIMEOUT",
            Self::DispatchFailure => "DISPATCH_FAILURE",

            Self::AdjudicationFault => "ADJUDICATION_FAULT",
            Self::MalformedSubmission => "MALFORMED_SUBMISSION",

            Self::PhaseMismatch => "PHASE_MISMATCH",

            Self::ConfigError => "CONFIG_ERROR",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
