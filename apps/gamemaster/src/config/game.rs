//! Per-game configuration.
//!
//! Stored in the `game-created` event so a resumed game runs with the
//! settings it was created with.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::errors::DomainError;

/// Which valid order submission wins when a participant submits more than
/// once in the same phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResubmissionPolicy {
    #[default]
    FirstWins,
    LastWins,
}

/// # Example JSON
///
/// ```json
/// {
///   "negotiation_rounds": 2,
///   "win_threshold": 18,
///   "resubmission": "last_wins"
/// }
/// ```
///
/// Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Negotiation rounds per turn (R). Zero skips negotiation.
    pub negotiation_rounds: u32,
    /// Controlled-resource count that wins the game.
    pub win_threshold: u32,
    pub dispatch_deadline_secs: u64,
    /// Extra time granted after the deadline before a unit is abandoned.
    pub dispatch_grace_ms: u64,
    pub resubmission: ResubmissionPolicy,
    pub starting_year: u16,
    pub adjudicator_timeout_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            negotiation_rounds: 3,
            win_threshold: 18,
            dispatch_deadline_secs: 600,
            dispatch_grace_ms: 2000,
            resubmission: ResubmissionPolicy::FirstWins,
            starting_year: 1901,
            adjudicator_timeout_secs: 30,
        }
    }
}

impl GameConfig {
    /// Parse from optional JSON. `None` gives the defaults.
    pub fn from_json(json: Option<&JsonValue>) -> Result<Self, DomainError> {
        let config = match json {
            Some(value) => serde_json::from_value::<GameConfig>(value.clone())
                .map_err(|e| DomainError::config(format!("invalid game config: {e}")))?,
            None => GameConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.win_threshold == 0 {
            return Err(DomainError::config("win_threshold must be at least 1"));
        }
        if self.dispatch_deadline_secs == 0 {
            return Err(DomainError::config("dispatch_deadline_secs must be at least 1"));
        }
        if self.adjudicator_timeout_secs == 0 {
            return Err(DomainError::config("adjudicator_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    pub fn dispatch_deadline(&self) -> Duration {
        Duration::from_secs(self.dispatch_deadline_secs)
    }

    pub fn dispatch_grace(&self) -> Duration {
        Duration::from_millis(self.dispatch_grace_ms)
    }

    pub fn adjudicator_timeout(&self) -> Duration {
        Duration::from_secs(self.adjudicator_timeout_secs)
    }
}
