//! The game record owned by the orchestrator.

use std::fmt;
use std::str::FromStr;

use lazy_regex::regex_is_match;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::GameConfig;
use crate::domain::board::Board;
use crate::domain::participant::{KeyRef, ParticipantId, Roster};
use crate::domain::phase::TurnPosition;
use crate::domain::transition::WinVerdict;
use crate::errors::DomainError;

/// Game identifier; also the game's directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GameId(String);

impl GameId {
    pub fn new(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        if !regex_is_match!(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$", &raw) {
            return Err(DomainError::config(format!(
                "game id must be 1-64 characters of [A-Za-z0-9_-]: {raw:?}"
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for GameId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GameId> for String {
    fn from(id: GameId) -> Self {
        id.0
    }
}

impl FromStr for GameId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the adjudicator returns for one resolved phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub board: Board,
    /// Participants the adjudicator reports as eliminated.
    #[serde(default)]
    pub eliminated: Vec<ParticipantId>,
    /// No further legal progress is possible.
    #[serde(default)]
    pub stalemate: bool,
    /// Per-order results, for the record only.
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub position: TurnPosition,
    pub roster: Roster,
    pub board: Board,
    pub config: GameConfig,
    /// Key participants encrypt order submissions to.
    pub authority_key: KeyRef,
    /// Last stalemate signal from the adjudicator.
    #[serde(default)]
    pub stalemate: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Game {
    pub fn new(
        id: GameId,
        roster: Roster,
        board: Board,
        config: GameConfig,
        authority_key: KeyRef,
        position: TurnPosition,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            position,
            roster,
            board,
            config,
            authority_key,
            stalemate: false,
            created_at,
            updated_at: created_at,
        }
    }

    /// Live participants that `resolution` eliminates: those the adjudicator
    /// names, plus those it reports at zero controlled resources.
    pub fn eliminations_for(&self, resolution: &Resolution) -> Vec<ParticipantId> {
        self.roster
            .live_ids()
            .into_iter()
            .filter(|id| {
                resolution.eliminated.contains(id)
                    || resolution.board.resource_counts.get(id) == Some(&0)
            })
            .collect()
    }

    /// Replace the board with the adjudicated one and apply eliminations.
    /// Returns the newly eliminated participants.
    pub fn apply_resolution(&mut self, resolution: &Resolution, at: OffsetDateTime) -> Vec<ParticipantId> {
        let eliminated = self.eliminations_for(resolution);
        for id in &eliminated {
            self.roster.eliminate(id);
        }
        self.board = resolution.board.clone();
        self.stalemate = resolution.stalemate;
        self.updated_at = at;
        eliminated
    }

    /// Highest live count at or above the threshold wins; ties go to the
    /// earlier participant in roster order. Otherwise the adjudicator's
    /// stalemate signal decides.
    pub fn win_verdict(&self) -> WinVerdict {
        let threshold = self.config.win_threshold;
        let mut best: Option<(&ParticipantId, u32)> = None;
        for participant in self.roster.iter().filter(|p| p.is_alive()) {
            let count = self.board.resource_count(&participant.id);
            if count < threshold {
                continue;
            }
            match best {
                Some((_, c)) if count <= c => {}
                _ => best = Some((&participant.id, count)),
            }
        }
        match best {
            Some((id, _)) => WinVerdict::Winner {
                participant: id.clone(),
            },
            None if self.stalemate => WinVerdict::Stalemate,
            None => WinVerdict::Continue,
        }
    }
}
