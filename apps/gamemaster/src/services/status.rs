//! Operator status view, built from the log alone so it always shows the
//! last fully logged phase.

use std::fmt;

use serde::Serialize;

use crate::domain::{ParticipantId, Phase, Termination, TurnPosition};
use crate::error::AppError;
use crate::event_log::{replay, EventLog, LogEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantStatus {
    pub id: ParticipantId,
    pub alive: bool,
    pub resources: u32,
    pub units: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub game_id: String,
    pub position: TurnPosition,
    pub last_seq: u64,
    pub participants: Vec<ParticipantStatus>,
    pub outcome: Option<Termination>,
    /// The current phase's adjudication result is logged but the next phase
    /// has not started.
    pub result_pending: bool,
}

impl StatusView {
    pub fn from_events(events: &[LogEvent]) -> Result<Self, AppError> {
        let replayed = replay(events)?;
        let game = &replayed.game;
        let participants = game
            .roster
            .iter()
            .map(|p| ParticipantStatus {
                id: p.id.clone(),
                alive: p.is_alive(),
                resources: game.board.resource_count(&p.id),
                units: game.board.units_of(&p.id).len(),
            })
            .collect();
        let outcome = match &game.position.phase {
            Phase::Terminated { reason } => Some(reason.clone()),
            _ => None,
        };
        Ok(Self {
            game_id: game.id.to_string(),
            position: game.position.clone(),
            last_seq: replayed.last_seq,
            participants,
            outcome,
            result_pending: replayed.pending.is_some(),
        })
    }

    pub fn load(log: &dyn EventLog) -> Result<Self, AppError> {
        Self::from_events(&log.events()?)
    }
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "game {} at {} (seq {})", self.game_id, self.position, self.last_seq)?;
        if self.result_pending {
            writeln!(f, "  adjudication result logged, next phase not started")?;
        }
        for p in &self.participants {
            let state = if p.alive { "alive" } else { "eliminated" };
            writeln!(
                f,
                "  {:<10} {:>3} resources {:>3} units  {state}",
                p.id.as_str(),
                p.resources,
                p.units
            )?;
        }
        if let Some(outcome) = &self.outcome {
            writeln!(f, "  result: {outcome}")?;
        }
        Ok(())
    }
}
