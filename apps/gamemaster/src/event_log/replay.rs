//! Rebuild game state from the log.

use tracing::debug;

use super::{EventBody, LogEvent};
use crate::domain::{Game, Phase, Resolution, TurnMachine, TurnPosition};
use crate::error::AppError;

/// State reconstructed from a log.
#[derive(Debug, Clone)]
pub struct Replayed {
    pub game: Game,
    /// Every position the game has entered, in order. Empty when the log
    /// stops right after `game_created`: the game then sits at its opening
    /// position and the opening phase start still has to be logged.
    pub positions: Vec<TurnPosition>,
    /// Result already logged for the current phase, if any. Resuming uses it
    /// instead of calling the adjudicator again.
    pub pending: Option<Resolution>,
    pub last_seq: u64,
}

/// Replay `events` from an empty state.
///
/// Every phase start is checked against the turn machine, so a log that
/// could not have been produced by a live run is rejected.
pub fn replay(events: &[LogEvent]) -> Result<Replayed, AppError> {
    let mut iter = events.iter();
    let first = iter
        .next()
        .ok_or_else(|| AppError::corrupt_log("log is empty"))?;
    let EventBody::GameCreated {
        game_id,
        roster,
        board,
        config,
        authority_key,
    } = &first.body
    else {
        return Err(AppError::corrupt_log(format!(
            "seq {}: first event is {}, expected game_created",
            first.seq,
            first.kind()
        )));
    };

    let machine = TurnMachine::new(config.negotiation_rounds);
    let mut game = Game::new(
        game_id.clone(),
        roster.clone(),
        board.clone(),
        config.clone(),
        authority_key.clone(),
        machine.initial(config.starting_year),
        first.ts,
    );
    let mut positions: Vec<TurnPosition> = Vec::new();
    let mut pending = None;
    let mut last_seq = first.seq;

    for event in iter {
        last_seq = event.seq;
        match &event.body {
            EventBody::GameCreated { .. } => {
                return Err(AppError::corrupt_log(format!(
                    "seq {}: second game_created",
                    event.seq
                )));
            }
            EventBody::PhaseStart { from, to } => {
                match positions.last() {
                    None => {
                        if from.is_some() || *to != game.position {
                            return Err(AppError::corrupt_log(format!(
                                "seq {}: game does not open at {}",
                                event.seq, game.position
                            )));
                        }
                    }
                    Some(current) => {
                        if from.as_ref() != Some(current) || !machine.is_legal(current, to) {
                            return Err(AppError::corrupt_log(format!(
                                "seq {}: illegal transition {current} -> {to}",
                                event.seq
                            )));
                        }
                    }
                }
                game.position = to.clone();
                game.updated_at = event.ts;
                positions.push(to.clone());
                pending = None;
            }
            EventBody::AdjudicationResult { resolution, .. } => {
                let resolving = matches!(
                    game.position.phase,
                    Phase::Adjudication | Phase::Retreat | Phase::Adjustment
                );
                if positions.is_empty() || !resolving {
                    return Err(AppError::corrupt_log(format!(
                        "seq {}: adjudication result outside a resolving phase ({})",
                        event.seq, game.position
                    )));
                }
                game.apply_resolution(resolution, event.ts);
                pending = Some(resolution.clone());
            }
            EventBody::DispatchResult { .. }
            | EventBody::MessageRouted { .. }
            | EventBody::OrderSubmission { .. }
            | EventBody::Error { .. } => {}
        }
    }

    if positions.is_empty() && events.len() > 1 {
        return Err(AppError::corrupt_log(format!(
            "seq {last_seq}: events logged before the opening phase start"
        )));
    }

    debug!(
        game_id = %game.id,
        position = %game.position,
        events = events.len(),
        "Replayed event log"
    );
    Ok(Replayed {
        game,
        positions,
        pending,
        last_seq,
    })
}
