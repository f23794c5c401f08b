//! Turn state machine.
//!
//! Transitions are a pure function of (position, event). The orchestrator
//! logs the resulting position before acting on it, and replay checks every
//! logged pair with [`TurnMachine::is_legal`].

use serde::{Deserialize, Serialize};

use crate::domain::participant::ParticipantId;
use crate::domain::phase::{Phase, Season, Termination, TurnPosition};
use crate::errors::DomainError;

/// Outcome of evaluating the win condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum WinVerdict {
    Continue,
    Winner { participant: ParticipantId },
    Stalemate,
}

/// What just finished in the current phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    RoundClosed,
    OrdersCollected,
    Adjudicated {
        dislodged: bool,
        adjustments_due: bool,
    },
    RetreatsResolved {
        adjustments_due: bool,
    },
    AdjustmentsResolved,
    WinChecked(WinVerdict),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnMachine {
    negotiation_rounds: u32,
}

impl TurnMachine {
    pub fn new(negotiation_rounds: u32) -> Self {
        Self { negotiation_rounds }
    }

    pub fn negotiation_rounds(&self) -> u32 {
        self.negotiation_rounds
    }

    /// First phase of any turn. With zero negotiation rounds a turn opens
    /// directly on order collection.
    pub fn opening_phase(&self) -> Phase {
        if self.negotiation_rounds == 0 {
            Phase::OrderCollection
        } else {
            Phase::Negotiation { round: 1 }
        }
    }

    pub fn initial(&self, year: u16) -> TurnPosition {
        TurnPosition::new(year, Season::Spring, self.opening_phase())
    }

    /// Opening position of the turn after `from`. Fall rolls the year.
    pub fn next_turn(&self, from: &TurnPosition) -> TurnPosition {
        match from.season {
            Season::Spring => TurnPosition::new(from.year, Season::Fall, self.opening_phase()),
            Season::Fall => TurnPosition::new(
                from.year.saturating_add(1),
                Season::Spring,
                self.opening_phase(),
            ),
        }
    }

    pub fn next(&self, from: &TurnPosition, event: &TurnEvent) -> Result<TurnPosition, DomainError> {
        let stay = |phase: Phase| -> Result<TurnPosition, DomainError> {
            Ok(TurnPosition::new(from.year, from.season, phase))
        };
        // Adjustment only happens in Fall.
        let after_resolution = |adjustments_due: bool| {
            if adjustments_due && from.season == Season::Fall {
                Phase::Adjustment
            } else {
                Phase::WinCheck
            }
        };

        match (&from.phase, event) {
            (Phase::Negotiation { round }, TurnEvent::RoundClosed) => {
                if *round < self.negotiation_rounds {
                    stay(Phase::Negotiation { round: round + 1 })
                } else {
                    stay(Phase::OrderCollection)
                }
            }
            (Phase::OrderCollection, TurnEvent::OrdersCollected) => stay(Phase::Adjudication),
            (
                Phase::Adjudication,
                TurnEvent::Adjudicated {
                    dislodged,
                    adjustments_due,
                },
            ) => {
                if *dislodged {
                    stay(Phase::Retreat)
                } else {
                    stay(after_resolution(*adjustments_due))
                }
            }
            (Phase::Retreat, TurnEvent::RetreatsResolved { adjustments_due }) => {
                stay(after_resolution(*adjustments_due))
            }
            (Phase::Adjustment, TurnEvent::AdjustmentsResolved) => stay(Phase::WinCheck),
            (Phase::WinCheck, TurnEvent::WinChecked(verdict)) => match verdict {
                WinVerdict::Continue => Ok(self.next_turn(from)),
                WinVerdict::Winner { participant } => stay(Phase::Terminated {
                    reason: Termination::Winner {
                        participant: participant.clone(),
                    },
                }),
                WinVerdict::Stalemate => stay(Phase::Terminated {
                    reason: Termination::Stalemate,
                }),
            },
            (phase, event) => Err(DomainError::phase_mismatch(format!(
                "{event:?} is not accepted in {phase} ({} {})",
                from.season, from.year
            ))),
        }
    }

    /// Whether some event takes `from` to `to`.
    pub fn is_legal(&self, from: &TurnPosition, to: &TurnPosition) -> bool {
        let same_turn = from.same_turn(to);
        match (&from.phase, &to.phase) {
            (Phase::Negotiation { round: r }, Phase::Negotiation { round: n }) => {
                same_turn && *r < self.negotiation_rounds && *n == r + 1
            }
            (Phase::Negotiation { round }, Phase::OrderCollection) => {
                same_turn && *round >= self.negotiation_rounds
            }
            (Phase::OrderCollection, Phase::Adjudication) => same_turn,
            (Phase::Adjudication, Phase::Retreat | Phase::WinCheck) => same_turn,
            (Phase::Adjudication | Phase::Retreat, Phase::Adjustment) => {
                same_turn && from.season == Season::Fall
            }
            (Phase::Retreat | Phase::Adjustment, Phase::WinCheck) => same_turn,
            (Phase::WinCheck, Phase::Terminated { .. }) => same_turn,
            (Phase::WinCheck, _) => *to == self.next_turn(from),
            _ => false,
        }
    }
}


#[cfg(test)]
mod props {
    use proptest::prelude::*;

    use super::*;

    /// Drive whole turns with arbitrary adjudication signals.
    fn drive(
        m: &TurnMachine,
        turns: usize,
        signals: &[(bool, bool)],
    ) -> Vec<TurnPosition> {
        let mut pos = m.initial(1901);
        let mut seen = vec![pos.clone()];
        let mut sig = signals.iter().cycle();
        let mut completed = 0;
        while completed < turns {
            let event = match pos.phase {
                Phase::Negotiation { .. } => TurnEvent::RoundClosed,
                Phase::OrderCollection => TurnEvent::OrdersCollected,
                Phase::Adjudication => {
                    let (dislodged, adjustments_due) = *sig.next().unwrap_or(&(false, false));
                    TurnEvent::Adjudicated {
                        dislodged,
                        adjustments_due,
                    }
                }
                Phase::Retreat => TurnEvent::RetreatsResolved {
                    adjustments_due: sig.next().is_some_and(|s| s.1),
                },
                Phase::Adjustment => TurnEvent::AdjustmentsResolved,
                Phase::WinCheck => {
                    completed += 1;
                    TurnEvent::WinChecked(WinVerdict::Continue)
                }
                Phase::Terminated { .. } => break,
            };
            let next = m.next(&pos, &event).unwrap();
            assert!(m.is_legal(&pos, &next), "{pos} -> {next}");
            seen.push(next.clone());
            pos = next;
        }
        seen
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn prop_exactly_r_negotiation_rounds_per_turn(
            rounds in 0u32..6,
            turns in 1usize..5,
            signals in proptest::collection::vec((any::<bool>(), any::<bool>()), 1..8),
        ) {
            let m = TurnMachine::new(rounds);
            let seen = drive(&m, turns, &signals);
            for turn in seen.iter().filter(|p| p.phase == Phase::OrderCollection) {
                let negotiations = seen
                    .iter()
                    .filter(|p| p.same_turn(turn) && matches!(p.phase, Phase::Negotiation { .. }))
                    .count();
                prop_assert_eq!(negotiations as u32, rounds);
            }
        }

        #[test]
        fn prop_adjustment_only_in_fall(
            signals in proptest::collection::vec((any::<bool>(), any::<bool>()), 1..8),
        ) {
            let m = TurnMachine::new(1);
            let seen = drive(&m, 6, &signals);
            for p in seen.iter().filter(|p| p.phase == Phase::Adjustment) {
                prop_assert_eq!(p.season, Season::Fall);
            }
        }
    }
}
