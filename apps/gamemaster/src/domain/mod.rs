pub mod board;
pub mod game;
pub mod message;
pub mod orders;
pub mod participant;
pub mod phase;
pub mod transition;

pub use board::{Board, Dislodgement, Unit, UnitKind};
pub use game::{Game, GameId, Resolution};
pub use message::{MessageDraft, MessageHandle, MessageName, SeriesKey};
pub use orders::{Order, OrderPayload, OrderPhase};
pub use participant::{KeyRef, Liveness, Participant, ParticipantId, Roster, AUTHORITY_ID};
pub use phase::{Phase, PhaseKind, PhaseLabel, Season, Termination, TurnPosition};
pub use transition::{TurnEvent, TurnMachine, WinVerdict};
