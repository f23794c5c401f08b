pub mod dispatch;
pub mod router;
pub mod status;
pub mod turn_flow;

pub use dispatch::{DispatchCoordinator, Outcome};
pub use router::{RoundScope, Router};
pub use status::{ParticipantStatus, StatusView};
pub use turn_flow::{Collaborators, NewGame, RunOutcome, Storage, TurnFlow};
