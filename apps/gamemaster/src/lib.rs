#![deny(clippy::wildcard_imports)]
#![cfg_attr(test, allow(clippy::wildcard_imports))]

pub mod collaborators;
pub mod config;
pub mod domain;
pub mod error;
pub mod errors;
pub mod event_log;
pub mod infra;
pub mod mailbox;
pub mod services;

#[cfg(test)]
pub mod test_bootstrap;

pub use config::{GameConfig, ResubmissionPolicy, Settings};
pub use domain::{Game, GameId, ParticipantId, Roster, TurnPosition};
pub use error::AppError;
pub use errors::{DomainError, ErrorCode};
pub use event_log::{EventLog, JsonlEventLog, LogEvent, MemoryEventLog};
pub use infra::GameDir;
pub use mailbox::{FsMailbox, Mailbox, MailboxStore, MemoryMailbox};
pub use services::{
    Collaborators, DispatchCoordinator, NewGame, Router, RunOutcome, StatusView, Storage, TurnFlow,
};

// Auto-initialize logging for unit tests
#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    test_bootstrap::logging::init();
}
