pub mod game;
pub mod settings;

pub use game::{GameConfig, ResubmissionPolicy};
pub use settings::{CommandSpec, Settings};
