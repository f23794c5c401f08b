pub mod game_dir;

pub use game_dir::{GameDir, GameLock};
