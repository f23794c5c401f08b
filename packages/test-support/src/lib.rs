//! Shared helpers for gamemaster tests.
//!
//! Logging setup lives in [`logging`]; the rest generates unique identifiers
//! and scratch game roots so concurrent tests never share on-disk state.

pub mod logging;

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use ulid::Ulid;

/// Generate a game id that is unique across test runs.
///
/// The result only uses characters that are valid in a game directory name.
///
/// # Examples
/// ```
/// use test_support::unique_game_id;
///
/// let a = unique_game_id("replay");
/// let b = unique_game_id("replay");
/// assert_ne!(a, b);
/// assert!(a.starts_with("replay-"));
/// ```
pub fn unique_game_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Ulid::new().to_string().to_lowercase())
}

/// A scratch directory holding one or more game directories.
///
/// Removed from disk when dropped.
pub struct ScratchRoot {
    dir: TempDir,
}

impl ScratchRoot {
    pub fn new() -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("gm-test-").tempdir()?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path a game with `game_id` would occupy under this root.
    pub fn game_path(&self, game_id: &str) -> PathBuf {
        self.dir.path().join(game_id)
    }
}
