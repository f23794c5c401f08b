//! On-disk layout of one game.
//!
//! ```text
//! <root>/<game-id>/
//!   log.jsonl     event log
//!   state.json    game record snapshot, rewritten at every transition
//!   mailbox/      message store
//!   game.lock     held by the running orchestrator
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use tracing::{debug, warn};

use crate::domain::{Game, GameId};
use crate::error::AppError;
use crate::event_log::JsonlEventLog;
use crate::mailbox::FsMailbox;

const LOG_FILE: &str = "log.jsonl";
const STATE_FILE: &str = "state.json";
const MAILBOX_DIR: &str = "mailbox";
const LOCK_FILE: &str = "game.lock";

#[derive(Debug, Clone)]
pub struct GameDir {
    root: PathBuf,
}

impl GameDir {
    pub fn new(games_root: &Path, id: &GameId) -> Self {
        Self {
            root: games_root.join(id.as_str()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    pub fn mailbox_path(&self) -> PathBuf {
        self.root.join(MAILBOX_DIR)
    }

    /// A game exists once its log does.
    pub fn exists(&self) -> bool {
        self.log_path().is_file()
    }

    pub fn create_all(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.mailbox_path()).map_err(|e| AppError::Io {
            detail: format!("creating {}", self.root.display()),
            source: e,
        })
    }

    /// Take the exclusive game lock. Fails fast if another process holds it.
    pub fn lock(&self) -> Result<GameLock, AppError> {
        self.create_all()?;
        let path = self.root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        if !file.try_lock_exclusive()? {
            return Err(AppError::Locked {
                detail: format!("{} is held by another orchestrator", path.display()),
            });
        }
        debug!(path = %path.display(), "Acquired game lock");
        Ok(GameLock { file, path })
    }

    pub fn open_log(&self) -> Result<JsonlEventLog, AppError> {
        Ok(JsonlEventLog::open(self.log_path())?)
    }

    pub fn open_mailbox(&self) -> Result<FsMailbox, AppError> {
        Ok(FsMailbox::open(self.mailbox_path())?)
    }

    /// Write the game record through a temp file and rename, so readers
    /// never see a half-written snapshot.
    pub fn save_record(&self, game: &Game) -> Result<(), AppError> {
        let target = self.state_path();
        let tmp = self.root.join(format!(".{STATE_FILE}.tmp"));
        let bytes = serde_json::to_vec_pretty(game)?;
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    /// Last snapshot, if one was written.
    pub fn load_record(&self) -> Result<Option<Game>, AppError> {
        match fs::read(self.state_path()) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Released on drop.
#[derive(Debug)]
pub struct GameLock {
    file: File,
    path: PathBuf,
}

impl Drop for GameLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "Failed to release game lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir() -> (tempfile::TempDir, GameDir) {
        let tmp = tempfile::tempdir().unwrap();
        let game_dir = GameDir::new(tmp.path(), &GameId::new("g1").unwrap());
        (tmp, game_dir)
    }

    #[test]
    fn second_lock_fails_until_first_is_dropped() {
        let (_tmp, game_dir) = dir();
        let first = game_dir.lock().unwrap();
        let err = game_dir.lock().unwrap_err();
        assert!(matches!(err, AppError::Locked { .. }));
        drop(first);
        assert!(game_dir.lock().is_ok());
    }

    #[test]
    fn missing_record_is_none() {
        let (_tmp, game_dir) = dir();
        game_dir.create_all().unwrap();
        assert!(game_dir.load_record().unwrap().is_none());
        assert!(!game_dir.exists());
    }
}
