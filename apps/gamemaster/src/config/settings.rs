//! Operator settings for the binary, read from the environment.

use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::error::AppError;

/// An external command split into program and leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Split on whitespace. No shell quoting is interpreted.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let mut parts = raw.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| AppError::config("command is empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding one sub-directory per game.
    pub game_root: PathBuf,
    /// Agent command run once per participant per phase.
    pub agent_cmd: Option<CommandSpec>,
    pub adjudicator_cmd: Option<CommandSpec>,
    /// Key agents encrypt their orders to.
    pub authority_key: Option<String>,
    /// Keyring the authority decrypts with. Defaults to `<game dir>/authority`.
    pub authority_home: Option<PathBuf>,
    pub gpg_program: String,
}

impl Settings {
    /// `GM_GAME_ROOT` (default `./games`), `GM_AGENT_CMD`,
    /// `GM_ADJUDICATOR_CMD`, `GM_AUTHORITY_KEY`, `GM_AUTHORITY_HOME`,
    /// `GM_GPG` (default `gpg`).
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            game_root: env::var("GM_GAME_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./games")),
            agent_cmd: optional_command("GM_AGENT_CMD")?,
            adjudicator_cmd: optional_command("GM_ADJUDICATOR_CMD")?,
            authority_key: optional_var("GM_AUTHORITY_KEY"),
            authority_home: optional_var("GM_AUTHORITY_HOME").map(PathBuf::from),
            gpg_program: env::var("GM_GPG").unwrap_or_else(|_| "gpg".to_string()),
        })
    }

    pub fn require_agent_cmd(&self) -> Result<&CommandSpec, AppError> {
        self.agent_cmd
            .as_ref()
            .ok_or_else(|| AppError::config("no agent command configured (GM_AGENT_CMD or --agent-cmd)"))
    }

    pub fn require_adjudicator_cmd(&self) -> Result<&CommandSpec, AppError> {
        self.adjudicator_cmd.as_ref().ok_or_else(|| {
            AppError::config("no adjudicator command configured (GM_ADJUDICATOR_CMD or --adjudicator-cmd)")
        })
    }

    pub fn require_authority_key(&self) -> Result<&str, AppError> {
        self.authority_key
            .as_deref()
            .ok_or_else(|| AppError::config("no authority key configured (GM_AUTHORITY_KEY or --authority-key)"))
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn optional_command(name: &str) -> Result<Option<CommandSpec>, AppError> {
    optional_var(name).map(|raw| CommandSpec::parse(&raw)).transpose()
}
