//! Collaborators backed by external commands speaking JSON over
//! stdin/stdout.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{AdjudicationRequest, Adjudicator, CollaboratorError, Sandbox, TaskDescriptor, TaskOutput};
use crate::config::CommandSpec;
use crate::domain::{Board, Resolution, Roster};

/// Run `spec` with `extra` arguments, feed `input` as JSON on stdin and
/// parse stdout as JSON. The child is killed if the future is dropped.
async fn run_json<I, O>(
    spec: &CommandSpec,
    extra: &[&str],
    input: &I,
    timeout: Option<Duration>,
) -> Result<O, CollaboratorError>
where
    I: Serialize + ?Sized,
    O: DeserializeOwned,
{
    let payload = serde_json::to_vec(input).map_err(|e| CollaboratorError::Protocol(e.to_string()))?;
    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .args(extra)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CollaboratorError::Unavailable(format!("{spec}: {e}")))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| CollaboratorError::Unavailable(format!("{spec}: stdin not piped")))?;
    let feed = async move {
        let written = stdin.write_all(&payload).await;
        drop(stdin);
        written
    };
    let work = async { tokio::join!(feed, child.wait_with_output()) };
    let (fed, output) = match timeout {
        Some(limit) => tokio::time::timeout(limit, work)
            .await
            .map_err(|_| CollaboratorError::Timeout)?,
        None => work.await,
    };
    let output = output.map_err(|e| CollaboratorError::Unavailable(format!("{spec}: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CollaboratorError::Failed(format!(
            "{spec} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    // A child that exits before reading all of stdin is fine if it succeeded.
    if let Err(e) = fed {
        debug!(command = %spec, error = %e, "Child closed stdin early");
    }
    serde_json::from_slice(&output.stdout).map_err(|e| CollaboratorError::Protocol(format!("{spec}: {e}")))
}

/// Runs the agent command once per unit of work:
/// `<agent cmd> <participant>` with the task descriptor on stdin.
pub struct ProcessSandbox {
    command: CommandSpec,
}

impl ProcessSandbox {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn run(&self, task: TaskDescriptor) -> Result<TaskOutput, CollaboratorError> {
        debug!(participant = %task.participant, phase = %task.phase, round = task.round, "Starting agent");
        // The dispatch deadline bounds this; dropping the future kills the child.
        run_json(&self.command, &[task.participant.as_str()], &task, None).await
    }
}

/// Adjudicator behind an external engine:
/// `<cmd> init` (roster on stdin, board on stdout) and
/// `<cmd> adjudicate` (request on stdin, resolution on stdout).
pub struct CommandAdjudicator {
    command: CommandSpec,
    timeout: Duration,
}

impl CommandAdjudicator {
    pub fn new(command: CommandSpec, timeout: Duration) -> Self {
        Self { command, timeout }
    }
}

/// Engines that only report ownership get their counts filled in here, at
/// the boundary, so the core still receives counts from the adjudicator side.
fn with_counts(mut board: Board) -> Board {
    if board.resource_counts.is_empty() {
        for owner in board.ownership.values() {
            *board.resource_counts.entry(owner.clone()).or_insert(0) += 1;
        }
    }
    board
}

#[async_trait]
impl Adjudicator for CommandAdjudicator {
    async fn initial_board(&self, roster: &Roster) -> Result<Board, CollaboratorError> {
        let board: Board = run_json(&self.command, &["init"], roster, Some(self.timeout)).await?;
        Ok(with_counts(board))
    }

    async fn adjudicate(&self, request: &AdjudicationRequest) -> Result<Resolution, CollaboratorError> {
        let mut resolution: Resolution =
            run_json(&self.command, &["adjudicate"], request, Some(self.timeout)).await?;
        resolution.board = with_counts(resolution.board);
        Ok(resolution)
    }
}
