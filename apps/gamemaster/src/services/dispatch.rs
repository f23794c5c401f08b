//! Dispatch coordinator.
//!
//! Runs one unit of work per participant concurrently and waits at most
//! `deadline + grace`. A slow or failing unit only affects its own outcome.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::ParticipantId;
use crate::errors::{DomainError, ErrorCode};
use crate::event_log::{DispatchStatus, EventBody, EventDraft, EventLog, EventScope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    TimedOut,
    Failed(String),
}

impl<T> Outcome<T> {
    pub fn status(&self) -> DispatchStatus {
        match self {
            Outcome::Completed(_) => DispatchStatus::Completed,
            Outcome::TimedOut => DispatchStatus::TimedOut,
            Outcome::Failed(_) => DispatchStatus::Failed,
        }
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            Outcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Outcome::Completed(_) => None,
            Outcome::TimedOut => Some(ErrorCode::DispatchTimeout),
            Outcome::Failed(_) => Some(ErrorCode::DispatchFailure),
        }
    }
}

/// How a spawned unit ended, before it is turned into an [`Outcome`].
enum Settled<T> {
    Finished(Result<T, DomainError>, Duration),
    Expired(Duration),
    Panicked(String),
    Abandoned,
}

pub struct DispatchCoordinator {
    log: Arc<dyn EventLog>,
    grace: Duration,
}

impl DispatchCoordinator {
    pub fn new(log: Arc<dyn EventLog>, grace: Duration) -> Self {
        Self { log, grace }
    }

    /// Run `units` concurrently.
    ///
    /// Every unit gets exactly one `dispatch_result` event, written in the
    /// order the units were given. A unit that fails with a fatal error
    /// (storage) is recorded like any failure, and the first such error is
    /// returned once all outcomes are logged.
    pub async fn dispatch<T, Fut>(
        &self,
        scope: &EventScope,
        units: Vec<(ParticipantId, Fut)>,
        deadline: Duration,
    ) -> Result<BTreeMap<ParticipantId, Outcome<T>>, DomainError>
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, DomainError>> + Send + 'static,
    {
        let hard_stop = Instant::now() + deadline + self.grace;
        let mut participants = Vec::with_capacity(units.len());
        let mut handles = Vec::with_capacity(units.len());
        for (participant, work) in units {
            handles.push(tokio::spawn(async move {
                let begun = Instant::now();
                match tokio::time::timeout(deadline, work).await {
                    Ok(result) => Settled::Finished(result, begun.elapsed()),
                    Err(_) => Settled::Expired(begun.elapsed()),
                }
            }));
            participants.push(participant);
        }

        let settled = join_all(handles.into_iter().map(|mut handle| async move {
            match tokio::time::timeout_at(hard_stop, &mut handle).await {
                Ok(Ok(settled)) => settled,
                Ok(Err(join_err)) => Settled::Panicked(describe(join_err)),
                Err(_) => {
                    // The unit ignored cancellation; stop waiting for it.
                    handle.abort();
                    Settled::Abandoned
                }
            }
        }))
        .await;

        let mut fatal: Option<DomainError> = None;
        let mut outcomes = BTreeMap::new();
        for (participant, settled) in participants.into_iter().zip(settled) {
            let (outcome, elapsed) = match settled {
                Settled::Finished(Ok(value), elapsed) => (Outcome::Completed(value), elapsed),
                Settled::Finished(Err(DomainError::DispatchTimeout(_)), elapsed) => {
                    (Outcome::TimedOut, elapsed)
                }
                Settled::Finished(Err(err), elapsed) => {
                    if err.is_fatal() && fatal.is_none() {
                        fatal = Some(err.clone());
                    }
                    (Outcome::Failed(err.to_string()), elapsed)
                }
                Settled::Expired(elapsed) => (Outcome::TimedOut, elapsed),
                Settled::Panicked(reason) => (Outcome::Failed(reason), deadline),
                Settled::Abandoned => (Outcome::TimedOut, deadline + self.grace),
            };
            self.record(scope, &participant, &outcome, elapsed)?;
            outcomes.insert(participant, outcome);
        }

        match fatal {
            Some(err) => Err(err),
            None => Ok(outcomes),
        }
    }

    fn record<T>(
        &self,
        scope: &EventScope,
        participant: &ParticipantId,
        outcome: &Outcome<T>,
        elapsed: Duration,
    ) -> Result<(), DomainError> {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let detail = match outcome {
            Outcome::Completed(_) => {
                debug!(participant = %participant, elapsed_ms, "Unit completed");
                None
            }
            Outcome::TimedOut => {
                warn!(participant = %participant, elapsed_ms, "Unit timed out");
                None
            }
            Outcome::Failed(reason) => {
                warn!(participant = %participant, elapsed_ms, reason = %reason, "Unit failed");
                Some(reason.clone())
            }
        };
        self.log.append(EventDraft::by(
            participant,
            scope.clone(),
            EventBody::DispatchResult {
                participant: participant.clone(),
                status: outcome.status(),
                code: outcome.error_code(),
                detail,
                elapsed_ms,
            },
        ))?;
        Ok(())
    }
}

fn describe(err: JoinError) -> String {
    if err.is_panic() {
        let panic = err.into_panic();
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        format!("unit panicked: {message}")
    } else {
        "unit was cancelled".to_string()
    }
}
