//! Queries over logged events.

use gamemaster::domain::{Order, ParticipantId, TurnPosition};
use gamemaster::errors::ErrorCode;
use gamemaster::event_log::{DispatchStatus, EventBody, LogEvent};

pub fn of_kind<'a>(events: &'a [LogEvent], kind: &str) -> Vec<&'a LogEvent> {
    events.iter().filter(|e| e.kind() == kind).collect()
}

pub fn phase_starts(events: &[LogEvent]) -> Vec<TurnPosition> {
    events
        .iter()
        .filter_map(|e| match &e.body {
            EventBody::PhaseStart { to, .. } => Some(to.clone()),
            _ => None,
        })
        .collect()
}

/// `(status, code)` of every dispatch result for `participant`.
pub fn dispatch_results(
    events: &[LogEvent],
    participant: &ParticipantId,
) -> Vec<(DispatchStatus, Option<ErrorCode>)> {
    events
        .iter()
        .filter_map(|e| match &e.body {
            EventBody::DispatchResult {
                participant: p,
                status,
                code,
                ..
            } if p == participant => Some((*status, *code)),
            _ => None,
        })
        .collect()
}

pub fn error_codes(events: &[LogEvent]) -> Vec<ErrorCode> {
    events
        .iter()
        .filter_map(|e| match &e.body {
            EventBody::Error { code, .. } => Some(*code),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub synthetic: bool,
    pub accepted: Option<String>,
    pub orders: Vec<Order>,
    pub reason: Option<ErrorCode>,
    pub by_system: bool,
}

pub fn submissions(events: &[LogEvent], participant: &ParticipantId) -> Vec<Submission> {
    events
        .iter()
        .filter_map(|e| match &e.body {
            EventBody::OrderSubmission {
                participant: p,
                synthetic,
                message,
                orders,
                reason,
                ..
            } if p == participant => Some(Submission {
                synthetic: *synthetic,
                accepted: message.as_ref().map(|m| m.to_string()),
                orders: orders.clone(),
                reason: *reason,
                by_system: e.actor == gamemaster::event_log::Actor::System,
            }),
            _ => None,
        })
        .collect()
}
