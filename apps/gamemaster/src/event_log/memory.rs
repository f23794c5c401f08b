use parking_lot::Mutex;
use time::OffsetDateTime;

use super::{EventDraft, EventLog, LogEvent};
use crate::errors::DomainError;

/// In-process log. Used by tests and dry runs.
#[derive(Default)]
pub struct MemoryEventLog {
    events: Mutex<Vec<LogEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with events from another log, e.g. to replay a copy.
    pub fn from_events(events: Vec<LogEvent>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }
}

impl EventLog for MemoryEventLog {
    fn append(&self, draft: EventDraft) -> Result<LogEvent, DomainError> {
        let mut events = self.events.lock();
        let seq = events.last().map_or(1, |e| e.seq + 1);
        let event = LogEvent::from_draft(seq, OffsetDateTime::now_utc(), draft);
        events.push(event.clone());
        Ok(event)
    }

    fn events(&self) -> Result<Vec<LogEvent>, DomainError> {
        Ok(self.events.lock().clone())
    }
}
