use dashmap::DashMap;
use parking_lot::RwLock;
use time::OffsetDateTime;

use super::{MailboxStore, MessageQuery};
use crate::domain::message::sort_handles;
use crate::domain::{MessageDraft, MessageHandle, MessageName, SeriesKey};
use crate::errors::DomainError;

struct Stored {
    handle: MessageHandle,
    ciphertext: Vec<u8>,
}

/// In-process store. Sequence counters live in a sharded map so writers in
/// different series do not contend.
#[derive(Default)]
pub struct MemoryMailbox {
    counters: DashMap<SeriesKey, u32>,
    messages: RwLock<Vec<Stored>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MailboxStore for MemoryMailbox {
    fn append(&self, draft: &MessageDraft) -> Result<MessageHandle, DomainError> {
        let series = draft.series();
        // The shard lock is held until the message is visible, so a later
        // sequence number can never be listed before an earlier one.
        let mut counter = self.counters.entry(series.clone()).or_insert(0);
        *counter += 1;
        let handle = MessageHandle {
            name: MessageName::new(&series, *counter),
            created_at: OffsetDateTime::now_utc(),
            size: draft.ciphertext.len() as u64,
        };
        self.messages.write().push(Stored {
            handle: handle.clone(),
            ciphertext: draft.ciphertext.clone(),
        });
        drop(counter);
        Ok(handle)
    }

    fn query(&self, query: &MessageQuery) -> Result<Vec<MessageHandle>, DomainError> {
        let mut handles: Vec<MessageHandle> = self
            .messages
            .read()
            .iter()
            .map(|m| &m.handle)
            .filter(|h| query.matches(&h.name))
            .cloned()
            .collect();
        sort_handles(&mut handles);
        Ok(handles)
    }

    fn read(&self, name: &MessageName) -> Result<Vec<u8>, DomainError> {
        self.messages
            .read()
            .iter()
            .find(|m| &m.handle.name == name)
            .map(|m| m.ciphertext.clone())
            .ok_or_else(|| DomainError::invalid_address(format!("no message named {name}")))
    }
}
