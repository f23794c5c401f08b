//! Storage wrappers that fail on demand.

use std::sync::atomic::{AtomicBool, Ordering};

use gamemaster::domain::{MessageDraft, MessageHandle, MessageName};
use gamemaster::mailbox::MessageQuery;
use gamemaster::{DomainError, MailboxStore, MemoryMailbox};

#[derive(Default)]
pub struct FailingMailbox {
    inner: MemoryMailbox,
    failing: AtomicBool,
}

impl FailingMailbox {
    pub fn fail_appends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl MailboxStore for FailingMailbox {
    fn append(&self, draft: &MessageDraft) -> Result<MessageHandle, DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::storage("mailbox volume is read-only"));
        }
        self.inner.append(draft)
    }

    fn query(&self, query: &MessageQuery) -> Result<Vec<MessageHandle>, DomainError> {
        self.inner.query(query)
    }

    fn read(&self, name: &MessageName) -> Result<Vec<u8>, DomainError> {
        self.inner.read(name)
    }
}
