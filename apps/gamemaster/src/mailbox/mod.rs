//! Mailbox store.
//!
//! Ciphertext blobs addressed by sender, recipient, phase, round and a
//! per-series sequence number. Append-only: nothing is ever rewritten or
//! removed, so a handle that was listed once stays listed.

pub mod fs;
pub mod memory;

use std::sync::Arc;

use tracing::debug;

use crate::domain::{MessageDraft, MessageHandle, MessageName, ParticipantId, PhaseLabel, Roster};
use crate::errors::DomainError;
use crate::event_log::{EventBody, EventDraft, EventLog, EventScope};

pub use self::fs::FsMailbox;
pub use memory::MemoryMailbox;

/// Which stored messages a listing returns. `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageQuery {
    pub sender: Option<ParticipantId>,
    pub recipient: Option<ParticipantId>,
    pub phase: Option<PhaseLabel>,
    pub round: Option<u32>,
}

impl MessageQuery {
    pub fn addressed_to(recipient: &ParticipantId, phase: PhaseLabel, round: u32) -> Self {
        Self {
            recipient: Some(recipient.clone()),
            phase: Some(phase),
            round: Some(round),
            ..Self::default()
        }
    }

    pub fn sent_by(sender: &ParticipantId, phase: PhaseLabel, round: u32) -> Self {
        Self {
            sender: Some(sender.clone()),
            phase: Some(phase),
            round: Some(round),
            ..Self::default()
        }
    }

    /// Everything `participant` wrote to itself, across all phases.
    pub fn notes(participant: &ParticipantId) -> Self {
        Self {
            sender: Some(participant.clone()),
            recipient: Some(participant.clone()),
            ..Self::default()
        }
    }

    pub fn matches(&self, name: &MessageName) -> bool {
        self.sender.as_ref().is_none_or(|s| s == &name.sender)
            && self.recipient.as_ref().is_none_or(|r| r == &name.recipient)
            && self.phase.is_none_or(|p| p == name.phase)
            && self.round.is_none_or(|r| r == name.round)
    }
}

/// Storage backend.
///
/// `append` must allocate the next sequence number of the draft's series
/// atomically: concurrent writers never share or skip a number in their
/// own series.
pub trait MailboxStore: Send + Sync {
    fn append(&self, draft: &MessageDraft) -> Result<MessageHandle, DomainError>;

    /// Messages matching `query`, in [`sort_handles`] order.
    ///
    /// [`sort_handles`]: crate::domain::message::sort_handles
    fn query(&self, query: &MessageQuery) -> Result<Vec<MessageHandle>, DomainError>;

    /// Messages for `recipient` in (`phase`, `round`), ordered by sequence
    /// number then sender.
    fn list(
        &self,
        recipient: &ParticipantId,
        phase: PhaseLabel,
        round: u32,
    ) -> Result<Vec<MessageHandle>, DomainError> {
        self.query(&MessageQuery::addressed_to(recipient, phase, round))
    }

    fn read(&self, name: &MessageName) -> Result<Vec<u8>, DomainError>;

    /// `participant`'s private notes: the latest one of each phase, oldest
    /// phase first.
    fn notes(&self, participant: &ParticipantId) -> Result<Vec<MessageHandle>, DomainError> {
        let mut latest: Vec<MessageHandle> = Vec::new();
        for handle in self.query(&MessageQuery::notes(participant))? {
            match latest.last_mut() {
                Some(last) if last.name.phase == handle.name.phase => *last = handle,
                _ => latest.push(handle),
            }
        }
        Ok(latest)
    }
}

/// Store plus the routing log. Every successful `put` is logged as
/// `message_routed`.
#[derive(Clone)]
pub struct Mailbox {
    store: Arc<dyn MailboxStore>,
    log: Arc<dyn EventLog>,
}

impl Mailbox {
    pub fn new(store: Arc<dyn MailboxStore>, log: Arc<dyn EventLog>) -> Self {
        Self { store, log }
    }

    /// Store `draft`. The recipient must be live, or the authority.
    pub fn put(
        &self,
        draft: MessageDraft,
        roster: &Roster,
        scope: EventScope,
    ) -> Result<MessageHandle, DomainError> {
        if !draft.recipient.is_authority() && !roster.is_live(&draft.recipient) {
            return Err(DomainError::invalid_address(format!(
                "{} is not a live participant",
                draft.recipient
            )));
        }
        let digest = draft.digest();
        let handle = self.store.append(&draft)?;
        self.log.append(EventDraft::by(
            &draft.sender,
            scope,
            EventBody::MessageRouted {
                name: handle.name.clone(),
                bytes: handle.size,
                digest,
            },
        ))?;
        debug!(
            sender = %handle.name.sender,
            recipient = %handle.name.recipient,
            phase = %handle.name.phase,
            round = handle.name.round,
            seq = handle.name.seq,
            "Message stored"
        );
        Ok(handle)
    }

    pub fn list(
        &self,
        recipient: &ParticipantId,
        phase: PhaseLabel,
        round: u32,
    ) -> Result<Vec<MessageHandle>, DomainError> {
        self.store.list(recipient, phase, round)
    }

    pub fn query(&self, query: &MessageQuery) -> Result<Vec<MessageHandle>, DomainError> {
        self.store.query(query)
    }

    pub fn notes(&self, participant: &ParticipantId) -> Result<Vec<MessageHandle>, DomainError> {
        self.store.notes(participant)
    }

    pub fn read(&self, name: &MessageName) -> Result<Vec<u8>, DomainError> {
        self.store.read(name)
    }
}
