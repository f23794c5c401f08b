//! Message router.
//!
//! Sits between agents and the mailbox: checks that a message is addressed
//! to the current phase and round and to someone who may receive it, then
//! stores it. The router only ever handles ciphertext.

use std::sync::Arc;

use tracing::warn;

use crate::collaborators::{OutboundMessage, SealedNote, SealedOrders};
use crate::domain::{
    MessageDraft, MessageHandle, MessageName, ParticipantId, PhaseKind, PhaseLabel, Roster,
    TurnPosition,
};
use crate::errors::DomainError;
use crate::event_log::{Actor, EventDraft, EventLog, EventScope};
use crate::mailbox::{Mailbox, MessageQuery};

/// The phase and round messages are currently accepted for.
#[derive(Debug, Clone)]
pub struct RoundScope {
    pub label: PhaseLabel,
    pub round: u32,
    pub event_scope: EventScope,
    pub roster: Arc<Roster>,
}

impl RoundScope {
    pub fn current(position: &TurnPosition, roster: Arc<Roster>) -> Result<Self, DomainError> {
        match (position.label(), position.round()) {
            (Some(label), Some(round)) => Ok(Self {
                label,
                round,
                event_scope: EventScope::from(position),
                roster,
            }),
            _ => Err(DomainError::phase_mismatch(format!(
                "no messages are routed during {position}"
            ))),
        }
    }
}

#[derive(Clone)]
pub struct Router {
    mailbox: Mailbox,
    log: Arc<dyn EventLog>,
}

impl Router {
    pub fn new(mailbox: Mailbox, log: Arc<dyn EventLog>) -> Self {
        Self { mailbox, log }
    }

    /// Route a participant-to-participant message. Only negotiation rounds
    /// carry these.
    pub fn send(
        &self,
        scope: &RoundScope,
        sender: &ParticipantId,
        message: OutboundMessage,
    ) -> Result<MessageHandle, DomainError> {
        let result = self.check_sender(scope, sender).and_then(|()| {
            check_current(scope, sender, message.phase, message.round)?;
            if message.recipient.is_authority() {
                return Err(DomainError::invalid_address(format!(
                    "{sender} addressed the authority outside an order submission"
                )));
            }
            if &message.recipient == sender {
                return Err(DomainError::invalid_address(format!(
                    "{sender} addressed a message to itself"
                )));
            }
            if scope.label.kind != PhaseKind::Negotiation {
                return Err(DomainError::invalid_address(format!(
                    "participant messages are not routed during {}",
                    scope.label
                )));
            }
            self.mailbox.put(
                MessageDraft {
                    sender: sender.clone(),
                    recipient: message.recipient,
                    phase: message.phase,
                    round: message.round,
                    ciphertext: message.ciphertext,
                },
                &scope.roster,
                scope.event_scope.clone(),
            )
        });
        self.report(scope, sender, result)
    }

    /// Route an encrypted order submission to the authority.
    pub fn submit_orders(
        &self,
        scope: &RoundScope,
        sender: &ParticipantId,
        sealed: SealedOrders,
    ) -> Result<MessageHandle, DomainError> {
        let result = self.check_sender(scope, sender).and_then(|()| {
            check_current(scope, sender, sealed.phase, scope.round)?;
            if !scope.label.kind.takes_orders() {
                return Err(DomainError::invalid_address(format!(
                    "orders are not accepted during {}",
                    scope.label
                )));
            }
            self.mailbox.put(
                MessageDraft {
                    sender: sender.clone(),
                    recipient: ParticipantId::authority(),
                    phase: sealed.phase,
                    round: scope.round,
                    ciphertext: sealed.ciphertext,
                },
                &scope.roster,
                scope.event_scope.clone(),
            )
        });
        self.report(scope, sender, result)
    }

    /// Store a note `sender` wrote to itself. Notes can be written in any
    /// phase that routes messages and stay listed for the rest of the game.
    pub fn write_note(
        &self,
        scope: &RoundScope,
        sender: &ParticipantId,
        note: SealedNote,
    ) -> Result<MessageHandle, DomainError> {
        let result = self.check_sender(scope, sender).and_then(|()| {
            check_current(scope, sender, note.phase, scope.round)?;
            self.mailbox.put(
                MessageDraft {
                    sender: sender.clone(),
                    recipient: sender.clone(),
                    phase: note.phase,
                    round: scope.round,
                    ciphertext: note.ciphertext,
                },
                &scope.roster,
                scope.event_scope.clone(),
            )
        });
        self.report(scope, sender, result)
    }

    /// What `participant` can see in (`phase`, `round`): the mailbox listing
    /// without its own outgoing messages.
    pub fn inbox(
        &self,
        participant: &ParticipantId,
        phase: PhaseLabel,
        round: u32,
    ) -> Result<Vec<MessageHandle>, DomainError> {
        let mut handles = self.mailbox.list(participant, phase, round)?;
        handles.retain(|h| &h.name.sender != participant);
        Ok(handles)
    }

    /// What `participant` sent in (`phase`, `round`), notes excluded.
    pub fn outbox(
        &self,
        participant: &ParticipantId,
        phase: PhaseLabel,
        round: u32,
    ) -> Result<Vec<MessageHandle>, DomainError> {
        let mut handles = self
            .mailbox
            .query(&MessageQuery::sent_by(participant, phase, round))?;
        handles.retain(|h| !h.name.is_note());
        Ok(handles)
    }

    pub fn notes(&self, participant: &ParticipantId) -> Result<Vec<MessageHandle>, DomainError> {
        self.mailbox.notes(participant)
    }

    /// Order submissions `sender` made in `phase`, oldest first.
    pub fn submissions(
        &self,
        sender: &ParticipantId,
        phase: PhaseLabel,
    ) -> Result<Vec<MessageHandle>, DomainError> {
        let mut handles = self.mailbox.list(&ParticipantId::authority(), phase, 1)?;
        handles.retain(|h| &h.name.sender == sender);
        Ok(handles)
    }

    pub fn read(&self, name: &MessageName) -> Result<Vec<u8>, DomainError> {
        self.mailbox.read(name)
    }

    fn check_sender(&self, scope: &RoundScope, sender: &ParticipantId) -> Result<(), DomainError> {
        if scope.roster.is_live(sender) {
            Ok(())
        } else {
            Err(DomainError::invalid_address(format!(
                "{sender} is not a live participant"
            )))
        }
    }

    /// Rejections are logged against the sender; only fatal errors stop the
    /// caller.
    fn report(
        &self,
        scope: &RoundScope,
        sender: &ParticipantId,
        result: Result<MessageHandle, DomainError>,
    ) -> Result<MessageHandle, DomainError> {
        if let Err(err) = &result {
            if !err.is_fatal() {
                warn!(
                    participant = %sender,
                    phase = %scope.label,
                    round = scope.round,
                    code = %err.code(),
                    error = %err,
                    "Message rejected"
                );
                self.log.append(EventDraft::error(
                    Actor::Participant(sender.clone()),
                    scope.event_scope.clone(),
                    err,
                ))?;
            }
        }
        result
    }
}

fn check_current(
    scope: &RoundScope,
    sender: &ParticipantId,
    phase: PhaseLabel,
    round: u32,
) -> Result<(), DomainError> {
    if phase != scope.label || round != scope.round {
        return Err(DomainError::stale_address(format!(
            "{sender} addressed {phase} r{round} during {} r{}",
            scope.label, scope.round
        )));
    }
    Ok(())
}
