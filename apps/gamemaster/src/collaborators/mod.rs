//! Seams to the external collaborators: the agent sandbox, the cipher and
//! the adjudicator. The core only sees these traits.

pub mod gpg;
pub mod process;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use thiserror::Error;

use crate::domain::orders::validate_orders;
use crate::domain::{
    Board, GameId, KeyRef, MessageName, Order, OrderPhase, Participant, ParticipantId, PhaseLabel,
    Resolution, Roster, Season,
};

pub use gpg::GpgCipher;
pub use process::{CommandAdjudicator, ProcessSandbox};

/// Errors reported by a collaborator.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Could not start or talk to the collaborator
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    /// Collaborator ran but reported failure
    #[error("collaborator failed: {0}")]
    Failed(String),
    /// Output did not match the expected shape
    #[error("unexpected collaborator output: {0}")]
    Protocol(String),
    #[error("collaborator timed out")]
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Negotiate,
    SubmitOrders,
    SubmitRetreats,
    SubmitAdjustments,
}

impl TaskKind {
    pub fn for_orders(phase: OrderPhase) -> Self {
        match phase {
            OrderPhase::Movement => TaskKind::SubmitOrders,
            OrderPhase::Retreat => TaskKind::SubmitRetreats,
            OrderPhase::Adjustment => TaskKind::SubmitAdjustments,
        }
    }
}

/// Everything an agent gets for one unit of work. Serialized to the agent
/// process as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub game_id: GameId,
    pub participant: ParticipantId,
    pub task: TaskKind,
    pub year: u16,
    pub season: Season,
    pub phase: PhaseLabel,
    pub round: u32,
    pub rounds_total: u32,
    /// Messages already delivered to this participant in the current phase.
    pub inbox: Vec<MessageName>,
    /// The participant's own notes, latest per phase, oldest first.
    #[serde(default)]
    pub notes: Vec<MessageName>,
    pub roster: Vec<Participant>,
    pub authority: ParticipantId,
    /// Key to encrypt order submissions to.
    pub authority_key: KeyRef,
    pub board: Board,
}

/// Ciphertext an agent wants delivered to another participant.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub recipient: ParticipantId,
    pub phase: PhaseLabel,
    pub round: u32,
    #[serde_as(as = "Base64")]
    pub ciphertext: Vec<u8>,
}

/// An encrypted order submission for the authority.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedOrders {
    pub phase: PhaseLabel,
    #[serde_as(as = "Base64")]
    pub ciphertext: Vec<u8>,
}

/// A private note, encrypted by the participant to its own key.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedNote {
    pub phase: PhaseLabel,
    #[serde_as(as = "Base64")]
    pub ciphertext: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    #[serde(default)]
    pub messages: Vec<OutboundMessage>,
    #[serde(default)]
    pub orders: Option<SealedOrders>,
    #[serde(default)]
    pub note: Option<SealedNote>,
}

/// Decrypted order set handed to the adjudicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjudicationRequest {
    pub game_id: GameId,
    pub year: u16,
    pub season: Season,
    pub phase: OrderPhase,
    pub board: Board,
    pub orders: BTreeMap<ParticipantId, Vec<Order>>,
}

/// Runs one participant's decision logic in isolation.
///
/// Dropping the returned future must stop the work; the dispatch
/// coordinator relies on that to enforce deadlines.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn run(&self, task: TaskDescriptor) -> Result<TaskOutput, CollaboratorError>;
}

/// Encryption primitive. Key references are opaque to the core.
#[async_trait]
pub trait Cipher: Send + Sync {
    async fn encrypt(&self, plaintext: &[u8], recipient: &KeyRef) -> Result<Vec<u8>, CollaboratorError>;

    async fn decrypt(&self, ciphertext: &[u8], key: &KeyRef) -> Result<Vec<u8>, CollaboratorError>;
}

/// Game rules live here, not in the core.
#[async_trait]
pub trait Adjudicator: Send + Sync {
    /// Starting board for `roster`.
    async fn initial_board(&self, roster: &Roster) -> Result<Board, CollaboratorError>;

    async fn adjudicate(&self, request: &AdjudicationRequest) -> Result<Resolution, CollaboratorError>;

    /// Legality check applied to each decrypted submission. A failure makes
    /// the submission malformed.
    fn validate(
        &self,
        participant: &ParticipantId,
        phase: OrderPhase,
        orders: &[Order],
        board: &Board,
    ) -> Result<(), String> {
        validate_orders(orders, participant, phase, board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PhaseKind;

    #[test]
    fn task_output_accepts_base64_and_missing_fields() {
        let json = serde_json::json!({
            "messages": [{
                "recipient": "England",
                "phase": "Spring_1901_Negotiation",
                "round": 1,
                "ciphertext": "aGVsbG8="
            }]
        });
        let out: TaskOutput = serde_json::from_value(json).unwrap();
        assert_eq!(out.messages[0].ciphertext, b"hello");
        assert_eq!(
            out.messages[0].phase,
            PhaseLabel::new(1901, Season::Spring, PhaseKind::Negotiation)
        );
        assert!(out.orders.is_none());

        let empty: TaskOutput = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, TaskOutput::default());
    }

    #[test]
    fn task_kind_per_order_phase() {
        assert_eq!(TaskKind::for_orders(OrderPhase::Retreat), TaskKind::SubmitRetreats);
        assert_eq!(
            serde_json::to_value(TaskKind::SubmitOrders).unwrap(),
            serde_json::json!("submit_orders")
        );
    }
}
