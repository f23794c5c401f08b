//! Scripted agents.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use gamemaster::collaborators::{
    CollaboratorError, OutboundMessage, Sandbox, SealedNote, SealedOrders, TaskDescriptor, TaskKind,
    TaskOutput,
};
use gamemaster::domain::orders::default_orders;
use gamemaster::domain::{Order, OrderPayload, OrderPhase, ParticipantId};
use parking_lot::Mutex;

use super::fixtures::pid;

#[derive(Debug, Clone)]
pub enum Script {
    /// Message every other live participant while negotiating; submit the
    /// phase's default orders otherwise.
    Cooperative,
    /// Empty output every time.
    Silent,
    /// Never answers.
    Hang,
    /// Reports a crash.
    Crash,
    /// Negotiate cooperatively, submit these orders.
    Orders(Vec<String>),
    /// Submit these bytes as the sealed orders.
    RawSubmission(Vec<u8>),
    /// Negotiate with these raw messages.
    Messages(Vec<OutboundMessage>),
    /// Cooperative, and write a note every task.
    Journal,
}

#[derive(Default)]
pub struct ScriptedSandbox {
    scripts: Mutex<HashMap<ParticipantId, Script>>,
    tasks: Mutex<Vec<TaskDescriptor>>,
}

impl ScriptedSandbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, participant: &str, script: Script) {
        self.scripts.lock().insert(pid(participant), script);
    }

    pub fn tasks(&self) -> Vec<TaskDescriptor> {
        self.tasks.lock().clone()
    }

    pub fn tasks_for(&self, participant: &str) -> Vec<TaskDescriptor> {
        let id = pid(participant);
        self.tasks
            .lock()
            .iter()
            .filter(|t| t.participant == id)
            .cloned()
            .collect()
    }
}

pub fn message_body(sender: &ParticipantId, recipient: &ParticipantId, round: u32) -> Vec<u8> {
    format!("{sender}->{recipient} r{round}").into_bytes()
}

pub fn note_body(task: &TaskDescriptor) -> Vec<u8> {
    format!("{} notes {} r{}", task.participant, task.phase, task.round).into_bytes()
}

fn negotiate(task: &TaskDescriptor) -> Vec<OutboundMessage> {
    task.roster
        .iter()
        .filter(|p| p.is_alive() && p.id != task.participant)
        .map(|p| OutboundMessage {
            recipient: p.id.clone(),
            phase: task.phase,
            round: task.round,
            ciphertext: message_body(&task.participant, &p.id, task.round),
        })
        .collect()
}

pub fn sealed(task: &TaskDescriptor, orders: Vec<Order>) -> SealedOrders {
    let payload = OrderPayload {
        power: task.participant.clone(),
        year: task.year,
        phase: task.phase,
        orders,
    };
    SealedOrders {
        phase: task.phase,
        ciphertext: payload.encode().expect("encode orders"),
    }
}

fn cooperative(task: &TaskDescriptor, orders: Option<Vec<String>>) -> TaskOutput {
    if task.task == TaskKind::Negotiate {
        return TaskOutput {
            messages: negotiate(task),
            orders: None,
            note: None,
        };
    }
    let orders = match orders {
        Some(raw) => raw.into_iter().map(Order::new).collect(),
        None => OrderPhase::from_kind(task.phase.kind)
            .map(|phase| default_orders(&task.participant, phase, &task.board))
            .unwrap_or_default(),
    };
    TaskOutput {
        messages: Vec::new(),
        orders: Some(sealed(task, orders)),
        note: None,
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    async fn run(&self, task: TaskDescriptor) -> Result<TaskOutput, CollaboratorError> {
        self.tasks.lock().push(task.clone());
        let script = self
            .scripts
            .lock()
            .get(&task.participant)
            .cloned()
            .unwrap_or(Script::Cooperative);
        match script {
            Script::Cooperative => Ok(cooperative(&task, None)),
            Script::Silent => Ok(TaskOutput::default()),
            Script::Hang => std::future::pending().await,
            Script::Crash => Err(CollaboratorError::Failed("agent crashed".into())),
            Script::Orders(raw) => Ok(cooperative(&task, Some(raw))),
            Script::RawSubmission(bytes) if task.task != TaskKind::Negotiate => Ok(TaskOutput {
                messages: Vec::new(),
                orders: Some(SealedOrders {
                    phase: task.phase,
                    ciphertext: bytes,
                }),
                note: None,
            }),
            Script::RawSubmission(_) => Ok(cooperative(&task, None)),
            Script::Messages(messages) if task.task == TaskKind::Negotiate => Ok(TaskOutput {
                messages,
                orders: None,
                note: None,
            }),
            Script::Messages(_) => Ok(cooperative(&task, None)),
            Script::Journal => Ok(TaskOutput {
                note: Some(SealedNote {
                    phase: task.phase,
                    ciphertext: note_body(&task),
                }),
                ..cooperative(&task, None)
            }),
        }
    }
}
