//! Turn orchestrator.
//!
//! Drives a game phase by phase: negotiation rounds, order collection,
//! adjudication, retreats, adjustments and the win check. Every
//! transition is logged before it takes effect, so a crashed run resumes
//! from the log with [`TurnFlow::resume`].

mod negotiation;
mod orders;

use std::collections::BTreeMap;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::dispatch::DispatchCoordinator;
use super::router::{RoundScope, Router};
use crate::collaborators::{
    Adjudicator, Cipher, CollaboratorError, Sandbox, SealedNote, TaskDescriptor, TaskKind,
};
use crate::config::GameConfig;
use crate::domain::{
    Board, Game, GameId, KeyRef, MessageName, Order, ParticipantId, Phase, PhaseKind, PhaseLabel,
    Resolution, Roster, Termination, TurnEvent, TurnMachine, TurnPosition,
};
use crate::error::AppError;
use crate::errors::DomainError;
use crate::event_log::{replay, EventBody, EventDraft, EventLog, EventScope, MemoryEventLog};
use crate::infra::GameDir;
use crate::mailbox::{Mailbox, MailboxStore, MemoryMailbox};

/// External collaborators a game runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub sandbox: Arc<dyn Sandbox>,
    pub adjudicator: Arc<dyn Adjudicator>,
    pub cipher: Arc<dyn Cipher>,
    /// Key the authority decrypts order submissions with.
    pub authority_secret: KeyRef,
}

/// Where a game's log, mailbox and snapshots live.
#[derive(Clone)]
pub struct Storage {
    pub log: Arc<dyn EventLog>,
    pub mailbox: Arc<dyn MailboxStore>,
    /// Snapshot target; `None` keeps no `state.json`.
    pub records: Option<GameDir>,
}

impl Storage {
    pub fn in_memory() -> Self {
        Self {
            log: Arc::new(MemoryEventLog::new()),
            mailbox: Arc::new(MemoryMailbox::new()),
            records: None,
        }
    }

    pub fn on_disk(dir: &GameDir) -> Result<Self, AppError> {
        dir.create_all()?;
        Ok(Self {
            log: Arc::new(dir.open_log()?),
            mailbox: Arc::new(dir.open_mailbox()?),
            records: Some(dir.clone()),
        })
    }
}

/// Parameters of a game that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewGame {
    pub id: GameId,
    pub roster: Roster,
    pub config: GameConfig,
    /// Key participants encrypt orders to.
    pub authority_key: KeyRef,
    /// Starting board; asked from the adjudicator when `None`.
    pub board: Option<Board>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Terminated(Termination),
    TurnLimit,
    Cancelled,
}

/// Orders settled for a phase but not yet adjudicated.
#[derive(Debug, Clone)]
struct CollectedOrders {
    label: PhaseLabel,
    orders: BTreeMap<ParticipantId, Vec<Order>>,
}

pub struct TurnFlow {
    game: Game,
    machine: TurnMachine,
    log: Arc<dyn EventLog>,
    router: Router,
    dispatcher: DispatchCoordinator,
    collaborators: Collaborators,
    records: Option<GameDir>,
    /// Adjudication result already logged for the current phase.
    pending: Option<Resolution>,
    collected: Option<CollectedOrders>,
    positions: Vec<TurnPosition>,
}

impl TurnFlow {
    /// Start a new game: log `game_created` and the opening phase start.
    pub async fn create(
        new: NewGame,
        storage: Storage,
        collaborators: Collaborators,
    ) -> Result<Self, AppError> {
        new.config.validate()?;
        if !storage.log.events()?.is_empty() {
            return Err(AppError::config(format!(
                "game {} already has an event log",
                new.id
            )));
        }

        let board = match new.board {
            Some(board) => board,
            None => collaborators
                .adjudicator
                .initial_board(&new.roster)
                .await
                .map_err(|e| DomainError::AdjudicationFault(format!("initial board: {e}")))?,
        };
        let machine = TurnMachine::new(new.config.negotiation_rounds);
        let opening = machine.initial(new.config.starting_year);
        let game = Game::new(
            new.id,
            new.roster,
            board,
            new.config,
            new.authority_key,
            opening.clone(),
            OffsetDateTime::now_utc(),
        );

        storage.log.append(EventDraft::system(
            EventScope::from(&opening),
            EventBody::GameCreated {
                game_id: game.id.clone(),
                roster: game.roster.clone(),
                board: game.board.clone(),
                config: game.config.clone(),
                authority_key: game.authority_key.clone(),
            },
        ))?;
        log_opening(storage.log.as_ref(), &opening)?;

        info!(
            game_id = %game.id,
            participants = game.roster.len(),
            position = %opening,
            "Game created"
        );
        let flow = Self::assemble(game, storage, collaborators, None, vec![opening]);
        flow.persist()?;
        Ok(flow)
    }

    /// Rebuild a game from its log and continue from the last logged
    /// position.
    pub fn resume(storage: Storage, collaborators: Collaborators) -> Result<Self, AppError> {
        let events = storage.log.events()?;
        let mut replayed = replay(&events)?;
        if replayed.positions.is_empty() {
            // Stopped between `game_created` and the opening phase start.
            let opening = replayed.game.position.clone();
            log_opening(storage.log.as_ref(), &opening)?;
            warn!(game_id = %replayed.game.id, position = %opening, "Logged missing opening phase start");
            replayed.positions.push(opening);
        }
        info!(
            game_id = %replayed.game.id,
            position = %replayed.game.position,
            last_seq = replayed.last_seq,
            pending = replayed.pending.is_some(),
            "Game resumed"
        );
        let flow = Self::assemble(
            replayed.game,
            storage,
            collaborators,
            replayed.pending,
            replayed.positions,
        );
        flow.persist()?;
        Ok(flow)
    }

    fn assemble(
        game: Game,
        storage: Storage,
        collaborators: Collaborators,
        pending: Option<Resolution>,
        positions: Vec<TurnPosition>,
    ) -> Self {
        let mailbox = Mailbox::new(storage.mailbox, storage.log.clone());
        Self {
            machine: TurnMachine::new(game.config.negotiation_rounds),
            router: Router::new(mailbox, storage.log.clone()),
            dispatcher: DispatchCoordinator::new(storage.log.clone(), game.config.dispatch_grace()),
            log: storage.log,
            records: storage.records,
            game,
            collaborators,
            pending,
            collected: None,
            positions,
        }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn position(&self) -> &TurnPosition {
        &self.game.position
    }

    /// Every position entered so far, oldest first.
    pub fn positions(&self) -> &[TurnPosition] {
        &self.positions
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn log(&self) -> &Arc<dyn EventLog> {
        &self.log
    }

    /// Run the current phase and advance to the next one.
    pub async fn step(&mut self) -> Result<(), AppError> {
        match self.game.position.phase.clone() {
            Phase::Negotiation { round } => self.run_negotiation_round(round).await,
            Phase::OrderCollection => self.run_order_collection().await,
            Phase::Adjudication => self.run_adjudication().await,
            Phase::Retreat => self.run_retreats().await,
            Phase::Adjustment => self.run_adjustments().await,
            Phase::WinCheck => self.run_win_check(),
            Phase::Terminated { reason } => Err(DomainError::phase_mismatch(format!(
                "game {} has terminated ({reason})",
                self.game.id
            ))
            .into()),
        }
    }

    /// Run phases until the current turn is over or the game ends.
    pub async fn run_turn(&mut self) -> Result<(), AppError> {
        let start = self.game.position.clone();
        while !self.game.position.is_terminal() && self.game.position.same_turn(&start) {
            self.step().await?;
        }
        Ok(())
    }

    /// Run until the game terminates, `max_turns` turns have completed, or
    /// `cancel` fires. Cancellation is checked between phases, so the log
    /// always ends on a whole phase.
    pub async fn run(
        &mut self,
        max_turns: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, AppError> {
        let mut turns = 0u32;
        loop {
            if let Phase::Terminated { reason } = &self.game.position.phase {
                return Ok(RunOutcome::Terminated(reason.clone()));
            }
            if max_turns.is_some_and(|max| turns >= max) {
                return Ok(RunOutcome::TurnLimit);
            }
            if cancel.is_cancelled() {
                info!(game_id = %self.game.id, position = %self.game.position, "Run cancelled");
                return Ok(RunOutcome::Cancelled);
            }

            let before = self.game.position.clone();
            if let Err(err) = self.step().await {
                error!(
                    game_id = %self.game.id,
                    position = %self.game.position,
                    code = %err.code(),
                    error = %err,
                    "Turn halted"
                );
                return Err(err);
            }
            if !self.game.position.same_turn(&before) {
                turns += 1;
            }
        }
    }

    fn run_win_check(&mut self) -> Result<(), AppError> {
        let verdict = self.game.win_verdict();
        info!(game_id = %self.game.id, verdict = ?verdict, "Win check");
        self.advance(TurnEvent::WinChecked(verdict))
    }

    /// Log the next position, then move to it.
    fn advance(&mut self, event: TurnEvent) -> Result<(), AppError> {
        let from = self.game.position.clone();
        let to = self.machine.next(&from, &event)?;
        self.log.append(EventDraft::system(
            EventScope::from(&to),
            EventBody::PhaseStart {
                from: Some(from.clone()),
                to: to.clone(),
            },
        ))?;
        self.game.position = to.clone();
        self.game.updated_at = OffsetDateTime::now_utc();
        self.pending = None;
        self.positions.push(to.clone());
        info!(game_id = %self.game.id, from = %from, to = %to, "Phase started");
        self.persist()
    }

    fn persist(&self) -> Result<(), AppError> {
        match &self.records {
            Some(dir) => dir.save_record(&self.game),
            None => Ok(()),
        }
    }

    fn round_scope(&self) -> Result<RoundScope, DomainError> {
        RoundScope::current(&self.game.position, Arc::new(self.game.roster.clone()))
    }

    /// Messages `participant` has received in this turn's negotiation, up to
    /// and including `up_to_round`.
    fn negotiation_inbox(
        &self,
        participant: &ParticipantId,
        up_to_round: u32,
    ) -> Result<Vec<MessageName>, DomainError> {
        let label = self.game.position.label_for(PhaseKind::Negotiation);
        let mut names = Vec::new();
        for round in 1..=up_to_round {
            names.extend(
                self.router
                    .inbox(participant, label, round)?
                    .into_iter()
                    .map(|h| h.name),
            );
        }
        Ok(names)
    }

    fn task_for(
        &self,
        participant: &ParticipantId,
        task: TaskKind,
        scope: &RoundScope,
        inbox: Vec<MessageName>,
    ) -> Result<TaskDescriptor, DomainError> {
        let notes = self
            .router
            .notes(participant)?
            .into_iter()
            .map(|h| h.name)
            .collect();
        Ok(TaskDescriptor {
            game_id: self.game.id.clone(),
            participant: participant.clone(),
            task,
            year: self.game.position.year,
            season: self.game.position.season,
            phase: scope.label,
            round: scope.round,
            rounds_total: self.machine.negotiation_rounds(),
            inbox,
            notes,
            roster: self.game.roster.iter().cloned().collect(),
            authority: ParticipantId::authority(),
            authority_key: self.game.authority_key.clone(),
            board: self.game.board.clone(),
        })
    }
}

fn log_opening(log: &dyn EventLog, opening: &TurnPosition) -> Result<(), DomainError> {
    log.append(EventDraft::system(
        EventScope::from(opening),
        EventBody::PhaseStart {
            from: None,
            to: opening.clone(),
        },
    ))?;
    Ok(())
}

/// Store the unit's note, if it wrote one. Rejections are already reported
/// by the router.
fn keep_note(
    router: &Router,
    scope: &RoundScope,
    sender: &ParticipantId,
    note: Option<SealedNote>,
) -> Result<(), DomainError> {
    match note.map(|note| router.write_note(scope, sender, note)) {
        Some(Err(err)) if err.is_fatal() => Err(err),
        _ => Ok(()),
    }
}

/// Sandbox errors as seen by the dispatch coordinator.
fn sandbox_error(participant: &ParticipantId, err: CollaboratorError) -> DomainError {
    match err {
        CollaboratorError::Timeout => {
            DomainError::DispatchTimeout(format!("{participant}: sandbox timed out"))
        }
        other => DomainError::DispatchFailure(format!("{participant}: {other}")),
    }
}
