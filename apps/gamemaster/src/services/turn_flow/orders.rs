//! Order collection and adjudication.

use std::collections::BTreeMap;

use time::OffsetDateTime;
use tracing::{error, info, warn};

use super::{keep_note, sandbox_error, CollectedOrders, TurnFlow};
use crate::collaborators::{AdjudicationRequest, TaskKind};
use crate::config::ResubmissionPolicy;
use crate::domain::orders::default_orders;
use crate::domain::{
    MessageName, Order, OrderPayload, OrderPhase, ParticipantId, PhaseLabel, Resolution, TurnEvent,
};
use crate::error::AppError;
use crate::errors::{DomainError, ErrorCode};
use crate::event_log::{Actor, EventBody, EventDraft, EventScope};
use crate::services::dispatch::Outcome;
use crate::services::router::RoundScope;

/// A logged order submission: the accepted message, or the orders that
/// were substituted.
enum Logged {
    Accepted(MessageName),
    Synthetic(Vec<Order>),
}

impl TurnFlow {
    pub(super) async fn run_order_collection(&mut self) -> Result<(), AppError> {
        self.collect_unless_settled(OrderPhase::Movement).await?;
        self.advance(TurnEvent::OrdersCollected)
    }

    pub(super) async fn run_adjudication(&mut self) -> Result<(), AppError> {
        let resolution = self.resolve(OrderPhase::Movement).await?;
        self.advance(TurnEvent::Adjudicated {
            dislodged: resolution.board.has_dislodgements(),
            adjustments_due: resolution.board.adjustments_due(),
        })
    }

    pub(super) async fn run_retreats(&mut self) -> Result<(), AppError> {
        self.collect_unless_settled(OrderPhase::Retreat).await?;
        let resolution = self.resolve(OrderPhase::Retreat).await?;
        self.advance(TurnEvent::RetreatsResolved {
            adjustments_due: resolution.board.adjustments_due(),
        })
    }

    pub(super) async fn run_adjustments(&mut self) -> Result<(), AppError> {
        self.collect_unless_settled(OrderPhase::Adjustment).await?;
        self.resolve(OrderPhase::Adjustment).await?;
        self.advance(TurnEvent::AdjustmentsResolved)
    }

    fn order_label(&self, phase: OrderPhase) -> PhaseLabel {
        self.game.position.label_for(phase.mailbox_kind())
    }

    /// Participants who owe orders in `phase`: everyone live for movement,
    /// only those with dislodged units for retreats, only those with builds
    /// or disbands due for adjustments.
    pub(super) fn expected_submitters(&self, phase: OrderPhase) -> Vec<ParticipantId> {
        let board = &self.game.board;
        self.game
            .roster
            .live_ids()
            .into_iter()
            .filter(|p| match phase {
                OrderPhase::Movement => true,
                OrderPhase::Retreat => board.dislodged_of(p).next().is_some(),
                OrderPhase::Adjustment => board.adjustment(p) != 0,
            })
            .collect()
    }

    /// On resume, skip collection if the result or every submission of the
    /// phase is already logged.
    async fn collect_unless_settled(&mut self, phase: OrderPhase) -> Result<(), AppError> {
        let label = self.order_label(phase);
        if self.pending.is_some()
            || self.collected.as_ref().is_some_and(|c| c.label == label)
        {
            return Ok(());
        }
        let logged = self.logged_submissions(label)?;
        if self
            .expected_submitters(phase)
            .iter()
            .all(|p| logged.contains_key(p))
        {
            return Ok(());
        }
        let orders = self.collect_orders(phase).await?;
        self.collected = Some(CollectedOrders { label, orders });
        Ok(())
    }

    /// Dispatch the order task to every expected submitter and settle one
    /// order set per participant.
    async fn collect_orders(
        &self,
        phase: OrderPhase,
    ) -> Result<BTreeMap<ParticipantId, Vec<Order>>, AppError> {
        let scope = self.round_scope()?;
        let expected = self.expected_submitters(phase);
        info!(
            game_id = %self.game.id,
            phase = %scope.label,
            participants = expected.len(),
            "Collecting orders"
        );

        let inbox_rounds = self.machine.negotiation_rounds();
        let mut units = Vec::with_capacity(expected.len());
        for participant in &expected {
            let inbox = self.negotiation_inbox(participant, inbox_rounds)?;
            let task = self.task_for(participant, TaskKind::for_orders(phase), &scope, inbox)?;
            let sandbox = self.collaborators.sandbox.clone();
            let router = self.router.clone();
            let unit_scope = scope.clone();
            let sender = participant.clone();
            units.push((participant.clone(), async move {
                let output = sandbox
                    .run(task)
                    .await
                    .map_err(|e| sandbox_error(&sender, e))?;
                // Participant messages are rejected outside negotiation; the
                // router reports them.
                for message in output.messages {
                    if let Err(err) = router.send(&unit_scope, &sender, message) {
                        if err.is_fatal() {
                            return Err(err);
                        }
                    }
                }
                keep_note(&router, &unit_scope, &sender, output.note)?;
                let Some(sealed) = output.orders else {
                    return Ok(false);
                };
                match router.submit_orders(&unit_scope, &sender, sealed) {
                    Ok(_) => Ok(true),
                    Err(err) if err.is_fatal() => Err(err),
                    Err(_) => Ok(false),
                }
            }));
        }

        let outcomes = self
            .dispatcher
            .dispatch(&scope.event_scope, units, self.game.config.dispatch_deadline())
            .await?;

        let mut orders = BTreeMap::new();
        for participant in expected {
            let settled = self
                .settle(&scope, phase, &participant, outcomes.get(&participant))
                .await?;
            orders.insert(participant, settled);
        }
        Ok(orders)
    }

    /// Pick the accepted submission for `participant` under the resubmission
    /// policy, or substitute defaults.
    async fn settle(
        &self,
        scope: &RoundScope,
        phase: OrderPhase,
        participant: &ParticipantId,
        outcome: Option<&Outcome<bool>>,
    ) -> Result<Vec<Order>, AppError> {
        let mut handles = self.router.submissions(participant, scope.label)?;
        if self.game.config.resubmission == ResubmissionPolicy::LastWins {
            handles.reverse();
        }

        let mut malformed = false;
        for handle in handles {
            match self.open_submission(participant, phase, scope.label, &handle.name).await? {
                Ok(orders) => {
                    self.log.append(EventDraft::by(
                        participant,
                        scope.event_scope.clone(),
                        EventBody::OrderSubmission {
                            participant: participant.clone(),
                            phase: scope.label,
                            synthetic: false,
                            message: Some(handle.name.clone()),
                            orders: Vec::new(),
                            reason: None,
                        },
                    ))?;
                    info!(
                        participant = %participant,
                        phase = %scope.label,
                        message = %handle.name,
                        orders = orders.len(),
                        "Orders accepted"
                    );
                    return Ok(orders);
                }
                Err(reason) => {
                    malformed = true;
                    let err = DomainError::MalformedSubmission(format!("{}: {reason}", handle.name));
                    warn!(participant = %participant, error = %err, "Malformed submission");
                    self.log.append(EventDraft::error(
                        Actor::Participant(participant.clone()),
                        scope.event_scope.clone(),
                        &err,
                    ))?;
                }
            }
        }

        let reason = match outcome {
            _ if malformed => ErrorCode::MalformedSubmission,
            Some(Outcome::TimedOut) => ErrorCode::DispatchTimeout,
            Some(Outcome::Failed(_)) => ErrorCode::DispatchFailure,
            // Ran to completion without a usable submission.
            Some(Outcome::Completed(_)) | None => ErrorCode::MalformedSubmission,
        };
        let defaults = default_orders(participant, phase, &self.game.board);
        self.log.append(EventDraft::system(
            scope.event_scope.clone(),
            EventBody::OrderSubmission {
                participant: participant.clone(),
                phase: scope.label,
                synthetic: true,
                message: None,
                orders: defaults.clone(),
                reason: Some(reason),
            },
        ))?;
        warn!(
            participant = %participant,
            phase = %scope.label,
            reason = %reason,
            orders = defaults.len(),
            "Substituted default orders"
        );
        Ok(defaults)
    }

    /// Decrypt and check one submission. The outer error is fatal; the inner
    /// one makes the submission malformed.
    async fn open_submission(
        &self,
        participant: &ParticipantId,
        phase: OrderPhase,
        label: PhaseLabel,
        name: &MessageName,
    ) -> Result<Result<Vec<Order>, String>, AppError> {
        let ciphertext = self.router.read(name)?;
        let plaintext = match self
            .collaborators
            .cipher
            .decrypt(&ciphertext, &self.collaborators.authority_secret)
            .await
        {
            Ok(plaintext) => plaintext,
            Err(e) => return Ok(Err(format!("cannot decrypt: {e}"))),
        };
        let payload = match OrderPayload::decode(&plaintext) {
            Ok(payload) => payload,
            Err(reason) => return Ok(Err(reason)),
        };
        if let Err(reason) = payload.check_scope(participant, label) {
            return Ok(Err(reason));
        }
        if let Err(reason) =
            self.collaborators
                .adjudicator
                .validate(participant, phase, &payload.orders, &self.game.board)
        {
            return Ok(Err(reason));
        }
        Ok(Ok(payload.orders))
    }

    /// Latest logged submission per participant in `label`.
    fn logged_submissions(
        &self,
        label: PhaseLabel,
    ) -> Result<BTreeMap<ParticipantId, Logged>, AppError> {
        let mut logged = BTreeMap::new();
        for event in self.log.events()? {
            if let EventBody::OrderSubmission {
                participant,
                phase,
                synthetic,
                message,
                orders,
                ..
            } = event.body
            {
                if phase != label {
                    continue;
                }
                let entry = match (synthetic, message) {
                    (false, Some(name)) => Logged::Accepted(name),
                    (true, _) => Logged::Synthetic(orders),
                    (false, None) => {
                        return Err(AppError::corrupt_log(format!(
                            "seq {}: accepted submission without a message",
                            event.seq
                        )))
                    }
                };
                logged.insert(participant, entry);
            }
        }
        Ok(logged)
    }

    /// Rebuild the settled order set of `phase` from the log, reopening
    /// accepted submissions from the mailbox.
    async fn orders_from_log(
        &self,
        phase: OrderPhase,
        label: PhaseLabel,
    ) -> Result<BTreeMap<ParticipantId, Vec<Order>>, AppError> {
        let mut orders = BTreeMap::new();
        for (participant, entry) in self.logged_submissions(label)? {
            let settled = match entry {
                Logged::Synthetic(orders) => orders,
                Logged::Accepted(name) => self
                    .open_submission(&participant, phase, label, &name)
                    .await?
                    .map_err(|reason| {
                        AppError::corrupt_log(format!("accepted submission {name} no longer opens: {reason}"))
                    })?,
            };
            orders.insert(participant, settled);
        }
        Ok(orders)
    }

    /// Adjudicate `phase`, or reuse the result already logged for it.
    async fn resolve(&mut self, phase: OrderPhase) -> Result<Resolution, AppError> {
        if let Some(resolution) = &self.pending {
            info!(game_id = %self.game.id, phase = %phase, "Reusing logged adjudication result");
            return Ok(resolution.clone());
        }

        let label = self.order_label(phase);
        let orders = match &self.collected {
            Some(collected) if collected.label == label => collected.orders.clone(),
            _ => self.orders_from_log(phase, label).await?,
        };
        let request = AdjudicationRequest {
            game_id: self.game.id.clone(),
            year: self.game.position.year,
            season: self.game.position.season,
            phase,
            board: self.game.board.clone(),
            orders,
        };

        let scope = EventScope::from(&self.game.position);
        let adjudicated = tokio::time::timeout(
            self.game.config.adjudicator_timeout(),
            self.collaborators.adjudicator.adjudicate(&request),
        )
        .await;
        let resolution = match adjudicated {
            Ok(Ok(resolution)) => resolution,
            Ok(Err(e)) => return Err(self.adjudication_fault(scope, e.to_string())?),
            Err(_) => return Err(self.adjudication_fault(scope, "adjudicator timed out".to_string())?),
        };

        let eliminated = self.game.eliminations_for(&resolution);
        self.log.append(EventDraft::system(
            scope,
            EventBody::AdjudicationResult {
                phase,
                resolution: resolution.clone(),
                eliminated: eliminated.clone(),
            },
        ))?;
        self.game.apply_resolution(&resolution, OffsetDateTime::now_utc());
        self.pending = Some(resolution.clone());
        self.collected = None;
        info!(
            game_id = %self.game.id,
            phase = %phase,
            eliminated = ?eliminated,
            stalemate = resolution.stalemate,
            "Adjudicated"
        );
        Ok(resolution)
    }

    /// Log an adjudicator failure. The phase is left as it was so the run
    /// can be resumed once the adjudicator is fixed.
    fn adjudication_fault(&self, scope: EventScope, detail: String) -> Result<AppError, AppError> {
        let err = DomainError::AdjudicationFault(detail);
        error!(game_id = %self.game.id, position = %self.game.position, error = %err, "Adjudication failed");
        self.log.append(EventDraft::error(Actor::System, scope, &err))?;
        Ok(err.into())
    }
}
