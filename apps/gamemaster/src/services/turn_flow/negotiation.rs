use tracing::{debug, info, warn};

use super::{keep_note, sandbox_error, TurnFlow};
use crate::collaborators::TaskKind;
use crate::domain::TurnEvent;
use crate::error::AppError;

impl TurnFlow {
    /// One negotiation round. A participant that fails or times out just
    /// sends nothing this round.
    pub(super) async fn run_negotiation_round(&mut self, round: u32) -> Result<(), AppError> {
        let scope = self.round_scope()?;
        let live = self.game.roster.live_ids();
        info!(
            game_id = %self.game.id,
            phase = %scope.label,
            round,
            participants = live.len(),
            "Negotiation round"
        );

        let mut units = Vec::with_capacity(live.len());
        for participant in live {
            let inbox = self.negotiation_inbox(&participant, round)?;
            let task = self.task_for(&participant, TaskKind::Negotiate, &scope, inbox)?;
            let sandbox = self.collaborators.sandbox.clone();
            let router = self.router.clone();
            let unit_scope = scope.clone();
            let sender = participant.clone();
            units.push((participant, async move {
                let output = sandbox
                    .run(task)
                    .await
                    .map_err(|e| sandbox_error(&sender, e))?;
                if output.orders.is_some() {
                    warn!(participant = %sender, "Ignoring orders sent during negotiation");
                }
                keep_note(&router, &unit_scope, &sender, output.note)?;
                let mut delivered = 0usize;
                for message in output.messages {
                    match router.send(&unit_scope, &sender, message) {
                        Ok(_) => delivered += 1,
                        Err(err) if err.is_fatal() => return Err(err),
                        // Already reported to the sender by the router.
                        Err(_) => {}
                    }
                }
                Ok(delivered)
            }));
        }

        let outcomes = self
            .dispatcher
            .dispatch(&scope.event_scope, units, self.game.config.dispatch_deadline())
            .await?;
        let delivered: usize = outcomes.values().filter_map(|o| o.completed()).sum();
        debug!(game_id = %self.game.id, round, delivered, "Negotiation round closed");

        self.advance(TurnEvent::RoundClosed)
    }
}
