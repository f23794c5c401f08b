//! Builds an in-memory game wired to the fakes.

use std::sync::Arc;

use gamemaster::config::GameConfig;
use gamemaster::domain::{GameId, KeyRef, Roster};
use gamemaster::event_log::LogEvent;
use gamemaster::services::{Collaborators, NewGame, Storage, TurnFlow};

use super::adjudicator::FakeAdjudicator;
use super::cipher::PlainCipher;
use super::fixtures::{opening_board, seven_powers};
use super::sandbox::ScriptedSandbox;

pub struct Harness {
    pub flow: TurnFlow,
    pub sandbox: Arc<ScriptedSandbox>,
    pub adjudicator: Arc<FakeAdjudicator>,
    pub storage: Storage,
}

impl Harness {
    pub fn events(&self) -> Vec<LogEvent> {
        self.storage.log.events().expect("read log")
    }

    pub fn collaborators(&self) -> Collaborators {
        collaborators(self.sandbox.clone(), self.adjudicator.clone())
    }
}

/// One-second deadlines; tests that hit them run on a paused clock.
pub fn quick_config(negotiation_rounds: u32) -> GameConfig {
    GameConfig {
        negotiation_rounds,
        dispatch_deadline_secs: 1,
        dispatch_grace_ms: 100,
        adjudicator_timeout_secs: 1,
        ..GameConfig::default()
    }
}

pub fn collaborators(sandbox: Arc<ScriptedSandbox>, adjudicator: Arc<FakeAdjudicator>) -> Collaborators {
    Collaborators {
        sandbox,
        adjudicator,
        cipher: Arc::new(PlainCipher),
        authority_secret: KeyRef::new("authority-home"),
    }
}

pub async fn harness(config: GameConfig) -> Harness {
    harness_with(config, seven_powers(), Storage::in_memory()).await
}

pub async fn harness_with(config: GameConfig, roster: Roster, storage: Storage) -> Harness {
    let sandbox = ScriptedSandbox::new();
    let adjudicator = FakeAdjudicator::new(opening_board());
    let flow = TurnFlow::create(
        NewGame {
            id: GameId::new(test_support::unique_game_id("game")).expect("valid id"),
            roster,
            config,
            authority_key: KeyRef::new("GM-key"),
            board: None,
        },
        storage.clone(),
        collaborators(sandbox.clone(), adjudicator.clone()),
    )
    .await
    .expect("create game");
    Harness {
        flow,
        sandbox,
        adjudicator,
        storage,
    }
}
