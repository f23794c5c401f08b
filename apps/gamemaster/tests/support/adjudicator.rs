//! Adjudicator fake: echoes the board unless told otherwise.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use gamemaster::collaborators::{AdjudicationRequest, Adjudicator, CollaboratorError};
use gamemaster::domain::{Board, Resolution, Roster};
use parking_lot::Mutex;

pub enum Ruling {
    /// Board unchanged apart from clearing dislodgements and adjustments.
    Echo,
    Resolve(Resolution),
    Fail(String),
}

pub struct FakeAdjudicator {
    opening: Board,
    rulings: Mutex<VecDeque<Ruling>>,
    requests: Mutex<Vec<AdjudicationRequest>>,
}

impl FakeAdjudicator {
    pub fn new(opening: Board) -> Arc<Self> {
        Arc::new(Self {
            opening,
            rulings: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Queue the answer for the next adjudication.
    pub fn push(&self, ruling: Ruling) {
        self.rulings.lock().push_back(ruling);
    }

    pub fn requests(&self) -> Vec<AdjudicationRequest> {
        self.requests.lock().clone()
    }
}

pub fn settled(board: &Board) -> Board {
    let mut board = board.clone();
    board.dislodged.clear();
    board.adjustments.clear();
    board
}

#[async_trait]
impl Adjudicator for FakeAdjudicator {
    async fn initial_board(&self, _roster: &Roster) -> Result<Board, CollaboratorError> {
        Ok(self.opening.clone())
    }

    async fn adjudicate(&self, request: &AdjudicationRequest) -> Result<Resolution, CollaboratorError> {
        self.requests.lock().push(request.clone());
        let ruling = self.rulings.lock().pop_front().unwrap_or(Ruling::Echo);
        match ruling {
            Ruling::Echo => Ok(Resolution {
                board: settled(&request.board),
                ..Resolution::default()
            }),
            Ruling::Resolve(resolution) => Ok(resolution),
            Ruling::Fail(reason) => Err(CollaboratorError::Failed(reason)),
        }
    }
}
