//! Participants, their key references and the ordered roster.

use std::fmt;
use std::str::FromStr;

use lazy_regex::regex_is_match;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Reserved id of the adjudication authority. Order submissions are
/// addressed here; no participant may take it.
pub const AUTHORITY_ID: &str = "GM";

/// Stable participant id (one per power). Alphabetic only so it can sit
/// between the `-` separators of a message name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        if !regex_is_match!(r"^[A-Za-z]+$", &raw) {
            return Err(DomainError::config(format!(
                "participant id must be alphabetic: {raw:?}"
            )));
        }
        Ok(Self(raw))
    }

    pub fn authority() -> Self {
        Self(AUTHORITY_ID.to_string())
    }

    pub fn is_authority(&self) -> bool {
        self.0 == AUTHORITY_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParticipantId> for String {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}

impl FromStr for ParticipantId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to key material (fingerprint, keyring path, ...).
/// Only ever handed to the cipher collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyRef(String);

impl KeyRef {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    Alive,
    Eliminated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub key: KeyRef,
    pub liveness: Liveness,
}

impl Participant {
    pub fn new(id: ParticipantId, key: KeyRef) -> Self {
        Self {
            id,
            key,
            liveness: Liveness::Alive,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.liveness == Liveness::Alive
    }
}

/// Ordered roster. Order is fixed at creation and used wherever a
/// deterministic participant order is needed (event logging, tie-breaks).
/// Eliminated participants stay so old messages remain addressable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Participant>", into = "Vec<Participant>")]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    pub fn new(participants: Vec<Participant>) -> Result<Self, DomainError> {
        if participants.is_empty() {
            return Err(DomainError::config("roster is empty"));
        }
        for (idx, p) in participants.iter().enumerate() {
            if p.id.is_authority() {
                return Err(DomainError::config(format!(
                    "participant id {AUTHORITY_ID} is reserved for the adjudication authority"
                )));
            }
            if participants[..idx].iter().any(|q| q.id == p.id) {
                return Err(DomainError::config(format!(
                    "duplicate participant id {}",
                    p.id
                )));
            }
        }
        Ok(Self { participants })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.get(id).is_some()
    }

    pub fn is_live(&self, id: &ParticipantId) -> bool {
        self.get(id).is_some_and(Participant::is_alive)
    }

    /// Live participant ids in roster order.
    pub fn live_ids(&self) -> Vec<ParticipantId> {
        self.participants
            .iter()
            .filter(|p| p.is_alive())
            .map(|p| p.id.clone())
            .collect()
    }

    /// Mark a participant eliminated. Returns true if it was alive.
    pub fn eliminate(&mut self, id: &ParticipantId) -> bool {
        match self.participants.iter_mut().find(|p| &p.id == id) {
            Some(p) if p.is_alive() => {
                p.liveness = Liveness::Eliminated;
                true
            }
            _ => false,
        }
    }
}

impl TryFrom<Vec<Participant>> for Roster {
    type Error = DomainError;

    fn try_from(value: Vec<Participant>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Roster> for Vec<Participant> {
    fn from(roster: Roster) -> Self {
        roster.participants
    }
}
