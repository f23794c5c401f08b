//! Message naming and handles.
//!
//! A stored message is identified by
//! `<sender>-to-<recipient>-<phase>-r<round>-<seq>`. Recipients discover
//! mail by listing that namespace; nothing else about a message is visible
//! without the recipient's key.

use std::fmt;
use std::str::FromStr;

use lazy_regex::regex_captures;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::participant::ParticipantId;
use crate::domain::phase::PhaseLabel;
use crate::errors::DomainError;

/// Sequence numbers are allocated per series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub sender: ParticipantId,
    pub recipient: ParticipantId,
    pub phase: PhaseLabel,
    pub round: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageName {
    pub sender: ParticipantId,
    pub recipient: ParticipantId,
    pub phase: PhaseLabel,
    pub round: u32,
    pub seq: u32,
}

impl MessageName {
    pub fn new(series: &SeriesKey, seq: u32) -> Self {
        Self {
            sender: series.sender.clone(),
            recipient: series.recipient.clone(),
            phase: series.phase,
            round: series.round,
            seq,
        }
    }

    pub fn series(&self) -> SeriesKey {
        SeriesKey {
            sender: self.sender.clone(),
            recipient: self.recipient.clone(),
            phase: self.phase,
            round: self.round,
        }
    }
}

impl fmt::Display for MessageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-to-{}-{}-r{}-{}",
            self.sender, self.recipient, self.phase, self.round, self.seq
        )
    }
}

impl FromStr for MessageName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || DomainError::invalid_address(format!("bad message name: {s:?}"));
        let (_, sender, recipient, phase, round, seq) = regex_captures!(
            r"^([A-Za-z]+)-to-([A-Za-z]+)-([A-Za-z]+_\d+_[A-Za-z]+)-r(\d+)-(\d+)$",
            s
        )
        .ok_or_else(bad)?;
        let round: u32 = round.parse().map_err(|_| bad())?;
        let seq: u32 = seq.parse().map_err(|_| bad())?;
        if round == 0 || seq == 0 {
            return Err(bad());
        }
        Ok(Self {
            sender: sender.parse()?,
            recipient: recipient.parse()?,
            phase: phase.parse()?,
            round,
            seq,
        })
    }
}

impl TryFrom<String> for MessageName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MessageName> for String {
    fn from(name: MessageName) -> Self {
        name.to_string()
    }
}

/// What a listing returns. The ciphertext is fetched separately with `read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHandle {
    pub name: MessageName,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub size: u64,
}

impl MessageName {
    /// A participant's message to itself: a private note.
    pub fn is_note(&self) -> bool {
        self.sender == self.recipient
    }
}

/// Ordering used by every listing: phase and round, then sequence, then
/// sender so that different series with equal sequence numbers still list
/// deterministically.
pub fn sort_handles(handles: &mut [MessageHandle]) {
    handles.sort_by(|a, b| {
        let (a, b) = (&a.name, &b.name);
        (a.phase, a.round, a.seq, &a.sender, &a.recipient)
            .cmp(&(b.phase, b.round, b.seq, &b.sender, &b.recipient))
    });
}

/// Ciphertext plus its declared address, before a sequence number is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub sender: ParticipantId,
    pub recipient: ParticipantId,
    pub phase: PhaseLabel,
    pub round: u32,
    pub ciphertext: Vec<u8>,
}

impl MessageDraft {
    pub fn series(&self) -> SeriesKey {
        SeriesKey {
            sender: self.sender.clone(),
            recipient: self.recipient.clone(),
            phase: self.phase,
            round: self.round,
        }
    }

    /// blake3 digest of the ciphertext, hex encoded. Logged instead of the payload.
    pub fn digest(&self) -> String {
        blake3::hash(&self.ciphertext).to_hex().to_string()
    }
}
