//! Turn positions and phase labels.

use std::fmt;
use std::str::FromStr;

use lazy_regex::regex_captures;
use serde::{Deserialize, Serialize};

use crate::domain::participant::ParticipantId;
use crate::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Fall,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Fall => "Fall",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a game ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    Winner { participant: ParticipantId },
    Stalemate,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Winner { participant } => write!(f, "winner={participant}"),
            Termination::Stalemate => f.write_str("stalemate"),
        }
    }
}

/// State within a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Phase {
    Negotiation { round: u32 },
    OrderCollection,
    Adjudication,
    Retreat,
    Adjustment,
    WinCheck,
    Terminated { reason: Termination },
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Negotiation { round } => write!(f, "Negotiation(r{round})"),
            Phase::OrderCollection => f.write_str("OrderCollection"),
            Phase::Adjudication => f.write_str("Adjudication"),
            Phase::Retreat => f.write_str("Retreat"),
            Phase::Adjustment => f.write_str("Adjustment"),
            Phase::WinCheck => f.write_str("WinCheck"),
            Phase::Terminated { reason } => write!(f, "Terminated({reason})"),
        }
    }
}

/// Mailbox namespace of a phase. Only phases that exchange messages have one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PhaseKind {
    Negotiation,
    Orders,
    Retreat,
    Adjustment,
}

impl PhaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Negotiation => "Negotiation",
            PhaseKind::Orders => "Orders",
            PhaseKind::Retreat => "Retreat",
            PhaseKind::Adjustment => "Adjustment",
        }
    }

    /// Phases in which participants submit orders to the authority.
    pub fn takes_orders(&self) -> bool {
        !matches!(self, PhaseKind::Negotiation)
    }
}

/// `<Season>_<year>_<Kind>`, the phase token inside message names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhaseLabel {
    pub year: u16,
    pub season: Season,
    pub kind: PhaseKind,
}

impl PhaseLabel {
    pub fn new(year: u16, season: Season, kind: PhaseKind) -> Self {
        Self { year, season, kind }
    }
}

impl fmt::Display for PhaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.season, self.year, self.kind.as_str())
    }
}

impl FromStr for PhaseLabel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || DomainError::invalid_address(format!("bad phase label: {s:?}"));
        let (_, season, year, kind) =
            regex_captures!(r"^(Spring|Fall)_(\d{1,5})_([A-Za-z]+)$", s).ok_or_else(bad)?;
        let season = match season {
            "Spring" => Season::Spring,
            _ => Season::Fall,
        };
        let year: u16 = year.parse().map_err(|_| bad())?;
        let kind = match kind {
            "Negotiation" => PhaseKind::Negotiation,
            "Orders" => PhaseKind::Orders,
            "Retreat" => PhaseKind::Retreat,
            "Adjustment" => PhaseKind::Adjustment,
            _ => return Err(bad()),
        };
        Ok(Self { year, season, kind })
    }
}

impl TryFrom<String> for PhaseLabel {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PhaseLabel> for String {
    fn from(label: PhaseLabel) -> Self {
        label.to_string()
    }
}

/// Where the game is: season, year and state within the turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnPosition {
    pub year: u16,
    pub season: Season,
    pub phase: Phase,
}

impl TurnPosition {
    pub fn new(year: u16, season: Season, phase: Phase) -> Self {
        Self {
            year,
            season,
            phase,
        }
    }

    /// Current round. Negotiation counts rounds; order phases have one
    /// implicit round; everything else has none.
    pub fn round(&self) -> Option<u32> {
        match self.phase {
            Phase::Negotiation { round } => Some(round),
            Phase::OrderCollection | Phase::Retreat | Phase::Adjustment => Some(1),
            _ => None,
        }
    }

    pub fn mailbox_kind(&self) -> Option<PhaseKind> {
        match self.phase {
            Phase::Negotiation { .. } => Some(PhaseKind::Negotiation),
            Phase::OrderCollection => Some(PhaseKind::Orders),
            Phase::Retreat => Some(PhaseKind::Retreat),
            Phase::Adjustment => Some(PhaseKind::Adjustment),
            _ => None,
        }
    }

    /// Mailbox label of the current phase, if it exchanges messages.
    pub fn label(&self) -> Option<PhaseLabel> {
        self.mailbox_kind()
            .map(|kind| PhaseLabel::new(self.year, self.season, kind))
    }

    pub fn label_for(&self, kind: PhaseKind) -> PhaseLabel {
        PhaseLabel::new(self.year, self.season, kind)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::Terminated { .. })
    }

    pub fn same_turn(&self, other: &TurnPosition) -> bool {
        self.year == other.year && self.season == other.season
    }
}

impl fmt::Display for TurnPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.season, self.year, self.phase)
    }
}
