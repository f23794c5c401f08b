//! Board snapshot as reported by the adjudicator.
//!
//! The game master never interprets rules; it carries the board so it can
//! build default orders, brief agents, and check the win threshold.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::participant::ParticipantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    Army,
    Fleet,
}

impl UnitKind {
    pub fn abbrev(&self) -> &'static str {
        match self {
            UnitKind::Army => "A",
            UnitKind::Fleet => "F",
        }
    }

    /// Accepts `A`/`F` or the full word, any case.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "a" | "army" => Some(UnitKind::Army),
            "f" | "fleet" => Some(UnitKind::Fleet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    #[serde(rename = "type")]
    pub kind: UnitKind,
    pub location: String,
}

impl Unit {
    pub fn new(kind: UnitKind, location: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
        }
    }

    /// Location without a coast suffix: `St Petersburg (south coast)` is
    /// `St Petersburg`.
    pub fn base_location(&self) -> &str {
        base_location(&self.location)
    }

    pub fn matches(&self, kind: UnitKind, location: &str) -> bool {
        self.kind == kind && self.base_location().eq_ignore_ascii_case(base_location(location))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.abbrev(), self.location)
    }
}

pub fn base_location(location: &str) -> &str {
    match location.find('(') {
        Some(idx) => location[..idx].trim_end(),
        None => location.trim(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dislodgement {
    pub participant: ParticipantId,
    pub unit: Unit,
    #[serde(default)]
    pub retreats: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    #[serde(default)]
    pub units: BTreeMap<ParticipantId, Vec<Unit>>,
    #[serde(default)]
    pub dislodged: Vec<Dislodgement>,
    /// Resource (supply centre) name to owner.
    #[serde(default)]
    pub ownership: BTreeMap<String, ParticipantId>,
    /// Controlled-resource count per participant, straight from the adjudicator.
    #[serde(default)]
    pub resource_counts: BTreeMap<ParticipantId, u32>,
    /// Builds (positive) or disbands (negative) due this adjustment.
    #[serde(default)]
    pub adjustments: BTreeMap<ParticipantId, i32>,
}

impl Board {
    pub fn units_of(&self, participant: &ParticipantId) -> &[Unit] {
        self.units
            .get(participant)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn dislodged_of<'a>(
        &'a self,
        participant: &'a ParticipantId,
    ) -> impl Iterator<Item = &'a Unit> + 'a {
        self.dislodged
            .iter()
            .filter(move |d| &d.participant == participant)
            .map(|d| &d.unit)
    }

    pub fn resource_count(&self, participant: &ParticipantId) -> u32 {
        self.resource_counts.get(participant).copied().unwrap_or(0)
    }

    pub fn adjustment(&self, participant: &ParticipantId) -> i32 {
        self.adjustments.get(participant).copied().unwrap_or(0)
    }

    pub fn has_dislodgements(&self) -> bool {
        !self.dislodged.is_empty()
    }

    pub fn adjustments_due(&self) -> bool {
        self.adjustments.values().any(|d| *d != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> ParticipantId {
        s.parse().unwrap()
    }

    #[test]
    fn coast_is_ignored_for_matching() {
        let fleet = Unit::new(UnitKind::Fleet, "St Petersburg (south coast)");
        assert_eq!(fleet.base_location(), "St Petersburg");
        assert!(fleet.matches(UnitKind::Fleet, "St Petersburg"));
        assert!(fleet.matches(UnitKind::Fleet, "st petersburg (north coast)"));
        assert!(!fleet.matches(UnitKind::Army, "St Petersburg"));
    }

    #[test]
    fn accessors_default_to_empty() {
        let mut board = Board::default();
        assert!(board.units_of(&pid("France")).is_empty());
        assert_eq!(board.resource_count(&pid("France")), 0);
        assert!(!board.adjustments_due());

        board.adjustments.insert(pid("France"), 0);
        assert!(!board.adjustments_due());
        board.adjustments.insert(pid("Italy"), -1);
        assert!(board.adjustments_due());
    }

    #[test]
    fn unit_kind_parse() {
        assert_eq!(UnitKind::parse("a"), Some(UnitKind::Army));
        assert_eq!(UnitKind::parse("Fleet"), Some(UnitKind::Fleet));
        assert_eq!(UnitKind::parse("X"), None);
    }

    #[test]
    fn unit_serializes_with_type_key() {
        let json = serde_json::to_value(Unit::new(UnitKind::Army, "Paris")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "Army", "location": "Paris"}));
    }
}
