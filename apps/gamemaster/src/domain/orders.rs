//! Order strings, the submission payload, default orders and the default
//! validation applied at the authority boundary.
//!
//! Validation here is syntactic plus ownership; move legality belongs to
//! the adjudicator.

use std::fmt;

use lazy_regex::regex_captures;
use serde::{Deserialize, Serialize};

use crate::domain::board::{Board, Unit, UnitKind};
use crate::domain::participant::ParticipantId;
use crate::domain::phase::{PhaseKind, PhaseLabel};

/// One order as written by an agent, e.g. `A Paris - Burgundy`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Order(String);

impl Order {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn hold(unit: &Unit) -> Self {
        Self(format!("{} {} H", unit.kind.abbrev(), unit.location))
    }

    pub fn disband(unit: &Unit) -> Self {
        Self(format!("{} {} Disband", unit.kind.abbrev(), unit.location))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which kind of orders a phase accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPhase {
    Movement,
    Retreat,
    Adjustment,
}

impl OrderPhase {
    pub fn mailbox_kind(&self) -> PhaseKind {
        match self {
            OrderPhase::Movement => PhaseKind::Orders,
            OrderPhase::Retreat => PhaseKind::Retreat,
            OrderPhase::Adjustment => PhaseKind::Adjustment,
        }
    }

    pub fn from_kind(kind: PhaseKind) -> Option<Self> {
        match kind {
            PhaseKind::Orders => Some(OrderPhase::Movement),
            PhaseKind::Retreat => Some(OrderPhase::Retreat),
            PhaseKind::Adjustment => Some(OrderPhase::Adjustment),
            PhaseKind::Negotiation => None,
        }
    }
}

impl fmt::Display for OrderPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderPhase::Movement => "movement",
            OrderPhase::Retreat => "retreat",
            OrderPhase::Adjustment => "adjustment",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRef {
    pub kind: UnitKind,
    pub location: String,
    pub coast: Option<String>,
}

impl UnitRef {
    fn from_parts(kind: &str, location: &str, coast: &str) -> Option<Self> {
        Some(Self {
            kind: UnitKind::parse(kind)?,
            location: location.trim().to_string(),
            coast: (!coast.is_empty()).then(|| coast.trim().to_string()),
        })
    }

    fn is(&self, unit: &Unit) -> bool {
        unit.matches(self.kind, &self.location)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedOrder {
    Hold {
        unit: UnitRef,
    },
    Move {
        unit: UnitRef,
        destination: String,
    },
    SupportHold {
        unit: UnitRef,
        supported: UnitRef,
    },
    SupportMove {
        unit: UnitRef,
        supported: UnitRef,
        destination: String,
    },
    Convoy {
        unit: UnitRef,
        convoyed: UnitRef,
        destination: String,
    },
    RetreatDisband {
        unit: UnitRef,
    },
    Build {
        unit: UnitRef,
    },
    Disband {
        unit: UnitRef,
    },
    Waive,
}

impl ParsedOrder {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParsedOrder::Hold { .. } => "hold",
            ParsedOrder::Move { .. } => "move",
            ParsedOrder::SupportHold { .. } => "support_hold",
            ParsedOrder::SupportMove { .. } => "support_move",
            ParsedOrder::Convoy { .. } => "convoy",
            ParsedOrder::RetreatDisband { .. } => "retreat_disband",
            ParsedOrder::Build { .. } => "build",
            ParsedOrder::Disband { .. } => "disband",
            ParsedOrder::Waive => "waive",
        }
    }

    fn allowed_in(&self, phase: OrderPhase) -> bool {
        match phase {
            OrderPhase::Movement => matches!(
                self,
                ParsedOrder::Hold { .. }
                    | ParsedOrder::Move { .. }
                    | ParsedOrder::SupportHold { .. }
                    | ParsedOrder::SupportMove { .. }
                    | ParsedOrder::Convoy { .. }
            ),
            OrderPhase::Retreat => matches!(
                self,
                ParsedOrder::Move { .. } | ParsedOrder::RetreatDisband { .. }
            ),
            OrderPhase::Adjustment => matches!(
                self,
                ParsedOrder::Build { .. } | ParsedOrder::Disband { .. } | ParsedOrder::Waive
            ),
        }
    }

    /// Unit that must belong to the submitting participant.
    fn acting_unit(&self) -> Option<&UnitRef> {
        match self {
            ParsedOrder::Hold { unit }
            | ParsedOrder::Move { unit, .. }
            | ParsedOrder::SupportHold { unit, .. }
            | ParsedOrder::SupportMove { unit, .. }
            | ParsedOrder::Convoy { unit, .. }
            | ParsedOrder::RetreatDisband { unit } => Some(unit),
            ParsedOrder::Build { .. } | ParsedOrder::Disband { .. } | ParsedOrder::Waive => None,
        }
    }
}

/// Parse one order. `None` if it matches no known form.
///
/// Support-hold is tried after support-move and before plain hold so that
/// `A Burgundy S A Paris H` is not read as a hold.
pub fn parse_order(raw: &str) -> Option<ParsedOrder> {
    let s = raw.trim();

    if regex_captures!(r"^Waive$"i, s).is_some() {
        return Some(ParsedOrder::Waive);
    }
    if let Some((_, k, loc, coast)) = regex_captures!(
        r"^Build\s+([AF])\s+([A-Za-z][A-Za-z .\-]+?)(?:\s*\(([^)]+)\))?$"i,
        s
    ) {
        return Some(ParsedOrder::Build {
            unit: UnitRef::from_parts(k, loc, coast)?,
        });
    }
    if let Some((_, k, loc, coast)) = regex_captures!(
        r"^(?:Disband|Remove)\s+([AF])\s+([A-Za-z][A-Za-z .\-]+?)(?:\s*\(([^)]+)\))?$"i,
        s
    ) {
        return Some(ParsedOrder::Disband {
            unit: UnitRef::from_parts(k, loc, coast)?,
        });
    }
    if let Some((_, k, loc, coast)) = regex_captures!(
        r"^([AF])\s+([A-Za-z][A-Za-z .\-]+?)(?:\s*\(([^)]+)\))?\s+(?:Disband|D)$"i,
        s
    ) {
        return Some(ParsedOrder::RetreatDisband {
            unit: UnitRef::from_parts(k, loc, coast)?,
        });
    }
    if let Some((_, k, loc, coast, sk, sloc, scoast, dest, _)) = regex_captures!(
        r"^([AF])\s+([A-Za-z][A-Za-z .\-]+?)(?:\s*\(([^)]+)\))?\s+(?:S|Support)\s+([AF])\s+([A-Za-z][A-Za-z .\-]+?)(?:\s*\(([^)]+)\))?\s+[-–—]\s+([A-Za-z][A-Za-z .\-]+?)(?:\s*\(([^)]+)\))?$"i,
        s
    ) {
        return Some(ParsedOrder::SupportMove {
            unit: UnitRef::from_parts(k, loc, coast)?,
            supported: UnitRef::from_parts(sk, sloc, scoast)?,
            destination: dest.trim().to_string(),
        });
    }
    if let Some((_, k, loc, coast, ck, cloc, ccoast, dest, _)) = regex_captures!(
        r"^([AF])\s+([A-Za-z][A-Za-z .\-]+?)(?:\s*\(([^)]+)\))?\s+(?:C|Convoy)\s+([AF])\s+([A-Za-z][A-Za-z .\-]+?)(?:\s*\(([^)]+)\))?\s+[-–—]\s+([A-Za-z][A-Za-z .\-]+?)(?:\s*\(([^)]+)\))?$"i,
        s
    ) {
        return Some(ParsedOrder::Convoy {
            unit: UnitRef::from_parts(k, loc, coast)?,
            convoyed: UnitRef::from_parts(ck, cloc, ccoast)?,
            destination: dest.trim().to_string(),
        });
    }
    if let Some((_, k, loc, coast, sk, sloc, scoast)) = regex_captures!(
        r"^([AF])\s+([A-Za-z][A-Za-z .\-]+?)(?:\s*\(([^)]+)\))?\s+(?:S|Support)\s+([AF])\s+([A-Za-z][A-Za-z .\-]+?)(?:\s*\(([^)]+)\))?\s*(?:H|Hold)?$"i,
        s
    ) {
        return Some(ParsedOrder::SupportHold {
            unit: UnitRef::from_parts(k, loc, coast)?,
            supported: UnitRef::from_parts(sk, sloc, scoast)?,
        });
    }
    if let Some((_, k, loc, coast, dest, _)) = regex_captures!(
        r"^([AF])\s+([A-Za-z][A-Za-z .\-]+?)(?:\s*\(([^)]+)\))?\s+[-–—]\s+([A-Za-z][A-Za-z .\-]+?)(?:\s*\(([^)]+)\))?$"i,
        s
    ) {
        return Some(ParsedOrder::Move {
            unit: UnitRef::from_parts(k, loc, coast)?,
            destination: dest.trim().to_string(),
        });
    }
    if let Some((_, k, loc, coast)) = regex_captures!(
        r"^([AF])\s+([A-Za-z][A-Za-z .\-]+?)(?:\s*\(([^)]+)\))?\s+(?:H|Hold)$"i,
        s
    ) {
        return Some(ParsedOrder::Hold {
            unit: UnitRef::from_parts(k, loc, coast)?,
        });
    }
    None
}

/// Validate one order for `participant` in `phase` against `board`.
pub fn validate_order(
    raw: &Order,
    participant: &ParticipantId,
    phase: OrderPhase,
    board: &Board,
) -> Result<ParsedOrder, String> {
    let parsed =
        parse_order(raw.as_str()).ok_or_else(|| format!("cannot parse order: '{raw}'"))?;
    if !parsed.allowed_in(phase) {
        return Err(format!(
            "order type '{}' is not valid in the {phase} phase: '{raw}'",
            parsed.type_name()
        ));
    }
    if let Some(unit) = parsed.acting_unit() {
        let owned = match phase {
            OrderPhase::Retreat => board.dislodged_of(participant).any(|u| unit.is(u)),
            _ => board.units_of(participant).iter().any(|u| unit.is(u)),
        };
        if !owned {
            return Err(match phase {
                OrderPhase::Retreat => format!(
                    "{participant} has no dislodged {} {}: '{raw}'",
                    unit.kind.abbrev(),
                    unit.location
                ),
                _ => format!(
                    "{participant} does not control {} {}: '{raw}'",
                    unit.kind.abbrev(),
                    unit.location
                ),
            });
        }
    }
    Ok(parsed)
}

/// All-or-nothing: the first invalid order rejects the whole set.
pub fn validate_orders(
    orders: &[Order],
    participant: &ParticipantId,
    phase: OrderPhase,
    board: &Board,
) -> Result<(), String> {
    for order in orders {
        validate_order(order, participant, phase, board)?;
    }
    Ok(())
}

/// Orders substituted when a participant submits nothing usable.
pub fn default_orders(participant: &ParticipantId, phase: OrderPhase, board: &Board) -> Vec<Order> {
    match phase {
        OrderPhase::Movement => board.units_of(participant).iter().map(Order::hold).collect(),
        OrderPhase::Retreat => board.dislodged_of(participant).map(Order::disband).collect(),
        OrderPhase::Adjustment => Vec::new(),
    }
}

/// Plaintext of an order submission, encrypted to the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub power: ParticipantId,
    pub year: u16,
    pub phase: PhaseLabel,
    pub orders: Vec<Order>,
}

impl OrderPayload {
    pub fn decode(plaintext: &[u8]) -> Result<Self, String> {
        serde_json::from_slice(plaintext).map_err(|e| format!("order payload is not valid JSON: {e}"))
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// A payload must name the submitter and the phase it was routed in.
    pub fn check_scope(&self, sender: &ParticipantId, label: PhaseLabel) -> Result<(), String> {
        if &self.power != sender {
            return Err(format!(
                "payload names power {} but was sent by {sender}",
                self.power
            ));
        }
        if self.year != label.year || self.phase != label {
            return Err(format!(
                "payload is for {} ({}) but was submitted in {label}",
                self.phase, self.year
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::board::Dislodgement;
    use crate::domain::phase::Season;

    fn pid(s: &str) -> ParticipantId {
        s.parse().unwrap()
    }

    fn board() -> Board {
        let mut board = Board::default();
        board.units.insert(
            pid("France"),
            vec![
                Unit::new(UnitKind::Army, "Paris"),
                Unit::new(UnitKind::Army, "Marseilles"),
                Unit::new(UnitKind::Fleet, "Brest"),
            ],
        );
        board.units.insert(pid("Russia"), vec![Unit::new(UnitKind::Fleet, "St Petersburg (south coast)")]);
        board.dislodged.push(Dislodgement {
            participant: pid("Russia"),
            unit: Unit::new(UnitKind::Army, "Warsaw"),
            retreats: vec!["Livonia".into()],
        });
        board
    }

    #[test]
    fn parses_every_order_form() {
        let cases = [
            ("A Paris - Burgundy", "move"),
            ("A Paris H", "hold"),
            ("A Paris Hold", "hold"),
            ("A Marseilles S A Paris - Burgundy", "support_move"),
            ("A Burgundy S A Paris H", "support_hold"),
            ("A Munich S A Berlin", "support_hold"),
            ("F North Sea C A London - Belgium", "convoy"),
            ("A Munich Disband", "retreat_disband"),
            ("Build A Paris", "build"),
            ("Build F St Petersburg (north coast)", "build"),
            ("Disband A Paris", "disband"),
            ("Remove F Brest", "disband"),
            ("waive", "waive"),
            ("F Mid-Atlantic Ocean - Spain (north coast)", "move"),
            ("a paris — burgundy", "move"),
        ];
        for (raw, expected) in cases {
            let parsed = parse_order(raw).unwrap_or_else(|| panic!("{raw} did not parse"));
            assert_eq!(parsed.type_name(), expected, "{raw}");
        }
    }

    #[test]
    fn rejects_garbage() {
        for raw in ["", "Paris - Burgundy", "A Paris-Burgundy", "X Paris H", "Build Paris"] {
            assert!(parse_order(raw).is_none(), "{raw}");
        }
    }

    #[test]
    fn coast_is_captured_separately() {
        match parse_order("Build F St Petersburg (north coast)") {
            Some(ParsedOrder::Build { unit }) => {
                assert_eq!(unit.location, "St Petersburg");
                assert_eq!(unit.coast.as_deref(), Some("north coast"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ownership_is_checked() {
        let b = board();
        let france = pid("France");
        assert!(validate_order(&Order::new("A Paris - Burgundy"), &france, OrderPhase::Movement, &b).is_ok());
        let err = validate_order(&Order::new("A Berlin - Kiel"), &france, OrderPhase::Movement, &b).unwrap_err();
        assert!(err.contains("does not control"));
        assert!(validate_order(
            &Order::new("F St Petersburg - Gulf of Bothnia"),
            &pid("Russia"),
            OrderPhase::Movement,
            &b
        )
        .is_ok());
    }

    #[test]
    fn phase_type_is_checked() {
        let b = board();
        let err = validate_order(&Order::new("Build A Paris"), &pid("France"), OrderPhase::Movement, &b).unwrap_err();
        assert!(err.contains("not valid in the movement phase"));
        assert!(validate_order(&Order::new("A Paris H"), &pid("France"), OrderPhase::Retreat, &b).is_err());
    }

    #[test]
    fn retreats_must_name_dislodged_units() {
        let b = board();
        let russia = pid("Russia");
        assert!(validate_order(&Order::new("A Warsaw - Livonia"), &russia, OrderPhase::Retreat, &b).is_ok());
        assert!(validate_order(&Order::new("A Warsaw Disband"), &russia, OrderPhase::Retreat, &b).is_ok());
        let err = validate_order(&Order::new("A Moscow Disband"), &russia, OrderPhase::Retreat, &b).unwrap_err();
        assert!(err.contains("no dislodged"));
    }

    #[test]
    fn one_bad_order_rejects_the_set() {
        let b = board();
        let orders = vec![Order::new("A Paris H"), Order::new("A Paris to Burgundy")];
        assert!(validate_orders(&orders, &pid("France"), OrderPhase::Movement, &b).is_err());
    }

    #[test]
    fn defaults_per_phase() {
        let b = board();
        let holds = default_orders(&pid("France"), OrderPhase::Movement, &b);
        assert_eq!(
            holds,
            vec![Order::new("A Paris H"), Order::new("A Marseilles H"), Order::new("F Brest H")]
        );
        assert_eq!(
            default_orders(&pid("Russia"), OrderPhase::Retreat, &b),
            vec![Order::new("A Warsaw Disband")]
        );
        assert!(default_orders(&pid("France"), OrderPhase::Adjustment, &b).is_empty());
        // Defaults always pass the default validation.
        for o in &holds {
            assert!(validate_order(o, &pid("France"), OrderPhase::Movement, &b).is_ok());
        }
    }

    #[test]
    fn payload_scope() {
        let label = PhaseLabel::new(1901, Season::Spring, PhaseKind::Orders);
        let payload = OrderPayload {
            power: pid("France"),
            year: 1901,
            phase: label,
            orders: vec![Order::new("A Paris H")],
        };
        let decoded = OrderPayload::decode(&payload.encode().unwrap()).unwrap();
        assert!(decoded.check_scope(&pid("France"), label).is_ok());
        assert!(decoded.check_scope(&pid("Italy"), label).is_err());
        let fall = PhaseLabel::new(1901, Season::Fall, PhaseKind::Orders);
        assert!(decoded.check_scope(&pid("France"), fall).is_err());
        assert!(OrderPayload::decode(b"not json").is_err());
    }

    #[test]
    fn encoded_payload_is_the_documented_json() {
        let label = PhaseLabel::new(1901, Season::Fall, PhaseKind::Retreat);
        let payload = OrderPayload {
            power: pid("Turkey"),
            year: 1901,
            phase: label,
            orders: vec![Order::new("F Ankara D")],
        };
        let bytes = payload.encode().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "power": "Turkey",
                "year": 1901,
                "phase": "Fall_1901_Retreat",
                "orders": ["F Ankara D"],
            })
        );
    }
}
