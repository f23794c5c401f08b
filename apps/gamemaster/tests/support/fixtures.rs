//! Seven-power roster and opening board.

use gamemaster::domain::{Board, KeyRef, Participant, ParticipantId, Roster, Unit, UnitKind};

pub const POWERS: [&str; 7] = [
    "Austria", "England", "France", "Germany", "Italy", "Russia", "Turkey",
];

pub fn pid(s: &str) -> ParticipantId {
    s.parse().expect("valid participant id")
}

pub fn roster_of(names: &[&str]) -> Roster {
    Roster::new(
        names
            .iter()
            .map(|n| Participant::new(pid(n), KeyRef::new(format!("{n}-key"))))
            .collect(),
    )
    .expect("valid roster")
}

pub fn seven_powers() -> Roster {
    roster_of(&POWERS)
}

fn home(power: &str) -> Vec<(UnitKind, &'static str)> {
    use UnitKind::{Army, Fleet};
    match power {
        "Austria" => vec![(Army, "Vienna"), (Army, "Budapest"), (Fleet, "Trieste")],
        "England" => vec![(Fleet, "London"), (Fleet, "Edinburgh"), (Army, "Liverpool")],
        "France" => vec![(Fleet, "Brest"), (Army, "Paris"), (Army, "Marseilles")],
        "Germany" => vec![(Fleet, "Kiel"), (Army, "Berlin"), (Army, "Munich")],
        "Italy" => vec![(Fleet, "Naples"), (Army, "Rome"), (Army, "Venice")],
        "Russia" => vec![
            (Army, "Moscow"),
            (Fleet, "Sevastopol"),
            (Army, "Warsaw"),
            (Fleet, "Livonia"),
        ],
        "Turkey" => vec![(Fleet, "Ankara"), (Army, "Constantinople"), (Army, "Smyrna")],
        _ => Vec::new(),
    }
}

/// Every power on its home centres; counts match ownership.
pub fn opening_board() -> Board {
    let mut board = Board::default();
    for power in POWERS {
        let id = pid(power);
        let units: Vec<Unit> = home(power)
            .into_iter()
            .map(|(kind, loc)| Unit::new(kind, loc))
            .collect();
        for unit in &units {
            board.ownership.insert(unit.location.clone(), id.clone());
        }
        board.resource_counts.insert(id.clone(), units.len() as u32);
        board.units.insert(id, units);
    }
    board
}
