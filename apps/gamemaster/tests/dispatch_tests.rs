mod common;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gamemaster::domain::{ParticipantId, Phase, Season};
use gamemaster::errors::{DomainError, ErrorCode};
use gamemaster::event_log::{DispatchStatus, EventBody, EventLog, EventScope, MemoryEventLog};
use gamemaster::services::{DispatchCoordinator, Outcome};

type Unit = Pin<Box<dyn Future<Output = Result<&'static str, DomainError>> + Send>>;

fn scope() -> EventScope {
    EventScope {
        year: 1901,
        season: Season::Spring,
        phase: Phase::Negotiation { round: 1 },
        round: Some(1),
    }
}

fn pid(s: &str) -> ParticipantId {
    s.parse().unwrap()
}

/// A unit that blocks its worker thread ignores cancellation; the
/// coordinator must still return by deadline + grace.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn returns_by_deadline_plus_grace_even_if_a_unit_blocks() {
    let log = Arc::new(MemoryEventLog::new());
    let coordinator = DispatchCoordinator::new(log.clone(), Duration::from_millis(100));
    let units: Vec<(ParticipantId, Unit)> = vec![
        (pid("Austria"), Box::pin(async { Ok("fine") })),
        (
            pid("Russia"),
            Box::pin(async {
                std::thread::sleep(Duration::from_millis(1500));
                Ok("too late")
            }),
        ),
    ];

    let started = Instant::now();
    let outcomes = coordinator
        .dispatch(&scope(), units, Duration::from_millis(200))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(1000), "{:?}", started.elapsed());
    assert_eq!(outcomes[&pid("Austria")], Outcome::Completed("fine"));
    assert_eq!(outcomes[&pid("Russia")], Outcome::TimedOut);
    assert_eq!(log.events().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn one_result_per_participant_in_dispatch_order() {
    let log = Arc::new(MemoryEventLog::new());
    let coordinator = DispatchCoordinator::new(log.clone(), Duration::ZERO);
    let names = ["Turkey", "Austria", "Italy"];
    let units: Vec<(ParticipantId, Unit)> = names
        .iter()
        .enumerate()
        .map(|(i, n)| {
            let unit: Unit = Box::pin(async move {
                // Finish in reverse order.
                tokio::time::sleep(Duration::from_millis(300 - 100 * i as u64)).await;
                Ok("done")
            });
            (pid(n), unit)
        })
        .collect();

    coordinator
        .dispatch(&scope(), units, Duration::from_secs(1))
        .await
        .unwrap();

    let logged: Vec<(String, DispatchStatus)> = log
        .events()
        .unwrap()
        .into_iter()
        .filter_map(|e| match e.body {
            EventBody::DispatchResult {
                participant,
                status,
                ..
            } => Some((participant.to_string(), status)),
            _ => None,
        })
        .collect();
    assert_eq!(
        logged,
        vec![
            ("Turkey".to_string(), DispatchStatus::Completed),
            ("Austria".to_string(), DispatchStatus::Completed),
            ("Italy".to_string(), DispatchStatus::Completed),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn sandbox_reported_timeouts_count_as_timeouts() {
    let log = Arc::new(MemoryEventLog::new());
    let coordinator = DispatchCoordinator::new(log.clone(), Duration::ZERO);
    let units: Vec<(ParticipantId, Unit)> = vec![(
        pid("England"),
        Box::pin(async { Err(DomainError::DispatchTimeout("agent gave up".into())) }),
    )];
    let outcomes = coordinator
        .dispatch(&scope(), units, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(outcomes[&pid("England")], Outcome::TimedOut);
    let events = log.events().unwrap();
    assert!(matches!(
        &events[0].body,
        EventBody::DispatchResult {
            code: Some(ErrorCode::DispatchTimeout),
            ..
        }
    ));
}
