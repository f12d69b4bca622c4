//! Assertion helpers over collected events.

use tokio::sync::mpsc;
use vf_protocol::ipc::Event;
use vf_protocol::run_models::Stage;

/// Everything published so far.
pub fn drain(events: &mut mpsc::Receiver<Event>) -> Vec<Event> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

pub fn waiting_for_input_count(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::WaitingForInput { .. }))
        .count()
}

pub fn has_alert(events: &[Event]) -> bool {
    events.iter().any(|e| matches!(e, Event::AlertRaised { .. }))
}

pub fn position(events: &[Event], predicate: impl Fn(&Event) -> bool) -> Option<usize> {
    events.iter().position(predicate)
}

/// Assert a run's events start with RunStarted, walk the stages in order
/// and end with exactly one terminal event.
pub fn assert_event_sequence(events: &[Event]) {
    assert!(
        matches!(events.first(), Some(Event::RunStarted { .. })),
        "First event should be RunStarted, got: {:?}",
        events.first()
    );

    let started: Vec<Stage> = events
        .iter()
        .filter_map(|e| match e {
            Event::StageStarted { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(started, Stage::ALL[..started.len()].to_vec());

    let terminal = events
        .iter()
        .filter(|e| matches!(e, Event::RunCompleted { .. } | Event::RunFailed { .. }))
        .count();
    assert_eq!(terminal, 1, "Expected one terminal event in {:?}", events);
    assert!(
        matches!(
            events.last(),
            Some(Event::RunCompleted { .. } | Event::RunFailed { .. })
        ),
        "Last event should be terminal, got: {:?}",
        events.last()
    );
}
