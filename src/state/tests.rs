use super::*;
use crate::types::{CommandId, CommandType};

#[test]
fn test_status_strings() {
    assert_eq!(SessionStatus::Disconnected.to_string(), "disconnected");
    assert_eq!(SessionStatus::Connected.to_string(), "connected");
    assert_eq!(
        SessionStatus::ConnectedAs {
            client_id: "lq3k2x9abcd".into()
        }
        .to_string(),
        "connected as lq3k2x9a..."
    );
    assert_eq!(
        SessionStatus::Synced { latency_ms: 21.6 }.to_string(),
        "synced ±22ms"
    );
    assert_eq!(
        SessionStatus::Drift { drift_ms: -140.2 }.to_string(),
        "drift -140ms"
    );
    assert_eq!(
        SessionStatus::AllReady { client_count: 3 }.to_string(),
        "all 3 clients ready"
    );
    assert_eq!(
        SessionStatus::ConnectionError.to_string(),
        "connection error"
    );
}

#[test]
fn test_short_client_id_kept_whole() {
    let status = SessionStatus::ConnectedAs {
        client_id: "abc".into(),
    };
    assert_eq!(status.to_string(), "connected as abc...");
}

#[tokio::test]
async fn test_status_watch() {
    let status = StatusWatch::new();
    let mut rx = status.subscribe();
    assert_eq!(*rx.borrow(), SessionStatus::Disconnected);

    status.set(SessionStatus::Connected);
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), SessionStatus::Connected);

    // Same value does not notify.
    status.set(SessionStatus::Connected);
    assert!(!rx.has_changed().unwrap());
    assert_eq!(status.get(), SessionStatus::Connected);
}

#[tokio::test]
async fn test_event_bus() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();

    bus.emit(SessionEvent::RateNudged {
        drift_ms: 60.0,
        rate: 1.006,
    });

    let event = rx.recv().await.unwrap();
    if let SessionEvent::RateNudged { rate, .. } = event {
        assert!((rate - 1.006).abs() < f64::EPSILON);
    } else {
        panic!("Wrong event type");
    }
}

#[tokio::test]
async fn test_event_filter() {
    let bus = EventBus::new();
    let mut filter = EventFilter::command_events(&bus);

    bus.emit(SessionEvent::RateReverted);
    bus.emit(SessionEvent::DuplicateDropped {
        kind: CommandType::Play,
        id: CommandId::from("cmd_1"),
    });

    let event = filter.recv().await.unwrap();
    assert!(matches!(event, SessionEvent::DuplicateDropped { .. }));
}

#[test]
fn test_event_filter_try_recv() {
    let bus = EventBus::new();
    let mut filter = EventFilter::error_events(&bus);

    bus.emit(SessionEvent::Connected);
    assert!(filter.try_recv().is_none());

    bus.emit(SessionEvent::SinkFailed {
        message: "autoplay blocked".into(),
    });
    assert!(matches!(
        filter.try_recv(),
        Some(SessionEvent::SinkFailed { .. })
    ));
}

#[test]
fn test_emit_without_subscribers() {
    let bus = EventBus::new();
    assert_eq!(bus.subscriber_count(), 0);
    bus.emit(SessionEvent::Connected);
}
