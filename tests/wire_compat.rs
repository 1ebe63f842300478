//! A session driven purely by JSON frames as the coordinator writes them.

use std::sync::Arc;
use std::time::Duration;

use playsync::protocol::{ClientMessage, ServerMessage, decode, encode};
use playsync::testing::{MockSink, SinkCall};
use playsync::{ErrorKind, ManualClock, MediaSink, MonotonicClock, SyncConfig, SyncSession};

struct Wire {
    clock: ManualClock,
    sink: MockSink,
    session: SyncSession<MockSink>,
}

impl Wire {
    fn new() -> Self {
        let clock = ManualClock::new(10_000.0);
        let sink = MockSink::new()
            .with_clock(Arc::new(clock.clone()))
            .with_duration(Duration::from_secs(120));
        let session = SyncSession::new(sink.clone(), SyncConfig::default());
        Self {
            clock,
            sink,
            session,
        }
    }

    fn receive(&mut self, frame: &str) {
        let message: ServerMessage = decode(frame).unwrap();
        let now = self.clock.now_ms();
        self.session.on_message(message, now);
        self.pump();
    }

    fn pump(&mut self) {
        for event in self.sink.take_events() {
            let now = self.clock.now_ms();
            self.session.on_sink_event(event, now);
        }
    }

    /// Everything queued for the coordinator, as JSON text
    fn sent(&mut self) -> Vec<String> {
        self.session
            .drain_outbox()
            .iter()
            .map(|m| encode(m).unwrap())
            .collect()
    }

    fn run_for(&mut self, ms: u32) {
        for _ in 0..ms {
            self.clock.advance(1.0);
            let now = self.clock.now_ms();
            self.session.poll(now);
            self.pump();
        }
    }
}

#[test]
fn test_join_and_play_over_json() {
    let mut wire = Wire::new();

    wire.session.on_transport_open(wire.clock.now_ms());
    let sent = wire.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains(r#""type":"sync_request""#), "{}", sent[0]);
    assert!(sent[0].contains(r#""clientSendTime":10000.0"#), "{}", sent[0]);

    wire.receive(r#"{"type":"welcome","clientId":"lq3k9x2abcd"}"#);
    assert_eq!(
        wire.session.client_id().map(|id| id.as_str()),
        Some("lq3k9x2abcd")
    );

    // 40ms round trip; the coordinator's clock reads 40s ahead of ours.
    wire.clock.advance(40.0);
    wire.receive(r#"{"type":"sync","clientSendTime":10000,"serverTime":50020}"#);
    let offset = wire.session.offset().unwrap();
    assert!((offset.offset_ms - 40_000.0).abs() < 1e-9);
    assert!((offset.latency_ms - 20.0).abs() < 1e-9);

    // Ready goes out once media is loaded.
    assert!(wire.sent().iter().all(|m| !m.contains("client_ready")));
    wire.sink.load();
    wire.pump();
    let sent = wire.sent();
    assert!(
        sent.iter()
            .any(|m| m.contains(r#""type":"client_ready""#) && m.contains(r#""duration":120.0"#)),
        "{sent:?}"
    );

    let play = r#"{"type":"play","commandId":"play_1700000000000_abc123def","timestamp":50540,"position":12.5,"initiatedBy":"lq3k9x2abcd"}"#;
    wire.receive(play);
    wire.run_for(600);

    let plays: Vec<_> = wire
        .sink
        .calls()
        .into_iter()
        .filter(|c| c.call == SinkCall::Play)
        .map(|c| c.at_ms)
        .collect();
    assert_eq!(plays.len(), 1);
    assert!((plays[0] - 10_540.0).abs() <= 30.0, "played at {}", plays[0]);
    assert!(!wire.sink.is_paused());

    let sent = wire.sent();
    assert!(
        sent.iter().any(|m| m.contains(r#""type":"status_update""#)
            && m.contains(r#""responseTo":"play_1700000000000_abc123def""#)),
        "{sent:?}"
    );
    assert!(sent.iter().all(|m| !m.contains("client_play")));

    // The same frame again is a replay.
    wire.receive(play);
    wire.run_for(600);
    let plays = wire
        .sink
        .calls()
        .into_iter()
        .filter(|c| c.call == SinkCall::Play)
        .count();
    assert_eq!(plays, 1);
}

#[test]
fn test_user_intent_frames() {
    let mut wire = Wire::new();
    wire.session.on_transport_open(wire.clock.now_ms());
    wire.sent();
    wire.receive(r#"{"type":"sync","clientSendTime":10000,"serverTime":3000}"#);
    wire.sent();

    wire.sink.user_play();
    wire.pump();

    let sent = wire.sent();
    assert_eq!(sent.len(), 1);
    let intent: ClientMessage = decode(&sent[0]).unwrap();
    let ClientMessage::ClientPlay(command) = intent else {
        panic!("expected client_play, got {}", sent[0]);
    };
    assert!(command.command_id.as_str().starts_with("play_"));
    assert_eq!(command.timestamp, Some(3000.0));
    assert!(!command.is_response);
}

#[test]
fn test_unknown_frames_are_codec_errors() {
    let err = decode::<ServerMessage>(r#"{"type":"volume","level":3}"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(err.is_recoverable());

    let err = decode::<ServerMessage>("not json").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[test]
fn test_initial_sync_seek_is_not_acknowledged() {
    let mut wire = Wire::new();
    wire.session.on_transport_open(wire.clock.now_ms());
    wire.sent();
    wire.receive(r#"{"type":"sync","clientSendTime":10000,"serverTime":10000}"#);
    wire.sink.set_position(Duration::from_secs(7));

    wire.receive(
        r#"{"type":"seek","commandId":"cmd_1_x","timestamp":10100,"position":0,"initiatedBy":"server","isInitialSync":true}"#,
    );
    wire.run_for(300);

    assert_eq!(wire.sink.position(), Duration::ZERO);
    let sent = wire.sent();
    assert!(sent.iter().all(|m| !m.contains("responseTo")), "{sent:?}");
    assert!(sent.iter().all(|m| !m.contains("client_seek")), "{sent:?}");
}
