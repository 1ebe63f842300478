
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::clock::{ManualClock, MonotonicClock};
use crate::protocol::wire::{CommandMessage, SyncResponse};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::SyncSession;
use crate::state::SessionEvent;
use crate::testing::MockSink;
use crate::types::{CommandId, CommandType, SyncConfig};

/// A session over a mock sink, driven by a manual clock.
struct Harness {
    clock: ManualClock,
    sink: MockSink,
    session: SyncSession<MockSink>,
    events: broadcast::Receiver<SessionEvent>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    fn with_config(config: SyncConfig) -> Self {
        let clock = ManualClock::new(1000.0);
        let sink = MockSink::new()
            .with_clock(Arc::new(clock.clone()))
            .with_duration(Duration::from_secs(600));
        let session = SyncSession::new(sink.clone(), config);
        let events = session.subscribe();
        Self {
            clock,
            sink,
            session,
            events,
        }
    }

    fn now(&self) -> f64 {
        self.clock.now_ms()
    }

    /// Feed queued sink events back into the session.
    fn pump(&mut self) {
        for event in self.sink.take_events() {
            let now = self.now();
            self.session.on_sink_event(event, now);
        }
    }

    /// Open the transport and answer the probe so that the coordinator clock
    /// reads `offset_ms` ahead of ours.
    fn connect(&mut self, offset_ms: f64) {
        let now = self.now();
        self.session.on_transport_open(now);
        self.pump();
        self.answer_probe(offset_ms);
    }

    fn answer_probe(&mut self, offset_ms: f64) {
        let probe = self
            .drain()
            .into_iter()
            .find_map(|m| match m {
                ClientMessage::SyncRequest(req) => Some(req),
                _ => None,
            })
            .expect("probe sent");
        let now = self.now();
        self.session.on_message(
            ServerMessage::Sync(SyncResponse {
                client_send_time: probe.client_send_time,
                server_time: now + offset_ms,
                request_id: Some(probe.request_id),
            }),
            now,
        );
        self.pump();
    }

    fn deliver(&mut self, message: ServerMessage) {
        let now = self.now();
        self.session.on_message(message, now);
        self.pump();
    }

    /// Step the clock 1ms at a time, polling as a frame loop would.
    fn run_for(&mut self, ms: u32) {
        for _ in 0..ms {
            self.clock.advance(1.0);
            let now = self.now();
            self.session.poll(now);
            self.pump();
        }
    }

    fn drain(&mut self) -> Vec<ClientMessage> {
        self.session.drain_outbox()
    }

    fn take_events(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

fn command(kind: CommandType, id: &str, timestamp: f64, position_secs: f64) -> ServerMessage {
    let message = CommandMessage {
        command_id: CommandId::from(id),
        timestamp,
        position: Duration::from_secs_f64(position_secs),
        initiated_by: Some("server".to_string()),
        is_initial_sync: false,
        is_response: false,
    };
    match kind {
        CommandType::Play => ServerMessage::Play(message),
        CommandType::Pause => ServerMessage::Pause(message),
        CommandType::Seek => ServerMessage::Seek(message),
    }
}

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

fn approx_secs(actual: Duration, expected: f64) -> bool {
    (actual.as_secs_f64() - expected).abs() < 1e-6
}
