use std::sync::Arc;
use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use playsync::protocol::wire::SyncResponse;
use playsync::protocol::{ServerMessage, decode};
use playsync::testing::MockSink;
use playsync::{
    CommandDeduplicator, CommandId, ManualClock, MonotonicClock, SyncConfig, SyncSession,
};

const PLAY_FRAME: &str = r#"{"type":"play","commandId":"play_1700000000000_abc123def","timestamp":50540.25,"position":12.5,"initiatedBy":"lq3k9x2abcd"}"#;

fn wire_benchmark(c: &mut Criterion) {
    c.bench_function("wire_decode_play", |b| {
        b.iter(|| decode::<ServerMessage>(black_box(PLAY_FRAME)).unwrap())
    });
}

fn dedup_benchmark(c: &mut Criterion) {
    let ids: Vec<CommandId> = (0..1000)
        .map(|i| CommandId::from_string(format!("cmd_{i}")))
        .collect();

    c.bench_function("dedup_admit_1000", |b| {
        b.iter(|| {
            let mut dedup = CommandDeduplicator::default();
            for (i, id) in ids.iter().enumerate() {
                black_box(dedup.admit(id, i as f64));
            }
        })
    });
}

fn session_benchmark(c: &mut Criterion) {
    // Schedule a play and poll frame by frame until it fires.
    c.bench_function("session_play_to_deadline", |b| {
        b.iter(|| {
            let clock = ManualClock::new(0.0);
            let sink = MockSink::new()
                .with_clock(Arc::new(clock.clone()))
                .with_duration(Duration::from_secs(600));
            let mut session = SyncSession::new(sink.clone(), SyncConfig::default());

            session.on_transport_open(clock.now_ms());
            session.on_message(
                ServerMessage::Sync(SyncResponse {
                    client_send_time: 0.0,
                    server_time: 50_000.0,
                    request_id: Some(1),
                }),
                clock.now_ms(),
            );
            session.on_message(decode(PLAY_FRAME).unwrap(), clock.now_ms());

            while session.pending_command().is_some() {
                clock.advance(16.0);
                session.poll(clock.now_ms());
                for event in sink.take_events() {
                    session.on_sink_event(event, clock.now_ms());
                }
            }
            black_box(session.drain_outbox())
        })
    });
}

criterion_group!(benches, wire_benchmark, dedup_benchmark, session_benchmark);
criterion_main!(benches);
