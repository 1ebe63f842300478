use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::*;
use crate::clock::ManualClock;
use crate::protocol::wire::{ClientReady, Heartbeat, StatusUpdate, SyncRequest};
use crate::testing::NetworkSimulator;
use crate::transport::{TransportChannel, TransportEvent};

fn coordinator() -> (Arc<Coordinator>, ManualClock) {
    let clock = ManualClock::new(5000.0);
    let coordinator = Coordinator::with_clock(CoordinatorConfig::default(), Arc::new(clock.clone()));
    (Arc::new(coordinator), clock)
}

/// Connect and swallow the welcome.
async fn join(coordinator: &Coordinator) -> (ClientId, mpsc::UnboundedReceiver<ServerMessage>) {
    let (id, mut rx) = coordinator.connect().await;
    match rx.try_recv().unwrap() {
        ServerMessage::Welcome(w) => assert_eq!(w.client_id, id),
        other => panic!("expected welcome, got {other:?}"),
    }
    (id, rx)
}

fn intent(kind: CommandType, id: &str, position_secs: f64) -> ClientMessage {
    ClientMessage::intent(
        kind,
        ClientCommand::new(CommandId::from(id), Duration::from_secs_f64(position_secs)),
    )
}

fn next_command(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Option<Command> {
    rx.try_recv().ok().and_then(ServerMessage::into_command)
}

#[tokio::test]
async fn test_welcome_and_sync() {
    let (coordinator, _clock) = coordinator();
    let (id, mut rx) = join(&coordinator).await;

    coordinator
        .handle(
            &id,
            ClientMessage::SyncRequest(SyncRequest {
                client_send_time: 123.0,
                request_id: 7,
            }),
        )
        .await;

    assert_eq!(
        rx.try_recv().unwrap(),
        ServerMessage::Sync(SyncResponse {
            client_send_time: 123.0,
            server_time: 5000.0,
            request_id: Some(7),
        })
    );
}

#[tokio::test]
async fn test_heartbeat_acknowledged() {
    let (coordinator, _clock) = coordinator();
    let (id, mut rx) = join(&coordinator).await;

    coordinator
        .handle(&id, ClientMessage::Heartbeat(Heartbeat { client_time: 42.0 }))
        .await;

    assert_eq!(
        rx.try_recv().unwrap(),
        ServerMessage::HeartbeatAck(HeartbeatAck {
            client_time: Some(42.0),
            server_time: Some(5000.0),
        })
    );
}

#[tokio::test]
async fn test_play_relayed_to_everyone_with_client_id() {
    let (coordinator, _clock) = coordinator();
    let (alice, mut alice_rx) = join(&coordinator).await;
    let (_bob, mut bob_rx) = join(&coordinator).await;

    coordinator
        .handle(&alice, intent(CommandType::Play, "play_alice_1", 12.5))
        .await;

    for rx in [&mut alice_rx, &mut bob_rx] {
        let command = next_command(rx).unwrap();
        assert_eq!(command.kind, CommandType::Play);
        assert_eq!(command.id, CommandId::from("play_alice_1"));
        assert!((command.coordinator_timestamp - 5300.0).abs() < 1e-9);
        assert_eq!(command.position, Duration::from_secs_f64(12.5));
        assert_eq!(command.initiated_by.as_deref(), Some(alice.as_str()));
    }
}

#[tokio::test]
async fn test_pause_includes_sender() {
    let (coordinator, _clock) = coordinator();
    let (alice, mut alice_rx) = join(&coordinator).await;

    coordinator
        .handle(&alice, intent(CommandType::Pause, "pause_1", 3.0))
        .await;

    let command = next_command(&mut alice_rx).unwrap();
    assert_eq!(command.kind, CommandType::Pause);
    assert!((command.coordinator_timestamp - 5000.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_seek_excludes_sender() {
    let (coordinator, _clock) = coordinator();
    let (alice, mut alice_rx) = join(&coordinator).await;
    let (_bob, mut bob_rx) = join(&coordinator).await;

    coordinator
        .handle(&alice, intent(CommandType::Seek, "seek_1", 90.0))
        .await;

    assert!(alice_rx.try_recv().is_err());
    let command = next_command(&mut bob_rx).unwrap();
    assert_eq!(command.kind, CommandType::Seek);
    assert!((command.coordinator_timestamp - 5100.0).abs() < 1e-9);
    assert_eq!(command.position, Duration::from_secs(90));
}

#[tokio::test]
async fn test_response_seek_not_relayed() {
    let (coordinator, _clock) = coordinator();
    let (alice, _alice_rx) = join(&coordinator).await;
    let (_bob, mut bob_rx) = join(&coordinator).await;

    let mut seek = ClientCommand::new(CommandId::from("seek_r"), Duration::from_secs(4));
    seek.is_response = true;
    coordinator
        .handle(&alice, ClientMessage::ClientSeek(seek))
        .await;

    assert!(bob_rx.try_recv().is_err());
    assert_eq!(
        coordinator.clients().await[0].current_time,
        Duration::from_secs(4)
    );
}

#[tokio::test]
async fn test_loopback_and_repeated_intents_ignored() {
    let (coordinator, clock) = coordinator();
    let (alice, mut alice_rx) = join(&coordinator).await;

    let issued = coordinator.broadcast_play(Duration::from_secs(1)).await;
    assert_eq!(next_command(&mut alice_rx).unwrap().id, issued.id);
    assert_eq!(issued.initiated_by.as_deref(), Some(CONSOLE));

    // An intent carrying an id we issued is a loopback.
    coordinator
        .handle(&alice, intent(CommandType::Play, issued.id.as_str(), 1.0))
        .await;
    assert!(alice_rx.try_recv().is_err());

    // A retransmitted intent is relayed once.
    coordinator
        .handle(&alice, intent(CommandType::Pause, "pause_x", 1.0))
        .await;
    coordinator
        .handle(&alice, intent(CommandType::Pause, "pause_x", 1.0))
        .await;
    assert!(next_command(&mut alice_rx).is_some());
    assert!(alice_rx.try_recv().is_err());

    // Forgotten after the retention window.
    clock.advance(5001.0);
    coordinator
        .handle(&alice, intent(CommandType::Pause, "pause_x", 1.0))
        .await;
    assert!(next_command(&mut alice_rx).is_some());
}

#[tokio::test]
async fn test_status_update_only_records() {
    let (coordinator, _clock) = coordinator();
    let (alice, _alice_rx) = join(&coordinator).await;
    let (_bob, mut bob_rx) = join(&coordinator).await;

    coordinator
        .handle(
            &alice,
            ClientMessage::StatusUpdate(StatusUpdate {
                current_time: Duration::from_secs(17),
                is_playing: Some(true),
                response_to: Some(CommandId::from("play_1")),
                media_ready: Some(true),
                client_time: Some(1.0),
            }),
        )
        .await;

    assert!(bob_rx.try_recv().is_err());
    let info = &coordinator.clients().await[0];
    assert_eq!(info.id, alice);
    assert_eq!(info.current_time, Duration::from_secs(17));
    assert!(info.media_ready);
    assert!(!info.ready);
}

#[tokio::test(start_paused = true)]
async fn test_ready_triggers_initial_sync_and_all_ready() {
    let (coordinator, _clock) = coordinator();
    let (alice, mut alice_rx) = join(&coordinator).await;
    let (bob, mut bob_rx) = join(&coordinator).await;

    let ready = ClientMessage::ClientReady(ClientReady {
        duration: Duration::from_secs(200),
        current_time: Duration::ZERO,
    });

    coordinator.handle(&alice, ready.clone()).await;
    assert!(alice_rx.try_recv().is_err());

    coordinator.handle(&bob, ready.clone()).await;
    for rx in [&mut alice_rx, &mut bob_rx] {
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerMessage::AllClientsReady(AllClientsReady { client_count: 2 })
        );
    }

    tokio::time::sleep(Duration::from_millis(1001)).await;

    for rx in [&mut alice_rx, &mut bob_rx] {
        let command = next_command(rx).unwrap();
        assert_eq!(command.kind, CommandType::Seek);
        assert!(command.is_initial_sync);
        assert_eq!(command.position, Duration::ZERO);
        assert_eq!(command.initiated_by.as_deref(), Some(SERVER));
    }

    // A second ready does not repeat the initial sync.
    coordinator.handle(&alice, ready).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(matches!(
        alice_rx.try_recv(),
        Ok(ServerMessage::AllClientsReady(_))
    ));
    assert!(alice_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_console_operations() {
    let (coordinator, _clock) = coordinator();
    let (_alice, mut alice_rx) = join(&coordinator).await;
    let (_bob, mut bob_rx) = join(&coordinator).await;

    let pause = coordinator.broadcast_pause().await;
    assert_eq!(next_command(&mut bob_rx).unwrap(), pause);
    alice_rx.try_recv().unwrap();

    let seek = coordinator.broadcast_seek(Duration::from_secs(30)).await;
    assert!((seek.coordinator_timestamp - 5100.0).abs() < 1e-9);
    assert_eq!(next_command(&mut alice_rx).unwrap().position, Duration::from_secs(30));
    bob_rx.try_recv().unwrap();

    assert_eq!(coordinator.force_initial_sync().await, 2);
    let a = next_command(&mut alice_rx).unwrap();
    let b = next_command(&mut bob_rx).unwrap();
    assert!(a.is_initial_sync && b.is_initial_sync);
    assert_ne!(a.id, b.id);
}

#[tokio::test]
async fn test_clients_listed_in_connection_order() {
    let (coordinator, _clock) = coordinator();
    let (first, _rx1) = join(&coordinator).await;
    let (second, _rx2) = join(&coordinator).await;
    let (third, _rx3) = join(&coordinator).await;

    coordinator.disconnect(&second).await;

    let ids: Vec<_> = coordinator.clients().await.into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![first, third]);
    assert_eq!(coordinator.client_count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_channel_bridge_applies_latency() {
    let coordinator = Arc::new(Coordinator::new(CoordinatorConfig::default()));
    let mut transport = coordinator
        .connect_channel(NetworkSimulator::symmetric(40))
        .await;

    assert_eq!(transport.recv().await, Some(TransportEvent::Open));
    let started = tokio::time::Instant::now();
    let welcome = transport.recv().await;
    assert!(matches!(
        welcome,
        Some(TransportEvent::Message(ServerMessage::Welcome(_)))
    ));
    assert!(started.elapsed() >= Duration::from_millis(40));

    let sent_at = tokio::time::Instant::now();
    transport
        .send(ClientMessage::SyncRequest(SyncRequest {
            client_send_time: 0.0,
            request_id: 1,
        }))
        .await
        .unwrap();
    let reply = transport.recv().await;
    assert!(matches!(
        reply,
        Some(TransportEvent::Message(ServerMessage::Sync(_)))
    ));
    let round_trip = sent_at.elapsed();
    assert!(round_trip >= Duration::from_millis(80));
    assert!(round_trip < Duration::from_millis(90));

    drop(transport);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(coordinator.client_count().await, 0);
}
