//! Common test utilities and fixtures
#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use playsync::testing::{MockSink, NetworkSimulator};
use playsync::{
    Coordinator, CoordinatorConfig, MediaSink, Result, SessionDriver, SessionHandle,
    SessionStatus, SyncConfig, SyncSession, TokioClock,
};
use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialize test logging (call once per test module)
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env().add_directive("playsync=debug".parse().unwrap());

        fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// Media length of every test sink
pub const MEDIA_LENGTH: Duration = Duration::from_secs(600);

/// One simulated player connected to a coordinator
pub struct Client {
    pub sink: MockSink,
    pub handle: SessionHandle,
    pub task: JoinHandle<Result<()>>,
}

impl Client {
    /// Connect a client whose local clock starts now, load its media and run it.
    pub async fn spawn(coordinator: &Arc<Coordinator>, network: NetworkSimulator) -> Self {
        let clock = TokioClock::new();
        let (sink_tx, sink_rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = MockSink::new()
            .with_clock(Arc::new(clock))
            .with_duration(MEDIA_LENGTH)
            .with_event_sender(sink_tx);
        sink.load();

        let session = SyncSession::new(sink.clone(), SyncConfig::default());
        let transport = coordinator.connect_channel(network).await;
        let (driver, handle) = SessionDriver::new(session, transport, sink_rx);
        let task = tokio::spawn(driver.with_clock(clock).run());

        Self { sink, handle, task }
    }

    /// Wait until the session reports a synchronized clock.
    pub async fn wait_synced(&self) {
        let mut status = self.handle.watch_status();
        tokio::time::timeout(
            Duration::from_secs(10),
            status.wait_for(|s| {
                matches!(
                    s,
                    SessionStatus::Synced { .. } | SessionStatus::AllReady { .. }
                )
            }),
        )
        .await
        .expect("timed out waiting for sync")
        .expect("session stopped");
    }

    /// Current sink position in seconds
    pub fn position_secs(&self) -> f64 {
        self.sink.position().as_secs_f64()
    }

    /// Stop the driver and wait for it.
    pub async fn stop(self) {
        self.handle.shutdown();
        self.task.await.unwrap().unwrap();
    }
}

/// A coordinator on the default configuration
pub fn coordinator() -> Arc<Coordinator> {
    Arc::new(Coordinator::new(CoordinatorConfig::default()))
}

/// Bring up one client per network, each with its own clock origin.
pub async fn spawn_clients(
    coordinator: &Arc<Coordinator>,
    networks: &[NetworkSimulator],
) -> Vec<Client> {
    let mut clients = Vec::new();
    for network in networks {
        clients.push(Client::spawn(coordinator, network.clone()).await);
        // Stagger the clock origins.
        tokio::time::sleep(Duration::from_millis(137)).await;
    }
    for client in &clients {
        client.wait_synced().await;
    }
    clients
}

/// Largest pairwise distance between client positions, in milliseconds
pub fn spread_ms(clients: &[Client]) -> f64 {
    let positions: Vec<f64> = clients.iter().map(Client::position_secs).collect();
    let max = positions.iter().copied().fold(f64::MIN, f64::max);
    let min = positions.iter().copied().fold(f64::MAX, f64::min);
    (max - min) * 1000.0
}
