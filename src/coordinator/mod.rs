//! The coordinator: the hub every client trusts for the shared timeline.
//!
//! Clients send intents (`client_play`, `client_pause`, `client_seek`); the
//! coordinator stamps each with an execution time a little in the future and
//! relays it as a command. It also answers clock probes and heartbeats, and
//! tracks every client's last reported position and readiness.
//!
//! The hub is transport-agnostic: each client is an unbounded channel of
//! [`ServerMessage`]s. [`Coordinator::connect_channel`] bridges one to an
//! in-process [`ChannelTransport`](crate::transport::ChannelTransport), and
//! `serve_websocket` (feature `websocket`) bridges WebSocket connections.

mod bridge;
mod config;
#[cfg(feature = "websocket")]
mod websocket;

#[cfg(test)]
mod tests;

pub use config::{CoordinatorConfig, CoordinatorConfigBuilder};
#[cfg(feature = "websocket")]
pub use websocket::serve_websocket;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, mpsc};

use crate::clock::{MonotonicClock, TokioClock};
use crate::dedup::CommandDeduplicator;
use crate::protocol::wire::{
    AllClientsReady, ClientCommand, HeartbeatAck, SyncResponse, Welcome,
};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::types::{ClientId, Command, CommandId, CommandType};

/// Initiator name for commands issued from the operator console
pub const CONSOLE: &str = "console";

/// Initiator name for commands the coordinator issues on its own
pub const SERVER: &str = "server";

/// A connected client as the coordinator sees it
#[derive(Debug, Clone, PartialEq)]
pub struct ClientInfo {
    /// Assigned id
    pub id: ClientId,
    /// Sent `client_ready`
    pub ready: bool,
    /// Last reported media readiness
    pub media_ready: bool,
    /// Last reported position
    pub current_time: Duration,
}

#[derive(Debug)]
struct ClientEntry {
    info: ClientInfo,
    tx: mpsc::UnboundedSender<ServerMessage>,
    /// Connection order, for stable listing
    seq: u64,
    initial_sync_sent: bool,
}

/// Shared state for the timestamp-authority hub
pub struct Coordinator {
    clients: RwLock<HashMap<ClientId, ClientEntry>>,
    /// Ids this coordinator issued recently; intents reusing one are loopbacks
    issued: Arc<Mutex<CommandDeduplicator>>,
    clock: Arc<dyn MonotonicClock>,
    config: CoordinatorConfig,
    next_seq: std::sync::atomic::AtomicU64,
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl Coordinator {
    /// Create a coordinator on the runtime clock
    #[must_use]
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::with_clock(config, Arc::new(TokioClock::new()))
    }

    /// Create a coordinator reading time from `clock`
    #[must_use]
    pub fn with_clock(config: CoordinatorConfig, clock: Arc<dyn MonotonicClock>) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            issued: Arc::new(Mutex::new(CommandDeduplicator::new(
                config.command_retention,
            ))),
            clock,
            config,
            next_seq: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Coordinator clock (milliseconds)
    #[must_use]
    pub fn now_ms(&self) -> f64 {
        self.clock.now_ms()
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Register a new client. Its `welcome` is already queued on the returned receiver.
    pub async fn connect(&self) -> (ClientId, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = ClientId::generate();
        let (tx, rx) = mpsc::unbounded_channel();

        let _ = tx.send(ServerMessage::Welcome(Welcome {
            client_id: id.clone(),
            server_time: Some(self.now_ms()),
        }));

        let seq = self
            .next_seq
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let mut clients = self.clients.write().await;
        clients.insert(
            id.clone(),
            ClientEntry {
                info: ClientInfo {
                    id: id.clone(),
                    ready: false,
                    media_ready: false,
                    current_time: Duration::ZERO,
                },
                tx,
                seq,
                initial_sync_sent: false,
            },
        );
        tracing::info!(client_id = %id, total = clients.len(), "client connected");

        (id, rx)
    }

    /// Forget a client
    pub async fn disconnect(&self, id: &ClientId) {
        let mut clients = self.clients.write().await;
        if clients.remove(id).is_some() {
            tracing::info!(client_id = %id, remaining = clients.len(), "client disconnected");
        }
    }

    /// Handle one message from client `from`
    pub async fn handle(&self, from: &ClientId, message: ClientMessage) {
        let now = self.now_ms();

        {
            let mut clients = self.clients.write().await;
            let Some(entry) = clients.get_mut(from) else {
                tracing::warn!(client_id = %from, kind = message.type_name(), "message from unknown client");
                return;
            };

            match &message {
                ClientMessage::StatusUpdate(status) => {
                    entry.info.current_time = status.current_time;
                    if let Some(ready) = status.media_ready {
                        entry.info.media_ready = ready;
                    }
                    if let Some(id) = &status.response_to {
                        tracing::debug!(client_id = %from, command_id = %id, "command acknowledged");
                    }
                    return;
                }
                ClientMessage::SyncRequest(req) => {
                    Self::send_to(
                        entry,
                        ServerMessage::Sync(SyncResponse {
                            client_send_time: req.client_send_time,
                            server_time: now,
                            request_id: Some(req.request_id),
                        }),
                    );
                    return;
                }
                ClientMessage::Heartbeat(hb) => {
                    Self::send_to(
                        entry,
                        ServerMessage::HeartbeatAck(HeartbeatAck {
                            client_time: Some(hb.client_time),
                            server_time: Some(now),
                        }),
                    );
                    return;
                }
                ClientMessage::ClientReady(ready) => {
                    entry.info.ready = true;
                    entry.info.media_ready = true;
                    entry.info.current_time = ready.current_time;
                    tracing::info!(client_id = %from, duration = ?ready.duration, "client ready");

                    if !entry.initial_sync_sent {
                        entry.initial_sync_sent = true;
                        self.schedule_initial_sync(entry.tx.clone(), from.clone());
                    }

                    let count = clients.len();
                    if clients.values().all(|c| c.info.ready) {
                        tracing::info!(client_count = count, "all clients ready");
                        let message =
                            ServerMessage::AllClientsReady(AllClientsReady { client_count: count });
                        for entry in clients.values() {
                            Self::send_to(entry, message.clone());
                        }
                    }
                    return;
                }
                ClientMessage::ClientPlay(intent)
                | ClientMessage::ClientPause(intent)
                | ClientMessage::ClientSeek(intent) => {
                    entry.info.current_time = intent.position;
                }
            }
        }

        if let Some((kind, intent)) = message.as_intent() {
            self.relay_intent(from, kind, intent, now).await;
        }
    }

    async fn relay_intent(&self, from: &ClientId, kind: CommandType, intent: &ClientCommand, now: f64) {
        if kind == CommandType::Seek && intent.is_response {
            tracing::debug!(client_id = %from, "seek response; not relayed");
            return;
        }

        {
            let mut issued = self.issued.lock().await;
            if !issued.admit(&intent.command_id, now) {
                tracing::debug!(
                    client_id = %from,
                    command_id = %intent.command_id,
                    "loopback intent ignored"
                );
                return;
            }
        }

        let lead = match kind {
            CommandType::Play => self.config.play_lead,
            CommandType::Pause => self.config.pause_lead,
            CommandType::Seek => self.config.seek_lead,
        };
        let command = Command::new(
            kind,
            intent.command_id.clone(),
            now + millis(lead),
            intent.position,
        )
        .initiated_by(from.as_str());

        tracing::info!(
            client_id = %from,
            kind = %kind,
            position = ?intent.position,
            "relaying intent"
        );

        // A seek is already applied locally by the user who made it.
        let exclude = (kind == CommandType::Seek).then_some(from);
        self.broadcast(&command, exclude).await;
    }

    fn schedule_initial_sync(&self, tx: mpsc::UnboundedSender<ServerMessage>, client: ClientId) {
        let delay = self.config.initial_sync_delay;
        let lead = millis(self.config.seek_lead);
        let clock = Arc::clone(&self.clock);
        let issued = Arc::clone(&self.issued);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let now = clock.now_ms();
            let command = Command::new(
                CommandType::Seek,
                CommandId::generate("cmd"),
                now + lead,
                Duration::ZERO,
            )
            .initiated_by(SERVER)
            .initial_sync();
            issued.lock().await.remember(command.id.clone(), now);

            tracing::debug!(client_id = %client, "sending initial sync");
            if tx.send(ServerMessage::command(&command)).is_err() {
                tracing::debug!(client_id = %client, "client gone before initial sync");
            }
        });
    }

    fn send_to(entry: &ClientEntry, message: ServerMessage) {
        if entry.tx.send(message).is_err() {
            tracing::debug!(client_id = %entry.info.id, "client channel closed");
        }
    }

    /// Send `command` to every client except `exclude`. Returns the number reached.
    async fn broadcast(&self, command: &Command, exclude: Option<&ClientId>) -> usize {
        let message = ServerMessage::command(command);
        let clients = self.clients.read().await;
        let mut count = 0;
        for (id, entry) in clients.iter() {
            if exclude == Some(id) {
                continue;
            }
            if entry.tx.send(message.clone()).is_ok() {
                count += 1;
            }
        }
        tracing::debug!(kind = %command.kind, command_id = %command.id, count, "broadcast");
        count
    }

    async fn issue(&self, kind: CommandType, lead: Duration, position: Duration) -> Command {
        let now = self.now_ms();
        let command = Command::new(kind, CommandId::generate("cmd"), now + millis(lead), position)
            .initiated_by(CONSOLE);
        self.issued.lock().await.remember(command.id.clone(), now);
        self.broadcast(&command, None).await;
        command
    }

    /// Start every client at `position`
    pub async fn broadcast_play(&self, position: Duration) -> Command {
        self.issue(CommandType::Play, self.config.play_lead, position)
            .await
    }

    /// Pause every client
    pub async fn broadcast_pause(&self) -> Command {
        self.issue(CommandType::Pause, self.config.pause_lead, Duration::ZERO)
            .await
    }

    /// Move every client to `position`
    pub async fn broadcast_seek(&self, position: Duration) -> Command {
        self.issue(CommandType::Seek, self.config.seek_lead, position)
            .await
    }

    /// Send every client an initial-sync seek to zero. Returns the number reached.
    pub async fn force_initial_sync(&self) -> usize {
        let now = self.now_ms();
        let lead = millis(self.config.seek_lead);
        let clients = self.clients.read().await;
        let mut issued = self.issued.lock().await;
        let mut count = 0;
        for entry in clients.values() {
            let command = Command::new(
                CommandType::Seek,
                CommandId::generate("cmd"),
                now + lead,
                Duration::ZERO,
            )
            .initiated_by(SERVER)
            .initial_sync();
            issued.remember(command.id.clone(), now);
            if entry.tx.send(ServerMessage::command(&command)).is_ok() {
                count += 1;
            }
        }
        tracing::info!(count, "manual sync to 0 sent");
        count
    }

    /// Connected clients in connection order
    pub async fn clients(&self) -> Vec<ClientInfo> {
        let clients = self.clients.read().await;
        let mut entries: Vec<_> = clients.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.info.clone()).collect()
    }

    /// Number of connected clients
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
