//! JSON wire messages exchanged between sessions and the coordinator.
//!
//! Every frame is one JSON object whose `type` field selects the shape.
//! `client_*` types are intents a client sends; the bare `play` / `pause` /
//! `seek` types are commands the coordinator has stamped with an
//! authoritative execution time.
//!
//! Times are milliseconds in the sender's clock. Media positions are seconds.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{ClientId, Command, CommandId, CommandType};


/// Serde adapter for media positions as floating-point seconds.
///
/// Negative values are clamped to zero.
pub mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize as seconds
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    /// Deserialize from seconds
    ///
    /// # Errors
    ///
    /// Fails on non-numeric or out-of-range values.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs.max(0.0)).map_err(serde::de::Error::custom)
    }
}

/// Messages a client sends to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Clock probe
    SyncRequest(SyncRequest),
    /// User asked to play
    ClientPlay(ClientCommand),
    /// User asked to pause
    ClientPause(ClientCommand),
    /// User asked to seek
    ClientSeek(ClientCommand),
    /// Position report, optionally acknowledging a command
    StatusUpdate(StatusUpdate),
    /// Media loaded and clock synchronized
    ClientReady(ClientReady),
    /// Liveness ping
    Heartbeat(Heartbeat),
}

impl ClientMessage {
    /// Wire name of this message
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SyncRequest(_) => "sync_request",
            Self::ClientPlay(_) => "client_play",
            Self::ClientPause(_) => "client_pause",
            Self::ClientSeek(_) => "client_seek",
            Self::StatusUpdate(_) => "status_update",
            Self::ClientReady(_) => "client_ready",
            Self::Heartbeat(_) => "heartbeat",
        }
    }

    /// Build the intent message for `kind`
    #[must_use]
    pub fn intent(kind: CommandType, command: ClientCommand) -> Self {
        match kind {
            CommandType::Play => Self::ClientPlay(command),
            CommandType::Pause => Self::ClientPause(command),
            CommandType::Seek => Self::ClientSeek(command),
        }
    }

    /// The intent carried by this message, if it is one
    #[must_use]
    pub fn as_intent(&self) -> Option<(CommandType, &ClientCommand)> {
        match self {
            Self::ClientPlay(c) => Some((CommandType::Play, c)),
            Self::ClientPause(c) => Some((CommandType::Pause, c)),
            Self::ClientSeek(c) => Some((CommandType::Seek, c)),
            _ => None,
        }
    }
}

/// Messages the coordinator sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Clock probe response
    Sync(SyncResponse),
    /// Start playback at a coordinator time
    Play(CommandMessage),
    /// Pause at a coordinator time
    Pause(CommandMessage),
    /// Seek at a coordinator time
    Seek(CommandMessage),
    /// Heartbeat response
    HeartbeatAck(HeartbeatAck),
    /// Every connected client reported ready
    AllClientsReady(AllClientsReady),
    /// Sent once on connect
    Welcome(Welcome),
}

impl ServerMessage {
    /// Wire name of this message
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Sync(_) => "sync",
            Self::Play(_) => "play",
            Self::Pause(_) => "pause",
            Self::Seek(_) => "seek",
            Self::HeartbeatAck(_) => "heartbeat_ack",
            Self::AllClientsReady(_) => "all_clients_ready",
            Self::Welcome(_) => "welcome",
        }
    }

    /// Convert a command into its wire message
    #[must_use]
    pub fn command(command: &Command) -> Self {
        let payload = CommandMessage::from(command);
        match command.kind {
            CommandType::Play => Self::Play(payload),
            CommandType::Pause => Self::Pause(payload),
            CommandType::Seek => Self::Seek(payload),
        }
    }

    /// The command carried by this message, if it is one
    #[must_use]
    pub fn into_command(self) -> Option<Command> {
        match self {
            Self::Play(m) => Some(m.into_command(CommandType::Play)),
            Self::Pause(m) => Some(m.into_command(CommandType::Pause)),
            Self::Seek(m) => Some(m.into_command(CommandType::Seek)),
            _ => None,
        }
    }
}

/// `sync_request` payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// Client clock when the probe was sent
    pub client_send_time: f64,
    /// Probe identifier, echoed back
    pub request_id: u64,
}

/// `sync` payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    /// Echo of the probe's send time
    pub client_send_time: f64,
    /// Coordinator clock when it answered
    pub server_time: f64,
    /// Echo of the probe identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
}

/// `client_play` / `client_pause` / `client_seek` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCommand {
    /// Fresh id of this intent
    pub command_id: CommandId,
    /// Client's estimate of the coordinator clock when the intent was made
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    /// Media position when the intent was made
    #[serde(with = "secs")]
    pub position: Duration,
    /// Client clock when the intent was made
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_time: Option<f64>,
    /// Seek issued in response to a coordinator command rather than the user
    #[serde(default)]
    pub is_response: bool,
}

impl ClientCommand {
    /// Create an intent at `position`
    #[must_use]
    pub fn new(command_id: CommandId, position: Duration) -> Self {
        Self {
            command_id,
            timestamp: None,
            position,
            client_time: None,
            is_response: false,
        }
    }
}

/// `play` / `pause` / `seek` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMessage {
    /// Command id; echoes the originating intent's id when there is one
    pub command_id: CommandId,
    /// Coordinator time at which to execute
    pub timestamp: f64,
    /// Target media position
    #[serde(default, with = "secs")]
    pub position: Duration,
    /// Originating client id, `"server"` or `"console"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiated_by: Option<String>,
    /// Join-time alignment; never acknowledged
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_initial_sync: bool,
    /// Relay of a seek that was itself a response to a command
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_response: bool,
}

impl CommandMessage {
    /// Attach a type to this payload
    #[must_use]
    pub fn into_command(self, kind: CommandType) -> Command {
        Command {
            kind,
            id: self.command_id,
            coordinator_timestamp: self.timestamp,
            position: self.position,
            initiated_by: self.initiated_by,
            is_initial_sync: self.is_initial_sync,
        }
    }
}

impl From<&Command> for CommandMessage {
    fn from(command: &Command) -> Self {
        Self {
            command_id: command.id.clone(),
            timestamp: command.coordinator_timestamp,
            position: command.position,
            initiated_by: command.initiated_by.clone(),
            is_initial_sync: command.is_initial_sync,
            is_response: false,
        }
    }
}

/// `status_update` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    /// Current media position
    #[serde(with = "secs")]
    pub current_time: Duration,
    /// Whether the sink is playing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_playing: Option<bool>,
    /// Command this report acknowledges
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_to: Option<CommandId>,
    /// Whether media is loaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_ready: Option<bool>,
    /// Client clock at the time of the report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_time: Option<f64>,
}

impl StatusUpdate {
    /// A bare position report
    #[must_use]
    pub fn position(current_time: Duration) -> Self {
        Self {
            current_time,
            is_playing: None,
            response_to: None,
            media_ready: None,
            client_time: None,
        }
    }
}

/// `client_ready` payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientReady {
    /// Media duration
    #[serde(with = "secs")]
    pub duration: Duration,
    /// Media position
    #[serde(with = "secs")]
    pub current_time: Duration,
}

/// `heartbeat` payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    /// Client clock when sent
    pub client_time: f64,
}

/// `heartbeat_ack` payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatAck {
    /// Echo of the heartbeat's client time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_time: Option<f64>,
    /// Coordinator clock when answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_time: Option<f64>,
}

/// `all_clients_ready` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllClientsReady {
    /// Number of connected clients
    pub client_count: usize,
}

/// `welcome` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    /// Id the coordinator assigned to this client
    pub client_id: ClientId,
    /// Coordinator clock when sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_time: Option<f64>,
}

/// Encode a message as a JSON text frame.
///
/// # Errors
///
/// Returns [`SyncError::Codec`](crate::SyncError::Codec) if serialization fails.
pub fn encode<T: Serialize>(message: &T) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a JSON text frame.
///
/// # Errors
///
/// Returns [`SyncError::Codec`](crate::SyncError::Codec) for malformed JSON,
/// unknown `type` values and missing fields.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(text)?)
}
