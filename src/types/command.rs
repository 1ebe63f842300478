use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Kind of a timeline command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// Start playback at a position
    Play,
    /// Stop playback
    Pause,
    /// Move to a position
    Seek,
}

impl CommandType {
    /// All command types
    pub const ALL: [CommandType; 3] = [Self::Play, Self::Pause, Self::Seek];

    /// Lowercase name, also used as command id prefix
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Seek => "seek",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Globally unique identifier of one command emission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(String);

impl CommandId {
    /// Generate a fresh id: `<prefix>_<unix millis>_<random suffix>`
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis();
        Self(format!("{prefix}_{millis}_{}", random_suffix(9)))
    }

    /// Create from string
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get as string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommandId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier the coordinator assigns to a connected client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Generate a fresh id: base-36 unix millis followed by a random suffix
    #[must_use]
    pub fn generate() -> Self {
        let mut millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis();
        let mut digits = Vec::new();
        while millis > 0 {
            let digit = u32::try_from(millis % 36).unwrap_or(0);
            digits.push(std::char::from_digit(digit, 36).unwrap_or('0'));
            millis /= 36;
        }
        let stamp: String = digits.iter().rev().collect();
        Self(format!("{stamp}{}", random_suffix(5)))
    }

    /// Create from string
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get as string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for status display
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// An immutable timeline command
///
/// Produced by the coordinator (inbound) or synthesized locally from a user
/// action on the sink (outbound intent, always with a fresh id).
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Command kind
    pub kind: CommandType,
    /// Unique id of this emission
    pub id: CommandId,
    /// Execution time in the coordinator's clock (milliseconds)
    pub coordinator_timestamp: f64,
    /// Target media position
    pub position: Duration,
    /// Who asked for it
    pub initiated_by: Option<String>,
    /// Part of the coordinator's join-time alignment; never acknowledged
    pub is_initial_sync: bool,
}

impl Command {
    /// Create a command with no initiator
    #[must_use]
    pub fn new(
        kind: CommandType,
        id: CommandId,
        coordinator_timestamp: f64,
        position: Duration,
    ) -> Self {
        Self {
            kind,
            id,
            coordinator_timestamp,
            position,
            initiated_by: None,
            is_initial_sync: false,
        }
    }

    /// Mark as initial alignment
    #[must_use]
    pub fn initial_sync(mut self) -> Self {
        self.is_initial_sync = true;
        self
    }

    /// Set the initiator
    #[must_use]
    pub fn initiated_by(mut self, who: impl Into<String>) -> Self {
        self.initiated_by = Some(who.into());
        self
    }
}

/// Result of one clock probe exchange
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockOffset {
    /// Coordinator clock minus local clock (milliseconds)
    pub offset_ms: f64,
    /// One-way latency estimate (milliseconds)
    pub latency_ms: f64,
    /// Local monotonic time of the measurement (milliseconds)
    pub measured_at_local: f64,
}

impl ClockOffset {
    /// Convert a coordinator timestamp to local monotonic time
    #[must_use]
    pub fn to_local(&self, coordinator_ms: f64) -> f64 {
        coordinator_ms - self.offset_ms
    }

    /// Convert a local monotonic time to the coordinator's clock
    #[must_use]
    pub fn to_coordinator(&self, local_ms: f64) -> f64 {
        local_ms + self.offset_ms
    }
}

/// Lifecycle phase of a sync session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    /// No transport
    #[default]
    Disconnected,
    /// Transport open, clock offset unknown
    Connected,
    /// Offset known, readiness not announced
    Synchronized,
    /// Offset known and readiness announced
    Ready,
}
