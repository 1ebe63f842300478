use thiserror::Error;

/// Errors raised by a [`MediaSink`](crate::sink::MediaSink) implementation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SinkError {
    /// Playback could not be started
    #[error("play failed: {0}")]
    PlayFailed(String),

    /// Playback could not be paused
    #[error("pause failed: {0}")]
    PauseFailed(String),

    /// The sink rejected a seek
    #[error("seek to {position_secs:.3}s failed: {message}")]
    SeekFailed {
        /// Requested position in seconds
        position_secs: f64,
        /// Description of the failure
        message: String,
    },

    /// The playback rate could not be changed
    #[error("rate change to {rate} rejected")]
    RateRejected {
        /// Requested rate
        rate: f64,
    },

    /// The sink has no media loaded
    #[error("no media loaded")]
    NoMedia,
}

/// Errors that can occur while running a sync session or coordinator
#[derive(Debug, Error)]
pub enum SyncError {
    // ===== Transport Errors =====
    /// The transport failed to deliver or receive a message
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure
        message: String,
    },

    /// The transport is not open
    #[error("transport disconnected")]
    Disconnected,

    /// An internal channel was closed by its peer
    #[error("channel closed")]
    ChannelClosed,

    // ===== Timing Errors =====
    /// Measured drift is large enough that the clock offset must be re-probed
    #[error("clock offset stale: drift {drift_ms:.1}ms")]
    StaleOffset {
        /// Observed drift in milliseconds
        drift_ms: f64,
    },

    /// An operation needs a clock offset that has not been measured yet
    #[error("clock not synchronized")]
    NotSynchronized,

    // ===== Sink Errors =====
    /// The media sink failed an operation
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    // ===== Protocol Errors =====
    /// Wire message encoding/decoding failed
    #[error("codec error: {message}")]
    Codec {
        /// Description of the error
        message: String,
    },

    // ===== State Errors =====
    /// Operation not valid in current state
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why the state is invalid
        message: String,
    },

    /// Network I/O error
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used when reporting errors upward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection lost or failed; recovered by reconnect and full resync
    Transport,
    /// Drift exceeded the large threshold; recovered by re-probing
    StaleOffset,
    /// Underlying playback failed; session continues degraded
    Sink,
    /// Malformed or unexpected message
    Protocol,
    /// Anything else
    Internal,
}

impl SyncError {
    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } | Self::Disconnected | Self::ChannelClosed | Self::Io(_) => {
                ErrorKind::Transport
            }
            Self::StaleOffset { .. } | Self::NotSynchronized => ErrorKind::StaleOffset,
            Self::Sink(_) => ErrorKind::Sink,
            Self::Codec { .. } => ErrorKind::Protocol,
            Self::InvalidState { .. } => ErrorKind::Internal,
        }
    }

    /// Check if the session can keep running after this error
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidState { .. })
    }

    /// Check if this error indicates connection loss
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Disconnected | Self::ChannelClosed
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec {
            message: err.to_string(),
        }
    }
}

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
