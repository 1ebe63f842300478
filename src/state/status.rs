//! Human-readable session status

use std::fmt;

use tokio::sync::watch;

/// Status line surfaced to the owning UI.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionStatus {
    /// No transport
    #[default]
    Disconnected,
    /// Transport open, no welcome yet
    Connected,
    /// Welcomed by the coordinator
    ConnectedAs {
        /// Assigned client id
        client_id: String,
    },
    /// Clock offset measured
    Synced {
        /// One-way latency estimate
        latency_ms: f64,
    },
    /// Drift past the resync threshold
    Drift {
        /// Measured drift
        drift_ms: f64,
    },
    /// Coordinator reported everyone ready
    AllReady {
        /// Number of clients
        client_count: usize,
    },
    /// Transport reported an error
    ConnectionError,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connected => f.write_str("connected"),
            Self::ConnectedAs { client_id } => {
                let short = client_id.get(..8).unwrap_or(client_id);
                write!(f, "connected as {short}...")
            }
            Self::Synced { latency_ms } => write!(f, "synced ±{latency_ms:.0}ms"),
            Self::Drift { drift_ms } => write!(f, "drift {drift_ms:.0}ms"),
            Self::AllReady { client_count } => write!(f, "all {client_count} clients ready"),
            Self::ConnectionError => f.write_str("connection error"),
        }
    }
}

/// Latest-value status channel.
#[derive(Debug)]
pub struct StatusWatch {
    tx: watch::Sender<SessionStatus>,
}

impl StatusWatch {
    /// Create a status channel starting at `Disconnected`
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionStatus::default());
        Self { tx }
    }

    /// Current status
    #[must_use]
    pub fn get(&self) -> SessionStatus {
        self.tx.borrow().clone()
    }

    /// Replace the status, notifying subscribers on change
    pub fn set(&self, status: SessionStatus) {
        self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                tracing::debug!(%status, "status");
                *current = status;
                true
            }
        });
    }

    /// Subscribe to status changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.tx.subscribe()
    }
}

impl Default for StatusWatch {
    fn default() -> Self {
        Self::new()
    }
}
