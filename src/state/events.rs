//! Event bus for session events

use std::time::Duration;

use tokio::sync::broadcast;

use crate::types::{ClientId, ClockOffset, CommandId, CommandType};

/// Session events
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    // Connection events
    /// Transport opened
    Connected,
    /// Coordinator assigned an id
    Welcomed {
        /// Assigned id
        client_id: ClientId,
    },
    /// Transport closed
    Disconnected {
        /// Reason, if known
        reason: Option<String>,
    },
    /// Transport reported an error
    TransportError {
        /// Error message
        message: String,
    },

    // Clock events
    /// A probe response produced a new offset
    Synchronized {
        /// The new estimate
        offset: ClockOffset,
    },
    /// Readiness was announced to the coordinator
    ReadyAnnounced,
    /// Coordinator reported every client ready
    AllClientsReady {
        /// Number of clients
        client_count: usize,
    },

    // Command events
    /// A command is waiting for its deadline
    CommandScheduled {
        /// Command kind
        kind: CommandType,
        /// Command id
        id: CommandId,
        /// Local deadline (ms)
        local_deadline: f64,
    },
    /// A command was applied to the sink
    CommandApplied {
        /// Command kind
        kind: CommandType,
        /// Command id
        id: CommandId,
        /// How late it ran (0 when on time)
        late_by_ms: f64,
    },
    /// A pending command was superseded or cancelled
    CommandCancelled {
        /// Command kind
        kind: CommandType,
        /// Command id
        id: CommandId,
    },
    /// A command id was seen again and dropped
    DuplicateDropped {
        /// Command kind
        kind: CommandType,
        /// Command id
        id: CommandId,
    },
    /// A command arrived before the clock was synchronized
    CommandIgnored {
        /// Command kind
        kind: CommandType,
        /// Command id
        id: CommandId,
    },
    /// A user action was sent to the coordinator
    IntentSent {
        /// Intent kind
        kind: CommandType,
        /// Fresh id of the intent
        id: CommandId,
    },
    /// A sink event caused by the session itself was not re-broadcast
    EchoSuppressed {
        /// Kind of the sink action
        kind: CommandType,
        /// Command that caused it, if any
        id: Option<CommandId>,
    },

    // Drift events
    /// Playback rate nudged
    RateNudged {
        /// Measured drift
        drift_ms: f64,
        /// Applied rate
        rate: f64,
    },
    /// Playback rate returned to 1.0
    RateReverted,
    /// Drift exceeded the resync threshold; re-probing
    ResyncRequested {
        /// Measured drift
        drift_ms: f64,
    },
    /// Drift persisted after a re-probe; the sink was moved onto the timeline
    Realigned {
        /// Position the sink was moved to
        position: Duration,
    },

    // Error events
    /// A sink operation failed
    SinkFailed {
        /// Error message
        message: String,
    },
}

/// Event bus for distributing events
#[derive(Clone)]
pub struct EventBus {
    /// Broadcast sender
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a new event bus
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Subscribe to events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event
    pub fn emit(&self, event: SessionEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    /// Get subscriber count
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}

/// Event filter for selective subscription
pub struct EventFilter {
    rx: broadcast::Receiver<SessionEvent>,
    filter: Box<dyn Fn(&SessionEvent) -> bool + Send>,
}

impl EventFilter {
    /// Create a filtered event receiver
    pub fn new<F>(bus: &EventBus, filter: F) -> Self
    where
        F: Fn(&SessionEvent) -> bool + Send + 'static,
    {
        Self {
            rx: bus.subscribe(),
            filter: Box::new(filter),
        }
    }

    /// Receive next matching event
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if (self.filter)(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event that is already queued
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if (self.filter)(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}

/// Helper functions for common filters
impl EventFilter {
    /// Filter for command events only
    #[must_use]
    pub fn command_events(bus: &EventBus) -> Self {
        Self::new(bus, |e| {
            matches!(
                e,
                SessionEvent::CommandScheduled { .. }
                    | SessionEvent::CommandApplied { .. }
                    | SessionEvent::CommandCancelled { .. }
                    | SessionEvent::DuplicateDropped { .. }
                    | SessionEvent::CommandIgnored { .. }
            )
        })
    }

    /// Filter for connection events only
    #[must_use]
    pub fn connection_events(bus: &EventBus) -> Self {
        Self::new(bus, |e| {
            matches!(
                e,
                SessionEvent::Connected
                    | SessionEvent::Welcomed { .. }
                    | SessionEvent::Disconnected { .. }
                    | SessionEvent::TransportError { .. }
            )
        })
    }

    /// Filter for drift correction events only
    #[must_use]
    pub fn drift_events(bus: &EventBus) -> Self {
        Self::new(bus, |e| {
            matches!(
                e,
                SessionEvent::RateNudged { .. }
                    | SessionEvent::RateReverted
                    | SessionEvent::ResyncRequested { .. }
                    | SessionEvent::Realigned { .. }
            )
        })
    }

    /// Filter for error events only
    #[must_use]
    pub fn error_events(bus: &EventBus) -> Self {
        Self::new(bus, |e| {
            matches!(
                e,
                SessionEvent::SinkFailed { .. } | SessionEvent::TransportError { .. }
            )
        })
    }
}
