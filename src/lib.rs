//! # playsync
//!
//! Keeps any number of independent media players on one shared timeline,
//! driven by commands relayed through a central coordinator.
//!
//! ## Features
//!
//! - Clock offset estimation against the coordinator
//! - Deadline-scheduled play/pause/seek with coarse + fine timing
//! - Idempotent command replay handling
//! - Continuous drift detection with rate nudges and resyncs
//! - An in-process coordinator hub, plus WebSocket bridging (feature `websocket`)
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use playsync::testing::{MockSink, NetworkSimulator};
//! use playsync::{Coordinator, CoordinatorConfig, SessionDriver, SyncConfig, SyncSession};
//!
//! # async fn example() -> Result<(), playsync::SyncError> {
//! let coordinator = Arc::new(Coordinator::new(CoordinatorConfig::default()));
//! let transport = coordinator.connect_channel(NetworkSimulator::lan()).await;
//!
//! let (sink_tx, sink_rx) = tokio::sync::mpsc::unbounded_channel();
//! let sink = MockSink::new().with_event_sender(sink_tx);
//! let session = SyncSession::new(sink, SyncConfig::default());
//!
//! let (driver, handle) = SessionDriver::new(session, transport, sink_rx);
//! tokio::spawn(driver.run());
//!
//! handle.play().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Core**: [`SyncSession`] - a synchronous state machine fed with
//!   explicit timestamps
//! - **Runtime**: [`SessionDriver`] - runs a session on tokio against a
//!   [`TransportChannel`](transport::TransportChannel)
//! - **Hub**: [`Coordinator`] - the timestamp authority every client trusts

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Clock offset estimation
pub mod clock;
/// Timestamp-authority hub
pub mod coordinator;
/// Command replay protection
pub mod dedup;
/// Drift detection and correction
pub mod drift;
/// Error types
pub mod error;
/// Wire protocol
pub mod protocol;
/// Deadline scheduling
pub mod scheduler;
/// Sync session state machine
pub mod session;
/// The media sink seam
pub mod sink;
/// State management
pub mod state;
/// Transport channels
pub mod transport;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;


// Re-exports
pub use clock::{ClockSyncEstimator, ManualClock, MonotonicClock, OffsetSmoothing, TokioClock};
pub use coordinator::{ClientInfo, Coordinator, CoordinatorConfig};
pub use dedup::{CommandDeduplicator, CommandLedger};
pub use drift::{DriftAction, DriftMonitor, TimelineAnchor};
pub use error::{ErrorKind, Result, SinkError, SyncError};
pub use scheduler::{ScheduleOutcome, ScheduledCommandExecutor};
pub use session::{SessionDriver, SessionHandle, SyncSession};
pub use sink::{MediaSink, SinkEvent};
pub use state::{EventBus, SessionEvent, SessionStatus};
pub use transport::{ChannelTransport, TransportChannel, TransportEvent};
pub use types::{
    ClientId, ClockOffset, Command, CommandId, CommandType, SessionPhase, SyncConfig,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        Command, CommandType, Coordinator, CoordinatorConfig, MediaSink, SessionDriver,
        SessionEvent, SessionHandle, SessionStatus, SinkEvent, SyncConfig, SyncError,
        SyncSession, TransportChannel,
    };
}
