//! Clock offset estimation against the coordinator.
//!
//! All local times are milliseconds on a monotonic clock; coordinator
//! timestamps are milliseconds on the coordinator's clock.
//!
//! ## Probe Exchange
//!
//! ```text
//! Client                              Coordinator
//!   |--- sync_request (t_send) --------->|
//!   |<-- sync (t_send, server_time) -----|   (client records now)
//!   |                                    |
//!   |  latency = (now - t_send) / 2      |
//!   |  offset  = server_time + latency - now
//! ```
//!
//! Latency is assumed symmetric; a single probe is enough to converge.

pub mod estimator;
pub mod monotonic;


pub use estimator::{ClockSyncEstimator, OffsetSmoothing, SyncProbe};
pub use monotonic::{ManualClock, MonotonicClock, TokioClock};
