//! Network condition simulation for testing

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::clock::MonotonicClock;

/// Network condition simulator
#[derive(Clone, Debug)]
pub struct NetworkSimulator {
    /// Base one-way delay client to coordinator
    pub uplink_ms: u32,
    /// Base one-way delay coordinator to client
    pub downlink_ms: u32,
    /// Jitter range (max delay added per message)
    pub jitter_ms: u32,
}

impl NetworkSimulator {
    /// Perfect network (no delay)
    #[must_use]
    pub fn perfect() -> Self {
        Self::symmetric(0)
    }

    /// Same delay both ways, no jitter
    #[must_use]
    pub fn symmetric(one_way_ms: u32) -> Self {
        Self {
            uplink_ms: one_way_ms,
            downlink_ms: one_way_ms,
            jitter_ms: 0,
        }
    }

    /// Different delay each way, no jitter
    #[must_use]
    pub fn asymmetric(uplink_ms: u32, downlink_ms: u32) -> Self {
        Self {
            uplink_ms,
            downlink_ms,
            jitter_ms: 0,
        }
    }

    /// Good LAN conditions
    #[must_use]
    pub fn lan() -> Self {
        Self {
            uplink_ms: 1,
            downlink_ms: 1,
            jitter_ms: 2,
        }
    }

    /// Moderate `WiFi` conditions
    #[must_use]
    pub fn moderate_wifi() -> Self {
        Self {
            uplink_ms: 10,
            downlink_ms: 10,
            jitter_ms: 20,
        }
    }

    /// Add jitter
    #[must_use]
    pub fn with_jitter(mut self, jitter_ms: u32) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }

    fn jitter(&self) -> u32 {
        if self.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..self.jitter_ms)
        } else {
            0
        }
    }

    /// Get delay for a client to coordinator message
    #[must_use]
    pub fn uplink_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.uplink_ms + self.jitter()))
    }

    /// Get delay for a coordinator to client message
    #[must_use]
    pub fn downlink_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.downlink_ms + self.jitter()))
    }

    /// Worst-case error of a single probe: half the latency asymmetry plus jitter
    #[must_use]
    pub fn offset_error_bound_ms(&self) -> f64 {
        f64::from(self.uplink_ms.abs_diff(self.downlink_ms)) / 2.0 + f64::from(self.jitter_ms)
    }
}

/// A clock running `skew_ms` ahead of another.
///
/// Stands in for a second machine whose clock started at a different time.
#[derive(Clone)]
pub struct SkewedClock {
    inner: Arc<dyn MonotonicClock>,
    skew_ms: f64,
}

impl SkewedClock {
    /// Create a clock reading `inner + skew_ms`
    #[must_use]
    pub fn new(inner: Arc<dyn MonotonicClock>, skew_ms: f64) -> Self {
        Self { inner, skew_ms }
    }

    /// Configured skew
    #[must_use]
    pub fn skew_ms(&self) -> f64 {
        self.skew_ms
    }
}

impl MonotonicClock for SkewedClock {
    fn now_ms(&self) -> f64 {
        self.inner.now_ms() + self.skew_ms
    }
}

impl std::fmt::Debug for SkewedClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkewedClock")
            .field("skew_ms", &self.skew_ms)
            .finish_non_exhaustive()
    }
}
