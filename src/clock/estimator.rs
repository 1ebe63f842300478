//! Offset/latency estimation from sync probes.

use crate::types::ClockOffset;

/// How successive probe results combine into the current estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum OffsetSmoothing {
    /// Every successful probe overwrites the estimate wholesale.
    #[default]
    Latest,
    /// Exponentially weighted: `estimate = alpha * sample + (1 - alpha) * estimate`.
    Ewma {
        /// Weight of the newest sample (clamped to `0.0..=1.0`)
        alpha: f64,
    },
}

/// An outstanding probe request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncProbe {
    /// Identifier echoed by the coordinator
    pub request_id: u64,
    /// Local send time (milliseconds)
    pub client_send_time: f64,
}

/// Clock offset estimator.
///
/// Produces a `(offset, latency)` pair from one request/response exchange.
/// The offset is only meaningful while [`is_synchronized`](Self::is_synchronized)
/// holds; a transport disconnect invalidates it.
#[derive(Debug)]
pub struct ClockSyncEstimator {
    /// Policy for combining samples.
    smoothing: OffsetSmoothing,
    /// Current estimate, if any.
    offset: Option<ClockOffset>,
    /// Most recent unanswered probe.
    outstanding: Option<SyncProbe>,
    /// Next request id to hand out.
    next_request_id: u64,
    /// Probes issued over the estimator's lifetime.
    probes_sent: u64,
    /// Responses processed over the estimator's lifetime.
    responses: u64,
}

impl ClockSyncEstimator {
    /// Create a new estimator.
    #[must_use]
    pub fn new(smoothing: OffsetSmoothing) -> Self {
        Self {
            smoothing,
            offset: None,
            outstanding: None,
            next_request_id: 1,
            probes_sent: 0,
            responses: 0,
        }
    }

    /// Start a probe stamped with the local send time.
    pub fn probe(&mut self, now_ms: f64) -> SyncProbe {
        let probe = SyncProbe {
            request_id: self.next_request_id,
            client_send_time: now_ms,
        };
        self.next_request_id += 1;
        self.probes_sent += 1;
        self.outstanding = Some(probe);
        probe
    }

    /// Process a coordinator response.
    ///
    /// `client_send_time` is the echoed send stamp, `coordinator_time` the
    /// coordinator's clock when it answered.
    pub fn on_response(
        &mut self,
        client_send_time: f64,
        coordinator_time: f64,
        now_ms: f64,
    ) -> ClockOffset {
        let mut round_trip = now_ms - client_send_time;
        if round_trip < 0.0 {
            tracing::debug!(
                client_send_time,
                now_ms,
                "sync response stamped in the future; assuming zero round trip"
            );
            round_trip = 0.0;
        }
        let latency_ms = round_trip / 2.0;
        let offset_ms = (coordinator_time + latency_ms) - now_ms;

        let sample = ClockOffset {
            offset_ms,
            latency_ms,
            measured_at_local: now_ms,
        };

        let estimate = match (self.smoothing, self.offset) {
            (OffsetSmoothing::Ewma { alpha }, Some(prev)) => {
                let alpha = alpha.clamp(0.0, 1.0);
                ClockOffset {
                    offset_ms: alpha * sample.offset_ms + (1.0 - alpha) * prev.offset_ms,
                    latency_ms: alpha * sample.latency_ms + (1.0 - alpha) * prev.latency_ms,
                    measured_at_local: now_ms,
                }
            }
            _ => sample,
        };

        if self
            .outstanding
            .is_some_and(|p| (p.client_send_time - client_send_time).abs() < f64::EPSILON)
        {
            self.outstanding = None;
        }
        self.responses += 1;
        self.offset = Some(estimate);

        tracing::debug!(
            offset_ms = estimate.offset_ms,
            latency_ms = estimate.latency_ms,
            "clock offset updated"
        );

        estimate
    }

    /// Forget the current estimate (transport closed).
    pub fn invalidate(&mut self) {
        self.offset = None;
        self.outstanding = None;
    }

    /// Current estimate, if synchronized.
    #[must_use]
    pub fn offset(&self) -> Option<ClockOffset> {
        self.offset
    }

    /// Whether an offset is known.
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.offset.is_some()
    }

    /// Most recent unanswered probe.
    #[must_use]
    pub fn outstanding(&self) -> Option<SyncProbe> {
        self.outstanding
    }

    /// Number of probes issued.
    #[must_use]
    pub fn probes_sent(&self) -> u64 {
        self.probes_sent
    }

    /// Number of responses processed.
    #[must_use]
    pub fn responses(&self) -> u64 {
        self.responses
    }
}

impl Default for ClockSyncEstimator {
    fn default() -> Self {
        Self::new(OffsetSmoothing::Latest)
    }
}
