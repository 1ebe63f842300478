//! Playback drift measurement and correction.
//!
//! Drift compares where the sink *is* against where the shared timeline says
//! it should be. The timeline is anchored at the coordinator timestamp of the
//! last applied play: the local reference is that timestamp translated through
//! the current clock offset, so a late start is already accounted for.
//!
//! ```text
//!   expected = (anchor.start - offset) + (sink_position - anchor.position)
//!   drift    = now - expected
//! ```
//!
//! Positive drift means the sink is behind the timeline and should speed up.

use std::time::Duration;

use crate::types::{ClockOffset, SyncConfig};

#[cfg(test)]
mod tests;

/// Reference point of the shared timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineAnchor {
    /// Coordinator time at which `position` was (or is to be) playing
    pub coordinator_start_ms: f64,
    /// Media position at `coordinator_start_ms`
    pub position: Duration,
}

impl TimelineAnchor {
    /// Create an anchor.
    #[must_use]
    pub fn new(coordinator_start_ms: f64, position: Duration) -> Self {
        Self {
            coordinator_start_ms,
            position,
        }
    }

    /// Local time corresponding to the anchor under `offset`.
    #[must_use]
    pub fn local_reference(&self, offset: &ClockOffset) -> f64 {
        offset.to_local(self.coordinator_start_ms)
    }

    /// Position the timeline prescribes at local time `now_ms`.
    #[must_use]
    pub fn expected_position(&self, offset: &ClockOffset, now_ms: f64) -> Duration {
        let elapsed_s = (now_ms - self.local_reference(offset)) / 1000.0;
        let secs = self.position.as_secs_f64() + elapsed_s;
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// One drift measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftSample {
    /// Local time of the measurement
    pub measured_at: f64,
    /// Local time the sink's current position implies
    pub expected_ms: f64,
    /// Time since the timeline's local reference
    pub elapsed_since_reference_ms: f64,
    /// `measured_at - expected_ms`
    pub drift_ms: f64,
}

/// A temporary playback-rate correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateNudge {
    /// Drift that triggered the nudge
    pub drift_ms: f64,
    /// Rate to apply
    pub rate: f64,
    /// Local time at which the rate reverts to 1.0
    pub revert_at: f64,
}

/// Outcome of a drift check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriftAction {
    /// Within tolerance
    None,
    /// Small drift; adjust playback rate
    Nudge(RateNudge),
    /// Large drift; the clock offset is stale and must be re-probed
    Resync {
        /// Observed drift
        drift_ms: f64,
    },
}

/// Tracks drift against the anchored timeline and manages rate nudges.
#[derive(Debug)]
pub struct DriftMonitor {
    anchor: Option<TimelineAnchor>,
    nudge_threshold_ms: f64,
    resync_threshold_ms: f64,
    gain: f64,
    min_rate: f64,
    max_rate: f64,
    revert_after_ms: f64,
    /// Pending revert of the current nudge
    revert_at: Option<f64>,
    current_rate: f64,
    last_sample: Option<DriftSample>,
    nudges: u64,
    resyncs: u64,
}

impl DriftMonitor {
    /// Create a monitor from session config.
    #[must_use]
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            anchor: None,
            nudge_threshold_ms: config.nudge_threshold.as_secs_f64() * 1000.0,
            resync_threshold_ms: config.resync_threshold.as_secs_f64() * 1000.0,
            gain: config.rate_gain,
            min_rate: config.min_rate,
            max_rate: config.max_rate,
            revert_after_ms: config.rate_revert_after.as_secs_f64() * 1000.0,
            revert_at: None,
            current_rate: 1.0,
            last_sample: None,
            nudges: 0,
            resyncs: 0,
        }
    }

    /// Anchor the timeline (a play was applied).
    pub fn set_anchor(&mut self, anchor: TimelineAnchor) {
        tracing::debug!(
            coordinator_start_ms = anchor.coordinator_start_ms,
            position = ?anchor.position,
            "timeline anchored"
        );
        self.anchor = Some(anchor);
        self.last_sample = None;
    }

    /// Drop the anchor (paused or disconnected). Drift checks become no-ops.
    pub fn clear_anchor(&mut self) {
        self.anchor = None;
        self.last_sample = None;
    }

    /// Current anchor.
    #[must_use]
    pub fn anchor(&self) -> Option<TimelineAnchor> {
        self.anchor
    }

    /// Measure drift without acting on it.
    #[must_use]
    pub fn sample(
        &self,
        now_ms: f64,
        offset: &ClockOffset,
        sink_position: Duration,
    ) -> Option<DriftSample> {
        let anchor = self.anchor?;
        let local_reference = anchor.local_reference(offset);
        let media_elapsed_ms =
            (sink_position.as_secs_f64() - anchor.position.as_secs_f64()) * 1000.0;
        let expected_ms = local_reference + media_elapsed_ms;

        Some(DriftSample {
            measured_at: now_ms,
            expected_ms,
            elapsed_since_reference_ms: now_ms - local_reference,
            drift_ms: now_ms - expected_ms,
        })
    }

    /// Measure drift and decide on a correction.
    ///
    /// A nudge arms (or re-arms) the revert timer; see [`poll_revert`](Self::poll_revert).
    pub fn check(
        &mut self,
        now_ms: f64,
        offset: &ClockOffset,
        sink_position: Duration,
    ) -> DriftAction {
        let Some(sample) = self.sample(now_ms, offset, sink_position) else {
            return DriftAction::None;
        };
        self.last_sample = Some(sample);

        let drift_ms = sample.drift_ms;
        let magnitude = drift_ms.abs();

        if magnitude > self.resync_threshold_ms {
            self.resyncs += 1;
            tracing::debug!(drift_ms, "drift past resync threshold");
            return DriftAction::Resync { drift_ms };
        }

        if magnitude > self.nudge_threshold_ms {
            let rate = self.rate_for_drift(drift_ms);
            let revert_at = now_ms + self.revert_after_ms;
            self.current_rate = rate;
            self.revert_at = Some(revert_at);
            self.nudges += 1;
            tracing::debug!(drift_ms, rate, "nudging playback rate");
            return DriftAction::Nudge(RateNudge {
                drift_ms,
                rate,
                revert_at,
            });
        }

        DriftAction::None
    }

    /// Rate that corrects `drift_ms`, clamped to the configured bounds.
    #[must_use]
    pub fn rate_for_drift(&self, drift_ms: f64) -> f64 {
        (1.0 + (drift_ms / 1000.0) * self.gain).clamp(self.min_rate, self.max_rate)
    }

    /// Returns `true` exactly once when the pending revert comes due.
    pub fn poll_revert(&mut self, now_ms: f64) -> bool {
        match self.revert_at {
            Some(at) if now_ms >= at => {
                self.revert_at = None;
                self.current_rate = 1.0;
                true
            }
            _ => false,
        }
    }

    /// Drop the pending revert and reset the tracked rate.
    pub fn cancel_revert(&mut self) {
        self.revert_at = None;
        self.current_rate = 1.0;
    }

    /// When the pending revert is due.
    #[must_use]
    pub fn next_revert(&self) -> Option<f64> {
        self.revert_at
    }

    /// Rate most recently applied by a nudge (1.0 when none is active).
    #[must_use]
    pub fn current_rate(&self) -> f64 {
        self.current_rate
    }

    /// Most recent sample taken by [`check`](Self::check).
    #[must_use]
    pub fn last_sample(&self) -> Option<DriftSample> {
        self.last_sample
    }

    /// Number of nudges issued.
    #[must_use]
    pub fn nudges(&self) -> u64 {
        self.nudges
    }

    /// Number of resync requests issued.
    #[must_use]
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }
}
