use crate::clock::OffsetSmoothing;
use std::time::Duration;

/// Configuration for sync session behavior
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Deadlines further away than this use the coarse timer first (default: 100ms)
    pub coarse_threshold: Duration,

    /// How early the coarse timer fires before the deadline (default: 20ms)
    pub coarse_lead: Duration,

    /// Fine-grained polling fires once within this window of the deadline (default: 30ms)
    pub fine_pre_buffer: Duration,

    /// Period of the fine-grained frame poll (default: 16ms)
    pub frame_interval: Duration,

    /// Interval between drift checks (default: 500ms)
    pub drift_check_interval: Duration,

    /// Drift above which a rate nudge is applied (default: 50ms)
    pub nudge_threshold: Duration,

    /// Drift above which the clock offset is considered stale (default: 100ms)
    pub resync_threshold: Duration,

    /// How long drift checks wait for a re-probe answer before probing again (default: 1s)
    pub resync_timeout: Duration,

    /// Proportional gain applied to drift in seconds (default: 0.1)
    pub rate_gain: f64,

    /// Lowest playback rate a nudge may set (default: 0.9)
    pub min_rate: f64,

    /// Highest playback rate a nudge may set (default: 1.1)
    pub max_rate: f64,

    /// Delay after the last nudge before the rate reverts to 1.0 (default: 2 seconds)
    pub rate_revert_after: Duration,

    /// How long applied command ids are remembered (default: 5 seconds)
    pub dedup_retention: Duration,

    /// Minimum spacing between outbound seek intents (default: 1 second)
    pub seek_throttle: Duration,

    /// Wait after a user seek before reading the final position (default: 100ms)
    pub seek_settle: Duration,

    /// Interval between heartbeats (default: 5 seconds)
    pub heartbeat_interval: Duration,

    /// Minimum spacing between periodic status reports (default: 1 second)
    pub status_interval: Duration,

    /// Position error tolerated before a corrective seek (default: 100ms)
    pub position_tolerance: Duration,

    /// Delay before acknowledging an applied command (default: 100ms)
    pub ack_delay: Duration,

    /// Delay before reporting position after a seek completes (default: 50ms)
    pub seeked_report_delay: Duration,

    /// How long an engine-issued sink action waits for its echo event (default: 1 second)
    pub echo_window: Duration,

    /// Offset estimate policy (default: latest sample wins)
    pub offset_smoothing: OffsetSmoothing,

    /// Announce readiness again after a reconnect (default: false)
    pub reannounce_on_reconnect: bool,

    /// Pause and rewind an autoplaying sink when the session opens (default: true)
    pub pause_on_open: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            coarse_threshold: Duration::from_millis(100),
            coarse_lead: Duration::from_millis(20),
            fine_pre_buffer: Duration::from_millis(30),
            frame_interval: Duration::from_millis(16),
            drift_check_interval: Duration::from_millis(500),
            nudge_threshold: Duration::from_millis(50),
            resync_threshold: Duration::from_millis(100),
            resync_timeout: Duration::from_secs(1),
            rate_gain: 0.1,
            min_rate: 0.9,
            max_rate: 1.1,
            rate_revert_after: Duration::from_secs(2),
            dedup_retention: Duration::from_secs(5),
            seek_throttle: Duration::from_secs(1),
            seek_settle: Duration::from_millis(100),
            heartbeat_interval: Duration::from_secs(5),
            status_interval: Duration::from_secs(1),
            position_tolerance: Duration::from_millis(100),
            ack_delay: Duration::from_millis(100),
            seeked_report_delay: Duration::from_millis(50),
            echo_window: Duration::from_secs(1),
            offset_smoothing: OffsetSmoothing::Latest,
            reannounce_on_reconnect: false,
            pause_on_open: true,
        }
    }
}

impl SyncConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }
}

/// Builder for `SyncConfig`
#[derive(Debug, Clone, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    /// Set the coarse scheduling threshold and lead
    #[must_use]
    pub fn coarse_timer(mut self, threshold: Duration, lead: Duration) -> Self {
        self.config.coarse_threshold = threshold;
        self.config.coarse_lead = lead;
        self
    }

    /// Set the fine-grained pre-buffer window
    #[must_use]
    pub fn fine_pre_buffer(mut self, window: Duration) -> Self {
        self.config.fine_pre_buffer = window;
        self
    }

    /// Set the frame poll period
    #[must_use]
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.config.frame_interval = interval;
        self
    }

    /// Set the drift check interval
    #[must_use]
    pub fn drift_check_interval(mut self, interval: Duration) -> Self {
        self.config.drift_check_interval = interval;
        self
    }

    /// Set nudge and resync drift thresholds
    #[must_use]
    pub fn drift_thresholds(mut self, nudge: Duration, resync: Duration) -> Self {
        self.config.nudge_threshold = nudge;
        self.config.resync_threshold = resync;
        self
    }

    /// Set how long to wait for a drift re-probe answer
    #[must_use]
    pub fn resync_timeout(mut self, timeout: Duration) -> Self {
        self.config.resync_timeout = timeout;
        self
    }

    /// Set rate nudge gain and bounds
    #[must_use]
    pub fn rate_nudge(mut self, gain: f64, min_rate: f64, max_rate: f64) -> Self {
        self.config.rate_gain = gain;
        self.config.min_rate = min_rate;
        self.config.max_rate = max_rate;
        self
    }

    /// Set how long a nudge lasts before reverting
    #[must_use]
    pub fn rate_revert_after(mut self, delay: Duration) -> Self {
        self.config.rate_revert_after = delay;
        self
    }

    /// Set command id retention window
    #[must_use]
    pub fn dedup_retention(mut self, retention: Duration) -> Self {
        self.config.dedup_retention = retention;
        self
    }

    /// Set seek intent throttle window
    #[must_use]
    pub fn seek_throttle(mut self, window: Duration) -> Self {
        self.config.seek_throttle = window;
        self
    }

    /// Set heartbeat interval
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Set periodic status report interval
    #[must_use]
    pub fn status_interval(mut self, interval: Duration) -> Self {
        self.config.status_interval = interval;
        self
    }

    /// Set position tolerance for corrective seeks
    #[must_use]
    pub fn position_tolerance(mut self, tolerance: Duration) -> Self {
        self.config.position_tolerance = tolerance;
        self
    }

    /// Set the offset smoothing policy
    #[must_use]
    pub fn offset_smoothing(mut self, smoothing: OffsetSmoothing) -> Self {
        self.config.offset_smoothing = smoothing;
        self
    }

    /// Announce readiness again after every reconnect
    #[must_use]
    pub fn reannounce_on_reconnect(mut self, enable: bool) -> Self {
        self.config.reannounce_on_reconnect = enable;
        self
    }

    /// Pause an autoplaying sink when the session opens
    #[must_use]
    pub fn pause_on_open(mut self, enable: bool) -> Self {
        self.config.pause_on_open = enable;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> SyncConfig {
        self.config
    }
}
