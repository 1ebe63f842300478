//! Coalescing of user seek bursts.
//!
//! Dragging a scrubber produces a stream of seek events. The first one arms a
//! flush after a short settle delay and the rest of the burst is absorbed;
//! the flush reads the sink position when it fires, so the final position is
//! what gets sent. Flushes are spaced at least one window apart.

use std::time::Duration;

/// Trailing-edge seek throttle.
#[derive(Debug)]
pub struct SeekThrottle {
    window_ms: f64,
    settle_ms: f64,
    last_sent: Option<f64>,
    flush_at: Option<f64>,
}

impl SeekThrottle {
    /// Create a throttle sending at most once per `window`, `settle` after the first seek.
    #[must_use]
    pub fn new(window: Duration, settle: Duration) -> Self {
        Self {
            window_ms: window.as_secs_f64() * 1000.0,
            settle_ms: settle.as_secs_f64() * 1000.0,
            last_sent: None,
            flush_at: None,
        }
    }

    /// Record a user seek. Returns the flush time if this seek armed one.
    pub fn note_seek(&mut self, now_ms: f64) -> Option<f64> {
        if self.flush_at.is_some() {
            return None;
        }
        let earliest = self.last_sent.map_or(f64::MIN, |t| t + self.window_ms);
        let at = (now_ms + self.settle_ms).max(earliest);
        self.flush_at = Some(at);
        Some(at)
    }

    /// Take the pending flush if it is due.
    pub fn poll(&mut self, now_ms: f64) -> bool {
        match self.flush_at {
            Some(at) if now_ms >= at => {
                self.flush_at = None;
                self.last_sent = Some(now_ms);
                true
            }
            _ => false,
        }
    }

    /// When the pending flush is due.
    #[must_use]
    pub fn next_flush(&self) -> Option<f64> {
        self.flush_at
    }

    /// Drop the pending flush.
    pub fn cancel(&mut self) {
        self.flush_at = None;
    }
}
