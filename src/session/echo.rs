//! Tagging of sink actions the session causes itself.
//!
//! Every sink request the session issues produces a sink event that looks
//! exactly like user interaction. Before issuing one, the session records an
//! expectation tagged with the command that caused it; the matching event
//! consumes the expectation instead of being re-broadcast. Expectations are
//! counted, so overlapping actions each absorb exactly one event.

use std::collections::VecDeque;
use std::time::Duration;

use crate::types::{CommandId, CommandType};

#[derive(Debug, Clone)]
struct Expected {
    kind: CommandType,
    cause: Option<CommandId>,
    expires_at: f64,
}

/// Outstanding expectations of engine-caused sink events.
#[derive(Debug)]
pub struct EchoTracker {
    pending: VecDeque<Expected>,
    window_ms: f64,
}

impl EchoTracker {
    /// Create a tracker whose expectations lapse after `window`.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            pending: VecDeque::new(),
            window_ms: window.as_secs_f64() * 1000.0,
        }
    }

    /// Expect one `kind` event caused by `cause`.
    pub fn expect(&mut self, kind: CommandType, cause: Option<CommandId>, now_ms: f64) {
        self.pending.push_back(Expected {
            kind,
            cause,
            expires_at: now_ms + self.window_ms,
        });
    }

    /// Withdraw the most recent `kind` expectation (the sink call failed).
    pub fn retract(&mut self, kind: CommandType) {
        if let Some(idx) = self.pending.iter().rposition(|e| e.kind == kind) {
            self.pending.remove(idx);
        }
    }

    /// Match a sink event against the oldest live expectation of its kind.
    ///
    /// Returns `Some(cause)` when the event was engine-caused.
    pub fn consume(&mut self, kind: CommandType, now_ms: f64) -> Option<Option<CommandId>> {
        self.pending.retain(|e| e.expires_at > now_ms);
        let idx = self.pending.iter().position(|e| e.kind == kind)?;
        self.pending.remove(idx).map(|e| e.cause)
    }

    /// Number of live expectations of `kind`.
    #[must_use]
    pub fn outstanding(&self, kind: CommandType, now_ms: f64) -> usize {
        self.pending
            .iter()
            .filter(|e| e.kind == kind && e.expires_at > now_ms)
            .count()
    }

    /// Drop every expectation.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
