//! Deadline-scheduled command execution.
//!
//! Converts a local deadline into a single firing with two tiers of
//! precision: a coarse timer that wakes shortly before the deadline, then
//! per-frame polling that fires once the deadline is within the pre-buffer
//! window. Deadlines already in the past are handed back immediately with how
//! late they are, so the caller can apply late-start compensation.
//!
//! At most one schedule is pending; scheduling again cancels the previous one.

use std::time::Duration;

use crate::types::SyncConfig;

#[cfg(test)]
mod tests;

/// Identifies one call to [`ScheduledCommandExecutor::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleHandle(u64);

/// Precision tier of a pending schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchedulePhase {
    /// Waiting on the coarse timer, which wakes at `wake_at`.
    Coarse {
        /// Local time the coarse timer fires
        wake_at: f64,
    },
    /// Polled on every frame until the deadline is within the pre-buffer.
    Fine,
}

/// What `schedule` decided.
#[derive(Debug)]
pub enum ScheduleOutcome<A> {
    /// The deadline has passed; run `action` now and compensate for `late_by_ms`.
    Late {
        /// The action to run
        action: A,
        /// How far past the deadline we already are
        late_by_ms: f64,
    },
    /// The deadline is inside the pre-buffer window; run `action` now.
    Due {
        /// The action to run
        action: A,
    },
    /// The action is pending; drive it with `next_wake` / `poll`.
    Deferred {
        /// Handle of the pending schedule
        handle: ScheduleHandle,
        /// Initial precision tier
        phase: SchedulePhase,
    },
}

/// A schedule that fired from `poll`.
#[derive(Debug)]
pub struct Fired<A> {
    /// The scheduled action
    pub action: A,
    /// The local deadline it was scheduled for
    pub deadline: f64,
    /// Local time it fired
    pub fired_at: f64,
}

#[derive(Debug)]
struct Pending<A> {
    handle: ScheduleHandle,
    deadline: f64,
    action: A,
    phase: SchedulePhase,
}

/// Two-tier deadline executor holding at most one pending action.
#[derive(Debug)]
pub struct ScheduledCommandExecutor<A> {
    pending: Option<Pending<A>>,
    /// Deadlines further than this start on the coarse timer (ms)
    coarse_threshold_ms: f64,
    /// Coarse timer fires this early (ms)
    coarse_lead_ms: f64,
    /// Fine polling fires within this window of the deadline (ms)
    pre_buffer_ms: f64,
    next_handle: u64,
    cancelled: u64,
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl<A> ScheduledCommandExecutor<A> {
    /// Create an executor with explicit tuning.
    #[must_use]
    pub fn new(coarse_threshold: Duration, coarse_lead: Duration, pre_buffer: Duration) -> Self {
        Self {
            pending: None,
            coarse_threshold_ms: millis(coarse_threshold),
            coarse_lead_ms: millis(coarse_lead),
            pre_buffer_ms: millis(pre_buffer),
            next_handle: 1,
            cancelled: 0,
        }
    }

    /// Create an executor from session config.
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.coarse_threshold,
            config.coarse_lead,
            config.fine_pre_buffer,
        )
    }

    /// Schedule `action` for `local_deadline`, cancelling anything pending.
    pub fn schedule(&mut self, local_deadline: f64, action: A, now_ms: f64) -> ScheduleOutcome<A> {
        self.cancel();

        let delay = local_deadline - now_ms;
        if delay <= 0.0 {
            return ScheduleOutcome::Late {
                action,
                late_by_ms: -delay,
            };
        }
        if delay <= self.pre_buffer_ms {
            return ScheduleOutcome::Due { action };
        }

        let phase = if delay > self.coarse_threshold_ms {
            SchedulePhase::Coarse {
                wake_at: local_deadline - self.coarse_lead_ms,
            }
        } else {
            SchedulePhase::Fine
        };

        let handle = ScheduleHandle(self.next_handle);
        self.next_handle += 1;
        self.pending = Some(Pending {
            handle,
            deadline: local_deadline,
            action,
            phase,
        });

        tracing::trace!(delay_ms = delay, ?phase, "scheduled deadline");
        ScheduleOutcome::Deferred { handle, phase }
    }

    /// Advance the pending schedule; returns the action once it is due.
    pub fn poll(&mut self, now_ms: f64) -> Option<Fired<A>> {
        let pending = self.pending.as_mut()?;

        if let SchedulePhase::Coarse { wake_at } = pending.phase {
            if now_ms < wake_at {
                return None;
            }
            pending.phase = SchedulePhase::Fine;
        }

        if now_ms < pending.deadline - self.pre_buffer_ms {
            return None;
        }

        let pending = self.pending.take()?;
        Some(Fired {
            action: pending.action,
            deadline: pending.deadline,
            fired_at: now_ms,
        })
    }

    /// Cancel the pending schedule. Returns `true` if one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                self.cancelled += 1;
                tracing::debug!(
                    deadline = pending.deadline,
                    "cancelled pending scheduled command"
                );
                true
            }
            None => false,
        }
    }

    /// When the coarse timer should fire, if the pending schedule is on it.
    #[must_use]
    pub fn next_wake(&self) -> Option<f64> {
        match self.pending.as_ref()?.phase {
            SchedulePhase::Coarse { wake_at } => Some(wake_at),
            SchedulePhase::Fine => None,
        }
    }

    /// Whether the pending schedule needs per-frame polling.
    #[must_use]
    pub fn needs_frames(&self) -> bool {
        matches!(
            self.pending.as_ref().map(|p| p.phase),
            Some(SchedulePhase::Fine)
        )
    }

    /// Whether an action is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Deadline of the pending action.
    #[must_use]
    pub fn deadline(&self) -> Option<f64> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// Handle of the pending action.
    #[must_use]
    pub fn pending_handle(&self) -> Option<ScheduleHandle> {
        self.pending.as_ref().map(|p| p.handle)
    }

    /// Borrow the pending action.
    #[must_use]
    pub fn pending_action(&self) -> Option<&A> {
        self.pending.as_ref().map(|p| &p.action)
    }

    /// Number of schedules cancelled so far.
    #[must_use]
    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}
