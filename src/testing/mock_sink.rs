//! Scriptable in-memory media sink

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::clock::MonotonicClock;
use crate::error::SinkError;
use crate::sink::{MediaSink, SinkEvent};

/// A request the session made to the sink
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    /// `play()`
    Play,
    /// `pause()`
    Pause,
    /// `seek(position)`
    Seek(Duration),
    /// `set_rate(rate)`
    SetRate(f64),
}

/// A sink call with the clock time it happened at
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// What was called
    pub call: SinkCall,
    /// Clock time of the call (0 without a clock)
    pub at_ms: f64,
}

#[derive(Debug)]
struct MockSinkState {
    paused: bool,
    /// Position at `base_at_ms`
    base_position: Duration,
    base_at_ms: f64,
    rate: f64,
    duration: Duration,
    calls: Vec<RecordedCall>,
    queued_events: Vec<SinkEvent>,
    fail_play: Option<SinkError>,
    fail_seek: Option<SinkError>,
}

/// Mock media sink.
///
/// Behaves like a media element: position advances with the attached clock
/// while playing, and `play`/`pause`/`seek` emit the same events a user
/// action would. Events go to the attached sender, or are queued for
/// [`take_events`](Self::take_events) when there is none.
///
/// Clones share state, so a test can keep one handle while the session owns
/// another.
#[derive(Clone)]
pub struct MockSink {
    state: Arc<Mutex<MockSinkState>>,
    clock: Option<Arc<dyn MonotonicClock>>,
    events: Option<mpsc::UnboundedSender<SinkEvent>>,
}

impl MockSink {
    /// Paused at zero with no clock; position only changes on seek
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockSinkState {
                paused: true,
                base_position: Duration::ZERO,
                base_at_ms: 0.0,
                rate: 1.0,
                duration: Duration::ZERO,
                calls: Vec::new(),
                queued_events: Vec::new(),
                fail_play: None,
                fail_seek: None,
            })),
            clock: None,
            events: None,
        }
    }

    /// Advance position with `clock` while playing
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn MonotonicClock>) -> Self {
        let now = clock.now_ms();
        self.lock().base_at_ms = now;
        self.clock = Some(clock);
        self
    }

    /// Set media duration
    #[must_use]
    pub fn with_duration(self, duration: Duration) -> Self {
        self.lock().duration = duration;
        self
    }

    /// Deliver events to `tx` instead of queueing them
    #[must_use]
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<SinkEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockSinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> f64 {
        self.clock.as_ref().map_or(0.0, |c| c.now_ms())
    }

    fn emit(&self, state: &mut MockSinkState, event: SinkEvent) {
        match &self.events {
            Some(tx) => {
                let _ = tx.send(event);
            }
            None => state.queued_events.push(event),
        }
    }

    fn position_at(state: &MockSinkState, now: f64) -> Duration {
        if state.paused {
            return state.base_position;
        }
        let elapsed_s = ((now - state.base_at_ms) / 1000.0).max(0.0) * state.rate;
        let position = state.base_position + Duration::from_secs_f64(elapsed_s);
        if state.duration > Duration::ZERO {
            position.min(state.duration)
        } else {
            position
        }
    }

    /// Fold elapsed playback into the base position
    fn rebase(state: &mut MockSinkState, now: f64) {
        state.base_position = Self::position_at(state, now);
        state.base_at_ms = now;
    }

    fn record(state: &mut MockSinkState, call: SinkCall, now: f64) {
        state.calls.push(RecordedCall { call, at_ms: now });
    }

    /// Every call the session made so far
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Calls without timestamps
    #[must_use]
    pub fn call_kinds(&self) -> Vec<SinkCall> {
        self.lock().calls.iter().map(|c| c.call.clone()).collect()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Drain queued events
    #[must_use]
    pub fn take_events(&self) -> Vec<SinkEvent> {
        std::mem::take(&mut self.lock().queued_events)
    }

    /// Current playback rate
    #[must_use]
    pub fn rate(&self) -> f64 {
        self.lock().rate
    }

    /// Jump to `position` without emitting events or recording a call
    pub fn set_position(&self, position: Duration) {
        let now = self.now();
        let mut state = self.lock();
        state.base_position = position;
        state.base_at_ms = now;
    }

    /// Set paused state without emitting events or recording a call
    pub fn set_paused(&self, paused: bool) {
        let now = self.now();
        let mut state = self.lock();
        Self::rebase(&mut state, now);
        state.paused = paused;
    }

    /// Make the next `play()` fail with `err`
    pub fn fail_next_play(&self, err: SinkError) {
        self.lock().fail_play = Some(err);
    }

    /// Make the next `seek()` fail with `err`
    pub fn fail_next_seek(&self, err: SinkError) {
        self.lock().fail_seek = Some(err);
    }

    /// Simulate the user pressing play on the sink itself
    pub fn user_play(&self) {
        let now = self.now();
        let mut state = self.lock();
        if state.paused {
            Self::rebase(&mut state, now);
            state.paused = false;
            self.emit(&mut state, SinkEvent::Play);
        }
    }

    /// Simulate the user pressing pause on the sink itself
    pub fn user_pause(&self) {
        let now = self.now();
        let mut state = self.lock();
        if !state.paused {
            Self::rebase(&mut state, now);
            state.paused = true;
            self.emit(&mut state, SinkEvent::Pause);
        }
    }

    /// Simulate the user dragging the scrubber to `position`
    pub fn user_seek(&self, position: Duration) {
        let now = self.now();
        let mut state = self.lock();
        state.base_position = position;
        state.base_at_ms = now;
        self.emit(&mut state, SinkEvent::Seeking);
        self.emit(&mut state, SinkEvent::Seeked);
    }

    /// Report that media finished loading
    pub fn load(&self) {
        let mut state = self.lock();
        self.emit(&mut state, SinkEvent::MetadataLoaded);
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MockSink")
            .field("paused", &state.paused)
            .field("base_position", &state.base_position)
            .field("rate", &state.rate)
            .finish_non_exhaustive()
    }
}

impl MediaSink for MockSink {
    fn play(&mut self) -> Result<(), SinkError> {
        let now = self.now();
        let mut state = self.lock();
        Self::record(&mut state, SinkCall::Play, now);
        if let Some(err) = state.fail_play.take() {
            return Err(err);
        }
        if state.paused {
            Self::rebase(&mut state, now);
            state.paused = false;
            self.emit(&mut state, SinkEvent::Play);
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), SinkError> {
        let now = self.now();
        let mut state = self.lock();
        Self::record(&mut state, SinkCall::Pause, now);
        if !state.paused {
            Self::rebase(&mut state, now);
            state.paused = true;
            self.emit(&mut state, SinkEvent::Pause);
        }
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<(), SinkError> {
        let now = self.now();
        let mut state = self.lock();
        Self::record(&mut state, SinkCall::Seek(position), now);
        if let Some(err) = state.fail_seek.take() {
            return Err(err);
        }
        state.base_position = position;
        state.base_at_ms = now;
        self.emit(&mut state, SinkEvent::Seeking);
        self.emit(&mut state, SinkEvent::Seeked);
        Ok(())
    }

    fn position(&self) -> Duration {
        let now = self.now();
        Self::position_at(&self.lock(), now)
    }

    fn duration(&self) -> Duration {
        self.lock().duration
    }

    fn is_paused(&self) -> bool {
        self.lock().paused
    }

    fn set_rate(&mut self, rate: f64) -> Result<(), SinkError> {
        let now = self.now();
        let mut state = self.lock();
        Self::record(&mut state, SinkCall::SetRate(rate), now);
        if !(0.25..=4.0).contains(&rate) {
            return Err(SinkError::RateRejected { rate });
        }
        Self::rebase(&mut state, now);
        state.rate = rate;
        Ok(())
    }
}
