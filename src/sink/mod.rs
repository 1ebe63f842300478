//! The media sink seam.
//!
//! A sink is whatever actually renders the media. The session only issues
//! requests to it and reads back its reported state; it never assumes a
//! request took effect synchronously.

use std::time::Duration;

use crate::error::SinkError;

/// Playback capability consumed by a sync session.
pub trait MediaSink: Send {
    /// Start or resume playback
    ///
    /// # Errors
    ///
    /// Returns an error if playback could not be started.
    fn play(&mut self) -> Result<(), SinkError>;

    /// Pause playback
    ///
    /// # Errors
    ///
    /// Returns an error if playback could not be paused.
    fn pause(&mut self) -> Result<(), SinkError>;

    /// Move to `position`
    ///
    /// # Errors
    ///
    /// Returns an error if the sink rejected the seek.
    fn seek(&mut self, position: Duration) -> Result<(), SinkError>;

    /// Current playback position
    fn position(&self) -> Duration;

    /// Media duration (zero when unknown)
    fn duration(&self) -> Duration;

    /// Whether playback is paused
    fn is_paused(&self) -> bool;

    /// Set the playback rate (1.0 is normal speed)
    ///
    /// # Errors
    ///
    /// Returns an error if the rate is not supported.
    fn set_rate(&mut self, rate: f64) -> Result<(), SinkError>;

    /// Read position, duration and paused state together
    fn snapshot(&self) -> SinkSnapshot {
        SinkSnapshot {
            position: self.position(),
            duration: self.duration(),
            paused: self.is_paused(),
        }
    }
}

impl<S: MediaSink + ?Sized> MediaSink for Box<S> {
    fn play(&mut self) -> Result<(), SinkError> {
        (**self).play()
    }

    fn pause(&mut self) -> Result<(), SinkError> {
        (**self).pause()
    }

    fn seek(&mut self, position: Duration) -> Result<(), SinkError> {
        (**self).seek(position)
    }

    fn position(&self) -> Duration {
        (**self).position()
    }

    fn duration(&self) -> Duration {
        (**self).duration()
    }

    fn is_paused(&self) -> bool {
        (**self).is_paused()
    }

    fn set_rate(&mut self, rate: f64) -> Result<(), SinkError> {
        (**self).set_rate(rate)
    }
}

/// Events a sink reports back to the session.
///
/// Emitted both for user interaction and for actions the session itself
/// requested; the session tells them apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SinkEvent {
    /// A seek started
    Seeking,
    /// A seek completed
    Seeked,
    /// Playback started
    Play,
    /// Playback paused
    Pause,
    /// Periodic position report
    TimeUpdate(Duration),
    /// Enough media is loaded to start playback
    MetadataLoaded,
}

/// Point-in-time view of a sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinkSnapshot {
    /// Playback position
    pub position: Duration,
    /// Media duration
    pub duration: Duration,
    /// Whether playback is paused
    pub paused: bool,
}
