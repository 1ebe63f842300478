//! Tokio driver for a [`SyncSession`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};

use super::SyncSession;
use crate::clock::{MonotonicClock, TokioClock};
use crate::error::{Result, SyncError};
use crate::sink::{MediaSink, SinkEvent};
use crate::state::{EventBus, SessionEvent, SessionStatus};
use crate::transport::TransportChannel;
use crate::types::CommandId;

/// Requests from a [`SessionHandle`] to its driver.
#[derive(Debug)]
pub(crate) enum SessionRequest {
    Play(oneshot::Sender<Result<CommandId>>),
    Pause(oneshot::Sender<Result<CommandId>>),
    Seek(Duration, oneshot::Sender<Result<CommandId>>),
    Sync(oneshot::Sender<Result<()>>),
}

/// Control handle for a running [`SessionDriver`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    requests: mpsc::UnboundedSender<SessionRequest>,
    shutdown: Arc<watch::Sender<bool>>,
    status: watch::Receiver<SessionStatus>,
    events: EventBus,
}

impl SessionHandle {
    async fn request<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<R>>) -> SessionRequest,
    ) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(make(tx))
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)?
    }

    /// Ask the coordinator to start everyone at this client's position.
    ///
    /// # Errors
    ///
    /// Fails if the session is not connected and synchronized, or has stopped.
    pub async fn play(&self) -> Result<CommandId> {
        self.request(SessionRequest::Play).await
    }

    /// Ask the coordinator to pause everyone.
    ///
    /// # Errors
    ///
    /// Fails if the session is not connected and synchronized, or has stopped.
    pub async fn pause(&self) -> Result<CommandId> {
        self.request(SessionRequest::Pause).await
    }

    /// Ask the coordinator to move everyone to `position`.
    ///
    /// # Errors
    ///
    /// Fails if the session is not connected and synchronized, or has stopped.
    pub async fn seek(&self, position: Duration) -> Result<CommandId> {
        self.request(|tx| SessionRequest::Seek(position, tx)).await
    }

    /// Re-run the clock probe.
    ///
    /// # Errors
    ///
    /// Fails if the transport is not open or the session has stopped.
    pub async fn resync(&self) -> Result<()> {
        self.request(SessionRequest::Sync).await
    }

    /// Current status line
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Subscribe to session events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stop the driver. Pending commands are cancelled and the transport closed.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Runs a [`SyncSession`] against a transport on the tokio runtime.
///
/// Owns the timers the session asks for: the coarse wake-up, per-frame
/// polling while a deadline is close, drift checks and heartbeats.
pub struct SessionDriver<S, T> {
    session: SyncSession<S>,
    transport: T,
    clock: TokioClock,
    sink_events: mpsc::UnboundedReceiver<SinkEvent>,
    requests: mpsc::UnboundedReceiver<SessionRequest>,
    shutdown: watch::Receiver<bool>,
    transport_done: bool,
}

impl<S: MediaSink, T: TransportChannel> SessionDriver<S, T> {
    /// Wrap `session`. `sink_events` must receive everything the sink reports.
    pub fn new(
        session: SyncSession<S>,
        transport: T,
        sink_events: mpsc::UnboundedReceiver<SinkEvent>,
    ) -> (Self, SessionHandle) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = SessionHandle {
            requests: request_tx,
            shutdown: Arc::new(shutdown_tx),
            status: session.subscribe_status(),
            events: session.events().clone(),
        };
        let driver = Self {
            session,
            transport,
            clock: TokioClock::new(),
            sink_events,
            requests: request_rx,
            shutdown: shutdown_rx,
            transport_done: false,
        };
        (driver, handle)
    }

    /// Use `clock` as the local time source.
    #[must_use]
    pub fn with_clock(mut self, clock: TokioClock) -> Self {
        self.clock = clock;
        self
    }

    /// Run until [`SessionHandle::shutdown`] or until every handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if closing the transport fails.
    pub async fn run(mut self) -> Result<()> {
        let config = self.session.config().clone();
        let mut frame_timer = tokio::time::interval(config.frame_interval);
        frame_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut drift_timer = tokio::time::interval(config.drift_check_interval);
        drift_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut heartbeat_timer = tokio::time::interval(config.heartbeat_interval);
        heartbeat_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.session.open(self.clock.now_ms());
        tracing::debug!("session driver started");

        loop {
            let wake = self.session.next_wake().map(|ms| self.clock.instant_at(ms));
            let needs_frames = self.session.needs_frames();

            tokio::select! {
                event = self.transport.recv(), if !self.transport_done => {
                    let now = self.clock.now_ms();
                    match event {
                        Some(event) => self.session.handle_transport_event(event, now),
                        None => {
                            self.transport_done = true;
                            self.session
                                .on_transport_close(Some("transport finished".to_string()), now);
                        }
                    }
                }

                Some(event) = self.sink_events.recv() => {
                    self.session.on_sink_event(event, self.clock.now_ms());
                }

                request = self.requests.recv() => {
                    match request {
                        Some(request) => self.handle_request(request),
                        None => break,
                    }
                }

                () = tokio::time::sleep_until(wake.unwrap_or_else(Instant::now)), if wake.is_some() => {}

                _ = frame_timer.tick(), if needs_frames => {}

                _ = drift_timer.tick() => {
                    self.session.check_drift(self.clock.now_ms());
                }

                _ = heartbeat_timer.tick() => {
                    self.session.heartbeat(self.clock.now_ms());
                }

                // Also fires once every handle is dropped.
                _ = self.shutdown.changed() => {
                    tracing::debug!("session driver shutting down");
                    break;
                }
            }

            self.session.poll(self.clock.now_ms());
            self.flush().await;
        }

        self.session.close(self.clock.now_ms());
        if !self.transport_done {
            self.transport.close().await?;
        }
        Ok(())
    }

    fn handle_request(&mut self, request: SessionRequest) {
        let now = self.clock.now_ms();
        match request {
            SessionRequest::Play(reply) => {
                let _ = reply.send(self.session.request_play(now));
            }
            SessionRequest::Pause(reply) => {
                let _ = reply.send(self.session.request_pause(now));
            }
            SessionRequest::Seek(position, reply) => {
                let _ = reply.send(self.session.request_seek(position, now));
            }
            SessionRequest::Sync(reply) => {
                let _ = reply.send(self.session.request_sync(now));
            }
        }
    }

    /// Send everything the session queued.
    async fn flush(&mut self) {
        for message in self.session.drain_outbox() {
            if self.transport_done {
                break;
            }
            if let Err(e) = self.transport.send(message).await {
                tracing::warn!(error = %e, "send failed; treating transport as closed");
                self.transport_done = true;
                self.session
                    .on_transport_close(Some(e.to_string()), self.clock.now_ms());
            }
        }
    }
}

impl<S, T> std::fmt::Debug for SessionDriver<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDriver")
            .field("session", &self.session)
            .field("transport_done", &self.transport_done)
            .finish_non_exhaustive()
    }
}
