//! The sync session: one client's view of the shared timeline.
//!
//! [`SyncSession`] is a synchronous state machine. It is fed transport events,
//! sink events and the current local time, and it answers with sink requests
//! (issued directly), outbound wire messages (queued in an outbox) and the
//! next time it wants to be woken. [`SessionDriver`] runs it on tokio.
//!
//! ```text
//! Disconnected --open--> Connected --sync--> Synchronized --ready--> Ready
//!       ^                    |                    |                   |
//!       +------------------ close ----------------+-------------------+
//! ```
//!
//! Inbound commands are only acted on once the clock offset is known; before
//! that they are dropped without being remembered.

mod driver;
mod echo;
mod throttle;

#[cfg(test)]
mod tests;

pub use driver::{SessionDriver, SessionHandle};
pub use echo::EchoTracker;
pub use throttle::SeekThrottle;

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::{broadcast, watch};

use crate::clock::ClockSyncEstimator;
use crate::dedup::CommandLedger;
use crate::drift::{DriftAction, DriftMonitor, TimelineAnchor};
use crate::error::{Result, SinkError, SyncError};
use crate::protocol::wire::{
    ClientCommand, ClientReady, Heartbeat, StatusUpdate, SyncRequest, SyncResponse,
};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::scheduler::{ScheduleOutcome, ScheduledCommandExecutor};
use crate::sink::{MediaSink, SinkEvent};
use crate::state::{EventBus, SessionEvent, SessionStatus, StatusWatch};
use crate::transport::TransportEvent;
use crate::types::{ClientId, ClockOffset, Command, CommandId, CommandType, SessionPhase, SyncConfig};

/// Minimum spacing of drift correction log lines (ms)
const DRIFT_LOG_INTERVAL_MS: f64 = 1000.0;

#[derive(Debug, Clone)]
enum TimerTask {
    /// Acknowledge an applied command
    Ack(CommandId),
    /// Report position after a completed seek
    SeekedReport,
}

#[derive(Debug, Clone)]
struct Timer {
    due: f64,
    task: TimerTask,
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// One client's synchronization state machine.
pub struct SyncSession<S> {
    config: SyncConfig,
    sink: S,
    phase: SessionPhase,
    transport_open: bool,
    opened: bool,
    client_id: Option<ClientId>,

    estimator: ClockSyncEstimator,
    ledger: CommandLedger,
    /// At most one pending command; a newer one of any kind replaces it
    scheduled: ScheduledCommandExecutor<Command>,
    drift: DriftMonitor,
    echoes: EchoTracker,
    seek_throttle: SeekThrottle,
    timers: Vec<Timer>,

    outbox: VecDeque<ClientMessage>,
    events: EventBus,
    status: StatusWatch,

    media_ready: bool,
    /// Survives reconnects
    reported_ready: bool,
    announced_this_connection: bool,
    is_seeking: bool,
    /// Local send time of an unanswered drift re-probe
    resync_probe_at: Option<f64>,
    last_status_sent: Option<f64>,
    last_heartbeat_ack: Option<f64>,
    last_drift_log: Option<f64>,
}

impl<S: MediaSink> SyncSession<S> {
    /// Create a session around `sink`.
    pub fn new(sink: S, config: SyncConfig) -> Self {
        Self {
            estimator: ClockSyncEstimator::new(config.offset_smoothing),
            ledger: CommandLedger::new(config.dedup_retention),
            scheduled: ScheduledCommandExecutor::from_config(&config),
            drift: DriftMonitor::new(&config),
            echoes: EchoTracker::new(config.echo_window),
            seek_throttle: SeekThrottle::new(config.seek_throttle, config.seek_settle),
            sink,
            phase: SessionPhase::Disconnected,
            transport_open: false,
            opened: false,
            client_id: None,
            timers: Vec::new(),
            outbox: VecDeque::new(),
            events: EventBus::new(),
            status: StatusWatch::new(),
            media_ready: false,
            reported_ready: false,
            announced_this_connection: false,
            is_seeking: false,
            resync_probe_at: None,
            last_status_sent: None,
            last_heartbeat_ack: None,
            last_drift_log: None,
            config,
        }
    }

    // ===== Lifecycle =====

    /// Begin the session. An autoplaying sink is paused and rewound so it
    /// cannot fight the first command.
    pub fn open(&mut self, now_ms: f64) {
        if self.opened {
            return;
        }
        self.opened = true;
        tracing::debug!("sync session opened");

        if self.config.pause_on_open && !self.sink.is_paused() {
            tracing::info!("pausing autoplaying sink until synchronized");
            self.echoes.expect(CommandType::Pause, None, now_ms);
            if let Err(e) = self.sink.pause() {
                self.echoes.retract(CommandType::Pause);
                self.sink_failed(&e);
            }
            self.seek_sink(Duration::ZERO, None, now_ms);
        }
    }

    /// End the session, cancelling everything pending.
    pub fn close(&mut self, now_ms: f64) {
        if self.transport_open {
            self.on_transport_close(Some("session closed".to_string()), now_ms);
        }
        self.opened = false;
        tracing::debug!("sync session closed");
    }

    // ===== Transport =====

    /// Feed one transport event.
    pub fn handle_transport_event(&mut self, event: TransportEvent, now_ms: f64) {
        match event {
            TransportEvent::Open => self.on_transport_open(now_ms),
            TransportEvent::Message(message) => self.on_message(message, now_ms),
            TransportEvent::Close { reason } => self.on_transport_close(reason, now_ms),
            TransportEvent::Error { message } => self.on_transport_error(message),
        }
    }

    /// Transport connected: start a clock probe.
    pub fn on_transport_open(&mut self, now_ms: f64) {
        if !self.opened {
            self.open(now_ms);
        }
        self.transport_open = true;
        self.announced_this_connection = false;
        self.phase = SessionPhase::Connected;
        tracing::info!("transport open");
        self.status.set(SessionStatus::Connected);
        self.events.emit(SessionEvent::Connected);
        self.send_probe(now_ms);
    }

    /// Transport closed: drop the offset and everything scheduled.
    pub fn on_transport_close(&mut self, reason: Option<String>, now_ms: f64) {
        let was_open = self.transport_open;
        self.transport_open = false;
        self.phase = SessionPhase::Disconnected;
        self.estimator.invalidate();
        self.resync_probe_at = None;

        self.cancel_pending();
        self.drift.clear_anchor();
        if self.drift.next_revert().is_some() {
            self.drift.cancel_revert();
            self.set_sink_rate(1.0, now_ms);
        }
        self.seek_throttle.cancel();
        self.timers.clear();
        self.echoes.clear();
        self.is_seeking = false;

        if was_open {
            tracing::info!(reason = ?reason, "transport closed");
        }
        self.status.set(SessionStatus::Disconnected);
        self.events.emit(SessionEvent::Disconnected { reason });
    }

    /// Transport reported an error. The session keeps its state until `Close`.
    pub fn on_transport_error(&mut self, message: String) {
        tracing::warn!(error = %message, "transport error");
        self.status.set(SessionStatus::ConnectionError);
        self.events.emit(SessionEvent::TransportError { message });
    }

    /// Feed one decoded coordinator message.
    pub fn on_message(&mut self, message: ServerMessage, now_ms: f64) {
        if !matches!(message, ServerMessage::HeartbeatAck(_)) {
            tracing::trace!(kind = message.type_name(), "message received");
        }

        match message {
            ServerMessage::Welcome(welcome) => {
                tracing::info!(client_id = %welcome.client_id, "welcomed by coordinator");
                self.status.set(SessionStatus::ConnectedAs {
                    client_id: welcome.client_id.to_string(),
                });
                self.events.emit(SessionEvent::Welcomed {
                    client_id: welcome.client_id.clone(),
                });
                self.client_id = Some(welcome.client_id);
            }
            ServerMessage::Sync(response) => self.on_sync_response(response, now_ms),
            ServerMessage::HeartbeatAck(_) => {
                self.last_heartbeat_ack = Some(now_ms);
            }
            ServerMessage::AllClientsReady(ready) => {
                tracing::info!(client_count = ready.client_count, "all clients ready");
                self.status.set(SessionStatus::AllReady {
                    client_count: ready.client_count,
                });
                self.events.emit(SessionEvent::AllClientsReady {
                    client_count: ready.client_count,
                });
            }
            command @ (ServerMessage::Play(_) | ServerMessage::Pause(_) | ServerMessage::Seek(_)) => {
                if let Some(command) = command.into_command() {
                    self.on_command(command, now_ms);
                }
            }
        }
    }

    // ===== Clock =====

    fn send_probe(&mut self, now_ms: f64) {
        if !self.transport_open {
            return;
        }
        let probe = self.estimator.probe(now_ms);
        tracing::debug!(request_id = probe.request_id, "clock probe sent");
        self.outbox.push_back(ClientMessage::SyncRequest(SyncRequest {
            client_send_time: probe.client_send_time,
            request_id: probe.request_id,
        }));
    }

    fn on_sync_response(&mut self, response: SyncResponse, now_ms: f64) {
        if !self.transport_open {
            tracing::debug!("sync response after close; ignoring");
            return;
        }

        let offset =
            self.estimator
                .on_response(response.client_send_time, response.server_time, now_ms);
        if self.phase == SessionPhase::Connected {
            self.phase = SessionPhase::Synchronized;
        }
        tracing::info!(
            offset_ms = offset.offset_ms,
            latency_ms = offset.latency_ms,
            "clock synchronized"
        );
        self.status.set(SessionStatus::Synced {
            latency_ms: offset.latency_ms,
        });
        self.events.emit(SessionEvent::Synchronized { offset });

        if self.resync_probe_at.take().is_some() {
            self.realign_if_needed(&offset, now_ms);
        }

        self.maybe_announce_ready();
    }

    /// Offset, if the transport is open and a probe has been answered.
    fn synchronized_offset(&self) -> Option<ClockOffset> {
        if self.transport_open {
            self.estimator.offset()
        } else {
            None
        }
    }

    /// Re-run the clock probe on demand.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Disconnected`] if the transport is not open.
    pub fn request_sync(&mut self, now_ms: f64) -> Result<()> {
        if !self.transport_open {
            return Err(SyncError::Disconnected);
        }
        self.send_probe(now_ms);
        Ok(())
    }

    // ===== Ready handshake =====

    fn maybe_announce_ready(&mut self) {
        if self.synchronized_offset().is_none() || !self.media_ready {
            return;
        }

        let reannounce = self.config.reannounce_on_reconnect && !self.announced_this_connection;
        if !self.reported_ready || reannounce {
            let snapshot = self.sink.snapshot();
            tracing::info!(duration = ?snapshot.duration, "announcing ready");
            self.outbox
                .push_back(ClientMessage::ClientReady(ClientReady {
                    duration: snapshot.duration,
                    current_time: snapshot.position,
                }));
            self.reported_ready = true;
            self.announced_this_connection = true;
            self.events.emit(SessionEvent::ReadyAnnounced);
        }
        self.phase = SessionPhase::Ready;
    }

    fn mark_media_ready(&mut self) {
        if !self.media_ready {
            tracing::debug!("media ready");
            self.media_ready = true;
            self.maybe_announce_ready();
        }
    }

    // ===== Inbound commands =====

    /// Act on a coordinator command.
    pub fn on_command(&mut self, command: Command, now_ms: f64) {
        let Some(offset) = self.synchronized_offset() else {
            tracing::debug!(kind = %command.kind, id = %command.id, "not synchronized; dropping command");
            self.events.emit(SessionEvent::CommandIgnored {
                kind: command.kind,
                id: command.id,
            });
            return;
        };

        if !self.ledger.admit(command.kind, &command.id, now_ms) {
            tracing::debug!(kind = %command.kind, id = %command.id, "duplicate command dropped");
            self.events.emit(SessionEvent::DuplicateDropped {
                kind: command.kind,
                id: command.id,
            });
            return;
        }

        let local_deadline = offset.to_local(command.coordinator_timestamp);
        tracing::debug!(
            kind = %command.kind,
            id = %command.id,
            position = ?command.position,
            delay_ms = local_deadline - now_ms,
            initiated_by = ?command.initiated_by,
            "command received"
        );

        match command.kind {
            CommandType::Play => {
                // A play implies the sender believes our media is usable.
                self.mark_media_ready();
                if self.sink.is_paused() {
                    self.align_position(command.position, Some(&command.id), now_ms);
                }
                self.schedule(command, local_deadline, now_ms);
            }
            CommandType::Pause | CommandType::Seek => {
                self.schedule(command, local_deadline, now_ms);
            }
        }
    }

    fn schedule(&mut self, command: Command, local_deadline: f64, now_ms: f64) {
        let kind = command.kind;
        let id = command.id.clone();
        let superseded = self.scheduled.pending_action().map(|c| (c.kind, c.id.clone()));
        let outcome = self.scheduled.schedule(local_deadline, command, now_ms);

        if let Some((old_kind, old_id)) = superseded {
            tracing::debug!(kind = %old_kind, id = %old_id, "superseded pending command");
            self.events.emit(SessionEvent::CommandCancelled {
                kind: old_kind,
                id: old_id,
            });
        }

        match outcome {
            ScheduleOutcome::Late { action, late_by_ms } => {
                tracing::info!(kind = %kind, late_by_ms, "command already due; applying now");
                self.apply(action, late_by_ms, now_ms);
            }
            ScheduleOutcome::Due { action } => self.apply(action, 0.0, now_ms),
            ScheduleOutcome::Deferred { .. } => {
                self.events.emit(SessionEvent::CommandScheduled {
                    kind,
                    id,
                    local_deadline,
                });
            }
        }
    }

    fn cancel_pending(&mut self) {
        let pending = self.scheduled.pending_action().map(|c| (c.kind, c.id.clone()));
        if self.scheduled.cancel() {
            if let Some((kind, id)) = pending {
                self.events.emit(SessionEvent::CommandCancelled { kind, id });
            }
        }
    }

    /// Execute a due command on the sink.
    fn apply(&mut self, command: Command, late_by_ms: f64, now_ms: f64) {
        let applied = match command.kind {
            CommandType::Play => self.execute_play(&command, now_ms),
            CommandType::Pause => self.execute_pause(&command, now_ms),
            CommandType::Seek => self.execute_seek(&command, now_ms),
        };
        if !applied {
            return;
        }

        tracing::debug!(kind = %command.kind, id = %command.id, late_by_ms, "command applied");
        if !command.is_initial_sync {
            self.timers.push(Timer {
                due: now_ms + millis(self.config.ack_delay),
                task: TimerTask::Ack(command.id.clone()),
            });
        }
        self.events.emit(SessionEvent::CommandApplied {
            kind: command.kind,
            id: command.id,
            late_by_ms,
        });
    }

    fn execute_play(&mut self, command: &Command, now_ms: f64) -> bool {
        if !self.align_position(command.position, Some(&command.id), now_ms) {
            return false;
        }
        if self.sink.is_paused() {
            self.echoes
                .expect(CommandType::Play, Some(command.id.clone()), now_ms);
            if let Err(e) = self.sink.play() {
                self.echoes.retract(CommandType::Play);
                self.sink_failed(&e);
                return false;
            }
        }
        // Anchored at the deadline, so a late start shows up as drift.
        self.drift.set_anchor(TimelineAnchor::new(
            command.coordinator_timestamp,
            command.position,
        ));
        true
    }

    fn execute_pause(&mut self, command: &Command, now_ms: f64) -> bool {
        if !self.sink.is_paused() {
            self.echoes
                .expect(CommandType::Pause, Some(command.id.clone()), now_ms);
            if let Err(e) = self.sink.pause() {
                self.echoes.retract(CommandType::Pause);
                self.sink_failed(&e);
                return false;
            }
        }
        self.drift.clear_anchor();
        true
    }

    fn execute_seek(&mut self, command: &Command, now_ms: f64) -> bool {
        if !self.align_position(command.position, Some(&command.id), now_ms) {
            return false;
        }
        if self.drift.anchor().is_some() {
            self.drift.set_anchor(TimelineAnchor::new(
                command.coordinator_timestamp,
                command.position,
            ));
        }
        true
    }

    /// Seek the sink to `target` unless it is already within tolerance.
    /// Returns `false` only if a needed seek failed.
    fn align_position(&mut self, target: Duration, cause: Option<&CommandId>, now_ms: f64) -> bool {
        let current = self.sink.position();
        let diff = (current.as_secs_f64() - target.as_secs_f64()).abs();
        if diff <= self.config.position_tolerance.as_secs_f64() {
            return true;
        }
        tracing::debug!(from = ?current, to = ?target, "aligning position");
        self.seek_sink(target, cause.cloned(), now_ms)
    }

    fn seek_sink(&mut self, target: Duration, cause: Option<CommandId>, now_ms: f64) -> bool {
        self.echoes.expect(CommandType::Seek, cause, now_ms);
        match self.sink.seek(target) {
            Ok(()) => true,
            Err(e) => {
                self.echoes.retract(CommandType::Seek);
                self.is_seeking = false;
                self.sink_failed(&e);
                false
            }
        }
    }

    fn set_sink_rate(&mut self, rate: f64, now_ms: f64) -> bool {
        match self.sink.set_rate(rate) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(rate, now_ms, "rate change rejected");
                self.sink_failed(&e);
                false
            }
        }
    }

    fn sink_failed(&mut self, err: &SinkError) {
        tracing::warn!(error = %err, "sink operation failed");
        self.events.emit(SessionEvent::SinkFailed {
            message: err.to_string(),
        });
    }

    // ===== Sink events =====

    /// Feed one sink event.
    pub fn on_sink_event(&mut self, event: SinkEvent, now_ms: f64) {
        match event {
            SinkEvent::MetadataLoaded => self.mark_media_ready(),
            SinkEvent::Play => self.on_sink_transition(CommandType::Play, now_ms),
            SinkEvent::Pause => self.on_sink_transition(CommandType::Pause, now_ms),
            SinkEvent::Seeking => {
                self.is_seeking = true;
                if self.suppress_echo(CommandType::Seek, now_ms) {
                    return;
                }
                if self.synchronized_offset().is_some() {
                    if let Some(at) = self.seek_throttle.note_seek(now_ms) {
                        tracing::trace!(flush_at = at, "user seek armed");
                    }
                }
            }
            SinkEvent::Seeked => {
                self.is_seeking = false;
                if self.transport_open {
                    self.timers.push(Timer {
                        due: now_ms + millis(self.config.seeked_report_delay),
                        task: TimerTask::SeekedReport,
                    });
                }
            }
            SinkEvent::TimeUpdate(position) => self.on_time_update(position, now_ms),
        }
    }

    fn on_sink_transition(&mut self, kind: CommandType, now_ms: f64) {
        if self.suppress_echo(kind, now_ms) {
            return;
        }
        let position = self.sink.position();
        match self.send_intent(kind, position, now_ms) {
            Ok(id) => tracing::info!(kind = %kind, id = %id, "user action broadcast"),
            Err(e) => tracing::debug!(kind = %kind, reason = %e, "user action not broadcast"),
        }
    }

    fn suppress_echo(&mut self, kind: CommandType, now_ms: f64) -> bool {
        match self.echoes.consume(kind, now_ms) {
            Some(cause) => {
                tracing::trace!(kind = %kind, cause = ?cause, "echo suppressed");
                self.events
                    .emit(SessionEvent::EchoSuppressed { kind, id: cause });
                true
            }
            None => false,
        }
    }

    fn on_time_update(&mut self, position: Duration, now_ms: f64) {
        if !self.transport_open || self.is_seeking {
            return;
        }
        let interval = millis(self.config.status_interval);
        if self
            .last_status_sent
            .is_some_and(|last| now_ms - last < interval)
        {
            return;
        }
        self.last_status_sent = Some(now_ms);
        self.outbox.push_back(ClientMessage::StatusUpdate(StatusUpdate {
            current_time: position,
            is_playing: Some(!self.sink.is_paused()),
            response_to: None,
            media_ready: None,
            client_time: Some(now_ms),
        }));
    }

    // ===== Outbound intents =====

    fn send_intent(&mut self, kind: CommandType, position: Duration, now_ms: f64) -> Result<CommandId> {
        if !self.transport_open {
            return Err(SyncError::Disconnected);
        }
        let offset = self.synchronized_offset().ok_or(SyncError::NotSynchronized)?;

        let id = CommandId::generate(kind.as_str());
        let mut intent = ClientCommand::new(id.clone(), position);
        intent.timestamp = Some(offset.to_coordinator(now_ms));
        intent.client_time = Some(now_ms);
        self.outbox.push_back(ClientMessage::intent(kind, intent));
        self.events.emit(SessionEvent::IntentSent {
            kind,
            id: id.clone(),
        });
        Ok(id)
    }

    /// Ask the coordinator to start playback at the sink's position.
    ///
    /// # Errors
    ///
    /// Fails if the transport is closed or the clock is not synchronized.
    pub fn request_play(&mut self, now_ms: f64) -> Result<CommandId> {
        let position = self.sink.position();
        self.send_intent(CommandType::Play, position, now_ms)
    }

    /// Ask the coordinator to pause everyone.
    ///
    /// # Errors
    ///
    /// Fails if the transport is closed or the clock is not synchronized.
    pub fn request_pause(&mut self, now_ms: f64) -> Result<CommandId> {
        let position = self.sink.position();
        self.send_intent(CommandType::Pause, position, now_ms)
    }

    /// Ask the coordinator to move everyone to `position`.
    ///
    /// # Errors
    ///
    /// Fails if the transport is closed or the clock is not synchronized.
    pub fn request_seek(&mut self, position: Duration, now_ms: f64) -> Result<CommandId> {
        self.send_intent(CommandType::Seek, position, now_ms)
    }

    // ===== Periodic work =====

    /// Queue a heartbeat if connected.
    pub fn heartbeat(&mut self, now_ms: f64) {
        if self.transport_open {
            self.outbox
                .push_back(ClientMessage::Heartbeat(Heartbeat { client_time: now_ms }));
        }
    }

    /// Compare the sink against the timeline and correct.
    pub fn check_drift(&mut self, now_ms: f64) -> DriftAction {
        if self.sink.is_paused() {
            return DriftAction::None;
        }
        // Suspended while a re-probe is in flight; probe again if it goes unanswered.
        if let Some(sent_at) = self.resync_probe_at {
            if now_ms - sent_at < millis(self.config.resync_timeout) {
                return DriftAction::None;
            }
            tracing::debug!(waited_ms = now_ms - sent_at, "re-probe unanswered");
            self.resync_probe_at = None;
        }
        let Some(offset) = self.synchronized_offset() else {
            return DriftAction::None;
        };

        let action = self.drift.check(now_ms, &offset, self.sink.position());
        match action {
            DriftAction::None => {}
            DriftAction::Nudge(nudge) => {
                if self.set_sink_rate(nudge.rate, now_ms) {
                    if self
                        .last_drift_log
                        .is_none_or(|t| now_ms - t >= DRIFT_LOG_INTERVAL_MS)
                    {
                        self.last_drift_log = Some(now_ms);
                        tracing::debug!(drift_ms = nudge.drift_ms, rate = nudge.rate, "drift correction");
                    }
                    self.events.emit(SessionEvent::RateNudged {
                        drift_ms: nudge.drift_ms,
                        rate: nudge.rate,
                    });
                } else {
                    self.drift.cancel_revert();
                }
            }
            DriftAction::Resync { drift_ms } => {
                let err = SyncError::StaleOffset { drift_ms };
                tracing::info!(error = %err, "re-probing clock");
                self.status.set(SessionStatus::Drift { drift_ms });
                self.events.emit(SessionEvent::ResyncRequested { drift_ms });
                self.resync_probe_at = Some(now_ms);
                self.send_probe(now_ms);
            }
        }
        action
    }

    /// After a drift-triggered re-probe, move the sink onto the timeline if
    /// the fresh offset still shows large drift.
    fn realign_if_needed(&mut self, offset: &ClockOffset, now_ms: f64) {
        if self.sink.is_paused() {
            return;
        }
        let Some(anchor) = self.drift.anchor() else {
            return;
        };
        let Some(sample) = self.drift.sample(now_ms, offset, self.sink.position()) else {
            return;
        };
        if sample.drift_ms.abs() <= millis(self.config.resync_threshold) {
            tracing::debug!(drift_ms = sample.drift_ms, "drift resolved by re-probe");
            return;
        }

        let target = anchor.expected_position(offset, now_ms);
        tracing::info!(drift_ms = sample.drift_ms, target = ?target, "realigning sink to timeline");
        if self.seek_sink(target, None, now_ms) {
            self.events.emit(SessionEvent::Realigned { position: target });
        }
    }

    /// Run everything that is due: scheduled commands, acks, the seek flush
    /// and the rate revert. Call on every frame while
    /// [`needs_frames`](Self::needs_frames) holds and at [`next_wake`](Self::next_wake).
    pub fn poll(&mut self, now_ms: f64) {
        if let Some(fired) = self.scheduled.poll(now_ms) {
            let late_by = (now_ms - fired.deadline).max(0.0);
            self.apply(fired.action, late_by, now_ms);
        }

        if self.seek_throttle.poll(now_ms) {
            let position = self.sink.position();
            match self.send_intent(CommandType::Seek, position, now_ms) {
                Ok(id) => tracing::info!(id = %id, position = ?position, "user seek broadcast"),
                Err(e) => tracing::debug!(reason = %e, "user seek not broadcast"),
            }
        }

        if self.drift.poll_revert(now_ms) && self.set_sink_rate(1.0, now_ms) {
            tracing::debug!("playback rate reverted");
            self.events.emit(SessionEvent::RateReverted);
        }

        self.run_timers(now_ms);
    }

    fn run_timers(&mut self, now_ms: f64) {
        let (due, pending): (Vec<Timer>, Vec<Timer>) =
            self.timers.drain(..).partition(|t| t.due <= now_ms);
        self.timers = pending;

        for timer in due {
            if !self.transport_open {
                break;
            }
            let snapshot = self.sink.snapshot();
            let report = match timer.task {
                TimerTask::Ack(id) => StatusUpdate {
                    current_time: snapshot.position,
                    is_playing: Some(!snapshot.paused),
                    response_to: Some(id),
                    media_ready: Some(self.media_ready),
                    client_time: Some(now_ms),
                },
                TimerTask::SeekedReport => StatusUpdate {
                    client_time: Some(now_ms),
                    ..StatusUpdate::position(snapshot.position)
                },
            };
            self.outbox.push_back(ClientMessage::StatusUpdate(report));
        }
    }

    /// Earliest local time at which [`poll`](Self::poll) has work, excluding
    /// per-frame polling.
    #[must_use]
    pub fn next_wake(&self) -> Option<f64> {
        [
            self.scheduled.next_wake(),
            self.seek_throttle.next_flush(),
            self.drift.next_revert(),
            self.timers.iter().map(|t| t.due).reduce(f64::min),
        ]
        .into_iter()
        .flatten()
        .reduce(f64::min)
    }

    /// Whether a scheduled command is in its per-frame polling phase.
    #[must_use]
    pub fn needs_frames(&self) -> bool {
        self.scheduled.needs_frames()
    }

    // ===== Accessors =====

    /// Take every queued outbound message.
    pub fn drain_outbox(&mut self) -> Vec<ClientMessage> {
        self.outbox.drain(..).collect()
    }

    /// Lifecycle phase
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Current status line
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status.get()
    }

    /// Subscribe to status changes
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Subscribe to session events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The session's event bus
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Current clock offset, if synchronized
    #[must_use]
    pub fn offset(&self) -> Option<ClockOffset> {
        self.synchronized_offset()
    }

    /// Whether commands are currently acted on
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.synchronized_offset().is_some()
    }

    /// Id assigned by the coordinator
    #[must_use]
    pub fn client_id(&self) -> Option<&ClientId> {
        self.client_id.as_ref()
    }

    /// Whether the sink reported usable media
    #[must_use]
    pub fn is_media_ready(&self) -> bool {
        self.media_ready
    }

    /// Whether readiness was ever announced
    #[must_use]
    pub fn has_reported_ready(&self) -> bool {
        self.reported_ready
    }

    /// Local time of the last heartbeat acknowledgement
    #[must_use]
    pub fn last_heartbeat_ack(&self) -> Option<f64> {
        self.last_heartbeat_ack
    }

    /// The command waiting for its deadline, if any
    #[must_use]
    pub fn pending_command(&self) -> Option<&Command> {
        self.scheduled.pending_action()
    }

    /// Drift monitor state
    #[must_use]
    pub fn drift_monitor(&self) -> &DriftMonitor {
        &self.drift
    }

    /// Session configuration
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The sink
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The sink, mutably
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<S> std::fmt::Debug for SyncSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("phase", &self.phase)
            .field("client_id", &self.client_id)
            .field("media_ready", &self.media_ready)
            .field("reported_ready", &self.reported_ready)
            .finish_non_exhaustive()
    }
}
