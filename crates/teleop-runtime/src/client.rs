//! [`TeleopClient`] – the single-task event loop.
//!
//! Everything that mutates session, control, or telemetry state runs on one
//! tokio task, one event at a time. The loop waits on:
//!
//! | Source | Handling |
//! |---|---|
//! | operator inputs ([`OperatorInput`] via [`ClientHandle`]) | control channels, session commands |
//! | the transport | keepalive bookkeeping, inbound decode, telemetry |
//! | the retry timer | [`SessionEvent::RetryDue`] |
//! | the keepalive deadline | [`SessionEvent::KeepaliveExpired`] |
//! | the camera auto-center timer | centered gimbal command |
//! | the toast timer | toast expiry |
//! | the status poll timer and its result | one-shot `GET /api/status` |
//!
//! Every suspension point is one of those waits; handlers never yield
//! mid-computation except to write to the socket. Socket writes and the
//! close handshake are bounded by `connect_timeout`, so a peer that stops
//! reading cannot stall the loop.
//!
//! Each link-up starts a new link epoch. A status poll belongs to the epoch
//! that scheduled it: going down cancels a pending poll, and a result that
//! lands after its link is gone is dropped.
//!
//! # Safety interlock
//!
//! Every transition into a link-down state forces both control channels
//! safe *before* the socket is torn down, so the zero/centre commands get a
//! best-effort send on a link that is still open (operator disconnect,
//! shutdown). While the session is not connected no command reaches the
//! transport: gestures are refused locally with an advisory and never
//! queued.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::Utc;
use teleop_kernel::{
    ChannelSettings, ControlChannel, Point, ReconnectPolicy, SessionAction, SessionEvent,
    SessionMachine,
};
use teleop_middleware::codec::{InboundEvent, Outbound, decode_inbound, encode_outbound};
use teleop_middleware::{EventBus, LinkFrame, StatusPoller, Topic, TopicReceiver, Transport};
use teleop_types::{
    ChannelKind, ControlCommand, Event, EventPayload, SessionState, Severity, StatusSample,
    TelemetryFrame, TeleopError,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::consumer::{ConsumerEffect, TelemetryConsumer};
use crate::notifications::{DEFAULT_TOAST_DURATION, NotificationRelay};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tunables for [`TeleopClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub reconnect: ReconnectPolicy,
    pub keepalive_timeout: Duration,
    pub connect_timeout: Duration,
    pub movement: ChannelSettings,
    pub camera: ChannelSettings,
    pub toast_duration: Duration,
    /// `GET` endpoint polled once after every link-up; `None` disables it.
    pub status_url: Option<String>,
    /// Delay between link-up and the status poll.
    pub status_poll_delay: Duration,
    pub bus_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            keepalive_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(5),
            movement: ChannelSettings::movement(),
            camera: ChannelSettings::camera(),
            toast_duration: DEFAULT_TOAST_DURATION,
            status_url: Some("http://localhost:5000/api/status".to_string()),
            status_poll_delay: Duration::from_millis(500),
            bus_capacity: 256,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operator-facing handle
// ─────────────────────────────────────────────────────────────────────────────

/// Operator actions delivered to the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorInput {
    /// Connect, or retry after `Failed`.
    Connect,
    Disconnect,
    /// Explicit gesture start (touch down without position).
    GestureStart { channel: ChannelKind },
    /// Touch down at a screen position; later moves are relative to it.
    PointerDown { channel: ChannelKind, origin: Point },
    /// Raw joystick sample.
    GestureUpdate {
        channel: ChannelKind,
        distance: f32,
        angle: f32,
    },
    PointerMove {
        channel: ChannelKind,
        position: Point,
    },
    GestureEnd { channel: ChannelKind },
    CalibrateImu,
    /// Force everything safe, close the link, and stop the loop.
    Shutdown,
}

/// Cheap, cloneable handle to a running [`TeleopClient`].
#[derive(Clone)]
pub struct ClientHandle {
    inputs: mpsc::UnboundedSender<OperatorInput>,
    bus: EventBus,
    state: watch::Receiver<SessionState>,
}

impl ClientHandle {
    /// Queue an operator input. Fails only once the loop has stopped.
    /// Usable from any thread, including signal handlers.
    pub fn send(&self, input: OperatorInput) -> Result<(), TeleopError> {
        self.inputs
            .send(input)
            .map_err(|_| TeleopError::Channel("client loop has stopped".to_string()))
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the session reaches `target`.
    pub async fn wait_for_state(&self, target: SessionState) -> Result<(), TeleopError> {
        let mut state = self.state.clone();
        state
            .wait_for(|s| *s == target)
            .await
            .map(|_| ())
            .map_err(|_| TeleopError::Channel("client loop has stopped".to_string()))
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self, topic: Topic) -> TopicReceiver {
        self.bus.subscribe_to(topic)
    }

    pub fn subscribe_all(&self) -> TopicReceiver {
        self.bus.subscribe_all()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// The teleoperation client: session, two control channels, telemetry, and
/// advisories, driven over one [`Transport`].
pub struct TeleopClient<T: Transport> {
    config: ClientConfig,
    transport: T,
    session: SessionMachine,
    movement: ControlChannel,
    camera: ControlChannel,
    consumer: TelemetryConsumer,
    relay: NotificationRelay,
    bus: EventBus,
    poller: Option<StatusPoller>,
    inputs: mpsc::UnboundedReceiver<OperatorInput>,
    state_tx: watch::Sender<SessionState>,
    poll_tx: mpsc::UnboundedSender<PollResult>,
    poll_rx: mpsc::UnboundedReceiver<PollResult>,
    retry_at: Option<Instant>,
    poll_at: Option<Instant>,
    link_epoch: u64,
}

/// A status poll outcome tagged with the link epoch that requested it.
type PollResult = (u64, Result<StatusSample, TeleopError>);

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending::<()>().await,
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

impl<T: Transport> TeleopClient<T> {
    /// Build the client and its handle. Nothing is dialled until
    /// [`OperatorInput::Connect`] arrives.
    pub fn new(transport: T, config: ClientConfig) -> Result<(Self, ClientHandle), TeleopError> {
        let bus = EventBus::new(config.bus_capacity);
        let poller = config
            .status_url
            .as_ref()
            .map(|url| StatusPoller::new(url.clone(), config.connect_timeout))
            .transpose()?;
        let (input_tx, inputs) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let (poll_tx, poll_rx) = mpsc::unbounded_channel();

        let client = Self {
            session: SessionMachine::new(config.reconnect.clone(), config.keepalive_timeout),
            movement: ControlChannel::new(ChannelKind::Movement, config.movement.clone()),
            camera: ControlChannel::new(ChannelKind::Camera, config.camera.clone()),
            consumer: TelemetryConsumer::new(),
            relay: NotificationRelay::new(bus.clone(), config.toast_duration),
            bus: bus.clone(),
            poller,
            inputs,
            state_tx,
            poll_tx,
            poll_rx,
            retry_at: None,
            poll_at: None,
            link_epoch: 0,
            transport,
            config,
        };
        let handle = ClientHandle {
            inputs: input_tx,
            bus,
            state: state_rx,
        };
        Ok((client, handle))
    }

    /// Run until [`OperatorInput::Shutdown`] or until every handle is dropped.
    pub async fn run(mut self) -> Result<(), TeleopError> {
        info!("teleop client loop started");
        loop {
            let retry_at = self.retry_at;
            let poll_at = self.poll_at;
            let toast_at = self.relay.next_expiry();
            let control_at = earliest(self.movement.next_deadline(), self.camera.next_deadline());
            // Expiry needs strictly more silence than the timeout.
            let keepalive_at = self
                .session
                .keepalive_deadline()
                .map(|d| d + Duration::from_millis(1));
            let link_open = self.transport.is_open();

            tokio::select! {
                input = self.inputs.recv() => match input {
                    Some(OperatorInput::Shutdown) | None => break,
                    Some(input) => self.on_input(input).await,
                },
                frame = self.transport.next_frame(), if link_open => self.on_frame(frame).await,
                _ = wait_until(retry_at) => {
                    self.retry_at = None;
                    self.dispatch(SessionEvent::RetryDue).await;
                }
                _ = wait_until(keepalive_at) => {
                    if self.session.keepalive_expired(now()) {
                        self.dispatch(SessionEvent::KeepaliveExpired).await;
                    }
                }
                _ = wait_until(control_at) => self.poll_control_timers().await,
                _ = wait_until(toast_at) => {
                    self.relay.expire(now());
                }
                _ = wait_until(poll_at) => {
                    self.poll_at = None;
                    self.spawn_status_poll();
                }
                Some((epoch, result)) = self.poll_rx.recv() => {
                    self.on_status_poll(epoch, result).await;
                }
            }
        }

        self.dispatch(SessionEvent::Disconnect).await;
        info!("teleop client loop stopped");
        Ok(())
    }

    // ── Session ──────────────────────────────────────────────────────────────

    /// Feed a session event and carry out the resulting actions. Actions
    /// that produce follow-up events (opening the channel) are queued, not
    /// recursed into.
    async fn dispatch(&mut self, event: SessionEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let transition = self.session.handle(event, now());
            if transition.changed() {
                let _ = self.state_tx.send(transition.to);
                self.publish(EventPayload::SessionChanged {
                    from: transition.from,
                    to: transition.to,
                });
            }
            for action in transition.actions {
                if let Some(next) = self.perform(action).await {
                    queue.push_back(next);
                }
            }
        }
    }

    async fn perform(&mut self, action: SessionAction) -> Option<SessionEvent> {
        match action {
            SessionAction::OpenChannel => {
                let limit = self.config.connect_timeout;
                let opened = tokio::time::timeout(limit, self.transport.open()).await;
                return Some(match opened {
                    Ok(Ok(())) => SessionEvent::Opened,
                    Ok(Err(e)) => SessionEvent::OpenFailed(e.to_string()),
                    Err(_) => SessionEvent::OpenFailed(
                        TeleopError::Timeout(limit.as_millis() as u64).to_string(),
                    ),
                });
            }
            SessionAction::CloseChannel => {
                if tokio::time::timeout(self.config.connect_timeout, self.transport.close())
                    .await
                    .is_err()
                {
                    warn!("closing the link timed out");
                }
            }
            SessionAction::ForceSafeState => {
                self.poll_at = None;
                let stop = self.movement.force_safe();
                let center = self.camera.force_safe();
                for command in [stop, center] {
                    if !self.transport.is_open() {
                        break;
                    }
                    // Best effort: the link may already be half dead.
                    if let Err(e) = self.write(&Outbound::from(command)).await {
                        debug!(error = %e, "safe-state command not delivered");
                        break;
                    }
                }
                for effect in self.consumer.on_link_down("link down") {
                    self.present(effect);
                }
            }
            SessionAction::ResumeControls => {
                self.link_epoch += 1;
                self.movement.resume();
                self.camera.resume();
                self.consumer.on_link_up(now());
            }
            SessionAction::RequestStateRefresh => {
                if self.poller.is_some() {
                    self.poll_at = Some(now() + self.config.status_poll_delay);
                }
            }
            SessionAction::ScheduleRetry(delay) => {
                debug!(?delay, "reconnect scheduled");
                self.retry_at = Some(now() + delay);
            }
            SessionAction::CancelRetry => self.retry_at = None,
            SessionAction::Advise { message, severity } => {
                self.relay.post(message, severity, now());
            }
        }
        None
    }

    // ── Operator input ───────────────────────────────────────────────────────

    async fn on_input(&mut self, input: OperatorInput) {
        let now = now();
        match input {
            OperatorInput::Connect => self.dispatch(SessionEvent::Connect).await,
            OperatorInput::Disconnect => self.dispatch(SessionEvent::Disconnect).await,
            OperatorInput::GestureStart { channel } => {
                let started = self.channel_mut(channel).begin_gesture();
                self.emit(started.map(|_| None)).await;
            }
            OperatorInput::PointerDown { channel, origin } => {
                let started = self.channel_mut(channel).begin_pointer_gesture(origin);
                self.emit(started.map(|_| None)).await;
            }
            OperatorInput::GestureUpdate {
                channel,
                distance,
                angle,
            } => {
                let command = self.channel_mut(channel).on_gesture_update(distance, angle, now);
                self.emit(command).await;
            }
            OperatorInput::PointerMove { channel, position } => {
                let command = self.channel_mut(channel).on_pointer_move(position, now);
                self.emit(command).await;
            }
            OperatorInput::GestureEnd { channel } => {
                let command = self.channel_mut(channel).on_gesture_end(now);
                self.emit(Ok(command)).await;
            }
            OperatorInput::CalibrateImu => {
                if !self.session.state().is_connected() {
                    let refused = TeleopError::NotConnected("IMU calibration".into());
                    self.advise(refused.to_string(), Severity::Warning);
                    return;
                }
                match self.write(&Outbound::CalibrateImu).await {
                    Ok(()) => self.advise("IMU calibration requested", Severity::Info),
                    Err(e) => self.on_write_failure(e).await,
                }
            }
            // Handled by the loop itself.
            OperatorInput::Shutdown => {}
        }
    }

    fn channel_mut(&mut self, kind: ChannelKind) -> &mut ControlChannel {
        match kind {
            ChannelKind::Movement => &mut self.movement,
            ChannelKind::Camera => &mut self.camera,
        }
    }

    /// Transmit the outcome of a control-channel call. A refusal becomes
    /// one advisory.
    async fn emit(&mut self, outcome: Result<Option<ControlCommand>, TeleopError>) {
        match outcome {
            Ok(Some(command)) => self.send_command(command).await,
            Ok(None) => {}
            Err(e) => self.advise(e.to_string(), Severity::Warning),
        }
    }

    async fn send_command(&mut self, command: ControlCommand) {
        if !self.session.state().is_connected() {
            // Channels are suspended whenever the link is down; this is a
            // second line of defence, never a queue.
            debug!(?command, "command dropped while not connected");
            return;
        }
        match self.write(&Outbound::from(command)).await {
            Ok(()) => self.publish(EventPayload::CommandSent(command)),
            Err(e) => self.on_write_failure(e).await,
        }
    }

    async fn poll_control_timers(&mut self) {
        let now = now();
        for kind in [ChannelKind::Movement, ChannelKind::Camera] {
            if let Some(command) = self.channel_mut(kind).poll_timer(now) {
                debug!(channel = %kind, "auto-center fired");
                self.send_command(command).await;
            }
        }
    }

    // ── Link I/O ─────────────────────────────────────────────────────────────

    async fn write(&mut self, message: &Outbound) -> Result<(), TeleopError> {
        let text = encode_outbound(message)?;
        let limit = self.config.connect_timeout;
        tokio::time::timeout(limit, self.transport.send_text(text))
            .await
            .map_err(|_| TeleopError::Timeout(limit.as_millis() as u64))?
    }

    async fn on_write_failure(&mut self, error: TeleopError) {
        warn!(error = %error, "write to vehicle failed");
        if matches!(error, TeleopError::Transport(_) | TeleopError::Timeout(_)) {
            self.dispatch(SessionEvent::Closed(error.to_string())).await;
        }
    }

    async fn on_frame(&mut self, frame: Option<Result<LinkFrame, TeleopError>>) {
        let now = now();
        match frame {
            None => self.dispatch(SessionEvent::Closed("link closed by vehicle".into())).await,
            Some(Err(e)) => self.dispatch(SessionEvent::Closed(e.to_string())).await,
            Some(Ok(LinkFrame::Activity)) => self.session.record_activity(now),
            Some(Ok(LinkFrame::Text(text))) => {
                self.session.record_activity(now);
                match decode_inbound(&text, Utc::now()) {
                    Ok(event) => self.on_inbound(event, now).await,
                    Err(e) => warn!(error = %e, "inbound frame dropped"),
                }
            }
        }
    }

    async fn on_inbound(&mut self, event: InboundEvent, now: Instant) {
        match event {
            InboundEvent::Telemetry(frame) => self.apply_telemetry(frame, now).await,
            InboundEvent::Notice { message, severity } => self.advise(message, severity),
            InboundEvent::ServerStatus(message) => self.advise(message, Severity::Info),
            InboundEvent::Ping => {
                if let Err(e) = self.write(&Outbound::Pong).await {
                    self.on_write_failure(e).await;
                }
            }
        }
    }

    async fn apply_telemetry(&mut self, frame: TelemetryFrame, now: Instant) {
        for effect in self.consumer.apply(frame, now) {
            self.apply_effect(effect).await;
        }
    }

    async fn apply_effect(&mut self, effect: ConsumerEffect) {
        let Some(fps) = self.present(effect) else {
            return;
        };
        if !self.session.state().is_connected() {
            return;
        }
        if let Err(e) = self.write(&Outbound::UpdateFps { fps }).await {
            self.on_write_failure(e).await;
        }
    }

    /// Apply the presentation side of an effect; returns a frame rate that
    /// still has to be reported to the vehicle.
    fn present(&mut self, effect: ConsumerEffect) -> Option<u32> {
        match effect {
            ConsumerEffect::Publish(payload) => self.publish(payload),
            ConsumerEffect::Advise(message, severity) => self.advise(message, severity),
            ConsumerEffect::ReportFps(fps) => return Some(fps),
        }
        None
    }

    // ── Status poll ──────────────────────────────────────────────────────────

    fn spawn_status_poll(&self) {
        let Some(poller) = self.poller.clone() else {
            return;
        };
        let results = self.poll_tx.clone();
        let epoch = self.link_epoch;
        tokio::spawn(async move {
            let _ = results.send((epoch, poller.fetch().await));
        });
    }

    async fn on_status_poll(&mut self, epoch: u64, result: Result<StatusSample, TeleopError>) {
        if epoch != self.link_epoch || !self.session.state().is_connected() {
            debug!(epoch, current = self.link_epoch, "discarding status poll from a closed link");
            return;
        }
        match result {
            Ok(sample) => self.apply_telemetry(TelemetryFrame::Status(sample), now()).await,
            Err(e) => warn!(error = %e, "status poll failed"),
        }
    }

    // ── Presentation ─────────────────────────────────────────────────────────

    fn publish(&self, payload: EventPayload) {
        self.bus.publish(Event::new("teleop-client", payload));
    }

    fn advise(&mut self, message: impl Into<String>, severity: Severity) {
        self.relay.post(message, severity, now());
    }
}
