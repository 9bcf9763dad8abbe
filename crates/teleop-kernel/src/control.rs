//! [`ControlChannel`] – gesture samples to rate-limited commands.
//!
//! One instance per actuator. The channel is a pure state machine: it
//! never sends anything itself, it *returns* the command that should be
//! sent (if any) and the caller transmits it.
//!
//! # Lifecycle of a gesture
//!
//! ```text
//!   begin ──► update … update ──► end
//!    │           │                 │
//!    │           │                 ├─ Movement: STOP, immediately
//!    │           │                 └─ Camera:   arm auto-center timer
//!    │           └─ throttled: at most one command per interval,
//!    │              excess samples dropped (never queued)
//!    └─ cancels a pending auto-center
//! ```
//!
//! While suspended (link down) nothing is emitted. A gesture that is in
//! progress when the link drops, or that starts while the link is down,
//! becomes *stale* and stays silent until it ends, so that input captured
//! before a disconnect is never replayed after the reconnect.

use std::time::{Duration, Instant};

use teleop_types::{ChannelKind, ControlCommand, TeleopError};
use tracing::debug;

use crate::gesture::{self, DEFAULT_DEADZONE, DEFAULT_MAX_RADIUS, Point};
use crate::gimbal::GimbalLimits;

/// Tunables for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSettings {
    /// Minimum spacing between two throttled commands.
    pub interval: Duration,
    pub deadzone: f32,
    pub max_radius: f32,
    /// Camera only: delay between release and the return to center.
    pub auto_center_delay: Duration,
    pub gimbal: GimbalLimits,
}

impl ChannelSettings {
    /// Drive base: 20 Hz.
    pub fn movement() -> Self {
        Self {
            interval: Duration::from_millis(50),
            deadzone: DEFAULT_DEADZONE,
            max_radius: DEFAULT_MAX_RADIUS,
            auto_center_delay: Duration::from_secs(5),
            gimbal: GimbalLimits::default(),
        }
    }

    /// Camera gimbal: 10 Hz, auto-center after 5 s.
    pub fn camera() -> Self {
        Self {
            interval: Duration::from_millis(100),
            ..Self::movement()
        }
    }

    pub fn for_kind(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Movement => Self::movement(),
            ChannelKind::Camera => Self::camera(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Active { origin: Option<Point> },
    /// Started or interrupted while the link was down. Silent until it ends.
    Stale,
}

/// Single-shot auto-center timer. Owned by the channel, so dropping or
/// replacing it is the cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AutoCenter {
    deadline: Instant,
}

/// Per-actuator gesture pipeline.
#[derive(Debug)]
pub struct ControlChannel {
    kind: ChannelKind,
    settings: ChannelSettings,
    phase: Phase,
    axes: (f32, f32),
    last_emit: Option<Instant>,
    auto_center: Option<AutoCenter>,
    suspended: bool,
}

impl ControlChannel {
    /// A new channel starts suspended: nothing is emitted until
    /// [`resume`](Self::resume) is called on link-up.
    pub fn new(kind: ChannelKind, settings: ChannelSettings) -> Self {
        Self {
            kind,
            settings,
            phase: Phase::Idle,
            axes: (0.0, 0.0),
            last_emit: None,
            auto_center: None,
            suspended: true,
        }
    }

    pub fn movement() -> Self {
        Self::new(ChannelKind::Movement, ChannelSettings::movement())
    }

    pub fn camera() -> Self {
        Self::new(ChannelKind::Camera, ChannelSettings::camera())
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn settings(&self) -> &ChannelSettings {
        &self.settings
    }

    /// Last normalised axes after deadzone.
    pub fn axes(&self) -> (f32, f32) {
        self.axes
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active { .. })
    }

    /// Deadline of the pending auto-center, if one is armed.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.auto_center.map(|t| t.deadline)
    }

    /// The command that puts this actuator at rest.
    pub fn safe_command(&self) -> ControlCommand {
        match self.kind {
            ChannelKind::Movement => ControlCommand::STOP,
            ChannelKind::Camera => {
                let (pan, tilt) = self.settings.gimbal.centered();
                ControlCommand::Gimbal { pan, tilt }
            }
        }
    }

    // ── Gesture input ────────────────────────────────────────────────────────

    /// Start a gesture driven by raw `(distance, angle)` samples.
    ///
    /// Cancels any pending auto-center. Fails with
    /// [`TeleopError::NotConnected`] while suspended; the gesture is then
    /// stale and every sample until its end is discarded.
    pub fn begin_gesture(&mut self) -> Result<(), TeleopError> {
        self.begin(None)
    }

    /// Start a gesture described by pointer positions relative to `origin`.
    pub fn begin_pointer_gesture(&mut self, origin: Point) -> Result<(), TeleopError> {
        self.begin(Some(origin))
    }

    fn begin(&mut self, origin: Option<Point>) -> Result<(), TeleopError> {
        if self.auto_center.take().is_some() {
            debug!(channel = %self.kind, "auto-center cancelled by new gesture");
        }
        if self.suspended {
            self.phase = Phase::Stale;
            return Err(TeleopError::NotConnected(format!("{} gesture", self.kind)));
        }
        self.phase = Phase::Active { origin };
        Ok(())
    }

    /// Feed one raw sample.
    ///
    /// A sample arriving with no gesture in progress implicitly begins one,
    /// so the only error is the implicit begin being refused. Returns the
    /// command to transmit, or `None` when the sample is throttled or the
    /// gesture is stale.
    pub fn on_gesture_update(
        &mut self,
        distance: f32,
        angle: f32,
        now: Instant,
    ) -> Result<Option<ControlCommand>, TeleopError> {
        match self.phase {
            Phase::Idle => self.begin(None)?,
            Phase::Stale => return Ok(None),
            Phase::Active { .. } => {}
        }

        let (nx, ny) = gesture::normalize(distance, angle, self.settings.max_radius);
        self.axes = (
            gesture::apply_deadzone(nx, self.settings.deadzone),
            gesture::apply_deadzone(ny, self.settings.deadzone),
        );

        let due = self
            .last_emit
            .is_none_or(|last| now.saturating_duration_since(last) >= self.settings.interval);
        if !due {
            return Ok(None);
        }
        self.last_emit = Some(now);
        Ok(Some(self.command_for(self.axes)))
    }

    /// Feed a pointer position for a gesture begun with
    /// [`begin_pointer_gesture`](Self::begin_pointer_gesture).
    /// Positions without a known origin are ignored.
    pub fn on_pointer_move(
        &mut self,
        pointer: Point,
        now: Instant,
    ) -> Result<Option<ControlCommand>, TeleopError> {
        let Phase::Active {
            origin: Some(origin),
        } = self.phase
        else {
            return Ok(None);
        };
        let (distance, angle) = gesture::polar(origin, pointer);
        self.on_gesture_update(distance, angle, now)
    }

    /// Release. Movement returns the zero command immediately, bypassing
    /// the throttle; Camera arms the auto-center timer and returns nothing.
    pub fn on_gesture_end(&mut self, now: Instant) -> Option<ControlCommand> {
        let previous = std::mem::replace(&mut self.phase, Phase::Idle);
        if !matches!(previous, Phase::Active { .. }) {
            return None;
        }
        match self.kind {
            ChannelKind::Movement => {
                self.axes = (0.0, 0.0);
                self.last_emit = Some(now);
                Some(ControlCommand::STOP)
            }
            ChannelKind::Camera => {
                self.auto_center = Some(AutoCenter {
                    deadline: now + self.settings.auto_center_delay,
                });
                None
            }
        }
    }

    /// Fire the auto-center timer if it is due. Fires at most once per arm.
    pub fn poll_timer(&mut self, now: Instant) -> Option<ControlCommand> {
        let timer = self.auto_center?;
        if now < timer.deadline {
            return None;
        }
        self.auto_center = None;
        self.axes = (0.0, 0.0);
        if self.suspended {
            return None;
        }
        self.last_emit = Some(now);
        Some(self.safe_command())
    }

    // ── Link state ───────────────────────────────────────────────────────────

    /// Link lost: zero the axes, cancel the timer, mark any gesture stale,
    /// and stop emitting. Returns the safe command for a best-effort send.
    pub fn force_safe(&mut self) -> ControlCommand {
        self.auto_center = None;
        self.axes = (0.0, 0.0);
        self.last_emit = None;
        if matches!(self.phase, Phase::Active { .. }) {
            self.phase = Phase::Stale;
        }
        self.suspended = true;
        self.safe_command()
    }

    /// Link restored. Only a fresh gesture emits again.
    pub fn resume(&mut self) {
        self.suspended = false;
        self.last_emit = None;
    }

    fn command_for(&self, (x, y): (f32, f32)) -> ControlCommand {
        match self.kind {
            ChannelKind::Movement => ControlCommand::Movement { x, y },
            ChannelKind::Camera => {
                let (pan, tilt) = self.settings.gimbal.map(x, y);
                ControlCommand::Gimbal { pan, tilt }
            }
        }
    }
}
