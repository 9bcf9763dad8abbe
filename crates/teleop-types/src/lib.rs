//! `teleop-types` – shared vocabulary of the teleop client.
//!
//! Every other crate in the workspace speaks in these types: session
//! lifecycle states, control commands, telemetry snapshots, operator
//! advisories, the in-process bus [`Event`] wrapper, and the global
//! [`TeleopError`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of the link to the remote controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Retries exhausted. Only an explicit operator retry leaves this state.
    Failed,
}

impl SessionState {
    /// `true` only while commands may be transmitted.
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Failed => "failed",
        };
        f.write_str(label)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Control
// ─────────────────────────────────────────────────────────────────────────────

/// The two independent actuation channels driven by operator gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Drive base (differential / skid steering).
    Movement,
    /// Camera pan/tilt gimbal.
    Camera,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Movement => f.write_str("movement"),
            ChannelKind::Camera => f.write_str("camera"),
        }
    }
}

/// A command ready for transmission to the vehicle.
///
/// Values are always inside their declared bounds: movement axes in
/// `[-1, 1]`, gimbal angles inside the configured pan/tilt limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ControlCommand {
    Movement { x: f32, y: f32 },
    Gimbal { pan: i32, tilt: i32 },
}

impl ControlCommand {
    /// Which channel produced this command.
    pub fn channel(&self) -> ChannelKind {
        match self {
            ControlCommand::Movement { .. } => ChannelKind::Movement,
            ControlCommand::Gimbal { .. } => ChannelKind::Camera,
        }
    }

    /// The all-stop movement command.
    pub const STOP: ControlCommand = ControlCommand::Movement { x: 0.0, y: 0.0 };
}

// ─────────────────────────────────────────────────────────────────────────────
// Geometry
// ─────────────────────────────────────────────────────────────────────────────

/// Position or vector in the vehicle frame: x forward, y lateral, z up.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Remap into a right-handed, y-up renderer frame.
    ///
    /// Forward becomes `-z`, lateral becomes `-x` and up becomes `+y`. Every
    /// 3D consumer must go through this one mapping so map points and the
    /// vehicle indicator stay aligned.
    pub fn to_y_up(self) -> [f32; 3] {
        [-self.y, self.z, -self.x]
    }
}

/// Attitude in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

/// Vehicle pose as last reported by the localisation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Orientation,
}

/// One coloured point of the 3D map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColoredPoint {
    pub position: Vec3,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

// ─────────────────────────────────────────────────────────────────────────────
// Telemetry
// ─────────────────────────────────────────────────────────────────────────────

/// A single encoded camera frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFrame {
    /// Encoded image bytes (JPEG).
    pub payload: Vec<u8>,
    /// Server capture time in seconds since the Unix epoch, when provided.
    pub captured_at: Option<f64>,
    pub received_at: DateTime<Utc>,
}

/// Independently optional parts of a map refresh.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapUpdate {
    /// Encoded occupancy image.
    pub grid2d: Option<Vec<u8>>,
    pub points3d: Option<Vec<ColoredPoint>>,
    pub position: Option<Vec3>,
    pub orientation: Option<Orientation>,
}

impl MapUpdate {
    pub fn is_empty(&self) -> bool {
        self.grid2d.is_none()
            && self.points3d.is_none()
            && self.position.is_none()
            && self.orientation.is_none()
    }
}

/// A server-side notice carried inside a status sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerNotice {
    pub message: String,
    pub timestamp: Option<f64>,
}

/// System health snapshot. A field is `None` when it was absent or not a
/// number on the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusSample {
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
    pub temperature: Option<f64>,
    pub disk: Option<f64>,
    pub uptime: Option<f64>,
    pub fps: Option<f64>,
    pub notices: Vec<ServerNotice>,
}

/// IMU snapshot with independently validated fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorSample {
    pub calibrated: Option<bool>,
    pub accel: Option<Vec3>,
    pub gyro: Option<Vec3>,
    pub orientation: Option<Orientation>,
}

/// Validated telemetry pushed by the remote controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryFrame {
    Video(VideoFrame),
    VideoError {
        message: String,
        timestamp: Option<f64>,
    },
    Map(MapUpdate),
    Status(StatusSample),
    Sensor(SensorSample),
}

impl TelemetryFrame {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryFrame::Video(_) => "video",
            TelemetryFrame::VideoError { .. } => "video_error",
            TelemetryFrame::Map(_) => "map",
            TelemetryFrame::Status(_) => "status",
            TelemetryFrame::Sensor(_) => "sensor",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Notifications
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Danger,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Success => f.write_str("success"),
            Severity::Warning => f.write_str("warning"),
            Severity::Danger => f.write_str("danger"),
        }
    }
}

/// An operator-facing advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            created_at: Utc::now(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-process bus
// ─────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the presentation bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"teleop-runtime::telemetry"`
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Everything a renderer or operator console may react to.
///
/// Large payloads are shared behind [`Arc`] so fan-out to several
/// subscribers never copies frame data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    SessionChanged {
        from: SessionState,
        to: SessionState,
    },
    CommandSent(ControlCommand),
    VideoFrame(Arc<VideoFrame>),
    /// Show the "no signal" placeholder.
    VideoLost {
        reason: String,
    },
    OccupancyGrid(Arc<Vec<u8>>),
    PointCloud(Arc<Vec<ColoredPoint>>),
    Pose(Pose),
    Status(StatusSample),
    Sensor(SensorSample),
    FrameRate(u32),
    Advisory(Notification),
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Global error type spanning link failures, malformed telemetry, and
/// rejected operator actions.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TeleopError {
    #[error("Not connected: {0} discarded")]
    NotConnected(String),

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Connect Error: {0}")]
    Connect(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Malformed '{event}' payload: {reason}")]
    MalformedPayload { event: String, reason: String },

    #[error("Unknown inbound event '{0}'")]
    UnknownEvent(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("HTTP Error: {0}")]
    Http(String),

    #[error("Config Error: {0}")]
    Config(String),
}

impl TeleopError {
    /// Shorthand for [`TeleopError::MalformedPayload`].
    pub fn malformed(event: impl Into<String>, reason: impl Into<String>) -> Self {
        TeleopError::MalformedPayload {
            event: event.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_reports_its_channel() {
        assert_eq!(ControlCommand::STOP.channel(), ChannelKind::Movement);
        let gimbal = ControlCommand::Gimbal { pan: 80, tilt: 40 };
        assert_eq!(gimbal.channel(), ChannelKind::Camera);
    }

    #[test]
    fn only_connected_state_is_connected() {
        assert!(SessionState::Connected.is_connected());
        for state in [
            SessionState::Disconnected,
            SessionState::Connecting,
            SessionState::Reconnecting,
            SessionState::Failed,
        ] {
            assert!(!state.is_connected(), "{state} must not count as connected");
        }
    }

    #[test]
    fn y_up_remap_keeps_forward_along_negative_z() {
        let forward = Vec3::new(2.0, 0.0, 0.0);
        assert_eq!(forward.to_y_up(), [0.0, 0.0, -2.0]);

        let left = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(left.to_y_up(), [-1.0, 0.0, 0.0]);

        let up = Vec3::new(0.0, 0.0, 3.0);
        assert_eq!(up.to_y_up(), [0.0, 3.0, 0.0]);
    }

    #[test]
    fn severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Danger).unwrap();
        assert_eq!(json, "\"danger\"");
    }

    #[test]
    fn empty_map_update_is_empty() {
        assert!(MapUpdate::default().is_empty());
        let update = MapUpdate {
            position: Some(Vec3::new(1.0, 0.0, 0.0)),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "teleop-runtime::session",
            EventPayload::SessionChanged {
                from: SessionState::Connecting,
                to: SessionState::Connected,
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert_eq!(event.source, back.source);
    }

    #[test]
    fn teleop_error_display() {
        let err = TeleopError::NotConnected("movement command".to_string());
        assert!(err.to_string().contains("Not connected"));

        let err = TeleopError::malformed("video_frame", "missing data");
        assert!(err.to_string().contains("video_frame"));
        assert!(err.to_string().contains("missing data"));
    }
}
