//! JSON wire envelope shared with the remote controller.
//!
//! Every text frame is an object of the form
//! `{"event": "<name>", "data": <payload>}`; events without a payload omit
//! `data`.
//!
//! Inbound payloads are validated here, at the boundary, and turned into the
//! typed [`TelemetryFrame`] variants. A payload whose overall shape is wrong
//! is rejected as a whole with [`TeleopError::MalformedPayload`]. Within a
//! well-formed status or sensor sample each field is validated on its own: a
//! non-numeric CPU reading blanks that one reading, it does not discard the
//! whole sample. Map components are validated as units, so a single bad
//! point drops the point cloud while the pose in the same update still
//! applies.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use teleop_types::{
    ColoredPoint, ControlCommand, MapUpdate, Orientation, SensorSample, ServerNotice, Severity,
    StatusSample, TelemetryFrame, TeleopError, Vec3, VideoFrame,
};
use tracing::warn;

// ─────────────────────────────────────────────────────────────────────────────
// Outbound
// ─────────────────────────────────────────────────────────────────────────────

/// Events the client sends to the remote controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Outbound {
    JoystickMovement { x: f32, y: f32 },
    GimbalControl { pan: i32, tilt: i32 },
    CalibrateImu,
    UpdateFps { fps: u32 },
    Pong,
}

impl From<ControlCommand> for Outbound {
    fn from(command: ControlCommand) -> Self {
        match command {
            ControlCommand::Movement { x, y } => Outbound::JoystickMovement { x, y },
            ControlCommand::Gimbal { pan, tilt } => Outbound::GimbalControl { pan, tilt },
        }
    }
}

/// Serialise an outbound event into its text frame.
pub fn encode_outbound(message: &Outbound) -> Result<String, TeleopError> {
    serde_json::to_string(message).map_err(|e| TeleopError::Serialization(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────────────────────────────────────

/// A validated inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Telemetry(TelemetryFrame),
    /// `notification` – an advisory raised by the vehicle.
    Notice { message: String, severity: Severity },
    /// `status` – an informational server message.
    ServerStatus(String),
    /// Server heartbeat; answered with [`Outbound::Pong`].
    Ping,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Parse and validate one inbound text frame.
///
/// `received_at` stamps video frames with their arrival time.
pub fn decode_inbound(text: &str, received_at: DateTime<Utc>) -> Result<InboundEvent, TeleopError> {
    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|e| TeleopError::malformed("<envelope>", e.to_string()))?;
    let data = &envelope.data;

    match envelope.event.as_str() {
        "status_update" => {
            parse_status(data).map(|s| InboundEvent::Telemetry(TelemetryFrame::Status(s)))
        }
        "sensor_data" => {
            parse_sensor(data).map(|s| InboundEvent::Telemetry(TelemetryFrame::Sensor(s)))
        }
        "video_frame" => parse_video_frame(data, received_at)
            .map(|f| InboundEvent::Telemetry(TelemetryFrame::Video(f))),
        "video_error" => {
            let obj = require_object("video_error", data)?;
            let message = obj
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("video stream error")
                .to_string();
            let timestamp = obj.get("timestamp").and_then(Value::as_f64);
            Ok(InboundEvent::Telemetry(TelemetryFrame::VideoError { message, timestamp }))
        }
        "map_update" => parse_map(data).map(|m| InboundEvent::Telemetry(TelemetryFrame::Map(m))),
        "notification" => {
            let obj = require_object("notification", data)?;
            let message = required_message("notification", obj)?;
            let severity = obj
                .get("severity")
                .or_else(|| obj.get("type"))
                .and_then(Value::as_str)
                .map(parse_severity)
                .unwrap_or(Severity::Info);
            Ok(InboundEvent::Notice { message, severity })
        }
        "status" => {
            let obj = require_object("status", data)?;
            required_message("status", obj).map(InboundEvent::ServerStatus)
        }
        "ping" => Ok(InboundEvent::Ping),
        other => Err(TeleopError::UnknownEvent(other.to_string())),
    }
}

/// Validate a status payload; shared by the socket and the HTTP fallback.
pub fn parse_status(data: &Value) -> Result<StatusSample, TeleopError> {
    let obj = require_object("status_update", data)?;

    let notices = match obj.get("notifications") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let message = item.get("message").and_then(Value::as_str)?;
                Some(ServerNotice {
                    message: message.to_string(),
                    timestamp: item.get("timestamp").and_then(Value::as_f64),
                })
            })
            .collect(),
        Some(_) => {
            warn!(event = "status_update", field = "notifications", "expected an array, ignoring");
            Vec::new()
        }
    };

    Ok(StatusSample {
        cpu: numeric_field("status_update", obj, "cpu_usage"),
        memory: numeric_field("status_update", obj, "memory_usage"),
        temperature: numeric_field("status_update", obj, "temperature"),
        disk: numeric_field("status_update", obj, "disk_usage"),
        uptime: numeric_field("status_update", obj, "uptime"),
        fps: numeric_field("status_update", obj, "fps"),
        notices,
    })
}

fn parse_sensor(data: &Value) -> Result<SensorSample, TeleopError> {
    let obj = require_object("sensor_data", data)?;

    let calibrated = match obj.get("is_calibrated") {
        None => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(_) => {
            warn!(event = "sensor_data", field = "is_calibrated", "expected a boolean, ignoring");
            None
        }
    };

    Ok(SensorSample {
        calibrated,
        accel: component("sensor_data", obj, "accelerometer", vec3),
        gyro: component("sensor_data", obj, "gyroscope", vec3),
        orientation: component("sensor_data", obj, "orientation", orientation),
    })
}

fn parse_video_frame(data: &Value, received_at: DateTime<Utc>) -> Result<VideoFrame, TeleopError> {
    // Frames are objects carrying base64 in `data`; a bare string is the
    // legacy shape and is refused.
    let obj = require_object("video_frame", data)?;
    let encoded = obj
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| TeleopError::malformed("video_frame", "missing string field 'data'"))?;
    let payload = decode_base64(strip_data_url(encoded))
        .map_err(|reason| TeleopError::malformed("video_frame", reason))?;
    if payload.is_empty() {
        return Err(TeleopError::malformed("video_frame", "empty frame"));
    }

    Ok(VideoFrame {
        payload,
        captured_at: obj.get("timestamp").and_then(Value::as_f64),
        received_at,
    })
}

fn parse_map(data: &Value) -> Result<MapUpdate, TeleopError> {
    let obj = require_object("map_update", data)?;

    let grid2d = component("map_update", obj, "map_2d", |v| {
        v.as_str().and_then(|s| decode_base64(strip_data_url(s)).ok())
    });
    let points3d = component("map_update", obj, "map_3d", |v| {
        v.as_array()?.iter().map(colored_point).collect::<Option<Vec<_>>>()
    });

    Ok(MapUpdate {
        grid2d,
        points3d,
        position: component("map_update", obj, "position", vec3),
        orientation: component("map_update", obj, "orientation", orientation),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Field helpers
// ─────────────────────────────────────────────────────────────────────────────

type Object = serde_json::Map<String, Value>;

fn require_object<'a>(event: &str, data: &'a Value) -> Result<&'a Object, TeleopError> {
    data.as_object()
        .ok_or_else(|| TeleopError::malformed(event, "payload is not an object"))
}

fn required_message(event: &str, obj: &Object) -> Result<String, TeleopError> {
    obj.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| TeleopError::malformed(event, "missing string field 'message'"))
}

fn numeric_field(event: &str, obj: &Object, key: &str) -> Option<f64> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => {
            let number = value.as_f64().filter(|n| n.is_finite());
            if number.is_none() {
                warn!(event = event, field = key, "expected a number, ignoring");
            }
            number
        }
    }
}

/// Parse an optional component as a unit: absent → `None` silently, present
/// but invalid → `None` with a warning.
fn component<T>(
    event: &str,
    obj: &Object,
    key: &str,
    parse: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => {
            let parsed = parse(value);
            if parsed.is_none() {
                warn!(event = event, field = key, "malformed component dropped");
            }
            parsed
        }
    }
}

fn finite(value: &Value, key: &str) -> Option<f32> {
    value
        .get(key)?
        .as_f64()
        .filter(|n| n.is_finite())
        .map(|n| n as f32)
}

fn vec3(value: &Value) -> Option<Vec3> {
    Some(Vec3::new(finite(value, "x")?, finite(value, "y")?, finite(value, "z")?))
}

fn orientation(value: &Value) -> Option<Orientation> {
    Some(Orientation {
        roll: finite(value, "roll")?,
        pitch: finite(value, "pitch")?,
        yaw: finite(value, "yaw")?,
    })
}

fn channel(value: &Value, key: &str) -> Option<u8> {
    let n = value.get(key)?.as_u64()?;
    u8::try_from(n).ok()
}

fn colored_point(value: &Value) -> Option<ColoredPoint> {
    Some(ColoredPoint {
        position: vec3(value)?,
        r: channel(value, "r")?,
        g: channel(value, "g")?,
        b: channel(value, "b")?,
    })
}

fn strip_data_url(encoded: &str) -> &str {
    match encoded.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, body)| body).unwrap_or(rest),
        None => encoded,
    }
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>, String> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("invalid base64: {e}"))
}

fn parse_severity(raw: &str) -> Severity {
    match raw.to_ascii_lowercase().as_str() {
        "success" => Severity::Success,
        "warning" | "warn" => Severity::Warning,
        "danger" | "error" => Severity::Danger,
        _ => Severity::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> Result<InboundEvent, TeleopError> {
        decode_inbound(&value.to_string(), Utc::now())
    }

    #[test]
    fn encodes_outbound_events_with_snake_case_names() {
        let movement =
            encode_outbound(&Outbound::from(ControlCommand::Movement { x: 0.5, y: -1.0 })).unwrap();
        assert_eq!(movement, r#"{"event":"joystick_movement","data":{"x":0.5,"y":-1.0}}"#);

        let gimbal = encode_outbound(&Outbound::GimbalControl { pan: 125, tilt: 40 }).unwrap();
        assert_eq!(gimbal, r#"{"event":"gimbal_control","data":{"pan":125,"tilt":40}}"#);

        assert_eq!(
            encode_outbound(&Outbound::CalibrateImu).unwrap(),
            r#"{"event":"calibrate_imu"}"#
        );
        assert_eq!(encode_outbound(&Outbound::Pong).unwrap(), r#"{"event":"pong"}"#);
        assert_eq!(
            encode_outbound(&Outbound::UpdateFps { fps: 20 }).unwrap(),
            r#"{"event":"update_fps","data":{"fps":20}}"#
        );
    }

    #[test]
    fn status_fields_are_validated_independently() {
        let event = decode(json!({
            "event": "status_update",
            "data": {
                "cpu_usage": 72.5,
                "memory_usage": "lots",
                "temperature": 51,
                "fps": null,
                "notifications": [
                    {"message": "System started", "timestamp": 1700000000.0},
                    {"no_message": true}
                ]
            }
        }))
        .unwrap();

        let InboundEvent::Telemetry(TelemetryFrame::Status(status)) = event else {
            panic!("expected status sample");
        };
        assert_eq!(status.cpu, Some(72.5));
        assert_eq!(status.memory, None, "non-numeric memory must be blanked");
        assert_eq!(status.temperature, Some(51.0));
        assert_eq!(status.fps, None);
        assert_eq!(status.notices.len(), 1);
        assert_eq!(status.notices[0].message, "System started");
    }

    #[test]
    fn status_that_is_not_an_object_is_rejected() {
        let err = decode(json!({"event": "status_update", "data": [1, 2, 3]})).unwrap_err();
        assert!(matches!(err, TeleopError::MalformedPayload { .. }));
    }

    #[test]
    fn sensor_sample_parses_nested_vectors() {
        let event = decode(json!({
            "event": "sensor_data",
            "data": {
                "is_calibrated": true,
                "accelerometer": {"x": 0.1, "y": 0.2, "z": 9.8},
                "gyroscope": {"x": 0.0, "y": "bad", "z": 0.0},
                "orientation": {"roll": 0.0, "pitch": 0.1, "yaw": 1.5}
            }
        }))
        .unwrap();

        let InboundEvent::Telemetry(TelemetryFrame::Sensor(sensor)) = event else {
            panic!("expected sensor sample");
        };
        assert_eq!(sensor.calibrated, Some(true));
        assert_eq!(sensor.accel, Some(Vec3::new(0.1, 0.2, 9.8)));
        assert_eq!(sensor.gyro, None);
        assert!(sensor.orientation.is_some());
    }

    #[test]
    fn video_frame_object_is_decoded() {
        let encoded = STANDARD.encode([0xFF, 0xD8, 0xFF, 0xE0]);
        let event = decode(json!({
            "event": "video_frame",
            "data": {"data": encoded, "timestamp": 12.5}
        }))
        .unwrap();

        let InboundEvent::Telemetry(TelemetryFrame::Video(frame)) = event else {
            panic!("expected video frame");
        };
        assert_eq!(frame.payload, vec![0xFF, 0xD8, 0xFF, 0xE0]);
        assert_eq!(frame.captured_at, Some(12.5));
    }

    #[test]
    fn video_frame_accepts_data_url_prefix() {
        let encoded = format!("data:image/jpeg;base64,{}", STANDARD.encode([1, 2, 3]));
        let event = decode(json!({"event": "video_frame", "data": {"data": encoded}})).unwrap();
        assert!(matches!(
            event,
            InboundEvent::Telemetry(TelemetryFrame::Video(VideoFrame { ref payload, .. }))
                if payload == &vec![1, 2, 3]
        ));
    }

    #[test]
    fn bare_string_video_frame_is_malformed() {
        let err = decode(json!({"event": "video_frame", "data": "AAAA"})).unwrap_err();
        assert!(matches!(
            err,
            TeleopError::MalformedPayload { ref event, .. } if event == "video_frame"
        ));
    }

    #[test]
    fn invalid_base64_video_frame_is_malformed() {
        let err = decode(json!({"event": "video_frame", "data": {"data": "***"}})).unwrap_err();
        assert!(matches!(err, TeleopError::MalformedPayload { .. }));
    }

    #[test]
    fn map_components_fail_independently() {
        let event = decode(json!({
            "event": "map_update",
            "data": {
                "map_3d": [
                    {"x": 1.0, "y": 2.0, "z": 0.5, "r": 255, "g": 0, "b": 0},
                    {"x": 1.0, "y": 2.0, "z": 0.5, "r": 999, "g": 0, "b": 0}
                ],
                "position": {"x": 3.0, "y": -1.0, "z": 0.0},
                "orientation": {"roll": 0.0, "pitch": 0.0, "yaw": 0.7}
            }
        }))
        .unwrap();

        let InboundEvent::Telemetry(TelemetryFrame::Map(update)) = event else {
            panic!("expected map update");
        };
        assert!(update.points3d.is_none(), "cloud with an invalid point must be dropped whole");
        assert!(update.grid2d.is_none());
        assert_eq!(update.position, Some(Vec3::new(3.0, -1.0, 0.0)));
        assert!(update.orientation.is_some());
    }

    #[test]
    fn video_error_keeps_message_and_timestamp() {
        let event = decode(json!({
            "event": "video_error",
            "data": {"message": "camera unplugged", "timestamp": 99.0}
        }))
        .unwrap();
        assert_eq!(
            event,
            InboundEvent::Telemetry(TelemetryFrame::VideoError {
                message: "camera unplugged".to_string(),
                timestamp: Some(99.0),
            })
        );
    }

    #[test]
    fn notification_defaults_to_info() {
        let event = decode(json!({
            "event": "notification",
            "data": {"message": "IMU Calibration Complete"}
        }))
        .unwrap();
        assert_eq!(
            event,
            InboundEvent::Notice {
                message: "IMU Calibration Complete".to_string(),
                severity: Severity::Info,
            }
        );
    }

    #[test]
    fn notification_without_message_is_malformed() {
        let err = decode(json!({"event": "notification", "data": {}})).unwrap_err();
        assert!(matches!(err, TeleopError::MalformedPayload { .. }));
    }

    #[test]
    fn ping_needs_no_payload() {
        assert_eq!(decode_inbound(r#"{"event":"ping"}"#, Utc::now()).unwrap(), InboundEvent::Ping);
    }

    #[test]
    fn unknown_event_is_reported() {
        let err = decode(json!({"event": "self_destruct", "data": {}})).unwrap_err();
        assert_eq!(err, TeleopError::UnknownEvent("self_destruct".to_string()));
    }

    #[test]
    fn garbage_text_is_malformed() {
        let err = decode_inbound("not json at all", Utc::now()).unwrap_err();
        assert!(matches!(err, TeleopError::MalformedPayload { .. }));
    }
}
