//! Console dashboard – the latest picture of the vehicle, fed from the bus.
//!
//! The REPL renders it on `/status` and `/notifications`; a background
//! task keeps it current by folding every bus [`Event`] into it.

use std::collections::VecDeque;

use colored::{ColoredString, Colorize};
use teleop_runtime::{Metric, MetricBand, classify, classify_status};
use teleop_types::{
    ControlCommand, Event, EventPayload, Notification, Pose, SensorSample, SessionState, Severity,
    StatusSample,
};

/// Entries kept for `/notifications`.
const HISTORY: usize = 50;

#[derive(Debug, Default)]
pub struct Dashboard {
    pub session: Option<SessionState>,
    pub status: Option<StatusSample>,
    pub sensor: Option<SensorSample>,
    pub pose: Pose,
    pub fps: Option<u32>,
    pub streaming: bool,
    pub last_command: Option<ControlCommand>,
    pub map_cells: usize,
    pub cloud_points: usize,
    notifications: VecDeque<Notification>,
}

impl Dashboard {
    /// Fold one bus event in. Returns the advisory when there is one, so the
    /// caller can print it as a toast.
    pub fn apply(&mut self, event: &Event) -> Option<&Notification> {
        match &event.payload {
            EventPayload::SessionChanged { to, .. } => self.session = Some(*to),
            EventPayload::CommandSent(cmd) => self.last_command = Some(*cmd),
            EventPayload::VideoFrame(_) => self.streaming = true,
            EventPayload::VideoLost { .. } => self.streaming = false,
            EventPayload::OccupancyGrid(grid) => self.map_cells = grid.len(),
            EventPayload::PointCloud(points) => self.cloud_points = points.len(),
            EventPayload::Pose(pose) => self.pose = *pose,
            EventPayload::Status(sample) => self.status = Some(sample.clone()),
            EventPayload::Sensor(sample) => self.sensor = Some(sample.clone()),
            EventPayload::FrameRate(fps) => self.fps = Some(*fps),
            EventPayload::Advisory(n) => {
                self.notifications.push_front(n.clone());
                self.notifications.truncate(HISTORY);
                return self.notifications.front();
            }
        }
        None
    }

    /// Advisory history, most recent first.
    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter()
    }

    /// Multi-line status report.
    pub fn render(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let session = self
            .session
            .map(|s| s.to_string())
            .unwrap_or_else(|| "disconnected".to_string());
        lines.push(format!("  Session   : {}", session.bold()));

        let video = match (self.streaming, self.fps) {
            (true, Some(fps)) => paint(format!("{fps} fps"), classify(Metric::Fps, fps as f64)),
            (true, None) => "streaming".green(),
            (false, _) => "no signal".red(),
        };
        lines.push(format!("  Video     : {video}"));

        let p = self.pose.position;
        lines.push(format!(
            "  Pose      : x={:.2} y={:.2} z={:.2} yaw={:.1}",
            p.x, p.y, p.z, self.pose.orientation.yaw
        ));
        lines.push(format!(
            "  Map       : {} cells, {} points",
            self.map_cells, self.cloud_points
        ));

        match &self.status {
            Some(sample) => {
                for (metric, value, band) in classify_status(sample) {
                    let reading = paint(format!("{value:.1}"), band);
                    lines.push(format!("  {:<10}: {}", metric.to_string(), reading));
                }
                if let Some(uptime) = sample.uptime {
                    lines.push(format!("  {:<10}: {:.0}s", "uptime", uptime));
                }
            }
            None => lines.push(format!("  Health    : {}", "no status yet".dimmed())),
        }

        if let Some(sensor) = &self.sensor {
            let calibrated = match sensor.calibrated {
                Some(true) => "calibrated".green(),
                Some(false) => "not calibrated".yellow(),
                None => "unknown".dimmed(),
            };
            lines.push(format!("  IMU       : {calibrated}"));
        }

        if let Some(cmd) = self.last_command {
            let text = match cmd {
                ControlCommand::Movement { x, y } => format!("move x={x:.2} y={y:.2}"),
                ControlCommand::Gimbal { pan, tilt } => format!("gimbal pan={pan} tilt={tilt}"),
            };
            lines.push(format!("  Last cmd  : {}", text.dimmed()));
        }
        lines
    }
}

fn paint(text: String, band: MetricBand) -> ColoredString {
    match band {
        MetricBand::Normal => text.green(),
        MetricBand::Warning => text.yellow(),
        MetricBand::Danger => text.red().bold(),
    }
}

/// One-line rendering of an advisory.
pub fn format_notification(n: &Notification) -> String {
    let tag = match n.severity {
        Severity::Info => "info".cyan(),
        Severity::Success => "ok".green(),
        Severity::Warning => "warn".yellow(),
        Severity::Danger => "ALERT".red().bold(),
    };
    format!("[{}] {} {}", n.created_at.format("%H:%M:%S"), tag, n.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(payload: EventPayload) -> Event {
        Event::new("test", payload)
    }

    #[test]
    fn advisories_are_kept_most_recent_first_and_capped() {
        let mut dash = Dashboard::default();
        for i in 0..(HISTORY + 5) {
            let n = Notification::new(format!("n{i}"), Severity::Info);
            assert!(dash.apply(&event(EventPayload::Advisory(n))).is_some());
        }
        assert_eq!(dash.notifications().count(), HISTORY);
        assert_eq!(dash.notifications().next().unwrap().message, "n54");
    }

    #[test]
    fn video_lost_clears_streaming_flag() {
        let mut dash = Dashboard::default();
        dash.apply(&event(EventPayload::FrameRate(24)));
        dash.streaming = true;
        let lost = event(EventPayload::VideoLost {
            reason: "gone".into(),
        });
        assert!(dash.apply(&lost).is_none());
        assert!(!dash.streaming);
        assert_eq!(dash.fps, Some(24));
    }

    #[test]
    fn render_lists_every_reported_metric() {
        colored::control::set_override(false);
        let mut dash = Dashboard::default();
        dash.apply(&event(EventPayload::SessionChanged {
            from: SessionState::Connecting,
            to: SessionState::Connected,
        }));
        dash.apply(&event(EventPayload::Status(StatusSample {
            cpu: Some(85.0),
            disk: Some(10.0),
            ..StatusSample::default()
        })));

        let text = dash.render().join("\n");
        assert!(text.contains("connected"));
        assert!(text.contains("cpu"));
        assert!(text.contains("85.0"));
        assert!(text.contains("disk"));
        assert!(!text.contains("temperature"));
        assert!(text.contains("no signal"));
    }

    #[test]
    fn notification_line_carries_message() {
        colored::control::set_override(false);
        let n = Notification::new("Connection lost", Severity::Danger);
        let line = format_notification(&n);
        assert!(line.contains("ALERT"));
        assert!(line.ends_with("Connection lost"));
    }
}
