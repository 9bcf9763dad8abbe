//! [`TelemetryConsumer`] – latest-wins application of pushed telemetry.
//!
//! Each telemetry kind is independent. Video, map layers, pose, status and
//! sensor samples each keep exactly one current value, and a new sample of
//! a kind replaces the previous one. Nothing is queued, so a fast producer
//! can never grow memory or display lag.
//!
//! The consumer does no I/O. [`apply`](TelemetryConsumer::apply) returns
//! [`ConsumerEffect`]s that the client loop publishes or transmits.
//!
//! # Video placeholder latch
//!
//! A `video_error` (or a link drop) swaps the current frame for the "no
//! signal" placeholder and latches it. Frames that were already in flight
//! when the error was raised must not bring the picture back, so while
//! latched a timestamped frame is only shown if it was captured strictly
//! after the error. Without timestamps on both sides the channel's arrival
//! order is all there is, and the first frame received after the error
//! releases the latch. Re-establishing the link clears it as well.

use std::sync::Arc;
use std::time::Instant;

use teleop_types::{
    ColoredPoint, EventPayload, MapUpdate, Pose, SensorSample, Severity, StatusSample,
    TelemetryFrame, VideoFrame,
};
use tracing::debug;

use crate::fps::FrameRateMeter;

/// What the client loop must do after applying a frame.
#[derive(Debug, Clone)]
pub enum ConsumerEffect {
    /// Hand a snapshot to presentation.
    Publish(EventPayload),
    /// Tell the vehicle the measured frame rate (`update_fps`).
    ReportFps(u32),
    /// Surface an operator advisory.
    Advise(String, Severity),
}

#[derive(Debug, Clone, PartialEq)]
struct VideoLatch {
    /// Frames must be captured strictly after this to release the latch.
    not_before: Option<f64>,
}

#[derive(Debug, Default)]
pub struct TelemetryConsumer {
    video: Option<Arc<VideoFrame>>,
    latch: Option<VideoLatch>,
    last_capture: Option<f64>,
    grid: Option<Arc<Vec<u8>>>,
    cloud: Option<Arc<Vec<ColoredPoint>>>,
    pose: Pose,
    status: Option<StatusSample>,
    sensor: Option<SensorSample>,
    meter: FrameRateMeter,
    fps: Option<u32>,
}

impl TelemetryConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    /// The frame on display; `None` means the placeholder.
    pub fn current_video(&self) -> Option<&Arc<VideoFrame>> {
        self.video.as_ref()
    }

    pub fn is_streaming(&self) -> bool {
        self.video.is_some() && self.latch.is_none()
    }

    pub fn occupancy_grid(&self) -> Option<&Arc<Vec<u8>>> {
        self.grid.as_ref()
    }

    pub fn point_cloud(&self) -> Option<&Arc<Vec<ColoredPoint>>> {
        self.cloud.as_ref()
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn status(&self) -> Option<&StatusSample> {
        self.status.as_ref()
    }

    pub fn sensor(&self) -> Option<&SensorSample> {
        self.sensor.as_ref()
    }

    pub fn fps(&self) -> Option<u32> {
        self.fps
    }

    // ── Application ──────────────────────────────────────────────────────────

    pub fn apply(&mut self, frame: TelemetryFrame, now: Instant) -> Vec<ConsumerEffect> {
        match frame {
            TelemetryFrame::Video(video) => self.apply_video(video, now),
            TelemetryFrame::VideoError { message, timestamp } => {
                self.apply_video_error(message, timestamp)
            }
            TelemetryFrame::Map(update) => self.apply_map(update),
            TelemetryFrame::Status(sample) => {
                self.status = Some(sample.clone());
                vec![ConsumerEffect::Publish(EventPayload::Status(sample))]
            }
            TelemetryFrame::Sensor(sample) => {
                self.sensor = Some(sample.clone());
                vec![ConsumerEffect::Publish(EventPayload::Sensor(sample))]
            }
        }
    }

    /// Link established: clear the placeholder latch, restart the FPS window.
    pub fn on_link_up(&mut self, now: Instant) {
        self.latch = None;
        self.meter.restart(now);
    }

    /// Link lost: show the placeholder.
    pub fn on_link_down(&mut self, reason: &str) -> Vec<ConsumerEffect> {
        self.meter.reset();
        self.video = None;
        let already_latched = self.latch.is_some();
        self.latch = Some(VideoLatch {
            not_before: self.last_capture,
        });
        if already_latched {
            return Vec::new();
        }
        vec![ConsumerEffect::Publish(EventPayload::VideoLost {
            reason: reason.to_string(),
        })]
    }

    fn apply_video(&mut self, video: VideoFrame, now: Instant) -> Vec<ConsumerEffect> {
        if let Some(latch) = &self.latch {
            let fresh = match (video.captured_at, latch.not_before) {
                (Some(captured), Some(limit)) => captured > limit,
                // Frames arrive in order on the link: this one followed the error.
                _ => true,
            };
            if !fresh {
                debug!(
                    captured_at = ?video.captured_at,
                    "dropping stale video frame behind placeholder"
                );
                return Vec::new();
            }
            self.latch = None;
        }

        if let Some(captured) = video.captured_at {
            self.last_capture = Some(self.last_capture.map_or(captured, |last| last.max(captured)));
        }
        let frame = Arc::new(video);
        self.video = Some(Arc::clone(&frame));

        let mut effects = vec![ConsumerEffect::Publish(EventPayload::VideoFrame(frame))];
        if let Some(fps) = self.meter.record(now) {
            self.fps = Some(fps);
            effects.push(ConsumerEffect::Publish(EventPayload::FrameRate(fps)));
            effects.push(ConsumerEffect::ReportFps(fps));
        }
        effects
    }

    fn apply_video_error(
        &mut self,
        message: String,
        timestamp: Option<f64>,
    ) -> Vec<ConsumerEffect> {
        self.video = None;
        self.meter.reset();
        self.latch = Some(VideoLatch {
            not_before: timestamp.or(self.last_capture),
        });
        vec![
            ConsumerEffect::Publish(EventPayload::VideoLost {
                reason: message.clone(),
            }),
            ConsumerEffect::Advise(format!("Video error: {message}"), Severity::Warning),
        ]
    }

    fn apply_map(&mut self, update: MapUpdate) -> Vec<ConsumerEffect> {
        if update.is_empty() {
            debug!("map update carried no usable component");
            return Vec::new();
        }
        let mut effects = Vec::new();

        if let Some(grid) = update.grid2d {
            let grid = Arc::new(grid);
            self.grid = Some(Arc::clone(&grid));
            effects.push(ConsumerEffect::Publish(EventPayload::OccupancyGrid(grid)));
        }
        if let Some(points) = update.points3d {
            let points = Arc::new(points);
            self.cloud = Some(Arc::clone(&points));
            effects.push(ConsumerEffect::Publish(EventPayload::PointCloud(points)));
        }
        if update.position.is_some() || update.orientation.is_some() {
            if let Some(position) = update.position {
                self.pose.position = position;
            }
            if let Some(orientation) = update.orientation {
                self.pose.orientation = orientation;
            }
            effects.push(ConsumerEffect::Publish(EventPayload::Pose(self.pose)));
        }
        effects
    }
}
