//! Fixed-window frame-rate estimator.

use std::time::{Duration, Instant};

/// Counts frames and converts the count into a rate once per window.
///
/// The first frame after a reset only opens the window; every later frame
/// is counted. When at least one window has elapsed the rate
/// `round(count · 1000 / elapsed_ms)` is produced and the window restarts
/// at that frame.
#[derive(Debug, Clone)]
pub struct FrameRateMeter {
    window: Duration,
    started: Option<Instant>,
    count: u32,
}

impl Default for FrameRateMeter {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl FrameRateMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            started: None,
            count: 0,
        }
    }

    /// Open a fresh window at `now`.
    pub fn restart(&mut self, now: Instant) {
        self.started = Some(now);
        self.count = 0;
    }

    /// Forget everything; the next frame opens a new window.
    pub fn reset(&mut self) {
        self.started = None;
        self.count = 0;
    }

    /// Record one frame. Returns the rate when a window closes.
    pub fn record(&mut self, now: Instant) -> Option<u32> {
        let Some(started) = self.started else {
            self.restart(now);
            return None;
        };
        self.count = self.count.saturating_add(1);

        let elapsed = now.saturating_duration_since(started);
        if elapsed < self.window {
            return None;
        }
        let fps = (f64::from(self.count) * 1000.0 / elapsed.as_millis() as f64).round() as u32;
        self.restart(now);
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn twenty_even_frames_in_one_second_is_twenty_fps() {
        let t0 = Instant::now();
        let mut meter = FrameRateMeter::default();
        meter.restart(t0);
        let mut reported = Vec::new();
        for i in 1..=20 {
            if let Some(fps) = meter.record(t0 + ms(i * 50)) {
                reported.push(fps);
            }
        }
        assert_eq!(reported, vec![20]);
    }

    #[test]
    fn first_frame_only_opens_the_window() {
        let t0 = Instant::now();
        let mut meter = FrameRateMeter::default();
        // 21 frames spanning exactly one second: 20 intervals.
        let reported: Vec<u32> = (0..=20).filter_map(|i| meter.record(t0 + ms(i * 50))).collect();
        assert_eq!(reported, vec![20]);
    }

    #[test]
    fn uneven_window_is_scaled() {
        let t0 = Instant::now();
        let mut meter = FrameRateMeter::default();
        meter.restart(t0);
        for i in 1..15 {
            assert_eq!(meter.record(t0 + ms(i * 100)), None);
        }
        // 15 frames over 1.5 s.
        assert_eq!(meter.record(t0 + ms(1500)), Some(10));
    }

    #[test]
    fn window_restarts_after_report() {
        let t0 = Instant::now();
        let mut meter = FrameRateMeter::default();
        meter.restart(t0);
        assert_eq!(meter.record(t0 + ms(1000)), Some(1));
        assert_eq!(meter.record(t0 + ms(1500)), None);
        assert_eq!(meter.record(t0 + ms(2000)), Some(2));
    }

    #[test]
    fn reset_discards_partial_window() {
        let t0 = Instant::now();
        let mut meter = FrameRateMeter::default();
        meter.restart(t0);
        meter.record(t0 + ms(100));
        meter.reset();
        assert_eq!(meter.record(t0 + ms(5000)), None);
    }
}
