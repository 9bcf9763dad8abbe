//! Camera gimbal geometry.

/// Pan/tilt envelope of the camera gimbal, in integer degrees.
///
/// The defaults mirror the servo limits enforced on the vehicle: the
/// client clamps to the same box so that nothing it transmits is ever
/// rejected server-side.
#[derive(Debug, Clone, PartialEq)]
pub struct GimbalLimits {
    pub pan_default: i32,
    pub tilt_default: i32,
    /// Degrees of pan for a full horizontal deflection.
    pub pan_range: f32,
    /// Degrees of tilt for a full vertical deflection (pushing up tilts down).
    pub tilt_range: f32,
    pub pan_min: i32,
    pub pan_max: i32,
    pub tilt_min: i32,
    pub tilt_max: i32,
}

impl Default for GimbalLimits {
    fn default() -> Self {
        Self {
            pan_default: 80,
            tilt_default: 40,
            pan_range: 45.0,
            tilt_range: 40.0,
            pan_min: 35,
            pan_max: 125,
            tilt_min: 0,
            tilt_max: 85,
        }
    }
}

impl GimbalLimits {
    /// Absolute pan/tilt for a normalised `(x, y)`.
    pub fn map(&self, x: f32, y: f32) -> (i32, i32) {
        let pan = (self.pan_default as f32 + x * self.pan_range).round() as i32;
        let tilt = (self.tilt_default as f32 - y * self.tilt_range).round() as i32;
        (
            pan.clamp(self.pan_min, self.pan_max),
            tilt.clamp(self.tilt_min, self.tilt_max),
        )
    }

    /// The resting position.
    pub fn centered(&self) -> (i32, i32) {
        (
            self.pan_default.clamp(self.pan_min, self.pan_max),
            self.tilt_default.clamp(self.tilt_min, self.tilt_max),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_right_pans_to_limit() {
        assert_eq!(GimbalLimits::default().map(1.0, 0.0), (125, 40));
    }

    #[test]
    fn full_left_and_up() {
        // 80 − 45 = 35, 40 − 40 = 0
        assert_eq!(GimbalLimits::default().map(-1.0, 1.0), (35, 0));
    }

    #[test]
    fn full_down_is_clamped_to_tilt_max() {
        // 40 + 40 = 80 fits; a wider range must clamp to 85.
        let wide = GimbalLimits {
            tilt_range: 60.0,
            ..Default::default()
        };
        assert_eq!(GimbalLimits::default().map(0.0, -1.0), (80, 80));
        assert_eq!(wide.map(0.0, -1.0), (80, 85));
    }

    #[test]
    fn values_are_rounded() {
        // 80 + 0.5·45 = 102.5 → 103 (round half away from zero)
        assert_eq!(GimbalLimits::default().map(0.5, 0.0), (103, 40));
    }

    #[test]
    fn centered_is_default() {
        assert_eq!(GimbalLimits::default().centered(), (80, 40));
    }
}
