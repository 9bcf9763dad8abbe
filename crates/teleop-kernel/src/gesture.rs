//! Gesture geometry: raw pointer samples to normalised axes.
//!
//! | Step | Rule |
//! |---|---|
//! | polar | origin + pointer → `(distance, angle)`, screen y inverted |
//! | normalise | `n = (min(d, dmax) / dmax) · (cos θ, sin θ)`, each in `[-1, 1]` |
//! | deadzone | any axis with `|n| < ε` becomes exactly `0.0` |

/// Default deadzone threshold.
pub const DEFAULT_DEADZONE: f32 = 0.05;

/// Default reference radius: raw distances are expressed in the same
/// units (pixels for an on-screen joystick).
pub const DEFAULT_MAX_RADIUS: f32 = 50.0;

/// A point in screen coordinates (x right, y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Distance and angle (radians, counter-clockwise from +x, y up) of
/// `current` relative to `origin`.
pub fn polar(origin: Point, current: Point) -> (f32, f32) {
    let dx = current.x - origin.x;
    // Screen y grows downward; "up" on screen is positive y on the joystick.
    let dy = origin.y - current.y;
    (dx.hypot(dy), dy.atan2(dx))
}

/// Map a raw `(distance, angle)` sample onto the unit square.
///
/// Non-finite input yields the neutral `(0, 0)`.
pub fn normalize(distance: f32, angle: f32, max_radius: f32) -> (f32, f32) {
    if !distance.is_finite() || !angle.is_finite() || max_radius <= 0.0 {
        return (0.0, 0.0);
    }
    let magnitude = distance.clamp(0.0, max_radius) / max_radius;
    let x = (magnitude * angle.cos()).clamp(-1.0, 1.0);
    let y = (magnitude * angle.sin()).clamp(-1.0, 1.0);
    (x, y)
}

/// Zero out a single axis below `epsilon`.
pub fn apply_deadzone(value: f32, epsilon: f32) -> f32 {
    if value.abs() < epsilon { 0.0 } else { value }
}
