//! Mathematical utilities and nalgebra extensions

use nalgebra::Vector3;

/// Mathematical constants
pub const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;
pub const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;

/// Scale from sensor timestamps (nanoseconds) to seconds
pub const NANOS_TO_SECONDS: f64 = 1e-9;

/// Wrap an angle in degrees into (-180, 180]
///
/// Uses a closed-form remainder, so angles far outside the range are handled
/// in constant time. Non-finite input maps to 0.
///
/// # Example
/// ```
/// use tilt_fusion::wrap_angle;
///
/// assert_eq!(wrap_angle(190.0), -170.0);
/// assert_eq!(wrap_angle(-180.0), 180.0);
/// assert_eq!(wrap_angle(720.0), 0.0);
/// ```
pub fn wrap_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    if angle > -180.0 && angle <= 180.0 {
        return angle;
    }
    // rem_euclid lands in [0, 360]; fold the upper half down
    let remainder = angle.rem_euclid(360.0);
    if remainder > 180.0 {
        remainder - 360.0
    } else {
        remainder
    }
}

/// Extension trait for Vector3 operations
pub trait Vector3Ext {
    /// Convert radians to degrees
    fn rad_to_deg(&self) -> Vector3<f32>;

    /// True when every component is finite
    fn all_finite(&self) -> bool;
}

impl Vector3Ext for Vector3<f32> {
    fn rad_to_deg(&self) -> Vector3<f32> {
        *self * RAD_TO_DEG
    }

    fn all_finite(&self) -> bool {
        self.iter().all(|v| v.is_finite())
    }
}
