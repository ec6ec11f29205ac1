//! Accelerometer-derived tilt
//!
//! Treats the accelerometer reading as the gravity vector, which holds while
//! the device is quasi-static. Linear acceleration biases the result; the
//! complementary filter weight is what keeps that in check.

use nalgebra::Vector3;

use crate::math::RAD_TO_DEG;

/// Instantaneous pitch and roll in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tilt {
    pub pitch: f32,
    pub roll: f32,
}

/// Compute pitch and roll from an accelerometer reading
///
/// `pitch = atan2(-ax, sqrt(ay² + az²))`, `roll = atan2(ay, az)`. When
/// `ay = az = 0` pitch saturates at ±90° and roll is 0.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use tilt_fusion::tilt;
///
/// let level = tilt(Vector3::new(0.0, 0.0, 9.81));
/// assert!(level.pitch.abs() < 1e-6);
/// assert!(level.roll.abs() < 1e-6);
/// ```
pub fn tilt(accelerometer: Vector3<f32>) -> Tilt {
    let (ax, ay, az) = (accelerometer.x, accelerometer.y, accelerometer.z);
    let pitch = (-ax).atan2((ay * ay + az * az).sqrt()) * RAD_TO_DEG;
    let roll = ay.atan2(az) * RAD_TO_DEG;
    Tilt { pitch, roll }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    #[test]
    fn test_level_device() {
        let t = tilt(Vector3::new(0.0, 0.0, 9.81));
        assert!(t.pitch.abs() < EPSILON);
        assert!(t.roll.abs() < EPSILON);
    }

    #[test]
    fn test_nose_up_and_down() {
        let t = tilt(Vector3::new(9.81, 0.0, 0.0));
        assert!((t.pitch + 90.0).abs() < EPSILON);

        let t = tilt(Vector3::new(-9.81, 0.0, 0.0));
        assert!((t.pitch - 90.0).abs() < EPSILON);
    }

    #[test]
    fn test_roll_on_side() {
        let t = tilt(Vector3::new(0.0, 9.81, 0.0));
        assert!((t.roll - 90.0).abs() < EPSILON);
        assert!(t.pitch.abs() < EPSILON);

        let t = tilt(Vector3::new(0.0, 0.0, -9.81));
        assert!((t.roll.abs() - 180.0).abs() < EPSILON);
    }

    #[test]
    fn test_forty_five_degrees() {
        let g = 9.81f32;
        let c = g * core::f32::consts::FRAC_1_SQRT_2;
        let t = tilt(Vector3::new(0.0, c, c));
        assert!((t.roll - 45.0).abs() < EPSILON);

        let t = tilt(Vector3::new(-c, 0.0, c));
        assert!((t.pitch - 45.0).abs() < EPSILON);
    }

    #[test]
    fn test_free_fall_is_bounded() {
        let t = tilt(Vector3::zeros());
        assert!(t.pitch.is_finite());
        assert!(t.roll.is_finite());
        assert!(t.pitch.abs() <= 90.0);
    }

    #[test]
    fn test_scale_invariant() {
        let a = tilt(Vector3::new(1.0, -2.0, 3.0));
        let b = tilt(Vector3::new(10.0, -20.0, 30.0));
        assert!((a.pitch - b.pitch).abs() < EPSILON);
        assert!((a.roll - b.roll).abs() < EPSILON);
    }
}
