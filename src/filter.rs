//! Complementary filter blending
//!
//! ```text
//! θ_fused = α × θ_gyro + (1 - α) × θ_accel
//! ```
//!
//! Only pitch and roll have an absolute reference; yaw is carried by the
//! gyroscope alone.

use crate::tilt::Tilt;
use crate::types::OrientationState;

/// Blend a gyroscope-integrated angle with an accelerometer angle
///
/// Written as `acc + α(gyro - acc)` so that `α = 1` returns `gyro_angle`
/// and `α = 0` returns `acc_angle` bit-exactly.
///
/// # Example
/// ```
/// use tilt_fusion::fuse;
///
/// assert_eq!(fuse(1.0, 12.5, -3.0), 12.5);
/// assert_eq!(fuse(0.0, 12.5, -3.0), -3.0);
/// assert!((fuse(0.9, 10.0, 0.0) - 9.0).abs() < 1e-6);
/// ```
pub fn fuse(alpha: f32, gyro_angle: f32, acc_angle: f32) -> f32 {
    if alpha >= 1.0 {
        return gyro_angle;
    }
    if alpha <= 0.0 {
        return acc_angle;
    }
    acc_angle + alpha * (gyro_angle - acc_angle)
}

/// Fuse pitch and roll of the running angles with an accelerometer tilt
///
/// Yaw passes through untouched.
///
/// The blend is linear in degrees. The running angles are unwrapped while the
/// tilt lies in (-180, 180], so near ±180° roll, or after a full turn about
/// x or y, the running angle is pulled the long way round towards the tilt.
pub fn fuse_tilt(alpha: f32, angles: OrientationState, tilt: Tilt) -> OrientationState {
    OrientationState {
        yaw: angles.yaw,
        pitch: fuse(alpha, angles.pitch, tilt.pitch),
        roll: fuse(alpha, angles.roll, tilt.roll),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_is_linear_across_wrap() {
        // 170 and -170 are 20 degrees apart but blend through zero
        assert_eq!(fuse(0.5, 170.0, -170.0), 0.0);

        let angles = OrientationState::new(0.0, 0.0, 360.0);
        let level = Tilt { pitch: 0.0, roll: 0.0 };
        assert!((fuse_tilt(0.9, angles, level).roll - 324.0).abs() < 1e-3);
    }

    #[test]
    fn test_extremes_are_exact() {
        for (g, a) in [(0.1f32, 0.7f32), (-179.3, 42.0), (1e6, -1e-6)] {
            assert_eq!(fuse(1.0, g, a), g);
            assert_eq!(fuse(0.0, g, a), a);
        }
    }

    #[test]
    fn test_equal_inputs_fixed_point() {
        for alpha in [0.0, 0.1, 0.33, 0.5, 0.9, 0.999, 1.0] {
            for g in [-170.25f32, -1.0, 0.0, 0.3, 89.9] {
                assert_eq!(fuse(alpha, g, g), g);
            }
        }
    }

    #[test]
    fn test_weighted_blend() {
        assert!((fuse(0.9, 10.0, 20.0) - 11.0).abs() < 1e-5);
        assert!((fuse(0.5, -10.0, 10.0)).abs() < 1e-6);
        assert!((fuse(0.25, 4.0, 0.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_fuse_tilt_leaves_yaw() {
        let angles = OrientationState::new(123.0, 10.0, -10.0);
        let tilt = Tilt {
            pitch: 0.0,
            roll: 0.0,
        };
        let fused = fuse_tilt(0.5, angles, tilt);
        assert_eq!(fused.yaw, 123.0);
        assert!((fused.pitch - 5.0).abs() < 1e-6);
        assert!((fused.roll + 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_repeated_fusion_converges_to_tilt() {
        let tilt = Tilt {
            pitch: 30.0,
            roll: -15.0,
        };
        let mut angles = OrientationState::ZERO;
        for _ in 0..200 {
            angles = fuse_tilt(0.9, angles, tilt);
        }
        assert!((angles.pitch - 30.0).abs() < 1e-3);
        assert!((angles.roll + 15.0).abs() < 1e-3);
    }
}
