//! Gyroscope rate integration

use log::{debug, warn};
use nalgebra::Vector3;

use crate::math::{NANOS_TO_SECONDS, Vector3Ext};
use crate::types::OrientationState;

/// Integrates gyroscope angular rate into running yaw/pitch/roll
///
/// The sensor frame maps onto the body angles as yaw ← z, pitch ← x,
/// roll ← y. Angles are accumulated unwrapped.
///
/// A sample whose timestamp is not strictly later than the previous one
/// contributes nothing, as does a sample after a gap longer than `max_gap`.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use tilt_fusion::{GyroIntegrator, OrientationState};
///
/// let mut integrator = GyroIntegrator::new();
/// let rate = Vector3::new(0.0, 0.0, core::f32::consts::PI); // rad/s about z
///
/// let angles = integrator.integrate(rate, 0, OrientationState::ZERO);
/// assert_eq!(angles, OrientationState::ZERO);
///
/// let angles = integrator.integrate(rate, 20_000_000, angles); // 20 ms later
/// assert!((angles.yaw - 3.6).abs() < 1e-4);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct GyroIntegrator {
    last_timestamp: Option<u64>,
    /// Maximum integrated gap in seconds, 0 disables the check
    max_gap: f64,
}

impl GyroIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an integrator that restarts after gaps longer than `max_gap` seconds
    pub fn with_max_gap(max_gap: f32) -> Self {
        Self {
            last_timestamp: None,
            max_gap: max_gap.max(0.0) as f64,
        }
    }

    /// Apply one gyroscope reading (rad/s) taken at `timestamp` nanoseconds
    pub fn integrate(
        &mut self,
        rate: Vector3<f32>,
        timestamp: u64,
        angles: OrientationState,
    ) -> OrientationState {
        let previous = self.last_timestamp.replace(timestamp);
        let Some(previous) = previous else {
            return angles;
        };

        let dt = match timestamp.checked_sub(previous) {
            Some(0) => return angles,
            Some(elapsed) => elapsed as f64 * NANOS_TO_SECONDS,
            None => {
                warn!(
                    "gyroscope timestamp went backwards by {} ns, skipping sample",
                    previous - timestamp
                );
                return angles;
            }
        };

        if self.max_gap > 0.0 && dt > self.max_gap {
            debug!("gyroscope gap of {dt:.3} s exceeds limit, restarting integration");
            return angles;
        }

        let delta = (rate * dt as f32).rad_to_deg();
        if !delta.all_finite() {
            return angles;
        }
        OrientationState {
            yaw: angles.yaw + delta.z,
            pitch: angles.pitch + delta.x,
            roll: angles.roll + delta.y,
        }
    }

    /// Forget the last timestamp so the next sample starts a new interval
    pub fn reset(&mut self) {
        self.last_timestamp = None;
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.last_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    const EPSILON: f32 = 1e-4;
    const PERIOD_NS: u64 = 20_000_000; // 50 Hz

    #[test]
    fn test_first_sample_records_timestamp_only() {
        let mut integrator = GyroIntegrator::new();
        assert_eq!(integrator.last_timestamp(), None);

        let angles = integrator.integrate(Vector3::new(1.0, 2.0, 3.0), 1_000, OrientationState::ZERO);
        assert_eq!(angles, OrientationState::ZERO);
        assert_eq!(integrator.last_timestamp(), Some(1_000));
    }

    #[test]
    fn test_yaw_from_z_rate() {
        let mut integrator = GyroIntegrator::new();
        let rate = Vector3::new(0.0, 0.0, PI);

        let angles = integrator.integrate(rate, 5_000_000_000, OrientationState::ZERO);
        let angles = integrator.integrate(rate, 5_000_000_000 + PERIOD_NS, angles);

        assert!((angles.yaw - 3.6).abs() < EPSILON, "yaw {}", angles.yaw);
        assert_eq!(angles.pitch, 0.0);
        assert_eq!(angles.roll, 0.0);
    }

    #[test]
    fn test_axis_mapping() {
        let mut integrator = GyroIntegrator::new();
        let rate = Vector3::new(PI, PI / 2.0, PI / 4.0);

        integrator.integrate(rate, 0, OrientationState::ZERO);
        let angles = integrator.integrate(rate, 1_000_000_000, OrientationState::ZERO);

        // pitch <- x, roll <- y, yaw <- z
        assert!((angles.pitch - 180.0).abs() < EPSILON);
        assert!((angles.roll - 90.0).abs() < EPSILON);
        assert!((angles.yaw - 45.0).abs() < EPSILON);
    }

    #[test]
    fn test_accumulates_without_wrapping() {
        let mut integrator = GyroIntegrator::new();
        let rate = Vector3::new(0.0, 0.0, PI);
        let mut angles = integrator.integrate(rate, 0, OrientationState::ZERO);

        for i in 1..=3 {
            angles = integrator.integrate(rate, i * 1_000_000_000, angles);
        }
        assert!((angles.yaw - 540.0).abs() < 1e-2);
    }

    #[test]
    fn test_duplicate_and_backwards_timestamps() {
        let mut integrator = GyroIntegrator::new();
        let rate = Vector3::new(1.0, 1.0, 1.0);
        let start = OrientationState::new(10.0, 20.0, 30.0);

        integrator.integrate(rate, 2_000, start);
        let same = integrator.integrate(rate, 2_000, start);
        assert_eq!(same, start);

        let back = integrator.integrate(rate, 1_000, start);
        assert_eq!(back, start);
        // The backwards timestamp becomes the new reference
        assert_eq!(integrator.last_timestamp(), Some(1_000));

        let forward = integrator.integrate(rate, 1_000 + PERIOD_NS, start);
        assert!(forward.yaw > start.yaw);
    }

    #[test]
    fn test_non_finite_rate_ignored() {
        let mut integrator = GyroIntegrator::new();
        integrator.integrate(Vector3::zeros(), 0, OrientationState::ZERO);
        let angles = integrator.integrate(Vector3::new(f32::NAN, 0.0, 0.0), PERIOD_NS, OrientationState::ZERO);
        assert_eq!(angles, OrientationState::ZERO);
        assert_eq!(integrator.last_timestamp(), Some(PERIOD_NS));
    }

    #[test]
    fn test_gap_limit() {
        let mut integrator = GyroIntegrator::with_max_gap(0.5);
        let rate = Vector3::new(0.0, 0.0, 1.0);

        integrator.integrate(rate, 0, OrientationState::ZERO);
        let angles = integrator.integrate(rate, 2_000_000_000, OrientationState::ZERO);
        assert_eq!(angles, OrientationState::ZERO);

        let angles = integrator.integrate(rate, 2_000_000_000 + PERIOD_NS, angles);
        assert!(angles.yaw > 0.0);
    }

    #[test]
    fn test_reset_forgets_timestamp() {
        let mut integrator = GyroIntegrator::new();
        let rate = Vector3::new(0.0, 0.0, 1.0);
        integrator.integrate(rate, 0, OrientationState::ZERO);

        integrator.reset();
        assert_eq!(integrator.last_timestamp(), None);

        let angles = integrator.integrate(rate, PERIOD_NS, OrientationState::ZERO);
        assert_eq!(angles, OrientationState::ZERO);
    }
}
