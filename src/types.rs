//! Core types and settings for the tilt-fusion engine

use nalgebra::Vector3;

use crate::error::Error;

/// Sensor channel a raw sample was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Angular rate in rad/s
    Gyroscope,
    /// Specific force in m/s²
    Accelerometer,
}

/// A single raw reading delivered by the sample source
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use tilt_fusion::{Channel, RawSample};
///
/// let sample = RawSample::gyroscope(Vector3::new(0.0, 0.0, 0.1), 20_000_000);
/// assert_eq!(sample.channel, Channel::Gyroscope);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    /// Which sensor produced the reading
    pub channel: Channel,
    /// Device-native reading (rad/s or m/s²)
    pub vector: Vector3<f32>,
    /// Monotonic timestamp in nanoseconds
    pub timestamp: u64,
}

impl RawSample {
    pub fn new(channel: Channel, vector: Vector3<f32>, timestamp: u64) -> Self {
        Self {
            channel,
            vector,
            timestamp,
        }
    }

    pub fn gyroscope(vector: Vector3<f32>, timestamp: u64) -> Self {
        Self::new(Channel::Gyroscope, vector, timestamp)
    }

    pub fn accelerometer(vector: Vector3<f32>, timestamp: u64) -> Self {
        Self::new(Channel::Accelerometer, vector, timestamp)
    }
}

/// Euler angles in degrees
///
/// Published values are always wrapped to (-180, 180]. The engine's running
/// angles use the same type but are left unwrapped.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrientationState {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl OrientationState {
    pub const ZERO: Self = Self {
        yaw: 0.0,
        pitch: 0.0,
        roll: 0.0,
    };

    pub fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self { yaw, pitch, roll }
    }
}

/// Sensor biases computed by a calibration capture
///
/// Both vectors are zero until a capture completes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiasEstimate {
    /// Accelerometer bias, gravity-corrected on the z axis
    pub accelerometer: Vector3<f32>,
    /// Gyroscope zero-rate bias
    pub gyroscope: Vector3<f32>,
}

impl Default for BiasEstimate {
    fn default() -> Self {
        Self {
            accelerometer: Vector3::zeros(),
            gyroscope: Vector3::zeros(),
        }
    }
}

/// Result of a completed calibration capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationReport {
    pub bias: BiasEstimate,
    /// Number of accelerometer samples captured during the window
    pub accelerometer_samples: usize,
    /// Number of gyroscope samples captured during the window
    pub gyroscope_samples: usize,
}

/// Calibration lifecycle as seen by a display layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationStatus {
    /// No capture has been started
    Idle,
    /// A capture window is open
    Collecting,
    /// The most recent capture finished with this report
    Computed(CalibrationReport),
}

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// No gyroscope timestamp recorded yet
    #[default]
    Uninitialized,
    /// At least one gyroscope sample has been seen
    Running,
}

/// Which estimate dominates the fused pitch and roll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionMode {
    AccelerometerOnly,
    Complementary,
    GyroscopeOnly,
}

impl FusionMode {
    /// Classify a blend weight the way a display labels it
    ///
    /// # Example
    /// ```
    /// use tilt_fusion::FusionMode;
    ///
    /// assert_eq!(FusionMode::from_alpha(0.9), FusionMode::Complementary);
    /// assert_eq!(FusionMode::from_alpha(1.0), FusionMode::GyroscopeOnly);
    /// ```
    pub fn from_alpha(alpha: f32) -> Self {
        if alpha < 0.05 {
            FusionMode::AccelerometerOnly
        } else if alpha > 0.95 {
            FusionMode::GyroscopeOnly
        } else {
            FusionMode::Complementary
        }
    }
}

/// Engine settings
///
/// # Example
/// ```
/// use tilt_fusion::EngineSettings;
///
/// let settings = EngineSettings {
///     sample_rate: 100.0,
///     alpha: 0.98,
///     ..Default::default()
/// };
/// assert_eq!(settings.history_capacity(), 6000);
/// assert_eq!(settings.sampling_period_us(), 10_000);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Nominal sample rate in Hz
    pub sample_rate: f32,
    /// Initial complementary filter weight in [0, 1]
    ///
    /// 1.0 trusts the gyroscope only, 0.0 the accelerometer only.
    pub alpha: f32,
    /// Seconds of angle history kept for plotting
    pub history_seconds: f32,
    /// Largest gyroscope sample gap in seconds that is still integrated
    ///
    /// A larger gap is treated as a timestamp reset. Set to 0 to disable.
    pub max_gap: f32,
    /// Subtract the last calibrated gyroscope bias before integrating
    pub apply_gyroscope_bias: bool,
    pub calibration: CalibrationSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sample_rate: 50.0,
            alpha: 0.9,
            history_seconds: 60.0,
            max_gap: 0.0,
            apply_gyroscope_bias: false,
            calibration: CalibrationSettings::default(),
        }
    }
}

impl EngineSettings {
    /// Number of values each history channel holds
    pub fn history_capacity(&self) -> usize {
        (self.sample_rate * self.history_seconds).round() as usize
    }

    /// Sampling period a subscriber should request, in microseconds
    pub fn sampling_period_us(&self) -> u32 {
        (1_000_000.0 / self.sample_rate) as u32
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(Error::InvalidSampleRate(self.sample_rate));
        }
        check_alpha(self.alpha)?;
        if !(self.history_seconds.is_finite() && self.history_seconds > 0.0) {
            return Err(Error::InvalidSettings("history_seconds must be positive"));
        }
        if !(self.max_gap.is_finite() && self.max_gap >= 0.0) {
            return Err(Error::InvalidSettings("max_gap must be zero or positive"));
        }
        self.calibration.validate()
    }
}

/// Bias calibration settings
#[derive(Debug, Clone, Copy)]
pub struct CalibrationSettings {
    /// Fraction of samples discarded from each end before averaging
    pub trim_fraction: f32,
    /// Expected gravity magnitude in m/s²
    pub gravity: f32,
    /// Buffer cap as a multiple of the nominal sample count for a window
    pub buffer_margin: f32,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            trim_fraction: 0.1,
            gravity: 9.81,
            buffer_margin: 2.0,
        }
    }
}

impl CalibrationSettings {
    pub fn validate(&self) -> Result<(), Error> {
        if !(0.0..0.5).contains(&self.trim_fraction) {
            return Err(Error::InvalidSettings("trim_fraction must be in [0, 0.5)"));
        }
        if !(self.gravity.is_finite() && self.gravity > 0.0) {
            return Err(Error::InvalidSettings("gravity must be positive"));
        }
        if !(self.buffer_margin.is_finite() && self.buffer_margin >= 1.0) {
            return Err(Error::InvalidSettings("buffer_margin must be at least 1"));
        }
        Ok(())
    }
}

pub(crate) fn check_alpha(alpha: f32) -> Result<(), Error> {
    if (0.0..=1.0).contains(&alpha) {
        Ok(())
    } else {
        Err(Error::InvalidAlpha(alpha))
    }
}
