//! Bias calibration from a timed capture window
//!
//! While a window is open every raw sample is buffered per channel. Closing
//! the window reduces each buffer to a per-axis trimmed mean. The
//! accelerometer bias is then corrected on z so that its magnitude matches
//! gravity, which assumes the device rested with z roughly vertical.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use nalgebra::Vector3;

use crate::math::Vector3Ext;
use crate::types::{BiasEstimate, CalibrationReport, CalibrationSettings, Channel, RawSample};

/// Mean of `values` after discarding `trim_fraction` of the count from each end
///
/// The trimmed count is truncated. Sorts `values` in place. Returns 0 for an
/// empty slice.
///
/// # Example
/// ```
/// use tilt_fusion::calibration::trimmed_mean;
///
/// let mut values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 1000.0];
/// assert!((trimmed_mean(&mut values, 0.1) - 5.5).abs() < 1e-6);
/// ```
pub fn trimmed_mean(values: &mut [f32], trim_fraction: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f32::total_cmp);

    let trim = (values.len() as f32 * trim_fraction) as usize;
    let kept = &values[trim..values.len() - trim];
    if kept.is_empty() {
        return 0.0;
    }
    let sum: f64 = kept.iter().map(|&v| v as f64).sum();
    (sum / kept.len() as f64) as f32
}

/// Per-axis trimmed mean of a sample buffer
pub fn trimmed_mean_bias(samples: &[Vector3<f32>], trim_fraction: f32) -> Vector3<f32> {
    if samples.is_empty() {
        return Vector3::zeros();
    }
    let mut axis = Vec::with_capacity(samples.len());
    let mut bias = Vector3::zeros();
    for i in 0..3 {
        axis.clear();
        axis.extend(samples.iter().map(|s| s[i]));
        bias[i] = trimmed_mean(&mut axis, trim_fraction);
    }
    bias
}

/// Correct the z axis so the bias magnitude equals `gravity`
///
/// `bias.z -= |bias| - gravity`
pub fn compensate_gravity(bias: Vector3<f32>, gravity: f32) -> Vector3<f32> {
    let mut corrected = bias;
    corrected.z -= bias.norm() - gravity;
    corrected
}

/// Initial per-channel reservation; buffers grow on demand up to their cap
const INITIAL_RESERVE: usize = 256;

/// One channel of a capture window
///
/// Holds at most `capacity` samples spread evenly over the window. When the
/// buffer fills, every other sample is dropped and the sampling interval
/// doubles, so a source delivering faster than nominal still covers the whole
/// window rather than only its start.
#[derive(Debug)]
struct SampleBuffer {
    samples: Vec<Vector3<f32>>,
    capacity: usize,
    stride: usize,
    seen: usize,
}

impl SampleBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity.min(INITIAL_RESERVE)),
            capacity,
            stride: 1,
            seen: 0,
        }
    }

    /// Buffer a sample; returns true if this push halved the buffer
    fn push(&mut self, vector: Vector3<f32>) -> bool {
        let index = self.seen;
        self.seen += 1;
        if index % self.stride != 0 {
            return false;
        }
        if self.samples.len() < self.capacity {
            self.samples.push(vector);
            return false;
        }

        let mut position = 0;
        self.samples.retain(|_| {
            position += 1;
            position % 2 == 1
        });
        self.stride = self.stride.saturating_mul(2);
        if index % self.stride == 0 && self.samples.len() < self.capacity {
            self.samples.push(vector);
        }
        true
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Samples buffered while a capture is in progress
#[derive(Debug)]
pub struct CalibrationWindow {
    gyroscope: SampleBuffer,
    accelerometer: SampleBuffer,
    started_at: Instant,
    capacity: usize,
    decimated: bool,
}

impl CalibrationWindow {
    fn new(capacity: usize) -> Self {
        Self {
            gyroscope: SampleBuffer::new(capacity),
            accelerometer: SampleBuffer::new(capacity),
            started_at: Instant::now(),
            capacity,
            decimated: false,
        }
    }

    fn record(&mut self, sample: &RawSample) {
        if !sample.vector.all_finite() {
            return;
        }
        let buffer = match sample.channel {
            Channel::Gyroscope => &mut self.gyroscope,
            Channel::Accelerometer => &mut self.accelerometer,
        };
        if buffer.push(sample.vector) && !self.decimated {
            self.decimated = true;
            warn!(
                "calibration buffer full at {} samples, thinning {:?} samples to cover the window",
                self.capacity, sample.channel
            );
        }
    }

    /// Buffer cap per channel
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sample_count(&self, channel: Channel) -> usize {
        match channel {
            Channel::Gyroscope => self.gyroscope.len(),
            Channel::Accelerometer => self.accelerometer.len(),
        }
    }
}

/// Trimmed-mean bias calibrator
///
/// Only one window is open at a time. Opening a new one discards the old
/// window's samples, and the generation returned by [`BiasCalibrator::begin`]
/// identifies which window a later [`BiasCalibrator::finish`] refers to.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use nalgebra::Vector3;
/// use tilt_fusion::{BiasCalibrator, CalibrationSettings, RawSample};
///
/// let mut calibrator = BiasCalibrator::new(CalibrationSettings::default());
/// let generation = calibrator.begin(Duration::from_secs(2), 50.0);
///
/// for i in 0..100u64 {
///     calibrator.record(&RawSample::gyroscope(Vector3::new(0.01, 0.0, -0.02), i * 20_000_000));
/// }
///
/// let report = calibrator.finish(generation).unwrap();
/// assert_eq!(report.gyroscope_samples, 100);
/// assert!((report.bias.gyroscope.x - 0.01).abs() < 1e-6);
/// ```
#[derive(Debug)]
pub struct BiasCalibrator {
    settings: CalibrationSettings,
    window: Option<CalibrationWindow>,
    generation: u64,
    latest: Option<CalibrationReport>,
}

impl BiasCalibrator {
    pub fn new(settings: CalibrationSettings) -> Self {
        Self {
            settings,
            window: None,
            generation: 0,
            latest: None,
        }
    }

    /// Open a new capture window, superseding any open one
    ///
    /// Buffers are capped at `duration` × `sample_rate` × the configured
    /// margin and grow on demand. Returns the window's generation.
    pub fn begin(&mut self, duration: Duration, sample_rate: f32) -> u64 {
        if let Some(old) = self.window.take() {
            debug!(
                "calibration window {} superseded after {:?}",
                self.generation,
                old.started_at.elapsed()
            );
        }
        let expected = duration.as_secs_f32() * sample_rate * self.settings.buffer_margin;
        let capacity = (expected.ceil() as usize).max(1);

        self.generation += 1;
        self.window = Some(CalibrationWindow::new(capacity));
        debug!(
            "calibration window {} opened for {:?}, capacity {} per channel",
            self.generation, duration, capacity
        );
        self.generation
    }

    /// Buffer a sample if a window is open
    pub fn record(&mut self, sample: &RawSample) {
        if let Some(window) = self.window.as_mut() {
            window.record(sample);
        }
    }

    /// Close window `generation` and compute its bias
    ///
    /// Returns `None` if that window is no longer the open one.
    pub fn finish(&mut self, generation: u64) -> Option<CalibrationReport> {
        if generation != self.generation {
            return None;
        }
        let window = self.window.take()?;
        let report = self.reduce(&window);

        info!(
            "calibration complete ({}/{} samples): accelerometer bias [{:.4}, {:.4}, {:.4}], gyroscope bias [{:.4}, {:.4}, {:.4}]",
            report.accelerometer_samples,
            report.gyroscope_samples,
            report.bias.accelerometer.x,
            report.bias.accelerometer.y,
            report.bias.accelerometer.z,
            report.bias.gyroscope.x,
            report.bias.gyroscope.y,
            report.bias.gyroscope.z,
        );
        self.latest = Some(report);
        Some(report)
    }

    fn reduce(&self, window: &CalibrationWindow) -> CalibrationReport {
        let trim = self.settings.trim_fraction;

        let mut accelerometer = trimmed_mean_bias(&window.accelerometer.samples, trim);
        if !window.accelerometer.samples.is_empty() {
            accelerometer = compensate_gravity(accelerometer, self.settings.gravity);
        }
        let gyroscope = trimmed_mean_bias(&window.gyroscope.samples, trim);

        CalibrationReport {
            bias: BiasEstimate {
                accelerometer,
                gyroscope,
            },
            accelerometer_samples: window.accelerometer.len(),
            gyroscope_samples: window.gyroscope.len(),
        }
    }

    pub fn is_collecting(&self) -> bool {
        self.window.is_some()
    }

    pub fn window(&self) -> Option<&CalibrationWindow> {
        self.window.as_ref()
    }

    /// Generation of the most recently opened window
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report of the last completed capture
    pub fn latest(&self) -> Option<CalibrationReport> {
        self.latest
    }

    /// Bias of the last completed capture, zero if none has completed
    pub fn bias(&self) -> BiasEstimate {
        self.latest.map(|r| r.bias).unwrap_or_default()
    }
}
