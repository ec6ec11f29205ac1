//! Tilt Fusion - real-time yaw/pitch/roll from a gyroscope and accelerometer
//!
//! This library turns a stream of raw gyroscope (rad/s) and accelerometer
//! (m/s²) samples into a drift-corrected Euler angle estimate suitable for a
//! live display.
//!
//! # Features
//!
//! - Gyroscope integration from nanosecond timestamps
//! - Accelerometer tilt for pitch and roll
//! - Complementary filter with a live-tunable weight
//! - Trimmed-mean bias calibration with gravity compensation
//! - Zero offset and a bounded per-channel plot history read in one snapshot
//! - Thread-safe engine handle with non-blocking readers
//!
//! Yaw has no absolute reference and is carried by the gyroscope alone, so it
//! drifts with any residual gyroscope bias.
//!
//! Pitch and roll are blended linearly in degrees against an accelerometer
//! tilt in (-180, 180]. Past ±180° roll, or after a full turn, the running
//! angle swings back through the wrong side instead of taking the short way.
//!
//! # Quick Start
//!
//! ```rust
//! use nalgebra::Vector3;
//! use tilt_fusion::{HistoryChannel, OrientationEngine, RawSample};
//!
//! let engine = OrientationEngine::new();
//!
//! // Feed samples as the sensor source delivers them
//! engine.on_sample(RawSample::gyroscope(Vector3::new(0.0, 0.0, 0.1), 0));
//! engine.on_sample(RawSample::accelerometer(Vector3::new(0.0, 0.0, 9.81), 10_000_000));
//! engine.on_sample(RawSample::gyroscope(Vector3::new(0.0, 0.0, 0.1), 20_000_000));
//!
//! // Read from the display side
//! let orientation = engine.orientation();
//! println!("yaw {:.2} pitch {:.2} roll {:.2}", orientation.yaw, orientation.pitch, orientation.roll);
//!
//! let yaw_plot = engine.snapshot(HistoryChannel::Yaw);
//! assert_eq!(yaw_plot.len(), 3);
//! ```

pub mod calibration;
mod engine;
mod error;
mod filter;
mod history;
mod integrator;
mod math;
mod tilt;
mod types;

// Re-export all public types and functions
pub use calibration::{BiasCalibrator, CalibrationWindow};
pub use engine::{CaptureHandle, DEFAULT_CAPTURE_SECONDS, OrientationCore, OrientationEngine};
pub use error::Error;
pub use filter::{fuse, fuse_tilt};
pub use history::{HistoryBuffer, HistoryChannel};
pub use integrator::GyroIntegrator;
pub use math::{DEG_TO_RAD, NANOS_TO_SECONDS, RAD_TO_DEG, Vector3Ext, wrap_angle};
pub use tilt::{Tilt, tilt};
pub use types::*;
