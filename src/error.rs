//! Error type for engine construction and commands

/// Errors returned by settings validation and engine commands.
///
/// The sample path never returns an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Complementary filter weight must be in [0, 1], got {0}")]
    InvalidAlpha(f32),

    #[error("Calibration duration must be a positive number of seconds, got {0}")]
    InvalidDuration(f32),

    #[error("Sample rate must be a positive number of hertz, got {0}")]
    InvalidSampleRate(f32),

    #[error("Invalid settings: {0}")]
    InvalidSettings(&'static str),

    #[error("Failed to start calibration timer: {0}")]
    TimerSpawn(#[from] std::io::Error),
}
