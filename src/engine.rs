//! Orientation engine: sample transition function and calibration lifecycle

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use nalgebra::Vector3;

use crate::calibration::BiasCalibrator;
use crate::error::Error;
use crate::filter::fuse_tilt;
use crate::history::{HistoryBuffer, HistoryChannel};
use crate::integrator::GyroIntegrator;
use crate::math::{Vector3Ext, wrap_angle};
use crate::tilt::tilt;
use crate::types::{
    BiasEstimate, CalibrationReport, CalibrationStatus, Channel, EngineSettings, EngineState,
    FusionMode, OrientationState, RawSample, check_alpha,
};

/// Default calibration capture length in seconds
pub const DEFAULT_CAPTURE_SECONDS: f32 = 2.0;

/// Single-threaded orientation state machine
///
/// Owns the running (unwrapped) angles, the zero offset and the bias
/// calibrator. Every sample updates the running angles and publishes
/// `wrap(angle - zero_offset)`.
///
/// This type takes `&mut self` for every transition. [`OrientationEngine`]
/// wraps it for use from several threads and keeps the plot history.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use tilt_fusion::{OrientationCore, RawSample};
///
/// let mut core = OrientationCore::new();
/// core.on_sample(&RawSample::gyroscope(Vector3::new(0.0, 0.0, 1.0), 0), 0.9);
/// let state = core.on_sample(&RawSample::accelerometer(Vector3::new(0.0, 0.0, 9.81), 10_000_000), 0.9);
///
/// assert!(state.pitch.abs() < 1e-6);
/// ```
#[derive(Debug)]
pub struct OrientationCore {
    settings: EngineSettings,
    state: EngineState,
    integrator: GyroIntegrator,
    /// Running angles, unwrapped
    angles: OrientationState,
    zero_offset: OrientationState,
    published: OrientationState,
    calibrator: BiasCalibrator,
    latest_gyroscope: Option<Vector3<f32>>,
    latest_accelerometer: Option<Vector3<f32>>,
}

impl OrientationCore {
    /// Create a core with default settings
    pub fn new() -> Self {
        Self::from_settings(EngineSettings::default())
    }

    /// Create a core with validated settings
    pub fn with_settings(settings: EngineSettings) -> Result<Self, Error> {
        settings.validate()?;
        Ok(Self::from_settings(settings))
    }

    fn from_settings(settings: EngineSettings) -> Self {
        Self {
            settings,
            state: EngineState::Uninitialized,
            integrator: GyroIntegrator::with_max_gap(settings.max_gap),
            angles: OrientationState::ZERO,
            zero_offset: OrientationState::ZERO,
            published: OrientationState::ZERO,
            calibrator: BiasCalibrator::new(settings.calibration),
            latest_gyroscope: None,
            latest_accelerometer: None,
        }
    }

    /// Process one raw sample, fusing with weight `alpha` if it is an accelerometer sample
    ///
    /// Also buffers the sample into an open calibration window.
    pub fn on_sample(&mut self, sample: &RawSample, alpha: f32) -> OrientationState {
        self.calibrator.record(sample);
        match sample.channel {
            Channel::Gyroscope => self.on_gyro_sample(sample),
            Channel::Accelerometer => self.on_accel_sample(sample, alpha),
        }
    }

    /// Integrate a gyroscope sample and publish
    pub fn on_gyro_sample(&mut self, sample: &RawSample) -> OrientationState {
        self.latest_gyroscope = Some(sample.vector);
        if self.state == EngineState::Uninitialized {
            debug!("first gyroscope sample at {} ns", sample.timestamp);
            self.state = EngineState::Running;
        }

        let mut rate = sample.vector;
        if self.settings.apply_gyroscope_bias {
            rate -= self.calibrator.bias().gyroscope;
        }
        self.angles = self.integrator.integrate(rate, sample.timestamp, self.angles);
        self.publish()
    }

    /// Fuse an accelerometer tilt into pitch and roll and publish
    ///
    /// The fused pitch and roll become the baseline for further integration.
    pub fn on_accel_sample(&mut self, sample: &RawSample, alpha: f32) -> OrientationState {
        self.latest_accelerometer = Some(sample.vector);
        if sample.vector.all_finite() {
            let alpha = if alpha.is_nan() { self.settings.alpha } else { alpha.clamp(0.0, 1.0) };
            self.angles = fuse_tilt(alpha, self.angles, tilt(sample.vector));
        }
        self.publish()
    }

    fn publish(&mut self) -> OrientationState {
        self.published = OrientationState {
            yaw: wrap_angle(self.angles.yaw - self.zero_offset.yaw),
            pitch: wrap_angle(self.angles.pitch - self.zero_offset.pitch),
            roll: wrap_angle(self.angles.roll - self.zero_offset.roll),
        };
        self.published
    }

    /// Zero the published angles at the current pose
    pub fn reset_orientation(&mut self) {
        self.zero_offset = self.angles;
        self.published = OrientationState::ZERO;
        info!(
            "orientation zeroed at yaw {:.2}, pitch {:.2}, roll {:.2}",
            self.angles.yaw, self.angles.pitch, self.angles.roll
        );
    }

    /// Restart gyroscope integration from the next sample
    pub fn reset_timestamp(&mut self) {
        self.integrator.reset();
    }

    /// Most recently published angles
    pub fn orientation(&self) -> OrientationState {
        self.published
    }

    /// Running angles before zero offset and wrapping
    pub fn raw_angles(&self) -> OrientationState {
        self.angles
    }

    pub fn zero_offset(&self) -> OrientationState {
        self.zero_offset
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn latest_raw(&self, channel: Channel) -> Option<Vector3<f32>> {
        match channel {
            Channel::Gyroscope => self.latest_gyroscope,
            Channel::Accelerometer => self.latest_accelerometer,
        }
    }

    pub fn calibrator(&self) -> &BiasCalibrator {
        &self.calibrator
    }

    pub fn calibrator_mut(&mut self) -> &mut BiasCalibrator {
        &mut self.calibrator
    }

    pub fn calibration_status(&self) -> CalibrationStatus {
        if self.calibrator.is_collecting() {
            CalibrationStatus::Collecting
        } else if let Some(report) = self.calibrator.latest() {
            CalibrationStatus::Computed(report)
        } else {
            CalibrationStatus::Idle
        }
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }
}

impl Default for OrientationCore {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives the result of one calibration capture
///
/// Dropped without waiting is fine; the capture still completes and its bias
/// is still recorded by the engine.
#[derive(Debug)]
pub struct CaptureHandle {
    generation: u64,
    receiver: Receiver<CalibrationReport>,
}

impl CaptureHandle {
    /// Block until the capture window closes
    ///
    /// Returns `None` if the capture was superseded by a newer one.
    pub fn wait(self) -> Option<CalibrationReport> {
        self.receiver.recv().ok()
    }

    /// Block for at most `timeout`
    ///
    /// Returns `None` on timeout or if the capture was superseded.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<CalibrationReport> {
        match self.receiver.recv_timeout(timeout) {
            Ok(report) => Some(report),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Result if the capture has already completed
    pub fn try_result(&self) -> Option<CalibrationReport> {
        match self.receiver.try_recv() {
            Ok(report) => Some(report),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
struct PendingCapture {
    generation: u64,
    sender: Sender<CalibrationReport>,
    /// Dropping this wakes the capture's timer thread
    _cancel: Sender<()>,
}

#[derive(Debug)]
struct Inner {
    core: OrientationCore,
    pending: Option<PendingCapture>,
}

/// What readers see, updated once per sample
#[derive(Debug)]
struct Published {
    orientation: OrientationState,
    history: HistoryBuffer,
}

#[derive(Debug)]
struct Shared {
    inner: Mutex<Inner>,
    published: Mutex<Published>,
    alpha: AtomicU32,
}

/// Thread-safe orientation engine handle
///
/// Clones share one engine. All state transitions are serialized by a single
/// lock. The published orientation and the plot history live in a separate
/// slot, so readers never wait on sample processing; the writer only touches
/// that slot to append the finished sample. The complementary filter weight
/// is kept in an atomic and read at the moment of fusion.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use tilt_fusion::{OrientationEngine, RawSample};
///
/// let engine = OrientationEngine::new();
/// let sensor = engine.clone();
///
/// std::thread::spawn(move || {
///     sensor.on_sample(RawSample::gyroscope(Vector3::new(0.0, 0.0, 0.5), 0));
///     sensor.on_sample(RawSample::gyroscope(Vector3::new(0.0, 0.0, 0.5), 20_000_000));
/// })
/// .join()
/// .unwrap();
///
/// assert!(engine.orientation().yaw > 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct OrientationEngine {
    shared: Arc<Shared>,
}

impl OrientationEngine {
    /// Create an engine with default settings
    pub fn new() -> Self {
        Self::from_core(OrientationCore::new())
    }

    /// Create an engine with validated settings
    pub fn with_settings(settings: EngineSettings) -> Result<Self, Error> {
        Ok(Self::from_core(OrientationCore::with_settings(settings)?))
    }

    fn from_core(core: OrientationCore) -> Self {
        let alpha = core.settings().alpha;
        let history = HistoryBuffer::new(core.settings().history_capacity());
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    core,
                    pending: None,
                }),
                published: Mutex::new(Published {
                    orientation: OrientationState::ZERO,
                    history,
                }),
                alpha: AtomicU32::new(alpha.to_bits()),
            }),
        }
    }

    /// Process one raw sample and publish the new orientation
    pub fn on_sample(&self, sample: RawSample) -> OrientationState {
        let mut inner = self.shared.lock_inner();
        let alpha = self.alpha();
        let state = inner.core.on_sample(&sample, alpha);
        self.shared.publish(state);
        state
    }

    pub fn on_gyro_sample(&self, vector: Vector3<f32>, timestamp: u64) -> OrientationState {
        self.on_sample(RawSample::gyroscope(vector, timestamp))
    }

    pub fn on_accel_sample(&self, vector: Vector3<f32>, timestamp: u64) -> OrientationState {
        self.on_sample(RawSample::accelerometer(vector, timestamp))
    }

    /// Zero the published angles at the current pose and clear the history
    pub fn reset_orientation(&self) {
        let mut inner = self.shared.lock_inner();
        inner.core.reset_orientation();

        let mut published = self.shared.lock_published();
        published.orientation = OrientationState::ZERO;
        published.history.clear_all();
    }

    /// Restart gyroscope integration, e.g. after the sensor source restarts
    pub fn reset_timestamp(&self) {
        self.shared.lock_inner().core.reset_timestamp();
    }

    /// Latest published orientation
    pub fn orientation(&self) -> OrientationState {
        self.shared.lock_published().orientation
    }

    /// History of one angle channel, oldest first
    pub fn snapshot(&self, channel: HistoryChannel) -> Vec<f32> {
        self.shared.lock_published().history.snapshot(channel)
    }

    /// History of all three channels taken in one read, so they hold the same samples
    pub fn snapshot_all(&self) -> [Vec<f32>; 3] {
        self.shared.lock_published().history.snapshot_all()
    }

    /// Plot scale across all history channels, at least 1
    pub fn history_peak(&self) -> f32 {
        self.shared.lock_published().history.peak_magnitude()
    }

    pub fn alpha(&self) -> f32 {
        f32::from_bits(self.shared.alpha.load(Ordering::Acquire))
    }

    /// Set the complementary filter weight, effective from the next accelerometer sample
    pub fn set_alpha(&self, alpha: f32) -> Result<(), Error> {
        check_alpha(alpha)?;
        self.shared.alpha.store(alpha.to_bits(), Ordering::Release);
        Ok(())
    }

    pub fn fusion_mode(&self) -> FusionMode {
        FusionMode::from_alpha(self.alpha())
    }

    /// Start a bias capture with the default two second window
    pub fn start_default_bias_capture(&self) -> Result<CaptureHandle, Error> {
        self.start_bias_capture(DEFAULT_CAPTURE_SECONDS)
    }

    /// Start buffering raw samples for `seconds`, then compute sensor biases
    ///
    /// Returns immediately. The window closes on a timer thread. Starting a
    /// new capture while one is open supersedes it: the old window's samples
    /// are discarded, its handle yields `None` and its timer exits. A rejected
    /// duration leaves any open capture untouched.
    pub fn start_bias_capture(&self, seconds: f32) -> Result<CaptureHandle, Error> {
        if !(seconds.is_finite() && seconds > 0.0) {
            return Err(Error::InvalidDuration(seconds));
        }
        let duration =
            Duration::try_from_secs_f32(seconds).map_err(|_| Error::InvalidDuration(seconds))?;
        let (sender, receiver) = mpsc::channel();
        let (cancel, cancelled) = mpsc::channel::<()>();

        let generation = {
            let mut inner = self.shared.lock_inner();
            let sample_rate = inner.core.settings().sample_rate;
            let generation = inner.core.calibrator_mut().begin(duration, sample_rate);
            let pending = PendingCapture {
                generation,
                sender,
                _cancel: cancel,
            };
            if inner.pending.replace(pending).is_some() {
                debug!("bias capture {} supersedes an open capture", generation);
            }
            generation
        };

        let shared = Arc::downgrade(&self.shared);
        let spawned = thread::Builder::new()
            .name("bias-capture".into())
            .spawn(move || match cancelled.recv_timeout(duration) {
                Err(RecvTimeoutError::Timeout) => close_capture(&shared, generation),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    debug!("bias capture {generation} timer cancelled");
                }
            });

        if let Err(err) = spawned {
            let mut inner = self.shared.lock_inner();
            if inner.pending.as_ref().is_some_and(|p| p.generation == generation) {
                inner.pending = None;
                inner.core.calibrator_mut().finish(generation);
            }
            warn!("could not start bias capture timer: {err}");
            return Err(Error::TimerSpawn(err));
        }

        info!("bias capture {generation} started for {seconds:.2} s");
        Ok(CaptureHandle {
            generation,
            receiver,
        })
    }

    pub fn calibration_status(&self) -> CalibrationStatus {
        self.shared.lock_inner().core.calibration_status()
    }

    /// Bias from the last completed capture, zero if none has completed
    pub fn latest_bias(&self) -> BiasEstimate {
        self.shared.lock_inner().core.calibrator().bias()
    }

    pub fn state(&self) -> EngineState {
        self.shared.lock_inner().core.state()
    }

    /// Last raw reading seen on a channel
    pub fn latest_raw(&self, channel: Channel) -> Option<Vector3<f32>> {
        self.shared.lock_inner().core.latest_raw(channel)
    }

    pub fn settings(&self) -> EngineSettings {
        self.shared.lock_inner().core.settings()
    }
}

impl Default for OrientationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Shared {
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    fn lock_published(&self) -> MutexGuard<'_, Published> {
        lock(&self.published)
    }

    /// Must be called with `inner` held so history order follows sample order
    fn publish(&self, state: OrientationState) {
        let mut published = self.lock_published();
        published.orientation = state;
        published.history.push_state(state);
    }
}

/// Close capture `generation` if it is still the open one and deliver its report
fn close_capture(shared: &Weak<Shared>, generation: u64) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let mut inner = shared.lock_inner();
    let Some(report) = inner.core.calibrator_mut().finish(generation) else {
        debug!("bias capture {generation} was superseded, discarding");
        return;
    };
    if let Some(pending) = inner.pending.take_if(|p| p.generation == generation) {
        // The handle may have been dropped
        let _ = pending.sender.send(report);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
