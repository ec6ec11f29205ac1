use criterion::{Criterion, black_box, criterion_group, criterion_main};
use nalgebra::Vector3;
use rand::prelude::*;
use rand_pcg::Pcg64;
use std::f32::consts::PI;
use tilt_fusion::{
    BiasCalibrator, CalibrationSettings, HistoryChannel, OrientationCore, OrientationEngine,
    RawSample, tilt, wrap_angle,
};

const PERIOD_NS: u64 = 20_000_000; // 50 Hz

// Pre-generated interleaved gyro/accel stream so RNG cost stays out of the loop
struct PreGeneratedData {
    samples: Vec<RawSample>,
    index: usize,
}

impl PreGeneratedData {
    fn new(count: usize, seed: u64) -> Self {
        let mut rng = Pcg64::seed_from_u64(seed);
        let mut samples = Vec::with_capacity(count * 2);

        for i in 0..count {
            let timestamp = i as u64 * PERIOD_NS;
            let phase = i as f32 * 0.02 * 0.5 * 2.0 * PI;

            let gyroscope = Vector3::new(
                0.2 * phase.sin() + rng.random_range(-0.01..0.01),
                0.2 * (phase * 1.3).cos() + rng.random_range(-0.01..0.01),
                0.2 * (phase * 0.7).sin() + rng.random_range(-0.01..0.01),
            );
            let accelerometer = Vector3::new(
                -1.0 * phase.sin() + rng.random_range(-0.02..0.02),
                1.0 * phase.cos() + rng.random_range(-0.02..0.02),
                9.81 + rng.random_range(-0.02..0.02),
            );

            samples.push(RawSample::gyroscope(gyroscope, timestamp));
            samples.push(RawSample::accelerometer(accelerometer, timestamp + PERIOD_NS / 2));
        }

        Self { samples, index: 0 }
    }

    fn next(&mut self) -> RawSample {
        let sample = self.samples[self.index];
        self.index = (self.index + 1) % self.samples.len();
        sample
    }
}

/// Benchmark the single-threaded transition function
fn bench_core_on_sample(c: &mut Criterion) {
    let mut core = OrientationCore::new();
    let mut data = PreGeneratedData::new(1000, 42);

    c.bench_function("core_on_sample", |b| {
        b.iter(|| {
            let sample = data.next();
            black_box(core.on_sample(black_box(&sample), 0.9));
        })
    });
}

/// Benchmark the locked engine path including publication
fn bench_engine_on_sample(c: &mut Criterion) {
    let engine = OrientationEngine::new();
    let mut data = PreGeneratedData::new(1000, 7);

    c.bench_function("engine_on_sample", |b| {
        b.iter(|| {
            black_box(engine.on_sample(black_box(data.next())));
        })
    });
}

/// Benchmark the building blocks
fn bench_components(c: &mut Criterion) {
    let accel = Vector3::new(0.3, -0.4, 9.7);
    c.bench_function("tilt", |b| b.iter(|| black_box(tilt(black_box(accel)))));

    c.bench_function("wrap_angle", |b| {
        b.iter(|| black_box(wrap_angle(black_box(12_345.678))))
    });
}

/// Benchmark reading a full history channel for rendering
fn bench_snapshot(c: &mut Criterion) {
    let engine = OrientationEngine::new();
    let mut data = PreGeneratedData::new(2000, 3);
    for _ in 0..4000 {
        engine.on_sample(data.next());
    }

    c.bench_function("snapshot_full_history", |b| {
        b.iter(|| black_box(engine.snapshot(black_box(HistoryChannel::Yaw))))
    });

    c.bench_function("snapshot_all_full_history", |b| {
        b.iter(|| black_box(engine.snapshot_all()))
    });
}

/// Benchmark reducing a two second calibration window
fn bench_calibration(c: &mut Criterion) {
    let data = PreGeneratedData::new(100, 11);

    c.bench_function("calibration_two_seconds", |b| {
        b.iter(|| {
            let mut calibrator = BiasCalibrator::new(CalibrationSettings::default());
            let generation = calibrator.begin(std::time::Duration::from_secs(2), 50.0);
            for sample in &data.samples {
                calibrator.record(sample);
            }
            black_box(calibrator.finish(generation))
        })
    });
}

criterion_group!(
    benches,
    bench_core_on_sample,
    bench_engine_on_sample,
    bench_components,
    bench_snapshot,
    bench_calibration,
);
criterion_main!(benches);
