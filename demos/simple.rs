use std::thread;
use std::time::Duration;

use nalgebra::Vector3;
use tilt_fusion::{CalibrationStatus, HistoryChannel, OrientationEngine, RawSample};

const SAMPLE_PERIOD_NS: u64 = 20_000_000; // 20 ms sample period

fn main() {
    let engine = OrientationEngine::new();

    // Capture biases while the (simulated) device rests
    let capture = engine
        .start_bias_capture(0.5)
        .expect("valid capture duration");

    let source = engine.clone();
    let producer = thread::spawn(move || {
        for i in 0..150u64 {
            // this loop should run each time the sensor source delivers data
            let timestamp = i * SAMPLE_PERIOD_NS;
            let gyroscope = Vector3::new(0.001, -0.002, 0.1); // replace with gyroscope data in rad/s
            let accelerometer = Vector3::new(0.05, 0.02, 9.8); // replace with accelerometer data in m/s²

            source.on_sample(RawSample::gyroscope(gyroscope, timestamp));
            source.on_sample(RawSample::accelerometer(accelerometer, timestamp + SAMPLE_PERIOD_NS / 2));
            thread::sleep(Duration::from_millis(5));
        }
    });

    for _ in 0..10 {
        let orientation = engine.orientation();
        println!(
            "Yaw: {:.2}, Pitch: {:.2}, Roll: {:.2} ({:?})",
            orientation.yaw,
            orientation.pitch,
            orientation.roll,
            engine.fusion_mode()
        );
        thread::sleep(Duration::from_millis(75));
    }

    producer.join().expect("producer thread");

    if let Some(report) = capture.wait() {
        println!(
            "Bias computed ({}/{}): gyroscope {:.4?}",
            report.accelerometer_samples, report.gyroscope_samples, report.bias.gyroscope
        );
    }
    if let CalibrationStatus::Computed(report) = engine.calibration_status() {
        println!("Accelerometer bias: {:.4?}", report.bias.accelerometer);
    }

    engine.reset_orientation();
    println!(
        "After reset: {:?}, {} yaw samples in history",
        engine.orientation(),
        engine.snapshot(HistoryChannel::Yaw).len()
    );
}
