//! Benchmarks for per-window feature extraction
//!
//! One analysis window (4 frames, 2048 samples) must be summarized well
//! inside the 128 ms it takes to capture. Covers:
//! - the scalar features (RMS, zero crossings, peak, SPL)
//! - the spectral band estimate over the leading 512 samples
//! - a full extractor pass from frames to an encoded 64-byte packet

use acoustic_node::extraction::{ExtractionSettings, FeatureExtractor};
use acoustic_node::features::{self, SpectralConfig, SplCalibration};
use acoustic_node::test_utils::{frames_from, tone};
use acoustic_node::types::FRAME_SIZE;
use acoustic_node::wire::BAND_COUNT;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tokio::time::Instant;

const WINDOW: usize = 4 * FRAME_SIZE;

/// Two tones plus a bit of harmonic content, like a turbine drivetrain.
fn window_samples() -> Vec<i16> {
    let low = tone(WINDOW, 120.0, 9000.0);
    let high = tone(WINDOW, 2500.0, 2000.0);
    low.iter().zip(&high).map(|(a, b)| a.saturating_add(*b)).collect()
}

fn bench_scalar_features(c: &mut Criterion) {
    let samples = window_samples();
    let calibration = SplCalibration::default();

    let mut group = c.benchmark_group("scalar_features");
    group.throughput(Throughput::Elements(samples.len() as u64));

    group.bench_function("rms", |b| b.iter(|| features::rms(black_box(&samples))));
    group.bench_function("zero_crossing_rate", |b| b.iter(|| features::zero_crossing_rate(black_box(&samples))));
    group.bench_function("peak_amplitude", |b| b.iter(|| features::peak_amplitude(black_box(&samples))));
    group.bench_function("spl", |b| b.iter(|| features::spl(black_box(12_000), black_box(&calibration))));

    group.finish();
}

fn bench_spectral_bands(c: &mut Criterion) {
    let samples = window_samples();
    let config = SpectralConfig::default();

    let mut group = c.benchmark_group("spectral_bands");
    group.throughput(Throughput::Elements(config.fft_size as u64));

    group.bench_function("eight_bands_512", |b| {
        b.iter(|| features::spectral_bands::<BAND_COUNT>(black_box(&samples), black_box(&config)))
    });

    group.finish();
}

fn bench_window_to_packet(c: &mut Criterion) {
    let frames = frames_from(&window_samples(), 0);
    let mut extractor = FeatureExtractor::new(ExtractionSettings::default(), Instant::now());

    c.bench_function("window_to_packet", |b| {
        b.iter(|| {
            let mut packet = None;
            for frame in &frames {
                if let Some(record) = extractor.process_frame(black_box(frame)) {
                    packet = Some(record.encode());
                }
            }
            black_box(packet)
        })
    });
}

criterion_group!(benches, bench_scalar_features, bench_spectral_bands, bench_window_to_packet);
criterion_main!(benches);
