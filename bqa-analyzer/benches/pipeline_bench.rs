//! QA Pipeline Performance Benchmark
//!
//! Measures segmentation and metric extraction throughput on a synthetic
//! 100 Hz recording of regular breaths.
//!
//! **Goal:** A one-hour recording analyzes in well under a second

use bqa_analyzer::models::{Recording, Sample};
use bqa_analyzer::services::{default_volume_ranges, detect_breaths, summarize_table};
use bqa_analyzer::QaPipeline;
use bqa_common::time::samples_to_seconds;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const RATE_HZ: f64 = 100.0;

/// Trapezoidal breaths every 4 s: 1 s inspiration at 30 L/min, passive expiration
fn synthetic_recording(minutes: usize) -> Recording {
    let samples_per_breath = (4.0 * RATE_HZ) as usize;
    let breaths = minutes * 15;
    let samples = (0..breaths * samples_per_breath).map(|i| {
        let phase = samples_to_seconds(i % samples_per_breath, RATE_HZ);
        let (flow, pressure) = if phase < 0.2 {
            (150.0 * phase, 60.0 * phase)
        } else if phase < 1.0 {
            (30.0, 12.0)
        } else if phase < 1.2 {
            (30.0 - 300.0 * (phase - 1.0), 0.0)
        } else if phase < 3.0 {
            (-30.0 * (3.0 - phase) / 1.8, 0.0)
        } else {
            (0.0, 0.0)
        };
        Sample::new(samples_to_seconds(i, RATE_HZ), flow, pressure)
    });
    Recording::from_samples(samples).expect("synthetic recording")
}

fn bench_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("breath_detection");
    let params = Default::default();

    for minutes in [1usize, 10, 60] {
        let recording = synthetic_recording(minutes);
        group.bench_with_input(BenchmarkId::new("minutes", minutes), &recording, |b, rec| {
            b.iter(|| {
                let breaths = detect_breaths(black_box(rec), &params).expect("detection");
                black_box(breaths);
            });
        });
    }

    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("qa_pipeline");
    let pipeline = QaPipeline::default();

    for minutes in [1usize, 10] {
        let recording = synthetic_recording(minutes);
        group.bench_with_input(BenchmarkId::new("analyze", minutes), &recording, |b, rec| {
            b.iter(|| {
                let run = pipeline.analyze(black_box(rec)).expect("analysis");
                let summary =
                    summarize_table(&run.cleaned, rec.duration_s(), &default_volume_ranges());
                black_box(summary);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_detection, bench_full_pipeline);
criterion_main!(benches);
