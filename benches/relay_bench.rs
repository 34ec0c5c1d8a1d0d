//! Benchmarks for the capture-to-render hot path.

use std::sync::Arc;
use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use screen_shader::capture::{FrameImage, FrameRelay, FrameSink, SyntheticCapture};
use screen_shader::metrics::Metrics;

fn bench_relay_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("Frame Relay");

    let relay = FrameRelay::new();
    group.bench_function("push_take", |b| {
        b.iter(|| {
            relay.push(black_box(42u64));
            black_box(relay.take());
        });
    });

    group.bench_function("push_replace", |b| {
        b.iter(|| {
            relay.push(black_box(1u64));
            relay.push(black_box(2u64));
        });
    });

    group.finish();
}

fn bench_sink_deliver(c: &mut Criterion) {
    let mut group = c.benchmark_group("Frame Sink");

    let resolutions = [(640, 360, "360p"), (1920, 1080, "1080p")];
    for (width, height, name) in resolutions {
        let relay = Arc::new(FrameRelay::new());
        let metrics = Arc::new(Metrics::new());
        let sink = FrameSink::new(relay.clone(), metrics.clone());
        let image = SyntheticCapture::pattern(width, height, 0).unwrap();

        group.bench_with_input(BenchmarkId::new("deliver_take", name), &image, |b, image| {
            b.iter(|| {
                let frame_id = sink.deliver(image.clone(), Instant::now());
                let frame = relay.take();
                metrics.record_render(frame_id);
                black_box(frame);
            });
        });
    }

    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("Metrics");

    let metrics = Metrics::new();
    group.bench_function("capture_render_update", |b| {
        b.iter(|| {
            for _ in 0..60 {
                let id = metrics.next_frame_id();
                metrics.record_capture(id);
                metrics.record_render(id);
            }
            black_box(metrics.update_stats());
        });
    });

    group.bench_function("transparent_frame_alloc_1080p", |b| {
        b.iter(|| black_box(FrameImage::transparent(1920, 1080)));
    });

    group.finish();
}

criterion_group!(benches, bench_relay_handoff, bench_sink_deliver, bench_metrics);
criterion_main!(benches);
