//! Benchmarks for effect validation and pipeline creation.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use screen_shader::effects::{Preset, DEFAULT_EFFECT_SOURCE};
use screen_shader::gpu::{harness, GpuContext, PipelineCompiler, ValidateOnly, WgpuBackend};

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("Effect Validation");

    group.bench_function("pass_through", |b| {
        b.iter(|| black_box(harness::validate_effect(DEFAULT_EFFECT_SOURCE)));
    });

    for preset in Preset::all() {
        group.bench_with_input(
            BenchmarkId::new("preset", preset.name()),
            preset.source(),
            |b, source| {
                b.iter(|| black_box(harness::validate_effect(source)));
            },
        );
    }

    let mut compiler = PipelineCompiler::new(ValidateOnly);
    group.bench_function("set_active_source", |b| {
        b.iter(|| black_box(compiler.set_active_source(Some(DEFAULT_EFFECT_SOURCE))));
    });

    group.finish();
}

fn bench_gpu_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("GPU Pipeline");

    let ctx = match pollster::block_on(GpuContext::new()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Skipping GPU benchmarks: {}", e);
            return;
        }
    };

    let backend = WgpuBackend::new(Arc::clone(&ctx.device), wgpu::TextureFormat::Bgra8Unorm);
    let compiler = PipelineCompiler::new(backend);
    group.bench_function("build_grey_scale", |b| {
        b.iter(|| black_box(compiler.build(Preset::GreyScale.source())));
    });

    group.finish();
}

criterion_group!(benches, bench_validate, bench_gpu_pipeline);
criterion_main!(benches);
