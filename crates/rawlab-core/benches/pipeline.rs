//! Benchmarks for the rawlab adjustment pipeline.
//!
//! Run with: cargo bench -p rawlab-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rawlab_core::adjust::filters;
use rawlab_core::{AdjustmentPipeline, AdjustmentSpec, ColorSpace, ImageBuffer};

fn gradient(width: u32, height: u32) -> ImageBuffer {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push((x * 255 / width) as u8);
            data.push((y * 255 / height) as u8);
            data.push(((x + y) % 256) as u8);
        }
    }
    ImageBuffer::new_u8(width, height, 3, ColorSpace::Srgb, data).unwrap()
}

fn benchmark_tonal_stages(c: &mut Criterion) {
    let image = gradient(1024, 683);
    let pipeline = AdjustmentPipeline::new();
    let spec = AdjustmentSpec::from_pairs([
        ("temperature", 6200.0),
        ("exposure", 0.4),
        ("contrast", 15.0),
        ("highlights", -30.0),
        ("shadows", 25.0),
        ("vibrance", 20.0),
    ])
    .unwrap();

    c.bench_function("pipeline_tonal_1024", |b| {
        b.iter(|| {
            let _ = pipeline.apply(black_box(&image), black_box(&spec));
        })
    });
}

fn benchmark_local_contrast(c: &mut Criterion) {
    let image = gradient(1024, 683);
    let pipeline = AdjustmentPipeline::new();
    let spec =
        AdjustmentSpec::from_pairs([("texture", 30.0), ("clarity", 40.0)]).unwrap();

    c.bench_function("pipeline_texture_clarity_1024", |b| {
        b.iter(|| {
            let _ = pipeline.apply(black_box(&image), black_box(&spec));
        })
    });
}

fn benchmark_dehaze(c: &mut Criterion) {
    let image = gradient(512, 342);
    let pipeline = AdjustmentPipeline::new();
    let spec = AdjustmentSpec::from_pairs([("dehaze", 50.0)]).unwrap();

    c.bench_function("pipeline_dehaze_512", |b| {
        b.iter(|| {
            let _ = pipeline.apply(black_box(&image), black_box(&spec));
        })
    });
}

fn benchmark_gaussian_blur(c: &mut Criterion) {
    let (width, height) = (1024usize, 683usize);
    let plane: Vec<f32> = (0..width * height * 3)
        .map(|i| (i % 97) as f32 / 97.0)
        .collect();

    c.bench_function("gaussian_blur_sigma3", |b| {
        b.iter(|| {
            let _ = filters::gaussian_blur(black_box(&plane), width, height, 3, 3.0);
        })
    });
}

fn benchmark_preview_downsample(c: &mut Criterion) {
    let image = gradient(4000, 2667);

    c.bench_function("downsample_to_1024", |b| {
        b.iter(|| {
            let _ = black_box(&image).downsample(1024);
        })
    });
}

criterion_group!(
    benches,
    benchmark_tonal_stages,
    benchmark_local_contrast,
    benchmark_dehaze,
    benchmark_gaussian_blur,
    benchmark_preview_downsample,
);
criterion_main!(benches);
