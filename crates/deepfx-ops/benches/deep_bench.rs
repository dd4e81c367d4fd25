//! Benchmarks for deep image operations.
//!
//! Run with: `cargo bench -p deepfx-ops`

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use glam::Vec4;

use deepfx_core::{DeepImage, SampleInit};
use deepfx_ops::decompose::{LayerMap, decompose};
use deepfx_ops::distance::DistanceField;
use deepfx_ops::stroke::{StrokeConfig, synthesize_stroke};

/// Square image with a few samples per pixel, written in reverse depth order.
fn layered_image(size: u32, depth: u32) -> DeepImage {
    let mut image = DeepImage::new(size, size);
    for y in 0..size {
        for x in 0..size {
            for s in 0..depth {
                let id = 1 + (x + y + s) % 3;
                let rgba = Vec4::new(0.2 * id as f32, 0.1, 0.3, 0.4);
                image
                    .push_sample(x, y, SampleInit::new(rgba, 1.0 + s as f32, id))
                    .unwrap();
            }
        }
    }
    image
}

/// Disc of full coverage in the middle of the image.
fn disc_coverage(size: u32) -> Vec<f32> {
    let c = size as f32 * 0.5;
    let r = size as f32 * 0.25;
    (0..size * size)
        .map(|i| {
            let (x, y) = ((i % size) as f32, (i / size) as f32);
            if (x - c).hypot(y - c) <= r { 1.0 } else { 0.0 }
        })
        .collect()
}

fn bench_depth_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("depth_sort");
    for size in [64u32, 256] {
        let image = layered_image(size, 6);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &image, |b, img| {
            b.iter(|| {
                let mut img = img.clone();
                img.sort_by_depth().unwrap();
                black_box(img)
            })
        });
    }
    group.finish();
}

fn bench_distance_field(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance_field");
    for size in [256u32, 1024] {
        let coverage = disc_coverage(size);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &coverage, |b, cov| {
            b.iter(|| DistanceField::from_coverage(size, size, black_box(cov)).unwrap())
        });
    }
    group.finish();
}

fn bench_stroke(c: &mut Criterion) {
    let image = layered_image(128, 3);
    let config = StrokeConfig {
        objects: vec![1],
        radius: 3.0,
        fade: 1.0,
        ..Default::default()
    };
    c.bench_function("stroke_128", |b| {
        b.iter(|| {
            let mut img = image.clone();
            synthesize_stroke(&mut img, black_box(&config)).unwrap()
        })
    });
}

fn bench_decompose(c: &mut Criterion) {
    let mut image = layered_image(256, 6);
    image.sort_by_depth().unwrap();
    let map = LayerMap::new(0, [(1, 1), (2, 2), (3, 3)]);
    c.bench_function("decompose_256", |b| {
        b.iter(|| {
            let mut img = image.clone();
            decompose(&mut img, black_box(&map)).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_depth_sort,
    bench_distance_field,
    bench_stroke,
    bench_decompose
);
criterion_main!(benches);
