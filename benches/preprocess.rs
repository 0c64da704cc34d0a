//! Criterion benchmarks for the preprocessing and extraction hot paths.
//!
//! Run with: cargo bench --bench preprocess
//!
//! - NIfTI decoding of a BraTS-sized volume
//! - slice resizing for each interpolation kernel
//! - full input tensor construction
//! - region extraction over a prediction tensor

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::{s, Array2, Array3, Array4};
use tumorseg::regions::RegionExtractor;
use tumorseg::transforms::{resize_slice, Interpolation, ResampleConfig, VolumeResampler};
use tumorseg::NiftiVolume;

/// BraTS volumes are 240x240x155.
fn brats_volume() -> NiftiVolume {
    NiftiVolume::from_array(Array3::from_shape_fn((240, 240, 155), |(x, y, z)| {
        ((x * 7 + y * 3 + z) % 256) as f32
    }))
}

fn bench_decode(c: &mut Criterion) {
    let bytes = brats_volume().to_bytes();
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("nii_240x240x155", |b| {
        b.iter(|| NiftiVolume::from_bytes(black_box(&bytes)).unwrap())
    });
    group.finish();
}

fn bench_resize(c: &mut Criterion) {
    let plane = Array2::from_shape_fn((240, 240), |(r, c)| ((r * c) % 97) as f32);
    let mut group = c.benchmark_group("resize_240_to_128");
    for method in [
        Interpolation::Nearest,
        Interpolation::Linear,
        Interpolation::Area,
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(method), &method, |b, &method| {
            b.iter(|| resize_slice(black_box(plane.view()), (128, 128), method).unwrap())
        });
    }
    group.finish();
}

fn bench_build_input(c: &mut Criterion) {
    let flair = brats_volume();
    let t1ce = brats_volume();
    let resampler = VolumeResampler::new(ResampleConfig::default());
    c.bench_function("build_input_155x128x128x2", |b| {
        b.iter(|| resampler.build_input(black_box(&flair), black_box(&t1ce)).unwrap())
    });
}

fn bench_extract(c: &mut Criterion) {
    let mut prediction = Array4::<f32>::zeros((155, 128, 128, 4));
    prediction.slice_mut(s![.., .., .., 0]).fill(1.0);
    for ((_, r, col), v) in prediction.slice_mut(s![.., .., .., 2]).indexed_iter_mut() {
        // scattered blobs with some single-pixel noise
        if (r / 8 + col / 8) % 3 == 0 || (r * 31 + col * 17) % 211 == 0 {
            *v = 0.9;
        }
    }
    let extractor = RegionExtractor::default();
    c.bench_function("extract_regions_155_slices", |b| {
        b.iter(|| extractor.extract(black_box(&prediction)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_decode,
    bench_resize,
    bench_build_input,
    bench_extract
);
criterion_main!(benches);
