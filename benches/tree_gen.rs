use criterion::{criterion_group, criterion_main, Criterion, black_box};

use arborist::math::Mulberry32;
use arborist::procgen::curve::CatmullRomCurve;
use arborist::procgen::{build_tube, generate_batch, generate_tree, GenerationParams, TreeMaterials, TubeOptions};

use glam::Vec3;

fn bench_generate_broadleaf(c: &mut Criterion) {
    let params = GenerationParams::broadleaf();
    let materials = TreeMaterials::default();

    c.bench_function("generate_broadleaf", |b| {
        b.iter(|| generate_tree(black_box(&params), &materials));
    });
}

fn bench_generate_willow_along(c: &mut Criterion) {
    let params = GenerationParams::willow();
    let materials = TreeMaterials::default();

    c.bench_function("generate_willow", |b| {
        b.iter(|| generate_tree(black_box(&params), &materials));
    });
}

fn bench_generate_sub_trunks(c: &mut Criterion) {
    let params = GenerationParams {
        trunk_branch_levels: 2,
        trunk_branches_per_level: 3,
        ..GenerationParams::default()
    };
    let materials = TreeMaterials::default();

    c.bench_function("generate_sub_trunks", |b| {
        b.iter(|| generate_tree(black_box(&params), &materials));
    });
}

fn bench_generate_batch_16(c: &mut Criterion) {
    let params = GenerationParams::default();
    let materials = TreeMaterials::default();
    let seeds: Vec<u32> = (0..16).collect();

    c.bench_function("generate_batch_16", |b| {
        b.iter(|| generate_batch(black_box(&params), black_box(&seeds), &materials));
    });
}

fn bench_build_tube(c: &mut Criterion) {
    let mut rng = Mulberry32::new(7);
    let points: Vec<Vec3> = (0..6)
        .map(|i| Vec3::new(rng.signed() * 0.2, i as f32, rng.signed() * 0.2))
        .collect();
    let opts = TubeOptions {
        tubular_segments: 24,
        radial_segments: 18,
        ..TubeOptions::default()
    };

    c.bench_function("build_tube_24x18", |b| {
        b.iter(|| build_tube(black_box(&points), 0.25, &opts));
    });
}

fn bench_curve_length(c: &mut Criterion) {
    let curve = CatmullRomCurve::new(vec![
        Vec3::ZERO,
        Vec3::new(0.2, 1.0, 0.0),
        Vec3::new(-0.1, 2.0, 0.3),
        Vec3::new(0.0, 3.0, 0.0),
    ]);

    c.bench_function("curve_length_200", |b| {
        b.iter(|| black_box(&curve).length(200));
    });
}

criterion_group!(
    benches,
    bench_generate_broadleaf,
    bench_generate_willow_along,
    bench_generate_sub_trunks,
    bench_generate_batch_16,
    bench_build_tube,
    bench_curve_length,
);
criterion_main!(benches);
