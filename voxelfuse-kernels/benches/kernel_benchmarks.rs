//! Benchmarks for the fusion pipeline kernels

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use voxelfuse_core::{BlockSelection, DepthImage, Matrix3, Matrix4, VoxelBlockGrid};
use voxelfuse_kernels::{
    extract_surface_points, integrate, marching_cubes, touch, unproject, MarchingCubesConfig,
    DEFAULT_MAX_OUTPUT_VERTICES,
};

const VOXEL_SIZE: f32 = 0.01;
const SDF_TRUNC: f32 = 0.04;

fn intrinsics(size: usize) -> Matrix3<f32> {
    let f = size as f32;
    let c = size as f32 / 2.0;
    Matrix3::new(f, 0.0, c, 0.0, f, c, 0.0, 0.0, 1.0)
}

/// A grid with a constant-depth plane already fused in.
fn fused_plane(size: usize) -> (VoxelBlockGrid, BlockSelection, DepthImage) {
    let depth = DepthImage::constant(size, size, 1.0);
    let k = intrinsics(size);

    let mut grid = VoxelBlockGrid::new(8, VOXEL_SIZE).unwrap();
    let map = unproject(&depth, &k, 1.0, 3.0).unwrap();
    let keys = touch(&map.valid_points(), VOXEL_SIZE, 8).unwrap();
    grid.activate(&keys);

    let indices: Vec<i32> = (0..grid.len() as i32).collect();
    integrate(
        &mut grid,
        &indices,
        &depth,
        &k,
        &Matrix4::identity(),
        SDF_TRUNC,
        1.0,
    )
    .unwrap();

    let selection = BlockSelection::of_all_blocks(&grid).unwrap();
    (grid, selection, depth)
}

fn bench_kernels(c: &mut Criterion) {
    let sizes = [64, 128];

    let mut group = c.benchmark_group("kernels");

    for &size in &sizes {
        let depth = DepthImage::constant(size, size, 1.0);
        let k = intrinsics(size);

        group.bench_with_input(BenchmarkId::new("unproject", size), &size, |b, _| {
            b.iter(|| {
                let map = unproject(black_box(&depth), &k, 1.0, 3.0).unwrap();
                black_box(map);
            });
        });

        let (mut grid, selection, depth) = fused_plane(size);
        let indices: Vec<i32> = (0..grid.len() as i32).collect();

        group.bench_with_input(BenchmarkId::new("integrate", size), &size, |b, _| {
            b.iter(|| {
                integrate(
                    black_box(&mut grid),
                    &indices,
                    &depth,
                    &k,
                    &Matrix4::identity(),
                    SDF_TRUNC,
                    1.0,
                )
                .unwrap();
            });
        });

        group.bench_with_input(
            BenchmarkId::new("surface_extraction", size),
            &size,
            |b, _| {
                b.iter(|| {
                    let cloud = extract_surface_points(
                        black_box(&grid),
                        &selection,
                        DEFAULT_MAX_OUTPUT_VERTICES,
                    )
                    .unwrap();
                    black_box(cloud);
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("marching_cubes", size), &size, |b, _| {
            b.iter(|| {
                let mesh =
                    marching_cubes(black_box(&grid), &selection, &MarchingCubesConfig::default())
                        .unwrap();
                black_box(mesh);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_kernels);
criterion_main!(benches);
