use criterion::{criterion_group, criterion_main, Criterion, black_box};

use spatial_octree::math::Aabb;
use spatial_octree::spatial::Octree;

use glam::Vec3;

/// Deterministic scatter of points inside a cube of half-size `extent`.
fn scatter(count: u32, extent: f32) -> Vec<Vec3> {
    (0..count)
        .map(|i| {
            let h = i.wrapping_mul(0x9E37_79B9);
            let x = ((h & 0x3FF) as f32 / 1023.0) * 2.0 - 1.0;
            let y = (((h >> 10) & 0x3FF) as f32 / 1023.0) * 2.0 - 1.0;
            let z = (((h >> 20) & 0x3FF) as f32 / 1023.0) * 2.0 - 1.0;
            Vec3::new(x, y, z) * extent
        })
        .collect()
}

fn populated(points: &[Vec3], capacity: usize) -> Octree<u32> {
    let tree = Octree::new(Vec3::ZERO, Vec3::splat(64.0), capacity).unwrap();
    for (i, p) in points.iter().enumerate() {
        tree.insert(*p, i as u32).unwrap();
    }
    tree
}

fn bench_insert_1k(c: &mut Criterion) {
    let points = scatter(1_000, 60.0);

    c.bench_function("octree_insert_1k", |b| {
        b.iter(|| populated(black_box(&points), 8));
    });
}

fn bench_insert_10k(c: &mut Criterion) {
    let points = scatter(10_000, 60.0);

    c.bench_function("octree_insert_10k", |b| {
        b.iter(|| populated(black_box(&points), 8));
    });
}

fn bench_insert_par_10k(c: &mut Criterion) {
    let points = scatter(10_000, 60.0);

    c.bench_function("octree_insert_par_10k", |b| {
        b.iter(|| {
            let tree = Octree::new(Vec3::ZERO, Vec3::splat(64.0), 8).unwrap();
            let items: Vec<(Vec3, u32)> = points.iter().enumerate().map(|(i, p)| (*p, i as u32)).collect();
            tree.insert_par(items).unwrap();
            black_box(tree);
        });
    });
}

fn bench_query_small_region(c: &mut Criterion) {
    let points = scatter(10_000, 60.0);
    let tree = populated(&points, 8);
    let region = Aabb::from_center_half_extent(Vec3::new(10.0, -5.0, 20.0), Vec3::splat(8.0));

    c.bench_function("octree_query_small_region", |b| {
        b.iter(|| black_box(tree.query(black_box(&region)).unwrap().len()));
    });
}

fn bench_query_precise_small_region(c: &mut Criterion) {
    let points = scatter(10_000, 60.0);
    let tree = populated(&points, 8);
    let region = Aabb::from_center_half_extent(Vec3::new(10.0, -5.0, 20.0), Vec3::splat(8.0));

    c.bench_function("octree_query_precise_small_region", |b| {
        b.iter(|| black_box(tree.query_precise(black_box(&region)).unwrap().len()));
    });
}

fn bench_update_movers(c: &mut Criterion) {
    let points = scatter(2_000, 60.0);
    let tree = populated(&points, 8);
    let mut positions = points.clone();

    c.bench_function("octree_update_2k_movers", |b| {
        let mut frame = 0u32;
        b.iter(|| {
            frame += 1;
            let offset = Vec3::new((frame as f32 * 0.1).sin(), 0.0, (frame as f32 * 0.1).cos()) * 0.05;
            let moves: Vec<(Vec3, Vec3, u32)> = positions
                .iter_mut()
                .enumerate()
                .map(|(i, p)| {
                    let from = *p;
                    *p += offset;
                    (from, *p, i as u32)
                })
                .collect();
            tree.update(black_box(moves)).unwrap();
        });
    });
}

fn bench_full_iteration(c: &mut Criterion) {
    let points = scatter(10_000, 60.0);
    let tree = populated(&points, 8);

    c.bench_function("octree_iter_10k", |b| {
        b.iter(|| {
            let count = tree.iter().unwrap().filter(|r| r.is_ok()).count();
            black_box(count);
        });
    });
}

criterion_group!(
    benches,
    bench_insert_1k,
    bench_insert_10k,
    bench_insert_par_10k,
    bench_query_small_region,
    bench_query_precise_small_region,
    bench_update_movers,
    bench_full_iteration,
);
criterion_main!(benches);
