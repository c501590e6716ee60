//! Benchmarks for convoy motion operations

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use convoy_core::{
    Delta, ElevationLock, FollowVector, Location, Locks, OrientationSpec, Point, Relation,
    SceneId, Size,
};
use convoy_motion::{compute_delta, compute_follower_position, SegmentWalls, Wall};

fn relation(orientation: OrientationSpec, elevation: ElevationLock) -> Relation {
    Relation {
        delta: Delta {
            angle: 0.4,
            distance: 200.0,
            dz: 5.0,
            orientation,
        },
        locks: Locks {
            elevation,
            follow: false,
        },
        snap: true,
    }
}

fn bench_vector_position(c: &mut Criterion) {
    let vector = FollowVector::new(
        Location::new(50.0, 50.0, 0.0, 0.0),
        Location::new(150.0, 80.0, 10.0, 0.3),
    );
    let relation = relation(OrientationSpec::DOWN, ElevationLock::Tether);
    let size = Size::new(100.0, 100.0);

    c.bench_function("vector_position", |b| {
        b.iter(|| {
            compute_follower_position(
                black_box(&vector),
                black_box(&relation),
                size,
                black_box(Point::new(0.0, 200.0)),
            )
        })
    });
}

fn bench_rel_position(c: &mut Criterion) {
    let vector = FollowVector::new(
        Location::new(50.0, 50.0, 0.0, 0.0),
        Location::new(150.0, 80.0, 0.0, 0.5),
    );
    let relation = relation(OrientationSpec::SHADOW, ElevationLock::Offset);
    let size = Size::new(100.0, 100.0);

    c.bench_function("rel_position", |b| {
        b.iter(|| {
            compute_follower_position(
                black_box(&vector),
                black_box(&relation),
                size,
                black_box(Point::new(0.0, 200.0)),
            )
        })
    });
}

fn bench_compute_delta(c: &mut Criterion) {
    c.bench_function("compute_delta", |b| {
        b.iter(|| {
            compute_delta(
                black_box(Point::new(50.0, 50.0)),
                black_box(10.0),
                black_box(Point::new(250.0, 150.0)),
                black_box(0.0),
                OrientationSpec::RIGHT,
            )
        })
    });
}

fn bench_wall_scan(c: &mut Criterion) {
    let scene = SceneId::new(1);
    // A 32x32 lattice of short wall stubs
    let walls = SegmentWalls::viewing(
        scene,
        (0..1024).map(|i| {
            let x = (i % 32) as f64 * 100.0;
            let y = (i / 32) as f64 * 100.0;
            Wall::new(Point::new(x, y), Point::new(x + 40.0, y))
        }),
    );

    c.bench_function("wall_scan_1024", |b| {
        b.iter(|| {
            walls.blocking(
                black_box(Point::new(15.0, 15.0)),
                black_box(Point::new(3150.0, 3120.0)),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_vector_position,
    bench_rel_position,
    bench_compute_delta,
    bench_wall_scan,
);
criterion_main!(benches);
