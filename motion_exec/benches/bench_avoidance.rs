//! # Avoidance Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use motion_lib::{
    avoidance::Avoidance,
    loc::Pose,
    obstacles::{Obstacle, ObstacleList, ObstacleListParams, ObstacleRegistry},
};
use nalgebra::Point2;

fn avoidance_benchmark(c: &mut Criterion) {
    // ---- Build a crowded field ----

    let mut registry = ObstacleRegistry::new();
    let list = registry
        .register(ObstacleList::new(ObstacleListParams::default()).unwrap())
        .unwrap();

    {
        let mut list = list.lock().unwrap();
        for i in 0..4 {
            for j in 0..2 {
                list.push(Obstacle::circle(700.0 + 500.0 * i as f64, 700.0 + 600.0 * j as f64, 120.0).unwrap())
                    .unwrap();
            }
        }
        list.push(Obstacle::rectangle(1500.0, 1000.0, 30.0, 300.0, 80.0).unwrap())
            .unwrap();
    }

    let borders = vec![
        Point2::new(0.0, 0.0),
        Point2::new(3000.0, 0.0),
        Point2::new(3000.0, 2000.0),
        Point2::new(0.0, 2000.0),
    ];
    let mut avoidance = Avoidance::new(registry, borders).unwrap();

    let start = Pose::new(200.0, 1000.0, 0.0);
    let finish = Pose::new(2800.0, 1000.0, 0.0);

    // Bench graph building and the shortest path search
    c.bench_function("Avoidance::build_graph", |b| {
        b.iter(|| avoidance.build_graph(&start, &finish).unwrap())
    });

    // Bench the line of sight check done every planner step
    c.bench_function("Avoidance::check_recompute", |b| {
        b.iter(|| avoidance.check_recompute(&start, &finish))
    });
}

criterion_group!(benches, avoidance_benchmark);
criterion_main!(benches);
