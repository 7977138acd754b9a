use criterion::*;
use std::hint::black_box;

use axion::{EntityRegistry, Read, Write};

const AGENTS_SMALL: usize = 10_000;
const AGENTS_MED: usize = 100_000;

#[derive(Clone, Copy)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Clone, Copy)]
struct Wealth {
    value: f32,
}

fn populate(registry: &EntityRegistry, count: usize) {
    for i in 0..count {
        registry
            .create((
                Position { x: i as f32, y: 0.0 },
                Velocity { dx: 1.0, dy: 0.5 },
            ))
            .unwrap();
        if i % 2 == 0 {
            registry
                .create((
                    Position { x: i as f32, y: 1.0 },
                    Velocity { dx: 1.0, dy: 0.5 },
                    Wealth { value: 100.0 },
                ))
                .unwrap();
        }
    }
}

fn iterate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");

    for &count in &[AGENTS_SMALL, AGENTS_MED] {
        let registry = EntityRegistry::new();
        registry.set_conflict_check(false);
        populate(&registry, count);
        let view = registry.view_for::<(Position, Velocity)>().unwrap();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(format!("integrate_{count}"), |b| {
            b.iter(|| {
                registry
                    .for_each::<(Read<Velocity>, Write<Position>), _>(view, |_, (velocity, position)| {
                        position.x += velocity.dx;
                        position.y += velocity.dy;
                    })
                    .unwrap();
                black_box(&registry);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, iterate_benchmark);
criterion_main!(benches);
