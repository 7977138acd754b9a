use criterion::*;

use axion::{AccessSets, App, ExecutionError, FnSystem, Read, ThreadPool, Write};

const AGENTS: usize = 50_000;

#[derive(Clone, Copy)]
struct Position {
    x: f32,
}

#[derive(Clone, Copy)]
struct Velocity {
    dx: f32,
}

#[derive(Clone, Copy)]
struct Health(f32);

#[derive(Clone, Copy)]
struct Stamina(f32);

struct Tick;

fn make_app() -> App {
    let mut app = App::with_pool(ThreadPool::with_threads(4)).unwrap();
    app.registry().set_conflict_check(false);

    for i in 0..AGENTS {
        app.registry()
            .create((
                Position { x: i as f32 },
                Velocity { dx: 1.0 },
                Health(100.0),
                Stamina(50.0),
            ))
            .unwrap();
    }

    let move_view = app.registry().view_for::<(Position, Velocity)>().unwrap();
    let health_view = app.registry().view_for::<(Health,)>().unwrap();
    let stamina_view = app.registry().view_for::<(Stamina,)>().unwrap();

    app.add_system::<Tick>(FnSystem::new(
        "movement",
        AccessSets::new()
            .reads::<Velocity>()
            .unwrap()
            .writes::<Position>()
            .unwrap(),
        move |world| {
            world
                .registry()
                .for_each::<(Read<Velocity>, Write<Position>), _>(move_view, |_, (v, p)| {
                    p.x += v.dx;
                })
                .map_err(|e| ExecutionError::failure(e.to_string()))
        },
    ))
    .unwrap();

    app.add_system::<Tick>(FnSystem::new(
        "regen",
        AccessSets::new().writes::<Health>().unwrap(),
        move |world| {
            world
                .registry()
                .for_each::<(Write<Health>,), _>(health_view, |_, (h,)| {
                    h.0 = (h.0 + 0.1).min(100.0)
                })
                .map_err(|e| ExecutionError::failure(e.to_string()))
        },
    ))
    .unwrap();

    app.add_system::<Tick>(FnSystem::new(
        "fatigue",
        AccessSets::new().writes::<Stamina>().unwrap(),
        move |world| {
            world
                .registry()
                .for_each::<(Write<Stamina>,), _>(stamina_view, |_, (s,)| {
                    s.0 = (s.0 - 0.1).max(0.0)
                })
                .map_err(|e| ExecutionError::failure(e.to_string()))
        },
    ))
    .unwrap();

    app
}

fn stage_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("stages");
    group.sample_size(20);

    let mut app = make_app();
    group.bench_function("tick_3_systems_50k", |b| {
        b.iter(|| {
            app.schedule::<Tick>().unwrap();
            app.run().unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, stage_benchmark);
criterion_main!(benches);
