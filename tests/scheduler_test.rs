use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use axion::{
    AccessSets, App, AsyncFnSystem, ExecutionError, FnSystem, Read, SystemResult, ThreadPool,
    Write,
};

#[derive(Clone, Copy)]
struct CompA(u64);

#[derive(Clone, Copy)]
struct CompB(u64);

struct StageOne;
struct StageTwo;
struct ParallelStage;
struct SerialStage;
struct FailingStage;
struct AsyncStage;
struct SpawnStage;
struct EmptyStage;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn wait_for(flag: impl Fn() -> bool) -> SystemResult {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !flag() {
        if Instant::now() > deadline {
            return Err(ExecutionError::failure("peer never entered its body"));
        }
        thread::yield_now();
    }
    Ok(())
}

#[test]
fn disjoint_systems_run_concurrently() {
    init_logs();
    let mut app = App::with_pool(ThreadPool::with_threads(2)).unwrap();
    let entered = Arc::new(AtomicUsize::new(0));

    // Each body refuses to exit until it has observed the other one enter;
    // serialized execution would trip the in-body deadline instead.
    for name in ["left", "right"] {
        let entered = Arc::clone(&entered);
        let access = if name == "left" {
            AccessSets::new().writes::<CompA>().unwrap()
        } else {
            AccessSets::new().writes::<CompB>().unwrap()
        };
        app.add_system::<ParallelStage>(FnSystem::new(name, access, move |_| {
            entered.fetch_add(1, Ordering::SeqCst);
            wait_for(|| entered.load(Ordering::SeqCst) >= 2)
        }))
        .unwrap();
    }

    for _ in 0..1000 {
        entered.store(0, Ordering::SeqCst);
        app.schedule::<ParallelStage>().unwrap();
        app.run().unwrap();
        assert_eq!(entered.load(Ordering::SeqCst), 2);
    }
}

#[test]
fn conflicting_systems_are_serialized() {
    let mut app = App::with_pool(ThreadPool::with_threads(4)).unwrap();
    let in_body = Arc::new(AtomicBool::new(false));
    let first_done = Arc::new(AtomicBool::new(false));
    let violations = Arc::new(AtomicUsize::new(0));

    {
        let in_body = Arc::clone(&in_body);
        let first_done = Arc::clone(&first_done);
        app.add_system::<SerialStage>(FnSystem::new(
            "first",
            AccessSets::new().writes::<CompA>().unwrap(),
            move |_| {
                in_body.store(true, Ordering::SeqCst);
                // Widen the race window a little.
                for _ in 0..1000 {
                    std::hint::spin_loop();
                }
                first_done.store(true, Ordering::SeqCst);
                in_body.store(false, Ordering::SeqCst);
                Ok(())
            },
        ))
        .unwrap();
    }
    {
        let in_body = Arc::clone(&in_body);
        let first_done = Arc::clone(&first_done);
        let violations = Arc::clone(&violations);
        app.add_system::<SerialStage>(FnSystem::new(
            "second",
            AccessSets::new().writes::<CompA>().unwrap(),
            move |_| {
                // `second` must start only after `first` ended.
                if in_body.load(Ordering::SeqCst) || !first_done.load(Ordering::SeqCst) {
                    violations.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            },
        ))
        .unwrap();
    }

    for _ in 0..1000 {
        first_done.store(false, Ordering::SeqCst);
        app.schedule::<SerialStage>().unwrap();
        app.run().unwrap();
    }
    assert_eq!(violations.load(Ordering::SeqCst), 0);
}

#[test]
fn stages_execute_in_enqueue_order() {
    let mut app = App::with_pool(ThreadPool::with_threads(2)).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    {
        let log = Arc::clone(&log);
        app.add_system::<StageOne>(FnSystem::new(
            "one",
            AccessSets::new().writes::<CompA>().unwrap(),
            move |_| {
                log.lock().unwrap().push(1u8);
                Ok(())
            },
        ))
        .unwrap();
    }
    {
        let log = Arc::clone(&log);
        app.add_system::<StageTwo>(FnSystem::new(
            "two",
            AccessSets::new().writes::<CompA>().unwrap(),
            move |_| {
                log.lock().unwrap().push(2u8);
                Ok(())
            },
        ))
        .unwrap();
    }

    app.schedule::<StageOne>().unwrap();
    app.schedule::<StageTwo>().unwrap();
    app.schedule::<StageTwo>().unwrap();
    app.schedule::<StageOne>().unwrap();
    app.schedule::<StageTwo>().unwrap();
    app.run().unwrap();

    assert_eq!(*log.lock().unwrap(), vec![1, 2, 2, 1, 2]);
}

#[test]
fn empty_stage_completes_immediately() {
    init_logs();
    let mut app = App::with_pool(ThreadPool::with_threads(1)).unwrap();

    app.schedule::<EmptyStage>().unwrap();
    app.run().unwrap();
}

#[test]
fn empty_queue_completes_immediately() {
    let mut app = App::with_pool(ThreadPool::with_threads(1)).unwrap();
    app.run().unwrap();
}

#[test]
fn failures_aggregate_and_do_not_cancel_successors() {
    let mut app = App::with_pool(ThreadPool::with_threads(2)).unwrap();
    let successor_ran = Arc::new(AtomicBool::new(false));
    let independent_ran = Arc::new(AtomicBool::new(false));

    app.add_system::<FailingStage>(FnSystem::new(
        "exploder",
        AccessSets::new().writes::<CompA>().unwrap(),
        move |_| Err(ExecutionError::failure("intentional")),
    ))
    .unwrap();
    {
        let successor_ran = Arc::clone(&successor_ran);
        app.add_system::<FailingStage>(FnSystem::new(
            "successor",
            AccessSets::new().writes::<CompA>().unwrap(),
            move |_| {
                successor_ran.store(true, Ordering::SeqCst);
                Ok(())
            },
        ))
        .unwrap();
    }
    {
        let independent_ran = Arc::clone(&independent_ran);
        app.add_system::<FailingStage>(FnSystem::new(
            "independent",
            AccessSets::new().writes::<CompB>().unwrap(),
            move |_| {
                independent_ran.store(true, Ordering::SeqCst);
                Ok(())
            },
        ))
        .unwrap();
    }

    app.schedule::<FailingStage>().unwrap();
    let failures = app.run().unwrap_err();

    assert!(successor_ran.load(Ordering::SeqCst));
    assert!(independent_ran.load(Ordering::SeqCst));
    assert_eq!(failures.failures.len(), 1);
    assert_eq!(failures.failures[0].system, "exploder");
    assert!(failures.failures[0].stage.contains("FailingStage"));
    assert_eq!(
        failures.failures[0].error,
        ExecutionError::failure("intentional")
    );
}

#[test]
fn async_system_migrates_onto_the_pool() {
    let mut app = App::with_pool(ThreadPool::with_threads(2)).unwrap();
    let resumed_on_worker = Arc::new(AtomicBool::new(false));

    {
        let resumed_on_worker = Arc::clone(&resumed_on_worker);
        app.add_system::<AsyncStage>(AsyncFnSystem::new(
            "migrator",
            AccessSets::new(),
            move |world| {
                let resumed_on_worker = Arc::clone(&resumed_on_worker);
                async move {
                    world.pool().schedule().await;
                    let on_worker = thread::current()
                        .name()
                        .map(|name| name.starts_with("axion-worker-"))
                        .unwrap_or(false);
                    resumed_on_worker.store(on_worker, Ordering::SeqCst);
                    Ok(())
                }
            },
        ))
        .unwrap();
    }

    app.schedule::<AsyncStage>().unwrap();
    app.run().unwrap();

    assert!(resumed_on_worker.load(Ordering::SeqCst));
}

#[test]
fn systems_mutate_the_registry() {
    let mut app = App::with_pool(ThreadPool::with_threads(2)).unwrap();

    app.add_system::<SpawnStage>(FnSystem::new(
        "spawner",
        AccessSets::new().writes::<CompA>().unwrap(),
        move |world| {
            for i in 0..10 {
                world
                    .registry()
                    .create((CompA(i),))
                    .map_err(|e| ExecutionError::failure(e.to_string()))?;
            }
            Ok(())
        },
    ))
    .unwrap();

    app.schedule::<SpawnStage>().unwrap();
    app.schedule::<SpawnStage>().unwrap();
    app.run().unwrap();

    assert_eq!(app.registry().circulating(), 20);
}

#[test]
fn system_iterates_views_under_declared_access() {
    let mut app = App::with_pool(ThreadPool::with_threads(2)).unwrap();

    for i in 0..256 {
        app.registry().create((CompA(i), CompB(i * 2))).unwrap();
    }
    let view = app.registry().view_for::<(CompA, CompB)>().unwrap();

    app.add_system::<StageOne>(FnSystem::new(
        "integrate",
        AccessSets::new()
            .reads::<CompB>()
            .unwrap()
            .writes::<CompA>()
            .unwrap(),
        move |world| {
            world
                .registry()
                .for_each::<(Read<CompB>, Write<CompA>), _>(view, |_, (b, a)| {
                    a.0 += b.0;
                })
                .map_err(|e| ExecutionError::failure(e.to_string()))
        },
    ))
    .unwrap();

    app.schedule::<StageOne>().unwrap();
    app.run().unwrap();

    let total = {
        let mut sum = 0u64;
        let registry = app.registry();
        registry
            .for_each::<(Read<CompA>,), _>(view, |_, (a,)| sum += a.0)
            .unwrap();
        sum
    };
    // Each entity: i + 2i summed over 0..256.
    assert_eq!(total, (0..256u64).map(|i| i * 3).sum::<u64>());
}

#[test]
fn global_resources_reach_systems() {
    struct Score(usize);

    let mut app = App::with_pool(ThreadPool::with_threads(2)).unwrap();
    app.set_global(Score(0)).unwrap();

    app.add_system::<StageTwo>(FnSystem::new(
        "scorer",
        AccessSets::new().writes_resource::<Score>().unwrap(),
        move |world| {
            world
                .global_mut::<Score>()
                .map_err(|e| ExecutionError::failure(e.to_string()))?
                .0 += 5;
            Ok(())
        },
    ))
    .unwrap();

    for _ in 0..3 {
        app.schedule::<StageTwo>().unwrap();
    }
    app.run().unwrap();

    assert_eq!(app.world().global::<Score>().unwrap().0, 15);
}
