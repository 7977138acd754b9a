use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use axion::{sync_wait, when_all_ready_vec, Task, ThreadPool};

#[test]
fn default_pool_has_at_least_one_worker() {
    let pool = ThreadPool::new();
    assert!(pool.worker_count() >= 1);
}

#[test]
fn every_submitted_task_runs_exactly_once() {
    let pool = ThreadPool::with_threads(4);
    let count = Arc::new(AtomicUsize::new(0));

    // External submissions go through the overflow queue; completions
    // resubmit through worker-local queues. Large enough to force stealing.
    let tasks: Vec<Task<()>> = (0..10_000)
        .map(|_| {
            let count = Arc::clone(&count);
            pool.spawn(async move {
                count.fetch_add(1, Ordering::Relaxed);
            })
        })
        .collect();

    sync_wait(when_all_ready_vec(tasks));
    assert_eq!(count.load(Ordering::Relaxed), 10_000);
}

#[test]
fn spawned_bodies_run_on_named_workers() {
    let pool = ThreadPool::with_threads(2);

    let task = pool.spawn(async {
        thread::current()
            .name()
            .map(|name| name.starts_with("axion-worker-"))
            .unwrap_or(false)
    });

    assert!(sync_wait(task));
}

#[test]
fn schedule_yields_through_the_pool() {
    let pool = Arc::new(ThreadPool::with_threads(2));
    let hops = Arc::new(AtomicUsize::new(0));

    let inner_pool = Arc::clone(&pool);
    let inner_hops = Arc::clone(&hops);
    let task = pool.spawn(async move {
        // Every resumption after `schedule` re-enters through a pool queue.
        for _ in 0..100 {
            inner_pool.schedule().await;
            inner_hops.fetch_add(1, Ordering::SeqCst);
        }
    });
    sync_wait(task);

    assert_eq!(hops.load(Ordering::SeqCst), 100);
}

#[test]
fn pool_drops_cleanly_with_parked_workers() {
    let pool = ThreadPool::with_threads(4);
    // Let workers reach the parked state, then drop.
    thread::sleep(std::time::Duration::from_millis(10));
    drop(pool);
}

#[test]
fn tasks_spawned_from_workers_complete() {
    let pool = Arc::new(ThreadPool::with_threads(2));
    let count = Arc::new(AtomicUsize::new(0));

    // A task that fans out more tasks from inside a worker exercises the
    // local-queue submission path.
    let inner_pool = Arc::clone(&pool);
    let inner_count = Arc::clone(&count);
    let task = pool.spawn(async move {
        let children: Vec<Task<()>> = (0..64)
            .map(|_| {
                let count = Arc::clone(&inner_count);
                inner_pool.spawn(async move {
                    count.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        when_all_ready_vec(children).await;
    });
    sync_wait(task);

    assert_eq!(count.load(Ordering::SeqCst), 64);
}
