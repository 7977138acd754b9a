//! # Thread pool
//!
//! A work-stealing pool of OS worker threads that cooperatively drives the
//! futures behind [`Task`]s.
//!
//! ## Structure
//!
//! - `N = max(1, available_parallelism - 1)` workers by default.
//! - Each worker owns a LIFO [`crossbeam_deque::Worker`] deque; every peer
//!   holds a [`Stealer`] onto its head.
//! - A single mutex-protected FIFO overflow queue absorbs external
//!   submissions and local spill past a soft cap.
//!
//! ## Submission
//!
//! - From a worker thread: push to the tail of that worker's local deque;
//!   past the soft cap, push to the overflow queue.
//! - From outside: push to the overflow queue.
//! - Every submission notifies one parked worker.
//!
//! ## Worker loop
//!
//! 1. Pop from the local deque tail (LIFO locally).
//! 2. Steal from a random peer's head (FIFO globally).
//! 3. Pop one from the overflow queue.
//! 4. Spin with exponential backoff up to a bound, then park on a condvar.
//!    A parking worker re-checks the queues under the sleep lock after
//!    arming, so a submission between the last scan and the wait cannot be
//!    lost.
//!
//! ## Execution
//!
//! Each submitted future is wrapped in a job with an idle/scheduled/polling
//! state machine: a wake during a poll marks the job for an immediate
//! re-poll instead of a second enqueue, so every job is executed by at most
//! one worker at a time and every wake leads to a poll. Ordering across
//! jobs is unspecified except through `await`.

use std::cell::Cell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, JoinHandle};

use crossbeam_deque::{Steal, Stealer, Worker};

use crate::parallel::rng::tl_rand_index;
use crate::parallel::spin::ExponentialBackoff;
use crate::parallel::task::{BoxFuture, Task};

/// Soft cap on a worker's local deque before submissions spill to the
/// overflow queue.
const LOCAL_QUEUE_CAP: usize = 256;

/// Unit of work queued on the pool.
enum Runnable {
    /// Poll a job's future.
    Poll(Arc<PoolJob>),
    /// Resume a suspended awaiter of [`ThreadPool::schedule`].
    Notify(Waker),
}

const JOB_IDLE: u8 = 0;
const JOB_SCHEDULED: u8 = 1;
const JOB_POLLING: u8 = 2;
const JOB_REPOLL: u8 = 3;
const JOB_COMPLETE: u8 = 4;

/// A pool-driven future plus its poll/wake state machine.
struct PoolJob {
    state: AtomicU8,
    future: Mutex<Option<BoxFuture<()>>>,
    pool: Weak<PoolInner>,
}

impl PoolJob {
    /// Enqueues the job unless it is already queued or completing.
    ///
    /// A wake that lands while a worker is polling marks the job for an
    /// immediate re-poll on that worker instead of enqueueing it twice.
    fn reschedule(this: &Arc<PoolJob>) {
        loop {
            match this.state.load(Ordering::Acquire) {
                JOB_IDLE => {
                    if this
                        .state
                        .compare_exchange(
                            JOB_IDLE,
                            JOB_SCHEDULED,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        match this.pool.upgrade() {
                            Some(pool) => pool.submit(Runnable::Poll(Arc::clone(this))),
                            None => this.state.store(JOB_COMPLETE, Ordering::Release),
                        }
                        return;
                    }
                }
                JOB_POLLING => {
                    if this
                        .state
                        .compare_exchange(
                            JOB_POLLING,
                            JOB_REPOLL,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        return;
                    }
                }
                // Already queued, already marked, or finished.
                _ => return,
            }
        }
    }

    /// Drives the job's future on the calling worker.
    fn run(this: Arc<PoolJob>) {
        if this
            .state
            .compare_exchange(
                JOB_SCHEDULED,
                JOB_POLLING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }

        loop {
            let mut slot = this
                .future
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(future) = slot.as_mut() else {
                this.state.store(JOB_COMPLETE, Ordering::Release);
                return;
            };

            let waker = Waker::from(Arc::clone(&this));
            let mut cx = Context::from_waker(&waker);
            match future.as_mut().poll(&mut cx) {
                Poll::Ready(()) => {
                    *slot = None;
                    drop(slot);
                    this.state.store(JOB_COMPLETE, Ordering::Release);
                    return;
                }
                Poll::Pending => {
                    drop(slot);
                    match this.state.compare_exchange(
                        JOB_POLLING,
                        JOB_IDLE,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => return,
                        Err(_) => {
                            // Woken mid-poll; poll again right away.
                            this.state.store(JOB_POLLING, Ordering::Release);
                        }
                    }
                }
            }
        }
    }
}

impl Wake for PoolJob {
    fn wake(self: Arc<Self>) {
        PoolJob::reschedule(&self);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        PoolJob::reschedule(self);
    }
}

/// Per-thread identity of a pool worker, installed for the lifetime of the
/// worker loop so submissions from that thread can target its local deque.
struct WorkerHook {
    pool_id: usize,
    queue: *const Worker<Runnable>,
    /// Approximate local queue depth; corrected whenever the local deque
    /// runs dry.
    depth: Cell<usize>,
}

thread_local! {
    static CURRENT_WORKER: Cell<*const WorkerHook> = const { Cell::new(std::ptr::null()) };
}

struct PoolInner {
    pool_id: usize,
    stealers: Vec<Stealer<Runnable>>,
    overflow: Mutex<VecDeque<Runnable>>,
    sleep: Mutex<usize>,
    wakeup: Condvar,
    running: AtomicBool,
}

impl PoolInner {
    fn submit(&self, runnable: Runnable) {
        if let Some(runnable) = self.try_push_local(runnable) {
            self.overflow
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(runnable);
        }
        self.notify_one();
    }

    /// Pushes to the calling worker's local deque if the caller is a worker
    /// of this pool with room under the soft cap; hands the runnable back
    /// otherwise.
    fn try_push_local(&self, runnable: Runnable) -> Option<Runnable> {
        CURRENT_WORKER.with(|current| {
            let hook = current.get();
            if hook.is_null() {
                return Some(runnable);
            }
            // Safety: the hook is installed by `worker_main` on this thread
            // and cleared before the worker returns; within the worker loop
            // the pointed-to hook and deque are alive.
            let hook = unsafe { &*hook };
            if hook.pool_id != self.pool_id || hook.depth.get() >= LOCAL_QUEUE_CAP {
                return Some(runnable);
            }
            let queue = unsafe { &*hook.queue };
            queue.push(runnable);
            hook.depth.set(hook.depth.get() + 1);
            None
        })
    }

    fn notify_one(&self) {
        let sleepers = self.sleep.lock().unwrap_or_else(PoisonError::into_inner);
        if *sleepers > 0 {
            self.wakeup.notify_one();
        }
    }

    fn pop_overflow(&self) -> Option<Runnable> {
        self.overflow
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    /// Steals one runnable from a random peer's head.
    fn steal(&self, thief: usize) -> Option<Runnable> {
        let count = self.stealers.len();
        if count < 2 {
            return None;
        }

        let start = tl_rand_index(count);
        for offset in 0..count {
            let victim = (start + offset) % count;
            if victim == thief {
                continue;
            }
            loop {
                match self.stealers[victim].steal() {
                    Steal::Success(runnable) => return Some(runnable),
                    Steal::Retry => std::hint::spin_loop(),
                    Steal::Empty => break,
                }
            }
        }
        None
    }

    /// Queue scan used by a parking worker after arming the sleep lock.
    fn has_pending(&self) -> bool {
        if !self
            .overflow
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
        {
            return true;
        }
        self.stealers.iter().any(|stealer| !stealer.is_empty())
    }
}

fn find_runnable(
    inner: &PoolInner,
    index: usize,
    local: &Worker<Runnable>,
    hook: &WorkerHook,
) -> Option<Runnable> {
    if let Some(runnable) = local.pop() {
        hook.depth.set(hook.depth.get().saturating_sub(1));
        return Some(runnable);
    }
    hook.depth.set(0);

    inner.steal(index).or_else(|| inner.pop_overflow())
}

fn worker_main(inner: Arc<PoolInner>, index: usize, local: Worker<Runnable>) {
    struct HookReset;
    impl Drop for HookReset {
        fn drop(&mut self) {
            CURRENT_WORKER.with(|current| current.set(std::ptr::null()));
        }
    }

    let hook = WorkerHook {
        pool_id: inner.pool_id,
        queue: &local as *const Worker<Runnable>,
        depth: Cell::new(0),
    };
    CURRENT_WORKER.with(|current| current.set(&hook as *const WorkerHook));
    let _reset = HookReset;

    let mut backoff = ExponentialBackoff::new();

    loop {
        if let Some(runnable) = find_runnable(&inner, index, &local, &hook) {
            backoff.reset();
            match runnable {
                Runnable::Poll(job) => PoolJob::run(job),
                Runnable::Notify(waker) => waker.wake(),
            }
            continue;
        }

        if !inner.running.load(Ordering::Acquire) {
            break;
        }

        if !backoff.reached_max_wait() {
            backoff.wait();
            continue;
        }

        // Park. The re-check under the sleep lock closes the race with a
        // submitter that enqueued after our last scan: the submitter cannot
        // take the sleep lock to notify until we either observed its work
        // or started waiting.
        {
            let mut sleepers = inner.sleep.lock().unwrap_or_else(PoisonError::into_inner);
            if inner.has_pending() {
                backoff.reset();
                continue;
            }
            if !inner.running.load(Ordering::Acquire) {
                break;
            }
            *sleepers += 1;
            let result = inner.wakeup.wait(sleepers);
            sleepers = result.unwrap_or_else(PoisonError::into_inner);
            *sleepers -= 1;
        }
        backoff.reset();
    }
}

fn default_worker_count() -> usize {
    let logical = thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1);
    logical.saturating_sub(1).max(1)
}

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(0);

/// Work-stealing pool of worker threads driving task futures.
///
/// See the module documentation for queueing and wake semantics.
pub struct ThreadPool {
    inner: Arc<PoolInner>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Creates a pool with `max(1, available_parallelism - 1)` workers.
    pub fn new() -> Self {
        Self::with_threads(default_worker_count())
    }

    /// Creates a pool with an explicit worker count (clamped to at least 1).
    ///
    /// ## Panics
    /// Panics if the operating system refuses to spawn a worker thread.
    pub fn with_threads(count: usize) -> Self {
        let count = count.max(1);
        let locals: Vec<Worker<Runnable>> = (0..count).map(|_| Worker::new_lifo()).collect();
        let stealers = locals.iter().map(|local| local.stealer()).collect();

        let inner = Arc::new(PoolInner {
            pool_id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            stealers,
            overflow: Mutex::new(VecDeque::new()),
            sleep: Mutex::new(0),
            wakeup: Condvar::new(),
            running: AtomicBool::new(true),
        });

        let workers = locals
            .into_iter()
            .enumerate()
            .map(|(index, local)| {
                let inner = Arc::clone(&inner);
                thread::Builder::new()
                    .name(format!("axion-worker-{index}"))
                    .spawn(move || worker_main(inner, index, local))
                    .expect("failed to spawn pool worker thread")
            })
            .collect();

        log::debug!("thread pool started with {count} worker(s)");

        Self { inner, workers }
    }

    /// Number of worker threads.
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Awaitable that suspends the calling coroutine and enqueues its
    /// resumption as pool work.
    ///
    /// This is the primitive by which a system body migrates onto the pool:
    /// the continuation after the `await` runs from a pool queue.
    pub fn schedule(&self) -> Schedule<'_> {
        Schedule { pool: self, queued: false }
    }

    /// Wraps `future` in a [`Task`] and starts it on this pool.
    pub fn spawn<F>(&self, future: F) -> Task<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let task = Task::new(future);
        task.start_on(self);
        task
    }

    /// Submits a unit future as a pool job.
    pub(crate) fn submit_future(&self, future: impl Future<Output = ()> + Send + 'static) {
        let job = Arc::new(PoolJob {
            state: AtomicU8::new(JOB_IDLE),
            future: Mutex::new(Some(Box::pin(future))),
            pool: Arc::downgrade(&self.inner),
        });
        PoolJob::reschedule(&job);
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.inner.running.store(false, Ordering::Release);
        {
            let _sleepers = self
                .inner
                .sleep
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            self.inner.wakeup.notify_all();
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        log::debug!("thread pool stopped");
    }
}

/// Awaitable returned by [`ThreadPool::schedule`].
///
/// The first poll enqueues the awaiter's resumption on the pool and
/// suspends; the second poll completes.
pub struct Schedule<'a> {
    pool: &'a ThreadPool,
    queued: bool,
}

impl Future for Schedule<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.queued {
            Poll::Ready(())
        } else {
            this.queued = true;
            this.pool
                .inner
                .submit(Runnable::Notify(cx.waker().clone()));
            Poll::Pending
        }
    }
}
