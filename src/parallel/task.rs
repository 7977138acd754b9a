//! # Task
//!
//! A [`Task`] is a lazily-started, once-completable unit of work with a
//! value-returning or unit completion. It is the engine's coroutine
//! stand-in: the payload is an ordinary future (a compiler-generated state
//! machine), and the task wraps it with a shared completion slot, a single
//! continuation, and blocking/polling entry points.
//!
//! ## State machine
//!
//! ```text
//! Pending --(start / first inline poll)--> Running --(finalize)--> Ready
//! ```
//!
//! - **Pending**: the payload future has not been claimed.
//! - **Running**: the payload is being driven, inline by an awaiter or on
//!   the thread pool after [`Task::start_on`].
//! - **Ready**: the result slot is filled (until the awaiter takes it).
//!
//! A handle dropped before completion detaches: the pool-side owner keeps
//! the shared state alive and the result is discarded on completion.
//!
//! ## Continuation protocol
//!
//! Awaiting a running task parks the awaiter's waker in the continuation
//! slot and then re-checks the state word. The finalizer publishes the
//! result with release ordering before draining the slot, so either the
//! finalizer observes the parked waker and resumes it, or the awaiter's
//! re-check observes `Ready` and resumes itself. The continuation is
//! resumed at most once per task lifetime.
//!
//! ## Blocking
//!
//! [`Task::wait`] parks the calling OS thread on a condvar and must not be
//! called from a pool worker (the worker could be the one the payload needs
//! to run on). [`Task::spin_wait`] burns CPU and is only an optimization
//! for tasks known to be near completion.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};

use crate::parallel::pool::ThreadPool;
use crate::parallel::spin;

/// Boxed future with a `Send` bound, the payload form stored in tasks.
pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const READY: u8 = 2;

pub(crate) struct TaskCore<T> {
    state: AtomicU8,
    payload: Mutex<Option<BoxFuture<T>>>,
    result: Mutex<Option<T>>,
    continuation: Mutex<Option<Waker>>,
    finished: Condvar,
}

impl<T> TaskCore<T> {
    fn new(payload: Option<BoxFuture<T>>, result: Option<T>) -> Self {
        let state = if result.is_some() { READY } else { PENDING };
        Self {
            state: AtomicU8::new(state),
            payload: Mutex::new(payload),
            result: Mutex::new(result),
            continuation: Mutex::new(None),
            finished: Condvar::new(),
        }
    }

    #[inline]
    fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    /// Stores the result, publishes `Ready` and resumes the continuation.
    ///
    /// Poisoning is recovered here: it can only arise from a panic in
    /// another system body, and completion must still be observable.
    pub(crate) fn finalize(&self, value: T) {
        {
            let mut result = self
                .result
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            debug_assert!(result.is_none(), "task finalized twice");
            *result = Some(value);
            self.state.store(READY, Ordering::Release);
            self.finished.notify_all();
        }

        let waker = self
            .continuation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    fn take_result(&self) -> Option<T> {
        self.result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// A lazily-started, once-completable, awaitable unit of work.
///
/// Created from a future with [`Task::new`]; nothing runs until the task is
/// either awaited (inline driving) or moved onto a pool with
/// [`Task::start_on`]. See the module documentation for the state machine.
pub struct Task<T = ()> {
    core: Arc<TaskCore<T>>,
}

impl<T> Task<T> {
    /// Wraps a future as an unstarted task.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        Self {
            core: Arc::new(TaskCore::new(Some(Box::pin(future)), None)),
        }
    }

    /// Creates a task that is already `Ready` with `value`.
    pub fn ready(value: T) -> Self {
        Self {
            core: Arc::new(TaskCore::new(None, Some(value))),
        }
    }

    /// Returns whether the task has reached `Ready`.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    /// Moves the payload onto the pool, where workers drive it to
    /// completion. No-op if the task was already started.
    pub fn start_on(&self, pool: &ThreadPool)
    where
        T: Send + 'static,
    {
        let payload = self
            .core
            .payload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(future) = payload {
            self.core.state.store(RUNNING, Ordering::Release);
            let core = Arc::clone(&self.core);
            pool.submit_future(async move {
                let value = future.await;
                core.finalize(value);
            });
        }
    }

    /// Spins for a bounded amount of iterations.
    ///
    /// Returns `true` if the task reached `Ready` within the budget. It can
    /// be an optimization to spin a little before waiting for small tasks.
    #[inline]
    pub fn try_spin(&self, spins: usize) -> bool {
        spin::try_spin(spins, || self.is_ready())
    }

    /// Spins until the task is `Ready`.
    ///
    /// High CPU usage; always prefer [`Task::wait`] when the remaining work
    /// is not known to be tiny.
    pub fn spin_wait(&self) {
        spin::spin_until(|| self.is_ready());
    }

    /// Blocks the calling OS thread until the task is `Ready`.
    ///
    /// Does not use up CPU while waiting. Must not be called from a pool
    /// worker.
    pub fn wait(&self) {
        let mut result = self
            .core
            .result
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while self.core.state.load(Ordering::Acquire) != READY {
            result = self
                .core
                .finished
                .wait(result)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Detaches the handle from the running work.
    ///
    /// The pool-side owner keeps driving the payload; the eventual result is
    /// dropped. Detaching an unstarted task drops its payload unrun.
    pub fn detach(self) {
        drop(self);
    }

    /// Takes the result out of a `Ready` task.
    ///
    /// Returns `None` if the task is not ready or the result was already
    /// taken (by an `await` or a prior call).
    pub fn take_result(&self) -> Option<T> {
        if self.core.is_ready() {
            self.core.take_result()
        } else {
            None
        }
    }
}

impl<T: Send + 'static> Future for Task<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let core = &self.core;

        loop {
            if core.is_ready() {
                let value = core
                    .take_result()
                    .expect("task result already taken; a task completes observably once");
                return Poll::Ready(value);
            }

            let mut payload = core
                .payload
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            if let Some(future) = payload.as_mut() {
                // Unstarted task: the awaiter supplies the thread and
                // drives the payload inline.
                core.state.store(RUNNING, Ordering::Release);
                match future.as_mut().poll(cx) {
                    Poll::Ready(value) => {
                        *payload = None;
                        drop(payload);
                        core.finalize(value);
                        // Loop to the ready branch to take the value.
                    }
                    Poll::Pending => return Poll::Pending,
                }
            } else {
                drop(payload);

                // Started elsewhere: park the continuation, then re-check
                // the state word to resolve the race with the finalizer.
                {
                    let mut slot = core
                        .continuation
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    *slot = Some(cx.waker().clone());
                }
                if core.is_ready() {
                    continue;
                }
                return Poll::Pending;
            }
        }
    }
}

/// Completer half of an externally finalized task.
///
/// [`Task::completion`] hands out a task with no payload together with a
/// `TaskCompleter`; the task reaches `Ready` when [`TaskCompleter::complete`]
/// is called. Used by the stage executor, whose completion condition is a
/// counter reaching zero rather than a future running to its end.
pub struct TaskCompleter<T> {
    core: Arc<TaskCore<T>>,
}

impl<T> TaskCompleter<T> {
    /// Finalizes the paired task with `value`.
    pub fn complete(self, value: T) {
        self.core.finalize(value);
    }
}

impl<T> Task<T> {
    /// Creates a task finalized externally through the returned completer.
    pub fn completion() -> (Task<T>, TaskCompleter<T>) {
        let core = Arc::new(TaskCore {
            state: AtomicU8::new(RUNNING),
            payload: Mutex::new(None),
            result: Mutex::new(None),
            continuation: Mutex::new(None),
            finished: Condvar::new(),
        });
        (
            Task { core: Arc::clone(&core) },
            TaskCompleter { core },
        )
    }
}
