//! # Blocking wait
//!
//! [`sync_wait`] blocks the calling OS thread until a future completes and
//! returns its value. It is the bridge between synchronous host code (for
//! example `main`) and the awaitable world: the future is driven on the
//! calling thread, parking between polls.
//!
//! Never call this from a pool worker; a worker blocked here cannot drive
//! the work it is waiting on.

use std::future::Future;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};

struct ThreadUnparker {
    thread: Thread,
    notified: AtomicBool,
}

impl Wake for ThreadUnparker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.notified.store(true, Ordering::Release);
        self.thread.unpark();
    }
}

/// Blocks the calling OS thread until `future` completes, returning its
/// value.
///
/// There is no timeout. The park flag absorbs spurious unparks and wakes
/// that arrive between a poll and the park.
pub fn sync_wait<F: Future>(future: F) -> F::Output {
    let unparker = Arc::new(ThreadUnparker {
        thread: thread::current(),
        notified: AtomicBool::new(false),
    });
    let waker = Waker::from(Arc::clone(&unparker));
    let mut cx = Context::from_waker(&waker);

    let mut future = pin!(future);
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(value) => return value,
            Poll::Pending => {
                while !unparker.notified.swap(false, Ordering::Acquire) {
                    thread::park();
                }
            }
        }
    }
}
