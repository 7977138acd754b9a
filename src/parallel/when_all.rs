//! # Join combinators
//!
//! [`when_all`] composes a fixed, heterogeneous set of tasks into a single
//! awaitable producing the tuple of their results; [`when_all_vec`] is the
//! homogeneous range form producing a `Vec`. [`when_all_ready`] and
//! [`when_all_ready_vec`] are the completion-only variants with no value
//! aggregation.
//!
//! ## Semantics
//!
//! - The aggregate completes when and only when every child is `Ready`;
//!   result arity equals input arity.
//! - Unit-returning children contribute the unit placeholder `()` so the
//!   result shape stays uniform.
//! - Zero children complete immediately.
//! - Failures are values: with `Result` children the aggregate still waits
//!   for **all** children to terminate, and a caller that `?`s the outputs
//!   in order surfaces the first failure by original index and drops the
//!   rest.
//!
//! ## Implementation contract
//!
//! The combinator registers itself as the single continuation of every
//! unfinished child and tracks how many children remain; the last child to
//! finish wakes the combinator, whose own continuation is then resumed
//! exactly once.

use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::parallel::task::Task;

/// Tuples of tasks joinable by [`when_all`].
pub trait JoinTuple {
    /// Future aggregating the tuple's results.
    type Join: Future;

    /// Converts the tuple into its join future.
    fn into_join(self) -> Self::Join;
}

/// Tuples of tasks joinable by [`when_all_ready`].
pub trait ReadyJoinTuple {
    /// Future completing when every task in the tuple is ready.
    type Join: Future<Output = ()>;

    /// Converts the tuple into its completion-only join future.
    fn into_join(self) -> Self::Join;
}

/// Awaits all tasks of a heterogeneous tuple, producing the tuple of their
/// results.
///
/// `when_all(())` is immediately ready with `()`.
pub fn when_all<T: JoinTuple>(tasks: T) -> T::Join {
    tasks.into_join()
}

/// Awaits completion of all tasks of a heterogeneous tuple, discarding
/// results.
///
/// `when_all_ready(())` is immediately ready.
pub fn when_all_ready<T: ReadyJoinTuple>(tasks: T) -> T::Join {
    tasks.into_join()
}

impl JoinTuple for () {
    type Join = Ready<()>;

    fn into_join(self) -> Self::Join {
        ready(())
    }
}

impl ReadyJoinTuple for () {
    type Join = Ready<()>;

    fn into_join(self) -> Self::Join {
        ready(())
    }
}

macro_rules! impl_when_all {
    ($name:ident, $ready_name:ident; $(($T:ident, $task:ident, $out:ident)),+) => {
        /// Join future over a fixed set of tasks. See [`when_all`].
        pub struct $name<$($T),+> {
            $( $task: Task<$T>, $out: Option<$T>, )+
        }

        // The join never pins its children in place (tasks are freestanding
        // handles), so the aggregate is freely movable.
        impl<$($T),+> Unpin for $name<$($T),+> {}

        impl<$($T: Send + 'static),+> Future for $name<$($T),+> {
            type Output = ($($T,)+);

            fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
                let this = self.get_mut();
                let mut remaining = 0usize;
                $(
                    if this.$out.is_none() {
                        match Pin::new(&mut this.$task).poll(cx) {
                            Poll::Ready(value) => this.$out = Some(value),
                            Poll::Pending => remaining += 1,
                        }
                    }
                )+
                if remaining > 0 {
                    return Poll::Pending;
                }
                Poll::Ready((
                    $( this.$out.take().expect("join polled after completion"), )+
                ))
            }
        }

        impl<$($T: Send + 'static),+> JoinTuple for ($(Task<$T>,)+) {
            type Join = $name<$($T),+>;

            fn into_join(self) -> Self::Join {
                let ($($task,)+) = self;
                $name { $( $task, $out: None, )+ }
            }
        }

        /// Completion-only join future. See [`when_all_ready`].
        pub struct $ready_name<$($T),+> {
            $( $task: Task<$T>, $out: bool, )+
        }

        impl<$($T),+> Unpin for $ready_name<$($T),+> {}

        impl<$($T: Send + 'static),+> Future for $ready_name<$($T),+> {
            type Output = ();

            fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
                let this = self.get_mut();
                let mut remaining = 0usize;
                $(
                    if !this.$out {
                        match Pin::new(&mut this.$task).poll(cx) {
                            Poll::Ready(value) => {
                                drop(value);
                                this.$out = true;
                            }
                            Poll::Pending => remaining += 1,
                        }
                    }
                )+
                if remaining > 0 {
                    Poll::Pending
                } else {
                    Poll::Ready(())
                }
            }
        }

        impl<$($T: Send + 'static),+> ReadyJoinTuple for ($(Task<$T>,)+) {
            type Join = $ready_name<$($T),+>;

            fn into_join(self) -> Self::Join {
                let ($($task,)+) = self;
                $ready_name { $( $task, $out: false, )+ }
            }
        }
    };
}

impl_when_all!(WhenAll1, WhenAllReady1; (T0, task0, out0));
impl_when_all!(WhenAll2, WhenAllReady2; (T0, task0, out0), (T1, task1, out1));
impl_when_all!(WhenAll3, WhenAllReady3; (T0, task0, out0), (T1, task1, out1), (T2, task2, out2));
impl_when_all!(WhenAll4, WhenAllReady4;
    (T0, task0, out0), (T1, task1, out1), (T2, task2, out2), (T3, task3, out3));
impl_when_all!(WhenAll5, WhenAllReady5;
    (T0, task0, out0), (T1, task1, out1), (T2, task2, out2), (T3, task3, out3),
    (T4, task4, out4));
impl_when_all!(WhenAll6, WhenAllReady6;
    (T0, task0, out0), (T1, task1, out1), (T2, task2, out2), (T3, task3, out3),
    (T4, task4, out4), (T5, task5, out5));
impl_when_all!(WhenAll7, WhenAllReady7;
    (T0, task0, out0), (T1, task1, out1), (T2, task2, out2), (T3, task3, out3),
    (T4, task4, out4), (T5, task5, out5), (T6, task6, out6));
impl_when_all!(WhenAll8, WhenAllReady8;
    (T0, task0, out0), (T1, task1, out1), (T2, task2, out2), (T3, task3, out3),
    (T4, task4, out4), (T5, task5, out5), (T6, task6, out6), (T7, task7, out7));

/// Homogeneous join over a sequence of tasks, producing their results in
/// input order.
pub struct WhenAllVec<T> {
    tasks: Vec<Task<T>>,
    outputs: Vec<Option<T>>,
}

// The join never pins its children in place (tasks are freestanding
// handles), so the aggregate is freely movable.
impl<T> Unpin for WhenAllVec<T> {}

/// Awaits all tasks of a sequence, producing their results in input order.
///
/// An empty sequence completes immediately with an empty vector.
pub fn when_all_vec<T: Send + 'static>(tasks: Vec<Task<T>>) -> WhenAllVec<T> {
    let outputs = tasks.iter().map(|_| None).collect();
    WhenAllVec { tasks, outputs }
}

impl<T: Send + 'static> Future for WhenAllVec<T> {
    type Output = Vec<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Vec<T>> {
        let this = self.get_mut();
        let mut remaining = 0usize;
        for (task, output) in this.tasks.iter_mut().zip(this.outputs.iter_mut()) {
            if output.is_none() {
                match Pin::new(task).poll(cx) {
                    Poll::Ready(value) => *output = Some(value),
                    Poll::Pending => remaining += 1,
                }
            }
        }
        if remaining > 0 {
            return Poll::Pending;
        }
        Poll::Ready(
            this.outputs
                .iter_mut()
                .map(|output| output.take().expect("join polled after completion"))
                .collect(),
        )
    }
}

/// Completion-only join over a sequence of tasks.
pub struct WhenAllReadyVec<T> {
    tasks: Vec<Task<T>>,
    done: Vec<bool>,
}

/// Awaits completion of all tasks of a sequence, discarding results.
pub fn when_all_ready_vec<T: Send + 'static>(tasks: Vec<Task<T>>) -> WhenAllReadyVec<T> {
    let done = vec![false; tasks.len()];
    WhenAllReadyVec { tasks, done }
}

impl<T: Send + 'static> Future for WhenAllReadyVec<T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let mut remaining = 0usize;
        for (task, done) in this.tasks.iter_mut().zip(this.done.iter_mut()) {
            if !*done {
                match Pin::new(task).poll(cx) {
                    Poll::Ready(value) => {
                        drop(value);
                        *done = true;
                    }
                    Poll::Pending => remaining += 1,
                }
            }
        }
        if remaining > 0 {
            Poll::Pending
        } else {
            Poll::Ready(())
        }
    }
}
