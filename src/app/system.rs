//! ECS System Abstractions
//!
//! This module defines the core *system execution model* of the engine.
//!
//! A **system** is a unit of logic that operates over the world. Systems:
//! - declare which components and resources they read and write,
//! - are scheduled into a per-stage dependency DAG based on access
//!   conflicts,
//! - execute as pool tasks, sequentially within a body and concurrently
//!   across non-conflicting systems.
//!
//! ## System Trait
//!
//! [`System::run`] hands back the system's body as a future so that bodies
//! may suspend (e.g. on [`ThreadPool::schedule`](crate::ThreadPool) or on
//! task joins). Synchronous bodies are wrapped in an immediately-resolving
//! future by [`FnSystem`]; [`AsyncFnSystem`] passes a future-returning
//! closure through unchanged.
//!
//! All systems must be `Send + Sync` to allow execution on worker threads.
//!
//! ## Failure
//!
//! A body reports failure by returning `Err(ExecutionError)`. Failures do
//! not cancel the stage: successors still run, and the scheduler aggregates
//! every failure with stage and system identity attached.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::app::access::AccessSets;
use crate::app::world::World;
use crate::ecs::error::ExecutionError;

/// Completion value of a system body.
pub type SystemResult = Result<(), ExecutionError>;

/// Boxed body future returned by [`System::run`].
pub type SystemFuture = Pin<Box<dyn Future<Output = SystemResult> + Send + 'static>>;

/// A unit of executable logic operating on the world.
///
/// Systems must be `Send + Sync` so they can be scheduled and executed in
/// parallel across threads.
pub trait System: Send + Sync {
    /// Human-readable name, used in failure reports and logs.
    fn name(&self) -> &'static str;

    /// Declared access sets, used to build the stage dependency DAG.
    fn access(&self) -> AccessSets;

    /// Produces the body future for one execution.
    fn run(self: Arc<Self>, world: World) -> SystemFuture;
}

/// A [`System`] backed by a synchronous function or closure.
///
/// The body executes on the pool worker that polls the wrapping future.
pub struct FnSystem<F> {
    name: &'static str,
    access: AccessSets,
    body: F,
}

impl<F> FnSystem<F>
where
    F: Fn(&World) -> SystemResult + Send + Sync + 'static,
{
    /// Creates a new function-backed system.
    ///
    /// # Parameters
    /// - `name`: Human-readable name for diagnostics.
    /// - `access`: Declared access sets used for scheduling.
    /// - `body`: The function executed when the system runs.
    pub fn new(name: &'static str, access: AccessSets, body: F) -> Self {
        Self { name, access, body }
    }
}

impl<F> System for FnSystem<F>
where
    F: Fn(&World) -> SystemResult + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn access(&self) -> AccessSets {
        self.access.clone()
    }

    fn run(self: Arc<Self>, world: World) -> SystemFuture {
        Box::pin(async move { (self.body)(&world) })
    }
}

/// A [`System`] backed by a future-returning function or closure.
///
/// The preferred form for bodies that suspend, e.g. to migrate onto the
/// pool mid-body or to join spawned tasks.
pub struct AsyncFnSystem<F> {
    name: &'static str,
    access: AccessSets,
    body: F,
}

impl<F, Fut> AsyncFnSystem<F>
where
    F: Fn(World) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SystemResult> + Send + 'static,
{
    /// Creates a new future-backed system.
    pub fn new(name: &'static str, access: AccessSets, body: F) -> Self {
        Self { name, access, body }
    }
}

impl<F, Fut> System for AsyncFnSystem<F>
where
    F: Fn(World) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SystemResult> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn access(&self) -> AccessSets {
        self.access.clone()
    }

    fn run(self: Arc<Self>, world: World) -> SystemFuture {
        Box::pin((self.body)(world))
    }
}
