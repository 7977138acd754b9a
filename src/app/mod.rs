//! # App Module
//!
//! The host-facing execution layer:
//! - Access declarations ([`access::AccessSets`])
//! - The [`system::System`] trait and function-backed helpers
//! - Stage scheduling ([`schedule::SystemSchedule`])
//! - The [`App`] facade tying world, packages and scheduler together
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod access;
pub mod error;
pub mod schedule;
pub mod system;
pub mod world;

use std::any::Any;

use crate::app::error::ScheduleFailures;
use crate::app::schedule::SystemSchedule;
use crate::app::system::System;
use crate::app::world::World;
use crate::ecs::error::EcsResult;
use crate::ecs::registry::EntityRegistry;
use crate::parallel::pool::ThreadPool;
use crate::parallel::sync_wait::sync_wait;
use crate::parallel::task::Task;

/// A bundle of component types, resources and systems installed as a unit.
pub trait Package {
    /// Installs the bundle's contents into the application.
    fn install(self, app: &mut App) -> EcsResult<()>;
}

/// Application facade: owns the shared [`World`] and the system schedule.
///
/// Typical flow: install packages and systems, enqueue stage intents with
/// [`App::schedule`], then drain them with [`App::run_scheduler`] (or the
/// blocking [`App::run`]).
pub struct App {
    world: World,
    schedule: SystemSchedule,
}

impl App {
    /// Creates an application with a default-sized thread pool.
    pub fn new() -> EcsResult<Self> {
        Self::with_pool(ThreadPool::new())
    }

    /// Creates an application around an explicit thread pool.
    pub fn with_pool(pool: ThreadPool) -> EcsResult<Self> {
        Ok(Self {
            world: World::new(pool)?,
            schedule: SystemSchedule::new(),
        })
    }

    /// Installs a package.
    pub fn add_package(&mut self, package: impl Package) -> EcsResult<()> {
        package.install(self)
    }

    /// The shared world handle.
    #[inline]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Entity and component storage.
    #[inline]
    pub fn registry(&self) -> &EntityRegistry {
        self.world.registry()
    }

    /// Installs (or replaces) the process-wide resource of type `T`.
    pub fn set_global<T: Any + Send + Sync>(&mut self, value: T) -> EcsResult<()> {
        self.world.set_global(value)
    }

    /// Exclusive reference to the process-wide resource of type `T`.
    ///
    /// Outside a scheduler run `&mut self` makes this exclusive by
    /// construction; inside a run, resources are reached through the
    /// [`World`] under declared accesses instead.
    pub fn global_mut<T: Any + Send + Sync>(&mut self) -> EcsResult<&mut T> {
        self.world.global_mut::<T>()
    }

    /// Registers a system against stage tag `S`.
    pub fn add_system<S: 'static>(&mut self, system: impl System + 'static) -> EcsResult<()> {
        self.schedule.add_system::<S>(system)
    }

    /// Enqueues an execution intent for stage tag `S`.
    pub fn schedule<S: 'static>(&mut self) -> EcsResult<()> {
        self.schedule.schedule::<S>()
    }

    /// Drains the stage queue, returning an awaitable that completes when
    /// every enqueued stage has fully executed.
    pub fn run_scheduler(&mut self) -> Task<Result<(), ScheduleFailures>> {
        self.schedule.run(&self.world)
    }

    /// Blocking convenience for [`App::run_scheduler`].
    pub fn run(&mut self) -> Result<(), ScheduleFailures> {
        sync_wait(self.run_scheduler())
    }
}
