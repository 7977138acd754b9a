//! # Axion
//!
//! Game-engine runtime core built around an archetype-based
//! Entity-Component-System world coupled with a work-stealing task pool and
//! an awaitable composition layer.
//!
//! ## Design Goals
//! - Archetype-based columnar storage for cache efficiency
//! - Lazily-started, awaitable tasks with exactly-once completion
//! - Work-stealing execution with spin-then-park wake semantics
//! - Stage scheduling with dependencies inferred from declared data access
//!
//! ## Typical flow
//!
//! The host registers component types, systems (grouped by stage tags) and
//! initial entities through [`App`], enqueues stage executions and drains
//! them on the scheduler:
//!
//! ```no_run
//! use axion::{App, AccessSets, FnSystem, Write};
//!
//! struct Update;
//!
//! #[derive(Clone, Copy)]
//! struct Health(u32);
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut app = App::new()?;
//! app.registry().create((Health(10),))?;
//!
//! let view = app.registry().view_for::<(Health,)>()?;
//! app.add_system::<Update>(FnSystem::new(
//!     "heal",
//!     AccessSets::new().writes::<Health>()?,
//!     move |world| {
//!         world
//!             .registry()
//!             .for_each::<(Write<Health>,), _>(view, |_, (health,)| health.0 += 1)
//!             .map_err(|e| axion::ExecutionError::failure(e.to_string()))
//!     },
//! ))?;
//!
//! app.schedule::<Update>()?;
//! app.run().map_err(|e| e.to_string())?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod app;
pub mod ecs;
pub mod events;
pub mod parallel;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

// Core ECS types

pub use ecs::entity::{Entity, EntityLocation, EntityManager};

pub use ecs::component::{component_description, component_id_of, ComponentDesc};

pub use ecs::registry::{
    Accessor, AccessorSet, ComponentQuery, ComponentSet, EntityRegistry, Read, Write,
};

pub use ecs::types::{
    ArchetypeId, ComponentId, EntityId, RowId, Signature, ViewId, COMPONENT_CAP,
};

pub use ecs::error::{
    ColumnError, ComponentError, EcsError, EcsResult, EntityError, ExecutionError,
    RegistryError, ResourceError, ViewError,
};

// Async layer

pub use parallel::pool::{Schedule, ThreadPool};
pub use parallel::sync_wait::sync_wait;
pub use parallel::task::Task;
pub use parallel::when_all::{when_all, when_all_ready, when_all_ready_vec, when_all_vec};

// Events

pub use events::{EventBus, EventHandlerId};

// Application layer

pub use app::access::{resource_id_of, AccessSets, ResourceId};
pub use app::error::{ScheduleFailures, SystemFailure};
pub use app::schedule::{stage_id_of, StageId, SystemSchedule};
pub use app::system::{AsyncFnSystem, FnSystem, System, SystemFuture, SystemResult};
pub use app::world::World;
pub use app::{App, Package};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude (Optional but recommended)
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used engine types.
///
/// Import with:
/// ```rust
/// use axion::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        sync_wait, when_all, when_all_ready, AccessSets, App, AsyncFnSystem, EcsResult, Entity,
        EntityRegistry, EventBus, ExecutionError, FnSystem, Package, Read, System, SystemResult,
        Task, ThreadPool, World, Write,
    };
}
