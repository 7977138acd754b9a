//! Shared world handle.
//!
//! [`World`] bundles the entity registry, the process-wide resource map, the
//! event bus and the thread pool behind one cheaply clonable handle. System
//! bodies receive a `World` and reach everything through it.
//!
//! ## Resource access discipline
//!
//! Like the registry, the resource map hands out references through `&self`:
//! installation serializes on an exclusive mutex, while `global` /
//! `global_mut` rely on the caller's declared resource accesses. A system
//! that takes `&mut T` without declaring a write of `T` is racing; declare
//! accesses faithfully.

use std::any::{type_name, Any, TypeId};
use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::ecs::error::{EcsResult, RegistryError, ResourceError};
use crate::ecs::registry::EntityRegistry;
use crate::events::EventBus;
use crate::parallel::pool::ThreadPool;

struct Globals {
    map: UnsafeCell<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    exclusive: Mutex<()>,
}

// Safety: shared access to the map is governed by the exclusive mutex
// (installation) and the declared-access discipline (lookup); values are
// `Send + Sync`.
unsafe impl Send for Globals {}
unsafe impl Sync for Globals {}

impl Globals {
    fn new() -> Self {
        Self {
            map: UnsafeCell::new(HashMap::new()),
            exclusive: Mutex::new(()),
        }
    }

    fn set<T: Any + Send + Sync>(&self, value: T) -> EcsResult<()> {
        let _guard = self
            .exclusive
            .lock()
            .map_err(|_| RegistryError::PoisonedLock)?;
        // Safety: the exclusive mutex serializes all map mutation; callers
        // must not install resources while systems are running.
        let map = unsafe { &mut *self.map.get() };
        map.insert(TypeId::of::<T>(), Box::new(value));
        Ok(())
    }

    fn get<T: Any + Send + Sync>(&self) -> EcsResult<&T> {
        // Safety: shared observation; see module documentation.
        let map = unsafe { &*self.map.get() };
        map.get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
            .ok_or_else(|| ResourceError::Missing { name: type_name::<T>() }.into())
    }

    #[allow(clippy::mut_from_ref)]
    fn get_mut<T: Any + Send + Sync>(&self) -> EcsResult<&mut T> {
        // Safety: the caller's declared write access excludes concurrent
        // readers and writers of this resource.
        let map = unsafe { &mut *self.map.get() };
        map.get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
            .ok_or_else(|| ResourceError::Missing { name: type_name::<T>() }.into())
    }
}

struct WorldInner {
    registry: EntityRegistry,
    globals: Globals,
    pool: ThreadPool,
}

/// Cheaply clonable handle over the registry, resources, events and pool.
#[derive(Clone)]
pub struct World {
    inner: Arc<WorldInner>,
}

impl World {
    /// Creates a world around the given thread pool, with an [`EventBus`]
    /// pre-installed as a resource.
    pub fn new(pool: ThreadPool) -> EcsResult<Self> {
        let world = Self {
            inner: Arc::new(WorldInner {
                registry: EntityRegistry::new(),
                globals: Globals::new(),
                pool,
            }),
        };
        world.set_global(EventBus::new())?;
        Ok(world)
    }

    /// Entity and component storage.
    #[inline]
    pub fn registry(&self) -> &EntityRegistry {
        &self.inner.registry
    }

    /// The thread pool executing this world's systems.
    #[inline]
    pub fn pool(&self) -> &ThreadPool {
        &self.inner.pool
    }

    /// Installs (or replaces) the process-wide resource of type `T`.
    ///
    /// Must not be called while systems are running.
    pub fn set_global<T: Any + Send + Sync>(&self, value: T) -> EcsResult<()> {
        self.inner.globals.set(value)
    }

    /// Shared reference to the process-wide resource of type `T`.
    pub fn global<T: Any + Send + Sync>(&self) -> EcsResult<&T> {
        self.inner.globals.get::<T>()
    }

    /// Exclusive reference to the process-wide resource of type `T`.
    ///
    /// The caller's declared access set must cover a write of the resource.
    #[allow(clippy::mut_from_ref)]
    pub fn global_mut<T: Any + Send + Sync>(&self) -> EcsResult<&mut T> {
        self.inner.globals.get_mut::<T>()
    }

    /// The event bus resource.
    #[inline]
    pub fn events(&self) -> EcsResult<&EventBus> {
        self.global::<EventBus>()
    }

    /// Exclusive access to the event bus, for subscription changes.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    pub fn events_mut(&self) -> EcsResult<&mut EventBus> {
        self.global_mut::<EventBus>()
    }
}
