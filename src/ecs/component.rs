//! # Component Registry
//!
//! This module provides a global registry that assigns stable [`ComponentId`]
//! values to Rust component types and exposes type-erased storage factories
//! for archetype column allocation.
//!
//! ## Purpose
//! The registry decouples component type information (`TypeId`, name, size,
//! alignment) from runtime storage, enabling archetypes to store
//! heterogeneous component columns behind [`AnyColumn`].
//!
//! ## Design
//! - Components are assigned a compact `ComponentId` in `[0, COMPONENT_CAP)`
//!   **on first use** through [`component_id_of`]; there is no explicit
//!   registration step.
//! - A per-component factory function is stored for constructing empty
//!   column storage.
//!
//! ## Invariants
//! - `ComponentId` values are unique and stable for the lifetime of the
//!   process.
//! - A minted component always has a corresponding storage factory.
//!
//! ## Concurrency
//! The registry is protected by `RwLock` for concurrent reads and serialized
//! writes; lock poisoning surfaces as [`RegistryError::PoisonedLock`].

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::mem::{align_of, size_of};
use std::sync::{OnceLock, RwLock};

use crate::ecs::error::{EcsResult, RegistryError};
use crate::ecs::storage::{AnyColumn, Column};
use crate::ecs::types::{ComponentId, COMPONENT_CAP};

/// Factory function for constructing an empty type-erased component column.
pub type ColumnFactory = fn() -> Box<dyn AnyColumn>;

fn new_column_storage<T: 'static + Send + Sync>() -> Box<dyn AnyColumn> {
    Box::new(Column::<T>::new())
}

/// Describes a registered component type.
///
/// ## Fields
/// - `component_id`: The runtime identifier assigned by the registry.
/// - `name`: The Rust type name (`type_name::<T>()`).
/// - `type_id`: The runtime `TypeId` for the component.
/// - `size`: `size_of::<T>()` in bytes.
/// - `align`: `align_of::<T>()` in bytes.
///
/// ## Notes
/// `ComponentDesc` is `Copy` and safe to clone freely for reporting and
/// diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComponentDesc {
    /// Runtime identifier assigned to this component type.
    pub component_id: ComponentId,

    /// Rust type name for diagnostics.
    pub name: &'static str,

    /// Runtime `TypeId` of the component.
    pub type_id: TypeId,

    /// Size of the component type in bytes.
    pub size: usize,

    /// Alignment of the component type in bytes.
    pub align: usize,
}

impl ComponentDesc {
    /// Returns `true` if this descriptor refers to type `T`.
    #[inline]
    pub fn matches_type<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl std::fmt::Display for ComponentDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ComponentDesc {{ id: {}, name: {}, size: {}, align: {} }}",
            self.component_id, self.name, self.size, self.align
        )
    }
}

struct ComponentRegistry {
    next_id: ComponentId,
    by_type: HashMap<TypeId, ComponentId>,
    by_id: Vec<Option<ComponentDesc>>,
    factories: Vec<Option<ColumnFactory>>,
}

static REGISTRY: OnceLock<RwLock<ComponentRegistry>> = OnceLock::new();

fn component_registry() -> &'static RwLock<ComponentRegistry> {
    REGISTRY.get_or_init(|| {
        RwLock::new(ComponentRegistry {
            next_id: 0,
            by_type: HashMap::new(),
            by_id: vec![None; COMPONENT_CAP],
            factories: vec![None; COMPONENT_CAP],
        })
    })
}

impl ComponentRegistry {
    fn mint<T: 'static + Send + Sync>(&mut self) -> Result<ComponentId, RegistryError> {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&type_id) {
            return Ok(existing);
        }

        let id = self.next_id;
        if (id as usize) >= COMPONENT_CAP {
            return Err(RegistryError::CapacityExceeded { cap: COMPONENT_CAP });
        }
        self.next_id = id.wrapping_add(1);

        self.by_type.insert(type_id, id);
        self.by_id[id as usize] = Some(ComponentDesc {
            component_id: id,
            name: type_name::<T>(),
            type_id,
            size: size_of::<T>(),
            align: align_of::<T>(),
        });
        self.factories[id as usize] = Some(new_column_storage::<T>);

        Ok(id)
    }
}

/// Returns the [`ComponentId`] for type `T`, minting one on first use.
///
/// ## Behavior
/// - Fast path: a shared read of the registry resolves types seen before.
/// - Slow path: a write lock mints a fresh identifier and installs the
///   column storage factory for `T`.
///
/// ## Errors
/// - `RegistryError::ZeroSizedComponent` for zero-sized types.
/// - `RegistryError::CapacityExceeded` past [`COMPONENT_CAP`] types.
/// - `RegistryError::PoisonedLock` if the registry lock is poisoned.
pub fn component_id_of<T: 'static + Send + Sync>() -> EcsResult<ComponentId> {
    if size_of::<T>() == 0 {
        return Err(RegistryError::ZeroSizedComponent { type_id: TypeId::of::<T>() }.into());
    }

    {
        let registry = component_registry()
            .read()
            .map_err(|_| RegistryError::PoisonedLock)?;
        if let Some(&id) = registry.by_type.get(&TypeId::of::<T>()) {
            return Ok(id);
        }
    }

    let mut registry = component_registry()
        .write()
        .map_err(|_| RegistryError::PoisonedLock)?;
    Ok(registry.mint::<T>()?)
}

/// Returns the [`ComponentId`] associated with a runtime `TypeId`, if minted.
pub fn component_id_of_type_id(type_id: TypeId) -> EcsResult<Option<ComponentId>> {
    let registry = component_registry()
        .read()
        .map_err(|_| RegistryError::PoisonedLock)?;
    Ok(registry.by_type.get(&type_id).copied())
}

/// Returns a copy of the descriptor for `component_id`, if minted.
pub fn component_description(component_id: ComponentId) -> EcsResult<Option<ComponentDesc>> {
    let registry = component_registry()
        .read()
        .map_err(|_| RegistryError::PoisonedLock)?;
    Ok(registry
        .by_id
        .get(component_id as usize)
        .and_then(|entry| *entry))
}

/// Creates an empty type-erased storage column for `component_id`.
///
/// ## Purpose
/// Used by archetype construction to allocate an empty column for each
/// component in the archetype's signature.
///
/// ## Errors
/// Returns `RegistryError::MissingFactory` if the ID was never minted, and
/// `RegistryError::PoisonedLock` if the registry lock is poisoned.
pub fn make_empty_column(component_id: ComponentId) -> EcsResult<Box<dyn AnyColumn>> {
    let factory = {
        let registry = component_registry()
            .read()
            .map_err(|_| RegistryError::PoisonedLock)?;
        registry
            .factories
            .get(component_id as usize)
            .copied()
            .flatten()
            .ok_or(RegistryError::MissingFactory { component_id })?
    };
    Ok(factory())
}
