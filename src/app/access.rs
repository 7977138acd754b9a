//! System access declarations.
//!
//! A system declares, at registration time, the component types and
//! process-wide resources it reads and writes. The scheduler derives its
//! dependency DAG from these declarations alone: two systems conflict iff
//! they share a component or resource where at least one side writes.
//!
//! Mis-declared access is the only way user code can produce a data race;
//! the registry's runtime conflict check exists to surface that bug.
//!
//! ## Resource identity
//!
//! Resources (globals, the event bus) are identified by type: a process-wide
//! registry mints a dense [`ResourceId`] per type on first use, mirroring
//! component identity.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::ecs::component::component_id_of;
use crate::ecs::error::{EcsResult, RegistryError, ResourceError};
use crate::ecs::types::Signature;

/// Unique identifier for a process-wide resource type.
pub type ResourceId = u16;

static RESOURCES: OnceLock<RwLock<HashMap<TypeId, ResourceId>>> = OnceLock::new();

fn resource_registry() -> &'static RwLock<HashMap<TypeId, ResourceId>> {
    RESOURCES.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Returns the [`ResourceId`] for type `T`, minting one on first use.
pub fn resource_id_of<T: 'static>() -> EcsResult<ResourceId> {
    {
        let registry = resource_registry()
            .read()
            .map_err(|_| RegistryError::PoisonedLock)?;
        if let Some(&id) = registry.get(&TypeId::of::<T>()) {
            return Ok(id);
        }
    }

    let mut registry = resource_registry()
        .write()
        .map_err(|_| RegistryError::PoisonedLock)?;
    if let Some(&id) = registry.get(&TypeId::of::<T>()) {
        return Ok(id);
    }
    let id =
        ResourceId::try_from(registry.len()).map_err(|_| ResourceError::CapacityExceeded)?;
    registry.insert(TypeId::of::<T>(), id);
    Ok(id)
}

#[inline]
fn insert_sorted(ids: &mut Vec<ResourceId>, id: ResourceId) {
    if let Err(position) = ids.binary_search(&id) {
        ids.insert(position, id);
    }
}

#[inline]
fn sorted_intersect(a: &[ResourceId], b: &[ResourceId]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return true,
        }
    }
    false
}

/// Declares the component and resource access set of a system.
///
/// Built with the explicit builder methods; there is no parameter-type
/// reflection. Correctness of scheduling depends on the faithfulness of the
/// declaration.
#[derive(Clone, Debug, Default)]
pub struct AccessSets {
    /// Components read by the system.
    pub component_reads: Signature,

    /// Components written by the system.
    pub component_writes: Signature,

    /// Resources read by the system, sorted ascending.
    pub resource_reads: Vec<ResourceId>,

    /// Resources written by the system, sorted ascending.
    pub resource_writes: Vec<ResourceId>,
}

impl AccessSets {
    /// Creates an empty access set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a read of component type `T`.
    pub fn reads<T: 'static + Send + Sync>(mut self) -> EcsResult<Self> {
        self.component_reads.set(component_id_of::<T>()?);
        Ok(self)
    }

    /// Declares a write of component type `T`.
    pub fn writes<T: 'static + Send + Sync>(mut self) -> EcsResult<Self> {
        self.component_writes.set(component_id_of::<T>()?);
        Ok(self)
    }

    /// Declares a read of resource type `T`.
    pub fn reads_resource<T: 'static>(mut self) -> EcsResult<Self> {
        insert_sorted(&mut self.resource_reads, resource_id_of::<T>()?);
        Ok(self)
    }

    /// Declares a write of resource type `T`.
    pub fn writes_resource<T: 'static>(mut self) -> EcsResult<Self> {
        insert_sorted(&mut self.resource_writes, resource_id_of::<T>()?);
        Ok(self)
    }

    /// Returns `true` if this access set conflicts with another.
    ///
    /// Conflict = a shared component or resource where at least one side
    /// writes: `(W ∩ W) or (W ∩ R) or (R ∩ W)`.
    pub fn conflicts_with(&self, other: &AccessSets) -> bool {
        for (((a_write, a_read), b_write), b_read) in self
            .component_writes
            .components
            .iter()
            .zip(self.component_reads.components.iter())
            .zip(other.component_writes.components.iter())
            .zip(other.component_reads.components.iter())
        {
            if (a_write & b_write) != 0 || (a_write & b_read) != 0 || (a_read & b_write) != 0 {
                return true;
            }
        }

        sorted_intersect(&self.resource_writes, &other.resource_writes)
            || sorted_intersect(&self.resource_writes, &other.resource_reads)
            || sorted_intersect(&self.resource_reads, &other.resource_writes)
    }
}
