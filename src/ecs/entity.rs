//! # Entity Management
//!
//! This module defines entity identity and the identifier lifecycle used by
//! the ECS.
//!
//! ## Purpose
//! Entities are lightweight, opaque identifiers that reference rows in
//! archetype storage. This module is responsible for:
//!
//! - Generating dense entity identifiers
//! - Recycling released identifiers through a LIFO free list
//! - Describing where an entity's component row lives
//!
//! ## Entity Model
//! An [`Entity`] is a bare dense index. Identifiers are drawn from a
//! monotonically increasing sequence; released identifiers are recycled
//! before new ones are generated. There are no generation counters: any use
//! of a stale handle is a logic error of the caller, and identifiers are not
//! stable across world resets.
//!
//! ## Invariants
//! - Every identifier in the free list is smaller than the high-water mark.
//! - `circulating == high_water - |free list|`.
//!
//! ## Concurrency
//! [`EntityManager`] provides no concurrency guarantees; the registry
//! serializes callers through its structural mutation path.

use crate::ecs::types::{ArchetypeId, EntityId, RowId};

/// Opaque identifier for an ECS entity.
///
/// `Entity` values are cheap to copy and compare and are safe to pass across
/// threads. Two live entities never share an identifier; identifiers are
/// reused after `destroy`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Entity(pub EntityId);

impl Entity {
    /// Returns the dense index of this entity.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical storage location of an entity within archetype storage.
///
/// ## Invariants
/// - Must always reflect the true location of the entity's component row:
///   the archetype's entity column holds this entity at `row`.
/// - Updated together with every archetype row move.
/// - Invalidated immediately on destroy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityLocation {
    /// Archetype containing the entity.
    pub archetype: ArchetypeId,

    /// Row index within the archetype.
    pub row: RowId,
}

/// Provides and recycles entity identifiers.
///
/// ## Design
/// - New identifiers come from a monotonically increasing sequence starting
///   at zero.
/// - Released identifiers are pushed on a LIFO free list and handed out
///   again before the sequence advances.
///
/// ## Concurrency
/// Not thread-safe; callers serialize.
#[derive(Default)]
pub struct EntityManager {
    current: EntityId,
    recycled: Vec<EntityId>,
}

impl EntityManager {
    /// Creates an empty manager with the sequence at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Obtains a unique entity identifier.
    ///
    /// Recycled identifiers are returned first; otherwise a new identifier
    /// is generated from the sequence.
    #[inline]
    pub fn obtain(&mut self) -> Entity {
        match self.recycled.pop() {
            Some(id) => Entity(id),
            None => self.generate(),
        }
    }

    /// Generates a new entity identifier, ignoring the free list.
    ///
    /// Fetches the current sequence value and increments it.
    #[inline]
    pub fn generate(&mut self) -> Entity {
        let id = self.current;
        self.current += 1;
        Entity(id)
    }

    /// Releases an entity identifier, allowing it to be reused.
    ///
    /// ## Preconditions
    /// `entity` must have been obtained from this manager and not already
    /// released. Checked by `debug_assert!` only.
    #[inline]
    pub fn release(&mut self, entity: Entity) {
        debug_assert!(entity.0 < self.current, "entity not from this manager");
        self.recycled.push(entity.0);
    }

    /// Releases all identifiers and resets the sequence to zero. O(1).
    ///
    /// This should be preferred to releasing every entity one by one.
    pub fn release_all(&mut self) {
        self.recycled.clear();
        self.current = 0;
    }

    /// Amount of entity identifiers currently circulating.
    #[inline]
    pub fn circulating(&self) -> usize {
        self.current as usize - self.recycled.len()
    }

    /// Amount of entity identifiers ready to be reused.
    ///
    /// While this is bigger than zero, no new identifier will be generated
    /// when obtaining unless explicitly generated.
    #[inline]
    pub fn recycled(&self) -> usize {
        self.recycled.len()
    }
}
