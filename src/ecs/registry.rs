//! # Entity registry
//!
//! This module defines the world-facing storage API of the ECS, responsible
//! for:
//!
//! * owning archetypes and their component columns,
//! * minting and recycling entity identifiers,
//! * coordinating entity movement between archetypes,
//! * resolving views and keeping the archetype graph in sync,
//! * executing typed row iteration over views.
//!
//! ## Concurrency model
//!
//! All methods take `&self`. Structural mutations (create, destroy, add,
//! remove, view registration) serialize on an internal exclusive mutex and
//! go through a documented interior-mutability cell. Data access paths
//! (`get`, `get_mut`, `for_each`) take **no locks**: correctness
//! is the scheduler's access discipline, which only runs systems with
//! conflicting declared accesses sequentially.
//!
//! Because a mis-declared access set is the one way user code can produce a
//! data race, the registry carries an optional runtime conflict check (on by
//! default in debug builds) that turns undeclared concurrent accesses into
//! [`ExecutionError::AccessConflict`](crate::ecs::error::ExecutionError).
//!
//! ## Safety model
//!
//! * Structural mutation happens only behind the exclusive mutex.
//! * Raw column pointers are derived per archetype and never outlive the
//!   iteration that bound them.
//! * Iteration must not observe structural mutation; the scheduler's access
//!   discipline enforces this, not runtime locking.

use std::any::Any;
use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::ecs::archetype::Archetype;
use crate::ecs::borrow::{BorrowGuard, BorrowTracker};
use crate::ecs::component::component_id_of;
use crate::ecs::entity::{Entity, EntityLocation, EntityManager};
use crate::ecs::error::{
    ComponentError, EcsResult, EntityError, ExecutionError, RegistryError, ViewError,
};
use crate::ecs::storage::Column;
use crate::ecs::types::{
    ArchetypeId, ComponentId, RowId, Signature, ViewId, COMPONENT_CAP, SIGNATURE_SIZE,
};
use crate::ecs::view::ArchetypeGraph;

/// A group of component values spawned together as one row.
///
/// Implemented for tuples of up to eight component types. The empty tuple is
/// a valid (componentless) bundle.
pub trait ComponentSet: 'static {
    /// Component signature of the bundle.
    fn signature() -> EcsResult<Signature>;

    /// Consumes the bundle into type-erased `(id, value)` pairs.
    fn take(self) -> EcsResult<Vec<(ComponentId, Box<dyn Any>)>>;
}

/// A component set queried by type only, used to resolve views.
///
/// Implemented for tuples of up to eight component types.
pub trait ComponentQuery: 'static {
    /// Component signature of the query.
    fn signature() -> EcsResult<Signature>;
}

impl ComponentSet for () {
    fn signature() -> EcsResult<Signature> {
        Ok(Signature::default())
    }

    fn take(self) -> EcsResult<Vec<(ComponentId, Box<dyn Any>)>> {
        Ok(Vec::new())
    }
}

impl ComponentQuery for () {
    fn signature() -> EcsResult<Signature> {
        Ok(Signature::default())
    }
}

macro_rules! impl_component_tuples {
    ($(($T:ident, $index:tt)),+) => {
        impl<$($T: 'static + Send + Sync),+> ComponentSet for ($($T,)+) {
            fn signature() -> EcsResult<Signature> {
                let mut signature = Signature::default();
                $( signature.set(component_id_of::<$T>()?); )+
                Ok(signature)
            }

            fn take(self) -> EcsResult<Vec<(ComponentId, Box<dyn Any>)>> {
                Ok(vec![
                    $( (component_id_of::<$T>()?, Box::new(self.$index) as Box<dyn Any>), )+
                ])
            }
        }

        impl<$($T: 'static + Send + Sync),+> ComponentQuery for ($($T,)+) {
            fn signature() -> EcsResult<Signature> {
                let mut signature = Signature::default();
                $( signature.set(component_id_of::<$T>()?); )+
                Ok(signature)
            }
        }
    };
}

impl_component_tuples!((A, 0));
impl_component_tuples!((A, 0), (B, 1));
impl_component_tuples!((A, 0), (B, 1), (C, 2));
impl_component_tuples!((A, 0), (B, 1), (C, 2), (D, 3));
impl_component_tuples!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_component_tuples!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_component_tuples!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_component_tuples!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7));

struct RegistryInner {
    entities: EntityManager,
    locations: Vec<Option<EntityLocation>>,
    archetypes: Vec<Archetype>,
    archetype_map: HashMap<[u64; SIGNATURE_SIZE], ArchetypeId>,
    graph: ArchetypeGraph,
}

impl RegistryInner {
    fn location(&self, entity: Entity) -> EcsResult<EntityLocation> {
        self.locations
            .get(entity.index())
            .copied()
            .flatten()
            .ok_or_else(|| EntityError::NotAlive { entity: entity.0 }.into())
    }

    fn set_location(&mut self, entity: Entity, location: EntityLocation) {
        let index = entity.index();
        if index >= self.locations.len() {
            self.locations.resize(index + 1, None);
        }
        self.locations[index] = Some(location);
    }

    fn set_row(&mut self, entity: Entity, row: RowId) {
        debug_assert!(
            matches!(self.locations.get(entity.index()), Some(Some(_))),
            "row patched for a dead entity"
        );
        if let Some(Some(location)) = self.locations.get_mut(entity.index()) {
            location.row = row;
        }
    }

    fn resolve_or_create_archetype(&mut self, signature: Signature) -> EcsResult<ArchetypeId> {
        if let Some(&archetype_id) = self.archetype_map.get(&signature.components) {
            return Ok(archetype_id);
        }

        let archetype_id = ArchetypeId::try_from(self.archetypes.len())
            .map_err(|_| RegistryError::ArchetypeCapacityExceeded)?;
        let archetype = Archetype::new(archetype_id, signature)?;

        self.archetype_map.insert(signature.components, archetype_id);
        self.archetypes.push(archetype);
        self.graph.add_archetype(archetype_id, &signature);

        Ok(archetype_id)
    }

    /// Source and destination archetype as a disjoint mutable pair.
    #[inline]
    fn archetype_pair_mut(
        &mut self,
        archetype_a: ArchetypeId,
        archetype_b: ArchetypeId,
    ) -> (&mut Archetype, &mut Archetype) {
        assert!(
            archetype_a != archetype_b,
            "source and destination archetype must differ"
        );
        let (left, right) = if archetype_a < archetype_b {
            (archetype_a, archetype_b)
        } else {
            (archetype_b, archetype_a)
        };

        let (head, tail) = self.archetypes.split_at_mut(right as usize);
        let left_reference = &mut head[left as usize];
        let right_reference = &mut tail[0];
        if archetype_a < archetype_b {
            (left_reference, right_reference)
        } else {
            (right_reference, left_reference)
        }
    }
}

/// Archetype-based entity and component storage.
///
/// See the module documentation for the concurrency and safety model.
pub struct EntityRegistry {
    inner: UnsafeCell<RegistryInner>,
    structural: Mutex<()>,
    tracker: BorrowTracker,
    conflict_check: AtomicBool,
}

// Safety: shared access to `inner` is governed by the structural mutex
// (mutation) and the scheduler's access discipline (iteration); the cell
// adds no sharing beyond what the contained collections allow.
unsafe impl Send for EntityRegistry {}
unsafe impl Sync for EntityRegistry {}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRegistry {
    /// Creates an empty registry.
    ///
    /// The runtime conflict check defaults to on in debug builds.
    pub fn new() -> Self {
        Self {
            inner: UnsafeCell::new(RegistryInner {
                entities: EntityManager::new(),
                locations: Vec::new(),
                archetypes: Vec::new(),
                archetype_map: HashMap::new(),
                graph: ArchetypeGraph::new(),
            }),
            structural: Mutex::new(()),
            tracker: BorrowTracker::new(COMPONENT_CAP),
            conflict_check: AtomicBool::new(cfg!(debug_assertions)),
        }
    }

    /// Enables or disables the runtime conflict check.
    pub fn set_conflict_check(&self, enabled: bool) {
        self.conflict_check.store(enabled, Ordering::Release);
    }

    #[inline]
    fn inner_shared(&self) -> &RegistryInner {
        // Safety: shared observation; structural mutators hold the
        // exclusive mutex and, per the scheduler discipline, never run
        // concurrently with access paths that observe the same rows.
        unsafe { &*self.inner.get() }
    }

    fn with_structural<R>(
        &self,
        f: impl FnOnce(&mut RegistryInner) -> EcsResult<R>,
    ) -> EcsResult<R> {
        let _guard = self
            .structural
            .lock()
            .map_err(|_| RegistryError::PoisonedLock)?;
        // Safety: the structural mutex serializes all mutable access.
        let inner = unsafe { &mut *self.inner.get() };
        f(inner)
    }

    fn access_guard(
        &self,
        reads: &[ComponentId],
        writes: &[ComponentId],
    ) -> EcsResult<Option<BorrowGuard<'_>>> {
        if self.conflict_check.load(Ordering::Acquire) {
            Ok(Some(BorrowGuard::new(&self.tracker, reads, writes)?))
        } else {
            Ok(None)
        }
    }

    // ── Structural operations ───────────────────────────────────────────

    /// Creates an entity bearing the given component bundle.
    ///
    /// ## Behavior
    /// Mints an entity identifier (recycled first), resolves or creates the
    /// archetype for the bundle's component set, pushes the values as a new
    /// row and records the entity's location.
    ///
    /// ## Errors
    /// `ComponentError::DuplicateInBundle` if the bundle names a component
    /// type twice.
    pub fn create<B: ComponentSet>(&self, bundle: B) -> EcsResult<Entity> {
        let signature = B::signature()?;
        let values = bundle.take()?;
        if signature.count() != values.len() {
            return Err(ComponentError::DuplicateInBundle.into());
        }

        self.with_structural(move |inner| {
            let archetype_id = inner.resolve_or_create_archetype(signature)?;
            let entity = inner.entities.obtain();
            let row = inner.archetypes[archetype_id as usize].push_row(entity, values)?;
            inner.set_location(entity, EntityLocation { archetype: archetype_id, row });
            Ok(entity)
        })
    }

    /// Destroys an entity, dropping its components.
    ///
    /// Performs a swap-remove in the entity's archetype, patches the index
    /// of the entity that filled the vacated row and releases the
    /// identifier for reuse.
    pub fn destroy(&self, entity: Entity) -> EcsResult<()> {
        self.with_structural(|inner| {
            let location = inner.location(entity)?;
            let moved =
                inner.archetypes[location.archetype as usize].swap_remove_row(location.row)?;
            if let Some(moved_entity) = moved {
                inner.set_row(moved_entity, location.row);
            }
            inner.locations[entity.index()] = None;
            inner.entities.release(entity);
            Ok(())
        })
    }

    /// Adds component `T` to an entity, migrating it to the destination
    /// archetype.
    ///
    /// ## Errors
    /// `ComponentError::DuplicateComponent` if the entity already bears `T`.
    pub fn add<T: 'static + Send + Sync>(&self, entity: Entity, value: T) -> EcsResult<()> {
        let component_id = component_id_of::<T>()?;

        self.with_structural(move |inner| {
            let location = inner.location(entity)?;
            let source_id = location.archetype;
            if inner.archetypes[source_id as usize].has(component_id) {
                return Err(ComponentError::DuplicateComponent { component_id }.into());
            }

            let mut signature = *inner.archetypes[source_id as usize].signature();
            signature.set(component_id);
            let destination_id = inner.resolve_or_create_archetype(signature)?;

            let (source, destination) = inner.archetype_pair_mut(source_id, destination_id);
            let (destination_row, moved) = source.move_row_to(
                destination,
                location.row,
                Some((component_id, Box::new(value))),
            )?;

            if let Some(moved_entity) = moved {
                inner.set_row(moved_entity, location.row);
            }
            inner.set_location(
                entity,
                EntityLocation { archetype: destination_id, row: destination_row },
            );
            Ok(())
        })
    }

    /// Removes component `T` from an entity.
    ///
    /// Removing a component the entity does not bear is a no-op.
    pub fn remove<T: 'static + Send + Sync>(&self, entity: Entity) -> EcsResult<()> {
        let component_id = component_id_of::<T>()?;

        self.with_structural(|inner| {
            let location = inner.location(entity)?;
            let source_id = location.archetype;
            if !inner.archetypes[source_id as usize].has(component_id) {
                return Ok(());
            }

            let mut signature = *inner.archetypes[source_id as usize].signature();
            signature.clear(component_id);
            let destination_id = inner.resolve_or_create_archetype(signature)?;

            let (source, destination) = inner.archetype_pair_mut(source_id, destination_id);
            let (destination_row, moved) = source.move_row_to(destination, location.row, None)?;

            if let Some(moved_entity) = moved {
                inner.set_row(moved_entity, location.row);
            }
            inner.set_location(
                entity,
                EntityLocation { archetype: destination_id, row: destination_row },
            );
            Ok(())
        })
    }

    /// Resolves the view for component query `Q`, registering it on first
    /// use. Views remain registered for the world's lifetime.
    pub fn view_for<Q: ComponentQuery>(&self) -> EcsResult<ViewId> {
        let signature = Q::signature()?;
        self.with_structural(|inner| inner.graph.view_for_signature(signature, &inner.archetypes))
    }

    /// Destroys all entities and archetypes and resets the identifier
    /// sequence. Registered views survive with empty match lists.
    ///
    /// Entity identifiers are **not** stable across this call.
    pub fn clear(&self) -> EcsResult<()> {
        self.with_structural(|inner| {
            inner.entities.release_all();
            inner.locations.clear();
            inner.archetypes.clear();
            inner.archetype_map.clear();
            inner.graph.clear_archetypes();
            Ok(())
        })
    }

    // ── Lookup ──────────────────────────────────────────────────────────

    /// Returns `true` if the entity is currently alive.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.inner_shared().location(entity).is_ok()
    }

    /// Amount of entity identifiers currently circulating.
    pub fn circulating(&self) -> usize {
        self.inner_shared().entities.circulating()
    }

    /// Amount of entity identifiers awaiting reuse.
    pub fn recycled(&self) -> usize {
        self.inner_shared().entities.recycled()
    }

    /// Number of live archetypes.
    pub fn archetype_count(&self) -> usize {
        self.inner_shared().archetypes.len()
    }

    /// Identifier of the archetype currently holding an entity.
    pub fn archetype_of(&self, entity: Entity) -> EcsResult<ArchetypeId> {
        Ok(self.inner_shared().location(entity)?.archetype)
    }

    /// Archetype identifiers matched by a view, exact match first.
    pub fn view_archetypes(&self, view: ViewId) -> EcsResult<Vec<ArchetypeId>> {
        let inner = self.inner_shared();
        let view = inner
            .graph
            .view(view)
            .ok_or(ViewError::UnknownView { view })?;
        Ok(view.archetypes().to_vec())
    }

    /// Shared reference to component `T` of an entity.
    ///
    /// ## Errors
    /// `EntityError::NotAlive` for dead entities and
    /// `ComponentError::MissingComponent` if the entity's archetype does not
    /// bear `T`.
    pub fn get<T: 'static + Send + Sync>(&self, entity: Entity) -> EcsResult<&T> {
        let component_id = component_id_of::<T>()?;
        let inner = self.inner_shared();
        let location = inner.location(entity)?;
        let archetype = &inner.archetypes[location.archetype as usize];
        let column = archetype
            .typed_column_for::<T>(component_id)
            .ok_or(ComponentError::MissingComponent { component_id })?;
        // Safety: the location invariant guarantees the row is in bounds;
        // concurrent writers are excluded by the scheduler discipline.
        Ok(unsafe { column.row_ref(location.row) })
    }

    /// Exclusive reference to component `T` of an entity.
    ///
    /// The caller's declared access set must cover a write of `T`; this is
    /// not checked here (single-element accesses stay outside the runtime
    /// conflict check to keep them allocation- and lock-free).
    #[allow(clippy::mut_from_ref)]
    pub fn get_mut<T: 'static + Send + Sync>(&self, entity: Entity) -> EcsResult<&mut T> {
        let component_id = component_id_of::<T>()?;
        let inner = self.inner_shared();
        let location = inner.location(entity)?;
        let archetype = &inner.archetypes[location.archetype as usize];
        let column = archetype
            .typed_column_for::<T>(component_id)
            .ok_or(ComponentError::MissingComponent { component_id })?;
        // Safety: as `get`, plus the declared-write discipline excludes
        // concurrent readers of this column.
        Ok(unsafe { column.row_mut(location.row) })
    }
}

// ── Typed iteration ─────────────────────────────────────────────────────

/// One typed column access of an iteration pack.
///
/// Implemented by the [`Read`] and [`Write`] markers; an accessor names the
/// component it binds, whether it writes, and how a row of the bound column
/// becomes a reference.
pub trait Accessor {
    /// Component type bound by this accessor.
    type Component: 'static + Send + Sync;

    /// Reference handed to the closure for one row.
    type Item<'a>;

    /// Whether this accessor takes exclusive access.
    const WRITES: bool;

    /// Produces the row reference.
    ///
    /// ## Safety
    /// `row` must be in bounds, and the caller must uphold the aliasing
    /// contract of `Item`: no concurrent writer for a read item, no other
    /// accessor of the same column at all for a write item.
    unsafe fn item<'a>(column: &'a Column<Self::Component>, row: RowId) -> Self::Item<'a>;
}

/// Marks a component as read-only in an accessor pack.
pub struct Read<T>(PhantomData<T>);

/// Marks a component as written in an accessor pack.
pub struct Write<T>(PhantomData<T>);

impl<T: 'static + Send + Sync> Accessor for Read<T> {
    type Component = T;
    type Item<'a> = &'a T;
    const WRITES: bool = false;

    unsafe fn item<'a>(column: &'a Column<T>, row: RowId) -> &'a T {
        // Safety: forwarded contract.
        unsafe { column.row_ref(row) }
    }
}

impl<T: 'static + Send + Sync> Accessor for Write<T> {
    type Component = T;
    type Item<'a> = &'a mut T;
    const WRITES: bool = true;

    unsafe fn item<'a>(column: &'a Column<T>, row: RowId) -> &'a mut T {
        // Safety: forwarded contract.
        unsafe { column.row_mut(row) }
    }
}

/// A tuple of accessors iterated together over a view.
///
/// Implemented for tuples of [`Read`] / [`Write`] markers up to arity 4.
/// The closure passed to [`EntityRegistry::for_each`] receives the entity
/// and the tuple of row references.
pub trait AccessorSet {
    /// Tuple of row references for one entity.
    type Item<'a>;

    /// `(component, writes)` pairs of the pack, in accessor order.
    fn component_accesses() -> EcsResult<Vec<(ComponentId, bool)>>;

    /// Visits every row of one archetype.
    ///
    /// ## Safety
    /// The caller must guarantee that no accessor pair of this pack writes
    /// the same component (aliasing) and that the scheduler discipline
    /// excludes conflicting concurrent systems. Every component of the pack
    /// must be present in `archetype`.
    unsafe fn visit<'a, F>(archetype: &'a Archetype, f: &mut F) -> EcsResult<()>
    where
        F: FnMut(Entity, Self::Item<'a>);
}

macro_rules! impl_accessor_set {
    ($(($A:ident, $column:ident)),+) => {
        impl<$($A: Accessor),+> AccessorSet for ($($A,)+) {
            type Item<'a> = ($($A::Item<'a>,)+);

            fn component_accesses() -> EcsResult<Vec<(ComponentId, bool)>> {
                Ok(vec![
                    $( (component_id_of::<$A::Component>()?, $A::WRITES), )+
                ])
            }

            unsafe fn visit<'a, F>(archetype: &'a Archetype, f: &mut F) -> EcsResult<()>
            where
                F: FnMut(Entity, Self::Item<'a>),
            {
                let length = archetype.len();
                if length == 0 {
                    return Ok(());
                }
                $(
                    let $column = {
                        let component_id = component_id_of::<$A::Component>()?;
                        archetype
                            .typed_column_for::<$A::Component>(component_id)
                            .ok_or(ComponentError::MissingComponent { component_id })?
                    };
                )+
                let entities = archetype.entities();
                for row in 0..length {
                    // Safety: row < length; aliasing and discipline are the
                    // caller's contract.
                    let item = ($( unsafe { $A::item($column, row as RowId) }, )+);
                    f(entities[row], item);
                }
                Ok(())
            }
        }
    };
}

impl_accessor_set!((A0, column0));
impl_accessor_set!((A0, column0), (A1, column1));
impl_accessor_set!((A0, column0), (A1, column1), (A2, column2));
impl_accessor_set!((A0, column0), (A1, column1), (A2, column2), (A3, column3));

impl EntityRegistry {
    /// Visits every entity of the view with the accessor pack `A`.
    ///
    /// ## Behavior
    /// For each archetype matched by the view (exact match first), binds one
    /// typed column per accessor and walks rows `0..len`, invoking `f` with
    /// the entity and the tuple of row references. Accessor components must
    /// be part of the view's queried set; superset archetypes always bear
    /// them.
    ///
    /// ```ignore
    /// registry.for_each::<(Read<Velocity>, Write<Position>), _>(view, |_, (v, p)| {
    ///     p.x += v.dx;
    /// })?;
    /// ```
    ///
    /// ## Errors
    /// A pack that names the same component twice with at least one write
    /// would alias one column within a single item and is rejected with
    /// `ExecutionError::AccessConflict` in every build, independent of the
    /// runtime conflict check. Iteration must not observe structural
    /// mutation; that is the scheduler's access discipline, not a runtime
    /// lock.
    pub fn for_each<'w, A, F>(&'w self, view: ViewId, mut f: F) -> EcsResult<()>
    where
        A: AccessorSet,
        F: FnMut(Entity, A::Item<'w>),
    {
        let accesses = A::component_accesses()?;

        // Repeating a component is only sound when every occurrence reads.
        let mut sorted = accesses.clone();
        sorted.sort_unstable_by_key(|&(component_id, _)| component_id);
        for pair in sorted.windows(2) {
            if pair[0].0 == pair[1].0 && (pair[0].1 || pair[1].1) {
                return Err(ExecutionError::AccessConflict { component_id: pair[0].0 }.into());
            }
        }

        let mut reads = Vec::new();
        let mut writes = Vec::new();
        for &(component_id, is_write) in &accesses {
            if is_write {
                writes.push(component_id);
            } else {
                reads.push(component_id);
            }
        }
        let _guard = self.access_guard(&reads, &writes)?;

        let inner = self.inner_shared();
        let view = inner
            .graph
            .view(view)
            .ok_or(ViewError::UnknownView { view })?;

        for &archetype_id in view.archetypes() {
            let archetype = &inner.archetypes[archetype_id as usize];
            // Safety: the duplicate check above rejects aliasing writes
            // within the pack; across systems the scheduler discipline
            // applies.
            unsafe { A::visit(archetype, &mut f)? };
        }
        Ok(())
    }
}
