//! Archetype column groups.
//!
//! An archetype is the set of component types borne by an entity; two
//! entities share an archetype iff their component sets are equal. The
//! archetype owns one dense column per component plus one column of entity
//! identifiers, all sharing the same length and ordering.
//!
//! ## Invariants
//! - `forall c in columns: c.length() == entities.len()`.
//! - `component_ids` is sorted ascending and matches `signature` exactly.
//! - Rows are reshuffled only by swap-remove (entity destruction or
//!   migration between archetypes).
//!
//! ## Concurrency
//! Structural mutation requires `&mut self` and is serialized by the
//! registry's exclusive path. Shared iteration over rows happens through
//! raw column pointers under the scheduler's access discipline.

use std::any::Any;

use crate::ecs::component::make_empty_column;
use crate::ecs::entity::Entity;
use crate::ecs::error::{ColumnError, ComponentError, EcsResult};
use crate::ecs::storage::{typed_column, AnyColumn, Column};
use crate::ecs::types::{ArchetypeId, ComponentId, RowId, Signature};

/// Column group for one component set.
pub struct Archetype {
    archetype_id: ArchetypeId,
    signature: Signature,
    component_ids: Vec<ComponentId>,
    entities: Vec<Entity>,
    columns: Vec<Box<dyn AnyColumn>>,
}

impl Archetype {
    /// Creates an empty archetype for `signature`, allocating one column per
    /// component through the registry's storage factories.
    pub fn new(archetype_id: ArchetypeId, signature: Signature) -> EcsResult<Self> {
        let component_ids: Vec<ComponentId> = signature.iterate_over_components().collect();
        let mut columns = Vec::with_capacity(component_ids.len());
        for &component_id in &component_ids {
            columns.push(make_empty_column(component_id)?);
        }

        Ok(Self {
            archetype_id,
            signature,
            component_ids,
            entities: Vec::new(),
            columns,
        })
    }

    /// Identifier of this archetype.
    #[inline]
    pub fn id(&self) -> ArchetypeId {
        self.archetype_id
    }

    /// Component signature of this archetype.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Component IDs in ascending order.
    #[inline]
    pub fn component_ids(&self) -> &[ComponentId] {
        &self.component_ids
    }

    /// Number of entities stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entities are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity identifier column.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Returns `true` if the archetype bears `component_id`.
    #[inline]
    pub fn has(&self, component_id: ComponentId) -> bool {
        self.signature.has(component_id)
    }

    #[inline]
    fn column_index(&self, component_id: ComponentId) -> Option<usize> {
        self.component_ids.binary_search(&component_id).ok()
    }

    /// Type-erased column for `component_id`, if present.
    #[inline]
    pub fn column_for(&self, component_id: ComponentId) -> Option<&dyn AnyColumn> {
        self.column_index(component_id)
            .map(|index| self.columns[index].as_ref())
    }

    /// Typed column for `component_id`, if present and of element type `T`.
    #[inline]
    pub(crate) fn typed_column_for<T: 'static>(
        &self,
        component_id: ComponentId,
    ) -> Option<&Column<T>> {
        self.column_for(component_id).and_then(typed_column::<T>)
    }

    /// Appends a full row.
    ///
    /// ## Behavior
    /// `values` must provide exactly one value per component of this
    /// archetype (in any order). On success every column grows by one and
    /// the entity column records `entity` at the returned row.
    ///
    /// ## Errors
    /// `ComponentError::MissingComponent` if a value names a component this
    /// archetype does not bear. Column misalignment is a fatal internal
    /// invariant violation checked by `debug_assert!`.
    pub fn push_row(
        &mut self,
        entity: Entity,
        values: Vec<(ComponentId, Box<dyn Any>)>,
    ) -> EcsResult<RowId> {
        debug_assert_eq!(
            values.len(),
            self.component_ids.len(),
            "row must cover the full component set"
        );

        let row = self.entities.len() as RowId;
        for (component_id, value) in values {
            let index = self
                .column_index(component_id)
                .ok_or(ComponentError::MissingComponent { component_id })?;
            let pushed = self.columns[index].push_erased(value)?;
            debug_assert_eq!(pushed, row, "component columns misaligned");
        }
        self.entities.push(entity);

        Ok(row)
    }

    /// Swap-removes the row, dropping its component values.
    ///
    /// Returns the entity that now occupies `row` (the previous last row),
    /// if any, so the caller can patch the entity index.
    pub fn swap_remove_row(&mut self, row: RowId) -> EcsResult<Option<Entity>> {
        let length = self.entities.len();
        if (row as usize) >= length {
            return Err(ColumnError::RowOutOfBounds { row, length }.into());
        }

        for column in &mut self.columns {
            column.swap_remove(row)?;
        }
        self.entities.swap_remove(row as usize);

        Ok(self.entities.get(row as usize).copied())
    }

    /// Migrates the row at `row` into `destination`.
    ///
    /// ## Behavior
    /// - Every component shared with `destination` is moved across.
    /// - Components absent from `destination` are dropped.
    /// - `added`, if present, supplies the value for one component that
    ///   `destination` bears and this archetype does not.
    ///
    /// Returns the destination row together with the entity that moved into
    /// the vacated source row, if any.
    pub fn move_row_to(
        &mut self,
        destination: &mut Archetype,
        row: RowId,
        added: Option<(ComponentId, Box<dyn Any>)>,
    ) -> EcsResult<(RowId, Option<Entity>)> {
        let length = self.entities.len();
        if (row as usize) >= length {
            return Err(ColumnError::RowOutOfBounds { row, length }.into());
        }
        debug_assert_ne!(self.archetype_id, destination.archetype_id);

        let destination_row = destination.entities.len() as RowId;

        for index in 0..self.component_ids.len() {
            let component_id = self.component_ids[index];
            match destination.column_index(component_id) {
                Some(destination_index) => {
                    let moved_to = self.columns[index]
                        .move_row_into(destination.columns[destination_index].as_mut(), row)?;
                    debug_assert_eq!(moved_to, destination_row, "component columns misaligned");
                }
                None => {
                    // Component not carried over; the value is dropped.
                    self.columns[index].swap_remove(row)?;
                }
            }
        }

        if let Some((component_id, value)) = added {
            let index = destination
                .column_index(component_id)
                .ok_or(ComponentError::MissingComponent { component_id })?;
            let pushed = destination.columns[index].push_erased(value)?;
            debug_assert_eq!(pushed, destination_row, "component columns misaligned");
        }

        let entity = self.entities.swap_remove(row as usize);
        destination.entities.push(entity);

        Ok((destination_row, self.entities.get(row as usize).copied()))
    }
}
