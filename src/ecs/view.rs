//! Views and the view-archetype graph.
//!
//! A view is a registered query over a component set: it caches the list of
//! archetype identifiers whose component set is a **superset** of the
//! queried set. The graph keeps that relation in sync as views and
//! archetypes are created; both are arena-indexed by ID, so neither side
//! holds back-pointers into the other.
//!
//! ## Invariants
//! - For every registered view `v` and live archetype `a`:
//!   `a ∈ v.archetypes ⇔ a.signature ⊇ v.signature`.
//! - If an archetype's signature equals the view's exactly, it occupies
//!   index 0 of the view's archetype list.
//!
//! Both maintenance operations are O(|views| * |archetypes|) worst case and
//! run only at structure time, which is rare relative to iteration.

use std::collections::HashMap;

use crate::ecs::archetype::Archetype;
use crate::ecs::error::{EcsResult, ViewError};
use crate::ecs::types::{ArchetypeId, Signature, ViewId, SIGNATURE_SIZE};

/// A registered query over a component set.
pub struct View {
    view_id: ViewId,
    signature: Signature,
    archetypes: Vec<ArchetypeId>,
}

impl View {
    /// Identifier of this view.
    #[inline]
    pub fn id(&self) -> ViewId {
        self.view_id
    }

    /// Queried component signature.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Matching archetypes; the exact-match archetype, if any, is first.
    #[inline]
    pub fn archetypes(&self) -> &[ArchetypeId] {
        &self.archetypes
    }

    #[inline]
    fn push_match(&mut self, archetype_id: ArchetypeId, archetype_signature: &Signature) {
        self.archetypes.push(archetype_id);

        if *archetype_signature == self.signature {
            // Always put the exact match first in the list. This makes the
            // common single-archetype iteration faster.
            let last = self.archetypes.len() - 1;
            self.archetypes.swap(0, last);
        }
    }
}

/// Bidirectional index between views and archetypes.
#[derive(Default)]
pub struct ArchetypeGraph {
    views: Vec<View>,
    view_map: HashMap<[u64; SIGNATURE_SIZE], ViewId>,
}

impl ArchetypeGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered views.
    #[inline]
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Returns the view with the given identifier, if registered.
    #[inline]
    pub fn view(&self, view_id: ViewId) -> Option<&View> {
        self.views.get(view_id as usize)
    }

    /// Resolves the view for `signature`, registering it on first use.
    ///
    /// ## Behavior
    /// A freshly registered view scans the live archetypes and records every
    /// superset match, placing an exact match at index 0.
    pub fn view_for_signature(
        &mut self,
        signature: Signature,
        archetypes: &[Archetype],
    ) -> EcsResult<ViewId> {
        if let Some(&view_id) = self.view_map.get(&signature.components) {
            return Ok(view_id);
        }

        let view_id =
            ViewId::try_from(self.views.len()).map_err(|_| ViewError::CapacityExceeded)?;

        let mut view = View {
            view_id,
            signature,
            archetypes: Vec::new(),
        };
        for archetype in archetypes {
            if archetype.signature().contains_all(&signature) {
                view.push_match(archetype.id(), archetype.signature());
            }
        }

        self.view_map.insert(signature.components, view_id);
        self.views.push(view);

        Ok(view_id)
    }

    /// Records a freshly created archetype in every matching view.
    pub fn add_archetype(&mut self, archetype_id: ArchetypeId, signature: &Signature) {
        for view in &mut self.views {
            if signature.contains_all(&view.signature) {
                view.push_match(archetype_id, signature);
            }
        }
    }

    /// Drops all archetype matches, keeping registered views.
    ///
    /// Used by world resets: views survive for the world's lifetime, but the
    /// archetypes they referenced are gone.
    pub fn clear_archetypes(&mut self) {
        for view in &mut self.views {
            view.archetypes.clear();
        }
    }
}
