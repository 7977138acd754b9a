//! Core ECS Types, Identifiers, and Bit-Level Layouts
//!
//! This module defines the **fundamental types, identifiers, and signatures**
//! shared across all subsystems of the engine, including entity management,
//! archetype storage, views, and the system scheduler.
//!
//! ## Design Philosophy
//!
//! The ECS is designed around:
//!
//! - **Dense storage**
//! - **Bitset-based signatures**
//! - **Stable numeric identifiers**
//! - **Explicit access declaration**
//!
//! To support these goals efficiently, this module:
//!
//! - Uses small, copyable numeric IDs for all ECS concepts,
//! - Represents component sets as fixed-size bit arrays,
//! - Avoids heap allocation in hot paths.
//!
//! ## Entity Representation
//!
//! Entities are plain dense indices drawn from a monotonically increasing
//! sequence with a LIFO free list of recycled identifiers. There is no
//! generation counter: a stale entity reference is a logic error of the
//! caller, and identifiers are not stable across world resets.
//!
//! ## Archetypes and Components
//!
//! Components are identified by compact [`ComponentId`] values. Archetypes
//! are described by [`Signature`] bitsets indicating which components they
//! contain. Component signatures:
//!
//! - are fixed-size arrays of `u64`,
//! - support fast bitwise comparison,
//! - allow efficient iteration over set bits,
//! - are used for both archetype identity and view matching.

/// Dense entity identifier.
pub type EntityId = u32;

/// Unique identifier for an archetype.
pub type ArchetypeId = u16;

/// Row index within an archetype's column group.
pub type RowId = u32;

/// Unique identifier for a component type.
pub type ComponentId = u16;

/// Unique identifier for a registered view.
pub type ViewId = u16;

/// Maximum number of registered component types.
pub const COMPONENT_CAP: usize = 4096;

/// Number of `u64` words required to represent a full component signature.
pub const SIGNATURE_SIZE: usize = (COMPONENT_CAP + 63) / 64;

/// Bitset representing a set of components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Packed component bitset.
    pub components: [u64; SIGNATURE_SIZE],
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            components: [0u64; SIGNATURE_SIZE],
        }
    }
}

impl Signature {
    /// Sets the bit corresponding to `component_id`.
    #[inline]
    pub fn set(&mut self, component_id: ComponentId) {
        let index = (component_id as usize) / 64;
        let bits = (component_id as usize) % 64;
        self.components[index] |= 1u64 << bits;
    }

    /// Clears the bit corresponding to `component_id`.
    #[inline]
    pub fn clear(&mut self, component_id: ComponentId) {
        let index = (component_id as usize) / 64;
        let bits = (component_id as usize) % 64;
        self.components[index] &= !(1u64 << bits);
    }

    /// Returns `true` if `component_id` is present in this signature.
    #[inline]
    pub fn has(&self, component_id: ComponentId) -> bool {
        let index = (component_id as usize) / 64;
        let bits = (component_id as usize) % 64;
        (self.components[index] >> bits) & 1 == 1
    }

    /// Returns `true` if all components in `signature` are present.
    #[inline]
    pub fn contains_all(&self, signature: &Signature) -> bool {
        for (component_a, component_b) in self.components.iter().zip(signature.components.iter()) {
            if (component_a & component_b) != *component_b {
                return false;
            }
        }
        true
    }

    /// Returns `true` if no bits are set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.components.iter().all(|&word| word == 0)
    }

    /// Returns the number of set bits.
    #[inline]
    pub fn count(&self) -> usize {
        self.components
            .iter()
            .map(|word| word.count_ones() as usize)
            .sum()
    }

    /// Iterates over all component IDs set in this signature, in ascending order.
    pub fn iterate_over_components(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.components
            .iter()
            .enumerate()
            .flat_map(|(word_index, &word)| {
                let base = word_index * 64;
                let mut bits = word;
                std::iter::from_fn(move || {
                    if bits == 0 {
                        return None;
                    }
                    let tz = bits.trailing_zeros() as usize;
                    bits &= bits - 1;
                    Some((base + tz) as ComponentId)
                })
            })
    }
}

/// Builds a component signature from a list of component IDs.
pub fn build_signature(component_ids: &[ComponentId]) -> Signature {
    let mut signature = Signature::default();
    for &component_id in component_ids {
        signature.set(component_id);
    }
    signature
}
