//! # Borrow Tracking Module
//!
//! This module implements a **per-component read/write borrow tracker**.
//!
//! ## Purpose
//!
//! Mis-declared access sets are the only way for user code to produce a data
//! race: the scheduler serializes systems by their *declared* accesses, so a
//! body touching an undeclared component can race a concurrent system. The
//! tracker is the runtime conflict-check option that turns such races into
//! immediate errors:
//!
//! - Multiple systems may **read** the same component type concurrently.
//! - Only one system may **write** to a component type at a time.
//! - No system may read a component type while another system writes it.
//!
//! ## State Encoding
//!
//! Each component ID maps to one `AtomicUsize` with the following meaning:
//!
//! | State | Meaning |
//! |------:|--------|
//! | `0` | Unlocked |
//! | `1` | Write-locked (exclusive writer) |
//! | `>= 2` | Read-locked (`state - 1` active readers) |
//!
//! ## Synchronization Strategy
//!
//! Acquisition never blocks: a conflicting state is reported as
//! [`ExecutionError::AccessConflict`] instead of waiting, since under a
//! correct schedule the conflicting holder would be another *undeclared*
//! accessor and waiting could deadlock.
//!
//! ## RAII Integration
//!
//! The [`BorrowGuard`] type provides RAII-style acquisition and release of
//! multiple component borrows for the full lifetime of an iteration.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ecs::error::ExecutionError;
use crate::ecs::types::ComponentId;

/// Tracks runtime read/write borrows for each component type.
pub struct BorrowTracker {
    /// Per-component atomic borrow state.
    states: Vec<AtomicUsize>,
}

impl BorrowTracker {
    /// Creates a new tracker with `capacity` unlocked slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            states: (0..capacity).map(|_| AtomicUsize::new(0)).collect(),
        }
    }

    /// Acquires a **shared (read) borrow** for the given component.
    ///
    /// ## State Transitions
    ///
    /// - `0 → 2` : first reader
    /// - `N → N+1` : additional reader
    ///
    /// ## Errors
    /// `ExecutionError::AccessConflict` if the component is write-locked.
    pub fn acquire_read(&self, component_id: ComponentId) -> Result<(), ExecutionError> {
        let state = &self.states[component_id as usize];

        loop {
            let current = state.load(Ordering::Acquire);
            if current == 1 {
                return Err(ExecutionError::AccessConflict { component_id });
            }

            let next = if current == 0 { 2 } else { current + 1 };
            if state
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(());
            }
            std::hint::spin_loop();
        }
    }

    /// Releases a previously acquired **shared (read) borrow**.
    ///
    /// Assumes a matching `acquire_read` call.
    pub fn release_read(&self, component_id: ComponentId) {
        let state = &self.states[component_id as usize];
        let previous = state.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous >= 2);
        if previous == 2 {
            state.store(0, Ordering::Release);
        }
    }

    /// Acquires an **exclusive (write) borrow** for the given component.
    ///
    /// ## State Transition
    ///
    /// - `0 → 1`
    ///
    /// ## Errors
    /// `ExecutionError::AccessConflict` if any reader or writer is present.
    pub fn acquire_write(&self, component_id: ComponentId) -> Result<(), ExecutionError> {
        let state = &self.states[component_id as usize];
        if state
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Ok(())
        } else {
            Err(ExecutionError::AccessConflict { component_id })
        }
    }

    /// Releases a previously acquired **exclusive (write) borrow**.
    ///
    /// Must only be called by the holder of the write borrow.
    pub fn release_write(&self, component_id: ComponentId) {
        let state = &self.states[component_id as usize];
        let previous = state.swap(0, Ordering::AcqRel);
        debug_assert!(previous == 1);
    }
}

/// RAII guard representing an iteration's full borrow lifetime.
///
/// When created, this guard acquires all requested write borrows, then all
/// requested read borrows; when dropped, all borrows are released.
///
/// ## Ordering
///
/// Component IDs are deduplicated and sorted before acquisition so that
/// overlapping guards always contend in a consistent order.
pub struct BorrowGuard<'a> {
    tracker: &'a BorrowTracker,
    reads: Vec<ComponentId>,
    writes: Vec<ComponentId>,
}

impl<'a> BorrowGuard<'a> {
    /// Acquires all requested borrows, releasing everything on failure.
    pub fn new(
        tracker: &'a BorrowTracker,
        reads: &[ComponentId],
        writes: &[ComponentId],
    ) -> Result<Self, ExecutionError> {
        let mut reads = reads.to_vec();
        let mut writes = writes.to_vec();
        reads.sort_unstable();
        writes.sort_unstable();
        reads.dedup();
        writes.dedup();

        for component_id in &reads {
            if writes.binary_search(component_id).is_ok() {
                return Err(ExecutionError::AccessConflict { component_id: *component_id });
            }
        }

        let mut guard = Self {
            tracker,
            reads: Vec::new(),
            writes: Vec::new(),
        };

        for &component_id in &writes {
            tracker.acquire_write(component_id)?;
            guard.writes.push(component_id);
        }
        for &component_id in &reads {
            tracker.acquire_read(component_id)?;
            guard.reads.push(component_id);
        }

        Ok(guard)
    }
}

impl Drop for BorrowGuard<'_> {
    /// Releases all acquired borrows in reverse order.
    fn drop(&mut self) {
        for &component_id in self.reads.iter().rev() {
            self.tracker.release_read(component_id);
        }
        for &component_id in self.writes.iter().rev() {
            self.tracker.release_write(component_id);
        }
    }
}
