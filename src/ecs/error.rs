//! Error types for the registry, storage, and execution layers.
//!
//! This module declares focused, composable error types used across the
//! entity-component storage pipeline and the execution layer. Each error
//! carries enough context to make failures actionable while remaining small
//! and cheap to pass around or convert into the aggregate [`EcsError`].
//!
//! ## Goals
//! * **Specificity:** Each error type models a single failure mode (e.g.
//!   stale entity handles, duplicate component insertion, column type
//!   mismatches).
//! * **Ergonomics:** All errors implement [`std::error::Error`] and
//!   [`fmt::Display`], and provide `From<T>` conversions into [`EcsError`].
//! * **Actionability:** Structured fields (offending identifiers, expected
//!   vs. actual types) make logs useful without reproducing the issue.
//!
//! ## Typical flow
//! Low-level storage operations return small, dedicated error types (e.g.
//! [`ColumnError`]). Higher-level orchestration code uses `?` to bubble
//! failures into [`EcsError`], which callers can match on for control flow.
//!
//! ## Display vs. Debug
//! * [`fmt::Display`] is optimized for operator logs (short, imperative
//!   phrasing).
//! * [`fmt::Debug`] (derived) retains full structure for diagnostics.

use std::any::TypeId;
use std::fmt;

use crate::ecs::types::{ComponentId, EntityId, RowId, ViewId};

/// Result alias for fallible ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;

/// Errors produced by the global component registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// The component capacity was exhausted.
    CapacityExceeded {
        /// Configured maximum number of component types.
        cap: usize,
    },

    /// A registry lock was poisoned by a panicking thread.
    PoisonedLock,

    /// No storage factory was installed for a component ID.
    MissingFactory {
        /// Offending component ID.
        component_id: ComponentId,
    },

    /// A zero-sized type was used as a component.
    ZeroSizedComponent {
        /// Runtime type identifier of the offending type.
        type_id: TypeId,
    },

    /// The archetype capacity was exhausted.
    ArchetypeCapacityExceeded,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::CapacityExceeded { cap } => {
                write!(f, "component capacity exceeded (cap {})", cap)
            }
            RegistryError::PoisonedLock => f.write_str("component registry lock poisoned"),
            RegistryError::MissingFactory { component_id } => {
                write!(f, "no storage factory for component {}", component_id)
            }
            RegistryError::ZeroSizedComponent { .. } => {
                f.write_str("zero-sized types cannot be used as components")
            }
            RegistryError::ArchetypeCapacityExceeded => {
                f.write_str("archetype capacity exceeded")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Returned when an entity handle does not refer to a live entity.
///
/// ## Context
/// Entity identifiers are recycled without generation counters; holding a
/// handle past `destroy` is a logic error of the caller. This error is the
/// soft, result-value form of that violation at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityError {
    /// The entity is not currently alive.
    NotAlive {
        /// Offending entity identifier.
        entity: EntityId,
    },
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityError::NotAlive { entity } => {
                write!(f, "entity {} is not alive", entity)
            }
        }
    }
}

impl std::error::Error for EntityError {}

/// Structural errors involving the component set of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentError {
    /// The component was added to an entity that already bears it.
    DuplicateComponent {
        /// Offending component ID.
        component_id: ComponentId,
    },

    /// The entity's archetype does not contain the requested component.
    MissingComponent {
        /// Requested component ID.
        component_id: ComponentId,
    },

    /// A component value bundle named the same component more than once.
    DuplicateInBundle,
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentError::DuplicateComponent { component_id } => {
                write!(f, "component {} already present on entity", component_id)
            }
            ComponentError::MissingComponent { component_id } => {
                write!(f, "component {} not present on entity", component_id)
            }
            ComponentError::DuplicateInBundle => {
                f.write_str("component bundle names the same component twice")
            }
        }
    }
}

impl std::error::Error for ComponentError {}

/// Errors produced by type-erased column operations.
///
/// These generally indicate internal inconsistencies or violated invariants
/// rather than recoverable user-facing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnError {
    /// A row index addressed storage outside valid bounds.
    RowOutOfBounds {
        /// Row index that was addressed.
        row: RowId,
        /// Number of valid rows in the column.
        length: usize,
    },

    /// The dynamic type of a value did not match the column element type.
    TypeMismatch {
        /// Destination column's declared element type.
        expected: TypeId,
        /// Provided value's dynamic type.
        actual: TypeId,
    },
}

impl fmt::Display for ColumnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnError::RowOutOfBounds { row, length } => {
                write!(f, "row {} out of bounds (length {})", row, length)
            }
            ColumnError::TypeMismatch { expected, actual } => {
                write!(f, "type mismatch: expected {:?}, actual {:?}", expected, actual)
            }
        }
    }
}

impl std::error::Error for ColumnError {}

/// Errors raised during view resolution or iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewError {
    /// The view identifier does not refer to a registered view.
    UnknownView {
        /// Offending view identifier.
        view: ViewId,
    },

    /// The view capacity was exhausted.
    CapacityExceeded,
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewError::UnknownView { view } => write!(f, "unknown view {}", view),
            ViewError::CapacityExceeded => f.write_str("view capacity exceeded"),
        }
    }
}

impl std::error::Error for ViewError {}

/// Errors involving process-wide resources (globals, event channels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// No resource of the requested type is installed.
    Missing {
        /// Rust type name of the requested resource.
        name: &'static str,
    },

    /// The resource identifier capacity was exhausted.
    CapacityExceeded,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Missing { name } => write!(f, "resource {} not installed", name),
            ResourceError::CapacityExceeded => f.write_str("resource capacity exceeded"),
        }
    }
}

impl std::error::Error for ResourceError {}

/// Errors raised while executing system bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The runtime conflict check observed an access not covered by the
    /// declared access sets of the concurrently running systems.
    AccessConflict {
        /// Component whose borrow state was violated.
        component_id: ComponentId,
    },

    /// A system body reported a failure value.
    Failed {
        /// Human-readable failure description.
        message: String,
    },

    /// An internal scheduling invariant was violated.
    InvariantViolation(&'static str),
}

impl ExecutionError {
    /// Creates a system-body failure value.
    #[inline]
    pub fn failure(message: impl Into<String>) -> Self {
        ExecutionError::Failed { message: message.into() }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::AccessConflict { component_id } => {
                write!(f, "undeclared concurrent access to component {}", component_id)
            }
            ExecutionError::Failed { message } => write!(f, "system failed: {}", message),
            ExecutionError::InvariantViolation(what) => {
                write!(f, "scheduler invariant violated: {}", what)
            }
        }
    }
}

impl std::error::Error for ExecutionError {}

/// Aggregate error for all ECS operations.
///
/// Conversions (`From<T>`) are implemented for the focused error types so
/// callers can write `?` and still return a single, expressive type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Component registry failure.
    Registry(RegistryError),

    /// Entity handle failure.
    Entity(EntityError),

    /// Structural component-set failure.
    Component(ComponentError),

    /// Type-erased column failure.
    Column(ColumnError),

    /// View resolution failure.
    View(ViewError),

    /// Process-wide resource failure.
    Resource(ResourceError),

    /// System execution failure.
    Execution(ExecutionError),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::Registry(e) => write!(f, "{e}"),
            EcsError::Entity(e) => write!(f, "{e}"),
            EcsError::Component(e) => write!(f, "{e}"),
            EcsError::Column(e) => write!(f, "{e}"),
            EcsError::View(e) => write!(f, "{e}"),
            EcsError::Resource(e) => write!(f, "{e}"),
            EcsError::Execution(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EcsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EcsError::Registry(e) => Some(e),
            EcsError::Entity(e) => Some(e),
            EcsError::Component(e) => Some(e),
            EcsError::Column(e) => Some(e),
            EcsError::View(e) => Some(e),
            EcsError::Resource(e) => Some(e),
            EcsError::Execution(e) => Some(e),
        }
    }
}

impl From<RegistryError> for EcsError {
    fn from(e: RegistryError) -> Self {
        EcsError::Registry(e)
    }
}

impl From<EntityError> for EcsError {
    fn from(e: EntityError) -> Self {
        EcsError::Entity(e)
    }
}

impl From<ComponentError> for EcsError {
    fn from(e: ComponentError) -> Self {
        EcsError::Component(e)
    }
}

impl From<ColumnError> for EcsError {
    fn from(e: ColumnError) -> Self {
        EcsError::Column(e)
    }
}

impl From<ViewError> for EcsError {
    fn from(e: ViewError) -> Self {
        EcsError::View(e)
    }
}

impl From<ResourceError> for EcsError {
    fn from(e: ResourceError) -> Self {
        EcsError::Resource(e)
    }
}

impl From<ExecutionError> for EcsError {
    fn from(e: ExecutionError) -> Self {
        EcsError::Execution(e)
    }
}
