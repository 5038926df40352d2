//! Error types for the Quarry storage engine.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//! Every error is local and recoverable: an operation that fails leaves
//! the world exactly as it found it.

use std::fmt;

use thiserror::Error;

use crate::entity::Entity;

/// Result alias used throughout Quarry.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The main error type for Quarry operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates a stale handle error.
    #[must_use]
    pub fn stale_handle(entity: Entity) -> Self {
        Self::new(ErrorKind::StaleHandle(entity))
    }

    /// Creates an unknown entity error.
    #[must_use]
    pub fn unknown_entity(entity: Entity) -> Self {
        Self::new(ErrorKind::UnknownEntity(entity))
    }

    /// Creates a missing component error.
    #[must_use]
    pub fn missing_component(entity: Entity, component: &'static str) -> Self {
        Self::new(ErrorKind::MissingComponent { entity, component })
    }

    /// Creates a duplicate component error.
    #[must_use]
    pub fn duplicate_component(entity: Entity, component: &'static str) -> Self {
        Self::new(ErrorKind::DuplicateComponent { entity, component })
    }

    /// Creates a resource not found error.
    #[must_use]
    pub fn resource_not_found(resource: &'static str) -> Self {
        Self::new(ErrorKind::ResourceNotFound(resource))
    }

    /// Creates an access conflict error.
    #[must_use]
    pub fn access_conflict(component: &'static str) -> Self {
        Self::new(ErrorKind::AccessConflict { component })
    }

    /// Creates a query mismatch error.
    #[must_use]
    pub fn query_mismatch(entity: Entity) -> Self {
        Self::new(ErrorKind::QueryMismatch(entity))
    }

    /// Creates an unresolved provisional entity error.
    #[must_use]
    pub fn unresolved_provisional(id: u32) -> Self {
        Self::new(ErrorKind::UnresolvedProvisional(id))
    }

    /// Creates a hierarchy cycle error.
    #[must_use]
    pub fn hierarchy_cycle(child: Entity, parent: Entity) -> Self {
        Self::new(ErrorKind::HierarchyCycle { child, parent })
    }

    /// Returns true if this error reports an invalid entity handle,
    /// whether stale or never allocated.
    #[must_use]
    pub fn is_invalid_entity(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::StaleHandle(_) | ErrorKind::UnknownEntity(_)
        )
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Handle generation does not match the slot (despawned or reused).
    #[error("stale entity handle: {0:?}")]
    StaleHandle(Entity),

    /// Handle was never allocated or is no longer resident.
    #[error("unknown entity: {0:?}")]
    UnknownEntity(Entity),

    /// Component is not present on the entity.
    #[error("component {component} missing on {entity:?}")]
    MissingComponent {
        /// The entity that was addressed.
        entity: Entity,
        /// Type name of the missing component.
        component: &'static str,
    },

    /// Component is already present on the entity.
    #[error("component {component} already present on {entity:?}")]
    DuplicateComponent {
        /// The entity that was addressed.
        entity: Entity,
        /// Type name of the duplicated component.
        component: &'static str,
    },

    /// Resource of this type has not been set.
    #[error("resource not found: {0}")]
    ResourceNotFound(&'static str),

    /// A query declares a write that overlaps another access to the same type.
    #[error("conflicting access to component {component}")]
    AccessConflict {
        /// Type name of the contested component.
        component: &'static str,
    },

    /// Entity exists but its archetype does not satisfy the query.
    #[error("{0:?} does not match the query")]
    QueryMismatch(Entity),

    /// A deferred command referenced a provisional entity whose spawn did not apply.
    #[error("provisional entity #{0} was never spawned")]
    UnresolvedProvisional(u32),

    /// Re-parenting would make an entity its own ancestor.
    #[error("{child:?} cannot be parented to its descendant {parent:?}")]
    HierarchyCycle {
        /// The entity being re-parented.
        child: Entity,
        /// The requested parent.
        parent: Entity,
    },
}

/// Context about where an error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// The operation that failed, e.g. `command #3 (insert)`.
    pub source: Option<String>,
    /// Chain of enclosing operations, innermost first.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: None,
            stack: Vec::new(),
        }
    }

    /// Sets the source operation.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "at {source}")?;
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}
