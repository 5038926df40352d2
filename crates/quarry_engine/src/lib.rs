//! Queries, deferred commands, and hierarchy helpers for Quarry.
//!
//! This crate provides:
//! - [`QueryState`] - Cached archetype matching and typed iteration
//! - [`Access`] - Declared read/write sets for conflict auditing
//! - [`CommandBuffer`] - Deferred structural changes applied at a sync point
//! - [`HierarchyExt`] - Parent/child links layered on components and resources

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod access;
pub mod command;
pub mod hierarchy;
pub mod query;

pub use access::Access;
pub use command::{
    ApplyReport, ChildBuilder, CommandBuffer, CommandFailure, CommandKind, CommandSender,
    EntityCommands, ProvisionalEntity, Target,
};
pub use hierarchy::{Hierarchy, HierarchyExt, Parent};
pub use query::{
    QueryData, QueryExt, QueryFilter, QueryIter, QueryState, ReadOnlyQueryData, With, Without,
};
