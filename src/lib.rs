//! Quarry - Archetype-based entity/component storage
//!
//! This crate re-exports all layers of the Quarry system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 2: quarry_engine      - Queries, command buffer, hierarchy helpers
//! Layer 1: quarry_storage     - Entity allocator, component registry, archetypes, resources
//! Layer 0: quarry_foundation  - Core types (Entity, Error)
//! ```
//!
//! # Example
//!
//! ```
//! use quarry::prelude::*;
//!
//! struct Position(f32);
//! struct Velocity(f32);
//!
//! let mut world = World::new();
//! world.spawn((Position(0.0), Velocity(1.0))).unwrap();
//!
//! let mut query = world.query::<(&mut Position, &Velocity)>().unwrap();
//! for (p, v) in query.iter_mut(&mut world) {
//!     p.0 += v.0;
//! }
//! ```

pub use quarry_engine as engine;
pub use quarry_foundation as foundation;
pub use quarry_storage as storage;

/// The types most programs need.
pub mod prelude {
    pub use quarry_engine::{
        CommandBuffer, HierarchyExt, Parent, ProvisionalEntity, QueryExt, QueryState, Target,
        With, Without,
    };
    pub use quarry_foundation::{Entity, Error, ErrorKind, Result};
    pub use quarry_storage::{Bundle, Component, Resource, World, WorldConfig};
}
