//! Archetype tables, component registry, and world state for Quarry.
//!
//! This crate provides:
//! - [`EntityStore`] - Generational entity allocation
//! - [`ComponentRegistry`] - Dense ids for component types
//! - [`Archetype`] - Column storage for one exact component set
//! - [`ResourceStore`] - Singleton values keyed by type
//! - [`World`] - Entities, archetypes, and resources tied together

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod archetype;
pub mod bundle;
pub mod component;
pub mod config;
pub mod entity;
pub mod resource;
pub mod world;

pub use archetype::{Archetype, ArchetypeBorrow, ArchetypeId, Column, TypedColumn};
pub use bundle::Bundle;
pub use component::{Component, ComponentId, ComponentInfo, ComponentRegistry};
pub use config::WorldConfig;
pub use entity::EntityStore;
pub use resource::{Resource, ResourceStore};
pub use world::{EntityLocation, World};
