//! Integration tests for Layer 1: Storage
//!
//! Tests for entity allocation, component moves, archetypes, and resources.

mod components;
mod entities;
mod resources;
mod world;
