//! World configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Capacity hints for a [`World`](crate::World).
///
/// None of these limit growth; they only size the initial allocations.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WorldConfig {
    /// Entity slots to reserve up front.
    pub entity_capacity: usize,

    /// Archetype slots to reserve up front.
    pub archetype_capacity: usize,

    /// Rows to reserve in every newly created archetype.
    pub rows_per_archetype: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 0,
            archetype_capacity: 16,
            rows_per_archetype: 0,
        }
    }
}

impl WorldConfig {
    /// Configuration for worlds expected to hold about `entities` entities
    /// spread over a handful of archetypes.
    #[must_use]
    pub fn preallocated(entities: usize) -> Self {
        Self {
            entity_capacity: entities,
            archetype_capacity: 64,
            rows_per_archetype: entities / 8,
        }
    }

    /// Builder method to set the entity capacity.
    #[must_use]
    pub fn with_entity_capacity(mut self, capacity: usize) -> Self {
        self.entity_capacity = capacity;
        self
    }

    /// Builder method to set the archetype capacity.
    #[must_use]
    pub fn with_archetype_capacity(mut self, capacity: usize) -> Self {
        self.archetype_capacity = capacity;
        self
    }

    /// Builder method to set the per-archetype row reservation.
    #[must_use]
    pub fn with_rows_per_archetype(mut self, rows: usize) -> Self {
        self.rows_per_archetype = rows;
        self
    }
}
