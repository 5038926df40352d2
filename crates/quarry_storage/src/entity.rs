//! Entity allocation with generational indices.
//!
//! The `EntityStore` hands out entity handles and tracks generations
//! to detect stale references to destroyed entities.

use quarry_foundation::{Entity, Error, Result};

/// Per-index bookkeeping.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct Slot {
    /// Generation of the current (or next) occupant.
    generation: u32,
    /// Whether the slot is occupied.
    alive: bool,
}

/// Allocates entity handles and tracks their liveness.
///
/// Freed indices go onto a LIFO free list so recently released slots are
/// reused first. Freeing bumps the slot's generation, so a recycled index is
/// handed out with a strictly greater generation than any earlier handle.
#[derive(Clone, Debug, Default)]
pub struct EntityStore {
    slots: Vec<Slot>,
    /// Free list of indices available for reuse.
    free_list: Vec<u32>,
    /// Count of live entities.
    live_count: usize,
}

impl EntityStore {
    /// Creates a new empty entity store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with room for `capacity` slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            live_count: 0,
        }
    }

    /// Allocates a new entity handle.
    ///
    /// Reuses indices from the free list when available; the handle carries
    /// the slot's current generation.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX - 1` slots are created.
    pub fn allocate(&mut self) -> Entity {
        self.live_count += 1;

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            Entity::new(index, slot.generation)
        } else {
            let index = u32::try_from(self.slots.len())
                .ok()
                .filter(|i| *i != u32::MAX)
                .expect("entity index space exhausted");
            self.slots.push(Slot {
                generation: 0,
                alive: true,
            });
            Entity::new(index, 0)
        }
    }

    /// Frees an entity handle.
    ///
    /// A slot whose generation has reached `u32::MAX` is retired instead of
    /// recycled, so no handle it ever issued can become valid again.
    ///
    /// # Errors
    ///
    /// Returns `StaleHandle` if the generation does not match the slot, or
    /// `UnknownEntity` if the handle was never allocated or is already free.
    pub fn free(&mut self, entity: Entity) -> Result<()> {
        self.validate(entity)?;

        let slot = &mut self.slots[entity.index as usize];
        slot.alive = false;
        self.live_count -= 1;
        if let Some(next) = slot.generation.checked_add(1) {
            slot.generation = next;
            self.free_list.push(entity.index);
        }

        Ok(())
    }

    /// Checks if a handle refers to a live entity. Never fails.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation)
    }

    /// Validates that a handle refers to a live entity.
    ///
    /// # Errors
    ///
    /// Returns `StaleHandle` on a generation mismatch and `UnknownEntity`
    /// when the index was never allocated or the slot is free.
    pub fn validate(&self, entity: Entity) -> Result<()> {
        let Some(slot) = self.slots.get(entity.index as usize) else {
            return Err(Error::unknown_entity(entity));
        };

        if slot.generation != entity.generation {
            // Despawned, and possibly reused since
            return Err(Error::stale_handle(entity));
        }

        if !slot.alive {
            return Err(Error::unknown_entity(entity));
        }

        Ok(())
    }

    /// Returns the total number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live_count
    }

    /// Returns true if there are no live entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Number of slots ever created, live or free.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Iterates over all live entity handles in index order.
    #[allow(clippy::cast_possible_truncation)]
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.alive)
            .map(|(index, slot)| Entity::new(index as u32, slot.generation))
    }

    /// Returns the current generation for an index, if it exists.
    #[must_use]
    pub fn generation(&self, index: u32) -> Option<u32> {
        self.slots.get(index as usize).map(|slot| slot.generation)
    }
}
