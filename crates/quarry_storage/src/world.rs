//! The archetype world.
//!
//! `World` ties together entity allocation, the component registry, the
//! archetype tables, and resources. Every structural operation either
//! completes or fails before touching any state.

use std::any::type_name;
use std::collections::HashMap;

use quarry_foundation::{Entity, Error, Result};
use tracing::{debug, trace};

use crate::archetype::{Archetype, ArchetypeId, RowMove};
use crate::bundle::Bundle;
use crate::component::{Component, ComponentId, ComponentRegistry};
use crate::config::WorldConfig;
use crate::entity::EntityStore;
use crate::resource::{Resource, ResourceStore};

/// Where an entity's row currently lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntityLocation {
    /// The archetype holding the entity.
    pub archetype: ArchetypeId,
    /// The row inside that archetype.
    pub row: usize,
}

/// Entity/component storage organized by archetype.
#[derive(Debug)]
pub struct World {
    /// Entity lifecycle management.
    entities: EntityStore,
    /// Component type identities.
    registry: ComponentRegistry,
    /// Archetype tables, indexed by `ArchetypeId`. Never shrinks.
    archetypes: Vec<Archetype>,
    /// Sorted signature -> archetype.
    archetype_index: HashMap<Box<[ComponentId]>, ArchetypeId>,
    /// Location of each live entity, indexed by entity index.
    locations: Vec<Option<EntityLocation>>,
    /// Singleton values.
    resources: ResourceStore,
    config: WorldConfig,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates an empty world with default capacities.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates an empty world sized by `config`.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        let mut world = Self {
            entities: EntityStore::with_capacity(config.entity_capacity),
            registry: ComponentRegistry::new(),
            archetypes: Vec::with_capacity(config.archetype_capacity),
            archetype_index: HashMap::with_capacity(config.archetype_capacity),
            locations: Vec::with_capacity(config.entity_capacity),
            resources: ResourceStore::new(),
            config,
        };
        let empty = world.archetype_for(Vec::new());
        debug_assert_eq!(empty, ArchetypeId::EMPTY);
        world
    }

    /// The configuration this world was built with.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // =========================================================================
    // Component registry
    // =========================================================================

    /// Registers a component type, returning its stable id.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        self.registry.register::<T>()
    }

    /// The component registry.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// The id of `T`, if registered.
    #[must_use]
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.registry.id::<T>()
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Spawns an entity with the components of `bundle`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateComponent` if the bundle names a type twice; nothing
    /// is allocated in that case.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Result<Entity> {
        let mut ids = Vec::new();
        B::register(&mut self.registry, &mut ids);

        let mut signature = ids.clone();
        signature.sort_unstable();
        if let Some(pair) = signature.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::duplicate_component(
                Entity::null(),
                self.registry.name(pair[0]),
            ));
        }

        let archetype = self.archetype_for(signature);
        let entity = self.entities.allocate();
        let table = &mut self.archetypes[archetype.index()];
        let row = table.push_entity(entity);
        bundle.write(table, &mut ids.iter());

        self.set_location(entity, EntityLocation { archetype, row });
        trace!(?entity, ?archetype, "spawned entity");
        Ok(entity)
    }

    /// Spawns an entity with no components.
    pub fn spawn_empty(&mut self) -> Entity {
        let entity = self.entities.allocate();
        let row = self.archetypes[ArchetypeId::EMPTY.index()].push_entity(entity);
        self.set_location(
            entity,
            EntityLocation {
                archetype: ArchetypeId::EMPTY,
                row,
            },
        );
        entity
    }

    /// Despawns an entity, dropping all of its components.
    ///
    /// # Errors
    ///
    /// Returns `StaleHandle` or `UnknownEntity` if the handle is not live.
    pub fn despawn(&mut self, entity: Entity) -> Result<()> {
        let location = self.locate(entity)?;
        let moved = self.archetypes[location.archetype.index()].swap_remove(location.row);
        self.patch_swapped(moved, location.row);
        self.locations[entity.index as usize] = None;
        self.entities.free(entity)?;
        trace!(?entity, "despawned entity");
        Ok(())
    }

    /// Checks if a handle refers to a live entity.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Iterates live entities in index order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter()
    }

    /// The entity allocator.
    #[must_use]
    pub fn entity_store(&self) -> &EntityStore {
        &self.entities
    }

    /// Where a live entity's row is stored.
    ///
    /// # Errors
    ///
    /// Returns `StaleHandle` or `UnknownEntity` if the handle is not live.
    pub fn location(&self, entity: Entity) -> Result<EntityLocation> {
        self.locate(entity)
    }

    /// The sorted component ids an entity owns.
    ///
    /// # Errors
    ///
    /// Returns `StaleHandle` or `UnknownEntity` if the handle is not live.
    pub fn entity_components(&self, entity: Entity) -> Result<&[ComponentId]> {
        let location = self.locate(entity)?;
        Ok(self.archetypes[location.archetype.index()].signature())
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Adds a component to an entity, moving it to the wider archetype.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateComponent` if the entity already has a `T`, or an
    /// entity error if the handle is not live.
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        self.move_entity(entity, Some(value), None)
    }

    /// Sets a component, overwriting in place if present or adding it otherwise.
    ///
    /// Returns the previous value, if any.
    ///
    /// # Errors
    ///
    /// Returns an entity error if the handle is not live.
    pub fn replace<T: Component>(&mut self, entity: Entity, value: T) -> Result<Option<T>> {
        let location = self.locate(entity)?;
        if let Some(id) = self.registry.id::<T>() {
            let table = &mut self.archetypes[location.archetype.index()];
            if let Some(slot) = table.get_mut::<T>(id, location.row) {
                return Ok(Some(std::mem::replace(slot, value)));
            }
        }
        self.move_entity(entity, Some(value), None)?;
        Ok(None)
    }

    /// Removes a component from an entity and returns it.
    ///
    /// # Errors
    ///
    /// Returns `MissingComponent` if the entity has no `T`, or an entity
    /// error if the handle is not live.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<T> {
        let location = self.locate(entity)?;
        let id = self
            .registry
            .id::<T>()
            .filter(|id| self.archetypes[location.archetype.index()].contains(*id))
            .ok_or_else(|| Error::missing_component(entity, type_name::<T>()))?;

        let dest = self.remove_target(location.archetype, id);
        let (src, dst) = pair_mut(&mut self.archetypes, location.archetype, dest);
        let (moved, value) = src
            .move_row_taking::<T>(location.row, dst, id)
            .ok_or_else(|| Error::missing_component(entity, type_name::<T>()))?;
        self.finish_move(entity, location, dest, moved);
        Ok(value)
    }

    /// Removes a component by id, dropping its value.
    ///
    /// # Errors
    ///
    /// Returns `MissingComponent` if the entity lacks the component, or an
    /// entity error if the handle is not live.
    pub fn remove_by_id(&mut self, entity: Entity, component: ComponentId) -> Result<()> {
        self.move_entity::<()>(entity, None, Some(component))
    }

    /// Moves an entity to the archetype `source ∪ {add} \ {remove}`.
    ///
    /// Components shared by source and destination keep their values. When
    /// `add` and `remove` name the same type the value is replaced in place.
    ///
    /// # Errors
    ///
    /// - `MissingComponent` if `remove` names a component the entity lacks
    /// - `DuplicateComponent` if `add` names a component the entity already has
    /// - `StaleHandle` / `UnknownEntity` if the handle is not live
    pub fn move_entity<T: Component>(
        &mut self,
        entity: Entity,
        add: Option<T>,
        remove: Option<ComponentId>,
    ) -> Result<()> {
        let location = self.locate(entity)?;
        let source = &self.archetypes[location.archetype.index()];

        if let Some(removed) = remove {
            if !source.contains(removed) {
                return Err(Error::missing_component(entity, self.registry.name(removed)));
            }
        }

        let Some(value) = add else {
            let Some(removed) = remove else {
                return Ok(());
            };
            let dest = self.remove_target(location.archetype, removed);
            let (src, dst) = pair_mut(&mut self.archetypes, location.archetype, dest);
            let moved = src.move_row_to(location.row, dst);
            self.finish_move(entity, location, dest, moved);
            return Ok(());
        };

        let added = self.registry.register::<T>();
        let source = &mut self.archetypes[location.archetype.index()];
        if remove == Some(added) {
            if let Some(slot) = source.get_mut::<T>(added, location.row) {
                *slot = value;
            }
            return Ok(());
        }
        if source.contains(added) {
            return Err(Error::duplicate_component(entity, type_name::<T>()));
        }

        let mut dest = location.archetype;
        if let Some(removed) = remove {
            dest = self.remove_target(dest, removed);
        }
        dest = self.add_target(dest, added);

        let (src, dst) = pair_mut(&mut self.archetypes, location.archetype, dest);
        let moved = src.move_row_to(location.row, dst);
        dst.push_component(added, value);
        self.finish_move(entity, location, dest, moved);
        Ok(())
    }

    /// Gets a component of an entity.
    ///
    /// # Errors
    ///
    /// Returns `MissingComponent` if absent, or an entity error if the handle
    /// is not live.
    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T> {
        let location = self.locate(entity)?;
        self.registry
            .id::<T>()
            .and_then(|id| self.archetypes[location.archetype.index()].get::<T>(id, location.row))
            .ok_or_else(|| Error::missing_component(entity, type_name::<T>()))
    }

    /// Gets a component of an entity mutably.
    ///
    /// # Errors
    ///
    /// Returns `MissingComponent` if absent, or an entity error if the handle
    /// is not live.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T> {
        let location = self.locate(entity)?;
        let id = self.registry.id::<T>();
        id.and_then(|id| {
            self.archetypes[location.archetype.index()].get_mut::<T>(id, location.row)
        })
        .ok_or_else(|| Error::missing_component(entity, type_name::<T>()))
    }

    /// Checks whether a live entity has a component. False for dead handles.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        let Ok(location) = self.locate(entity) else {
            return false;
        };
        self.registry
            .id::<T>()
            .is_some_and(|id| self.archetypes[location.archetype.index()].contains(id))
    }

    // =========================================================================
    // Archetypes
    // =========================================================================

    /// All archetypes, in creation order.
    #[must_use]
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    /// An archetype by id.
    #[must_use]
    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id.index())
    }

    /// Number of archetypes, the empty one included.
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Splits the world into its registry and its archetype tables so that
    /// several columns can be borrowed mutably at once.
    pub fn split_archetypes_mut(&mut self) -> (&ComponentRegistry, &mut [Archetype]) {
        (&self.registry, &mut self.archetypes)
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// Inserts a resource, returning the value it replaced.
    pub fn insert_resource<T: Resource>(&mut self, value: T) -> Option<T> {
        self.resources.insert(value)
    }

    /// Gets a resource.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the resource has not been set.
    pub fn resource<T: Resource>(&self) -> Result<&T> {
        self.resources.get()
    }

    /// Gets a resource mutably.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the resource has not been set.
    pub fn resource_mut<T: Resource>(&mut self) -> Result<&mut T> {
        self.resources.get_mut()
    }

    /// Gets a resource, tolerating its absence.
    #[must_use]
    pub fn get_resource<T: Resource>(&self) -> Option<&T> {
        self.resources.get_optional()
    }

    /// Removes a resource.
    pub fn remove_resource<T: Resource>(&mut self) -> Option<T> {
        self.resources.remove()
    }

    /// Checks whether a resource is set.
    #[must_use]
    pub fn contains_resource<T: Resource>(&self) -> bool {
        self.resources.contains::<T>()
    }

    /// The resource store.
    #[must_use]
    pub fn resources(&self) -> &ResourceStore {
        &self.resources
    }

    /// The resource store, mutably.
    pub fn resources_mut(&mut self) -> &mut ResourceStore {
        &mut self.resources
    }

    // --- Private helpers ---

    fn locate(&self, entity: Entity) -> Result<EntityLocation> {
        self.entities.validate(entity)?;
        self.locations
            .get(entity.index as usize)
            .copied()
            .flatten()
            .ok_or_else(|| Error::unknown_entity(entity))
    }

    fn set_location(&mut self, entity: Entity, location: EntityLocation) {
        let index = entity.index as usize;
        if index >= self.locations.len() {
            self.locations.resize(index + 1, None);
        }
        self.locations[index] = Some(location);
    }

    /// Points the entity swapped into `row` at its new row.
    fn patch_swapped(&mut self, moved: RowMove, row: usize) {
        if let Some(swapped) = moved.swapped {
            if let Some(Some(location)) = self.locations.get_mut(swapped.index as usize) {
                location.row = row;
            }
        }
    }

    fn finish_move(
        &mut self,
        entity: Entity,
        from: EntityLocation,
        dest: ArchetypeId,
        moved: RowMove,
    ) {
        self.patch_swapped(moved, from.row);
        self.set_location(
            entity,
            EntityLocation {
                archetype: dest,
                row: moved.new_row,
            },
        );
        trace!(?entity, from = ?from.archetype, to = ?dest, "moved entity");
    }

    /// Returns the archetype for a sorted signature, creating it if needed.
    fn archetype_for(&mut self, signature: Vec<ComponentId>) -> ArchetypeId {
        if let Some(&id) = self.archetype_index.get(signature.as_slice()) {
            return id;
        }

        let index = u32::try_from(self.archetypes.len()).expect("archetype id space exhausted");
        let id = ArchetypeId(index);
        let capacity = self.config.rows_per_archetype;
        let columns = signature
            .iter()
            .map(|component| {
                self.registry
                    .info(*component)
                    .expect("signature holds registered ids")
                    .new_column(capacity)
            })
            .collect();
        let signature: Box<[ComponentId]> = signature.into();
        let mut archetype = Archetype::new(id, signature.clone(), columns);
        archetype.reserve(capacity);

        debug!(
            archetype = ?id,
            components = ?signature
                .iter()
                .map(|c| self.registry.name(*c))
                .collect::<Vec<_>>(),
            "created archetype"
        );
        self.archetypes.push(archetype);
        self.archetype_index.insert(signature, id);
        id
    }

    fn add_target(&mut self, from: ArchetypeId, component: ComponentId) -> ArchetypeId {
        if let Some(to) = self.archetypes[from.index()].add_edge(component) {
            return to;
        }
        let mut signature = self.archetypes[from.index()].signature().to_vec();
        if let Err(position) = signature.binary_search(&component) {
            signature.insert(position, component);
        }
        let to = self.archetype_for(signature);
        self.archetypes[from.index()].set_add_edge(component, to);
        self.archetypes[to.index()].set_remove_edge(component, from);
        to
    }

    fn remove_target(&mut self, from: ArchetypeId, component: ComponentId) -> ArchetypeId {
        if let Some(to) = self.archetypes[from.index()].remove_edge(component) {
            return to;
        }
        let mut signature = self.archetypes[from.index()].signature().to_vec();
        signature.retain(|c| *c != component);
        let to = self.archetype_for(signature);
        self.archetypes[from.index()].set_remove_edge(component, to);
        self.archetypes[to.index()].set_add_edge(component, from);
        to
    }
}

/// Borrows two distinct archetypes mutably.
fn pair_mut(
    archetypes: &mut [Archetype],
    a: ArchetypeId,
    b: ArchetypeId,
) -> (&mut Archetype, &mut Archetype) {
    let (a, b) = (a.index(), b.index());
    assert_ne!(a, b, "source and destination archetypes must differ");
    if a < b {
        let (left, right) = archetypes.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = archetypes.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
