//! Typed queries over archetype storage.
//!
//! This module provides:
//! - [`QueryData`] - What a query yields per entity (`&T`, `&mut T`, `Option<&T>`, `Entity`, tuples)
//! - [`QueryFilter`] - Presence constraints that yield nothing (`With<T>`, `Without<T>`)
//! - [`QueryState`] - Cached list of matching archetypes, extended as new ones appear
//! - [`QueryIter`] - Lazy iteration in archetype order, then row order
//!
//! An archetype matches when its signature contains every required type and
//! none of the excluded ones. Optional terms never narrow the match.

use std::any::TypeId;
use std::iter::Copied;
use std::marker::PhantomData;
use std::slice;

use quarry_foundation::{Entity, Error, Result};
use quarry_storage::{
    Archetype, ArchetypeBorrow, ArchetypeId, Component, ComponentId, ComponentRegistry,
    EntityLocation, World,
};

use crate::access::Access;

// =============================================================================
// Query Terms
// =============================================================================

/// A term that yields data for every matching entity.
pub trait QueryData {
    /// The value yielded per entity.
    type Item<'w>;

    /// Row-by-row cursor over one archetype.
    type Fetch<'w>: Iterator<Item = Self::Item<'w>>;

    /// Records the types this term reads, writes and requires.
    fn declare(access: &mut Access);

    /// Builds a cursor over one matching archetype.
    ///
    /// Returns `None` if a required column is absent or already lent out.
    fn fetch<'w>(
        registry: &ComponentRegistry,
        archetype: &mut ArchetypeBorrow<'w>,
    ) -> Option<Self::Fetch<'w>>;
}

/// Query data that never writes, usable through a shared `&World`.
pub trait ReadOnlyQueryData: QueryData {}

/// A term that constrains matching without yielding data.
pub trait QueryFilter {
    /// Records required and excluded types.
    fn declare(access: &mut Access);
}

/// Requires `T` without reading it.
pub struct With<T>(PhantomData<fn() -> T>);

/// Excludes archetypes storing `T`.
pub struct Without<T>(PhantomData<fn() -> T>);

impl<T: Component> QueryData for &T {
    type Item<'w> = &'w T;
    type Fetch<'w> = slice::Iter<'w, T>;

    fn declare(access: &mut Access) {
        access.add_read::<T>();
        access.add_required::<T>();
    }

    fn fetch<'w>(
        registry: &ComponentRegistry,
        archetype: &mut ArchetypeBorrow<'w>,
    ) -> Option<Self::Fetch<'w>> {
        let id = registry.id::<T>()?;
        archetype.read::<T>(id).map(<[T]>::iter)
    }
}

impl<T: Component> ReadOnlyQueryData for &T {}

impl<T: Component> QueryData for &mut T {
    type Item<'w> = &'w mut T;
    type Fetch<'w> = slice::IterMut<'w, T>;

    fn declare(access: &mut Access) {
        access.add_write::<T>();
        access.add_required::<T>();
    }

    fn fetch<'w>(
        registry: &ComponentRegistry,
        archetype: &mut ArchetypeBorrow<'w>,
    ) -> Option<Self::Fetch<'w>> {
        let id = registry.id::<T>()?;
        archetype.write::<T>(id).map(<[T]>::iter_mut)
    }
}

impl<T: Component> QueryData for Option<&T> {
    type Item<'w> = Option<&'w T>;
    type Fetch<'w> = OptionFetch<slice::Iter<'w, T>>;

    fn declare(access: &mut Access) {
        access.add_read::<T>();
    }

    fn fetch<'w>(
        registry: &ComponentRegistry,
        archetype: &mut ArchetypeBorrow<'w>,
    ) -> Option<Self::Fetch<'w>> {
        match present(registry, archetype, TypeId::of::<T>()) {
            Some(id) => archetype.read::<T>(id).map(|c| OptionFetch::Present(c.iter())),
            None => Some(OptionFetch::Absent(archetype.len())),
        }
    }
}

impl<T: Component> ReadOnlyQueryData for Option<&T> {}

impl<T: Component> QueryData for Option<&mut T> {
    type Item<'w> = Option<&'w mut T>;
    type Fetch<'w> = OptionFetch<slice::IterMut<'w, T>>;

    fn declare(access: &mut Access) {
        access.add_write::<T>();
    }

    fn fetch<'w>(
        registry: &ComponentRegistry,
        archetype: &mut ArchetypeBorrow<'w>,
    ) -> Option<Self::Fetch<'w>> {
        match present(registry, archetype, TypeId::of::<T>()) {
            Some(id) => archetype
                .write::<T>(id)
                .map(|c| OptionFetch::Present(c.iter_mut())),
            None => Some(OptionFetch::Absent(archetype.len())),
        }
    }
}

impl QueryData for Entity {
    type Item<'w> = Entity;
    type Fetch<'w> = Copied<slice::Iter<'w, Entity>>;

    fn declare(_access: &mut Access) {}

    fn fetch<'w>(
        _registry: &ComponentRegistry,
        archetype: &mut ArchetypeBorrow<'w>,
    ) -> Option<Self::Fetch<'w>> {
        Some(archetype.entities().iter().copied())
    }
}

impl ReadOnlyQueryData for Entity {}

impl<T: Component> QueryFilter for With<T> {
    fn declare(access: &mut Access) {
        access.add_required::<T>();
    }
}

impl<T: Component> QueryFilter for Without<T> {
    fn declare(access: &mut Access) {
        access.add_excluded::<T>();
    }
}

impl QueryFilter for () {
    fn declare(_access: &mut Access) {}
}

fn present(
    registry: &ComponentRegistry,
    archetype: &ArchetypeBorrow<'_>,
    type_id: TypeId,
) -> Option<ComponentId> {
    registry
        .id_of(type_id)
        .filter(|id| archetype.contains(*id))
}

/// Cursor for an optional term: the column's values, or `None` per row.
pub enum OptionFetch<I> {
    /// The archetype stores the component.
    Present(I),
    /// The archetype lacks it; yields this many more `None`s.
    Absent(usize),
}

impl<I: Iterator> Iterator for OptionFetch<I> {
    type Item = Option<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Present(iter) => iter.next().map(Some),
            Self::Absent(0) => None,
            Self::Absent(remaining) => {
                *remaining -= 1;
                Some(None)
            }
        }
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        match self {
            Self::Present(iter) => iter.nth(n).map(Some),
            Self::Absent(remaining) if n < *remaining => {
                *remaining -= n + 1;
                Some(None)
            }
            Self::Absent(remaining) => {
                *remaining = 0;
                None
            }
        }
    }
}

/// Cursor for a tuple of terms, advancing all members in lockstep.
pub struct TupleFetch<T>(T);

macro_rules! impl_query_tuple {
    ($($name:ident),+) => {
        impl<$($name: QueryData),+> QueryData for ($($name,)+) {
            type Item<'w> = ($($name::Item<'w>,)+);
            type Fetch<'w> = TupleFetch<($($name::Fetch<'w>,)+)>;

            fn declare(access: &mut Access) {
                $($name::declare(access);)+
            }

            fn fetch<'w>(
                registry: &ComponentRegistry,
                archetype: &mut ArchetypeBorrow<'w>,
            ) -> Option<Self::Fetch<'w>> {
                Some(TupleFetch(($($name::fetch(registry, archetype)?,)+)))
            }
        }

        impl<$($name: ReadOnlyQueryData),+> ReadOnlyQueryData for ($($name,)+) {}

        impl<$($name: Iterator),+> Iterator for TupleFetch<($($name,)+)> {
            type Item = ($($name::Item,)+);

            #[allow(non_snake_case)]
            fn next(&mut self) -> Option<Self::Item> {
                let ($($name,)+) = &mut self.0;
                Some(($($name.next()?,)+))
            }

            #[allow(non_snake_case)]
            fn nth(&mut self, n: usize) -> Option<Self::Item> {
                let ($($name,)+) = &mut self.0;
                Some(($($name.nth(n)?,)+))
            }
        }

        impl<$($name: QueryFilter),+> QueryFilter for ($($name,)+) {
            fn declare(access: &mut Access) {
                $($name::declare(access);)+
            }
        }
    };
}

impl_query_tuple!(A);
impl_query_tuple!(A, B);
impl_query_tuple!(A, B, C);
impl_query_tuple!(A, B, C, D);
impl_query_tuple!(A, B, C, D, E);
impl_query_tuple!(A, B, C, D, E, F);
impl_query_tuple!(A, B, C, D, E, F, G);
impl_query_tuple!(A, B, C, D, E, F, G, H);

// =============================================================================
// Query State
// =============================================================================

/// A query bound to one world: its declared access and the archetypes it
/// matches so far.
///
/// Archetypes are append-only, so the matched list only grows; each call that
/// takes a world first examines archetypes created since the last call.
pub struct QueryState<Q: QueryData, F: QueryFilter = ()> {
    access: Access,
    required: Vec<TypeId>,
    excluded: Vec<TypeId>,
    /// Matching archetypes, ascending.
    matched: Vec<ArchetypeId>,
    /// Number of archetypes already examined.
    seen: usize,
    marker: PhantomData<fn() -> (Q, F)>,
}

impl<Q: QueryData, F: QueryFilter> QueryState<Q, F> {
    /// Builds the query and matches the world's current archetypes.
    ///
    /// # Errors
    ///
    /// Returns `AccessConflict` if a component is written by one term and
    /// read or written by another.
    pub fn new(world: &World) -> Result<Self> {
        let mut access = Access::new();
        Q::declare(&mut access);
        F::declare(&mut access);
        if let Some(component) = access.conflict() {
            return Err(Error::access_conflict(component));
        }

        let mut state = Self {
            required: access.required().collect(),
            excluded: access.excluded().collect(),
            access,
            matched: Vec::new(),
            seen: 0,
            marker: PhantomData,
        };
        state.update(world);
        Ok(state)
    }

    /// The declared access of this query.
    #[must_use]
    pub fn access(&self) -> &Access {
        &self.access
    }

    /// The archetypes matched as of the last update, ascending.
    #[must_use]
    pub fn matched_archetypes(&self) -> &[ArchetypeId] {
        &self.matched
    }

    /// Examines archetypes created since the last update.
    pub fn update(&mut self, world: &World) {
        let archetypes = world.archetypes();
        if self.seen == archetypes.len() {
            return;
        }
        if self.seen > archetypes.len() {
            // Fewer archetypes than already examined: a different world
            self.matched.clear();
            self.seen = 0;
        }

        // Ids are resolved now: an archetype created before a type was
        // registered cannot store it.
        let registry = world.registry();
        let required: Option<Vec<ComponentId>> =
            self.required.iter().map(|t| registry.id_of(*t)).collect();
        let excluded: Vec<ComponentId> = self
            .excluded
            .iter()
            .filter_map(|t| registry.id_of(*t))
            .collect();

        if let Some(required) = required {
            self.matched.extend(
                archetypes[self.seen..]
                    .iter()
                    .filter(|a| a.contains_all(&required) && !a.contains_any(&excluded))
                    .map(Archetype::id),
            );
        }
        self.seen = archetypes.len();
    }

    /// Number of entities the query currently matches.
    pub fn count(&mut self, world: &World) -> usize {
        self.update(world);
        self.matched
            .iter()
            .filter_map(|id| world.archetype(*id))
            .map(Archetype::len)
            .sum()
    }

    /// Checks whether an entity matches the query.
    pub fn contains(&mut self, world: &World, entity: Entity) -> bool {
        self.update(world);
        world
            .location(entity)
            .is_ok_and(|l| self.matched.binary_search(&l.archetype).is_ok())
    }

    /// Iterates the query over a shared world.
    pub fn iter<'w, 's>(&'s mut self, world: &'w World) -> QueryIter<'w, 's, Q, F>
    where
        Q: ReadOnlyQueryData,
    {
        self.update(world);
        QueryIter::new(
            world.registry(),
            Tables::Shared(world.archetypes().iter()),
            &self.matched,
        )
    }

    /// Iterates the query with mutable access to its written columns.
    pub fn iter_mut<'w, 's>(&'s mut self, world: &'w mut World) -> QueryIter<'w, 's, Q, F> {
        self.update(world);
        let (registry, archetypes) = world.split_archetypes_mut();
        QueryIter::new(registry, Tables::Unique(archetypes.iter_mut()), &self.matched)
    }

    /// Calls `f` for every matching entity.
    pub fn for_each<'w>(&mut self, world: &'w World, f: impl FnMut(Q::Item<'w>))
    where
        Q: ReadOnlyQueryData,
    {
        self.iter(world).for_each(f);
    }

    /// Calls `f` for every matching entity with mutable access.
    pub fn for_each_mut<'w>(&mut self, world: &'w mut World, f: impl FnMut(Q::Item<'w>)) {
        self.iter_mut(world).for_each(f);
    }

    /// Fetches the query's data for one entity.
    ///
    /// # Errors
    ///
    /// Returns an entity error if the handle is not live, or `QueryMismatch`
    /// if its archetype does not match.
    pub fn get<'w>(&mut self, world: &'w World, entity: Entity) -> Result<Q::Item<'w>>
    where
        Q: ReadOnlyQueryData,
    {
        let location = self.locate(world, entity)?;
        let mut borrow = world.archetypes()[location.archetype.index()].borrow();
        Q::fetch(world.registry(), &mut borrow)
            .and_then(|mut fetch| fetch.nth(location.row))
            .ok_or_else(|| Error::query_mismatch(entity))
    }

    /// Fetches the query's data for one entity with mutable access.
    ///
    /// # Errors
    ///
    /// Returns an entity error if the handle is not live, or `QueryMismatch`
    /// if its archetype does not match.
    pub fn get_mut<'w>(&mut self, world: &'w mut World, entity: Entity) -> Result<Q::Item<'w>> {
        let location = self.locate(world, entity)?;
        let (registry, archetypes) = world.split_archetypes_mut();
        let mut borrow = archetypes[location.archetype.index()].borrow_mut();
        Q::fetch(registry, &mut borrow)
            .and_then(|mut fetch| fetch.nth(location.row))
            .ok_or_else(|| Error::query_mismatch(entity))
    }

    fn locate(&mut self, world: &World, entity: Entity) -> Result<EntityLocation> {
        self.update(world);
        let location = world.location(entity)?;
        if self.matched.binary_search(&location.archetype).is_err() {
            return Err(Error::query_mismatch(entity));
        }
        Ok(location)
    }
}

impl<Q: QueryData, F: QueryFilter> std::fmt::Debug for QueryState<Q, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryState")
            .field("query", &std::any::type_name::<Q>())
            .field("matched", &self.matched)
            .field("seen", &self.seen)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Iteration
// =============================================================================

enum Tables<'w> {
    Shared(slice::Iter<'w, Archetype>),
    Unique(slice::IterMut<'w, Archetype>),
}

/// Lazy iterator over a query's matches.
///
/// Yields entities archetype by archetype in ascending archetype id, then in
/// row order. Holding it borrows the world, so structural changes have to be
/// deferred through a command buffer.
pub struct QueryIter<'w, 's, Q: QueryData, F: QueryFilter = ()> {
    registry: &'w ComponentRegistry,
    tables: Tables<'w>,
    /// Index of the next archetype `tables` will yield.
    position: usize,
    matched: slice::Iter<'s, ArchetypeId>,
    current: Option<Q::Fetch<'w>>,
    marker: PhantomData<fn() -> F>,
}

impl<'w, 's, Q: QueryData, F: QueryFilter> QueryIter<'w, 's, Q, F> {
    fn new(
        registry: &'w ComponentRegistry,
        tables: Tables<'w>,
        matched: &'s [ArchetypeId],
    ) -> Self {
        Self {
            registry,
            tables,
            position: 0,
            matched: matched.iter(),
            current: None,
            marker: PhantomData,
        }
    }
}

impl<'w, Q: QueryData, F: QueryFilter> Iterator for QueryIter<'w, '_, Q, F> {
    type Item = Q::Item<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.current.as_mut().and_then(Iterator::next) {
                return Some(item);
            }

            let id = *self.matched.next()?;
            let skip = id.index() - self.position;
            self.position = id.index() + 1;
            let mut borrow = match &mut self.tables {
                Tables::Shared(tables) => tables.nth(skip)?.borrow(),
                Tables::Unique(tables) => tables.nth(skip)?.borrow_mut(),
            };
            self.current = Q::fetch(self.registry, &mut borrow);
        }
    }
}

// =============================================================================
// World Extension
// =============================================================================

/// Query constructors on [`World`].
pub trait QueryExt {
    /// Builds a query state without filters.
    ///
    /// # Errors
    ///
    /// Returns `AccessConflict` for overlapping writes.
    fn query<Q: QueryData>(&self) -> Result<QueryState<Q>>;

    /// Builds a query state with a filter.
    ///
    /// # Errors
    ///
    /// Returns `AccessConflict` for overlapping writes.
    fn query_filtered<Q: QueryData, F: QueryFilter>(&self) -> Result<QueryState<Q, F>>;
}

impl QueryExt for World {
    fn query<Q: QueryData>(&self) -> Result<QueryState<Q>> {
        QueryState::new(self)
    }

    fn query_filtered<Q: QueryData, F: QueryFilter>(&self) -> Result<QueryState<Q, F>> {
        QueryState::new(self)
    }
}
