//! Archetype tables.
//!
//! An archetype holds every entity whose component set is exactly its
//! signature. Each component lives in its own densely packed column and row
//! `i` of every column belongs to `entities[i]`:
//!
//! ```text
//! signature: [Position, Velocity]
//!
//!   Position: [p0, p1, p2]
//!   Velocity: [v0, v1, v2]
//!   entities: [e0, e1, e2]
//! ```
//!
//! Rows are removed with swap-remove, so removal is O(1) but the last row
//! changes index. Callers must update the moved entity's location.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::mem;

use quarry_foundation::Entity;

use crate::component::{Component, ComponentId};

/// Index of an archetype within its world.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(pub(crate) u32);

impl ArchetypeId {
    /// The archetype of entities with no components.
    pub const EMPTY: ArchetypeId = ArchetypeId(0);

    /// Returns the raw index of this archetype.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchetypeId({})", self.0)
    }
}

// =============================================================================
// Columns
// =============================================================================

/// Type-erased column of component values.
pub trait Column: Any + Send + Sync {
    /// Number of stored values.
    fn len(&self) -> usize;

    /// Returns true if the column holds no values.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes the value at `row` by swapping in the last value, dropping it.
    fn swap_remove_drop(&mut self, row: usize);

    /// Removes the value at `row` by swapping in the last value and appends
    /// it to `dest`, which must hold the same component type.
    fn swap_remove_into(&mut self, row: usize, dest: &mut dyn Column);

    /// Reserves room for `additional` more values.
    fn reserve(&mut self, additional: usize);

    /// Upcast for downcasting to the concrete column.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete column.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Column backed by a `Vec<T>`.
pub struct TypedColumn<T>(pub(crate) Vec<T>);

impl<T: Component> TypedColumn<T> {
    pub(crate) fn boxed(capacity: usize) -> Box<dyn Column> {
        Box::new(Self(Vec::with_capacity(capacity)))
    }

    /// The stored values in row order.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.0
    }
}

impl<T: Component> Column for TypedColumn<T> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn swap_remove_drop(&mut self, row: usize) {
        self.0.swap_remove(row);
    }

    fn swap_remove_into(&mut self, row: usize, dest: &mut dyn Column) {
        let dest = dest
            .as_any_mut()
            .downcast_mut::<Self>()
            .expect("columns sharing a component id hold the same type");
        dest.0.push(self.0.swap_remove(row));
    }

    fn reserve(&mut self, additional: usize) {
        self.0.reserve(additional);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// =============================================================================
// Archetype
// =============================================================================

/// Result of moving or removing a row.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct RowMove {
    /// Row the entity occupies in the destination (unused for plain removal).
    pub(crate) new_row: usize,
    /// Entity that was swapped into the vacated source row, if any.
    pub(crate) swapped: Option<Entity>,
}

/// Storage for all entities sharing one exact component set.
pub struct Archetype {
    id: ArchetypeId,
    /// Component ids, sorted ascending; parallel to `columns`.
    signature: Box<[ComponentId]>,
    columns: Vec<Box<dyn Column>>,
    entities: Vec<Entity>,
    /// Cached destination when one component is added.
    add_edges: HashMap<ComponentId, ArchetypeId>,
    /// Cached destination when one component is removed.
    remove_edges: HashMap<ComponentId, ArchetypeId>,
}

impl Archetype {
    /// `signature` must be sorted and free of duplicates, with one column per entry.
    pub(crate) fn new(
        id: ArchetypeId,
        signature: Box<[ComponentId]>,
        columns: Vec<Box<dyn Column>>,
    ) -> Self {
        debug_assert_eq!(signature.len(), columns.len());
        debug_assert!(signature.windows(2).all(|w| w[0] < w[1]));
        Self {
            id,
            signature,
            columns,
            entities: Vec::new(),
            add_edges: HashMap::new(),
            remove_edges: HashMap::new(),
        }
    }

    /// This archetype's id.
    #[must_use]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// The sorted component ids of this archetype.
    #[must_use]
    pub fn signature(&self) -> &[ComponentId] {
        &self.signature
    }

    /// Number of rows (entities).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entity lives here.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Rows that fit before the entity column reallocates.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entities.capacity()
    }

    /// Entity handles in row order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Checks if this archetype stores a component.
    #[must_use]
    pub fn contains(&self, component: ComponentId) -> bool {
        self.column_index(component).is_some()
    }

    /// Checks if this archetype stores every listed component.
    #[must_use]
    pub fn contains_all(&self, components: &[ComponentId]) -> bool {
        components.iter().all(|c| self.contains(*c))
    }

    /// Checks if this archetype stores any listed component.
    #[must_use]
    pub fn contains_any(&self, components: &[ComponentId]) -> bool {
        components.iter().any(|c| self.contains(*c))
    }

    /// The column of `T` registered under `component`, in row order.
    #[must_use]
    pub fn column<T: Component>(&self, component: ComponentId) -> Option<&[T]> {
        let index = self.column_index(component)?;
        self.columns[index]
            .as_any()
            .downcast_ref::<TypedColumn<T>>()
            .map(TypedColumn::as_slice)
    }

    /// Mutable access to the column of `T` registered under `component`.
    #[must_use]
    pub fn column_mut<T: Component>(&mut self, component: ComponentId) -> Option<&mut [T]> {
        let index = self.column_index(component)?;
        self.columns[index]
            .as_any_mut()
            .downcast_mut::<TypedColumn<T>>()
            .map(|c| c.0.as_mut_slice())
    }

    /// Returns a shared view suitable for building query cursors.
    #[must_use]
    pub fn borrow(&self) -> ArchetypeBorrow<'_> {
        ArchetypeBorrow {
            signature: &self.signature,
            entities: &self.entities,
            slots: self
                .columns
                .iter()
                .map(|c| Slot::Shared(c.as_ref()))
                .collect(),
        }
    }

    /// Returns an exclusive view that can hand out one mutable slice per column.
    #[must_use]
    pub fn borrow_mut(&mut self) -> ArchetypeBorrow<'_> {
        let Self {
            signature,
            columns,
            entities,
            ..
        } = self;
        ArchetypeBorrow {
            signature,
            entities,
            slots: columns.iter_mut().map(|c| Slot::Unique(c.as_mut())).collect(),
        }
    }

    pub(crate) fn column_index(&self, component: ComponentId) -> Option<usize> {
        self.signature.binary_search(&component).ok()
    }

    pub(crate) fn add_edge(&self, component: ComponentId) -> Option<ArchetypeId> {
        self.add_edges.get(&component).copied()
    }

    pub(crate) fn remove_edge(&self, component: ComponentId) -> Option<ArchetypeId> {
        self.remove_edges.get(&component).copied()
    }

    pub(crate) fn set_add_edge(&mut self, component: ComponentId, to: ArchetypeId) {
        self.add_edges.insert(component, to);
    }

    pub(crate) fn set_remove_edge(&mut self, component: ComponentId, to: ArchetypeId) {
        self.remove_edges.insert(component, to);
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        self.entities.reserve(additional);
        for column in &mut self.columns {
            column.reserve(additional);
        }
    }

    /// Appends an entity row. Every column must receive a value before the
    /// archetype is observed again.
    pub(crate) fn push_entity(&mut self, entity: Entity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Appends a value to the column of `component`.
    ///
    /// # Panics
    ///
    /// Panics if the archetype has no such column or it holds another type.
    pub(crate) fn push_component<T: Component>(&mut self, component: ComponentId, value: T) {
        let index = self
            .column_index(component)
            .expect("component belongs to archetype signature");
        self.columns[index]
            .as_any_mut()
            .downcast_mut::<TypedColumn<T>>()
            .expect("column type matches component id")
            .0
            .push(value);
    }

    pub(crate) fn get<T: Component>(&self, component: ComponentId, row: usize) -> Option<&T> {
        self.column::<T>(component)?.get(row)
    }

    pub(crate) fn get_mut<T: Component>(
        &mut self,
        component: ComponentId,
        row: usize,
    ) -> Option<&mut T> {
        self.column_mut::<T>(component)?.get_mut(row)
    }

    /// Swap-removes `row`, dropping all of its component values.
    pub(crate) fn swap_remove(&mut self, row: usize) -> RowMove {
        for column in &mut self.columns {
            column.swap_remove_drop(row);
        }
        self.finish_swap_remove(row, 0)
    }

    /// Moves `row` into `dest`. Values of components `dest` lacks are dropped;
    /// `dest` columns the source lacks are left for the caller to fill.
    pub(crate) fn move_row_to(&mut self, row: usize, dest: &mut Archetype) -> RowMove {
        self.move_row_skipping(row, dest, None)
    }

    /// Like [`Archetype::move_row_to`] but hands back the value of `taken`
    /// instead of dropping it.
    pub(crate) fn move_row_taking<T: Component>(
        &mut self,
        row: usize,
        dest: &mut Archetype,
        taken: ComponentId,
    ) -> Option<(RowMove, T)> {
        let index = self.column_index(taken)?;
        let value = self.columns[index]
            .as_any_mut()
            .downcast_mut::<TypedColumn<T>>()?
            .0
            .swap_remove(row);
        Some((self.move_row_skipping(row, dest, Some(index)), value))
    }

    fn move_row_skipping(
        &mut self,
        row: usize,
        dest: &mut Archetype,
        skip: Option<usize>,
    ) -> RowMove {
        let entity = self.entities[row];
        let new_row = dest.push_entity(entity);

        for (index, component) in self.signature.iter().enumerate() {
            if Some(index) == skip {
                continue;
            }
            match dest.column_index(*component) {
                Some(target) => self.columns[index]
                    .swap_remove_into(row, dest.columns[target].as_mut()),
                None => self.columns[index].swap_remove_drop(row),
            }
        }

        self.finish_swap_remove(row, new_row)
    }

    fn finish_swap_remove(&mut self, row: usize, new_row: usize) -> RowMove {
        self.entities.swap_remove(row);
        RowMove {
            new_row,
            swapped: self.entities.get(row).copied(),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        self.columns.iter().all(|c| c.len() == self.entities.len())
    }
}

impl fmt::Debug for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("signature", &self.signature)
            .field("len", &self.entities.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Column borrows
// =============================================================================

enum Slot<'w> {
    Shared(&'w (dyn Column + 'static)),
    Unique(&'w mut (dyn Column + 'static)),
    Taken,
}

/// Hands out column slices of one archetype for the lifetime `'w`.
///
/// Each column can be taken mutably once, or shared any number of times.
/// Asking for a column that is already lent out incompatibly yields `None`.
pub struct ArchetypeBorrow<'w> {
    signature: &'w [ComponentId],
    entities: &'w [Entity],
    slots: Vec<Slot<'w>>,
}

impl<'w> ArchetypeBorrow<'w> {
    /// Entity handles in row order.
    #[must_use]
    pub fn entities(&self) -> &'w [Entity] {
        self.entities
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the archetype has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Checks if the archetype stores a component.
    #[must_use]
    pub fn contains(&self, component: ComponentId) -> bool {
        self.signature.binary_search(&component).is_ok()
    }

    /// Shared slice of a column. Fails if the column was lent mutably.
    pub fn read<T: Component>(&mut self, component: ComponentId) -> Option<&'w [T]> {
        let index = self.signature.binary_search(&component).ok()?;
        let column: &'w (dyn Column + 'static) =
            match mem::replace(&mut self.slots[index], Slot::Taken) {
                Slot::Shared(column) => column,
                Slot::Unique(column) => column,
                Slot::Taken => return None,
            };
        self.slots[index] = Slot::Shared(column);
        column
            .as_any()
            .downcast_ref::<TypedColumn<T>>()
            .map(TypedColumn::as_slice)
    }

    /// Mutable slice of a column. Fails unless this is the first request for it
    /// on an exclusive borrow.
    pub fn write<T: Component>(&mut self, component: ComponentId) -> Option<&'w mut [T]> {
        let index = self.signature.binary_search(&component).ok()?;
        match mem::replace(&mut self.slots[index], Slot::Taken) {
            Slot::Unique(column) => column
                .as_any_mut()
                .downcast_mut::<TypedColumn<T>>()
                .map(|c| c.0.as_mut_slice()),
            other => {
                self.slots[index] = other;
                None
            }
        }
    }
}
