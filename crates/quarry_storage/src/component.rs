//! Component registration.
//!
//! Every component type receives a dense [`ComponentId`] the first time it is
//! registered. The id is stable for the lifetime of the registry, and the
//! registry remembers each type's name, layout, and how to build an empty
//! column for it.

use std::alloc::Layout;
use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;

use crate::archetype::{Column, TypedColumn};

/// Marker trait for types that can be stored as components.
pub trait Component: 'static + Send + Sync {}

/// Any `'static + Send + Sync` type is a valid component.
impl<T: 'static + Send + Sync> Component for T {}

/// Dense identifier assigned to a component type at registration.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u32);

impl ComponentId {
    /// Returns the raw index of this component id.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

/// Metadata recorded for a registered component type.
#[derive(Clone)]
pub struct ComponentInfo {
    id: ComponentId,
    name: &'static str,
    type_id: TypeId,
    layout: Layout,
    new_column: fn(usize) -> Box<dyn Column>,
}

impl ComponentInfo {
    fn of<T: Component>(id: ComponentId) -> Self {
        Self {
            id,
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            layout: Layout::new::<T>(),
            new_column: TypedColumn::<T>::boxed,
        }
    }

    /// The id assigned to this type.
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// The Rust type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The Rust `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Size and alignment of one value.
    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Size in bytes of one value.
    #[must_use]
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Builds an empty column for this type with the given capacity.
    pub(crate) fn new_column(&self, capacity: usize) -> Box<dyn Column> {
        (self.new_column)(capacity)
    }
}

impl fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

/// Assigns stable ids to component types.
#[derive(Clone, Debug, Default)]
pub struct ComponentRegistry {
    infos: Vec<ComponentInfo>,
    by_type: HashMap<TypeId, ComponentId>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T`, returning its id. Registering twice returns the same id.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` component types are registered.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.by_type.get(&type_id) {
            return id;
        }

        let index = u32::try_from(self.infos.len()).expect("component id space exhausted");
        let id = ComponentId(index);
        self.infos.push(ComponentInfo::of::<T>(id));
        self.by_type.insert(type_id, id);
        id
    }

    /// Returns the id of `T` if it has been registered.
    #[must_use]
    pub fn id<T: Component>(&self) -> Option<ComponentId> {
        self.id_of(TypeId::of::<T>())
    }

    /// Returns the id registered for a `TypeId`.
    #[must_use]
    pub fn id_of(&self, type_id: TypeId) -> Option<ComponentId> {
        self.by_type.get(&type_id).copied()
    }

    /// Returns the metadata for an id.
    #[must_use]
    pub fn info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.infos.get(id.0 as usize)
    }

    /// Returns the type name for an id, or a placeholder for unknown ids.
    #[must_use]
    pub fn name(&self, id: ComponentId) -> &'static str {
        self.info(id).map_or("<unregistered>", ComponentInfo::name)
    }

    /// Number of registered component types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Returns true if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Iterates registered component metadata in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> + '_ {
        self.infos.iter()
    }
}
