//! Singleton resources keyed by type.
//!
//! A resource is absent until first inserted, overwritten in place by later
//! insertions, and independent of any entity or archetype.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;

use quarry_foundation::{Error, Result};

/// Marker trait for types that can be stored as resources.
pub trait Resource: 'static + Send + Sync {}

impl<T: 'static + Send + Sync> Resource for T {}

/// Type-map storage for singleton resources.
#[derive(Debug, Default)]
pub struct ResourceStore {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ResourceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a resource, returning the value it replaced.
    pub fn insert<T: Resource>(&mut self, value: T) -> Option<T> {
        let previous = self.map.insert(TypeId::of::<T>(), Box::new(value));
        previous.and_then(|b| b.downcast().ok()).map(|b| *b)
    }

    /// Gets a resource.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if no value of `T` has been inserted.
    pub fn get<T: Resource>(&self) -> Result<&T> {
        self.get_optional::<T>()
            .ok_or_else(|| Error::resource_not_found(type_name::<T>()))
    }

    /// Gets a resource mutably.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if no value of `T` has been inserted.
    pub fn get_mut<T: Resource>(&mut self) -> Result<&mut T> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|b| b.downcast_mut())
            .ok_or_else(|| Error::resource_not_found(type_name::<T>()))
    }

    /// Gets a resource, tolerating its absence.
    #[must_use]
    pub fn get_optional<T: Resource>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref())
    }

    /// Gets a resource mutably, inserting `init()` first if absent.
    ///
    /// # Panics
    ///
    /// Never in practice: the slot for `T` only ever holds a `T`.
    pub fn get_or_insert_with<T: Resource>(&mut self, init: impl FnOnce() -> T) -> &mut T {
        self.map
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(init()) as Box<dyn Any + Send + Sync>)
            .downcast_mut()
            .expect("resource slot holds its own type")
    }

    /// Removes a resource, returning it if it existed.
    pub fn remove<T: Resource>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|b| b.downcast().ok())
            .map(|b| *b)
    }

    /// Checks whether a resource of this type exists.
    #[must_use]
    pub fn contains<T: Resource>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    /// Number of stored resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if no resource is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
