//! Declared component access.
//!
//! Every query describes which component types it reads, writes, requires and
//! excludes. Two units of work whose accesses are compatible may touch the same
//! world concurrently; the engine itself never locks columns.

use std::any::{TypeId, type_name};
use std::collections::HashMap;

use quarry_storage::Component;

type TypeSet = HashMap<TypeId, &'static str>;

/// The component types a query touches, and how.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Access {
    reads: TypeSet,
    writes: TypeSet,
    /// Types an archetype must store to match.
    required: TypeSet,
    /// Types an archetype must not store to match.
    excluded: TypeSet,
    /// First type declared with overlapping write access.
    conflict: Option<&'static str>,
}

impl Access {
    /// Creates an empty access set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a shared read of `T`.
    ///
    /// Reading a type that is also written is a conflict; repeated reads are not.
    pub fn add_read<T: Component>(&mut self) {
        let (id, name) = key::<T>();
        if self.writes.contains_key(&id) {
            self.record_conflict(name);
        }
        self.reads.insert(id, name);
    }

    /// Declares an exclusive write of `T`.
    pub fn add_write<T: Component>(&mut self) {
        let (id, name) = key::<T>();
        if self.reads.contains_key(&id) || self.writes.contains_key(&id) {
            self.record_conflict(name);
        }
        self.writes.insert(id, name);
    }

    /// Requires matching archetypes to store `T`.
    pub fn add_required<T: Component>(&mut self) {
        let (id, name) = key::<T>();
        self.required.insert(id, name);
    }

    /// Requires matching archetypes to lack `T`.
    pub fn add_excluded<T: Component>(&mut self) {
        let (id, name) = key::<T>();
        self.excluded.insert(id, name);
    }

    /// The type that was declared with overlapping access, if any.
    #[must_use]
    pub fn conflict(&self) -> Option<&'static str> {
        self.conflict
    }

    /// Types read.
    pub fn reads(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.reads.keys().copied()
    }

    /// Types written.
    pub fn writes(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.writes.keys().copied()
    }

    /// Types a matching archetype must store.
    pub fn required(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.required.keys().copied()
    }

    /// Types a matching archetype must lack.
    pub fn excluded(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.excluded.keys().copied()
    }

    /// Checks whether `T` is read or written.
    #[must_use]
    pub fn touches<T: Component>(&self) -> bool {
        let id = TypeId::of::<T>();
        self.reads.contains_key(&id) || self.writes.contains_key(&id)
    }

    /// Returns true if nothing is written.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    /// Returns the name of a type that both accesses touch with at least one
    /// of them writing, or `None` if they may run concurrently.
    ///
    /// Accesses that can never match the same archetype (one requires a type
    /// the other excludes) never conflict.
    #[must_use]
    pub fn conflicts_with(&self, other: &Access) -> Option<&'static str> {
        if self.is_disjoint_from(other) {
            return None;
        }
        let overlap = |writes: &TypeSet, other: &Access| {
            writes
                .iter()
                .find(|(id, _)| other.reads.contains_key(*id) || other.writes.contains_key(*id))
                .map(|(_, name)| *name)
        };
        overlap(&self.writes, other).or_else(|| overlap(&other.writes, self))
    }

    /// Checks whether two units of work may run concurrently.
    #[must_use]
    pub fn is_compatible(&self, other: &Access) -> bool {
        self.conflicts_with(other).is_none()
    }

    /// Merges another access into this one, as when one unit of work runs
    /// several queries. Conflicts between the two are recorded.
    pub fn extend(&mut self, other: &Access) {
        if let Some(name) = self.conflicts_with(other).or(other.conflict) {
            self.record_conflict(name);
        }
        self.reads.extend(other.reads.iter().map(|(k, v)| (*k, *v)));
        self.writes.extend(other.writes.iter().map(|(k, v)| (*k, *v)));
        self.required.extend(other.required.iter().map(|(k, v)| (*k, *v)));
        self.excluded.extend(other.excluded.iter().map(|(k, v)| (*k, *v)));
    }

    fn record_conflict(&mut self, name: &'static str) {
        if self.conflict.is_none() {
            self.conflict = Some(name);
        }
    }

    fn is_disjoint_from(&self, other: &Access) -> bool {
        self.required.keys().any(|id| other.excluded.contains_key(id))
            || other.required.keys().any(|id| self.excluded.contains_key(id))
    }
}

fn key<T: Component>() -> (TypeId, &'static str) {
    (TypeId::of::<T>(), type_name::<T>())
}
