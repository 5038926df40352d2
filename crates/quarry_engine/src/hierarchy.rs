//! Parent/child links between entities.
//!
//! Links are stored twice:
//! - On the child: a [`Parent`] component naming its parent
//! - In the world: a [`Hierarchy`] resource mapping each parent to its children
//!
//! Both are kept in step by [`HierarchyExt`]; nothing in the storage layer
//! knows about them.

use std::collections::{HashMap, HashSet};

use quarry_foundation::{Entity, Error, Result};
use quarry_storage::World;
use tracing::trace;

/// Component naming an entity's parent.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Parent(pub Entity);

/// Reverse index: parent -> children in attach order.
#[derive(Clone, Debug, Default)]
pub struct Hierarchy {
    children: HashMap<Entity, Vec<Entity>>,
}

impl Hierarchy {
    /// Children recorded for `parent`. Entities despawned since the last
    /// prune may still be listed.
    #[must_use]
    pub fn children(&self, parent: Entity) -> &[Entity] {
        self.children.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of parents with at least one recorded child.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Returns true if no links are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn attach(&mut self, parent: Entity, child: Entity) {
        self.children.entry(parent).or_default().push(child);
    }

    fn retain(&mut self, dead: &HashSet<Entity>) {
        self.children.retain(|parent, children| {
            children.retain(|c| !dead.contains(c));
            !dead.contains(parent) && !children.is_empty()
        });
    }

    fn detach(&mut self, parent: Entity, child: Entity) {
        if let Some(children) = self.children.get_mut(&parent) {
            children.retain(|c| *c != child);
            if children.is_empty() {
                self.children.remove(&parent);
            }
        }
    }
}

/// Hierarchy operations on [`World`].
pub trait HierarchyExt {
    /// Makes `parent` the parent of `child`, detaching it from any previous
    /// parent.
    ///
    /// # Errors
    ///
    /// - `StaleHandle` / `UnknownEntity` if either handle is not live
    /// - `HierarchyCycle` if `parent` is `child` or one of its descendants
    fn set_parent(&mut self, child: Entity, parent: Entity) -> Result<()>;

    /// Detaches `child` from its parent, returning the old parent.
    ///
    /// # Errors
    ///
    /// Returns an entity error if the handle is not live.
    fn remove_parent(&mut self, child: Entity) -> Result<Option<Entity>>;

    /// The live parent of a live entity, if any.
    fn parent(&self, child: Entity) -> Option<Entity>;

    /// Live children of `parent` in attach order.
    fn children(&self, parent: Entity) -> Vec<Entity>;

    /// Despawns `root` and all of its descendants, children before parents.
    ///
    /// Returns the number of entities despawned.
    ///
    /// # Errors
    ///
    /// Returns an entity error if `root` is not live.
    fn despawn_recursive(&mut self, root: Entity) -> Result<usize>;

    /// Drops index entries that name despawned entities, returning how many
    /// entities were forgotten.
    ///
    /// Runs on every hierarchy mutation; a plain `despawn` leaves its entries
    /// behind until then.
    fn prune_hierarchy(&mut self) -> usize;
}

impl HierarchyExt for World {
    fn set_parent(&mut self, child: Entity, parent: Entity) -> Result<()> {
        self.location(child)?;
        self.location(parent)?;

        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == child {
                return Err(Error::hierarchy_cycle(child, parent));
            }
            ancestor = HierarchyExt::parent(self, current);
        }

        self.prune_hierarchy();
        let previous = self.replace(child, Parent(parent))?.map(|p| p.0);
        if previous == Some(parent) {
            return Ok(());
        }

        let index = self.resources_mut().get_or_insert_with(Hierarchy::default);
        if let Some(previous) = previous {
            index.detach(previous, child);
        }
        index.attach(parent, child);
        trace!(?child, ?parent, "set parent");
        Ok(())
    }

    fn remove_parent(&mut self, child: Entity) -> Result<Option<Entity>> {
        self.location(child)?;
        if !self.has::<Parent>(child) {
            return Ok(None);
        }

        let Parent(parent) = self.remove::<Parent>(child)?;
        if let Ok(index) = self.resource_mut::<Hierarchy>() {
            index.detach(parent, child);
        }
        self.prune_hierarchy();
        Ok(Some(parent).filter(|p| self.is_alive(*p)))
    }

    fn parent(&self, child: Entity) -> Option<Entity> {
        self.get::<Parent>(child)
            .ok()
            .map(|p| p.0)
            .filter(|p| self.is_alive(*p))
    }

    fn children(&self, parent: Entity) -> Vec<Entity> {
        let Some(index) = self.get_resource::<Hierarchy>() else {
            return Vec::new();
        };
        index
            .children(parent)
            .iter()
            .copied()
            .filter(|c| HierarchyExt::parent(self, *c) == Some(parent))
            .collect()
    }

    fn despawn_recursive(&mut self, root: Entity) -> Result<usize> {
        self.location(root)?;
        if let Some(parent) = HierarchyExt::parent(self, root) {
            if let Ok(index) = self.resource_mut::<Hierarchy>() {
                index.detach(parent, root);
            }
        }

        // Post-order: an entity is emitted after all of its children
        let mut order = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((entity, expanded)) = stack.pop() {
            if expanded {
                order.push(entity);
                continue;
            }
            stack.push((entity, true));
            for child in HierarchyExt::children(self, entity).into_iter().rev() {
                stack.push((child, false));
            }
        }

        for entity in &order {
            self.despawn(*entity)?;
            if let Ok(index) = self.resource_mut::<Hierarchy>() {
                index.children.remove(entity);
            }
        }
        self.prune_hierarchy();
        trace!(?root, count = order.len(), "despawned subtree");
        Ok(order.len())
    }

    fn prune_hierarchy(&mut self) -> usize {
        let Some(index) = self.get_resource::<Hierarchy>() else {
            return 0;
        };
        let dead: HashSet<Entity> = index
            .children
            .iter()
            .flat_map(|(parent, children)| std::iter::once(parent).chain(children))
            .copied()
            .filter(|e| !self.is_alive(*e))
            .collect();
        if dead.is_empty() {
            return 0;
        }
        if let Ok(index) = self.resource_mut::<Hierarchy>() {
            index.retain(&dead);
        }
        trace!(count = dead.len(), "pruned hierarchy");
        dead.len()
    }
}
