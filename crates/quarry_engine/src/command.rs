//! Deferred structural changes.
//!
//! While a query iterator borrows the world, spawning, despawning and moving
//! entities between archetypes is impossible. Such changes are recorded into a
//! [`CommandBuffer`] instead and replayed, in recorded order, once the
//! iteration is over.
//!
//! Entities spawned through the buffer do not exist until it is applied; the
//! buffer hands out a [`ProvisionalEntity`] that later commands can target and
//! that resolves to the real handle during `apply`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam_channel::{Receiver, Sender};
use quarry_foundation::{Entity, Error, ErrorContext, Result};
use quarry_storage::{Bundle, Component, Resource, World};
use tracing::{debug, warn};

use crate::hierarchy::HierarchyExt;

// =============================================================================
// Targets
// =============================================================================

/// Placeholder for an entity whose spawn has been recorded but not applied.
///
/// Valid only until the buffer that issued it is next applied.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProvisionalEntity(u32);

impl ProvisionalEntity {
    /// The buffer-local id.
    #[must_use]
    pub fn id(self) -> u32 {
        self.0
    }
}

/// The entity a command addresses.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// An existing entity.
    Entity(Entity),
    /// An entity spawned earlier in the same buffer.
    Provisional(ProvisionalEntity),
}

impl From<Entity> for Target {
    fn from(entity: Entity) -> Self {
        Self::Entity(entity)
    }
}

impl From<ProvisionalEntity> for Target {
    fn from(provisional: ProvisionalEntity) -> Self {
        Self::Provisional(provisional)
    }
}

// =============================================================================
// Commands
// =============================================================================

/// What a recorded command does.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Spawn an entity with a bundle.
    Spawn,
    /// Add a component.
    Insert,
    /// Remove a component.
    Remove,
    /// Despawn an entity.
    Despawn,
    /// Link a child to a parent.
    AddChild,
    /// Set a resource.
    InsertResource,
    /// Clear a resource.
    RemoveResource,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Spawn => "spawn",
            Self::Insert => "insert",
            Self::Remove => "remove",
            Self::Despawn => "despawn",
            Self::AddChild => "add-child",
            Self::InsertResource => "insert-resource",
            Self::RemoveResource => "remove-resource",
        };
        f.write_str(name)
    }
}

type SpawnFn = Box<dyn FnOnce(&mut World) -> Result<Entity> + Send>;
type InsertFn = Box<dyn FnOnce(&mut World, Entity) -> Result<()> + Send>;
type RemoveFn = fn(&mut World, Entity) -> Result<()>;
type ResourceFn = Box<dyn FnOnce(&mut World) + Send>;

enum Command {
    Spawn {
        provisional: ProvisionalEntity,
        spawn: SpawnFn,
    },
    Insert {
        target: Target,
        insert: InsertFn,
    },
    Remove {
        target: Target,
        remove: RemoveFn,
    },
    Despawn(Target),
    AddChild {
        parent: Target,
        child: Target,
    },
    InsertResource(ResourceFn),
    RemoveResource(ResourceFn),
}

impl Command {
    fn kind(&self) -> CommandKind {
        match self {
            Self::Spawn { .. } => CommandKind::Spawn,
            Self::Insert { .. } => CommandKind::Insert,
            Self::Remove { .. } => CommandKind::Remove,
            Self::Despawn(_) => CommandKind::Despawn,
            Self::AddChild { .. } => CommandKind::AddChild,
            Self::InsertResource(_) => CommandKind::InsertResource,
            Self::RemoveResource(_) => CommandKind::RemoveResource,
        }
    }

    /// Applies the command, returning the provisional mapping a spawn creates.
    fn apply(
        self,
        world: &mut World,
        resolved: &mut HashMap<ProvisionalEntity, Entity>,
    ) -> Result<Option<(ProvisionalEntity, Entity)>> {
        match self {
            Self::Spawn { provisional, spawn } => {
                let entity = spawn(world)?;
                resolved.insert(provisional, entity);
                return Ok(Some((provisional, entity)));
            }
            Self::Insert { target, insert } => insert(world, resolve(target, resolved)?)?,
            Self::Remove { target, remove } => remove(world, resolve(target, resolved)?)?,
            Self::Despawn(target) => world.despawn(resolve(target, resolved)?)?,
            Self::AddChild { parent, child } => {
                let parent = resolve(parent, resolved)?;
                let child = resolve(child, resolved)?;
                world.set_parent(child, parent)?;
            }
            Self::InsertResource(apply) | Self::RemoveResource(apply) => apply(world),
        }
        Ok(None)
    }
}

fn resolve(target: Target, resolved: &HashMap<ProvisionalEntity, Entity>) -> Result<Entity> {
    match target {
        Target::Entity(entity) => Ok(entity),
        Target::Provisional(provisional) => resolved
            .get(&provisional)
            .copied()
            .ok_or_else(|| Error::unresolved_provisional(provisional.0)),
    }
}

fn remove_component<T: Component>(world: &mut World, entity: Entity) -> Result<()> {
    world.remove::<T>(entity).map(drop)
}

// =============================================================================
// Recording
// =============================================================================

/// Records commands into a [`CommandBuffer`] from any thread.
///
/// Commands from one sender keep their order; commands from different
/// senders interleave in arrival order.
#[derive(Clone)]
pub struct CommandSender {
    queue: Sender<Command>,
    next_provisional: Arc<AtomicU32>,
}

impl CommandSender {
    fn push(&self, command: Command) {
        if self.queue.send(command).is_err() {
            warn!("command buffer dropped; discarding command");
        }
    }

    /// Records a spawn, returning a placeholder for the new entity.
    pub fn record_spawn<B: Bundle>(&self, bundle: B) -> ProvisionalEntity {
        let provisional = ProvisionalEntity(self.next_provisional.fetch_add(1, Ordering::Relaxed));
        self.push(Command::Spawn {
            provisional,
            spawn: Box::new(move |world: &mut World| world.spawn(bundle)),
        });
        provisional
    }

    /// Records adding a component.
    pub fn record_insert<T: Component>(&self, target: impl Into<Target>, value: T) {
        self.push(Command::Insert {
            target: target.into(),
            insert: Box::new(move |world: &mut World, entity: Entity| {
                world.insert(entity, value)
            }),
        });
    }

    /// Records removing a component of type `T`.
    pub fn record_remove<T: Component>(&self, target: impl Into<Target>) {
        self.push(Command::Remove {
            target: target.into(),
            remove: remove_component::<T>,
        });
    }

    /// Records despawning an entity.
    pub fn record_despawn(&self, target: impl Into<Target>) {
        self.push(Command::Despawn(target.into()));
    }

    /// Records linking `child` under `parent`.
    pub fn record_add_child(&self, parent: impl Into<Target>, child: impl Into<Target>) {
        self.push(Command::AddChild {
            parent: parent.into(),
            child: child.into(),
        });
    }

    /// Records setting a resource.
    pub fn record_insert_resource<T: Resource>(&self, value: T) {
        self.push(Command::InsertResource(Box::new(move |world: &mut World| {
            world.insert_resource(value);
        })));
    }

    /// Records clearing a resource.
    pub fn record_remove_resource<T: Resource>(&self) {
        self.push(Command::RemoveResource(Box::new(|world: &mut World| {
            world.remove_resource::<T>();
        })));
    }

    /// Chained recording against one entity.
    pub fn entity(&self, target: impl Into<Target>) -> EntityCommands<'_> {
        EntityCommands {
            sender: self,
            target: target.into(),
        }
    }

    /// Records a spawn and returns chained recording against the new entity.
    pub fn spawn<B: Bundle>(&self, bundle: B) -> EntityCommands<'_> {
        let provisional = self.record_spawn(bundle);
        self.entity(provisional)
    }
}

impl fmt::Debug for CommandSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSender")
            .field("pending", &self.queue.len())
            .finish_non_exhaustive()
    }
}

/// Chained recording against one target.
pub struct EntityCommands<'a> {
    sender: &'a CommandSender,
    target: Target,
}

impl<'a> EntityCommands<'a> {
    /// The addressed entity.
    #[must_use]
    pub fn id(&self) -> Target {
        self.target
    }

    /// Records adding a component.
    pub fn insert<T: Component>(&mut self, value: T) -> &mut Self {
        self.sender.record_insert(self.target, value);
        self
    }

    /// Records removing a component of type `T`.
    pub fn remove<T: Component>(&mut self) -> &mut Self {
        self.sender.record_remove::<T>(self.target);
        self
    }

    /// Records spawning children under this entity.
    pub fn with_children(&mut self, build: impl FnOnce(&mut ChildBuilder<'a>)) -> &mut Self {
        let mut builder = ChildBuilder {
            sender: self.sender,
            parent: self.target,
        };
        build(&mut builder);
        self
    }

    /// Records despawning this entity.
    pub fn despawn(&mut self) {
        self.sender.record_despawn(self.target);
    }
}

/// Spawns entities linked under one parent.
pub struct ChildBuilder<'a> {
    sender: &'a CommandSender,
    parent: Target,
}

impl<'a> ChildBuilder<'a> {
    /// The parent new children attach to.
    #[must_use]
    pub fn parent(&self) -> Target {
        self.parent
    }

    /// Records spawning a child.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> EntityCommands<'a> {
        let child = self.sender.record_spawn(bundle);
        self.sender.record_add_child(self.parent, child);
        self.sender.entity(child)
    }
}

// =============================================================================
// Buffer
// =============================================================================

/// A failed deferred command.
#[derive(Debug)]
pub struct CommandFailure {
    /// Position of the command in application order.
    pub index: usize,
    /// What the command tried to do.
    pub kind: CommandKind,
    /// Why it failed, with the command as context.
    pub error: Error,
}

/// Outcome of applying a buffer.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Number of commands that succeeded.
    pub applied: usize,
    /// Provisional entities and the handles they resolved to.
    pub spawned: Vec<(ProvisionalEntity, Entity)>,
    /// Commands that failed, in order.
    pub failures: Vec<CommandFailure>,
}

impl ApplyReport {
    /// Returns true if every command succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// The handle a provisional entity resolved to.
    #[must_use]
    pub fn entity(&self, provisional: ProvisionalEntity) -> Option<Entity> {
        self.spawned
            .iter()
            .find(|(p, _)| *p == provisional)
            .map(|(_, e)| *e)
    }

    /// Converts into a result holding the first failure, if any.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failed command.
    pub fn into_result(self) -> Result<Vec<(ProvisionalEntity, Entity)>> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(self.spawned),
        }
    }
}

/// Ordered log of deferred structural changes.
///
/// Record through the buffer directly or through any number of
/// [`CommandSender`]s, then [`apply`](CommandBuffer::apply) against a world.
/// The buffer is reusable after each application.
pub struct CommandBuffer {
    sender: CommandSender,
    queue: Receiver<Command>,
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        let (sender, queue) = crossbeam_channel::unbounded();
        Self {
            sender: CommandSender {
                queue: sender,
                next_provisional: Arc::new(AtomicU32::new(0)),
            },
            queue,
        }
    }

    /// A handle that records into this buffer from another thread.
    #[must_use]
    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    /// Number of recorded commands not yet applied.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Records a spawn, returning a placeholder for the new entity.
    pub fn record_spawn<B: Bundle>(&mut self, bundle: B) -> ProvisionalEntity {
        self.sender.record_spawn(bundle)
    }

    /// Records adding a component.
    pub fn record_insert<T: Component>(&mut self, target: impl Into<Target>, value: T) {
        self.sender.record_insert(target, value);
    }

    /// Records removing a component of type `T`.
    pub fn record_remove<T: Component>(&mut self, target: impl Into<Target>) {
        self.sender.record_remove::<T>(target);
    }

    /// Records despawning an entity.
    pub fn record_despawn(&mut self, target: impl Into<Target>) {
        self.sender.record_despawn(target);
    }

    /// Records linking `child` under `parent`.
    pub fn record_add_child(&mut self, parent: impl Into<Target>, child: impl Into<Target>) {
        self.sender.record_add_child(parent, child);
    }

    /// Records setting a resource.
    pub fn record_insert_resource<T: Resource>(&mut self, value: T) {
        self.sender.record_insert_resource(value);
    }

    /// Records clearing a resource.
    pub fn record_remove_resource<T: Resource>(&mut self) {
        self.sender.record_remove_resource::<T>();
    }

    /// Chained recording against one entity.
    pub fn entity(&mut self, target: impl Into<Target>) -> EntityCommands<'_> {
        self.sender.entity(target)
    }

    /// Records a spawn and returns chained recording against the new entity.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> EntityCommands<'_> {
        self.sender.spawn(bundle)
    }

    /// Replays every command pending when the call starts, in order.
    ///
    /// Commands recorded while it runs, from other threads or from drop
    /// glue, stay queued for the next call.
    ///
    /// A failing command does not stop the rest; each failure is reported with
    /// its position. Provisional entities resolve as their spawns apply, and
    /// commands addressing one whose spawn failed fail with
    /// `UnresolvedProvisional`.
    pub fn apply(&mut self, world: &mut World) -> ApplyReport {
        let mut resolved = HashMap::new();
        let mut report = ApplyReport::default();

        let pending = self.queue.len();
        for (index, command) in self.queue.try_iter().take(pending).enumerate() {
            let kind = command.kind();
            match command.apply(world, &mut resolved) {
                Ok(spawned) => {
                    report.applied += 1;
                    report.spawned.extend(spawned);
                }
                Err(error) => {
                    warn!(index, %kind, %error, "deferred command failed");
                    let context =
                        ErrorContext::new().with_source(format!("command #{index} ({kind})"));
                    report.failures.push(CommandFailure {
                        index,
                        kind,
                        error: error.with_context(context),
                    });
                }
            }
        }

        debug!(
            applied = report.applied,
            failed = report.failures.len(),
            spawned = report.spawned.len(),
            "applied command buffer"
        );
        report
    }
}

impl fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("pending", &self.queue.len())
            .finish_non_exhaustive()
    }
}
