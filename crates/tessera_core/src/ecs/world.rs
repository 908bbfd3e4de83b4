//! # ECS World
//!
//! The container for entities, their component storages and the queue of
//! pending structural changes.
//!
//! Every structural mutation made through the world is deferred: it is
//! recorded in the command queue and only applied by [`World::flush`], which
//! then reports the resulting composition changes to the
//! [`AspectManager`]. Component *values* can be read and written at any time
//! through [`World::storage_mut`].

use std::any::type_name;

use tracing::{trace, warn};

use super::command::{Command, CommandQueue, CommandSender};
use super::component::{Component, ComponentBits, ComponentType, TypeRegistry};
use super::entity::{Entity, EntityId, EntityState};
use super::slot_map::SlotMap;
use super::storage::{ComponentStorage, ErasedStorage, StorageRegistry};
use super::subscription::AspectManager;
use crate::error::{EcsError, EcsResult};

/// What one [`World::flush`] applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Entities that became visible.
    pub created: usize,
    /// Entities destroyed and freed.
    pub destroyed: usize,
    /// Visible entities whose component set changed.
    pub changed: usize,
}

impl FlushStats {
    /// Returns `true` if the flush changed nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.created == 0 && self.destroyed == 0 && self.changed == 0
    }
}

impl std::ops::AddAssign for FlushStats {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.destroyed += other.destroyed;
        self.changed += other.changed;
    }
}

/// The ECS World: entities, component storages and pending commands.
///
/// # Example
///
/// ```rust
/// use tessera_core::{AspectManager, ComponentStorage, TypeRegistry, World};
///
/// #[derive(Default)]
/// struct Health(u32);
/// impl tessera_core::Component for Health {}
///
/// let mut world = World::new(TypeRegistry::new());
/// let mut aspects = AspectManager::new();
/// world.register_component(ComponentStorage::<Health>::sparse()).unwrap();
///
/// let entity = world.create_entity();
/// world.add_component(entity, Health(10)).unwrap();
/// assert!(!world.is_visible(entity));
///
/// world.flush(&mut aspects).unwrap();
/// assert!(world.is_visible(entity));
/// ```
pub struct World {
    types: TypeRegistry,
    entities: SlotMap<EntityId, Entity>,
    storages: StorageRegistry,
    commands: CommandQueue,
}

impl World {
    /// Creates an empty world resolving component ids through `types`.
    #[must_use]
    pub fn new(types: TypeRegistry) -> Self {
        Self::with_capacity(types, 0)
    }

    /// Creates an empty world with room for `capacity` entities.
    #[must_use]
    pub fn with_capacity(types: TypeRegistry, capacity: usize) -> Self {
        Self {
            storages: StorageRegistry::new(types.clone()),
            types,
            entities: SlotMap::with_capacity(capacity),
            commands: CommandQueue::new(),
        }
    }

    /// The type registry shared with masks and aspects.
    #[inline]
    #[must_use]
    pub const fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Number of allocated entities, including ones not yet visible.
    #[inline]
    #[must_use]
    pub const fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Allocates an entity with no components.
    ///
    /// The entity becomes visible to systems at the next flush.
    pub fn create_entity(&mut self) -> EntityId {
        let entity = self.entities.add(Entity::pending());
        self.commands.push(Command::CreateEntity { entity });
        entity
    }

    /// Queues destruction of `entity`.
    ///
    /// # Returns
    ///
    /// `false` (and a warning) if the entity is not alive.
    pub fn destroy_entity(&mut self, entity: EntityId) -> bool {
        if !self.entities.contains(entity) {
            warn!(%entity, "Destroy requested for stale entity");
            return false;
        }
        self.commands.push(Command::DestroyEntity { entity });
        true
    }

    /// Queues attachment of `value` to `entity`, overwriting any existing
    /// component of the same type.
    ///
    /// # Returns
    ///
    /// `Ok(false)` (and a warning) if the entity is not alive.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` has no storage.
    pub fn add_component<T: Component>(&mut self, entity: EntityId, value: T) -> EcsResult<bool> {
        let component = self.storages.component_type::<T>()?;
        if !self.entities.contains(entity) {
            warn!(%entity, component = type_name::<T>(), "Add requested for stale entity");
            return Ok(false);
        }
        self.commands.push(Command::AddComponent {
            entity,
            component,
            value: Box::new(value),
        });
        Ok(true)
    }

    /// Queues detachment of `T` from `entity`.
    ///
    /// # Returns
    ///
    /// `Ok(false)` (and a warning) if the entity is not alive.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` has no storage.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> EcsResult<bool> {
        let component = self.storages.component_type::<T>()?;
        if !self.entities.contains(entity) {
            warn!(%entity, component = type_name::<T>(), "Remove requested for stale entity");
            return Ok(false);
        }
        self.commands.push(Command::RemoveComponent { entity, component });
        Ok(true)
    }

    /// Checks if `entity` is allocated (visible or not).
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.contains(entity)
    }

    /// Checks if `entity` is visible to systems.
    #[inline]
    #[must_use]
    pub fn is_visible(&self, entity: EntityId) -> bool {
        self.entities.try_get(entity).is_some_and(Entity::is_visible)
    }

    /// Gets an entity's bookkeeping record.
    ///
    /// # Returns
    ///
    /// `None` if the id is stale.
    #[inline]
    #[must_use]
    pub fn entity(&self, entity: EntityId) -> Option<&Entity> {
        self.entities.try_get(entity)
    }

    /// Iterates over visible entities with their component bits as of the
    /// last flush.
    pub fn visible_entities(&self) -> impl Iterator<Item = (EntityId, ComponentBits)> + '_ {
        self.entities
            .iter()
            .filter(|(_, record)| record.is_visible())
            .map(|(entity, record)| (entity, record.components))
    }

    /// Registers the storage for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentAlreadyRegistered`] if `T` already has one.
    pub fn register_component<T: Component>(&mut self, storage: ComponentStorage<T>) -> EcsResult<ComponentType> {
        self.storages.register(storage)
    }

    /// Returns the storage of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` has no storage.
    pub fn storage<T: Component>(&self) -> EcsResult<&ComponentStorage<T>> {
        self.storages.get()
    }

    /// Returns the storage of `T` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` has no storage.
    pub fn storage_mut<T: Component>(&mut self) -> EcsResult<&mut ComponentStorage<T>> {
        self.storages.get_mut()
    }

    /// All storages.
    #[inline]
    #[must_use]
    pub const fn storages(&self) -> &StorageRegistry {
        &self.storages
    }

    #[inline]
    pub(crate) fn storages_mut(&mut self) -> &mut StorageRegistry {
        &mut self.storages
    }

    /// Returns a thread-safe handle for queueing commands.
    #[must_use]
    pub fn command_sender(&self) -> CommandSender {
        self.commands.sender()
    }

    /// Number of queued commands.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Applies every queued structural change and refreshes `aspects`.
    ///
    /// In order:
    /// 1. drain commands oldest first and apply them,
    /// 2. fold every storage's change journal into entity component bits,
    /// 3. drop destroyed entities from storages and free their slots,
    /// 4. report changed and destroyed entities to `aspects`.
    ///
    /// # Errors
    ///
    /// Fails if a queued component payload does not match its storage, or
    /// targets a component type with no attached storage. The offending
    /// command is dropped; every other command is still applied and
    /// `aspects` refreshed before the first such error is returned.
    pub fn flush(&mut self, aspects: &mut AspectManager) -> EcsResult<FlushStats> {
        let mut stats = FlushStats::default();
        let mut changed = Vec::new();
        let mut destroyed = Vec::new();
        let mut failure = None;

        let commands: Vec<Command> = self.commands.drain().collect();
        for command in commands {
            match command {
                Command::CreateEntity { entity } => {
                    if let Some(record) = self.entities.try_get_mut(entity) {
                        if record.state == EntityState::Pending {
                            record.state = EntityState::Active;
                            changed.push(entity);
                            stats.created += 1;
                        }
                    }
                }
                Command::DestroyEntity { entity } => match self.entities.try_get_mut(entity) {
                    Some(record) if record.state != EntityState::Destroying => {
                        record.state = EntityState::Destroying;
                        destroyed.push(entity);
                    }
                    Some(_) => {}
                    None => warn!(%entity, "Dropped destroy of stale entity"),
                },
                Command::AddComponent {
                    entity,
                    component,
                    value,
                } => {
                    if !self.accepts_changes(entity) {
                        warn!(%entity, %component, "Dropped component add for dead entity");
                    } else if let Err(error) = self
                        .erased_storage(component)
                        .and_then(|storage| storage.insert_boxed(entity, value))
                    {
                        warn!(%entity, %component, %error, "Dropped component add");
                        failure = failure.or(Some(error));
                    }
                }
                Command::RemoveComponent { entity, component } => {
                    if !self.accepts_changes(entity) {
                        warn!(%entity, %component, "Dropped component removal for dead entity");
                    } else {
                        match self.erased_storage(component) {
                            Ok(storage) => {
                                storage.remove_entity(entity);
                            }
                            Err(error) => {
                                warn!(%entity, %component, %error, "Dropped component removal");
                                failure = failure.or(Some(error));
                            }
                        }
                    }
                }
            }
        }

        let mut journal = Vec::new();
        for (component, storage) in self.storages.iter_mut() {
            journal.clear();
            storage.drain_changes(&mut journal);
            for &entity in &journal {
                let present = storage.contains_entity(entity);
                match self.entities.try_get_mut(entity) {
                    Some(record) if present => record.add_component(component),
                    Some(record) => record.remove_component(component),
                    None => {
                        if present {
                            storage.cull(&[entity]);
                        }
                        continue;
                    }
                }
                changed.push(entity);
            }
        }

        if !destroyed.is_empty() {
            for (_, storage) in self.storages.iter_mut() {
                storage.cull(&destroyed);
            }
            for &entity in &destroyed {
                self.entities.remove(entity);
            }
        }

        changed.sort_unstable();
        changed.dedup();
        let changed: Vec<(EntityId, ComponentBits)> = changed
            .into_iter()
            .filter_map(|entity| {
                self.entities
                    .try_get(entity)
                    .filter(|record| record.is_visible())
                    .map(|record| (entity, record.components))
            })
            .collect();

        aspects.refresh(&changed, &destroyed);

        stats.destroyed = destroyed.len();
        stats.changed = changed.len();
        trace!(
            created = stats.created,
            destroyed = stats.destroyed,
            changed = stats.changed,
            "Flushed structural changes"
        );
        failure.map_or(Ok(stats), Err)
    }

    fn accepts_changes(&self, entity: EntityId) -> bool {
        self.entities
            .try_get(entity)
            .is_some_and(|record| record.state != EntityState::Destroying)
    }

    fn erased_storage(
        &mut self,
        component: ComponentType,
    ) -> EcsResult<&mut (dyn ErasedStorage + 'static)> {
        let name = self.types.name(component).unwrap_or("<unknown>");
        self.storages
            .erased_mut(component)
            .ok_or(EcsError::UnregisteredComponent { component: name })
    }

    /// Drops every entity, component and queued command, and removes the
    /// dropped entities from `aspects`. Registrations stay.
    pub fn clear(&mut self, aspects: &mut AspectManager) {
        self.commands.drain().for_each(drop);
        let removed: Vec<EntityId> = self.entities.keys().collect();

        self.storages.clear();
        let mut journal = Vec::new();
        for (_, storage) in self.storages.iter_mut() {
            storage.drain_changes(&mut journal);
        }
        self.entities.clear();

        aspects.refresh(&[], &removed);
        trace!(removed = removed.len(), "Cleared world");
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("storages", &self.storages)
            .field("pending_commands", &self.commands.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::aspect::Aspect;

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Position(f32);
    impl Component for Position {}

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Velocity(f32);
    impl Component for Velocity {}

    #[derive(Default)]
    struct Unregistered;
    impl Component for Unregistered {}

    fn world() -> World {
        let mut world = World::new(TypeRegistry::new());
        world.register_component(ComponentStorage::<Position>::sparse()).unwrap();
        world.register_component(ComponentStorage::<Velocity>::dense()).unwrap();
        world
    }

    #[test]
    fn test_entities_appear_at_flush() {
        let mut world = world();
        let mut aspects = AspectManager::new();
        let entity = world.create_entity();

        assert!(world.is_alive(entity));
        assert!(!world.is_visible(entity));

        let stats = world.flush(&mut aspects).unwrap();
        assert_eq!(stats.created, 1);
        assert!(world.is_visible(entity));
    }

    #[test]
    fn test_component_commands_are_deferred() {
        let mut world = world();
        let mut aspects = AspectManager::new();
        let entity = world.create_entity();

        assert_eq!(world.add_component(entity, Position(1.0)), Ok(true));
        assert_eq!(world.storage::<Position>().unwrap().get_component(entity), None);

        world.flush(&mut aspects).unwrap();
        assert_eq!(
            world.storage::<Position>().unwrap().get_component(entity),
            Some(&Position(1.0))
        );
        let position = world.types().get::<Position>().unwrap();
        assert!(world.entity(entity).unwrap().has_component(position));

        world.remove_component::<Position>(entity).unwrap();
        world.flush(&mut aspects).unwrap();
        assert!(!world.entity(entity).unwrap().has_component(position));
    }

    #[test]
    fn test_destroy_frees_slot_and_components() {
        let mut world = world();
        let mut aspects = AspectManager::new();
        let entity = world.create_entity();
        world.add_component(entity, Velocity(2.0)).unwrap();
        world.flush(&mut aspects).unwrap();

        assert!(world.destroy_entity(entity));
        assert!(world.is_visible(entity));
        let stats = world.flush(&mut aspects).unwrap();

        assert_eq!(stats.destroyed, 1);
        assert!(!world.is_alive(entity));
        assert!(world.storage::<Velocity>().unwrap().is_empty());
        assert!(!world.destroy_entity(entity));
        assert_eq!(world.add_component(entity, Velocity(1.0)), Ok(false));
    }

    #[test]
    fn test_unregistered_component_fails_fast() {
        let mut world = world();
        let entity = world.create_entity();

        assert!(matches!(
            world.add_component(entity, Unregistered),
            Err(EcsError::UnregisteredComponent { .. })
        ));
        assert!(world.storage::<Unregistered>().is_err());
    }

    #[test]
    fn test_direct_storage_writes_reach_subscriptions() {
        let mut world = world();
        let mut aspects = AspectManager::new();
        let id = aspects.subscribe(Aspect::of::<(Position,)>(world.types()).unwrap());

        let entity = world.create_entity();
        world
            .storage_mut::<Position>()
            .unwrap()
            .add_component(entity, None);
        world.flush(&mut aspects).unwrap();

        assert_eq!(aspects.members(id), &[entity]);
    }

    #[test]
    fn test_commands_for_destroyed_entity_are_dropped() {
        let mut world = world();
        let mut aspects = AspectManager::new();
        let entity = world.create_entity();
        world.flush(&mut aspects).unwrap();

        world.destroy_entity(entity);
        world.add_component(entity, Position(3.0)).unwrap();
        world.destroy_entity(entity);
        let stats = world.flush(&mut aspects).unwrap();

        assert_eq!(stats.destroyed, 1);
        assert!(world.storage::<Position>().unwrap().is_empty());
    }

    #[test]
    fn test_clear_keeps_registrations() {
        let mut world = world();
        let mut aspects = AspectManager::new();
        let entity = world.create_entity();
        world.add_component(entity, Position(1.0)).unwrap();
        world.flush(&mut aspects).unwrap();

        world.clear(&mut aspects);
        assert_eq!(world.entity_count(), 0);
        assert!(world.storage::<Position>().unwrap().is_empty());
        assert!(world.flush(&mut aspects).unwrap().is_empty());
    }

    #[test]
    fn test_clear_empties_subscriptions() {
        let mut world = world();
        let mut aspects = AspectManager::new();
        let id = aspects.subscribe(Aspect::of::<(Position,)>(world.types()).unwrap());
        let entity = world.create_entity();
        world.add_component(entity, Position(1.0)).unwrap();
        world.flush(&mut aspects).unwrap();
        assert_eq!(aspects.members(id), &[entity]);

        world.clear(&mut aspects);
        assert!(!world.is_alive(entity));
        assert!(aspects.members(id).is_empty());

        world.flush(&mut aspects).unwrap();
        assert!(aspects.members(id).is_empty());
    }

    #[test]
    fn test_bad_payload_does_not_abort_flush() {
        let mut world = world();
        let mut aspects = AspectManager::new();
        let id = aspects.subscribe(Aspect::all());
        let doomed = world.create_entity();
        let live = world.create_entity();
        world.flush(&mut aspects).unwrap();

        world.destroy_entity(doomed);
        let position = world.types().get::<Position>().unwrap();
        world
            .command_sender()
            .add_component_boxed(live, position, Box::new(7u8))
            .unwrap();
        let late = world.create_entity();

        assert!(matches!(
            world.flush(&mut aspects),
            Err(EcsError::ComponentTypeMismatch { .. })
        ));
        assert!(!world.is_alive(doomed));
        assert!(!aspects.get(id).unwrap().contains(doomed));
        assert!(world.is_visible(late));
        assert!(aspects.get(id).unwrap().contains(late));
        assert!(!world.entity(live).unwrap().has_component(position));

        // The bad command is gone; the next flush is clean.
        assert!(world.flush(&mut aspects).unwrap().is_empty());
    }
}
