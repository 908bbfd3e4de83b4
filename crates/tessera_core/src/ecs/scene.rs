//! # Entity Scene
//!
//! The composition root: owns the [`World`], the [`AspectManager`] and the
//! [`SystemManager`], and is the only object outside code needs to touch.
//!
//! ## Frame
//!
//! [`EntityScene::tick`] runs one frame:
//!
//! ```text
//! begin -> input -> update -> flush -> draw -> end -> flush
//! ```
//!
//! Structural changes queued during a phase become visible to subscriptions
//! at the following flush.

use std::any::type_name;

use tracing::debug;

use super::aspect::Aspect;
use super::component::{Component, ComponentType, TypeRegistry};
use super::entity::EntityId;
use super::storage::ComponentStorage;
use super::subscription::{AspectManager, AspectSubscription, SubscriptionId};
use super::system::{DeltaTime, Phase, System, SystemContext, SystemManager};
use super::world::{FlushStats, World};
use crate::config::SceneConfig;
use crate::error::EcsResult;

/// Entities, component storages, subscriptions and systems of one scene.
///
/// # Example
///
/// ```rust
/// use tessera_core::{Aspect, DeltaTime, EntityScene, TypeRegistry};
///
/// #[derive(Default)]
/// struct Health(u32);
/// impl tessera_core::Component for Health {}
///
/// let types = TypeRegistry::new();
/// let mut scene = EntityScene::new(types.clone());
/// scene.register_default_component::<Health>().unwrap();
///
/// let entity = scene.create_entity();
/// scene.add_component(entity, Health(3)).unwrap();
///
/// let alive = scene.subscribe(Aspect::of::<(Health,)>(&types).unwrap());
/// scene.initialize().unwrap();
/// scene.tick(DeltaTime::from_secs(1.0 / 60.0)).unwrap();
/// assert_eq!(scene.subscription(alive).unwrap().entities(), &[entity]);
/// ```
pub struct EntityScene {
    config: SceneConfig,
    world: World,
    aspects: AspectManager,
    systems: SystemManager,
    disposed: bool,
}

impl EntityScene {
    /// Creates a scene with the default configuration.
    #[must_use]
    pub fn new(types: TypeRegistry) -> Self {
        Self::with_config(types, SceneConfig::default())
    }

    /// Creates a scene sized by `config`.
    #[must_use]
    pub fn with_config(types: TypeRegistry, config: SceneConfig) -> Self {
        Self {
            world: World::with_capacity(types, config.entity_capacity),
            aspects: AspectManager::new(),
            systems: SystemManager::new(),
            disposed: false,
            config,
        }
    }

    /// The configuration this scene was created with.
    #[must_use]
    pub const fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// The type registry.
    #[must_use]
    pub const fn types(&self) -> &TypeRegistry {
        self.world.types()
    }

    /// The world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// The world, mutably.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The aspect manager.
    #[must_use]
    pub const fn aspects(&self) -> &AspectManager {
        &self.aspects
    }

    /// Number of allocated entities.
    #[must_use]
    pub const fn entity_count(&self) -> usize {
        self.world.entity_count()
    }

    /// Allocates an entity. It becomes visible to systems at the next flush.
    pub fn create_entity(&mut self) -> EntityId {
        self.world.create_entity()
    }

    /// Queues destruction of `entity`. Returns `false` if it is not alive.
    pub fn destroy_entity(&mut self, entity: EntityId) -> bool {
        self.world.destroy_entity(entity)
    }

    /// Queues attachment of `value` to `entity`.
    ///
    /// # Errors
    ///
    /// Fails if `T` has no registered storage.
    pub fn add_component<T: Component>(&mut self, entity: EntityId, value: T) -> EcsResult<bool> {
        self.world.add_component(entity, value)
    }

    /// Queues detachment of `T` from `entity`.
    ///
    /// # Errors
    ///
    /// Fails if `T` has no registered storage.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> EcsResult<bool> {
        self.world.remove_component::<T>(entity)
    }

    /// Associates `T` with a storage backend. Must happen before any entity
    /// acquires a `T`.
    ///
    /// # Errors
    ///
    /// Fails if `T` is already registered.
    pub fn register_component<T: Component>(&mut self, storage: ComponentStorage<T>) -> EcsResult<ComponentType> {
        self.world.register_component(storage)
    }

    /// Registers `T` with the configured default backend.
    ///
    /// # Errors
    ///
    /// Fails if `T` is already registered.
    pub fn register_default_component<T: Component>(&mut self) -> EcsResult<ComponentType> {
        let storage = ComponentStorage::with_kind(self.config.default_storage, self.config.entity_capacity);
        self.register_component::<T>(storage)
    }

    /// Appends a system. Systems registered after [`EntityScene::initialize`]
    /// are initialized immediately.
    ///
    /// # Errors
    ///
    /// Propagates the system's initialization error.
    pub fn register_system<S: System>(&mut self, system: S) -> EcsResult<()> {
        let Self {
            world,
            aspects,
            systems,
            ..
        } = self;
        systems.add(Box::new(system), &mut SystemContext::new(world, aspects))
    }

    /// The storage of `T`.
    ///
    /// # Errors
    ///
    /// Fails if `T` has no registered storage.
    pub fn get_storage<T: Component>(&self) -> EcsResult<&ComponentStorage<T>> {
        self.world.storage()
    }

    /// The storage of `T`, mutably.
    ///
    /// # Errors
    ///
    /// Fails if `T` has no registered storage.
    pub fn get_storage_mut<T: Component>(&mut self) -> EcsResult<&mut ComponentStorage<T>> {
        self.world.storage_mut()
    }

    /// Subscribes to `aspect`, back-filling a new subscription with the
    /// entities already visible.
    pub fn subscribe(&mut self, aspect: Aspect) -> SubscriptionId {
        SystemContext::new(&mut self.world, &mut self.aspects).subscribe(aspect)
    }

    /// Gives back a subscription reference.
    pub fn release(&mut self, id: SubscriptionId) -> bool {
        self.aspects.release(id)
    }

    /// A subscription.
    #[must_use]
    pub fn subscription(&self, id: SubscriptionId) -> Option<&AspectSubscription> {
        self.aspects.get(id)
    }

    /// A subscription, mutably, e.g. to attach listeners.
    pub fn subscription_mut(&mut self, id: SubscriptionId) -> Option<&mut AspectSubscription> {
        self.aspects.get_mut(id)
    }

    /// The first registered system of type `S`.
    #[must_use]
    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems.find()
    }

    /// The first registered system of type `S`, mutably.
    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems.find_mut()
    }

    /// The system manager.
    #[must_use]
    pub const fn systems(&self) -> &SystemManager {
        &self.systems
    }

    /// Initializes every registered system, in registration order. Runs once.
    ///
    /// # Errors
    ///
    /// Stops at the first failing system.
    pub fn initialize(&mut self) -> EcsResult<()> {
        let Self {
            world,
            aspects,
            systems,
            ..
        } = self;
        systems.initialize(&mut SystemContext::new(world, aspects))
    }

    fn run(&mut self, phase: Phase, dt: DeltaTime) -> EcsResult<()> {
        let Self {
            world,
            aspects,
            systems,
            ..
        } = self;
        systems.run(phase, &mut SystemContext::new(world, aspects), dt)
    }

    /// Runs the begin phase.
    ///
    /// # Errors
    ///
    /// Stops at the first failing system.
    pub fn begin(&mut self, dt: DeltaTime) -> EcsResult<()> {
        self.run(Phase::Begin, dt)
    }

    /// Runs the input phase.
    ///
    /// # Errors
    ///
    /// Stops at the first failing system.
    pub fn input(&mut self, dt: DeltaTime) -> EcsResult<()> {
        self.run(Phase::Input, dt)
    }

    /// Runs the update phase, then flushes structural changes.
    ///
    /// # Errors
    ///
    /// Stops at the first failing system; the flush is then skipped.
    pub fn update(&mut self, dt: DeltaTime) -> EcsResult<FlushStats> {
        self.run(Phase::Update, dt)?;
        self.flush()
    }

    /// Runs the draw phase.
    ///
    /// # Errors
    ///
    /// Stops at the first failing system.
    pub fn draw(&mut self, dt: DeltaTime) -> EcsResult<()> {
        self.run(Phase::Draw, dt)
    }

    /// Runs the end phase, then flushes structural changes.
    ///
    /// # Errors
    ///
    /// Stops at the first failing system; the flush is then skipped.
    pub fn end(&mut self, dt: DeltaTime) -> EcsResult<FlushStats> {
        self.run(Phase::End, dt)?;
        self.flush()
    }

    /// Runs one whole frame and returns what both flushes applied.
    ///
    /// # Errors
    ///
    /// Stops at the first failing system.
    pub fn tick(&mut self, dt: DeltaTime) -> EcsResult<FlushStats> {
        self.begin(dt)?;
        self.input(dt)?;
        let mut stats = self.update(dt)?;
        self.draw(dt)?;
        stats += self.end(dt)?;
        Ok(stats)
    }

    /// Applies queued structural changes and refreshes subscriptions.
    ///
    /// # Errors
    ///
    /// Fails if a queued payload does not match its storage.
    pub fn flush(&mut self) -> EcsResult<FlushStats> {
        self.world.flush(&mut self.aspects)
    }

    /// Disposes every system, then drops entities, components and
    /// subscriptions. Registrations survive. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        let Self {
            world,
            aspects,
            systems,
            ..
        } = self;
        systems.dispose_and_clear(&mut SystemContext::new(world, aspects));
        world.clear(aspects);
        aspects.clear();
        self.disposed = true;
        debug!(scene = type_name::<Self>(), "Disposed scene");
    }

    /// Whether [`EntityScene::dispose`] has run.
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Drop for EntityScene {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for EntityScene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityScene")
            .field("world", &self.world)
            .field("subscriptions", &self.aspects.len())
            .field("systems", &self.systems)
            .field("disposed", &self.disposed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::ecs::iterating::{Iterating, IteratingSystem};
    use crate::ecs::storage::StorageKind;
    use crate::ecs::subscription::SubscriptionEvent;
    use crate::error::EcsError;

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Position(f32);
    impl Component for Position {}

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Velocity(f32);
    impl Component for Velocity {}

    #[derive(Default)]
    struct Unregistered;
    impl Component for Unregistered {}

    fn scene() -> EntityScene {
        let mut scene = EntityScene::new(TypeRegistry::new());
        scene.register_default_component::<Position>().unwrap();
        scene.register_component(ComponentStorage::<Velocity>::dense()).unwrap();
        scene
    }

    struct Integrate;

    impl IteratingSystem for Integrate {
        fn aspect(&self, types: &TypeRegistry) -> EcsResult<Aspect> {
            Aspect::of::<(Position, Velocity)>(types)
        }

        fn on_update(&mut self, world: &mut World, dt: DeltaTime, entity: EntityId) -> EcsResult<()> {
            let velocity = world
                .storage::<Velocity>()?
                .get_component(entity)
                .copied()
                .unwrap_or_default();
            if let Some(position) = world.storage_mut::<Position>()?.get_component_mut(entity) {
                position.0 += velocity.0 * dt.as_secs();
            }
            Ok(())
        }
    }

    #[test]
    fn test_default_component_uses_config_backend() {
        let scene = scene();
        assert_eq!(scene.get_storage::<Position>().unwrap().kind(), StorageKind::Sparse);
        assert_eq!(scene.get_storage::<Velocity>().unwrap().kind(), StorageKind::Dense);
    }

    #[test]
    fn test_tick_runs_systems_over_flushed_entities() {
        let mut scene = scene();
        scene.register_system(Iterating::new(Integrate)).unwrap();
        scene.initialize().unwrap();

        let entity = scene.create_entity();
        scene.add_component(entity, Position(0.0)).unwrap();
        scene.add_component(entity, Velocity(2.0)).unwrap();

        // Not flushed yet: the first update does not see it.
        scene.tick(DeltaTime::from_secs(1.0)).unwrap();
        assert_eq!(scene.get_storage::<Position>().unwrap().get_component(entity), Some(&Position(0.0)));

        scene.tick(DeltaTime::from_secs(1.0)).unwrap();
        assert_eq!(scene.get_storage::<Position>().unwrap().get_component(entity), Some(&Position(2.0)));
        assert!(scene.system::<Iterating<Integrate>>().is_some());
    }

    #[test]
    fn test_late_subscription_is_backfilled() {
        let mut scene = scene();
        let entity = scene.create_entity();
        scene.add_component(entity, Position(1.0)).unwrap();
        scene.flush().unwrap();

        let id = scene.subscribe(Aspect::of::<(Position,)>(scene.types()).unwrap());
        assert_eq!(scene.subscription(id).unwrap().entities(), &[entity]);
    }

    #[test]
    fn test_subscription_listener_sees_destroy() {
        let mut scene = scene();
        let id = scene.subscribe(Aspect::of::<(Position,)>(scene.types()).unwrap());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        scene
            .subscription_mut(id)
            .unwrap()
            .listen(move |event| sink.lock().push(event));

        let entity = scene.create_entity();
        scene.add_component(entity, Position(1.0)).unwrap();
        scene.flush().unwrap();
        scene.destroy_entity(entity);
        scene.flush().unwrap();

        assert_eq!(
            *events.lock(),
            vec![SubscriptionEvent::EntityAdded(entity), SubscriptionEvent::EntityRemoved(entity)]
        );
    }

    #[test]
    fn test_unregistered_storage_access_fails() {
        let mut scene = scene();
        let entity = scene.create_entity();
        assert!(matches!(
            scene.get_storage::<Unregistered>(),
            Err(EcsError::UnregisteredComponent { .. })
        ));
        assert!(scene.add_component(entity, Unregistered).is_err());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut scene = scene();
        scene.register_system(Iterating::new(Integrate)).unwrap();
        scene.initialize().unwrap();
        scene.create_entity();
        scene.flush().unwrap();

        scene.dispose();
        scene.dispose();
        assert!(scene.is_disposed());
        assert_eq!(scene.entity_count(), 0);
        assert!(scene.systems().is_empty());
        assert!(scene.aspects().is_empty());
    }
}
