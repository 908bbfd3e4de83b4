//! # ECS Properties Integration Test
//!
//! End-to-end guarantees of the public API: handle safety, query masks,
//! subscription deltas, storage backends and system scheduling.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tessera_core::{
    Aspect, Component, ComponentMask, ComponentStorage, DeltaTime, EcsError, EcsResult, EntityId, EntityScene,
    Iterating, IteratingSystem, ParallelIterating, ParallelIteratingSystem, ParallelView, SlotMap,
    SubscriptionEvent, System, SystemContext, TypeRegistry, World,
};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Position(f32, f32);
impl Component for Position {}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Velocity(f32, f32);
impl Component for Velocity {}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Frozen;
impl Component for Frozen {}

#[derive(Default)]
struct NeverRegistered;
impl Component for NeverRegistered {}

fn scene() -> EntityScene {
    let mut scene = EntityScene::new(TypeRegistry::new());
    scene.register_component(ComponentStorage::<Position>::dense()).unwrap();
    scene.register_component(ComponentStorage::<Velocity>::sparse()).unwrap();
    scene.register_component(ComponentStorage::<Frozen>::sparse()).unwrap();
    scene
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[test]
fn test_stale_handle_never_observes_reused_slot() {
    let mut slots: SlotMap<EntityId, &str> = SlotMap::new();
    let old = slots.add("first");
    assert!(slots.remove(old));

    let new = slots.add("second");
    assert_eq!(new.index(), old.index());
    assert_ne!(new.generation(), old.generation());

    assert_eq!(slots.try_get(old), None);
    assert!(matches!(slots.get(old), Err(EcsError::InvalidSlot { .. })));
    assert_eq!(slots.try_get(new), Some(&"second"));
}

#[test]
fn test_exclusion_only_mask_interest() {
    let types = TypeRegistry::new();
    let mask = ComponentMask::new().exclude::<Frozen>(&types).unwrap();

    assert!(!mask.interested_in::<Frozen>(&types));
    assert!(mask.interested_in::<Position>(&types));
    assert!(mask.interested_in::<Velocity>(&types));
}

#[test]
fn test_equal_aspects_hash_identically() {
    let types = TypeRegistry::new();
    let a = Aspect::of::<(Position, Velocity)>(&types).unwrap();
    let b = Aspect::of::<(Position, Velocity)>(&types).unwrap();

    assert_eq!(a, b);
    assert_eq!(a.mask(), b.mask());
    assert_eq!(hash_of(&a), hash_of(&b));

    // Order inside the set does not matter.
    let c = Aspect::of::<(Velocity, Position)>(&types).unwrap();
    assert_eq!(a, c);
}

#[test]
fn test_subscription_delta_after_destroy() {
    let mut scene = scene();
    let subscription = scene.subscribe(Aspect::of::<(Position, Velocity)>(scene.types()).unwrap());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    scene
        .subscription_mut(subscription)
        .unwrap()
        .listen(move |event| sink.lock().push(event));

    let entities: Vec<EntityId> = (0..4).map(|_| scene.create_entity()).collect();
    for &entity in &entities[..2] {
        scene.add_component(entity, Position(0.0, 0.0)).unwrap();
        scene.add_component(entity, Velocity(1.0, 0.0)).unwrap();
    }
    // Half the aspect is not enough.
    scene.add_component(entities[2], Position(0.0, 0.0)).unwrap();
    scene.flush().unwrap();

    let mut members = scene.subscription(subscription).unwrap().entities().to_vec();
    members.sort_by_key(|e| e.index());
    assert_eq!(members, vec![entities[0], entities[1]]);

    events.lock().clear();
    assert!(scene.destroy_entity(entities[0]));
    scene.flush().unwrap();

    assert_eq!(scene.subscription(subscription).unwrap().entities(), &[entities[1]]);
    assert_eq!(*events.lock(), vec![SubscriptionEvent::EntityRemoved(entities[0])]);
}

#[test]
fn test_component_removal_leaves_subscription() {
    let mut scene = scene();
    let subscription = scene.subscribe(Aspect::of::<(Position,)>(scene.types()).unwrap());
    let entity = scene.create_entity();
    scene.add_component(entity, Position(1.0, 1.0)).unwrap();
    scene.flush().unwrap();
    assert!(scene.subscription(subscription).unwrap().contains(entity));

    scene.remove_component::<Position>(entity).unwrap();
    scene.flush().unwrap();
    assert!(!scene.subscription(subscription).unwrap().contains(entity));
}

#[test]
fn test_excluded_component_blocks_membership() {
    let mut scene = scene();
    let aspect = Aspect::of::<(Position,)>(scene.types())
        .and_then(|aspect| aspect.excluding::<(Frozen,)>(scene.types()))
        .unwrap();
    let subscription = scene.subscribe(aspect);

    let moving = scene.create_entity();
    let frozen = scene.create_entity();
    scene.add_component(moving, Position(0.0, 0.0)).unwrap();
    scene.add_component(frozen, Position(0.0, 0.0)).unwrap();
    scene.add_component(frozen, Frozen).unwrap();
    scene.flush().unwrap();

    assert_eq!(scene.subscription(subscription).unwrap().entities(), &[moving]);
}

#[test]
fn test_storage_round_trip_on_both_backends() {
    let id = EntityId::new(3, 1);
    for mut storage in [ComponentStorage::<Position>::dense(), ComponentStorage::sparse()] {
        storage.add_component(id, Some(Position(4.0, 2.0)));
        assert_eq!(storage.get_component(id), Some(&Position(4.0, 2.0)));
        assert!(storage.remove_component(id));
        assert_eq!(storage.get_component(id), None);
        assert!(!storage.remove_component(id));
    }
}

struct Ordered {
    expected: usize,
    counter: Arc<AtomicUsize>,
}

impl System for Ordered {
    fn update(&mut self, _: &mut SystemContext<'_>, _: DeltaTime) -> EcsResult<()> {
        let seen = self.counter.fetch_add(1, Ordering::SeqCst);
        assert_eq!(seen % 2, self.expected);
        Ok(())
    }
}

#[test]
fn test_systems_update_in_registration_order() {
    let mut scene = scene();
    let counter = Arc::new(AtomicUsize::new(0));
    scene
        .register_system(Ordered { expected: 0, counter: Arc::clone(&counter) })
        .unwrap();
    scene
        .register_system(Ordered { expected: 1, counter: Arc::clone(&counter) })
        .unwrap();
    scene.initialize().unwrap();

    for _ in 0..3 {
        scene.update(DeltaTime::from_secs(0.016)).unwrap();
    }
    assert_eq!(counter.load(Ordering::SeqCst), 6);
}

#[derive(Default)]
struct DestroyNeighbor {
    visits: HashMap<EntityId, usize>,
    victim: Option<EntityId>,
}

impl IteratingSystem for DestroyNeighbor {
    fn aspect(&self, types: &TypeRegistry) -> EcsResult<Aspect> {
        Aspect::of::<(Position,)>(types)
    }

    fn on_update(&mut self, world: &mut World, _: DeltaTime, entity: EntityId) -> EcsResult<()> {
        *self.visits.entry(entity).or_default() += 1;
        if let Some(victim) = self.victim.take() {
            assert!(world.destroy_entity(victim));
            // Still alive until the flush.
            assert!(world.is_alive(victim));
        }
        Ok(())
    }
}

#[test]
fn test_destroy_during_iteration_is_deferred() {
    let mut scene = scene();
    scene.register_system(Iterating::new(DestroyNeighbor::default())).unwrap();
    scene.initialize().unwrap();

    let entities: Vec<EntityId> = (0..5).map(|_| scene.create_entity()).collect();
    for &entity in &entities {
        scene.add_component(entity, Position(0.0, 0.0)).unwrap();
    }
    scene.flush().unwrap();

    let victim = entities[3];
    scene.system_mut::<Iterating<DestroyNeighbor>>().unwrap().inner_mut().victim = Some(victim);

    let stats = scene.update(DeltaTime::from_secs(0.016)).unwrap();
    assert_eq!(stats.destroyed, 1);

    let system = scene.system::<Iterating<DestroyNeighbor>>().unwrap().inner();
    for &entity in entities.iter().filter(|&&e| e != victim) {
        assert_eq!(system.visits.get(&entity), Some(&1), "{entity} visited once");
    }
    assert!(!scene.world().is_alive(victim));
    assert_eq!(scene.entity_count(), 4);
}

#[test]
fn test_unregistered_component_is_an_error() {
    let mut scene = scene();
    let entity = scene.create_entity();

    assert!(matches!(
        scene.get_storage::<NeverRegistered>(),
        Err(EcsError::UnregisteredComponent { .. })
    ));
    assert!(matches!(
        scene.add_component(entity, NeverRegistered),
        Err(EcsError::UnregisteredComponent { .. })
    ));
}

struct Drift;

impl ParallelIteratingSystem for Drift {
    type Component = Position;

    fn aspect(&self, types: &TypeRegistry) -> EcsResult<Aspect> {
        Aspect::of::<(Velocity,)>(types)
    }

    fn on_update(&self, view: &ParallelView<'_>, dt: DeltaTime, entity: EntityId, position: &mut Position) -> EcsResult<()> {
        let velocity = view.get::<Velocity>(entity).copied().unwrap_or_default();
        position.0 += velocity.0 * dt.as_secs();
        position.1 += velocity.1 * dt.as_secs();
        if position.0 > 10.0 {
            view.destroy_entity(entity)?;
        }
        Ok(())
    }
}

#[test]
fn test_parallel_system_integrates_and_defers_destruction() {
    let mut scene = scene();
    scene.register_system(ParallelIterating::new(Drift)).unwrap();
    scene.initialize().unwrap();

    let mut entities = Vec::new();
    for i in 0..256u16 {
        let entity = scene.create_entity();
        scene.add_component(entity, Position(f32::from(i % 2) * 10.0, 0.0)).unwrap();
        scene.add_component(entity, Velocity(1.0, 2.0)).unwrap();
        entities.push(entity);
    }
    scene.flush().unwrap();

    let stats = scene.update(DeltaTime::from_secs(0.5)).unwrap();
    assert_eq!(stats.destroyed, 128);
    assert_eq!(scene.entity_count(), 128);

    let positions = scene.get_storage::<Position>().unwrap();
    for entity in entities.iter().step_by(2) {
        assert_eq!(positions.get_component(*entity), Some(&Position(0.5, 1.0)));
    }
}
