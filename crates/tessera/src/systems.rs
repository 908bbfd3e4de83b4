//! # Stock Systems
//!
//! - [`MovementSystem`]: integrates [`Transform`] by [`Velocity`] on the
//!   rayon pool
//! - [`LifetimeSystem`]: counts down [`Lifetime`] and destroys expired
//!   entities

use tessera_core::{
    Aspect, DeltaTime, EcsResult, EntityId, IteratingSystem, ParallelIteratingSystem, ParallelView, SystemContext,
    TypeRegistry, World,
};
use tessera_shared::{Lifetime, Transform, Velocity};
use tracing::debug;

/// Moves every entity that has both a transform and a velocity.
#[derive(Debug, Default)]
pub struct MovementSystem;

impl ParallelIteratingSystem for MovementSystem {
    type Component = Transform;

    fn aspect(&self, types: &TypeRegistry) -> EcsResult<Aspect> {
        Aspect::of::<(Velocity,)>(types)
    }

    fn on_update(
        &self,
        view: &ParallelView<'_>,
        dt: DeltaTime,
        entity: EntityId,
        transform: &mut Transform,
    ) -> EcsResult<()> {
        if let Some(velocity) = view.get::<Velocity>(entity) {
            velocity.integrate(transform, dt.as_secs());
        }
        Ok(())
    }
}

/// Destroys entities whose [`Lifetime`] has run out.
#[derive(Debug, Default)]
pub struct LifetimeSystem {
    expired: u64,
}

impl LifetimeSystem {
    /// Entities expired since the system was created.
    #[must_use]
    pub const fn expired(&self) -> u64 {
        self.expired
    }
}

impl IteratingSystem for LifetimeSystem {
    fn aspect(&self, types: &TypeRegistry) -> EcsResult<Aspect> {
        Aspect::of::<(Lifetime,)>(types)
    }

    fn on_update(&mut self, world: &mut World, dt: DeltaTime, entity: EntityId) -> EcsResult<()> {
        let expired = world
            .storage_mut::<Lifetime>()?
            .get_component_mut(entity)
            .is_some_and(|lifetime| lifetime.tick(dt.as_secs()));
        if expired && world.destroy_entity(entity) {
            self.expired += 1;
        }
        Ok(())
    }

    fn on_dispose(&mut self, _: &mut SystemContext<'_>) {
        debug!(expired = self.expired, "Lifetime system disposed");
    }
}

#[cfg(test)]
mod tests {
    use tessera_core::{ComponentStorage, EntityScene, Iterating, ParallelIterating};
    use tessera_shared::Vec3;

    use super::*;

    fn scene() -> EntityScene {
        let mut scene = EntityScene::new(TypeRegistry::new());
        scene.register_component(ComponentStorage::<Transform>::dense()).unwrap();
        scene.register_component(ComponentStorage::<Velocity>::dense()).unwrap();
        scene.register_component(ComponentStorage::<Lifetime>::sparse()).unwrap();
        scene
    }

    #[test]
    fn test_movement_integrates_only_moving_entities() {
        let mut scene = scene();
        scene.register_system(ParallelIterating::new(MovementSystem)).unwrap();
        scene.initialize().unwrap();

        let moving = scene.create_entity();
        scene.add_component(moving, Transform::default()).unwrap();
        scene
            .add_component(moving, Velocity::linear(Vec3::new(2.0, 0.0, 0.0)))
            .unwrap();
        let still = scene.create_entity();
        scene.add_component(still, Transform::at(Vec3::ONE)).unwrap();
        scene.flush().unwrap();

        scene.update(DeltaTime::from_secs(0.5)).unwrap();

        let transforms = scene.get_storage::<Transform>().unwrap();
        assert_eq!(transforms.get_component(moving).unwrap().position, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(transforms.get_component(still).unwrap().position, Vec3::ONE);
    }

    #[test]
    fn test_lifetime_destroys_after_expiry() {
        let mut scene = scene();
        scene.register_system(Iterating::new(LifetimeSystem::default())).unwrap();
        scene.initialize().unwrap();

        let short = scene.create_entity();
        scene.add_component(short, Lifetime::new(0.5)).unwrap();
        let long = scene.create_entity();
        scene.add_component(long, Lifetime::new(5.0)).unwrap();
        scene.flush().unwrap();

        let stats = scene.update(DeltaTime::from_secs(0.25)).unwrap();
        assert_eq!(stats.destroyed, 0);
        let stats = scene.update(DeltaTime::from_secs(0.25)).unwrap();
        assert_eq!(stats.destroyed, 1);

        assert!(!scene.world().is_alive(short));
        assert!(scene.world().is_alive(long));
        let system = scene.system::<Iterating<LifetimeSystem>>().unwrap();
        assert_eq!(system.inner().expired(), 1);
    }
}
