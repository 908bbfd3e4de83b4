//! # Iterating Systems
//!
//! The standard way to write a system: declare an [`Aspect`] and get a
//! per-entity hook called for every member of its subscription.
//!
//! - [`IteratingSystem`] visits members serially. Hooks get the whole
//!   [`World`], so they can read and write any component and queue any
//!   structural change.
//! - [`ParallelIteratingSystem`] visits members on the rayon pool during the
//!   update phase. Each hook gets exclusive access to one entity's primary
//!   component plus a read-only [`ParallelView`] of every other storage;
//!   structural changes go through the view's command handle.
//!
//! In both cases the member list is a snapshot from the last flush, and
//! queued structural changes only take effect at the next one.

use std::any::type_name;

use super::aspect::Aspect;
use super::command::CommandSender;
use super::component::{Component, TypeRegistry};
use super::entity::EntityId;
use super::storage::{ComponentStorage, StorageRegistry};
use super::subscription::SubscriptionId;
use super::system::{DeltaTime, System, SystemContext};
use super::world::World;
use crate::error::EcsResult;

/// A system that runs a hook for every entity matching its aspect.
///
/// Wrap it in [`Iterating`] to register it with a scene.
#[allow(unused_variables)]
pub trait IteratingSystem: Send + 'static {
    /// The aspect whose members this system visits.
    ///
    /// # Errors
    ///
    /// Fails if a component type cannot be assigned an id.
    fn aspect(&self, types: &TypeRegistry) -> EcsResult<Aspect>;

    /// Called once after the subscription is created.
    ///
    /// # Errors
    ///
    /// Any error aborts initialization.
    fn on_initialize(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()> {
        Ok(())
    }

    /// Before the first input hook of a frame.
    ///
    /// # Errors
    ///
    /// Any error aborts the phase.
    fn on_begin_input(&mut self, world: &mut World, dt: DeltaTime) -> EcsResult<()> {
        Ok(())
    }

    /// Input hook for one member.
    ///
    /// # Errors
    ///
    /// Any error aborts the phase.
    fn on_input(&mut self, world: &mut World, dt: DeltaTime, entity: EntityId) -> EcsResult<()> {
        Ok(())
    }

    /// After the last input hook of a frame.
    ///
    /// # Errors
    ///
    /// Any error aborts the phase.
    fn on_end_input(&mut self, world: &mut World, dt: DeltaTime) -> EcsResult<()> {
        Ok(())
    }

    /// Before the first update hook of a frame.
    ///
    /// # Errors
    ///
    /// Any error aborts the phase.
    fn on_begin_update(&mut self, world: &mut World, dt: DeltaTime) -> EcsResult<()> {
        Ok(())
    }

    /// Update hook for one member.
    ///
    /// # Errors
    ///
    /// Any error aborts the phase.
    fn on_update(&mut self, world: &mut World, dt: DeltaTime, entity: EntityId) -> EcsResult<()> {
        Ok(())
    }

    /// After the last update hook of a frame.
    ///
    /// # Errors
    ///
    /// Any error aborts the phase.
    fn on_end_update(&mut self, world: &mut World, dt: DeltaTime) -> EcsResult<()> {
        Ok(())
    }

    /// Before the first draw hook of a frame, e.g. to open a sprite batch.
    ///
    /// # Errors
    ///
    /// Any error aborts the phase.
    fn on_begin_draw(&mut self, world: &mut World, dt: DeltaTime) -> EcsResult<()> {
        Ok(())
    }

    /// Draw hook for one member.
    ///
    /// # Errors
    ///
    /// Any error aborts the phase.
    fn on_draw(&mut self, world: &mut World, dt: DeltaTime, entity: EntityId) -> EcsResult<()> {
        Ok(())
    }

    /// After the last draw hook of a frame, e.g. to flush a sprite batch.
    ///
    /// # Errors
    ///
    /// Any error aborts the phase.
    fn on_end_draw(&mut self, world: &mut World, dt: DeltaTime) -> EcsResult<()> {
        Ok(())
    }

    /// Called on disposal, before the subscription is released.
    fn on_dispose(&mut self, ctx: &mut SystemContext<'_>) {}
}

type Bracket<S> = fn(&mut S, &mut World, DeltaTime) -> EcsResult<()>;
type Hook<S> = fn(&mut S, &mut World, DeltaTime, EntityId) -> EcsResult<()>;

/// Adapts an [`IteratingSystem`] into a [`System`].
#[derive(Debug)]
pub struct Iterating<S> {
    inner: S,
    subscription: Option<SubscriptionId>,
}

impl<S: IteratingSystem> Iterating<S> {
    /// Wraps `inner`. The subscription is created on initialization.
    #[must_use]
    pub const fn new(inner: S) -> Self {
        Self {
            inner,
            subscription: None,
        }
    }

    /// The wrapped system.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// The wrapped system, mutably.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// The subscription, once initialized.
    #[must_use]
    pub const fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    fn pass(
        &mut self,
        ctx: &mut SystemContext<'_>,
        dt: DeltaTime,
        begin: Bracket<S>,
        each: Hook<S>,
        end: Bracket<S>,
    ) -> EcsResult<()> {
        let Some(id) = self.subscription else {
            return Ok(());
        };

        let (world, aspects) = ctx.split();
        begin(&mut self.inner, world, dt)?;
        for &entity in aspects.members(id) {
            each(&mut self.inner, world, dt, entity)?;
        }
        end(&mut self.inner, world, dt)
    }
}

impl<S: IteratingSystem> System for Iterating<S> {
    fn name(&self) -> &'static str {
        type_name::<S>()
    }

    fn initialize(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()> {
        let aspect = self.inner.aspect(ctx.types())?;
        self.subscription = Some(ctx.subscribe(aspect));
        self.inner.on_initialize(ctx)
    }

    fn input(&mut self, ctx: &mut SystemContext<'_>, dt: DeltaTime) -> EcsResult<()> {
        self.pass(ctx, dt, S::on_begin_input, S::on_input, S::on_end_input)
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, dt: DeltaTime) -> EcsResult<()> {
        self.pass(ctx, dt, S::on_begin_update, S::on_update, S::on_end_update)
    }

    fn draw(&mut self, ctx: &mut SystemContext<'_>, dt: DeltaTime) -> EcsResult<()> {
        self.pass(ctx, dt, S::on_begin_draw, S::on_draw, S::on_end_draw)
    }

    fn dispose(&mut self, ctx: &mut SystemContext<'_>) {
        self.inner.on_dispose(ctx);
        if let Some(id) = self.subscription.take() {
            ctx.release(id);
        }
    }
}

/// Read access to storages and a command handle, shared by every worker of
/// a parallel pass.
#[derive(Clone, Copy)]
pub struct ParallelView<'a> {
    storages: &'a StorageRegistry,
    commands: &'a CommandSender,
}

impl<'a> ParallelView<'a> {
    /// The type registry.
    #[must_use]
    pub fn types(&self) -> &'a TypeRegistry {
        self.storages.types()
    }

    /// The storage of `T`.
    ///
    /// # Errors
    ///
    /// Fails if `T` is unregistered, or is the component being iterated.
    pub fn storage<T: Component>(&self) -> EcsResult<&'a ComponentStorage<T>> {
        self.storages.get()
    }

    /// The `T` component of `entity`, if it has one and `T` is readable.
    #[must_use]
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&'a T> {
        self.storage::<T>().ok()?.get_component(entity)
    }

    /// Queues destruction of `entity`.
    ///
    /// # Errors
    ///
    /// Fails if the scene's command queue is gone.
    pub fn destroy_entity(&self, entity: EntityId) -> EcsResult<()> {
        self.commands.destroy_entity(entity)
    }

    /// Queues attachment of `value` to `entity`.
    ///
    /// # Errors
    ///
    /// Fails if `T` is unregistered or the command queue is gone.
    pub fn add_component<T: Component>(&self, entity: EntityId, value: T) -> EcsResult<()> {
        let component = self.storages.component_type::<T>()?;
        self.commands.add_component_boxed(entity, component, Box::new(value))
    }

    /// Queues detachment of `T` from `entity`.
    ///
    /// # Errors
    ///
    /// Fails if `T` is unregistered or the command queue is gone.
    pub fn remove_component<T: Component>(&self, entity: EntityId) -> EcsResult<()> {
        let component = self.storages.component_type::<T>()?;
        self.commands.remove_component_type(entity, component)
    }
}

/// A system whose update hook runs on the rayon pool.
///
/// Members without a `Component` value are skipped; the aspect always
/// includes `Component`.
#[allow(unused_variables)]
pub trait ParallelIteratingSystem: Send + Sync + 'static {
    /// The component each hook gets exclusive access to.
    type Component: Component;

    /// The aspect whose members this system visits.
    ///
    /// # Errors
    ///
    /// Fails if a component type cannot be assigned an id.
    fn aspect(&self, types: &TypeRegistry) -> EcsResult<Aspect> {
        Ok(Aspect::all())
    }

    /// Called once after the subscription is created.
    ///
    /// # Errors
    ///
    /// Any error aborts initialization.
    fn on_initialize(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()> {
        Ok(())
    }

    /// Before the parallel pass, on the scene thread.
    ///
    /// # Errors
    ///
    /// Any error aborts the phase.
    fn on_begin_update(&mut self, world: &mut World, dt: DeltaTime) -> EcsResult<()> {
        Ok(())
    }

    /// Update hook for one member, on a worker thread.
    ///
    /// # Errors
    ///
    /// Any error aborts the pass.
    fn on_update(
        &self,
        view: &ParallelView<'_>,
        dt: DeltaTime,
        entity: EntityId,
        component: &mut Self::Component,
    ) -> EcsResult<()>;

    /// After the parallel pass, on the scene thread.
    ///
    /// # Errors
    ///
    /// Any error aborts the phase.
    fn on_end_update(&mut self, world: &mut World, dt: DeltaTime) -> EcsResult<()> {
        Ok(())
    }

    /// Called on disposal, before the subscription is released.
    fn on_dispose(&mut self, ctx: &mut SystemContext<'_>) {}
}

/// Adapts a [`ParallelIteratingSystem`] into a [`System`].
#[derive(Debug)]
pub struct ParallelIterating<S> {
    inner: S,
    subscription: Option<SubscriptionId>,
}

impl<S: ParallelIteratingSystem> ParallelIterating<S> {
    /// Wraps `inner`. The subscription is created on initialization.
    #[must_use]
    pub const fn new(inner: S) -> Self {
        Self {
            inner,
            subscription: None,
        }
    }

    /// The wrapped system.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// The wrapped system, mutably.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// The subscription, once initialized.
    #[must_use]
    pub const fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }
}

impl<S: ParallelIteratingSystem> System for ParallelIterating<S> {
    fn name(&self) -> &'static str {
        type_name::<S>()
    }

    fn initialize(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()> {
        let types = ctx.types();
        let mask = self.inner.aspect(types)?.mask().include::<S::Component>(types)?;
        self.subscription = Some(ctx.subscribe(Aspect::from_mask(mask)));
        self.inner.on_initialize(ctx)
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, dt: DeltaTime) -> EcsResult<()> {
        let Some(id) = self.subscription else {
            return Ok(());
        };

        let (world, aspects) = ctx.split();
        self.inner.on_begin_update(world, dt)?;

        if let Some(members) = aspects.bag(id).filter(|members| !members.is_empty()) {
            let (component, mut storage) = world.storages_mut().detach::<S::Component>()?;
            let commands = world.command_sender();
            let view = ParallelView {
                storages: world.storages(),
                commands: &commands,
            };
            let inner = &self.inner;
            let result = storage.par_for_each_mut(members, |entity, value| {
                inner.on_update(&view, dt, entity, value)
            });
            world.storages_mut().attach(component, storage);
            result?;
        }

        self.inner.on_end_update(world, dt)
    }

    fn dispose(&mut self, ctx: &mut SystemContext<'_>) {
        self.inner.on_dispose(ctx);
        if let Some(id) = self.subscription.take() {
            ctx.release(id);
        }
    }
}
