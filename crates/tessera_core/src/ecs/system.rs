//! # Systems and Phase Scheduling
//!
//! A [`System`] is an object implementing any subset of the frame phases.
//! The [`SystemManager`] runs registered systems in registration order within
//! each phase; that order is part of the observable contract.
//!
//! ## Frame phases
//!
//! ```text
//! begin -> input -> update -> [flush] -> draw -> end -> [flush]
//! ```
//!
//! Systems receive a [`SystemContext`] that lends out the world and the
//! aspect manager. Structural changes made through it are queued and applied
//! at the next flush, never mid-phase.

use std::any::{type_name, Any};
use std::fmt;
use std::time::Duration;

use tracing::debug;

use super::aspect::Aspect;
use super::component::TypeRegistry;
use super::subscription::{AspectManager, SubscriptionId};
use super::world::World;
use crate::error::EcsResult;

/// Time elapsed since the previous frame, in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct DeltaTime(f32);

impl DeltaTime {
    /// No time elapsed.
    pub const ZERO: Self = Self(0.0);

    /// Creates a delta from seconds.
    #[inline]
    #[must_use]
    pub const fn from_secs(seconds: f32) -> Self {
        Self(seconds)
    }

    /// The delta in seconds.
    #[inline]
    #[must_use]
    pub const fn as_secs(self) -> f32 {
        self.0
    }

    /// Returns the smaller of `self` and `max`.
    #[inline]
    #[must_use]
    pub fn clamp_to(self, max: Self) -> Self {
        Self(self.0.min(max.0))
    }
}

impl From<Duration> for DeltaTime {
    fn from(duration: Duration) -> Self {
        Self(duration.as_secs_f32())
    }
}

/// A frame phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Start of frame.
    Begin,
    /// Input handling.
    Input,
    /// Simulation.
    Update,
    /// Rendering.
    Draw,
    /// End of frame.
    End,
}

impl Phase {
    /// Phases in the order they run each frame.
    pub const ALL: [Self; 5] = [Self::Begin, Self::Input, Self::Update, Self::Draw, Self::End];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Begin => "begin",
            Self::Input => "input",
            Self::Update => "update",
            Self::Draw => "draw",
            Self::End => "end",
        };
        f.write_str(name)
    }
}

/// What a system can reach while it runs.
pub struct SystemContext<'a> {
    world: &'a mut World,
    aspects: &'a mut AspectManager,
}

impl<'a> SystemContext<'a> {
    /// Lends out a world and its aspect manager.
    pub fn new(world: &'a mut World, aspects: &'a mut AspectManager) -> Self {
        Self { world, aspects }
    }

    /// The world.
    #[inline]
    pub fn world(&mut self) -> &mut World {
        &mut *self.world
    }

    /// The aspect manager.
    #[inline]
    #[must_use]
    pub fn aspects(&self) -> &AspectManager {
        &*self.aspects
    }

    /// The type registry.
    #[inline]
    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        self.world.types()
    }

    /// Splits into a mutable world and read-only subscriptions, so members
    /// can be iterated while structural changes are queued.
    #[inline]
    pub fn split(&mut self) -> (&mut World, &AspectManager) {
        (&mut *self.world, &*self.aspects)
    }

    /// Subscribes to `aspect`. A newly created subscription is back-filled
    /// with the entities already visible.
    pub fn subscribe(&mut self, aspect: Aspect) -> SubscriptionId {
        let existed = self.aspects.find(&aspect).is_some();
        let id = self.aspects.subscribe(aspect);
        if !existed {
            self.aspects.seed(id, self.world.visible_entities());
        }
        id
    }

    /// Gives back a subscription reference.
    pub fn release(&mut self, id: SubscriptionId) -> bool {
        self.aspects.release(id)
    }
}

/// Upcast to [`Any`], used to find systems by concrete type.
pub trait AsAny: Any {
    /// Borrows as [`Any`].
    fn as_any(&self) -> &dyn Any;
    /// Mutably borrows as [`Any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A unit of per-frame behaviour.
///
/// Every phase has a no-op default, so a system only implements the phases
/// it takes part in. An error returned from any phase aborts that phase and
/// propagates to the scene's caller.
#[allow(unused_variables)]
pub trait System: AsAny + Send {
    /// Name used in logs.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// Called once, before the first frame or on registration if the
    /// manager is already initialized.
    ///
    /// # Errors
    ///
    /// Any error aborts initialization.
    fn initialize(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()> {
        Ok(())
    }

    /// Start of frame.
    ///
    /// # Errors
    ///
    /// Any error aborts the phase.
    fn begin(&mut self, ctx: &mut SystemContext<'_>, dt: DeltaTime) -> EcsResult<()> {
        Ok(())
    }

    /// Input handling.
    ///
    /// # Errors
    ///
    /// Any error aborts the phase.
    fn input(&mut self, ctx: &mut SystemContext<'_>, dt: DeltaTime) -> EcsResult<()> {
        Ok(())
    }

    /// Simulation.
    ///
    /// # Errors
    ///
    /// Any error aborts the phase.
    fn update(&mut self, ctx: &mut SystemContext<'_>, dt: DeltaTime) -> EcsResult<()> {
        Ok(())
    }

    /// Rendering.
    ///
    /// # Errors
    ///
    /// Any error aborts the phase.
    fn draw(&mut self, ctx: &mut SystemContext<'_>, dt: DeltaTime) -> EcsResult<()> {
        Ok(())
    }

    /// End of frame.
    ///
    /// # Errors
    ///
    /// Any error aborts the phase.
    fn end(&mut self, ctx: &mut SystemContext<'_>, dt: DeltaTime) -> EcsResult<()> {
        Ok(())
    }

    /// Releases subscriptions and owned resources.
    fn dispose(&mut self, ctx: &mut SystemContext<'_>) {}
}

/// Runs registered systems phase by phase, in registration order.
#[derive(Default)]
pub struct SystemManager {
    systems: Vec<Box<dyn System>>,
    initialized: bool,
}

impl SystemManager {
    /// Creates an empty, uninitialized manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Returns `true` if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Whether [`SystemManager::initialize`] has run.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Appends a system. If the manager is already initialized the system is
    /// initialized immediately.
    ///
    /// # Errors
    ///
    /// Propagates the system's initialization error; the system is then not
    /// registered.
    pub fn add(&mut self, mut system: Box<dyn System>, ctx: &mut SystemContext<'_>) -> EcsResult<()> {
        if self.initialized {
            system.initialize(ctx)?;
        }
        debug!(system = system.name(), order = self.systems.len(), "Registered system");
        self.systems.push(system);
        Ok(())
    }

    /// Initializes every system in registration order. Runs once.
    ///
    /// # Errors
    ///
    /// Stops at the first failing system.
    pub fn initialize(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()> {
        if self.initialized {
            return Ok(());
        }
        for system in &mut self.systems {
            system.initialize(ctx)?;
        }
        self.initialized = true;
        debug!(systems = self.systems.len(), "Initialized systems");
        Ok(())
    }

    /// Runs one phase on every system in registration order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing system.
    pub fn run(&mut self, phase: Phase, ctx: &mut SystemContext<'_>, dt: DeltaTime) -> EcsResult<()> {
        for system in &mut self.systems {
            match phase {
                Phase::Begin => system.begin(ctx, dt)?,
                Phase::Input => system.input(ctx, dt)?,
                Phase::Update => system.update(ctx, dt)?,
                Phase::Draw => system.draw(ctx, dt)?,
                Phase::End => system.end(ctx, dt)?,
            }
        }
        Ok(())
    }

    /// Runs the input phase.
    ///
    /// # Errors
    ///
    /// Stops at the first failing system.
    pub fn input(&mut self, ctx: &mut SystemContext<'_>, dt: DeltaTime) -> EcsResult<()> {
        self.run(Phase::Input, ctx, dt)
    }

    /// Runs the update phase.
    ///
    /// # Errors
    ///
    /// Stops at the first failing system.
    pub fn update(&mut self, ctx: &mut SystemContext<'_>, dt: DeltaTime) -> EcsResult<()> {
        self.run(Phase::Update, ctx, dt)
    }

    /// Runs the draw phase.
    ///
    /// # Errors
    ///
    /// Stops at the first failing system.
    pub fn draw(&mut self, ctx: &mut SystemContext<'_>, dt: DeltaTime) -> EcsResult<()> {
        self.run(Phase::Draw, ctx, dt)
    }

    /// Disposes every system and clears the list.
    pub fn dispose_and_clear(&mut self, ctx: &mut SystemContext<'_>) {
        for system in &mut self.systems {
            system.dispose(ctx);
        }
        self.systems.clear();
        self.initialized = false;
    }

    /// Finds the first registered system of type `S`.
    #[must_use]
    pub fn find<S: System>(&self) -> Option<&S> {
        self.systems
            .iter()
            .find_map(|system| (**system).as_any().downcast_ref::<S>())
    }

    /// Finds the first registered system of type `S`, mutably.
    pub fn find_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems
            .iter_mut()
            .find_map(|system| (**system).as_any_mut().downcast_mut::<S>())
    }

    /// Names of registered systems, in order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.systems.iter().map(|system| system.name())
    }
}

impl fmt::Debug for SystemManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemManager")
            .field("systems", &self.names().collect::<Vec<_>>())
            .field("initialized", &self.initialized)
            .finish()
    }
}
