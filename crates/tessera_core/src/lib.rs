//! # Tessera Core
//!
//! An aspect-driven Entity Component System:
//! - Generational entity handles that never alias after reuse
//! - Dense and sparse component storage, chosen per type
//! - Subscriptions kept in sync with entity composition at flush points
//! - Phase-scheduled systems, serial or data-parallel
//!
//! ## Architecture Rules
//!
//! 1. **Deferred structure** - create, destroy, add and remove are queued
//! 2. **Explicit registry** - component ids come from a [`TypeRegistry`]
//! 3. **No mid-pass mutation of membership** - iteration sees a stable set
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::{EntityId, SlotMap};
//!
//! let mut slots: SlotMap<EntityId, &str> = SlotMap::new();
//! let id = slots.add("player");
//! assert_eq!(slots.get(id).copied().unwrap(), "player");
//! slots.remove(id);
//! assert!(slots.get(id).is_err());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::SceneConfig;
pub use ecs::{
    AsAny, Aspect, AspectManager, AspectSubscription, Command, CommandQueue, CommandSender, Component,
    ComponentBits, ComponentMask, ComponentSet, ComponentStorage, ComponentType, DeltaTime, DenseStorage,
    Entity, EntityBag, EntityId, EntityScene, EntityState, FlushStats, Iterating, IteratingSystem, Key,
    ParallelIterating, ParallelIteratingSystem, ParallelView, Phase, SlotMap, SparseStorage, StorageKind,
    StorageRegistry, SubscriptionEvent, SubscriptionId, System, SystemContext, SystemManager,
    TypeRegistry, World, MAX_COMPONENT_TYPES,
};
pub use error::{EcsError, EcsResult};
