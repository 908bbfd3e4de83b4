//! # Entity Component System
//!
//! Entities are generational handles, components live in per-type storages,
//! and systems see the entities whose component set matches their aspect.
//!
//! ## Design Rules
//!
//! - Entity handles carry a generation, so stale handles never alias
//! - Component types get small dense ids from an explicit registry
//! - Structural changes are queued and applied at flush boundaries
//! - Subscriptions are maintained incrementally, never rebuilt by scan

mod aspect;
mod bag;
mod command;
mod component;
mod entity;
mod iterating;
mod scene;
mod slot_map;
mod storage;
mod subscription;
mod system;
mod world;

pub use aspect::{Aspect, ComponentMask};
pub use bag::EntityBag;
pub use command::{Command, CommandQueue, CommandSender};
pub use component::{Component, ComponentBits, ComponentSet, ComponentType, TypeRegistry, MAX_COMPONENT_TYPES};
pub use entity::{Entity, EntityId, EntityState};
pub use iterating::{Iterating, IteratingSystem, ParallelIterating, ParallelIteratingSystem, ParallelView};
pub use scene::EntityScene;
pub use slot_map::{Key, SlotMap};
pub use storage::{ComponentStorage, DenseStorage, SparseStorage, StorageKind, StorageRegistry};
pub use subscription::{AspectManager, AspectSubscription, SubscriptionEvent, SubscriptionId};
pub use system::{AsAny, DeltaTime, Phase, System, SystemContext, SystemManager};
pub use world::{FlushStats, World};
