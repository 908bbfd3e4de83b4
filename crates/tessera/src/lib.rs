//! # Tessera
//!
//! The engine context around the ECS core.
//!
//! ```text
//! Engine
//! ├─ TypeRegistry      (one per process, threaded into every aspect)
//! ├─ EntityScene       (world, subscriptions, systems)
//! └─ FrameStats        (per-phase timing, averaged over the run)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use tessera::{Engine, EngineConfig};
//! use tessera::shared::{Lifetime, Transform, Vec3, Velocity};
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! engine.register_stock_systems().unwrap();
//! engine.start().unwrap();
//!
//! let scene = engine.scene_mut();
//! let ship = scene.create_entity();
//! scene.add_component(ship, Transform::default()).unwrap();
//! scene.add_component(ship, Velocity::linear(Vec3::new(1.0, 0.0, 0.0))).unwrap();
//! scene.add_component(ship, Lifetime::new(10.0)).unwrap();
//!
//! let stats = engine.frame(Duration::from_millis(16)).unwrap();
//! assert_eq!(stats.flush.created, 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod engine;
pub mod error;
pub mod stats;
pub mod systems;

/// Re-export of the ECS core.
pub use tessera_core as core;
/// Re-export of the shared component payloads.
pub use tessera_shared as shared;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use stats::{FrameStats, FrameStatsAccumulator};
pub use systems::{LifetimeSystem, MovementSystem};
