//! # Engine
//!
//! ```text
//! Frame N:
//!   begin  -> input -> update -> flush -> draw -> end -> flush
//!   |__________________ timed per phase __________________|
//! ```
//!
//! The engine owns the only [`TypeRegistry`] of the process; everything
//! that builds an aspect borrows it from here.

use std::time::{Duration, Instant};

use tessera_core::{
    ComponentStorage, DeltaTime, EntityScene, Iterating, ParallelIterating, StorageKind, TypeRegistry,
};
use tessera_shared::{Lifetime, Sprite, Transform, Velocity};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::stats::{micros, FrameStats, FrameStatsAccumulator};
use crate::systems::{LifetimeSystem, MovementSystem};

/// Runs `f` and returns its result with the elapsed microseconds.
fn timed<R>(f: impl FnOnce() -> R) -> (R, u64) {
    let start = Instant::now();
    let result = f();
    (result, micros(start.elapsed()))
}

/// The engine context: type registry, scene and frame loop.
pub struct Engine {
    config: EngineConfig,
    types: TypeRegistry,
    scene: EntityScene,
    stats: FrameStatsAccumulator,
    frame: u64,
    started: bool,
}

impl Engine {
    /// Creates an engine with the shared components registered.
    ///
    /// `Transform` and `Velocity` are dense (most entities move),
    /// `Lifetime` is sparse, `Sprite` uses the configured default.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is out of range.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let types = TypeRegistry::new();
        let capacity = config.scene.entity_capacity;
        let mut scene = EntityScene::with_config(types.clone(), config.scene.clone());
        scene.register_component(ComponentStorage::<Transform>::with_kind(StorageKind::Dense, capacity))?;
        scene.register_component(ComponentStorage::<Velocity>::with_kind(StorageKind::Dense, capacity))?;
        scene.register_component(ComponentStorage::<Lifetime>::sparse())?;
        scene.register_default_component::<Sprite>()?;

        Ok(Self {
            stats: FrameStatsAccumulator::new(config.frame_budget()),
            config,
            types,
            scene,
            frame: 0,
            started: false,
        })
    }

    /// Registers [`MovementSystem`] then [`LifetimeSystem`].
    ///
    /// # Errors
    ///
    /// Propagates system initialization errors if the engine is running.
    pub fn register_stock_systems(&mut self) -> EngineResult<()> {
        self.scene.register_system(ParallelIterating::new(MovementSystem))?;
        self.scene.register_system(Iterating::new(LifetimeSystem::default()))?;
        Ok(())
    }

    /// Initializes systems and applies everything queued so far. Runs once.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ShutDown`] after [`Engine::shutdown`], otherwise
    /// propagates the first failing system.
    pub fn start(&mut self) -> EngineResult<()> {
        if self.scene.is_disposed() {
            return Err(EngineError::ShutDown);
        }
        if self.started {
            return Ok(());
        }
        self.scene.initialize()?;
        let flushed = self.scene.flush()?;
        self.started = true;
        debug!(
            systems = self.scene.systems().len(),
            entities = flushed.created,
            "Engine started"
        );
        Ok(())
    }

    /// Runs one frame of `elapsed` wall time, clamped to the configured
    /// maximum delta. Starts the engine if needed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ShutDown`] after [`Engine::shutdown`].
    /// Otherwise propagates the first failing system; the rest of the frame
    /// is skipped.
    pub fn frame(&mut self, elapsed: Duration) -> EngineResult<FrameStats> {
        self.start()?;
        let dt = DeltaTime::from(elapsed).clamp_to(DeltaTime::from_secs(self.config.max_delta_seconds));
        let frame_start = Instant::now();
        let scene = &mut self.scene;

        let (begin, begin_us) = timed(|| scene.begin(dt));
        begin?;
        let (input, input_us) = timed(|| scene.input(dt));
        input?;
        let (update, update_us) = timed(|| scene.update(dt));
        let mut flush = update?;
        let (draw, draw_us) = timed(|| scene.draw(dt));
        draw?;
        let (end, end_us) = timed(|| scene.end(dt));
        flush += end?;

        let stats = FrameStats {
            frame: self.frame,
            total_us: micros(frame_start.elapsed()),
            begin_us,
            input_us,
            update_us,
            draw_us,
            end_us,
            entities: self.scene.entity_count(),
            flush,
        };
        self.stats.record(&stats);
        self.frame += 1;

        if self.config.log_frame_stats {
            info!(
                frame = stats.frame,
                total_us = stats.total_us,
                update_us = stats.update_us,
                entities = stats.entities,
                created = flush.created,
                destroyed = flush.destroyed,
                "Frame"
            );
        }
        Ok(stats)
    }

    /// Runs `count` frames of `elapsed` each.
    ///
    /// # Errors
    ///
    /// Stops at the first failing frame.
    pub fn run_frames(&mut self, count: u64, elapsed: Duration) -> EngineResult<()> {
        for _ in 0..count {
            self.frame(elapsed)?;
        }
        Ok(())
    }

    /// Disposes the scene. Later [`Engine::start`] and [`Engine::frame`]
    /// calls fail with [`EngineError::ShutDown`].
    pub fn shutdown(&mut self) {
        self.scene.dispose();
        debug!(frames = self.frame, "Engine shut down");
    }

    /// The process-wide type registry.
    #[must_use]
    pub const fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The scene.
    #[must_use]
    pub const fn scene(&self) -> &EntityScene {
        &self.scene
    }

    /// The scene, mutably.
    pub fn scene_mut(&mut self) -> &mut EntityScene {
        &mut self.scene
    }

    /// Statistics accumulated over every frame run so far.
    #[must_use]
    pub const fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats
    }

    /// Frames run so far.
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Whether [`Engine::start`] has run.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("frame", &self.frame)
            .field("started", &self.started)
            .field("scene", &self.scene)
            .finish_non_exhaustive()
    }
}
