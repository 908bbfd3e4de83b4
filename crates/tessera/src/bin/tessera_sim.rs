//! # Tessera Headless Simulation
//!
//! Spawns a field of moving, expiring sprites and runs a fixed number of
//! frames, then prints the averaged frame statistics.
//!
//! Usage: `tessera_sim [config.toml] [frames]`

use tessera::shared::{Lifetime, Sprite, Transform, Vec3, Velocity};
use tessera::{Engine, EngineConfig, EngineResult};

const DEFAULT_FRAMES: u64 = 600;

fn spawn_field(engine: &mut Engine) -> EngineResult<usize> {
    let count = engine.config().scene.entity_capacity;
    let scene = engine.scene_mut();
    for i in 0..count {
        #[allow(clippy::cast_precision_loss)]
        let f = i as f32;
        let entity = scene.create_entity();
        scene.add_component(entity, Transform::at(Vec3::new(f, 0.0, 0.0)))?;
        scene.add_component(entity, Velocity::linear(Vec3::new(0.0, 1.0 + f % 3.0, 0.0)))?;
        let texture = u32::try_from(i % 16).unwrap_or_default();
        let layer = u16::try_from(i % 4).unwrap_or_default();
        scene.add_component(entity, Sprite::new(texture, layer))?;
        // Every fourth entity expires between one and five seconds in.
        if i % 4 == 0 {
            scene.add_component(entity, Lifetime::new(1.0 + f % 5.0))?;
        }
    }
    Ok(count)
}

fn run() -> EngineResult<()> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let frames = args
        .next()
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_FRAMES);
    let step = config.frame_budget();

    let mut engine = Engine::new(config)?;
    engine.register_stock_systems()?;
    let spawned = spawn_field(&mut engine)?;
    engine.start()?;

    println!("Spawned {spawned} entities, running {frames} frames at {step:?} per frame");
    engine.run_frames(frames, step)?;
    engine.stats().print_summary();
    println!("Alive at exit:    {}", engine.scene().entity_count());

    engine.shutdown();
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("tessera_sim: {e}");
        std::process::exit(1);
    }
}
