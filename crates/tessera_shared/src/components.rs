//! Component payloads.
//!
//! All sizes are asserted in tests; a payload growing silently changes
//! every storage and upload buffer that holds it.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use tessera_core::Component;

use crate::math::Vec3;

/// Placement of an entity in world space.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Transform {
    /// World position.
    pub position: Vec3,
    /// Euler angles in radians.
    pub rotation: Vec3,
    /// Per-axis scale.
    pub scale: Vec3,
}

impl Transform {
    /// Identity transform at `position`.
    #[must_use]
    pub const fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::at(Vec3::ZERO)
    }
}

impl Component for Transform {}

/// Rate of change of a [`Transform`], per second.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Velocity {
    /// Units per second.
    pub linear: Vec3,
    /// Radians per second.
    pub angular: Vec3,
}

impl Velocity {
    /// Pure translation.
    #[must_use]
    pub const fn linear(linear: Vec3) -> Self {
        Self {
            linear,
            angular: Vec3::ZERO,
        }
    }

    /// Advances `transform` by `seconds`.
    pub fn integrate(&self, transform: &mut Transform, seconds: f32) {
        transform.position += self.linear * seconds;
        transform.rotation += self.angular * seconds;
    }
}

impl Component for Velocity {}

/// A textured quad, as consumed by a sprite batcher.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Sprite {
    /// Texture handle owned by the renderer.
    pub texture: u32,
    /// Draw order; higher draws on top.
    pub layer: u16,
    /// Renderer-defined bit flags.
    pub flags: u16,
    /// RGBA tint.
    pub tint: [u8; 4],
}

impl Sprite {
    /// Flip horizontally.
    pub const FLIP_X: u16 = 1 << 0;
    /// Flip vertically.
    pub const FLIP_Y: u16 = 1 << 1;
    /// Skip drawing.
    pub const HIDDEN: u16 = 1 << 2;

    /// Untinted sprite of `texture` on `layer`.
    #[must_use]
    pub const fn new(texture: u32, layer: u16) -> Self {
        Self {
            texture,
            layer,
            flags: 0,
            tint: [u8::MAX; 4],
        }
    }

    /// Checks a flag.
    #[must_use]
    pub const fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }
}

impl Default for Sprite {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl Component for Sprite {}

/// Remaining time before an entity expires.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Lifetime {
    /// Seconds left.
    pub remaining: f32,
}

impl Lifetime {
    /// Expires after `seconds`.
    #[must_use]
    pub const fn new(seconds: f32) -> Self {
        Self { remaining: seconds }
    }

    /// Counts down by `seconds`. Returns `true` once expired.
    pub fn tick(&mut self, seconds: f32) -> bool {
        self.remaining -= seconds;
        self.remaining <= 0.0
    }
}

impl Component for Lifetime {}
