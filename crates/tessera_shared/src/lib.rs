//! # Tessera Shared
//!
//! Component payloads shared by gameplay systems and external
//! collaborators (renderers, physics, tooling).
//!
//! ## Rules
//!
//! - Every payload is `Copy + Default` plain data
//! - Layouts are `#[repr(C)]` and `bytemuck::Pod`
//! - Payloads carry no entity references

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod components;
pub mod math;

pub use components::{Lifetime, Sprite, Transform, Velocity};
pub use math::Vec3;
