//! # Entity Management
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into the scene's slot map
//! - A generation counter for safe reuse

use std::fmt;

use super::component::{ComponentBits, ComponentType};
use super::slot_map::Key;

/// Unique identifier for an entity.
///
/// The ID is split into two parts:
/// - Lower 32 bits: Index into the entity slot map
/// - Upper 32 bits: Generation counter for detecting stale references
///
/// Two IDs are equal only when both parts match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new entity ID from index and generation.
    ///
    /// # Arguments
    ///
    /// * `index` - The slot index (0 to 2^32-1)
    /// * `generation` - The generation counter (0 to 2^32-1)
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the entity ID.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the entity ID.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Null/invalid entity ID.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

impl Key for EntityId {
    #[inline]
    fn from_parts(index: u32, generation: u32) -> Self {
        Self::new(index, generation)
    }

    #[inline]
    fn index(self) -> u32 {
        EntityId::index(self)
    }

    #[inline]
    fn generation(self) -> u32 {
        EntityId::generation(self)
    }
}

/// Lifecycle of an entity slot between structural flushes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityState {
    /// Allocated, not yet visible to systems.
    Pending,
    /// Visible to systems and aspect subscriptions.
    Active,
    /// Marked for destruction at the next flush.
    Destroying,
}

/// Per-entity bookkeeping held by the scene.
///
/// Tracks which component types are attached via a bitmask. The mask is
/// only updated at flush time, so it describes the composition systems
/// observed during the last frame.
#[derive(Clone, Copy, Debug)]
pub struct Entity {
    /// Bitmask of attached components.
    pub components: ComponentBits,
    /// Where this entity is in its lifecycle.
    pub state: EntityState,
}

impl Entity {
    /// Creates a freshly allocated entity with no components.
    #[inline]
    #[must_use]
    pub const fn pending() -> Self {
        Self {
            components: ComponentBits::EMPTY,
            state: EntityState::Pending,
        }
    }

    /// Whether systems can currently observe this entity.
    #[inline]
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.state == EntityState::Active
    }

    /// Checks if this entity has a specific component.
    #[inline]
    #[must_use]
    pub const fn has_component(&self, component: ComponentType) -> bool {
        self.components.contains(component)
    }

    /// Adds a component flag to this entity.
    #[inline]
    pub fn add_component(&mut self, component: ComponentType) {
        self.components.insert(component);
    }

    /// Removes a component flag from this entity.
    #[inline]
    pub fn remove_component(&mut self, component: ComponentType) {
        self.components.remove(component);
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::pending()
    }
}
