//! # ECS Error Types
//!
//! Stale handles are reported through `Option`/`bool` returns and never reach
//! this enum. Everything here is either a logic error (forced access through a
//! dead handle) or a configuration error surfaced as early as possible.

use thiserror::Error;

/// Errors that can occur in the ECS core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// A handle asserted to be live did not resolve to a slot.
    #[error("invalid slot: index {index} generation {generation}")]
    InvalidSlot {
        /// Slot index of the offending handle.
        index: u32,
        /// Generation of the offending handle.
        generation: u32,
    },

    /// Storage was requested for a component type that was never registered.
    #[error("component type is not registered with the scene: {component}")]
    UnregisteredComponent {
        /// Rust type name of the component.
        component: &'static str,
    },

    /// A component type was registered twice on the same scene.
    #[error("component type is already registered: {component}")]
    ComponentAlreadyRegistered {
        /// Rust type name of the component.
        component: &'static str,
    },

    /// The storage for a component type is lent out to a parallel pass.
    #[error("component storage is borrowed by a parallel pass: {component}")]
    ComponentBorrowed {
        /// Rust type name of the component.
        component: &'static str,
    },

    /// The type registry ran out of mask bits.
    #[error("too many component types: limit is {limit}")]
    TooManyComponentTypes {
        /// Maximum number of distinct component types.
        limit: usize,
    },

    /// A type-erased component payload did not match its storage.
    #[error("component payload does not match storage of {expected}")]
    ComponentTypeMismatch {
        /// Rust type name the storage holds.
        expected: &'static str,
    },

    /// The command queue receiver has been dropped.
    #[error("command queue is closed")]
    CommandQueueClosed,

    /// A system failed during one of its phases.
    #[error("system {system} failed: {message}")]
    System {
        /// Name of the failing system.
        system: String,
        /// Human-readable failure description.
        message: String,
    },

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EcsError {
    /// Builds a [`EcsError::System`] failure for the named system.
    #[must_use]
    pub fn system(system: impl Into<String>, message: impl Into<String>) -> Self {
        Self::System {
            system: system.into(),
            message: message.into(),
        }
    }
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
