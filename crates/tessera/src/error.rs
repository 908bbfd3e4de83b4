//! # Engine Error Types

use std::path::PathBuf;

use tessera_core::EcsError;
use thiserror::Error;

/// Errors surfaced by the engine context.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The ECS core rejected an operation or a system failed a phase.
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The engine was shut down and can no longer run frames.
    #[error("engine has been shut down")]
    ShutDown,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
