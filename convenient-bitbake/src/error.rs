//! Error types for layer resolution and engine delegation

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving layers to recipes
#[derive(Debug, Error)]
pub enum LayerError {
    #[error(
        "Unable to find layer '{name}' in current configuration; run 'show-layers' to list known layers"
    )]
    NotFound { name: String },
}

/// Errors raised by a [`crate::BuildEngine`]
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Recipes have not been parsed yet")]
    NotParsed,

    #[error("Recipe parsing interrupted")]
    Interrupted,

    #[error("Invalid BBFILES pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Failed to launch {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Layer(#[from] LayerError),
}

pub type EngineResult<T> = Result<T, EngineError>;
