//! Error types for the wildlife crates.
//!
//! Behavior operations recover locally and never return these. They cover
//! configuration loading and lookups the caller explicitly asked for.

use std::path::PathBuf;

use thiserror::Error;

use crate::ids::EntityId;
use crate::kind::AnimalKind;

/// Top-level error type for wildlife operations.
#[derive(Debug, Error)]
pub enum WildlifeError {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Handle does not resolve to a live animal
    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// Animal exists but plays a different role
    #[error("Entity {id} is not a {expected}")]
    WrongKind {
        /// Entity that was looked up
        id: EntityId,
        /// Kind the operation required
        expected: AnimalKind,
    },
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Failed to read file.
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    /// Failed to parse TOML.
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// One or more tunables are out of range.
    #[error("Invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Result type alias for wildlife operations.
pub type WildlifeResult<T> = Result<T, WildlifeError>;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
