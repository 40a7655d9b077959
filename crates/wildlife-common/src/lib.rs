//! # Wildlife Common
//!
//! Common types shared by the wildlife behavior crates.
//!
//! This crate provides:
//! - Generational entity handles (`EntityId`)
//! - Animal kind tags used for proximity queries
//! - Error types for configuration and entity lookups
//! - A `Vec3` re-export so every crate agrees on the math type
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;
pub mod kind;

pub use glam::Vec3;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::kind::*;
    pub use glam::Vec3;
}

pub use prelude::*;
