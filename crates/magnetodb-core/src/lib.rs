//! Core types, configuration, and tenant state management for MagnetoDB.
//!
//! This crate provides the foundational building blocks shared by the
//! MagnetoDB crates: per-project state isolation, process-wide configuration,
//! and the project identifier every table is namespaced under.

mod config;
mod error;
mod state;
mod types;

pub use config::{LogFormat, MagnetoConfig};
pub use error::{MagnetoCoreError, MagnetoCoreResult};
pub use state::TenantStore;
pub use types::ProjectId;
