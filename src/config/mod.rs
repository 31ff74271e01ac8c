//! Configuration for lsfg-profiles
//!
//! This module provides two config layers:
//! - **schema**: the per-profile frame-generation options a backend stores
//! - **settings**: the tool's own settings file (backend selection, oracle, logging)

pub mod schema;
pub mod settings;

pub use schema::{ConfigField, ConfigValue, ConfigurationData, PresentMode, SchemaError, ValueKind};
pub use settings::{AppSettings, BackendKind, BackendSettings, OracleSettings};
