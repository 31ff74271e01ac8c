#![forbid(unsafe_code)]

//! Profile management for the lsfg-vk frame generation layer
//!
//! Named, switchable configuration profiles with a protected default
//! (`decky-lsfg-vk`), guarded so that the active profile never changes under
//! a running game.

pub mod backend;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod ipc;
pub mod notify;
pub mod oracle;
pub mod prefs;
pub mod profiles;

pub use error::{ErrorKind, OperationResult, ProfileError};
pub use profiles::{ProfileOperations, ProfileSnapshot, ProfileStore};
