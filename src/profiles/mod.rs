//! Profile management
//!
//! - **store**: cached profile set and active pointer
//! - **operations**: the guarded mutations that keep both consistent

pub mod operations;
pub mod store;

pub use operations::{AutoSwitch, CreateOutcome, OptionChange, ProfileOperations};
pub use store::{ProfileSnapshot, ProfileStore};
