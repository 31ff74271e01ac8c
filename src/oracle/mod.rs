//! Running-app oracle
//!
//! Answers "is a managed process in the foreground right now?". Profile
//! operations only care whether the answer is empty; the identity is kept
//! for messages shown to the user.

use serde::Serialize;

pub mod poller;
pub mod process;

pub use poller::{PollHandle, spawn_poller};
pub use process::ProcessOracle;

/// The managed process currently in the foreground
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningApp {
    pub pid: u32,
    pub display_name: String,
}

/// Latest poll result; `None` means nothing is running
pub type RunningAppSignal = Option<RunningApp>;

/// Synchronous source of the running-app signal
pub trait RunningAppOracle: Send + Sync {
    fn running_app(&self) -> RunningAppSignal;
}

/// Oracle used when detection is disabled in settings
pub struct NoRunningApp;

impl RunningAppOracle for NoRunningApp {
    fn running_app(&self) -> RunningAppSignal {
        None
    }
}
