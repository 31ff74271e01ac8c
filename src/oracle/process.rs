//! Wine process detection via procfs
//!
//! A game launched through Proton shows up as a process whose executable is
//! the wine preloader. Scanning `/proc/<pid>/exe` for that is enough to know
//! a managed process is running without any help from the launcher.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

use super::{RunningApp, RunningAppOracle, RunningAppSignal};
use crate::constants::{oracle, wine};

pub struct ProcessOracle {
    proc_root: PathBuf,
    own_pid: u32,
    /// Result of the last successful scan
    last: Mutex<RunningAppSignal>,
}

impl Default for ProcessOracle {
    fn default() -> Self {
        Self::with_root(oracle::PROC_ROOT)
    }
}

impl ProcessOracle {
    pub fn with_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            own_pid: std::process::id(),
            last: Mutex::new(None),
        }
    }

    /// Lowest-pid wine process, if any
    pub fn scan(&self) -> io::Result<RunningAppSignal> {
        let mut pids: Vec<u32> = fs::read_dir(&self.proc_root)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
            .filter(|pid| *pid != self.own_pid)
            .collect();
        pids.sort_unstable();

        for pid in pids {
            let dir = self.proc_root.join(pid.to_string());
            // Other users' processes are unreadable; skip rather than guess
            let Ok(exe) = fs::read_link(dir.join("exe")) else {
                continue;
            };
            let exe = exe.to_string_lossy();
            if exe.contains(wine::WINE64_PRELOADER) || exe.contains(wine::WINE_PRELOADER) {
                let display_name = display_name(&dir).unwrap_or_else(|| format!("pid {pid}"));
                debug!(pid, name = %display_name, "Found wine process");
                return Ok(Some(RunningApp { pid, display_name }));
            }
        }
        Ok(None)
    }
}

/// A failed scan repeats the last successful answer; a game seen running
/// stays running until a scan proves otherwise.
impl RunningAppOracle for ProcessOracle {
    fn running_app(&self) -> RunningAppSignal {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match self.scan() {
            Ok(signal) => {
                *last = signal.clone();
                signal
            }
            Err(e) => {
                warn!(root = %self.proc_root.display(), error = %e, "Cannot scan processes, keeping last signal");
                last.clone()
            }
        }
    }
}

/// Executable basename from argv[0] (Windows or Unix separators), else `comm`
fn display_name(dir: &Path) -> Option<String> {
    let from_cmdline = fs::read(dir.join("cmdline")).ok().and_then(|raw| {
        let argv0 = raw.split(|b| *b == 0).next()?;
        let argv0 = String::from_utf8_lossy(argv0);
        let base = argv0.rsplit(['/', '\\']).next()?.trim();
        (!base.is_empty()).then(|| base.to_string())
    });

    from_cmdline.or_else(|| {
        fs::read_to_string(dir.join("comm"))
            .ok()
            .map(|comm| comm.trim().to_string())
            .filter(|comm| !comm.is_empty())
    })
}
