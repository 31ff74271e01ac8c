//! Application-wide constants
//!
//! Reserved names, file locations and timing values used across the crate,
//! kept in one place so the backend, oracle and CLI agree on them.

/// Profile identity constants
pub mod profile {
    /// Reserved name of the always-present profile (never renamed or deleted)
    pub const DEFAULT_PROFILE: &str = "decky-lsfg-vk";
}

/// Settings and persisted state locations
pub mod config {
    /// Directory under the XDG config dir holding this tool's own files
    pub const APP_DIR: &str = "lsfg-profiles";

    /// Tool settings (backend selection, oracle, log level)
    pub const SETTINGS_FILENAME: &str = "settings.toml";

    /// Cosmetic UI state (panel-collapsed flags)
    pub const PREFS_FILENAME: &str = "ui-state.json";

    /// Directory under the XDG config dir owned by the frame-generation layer
    pub const LSFG_DIR: &str = "lsfg-vk";

    /// Profile store read (and hot-reloaded) by the frame-generation layer
    pub const LSFG_CONF_FILENAME: &str = "conf.toml";

    /// Schema version written into the profile store
    pub const LSFG_CONF_VERSION: u32 = 1;
}

/// Running-app oracle constants
pub mod oracle {
    /// Fixed cadence of the running-app poll
    pub const POLL_INTERVAL_MS: u64 = 2000;

    /// Default proc filesystem mount
    pub const PROC_ROOT: &str = "/proc";
}

/// Wine process detection constants
pub mod wine {
    /// Wine 64-bit preloader process name
    pub const WINE64_PRELOADER: &str = "wine64-preloader";

    /// Wine 32-bit preloader process name
    pub const WINE_PRELOADER: &str = "wine-preloader";
}

/// Backend socket constants
pub mod ipc {
    /// Socket path relative to the runtime (or cache) dir
    pub const SOCKET_RELATIVE_PATH: &str = "lsfg-profiles/backend.sock";

    /// Maximum message size (10 MB) to prevent DoS via memory exhaustion
    pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;
}
