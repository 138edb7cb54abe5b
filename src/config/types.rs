//! Settings file types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sftp::path_utils::{default_shortcuts, PathShortcut};

/// Current settings file version
pub const CONFIG_VERSION: u32 = 1;

/// Default number of remembered paths per navigator
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Default delay before the path bar drops its success highlight
pub const DEFAULT_STATUS_RESET_MS: u64 = 1500;

/// Persisted settings for tabs and the remote file browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub version: u32,
    /// Maximum entries kept in each navigator's path history
    pub history_limit: usize,
    /// Milliseconds before a successful path-bar navigation returns to normal
    pub status_reset_ms: u64,
    /// Directory listed when a tab connects
    pub default_path: String,
    /// Tab label used until a session is bound
    pub placeholder_name: String,
    /// Path-bar shortcut table, first match wins
    pub shortcuts: Vec<PathShortcut>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            history_limit: DEFAULT_HISTORY_LIMIT,
            status_reset_ms: DEFAULT_STATUS_RESET_MS,
            default_path: "/".to_string(),
            placeholder_name: "New Tab".to_string(),
            shortcuts: default_shortcuts(),
        }
    }
}

impl Settings {
    pub fn status_reset_delay(&self) -> Duration {
        Duration::from_millis(self.status_reset_ms)
    }
}
