//! sshtabs - session tabs for an SSH client shell
//!
//! Tabs bound to remote sessions, a per-tab remote file browser and the
//! edit-locally/upload-on-save loop. Everything that touches a remote
//! machine goes through [`bridge::HostBridge`]; user interaction goes
//! through [`prompt::UserPrompt`].

pub mod bridge;
pub mod config;
pub mod prompt;
pub mod session;
pub mod sftp;

pub use bridge::{BridgeError, FileChangeEvent, HostBridge, MemoryBridge};
pub use config::{ConfigStorage, Settings};
pub use prompt::{LogPrompt, NoticeLevel, UserPrompt};
pub use session::{CloseOutcome, SessionData, SessionTabRegistry, Tab, TabId};
pub use sftp::{RemoteFileNavigator, SftpError};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging
///
/// Honors `RUST_LOG`, defaulting to `info`. Safe to call more than once.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
