//! Configuration Management Module
//!
//! Handles persistent storage of user settings for tabs and the remote file
//! browser.

pub mod storage;
pub mod types;

pub use storage::{config_dir, settings_file, ConfigStorage, StorageError};
pub use types::{Settings, CONFIG_VERSION};
