//! Remote file browser module
//!
//! Provides per-tab remote directory navigation, structured file mutations
//! and the external edit/re-upload loop.

pub mod error;
pub mod history;
pub mod names;
pub mod navigator;
pub mod path_utils;
pub mod sync;
pub mod types;

pub use error::SftpError;
pub use history::PathHistory;
pub use names::{is_valid_file_name, validate_file_name, NameError};
pub use navigator::{InputStatus, LoadState, NavigatorState, PathInput, RemoteFileNavigator};
pub use sync::{FileSyncWatcher, SyncOutcome, WatchedFile};
pub use types::*;
