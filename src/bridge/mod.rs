//! Host bridge
//!
//! The bridge is the only way the core reaches a remote machine: directory
//! listings, filesystem mutations, transfers, local edit watches and session
//! teardown. The real implementation lives in the host application (SSH/SFTP
//! plumbing); `memory::MemoryBridge` is an in-process stand-in.

pub mod error;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::sftp::types::{FileEntry, FsOperation};

pub use error::BridgeError;
pub use memory::MemoryBridge;

/// A watched local copy changed on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeEvent {
    pub remote_path: String,
    pub local_path: String,
}

#[async_trait]
pub trait HostBridge: Send + Sync {
    /// List a remote directory. Order is whatever the server returns.
    async fn list_directory(
        &self,
        session_id: &str,
        path: &str,
    ) -> Result<Vec<FileEntry>, BridgeError>;

    /// Apply one structured filesystem operation.
    async fn apply(&self, session_id: &str, op: FsOperation) -> Result<(), BridgeError>;

    /// Upload a local file into `remote_dir`, keeping its file name.
    async fn upload_file(
        &self,
        session_id: &str,
        local_path: &str,
        remote_dir: &str,
    ) -> Result<(), BridgeError>;

    /// Fetch a remote file to a local path, returning that path.
    async fn download_file(&self, session_id: &str, remote_path: &str)
        -> Result<String, BridgeError>;

    /// Fetch a remote file and open it in the user's external editor.
    async fn download_and_open(
        &self,
        session_id: &str,
        remote_path: &str,
    ) -> Result<String, BridgeError>;

    /// Start reporting changes of `local_path` through [`HostBridge::file_changes`].
    async fn watch_file(&self, remote_path: &str, local_path: &str) -> Result<(), BridgeError>;

    async fn unwatch_file(&self, remote_path: &str, local_path: &str) -> Result<(), BridgeError>;

    /// Stream of change notifications for every registered watch.
    fn file_changes(&self) -> broadcast::Receiver<FileChangeEvent>;

    async fn disconnect(&self, session_id: &str) -> Result<(), BridgeError>;
}
