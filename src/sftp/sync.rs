//! External edit synchronization
//!
//! Tracks the one file a tab has open in an external editor. The remote file
//! is fetched to a local copy, the copy is watched through the host bridge,
//! and every change notification asks the user whether to push the copy back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::SftpError;
use super::path_utils::{file_name, parent_of};
use crate::bridge::{FileChangeEvent, HostBridge};
use crate::prompt::{NoticeLevel, UserPrompt};

/// Remote file paired with its locally edited copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchedFile {
    pub session_id: String,
    pub remote_path: String,
    pub local_path: String,
}

impl WatchedFile {
    pub fn matches(&self, event: &FileChangeEvent) -> bool {
        self.remote_path == event.remote_path && self.local_path == event.local_path
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    /// Not our file, or a prompt for it is already open
    Ignored,
    /// User chose not to upload; the watch stays active
    Declined,
    Uploaded,
    Failed,
}

/// Clears the in-flight prompt flag on drop.
struct PromptGuard<'a>(&'a AtomicBool);

impl Drop for PromptGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct FileSyncWatcher {
    tab_label: String,
    bridge: Arc<dyn HostBridge>,
    prompt: Arc<dyn UserPrompt>,
    watched: RwLock<Option<WatchedFile>>,
    /// Held across open/release so the slot never has two registrations
    slot_lock: Mutex<()>,
    prompting: AtomicBool,
}

impl FileSyncWatcher {
    pub fn new(
        tab_label: impl Into<String>,
        bridge: Arc<dyn HostBridge>,
        prompt: Arc<dyn UserPrompt>,
    ) -> Self {
        Self {
            tab_label: tab_label.into(),
            bridge,
            prompt,
            watched: RwLock::new(None),
            slot_lock: Mutex::new(()),
            prompting: AtomicBool::new(false),
        }
    }

    pub fn watched(&self) -> Option<WatchedFile> {
        self.watched.read().clone()
    }

    /// Fetch `remote_path`, open it externally and start watching the copy.
    ///
    /// Any previous watch of this tab is released first.
    pub async fn open_for_edit(
        &self,
        session_id: &str,
        remote_path: &str,
    ) -> Result<WatchedFile, SftpError> {
        let _slot = self.slot_lock.lock().await;
        self.release_slot().await;

        let local_path = match self.bridge.download_and_open(session_id, remote_path).await {
            Ok(path) => path,
            Err(e) => {
                warn!("[{}] Failed to open {}: {}", self.tab_label, remote_path, e);
                self.prompt.notify(
                    NoticeLevel::Error,
                    &format!("Failed to open {}: {}", remote_path, e),
                );
                return Err(e.into());
            }
        };

        if let Err(e) = self.bridge.watch_file(remote_path, &local_path).await {
            warn!("[{}] Failed to watch {}: {}", self.tab_label, local_path, e);
            self.prompt.notify(
                NoticeLevel::Error,
                &format!("Opened {} but changes will not be tracked: {}", remote_path, e),
            );
            return Err(e.into());
        }

        let watched = WatchedFile {
            session_id: session_id.to_string(),
            remote_path: remote_path.to_string(),
            local_path,
        };
        let displaced = self.watched.write().replace(watched.clone());
        if let Some(displaced) = displaced {
            self.unwatch(&displaced).await;
        }

        info!(
            "[{}] Watching {} -> {}",
            self.tab_label, watched.remote_path, watched.local_path
        );
        Ok(watched)
    }

    /// React to a change notification from the bridge.
    pub async fn handle_change(&self, event: &FileChangeEvent) -> SyncOutcome {
        let watched = match self.watched() {
            Some(w) if w.matches(event) => w,
            _ => return SyncOutcome::Ignored,
        };

        if self.prompting.swap(true, Ordering::SeqCst) {
            debug!(
                "[{}] Change for {} while prompt is open, skipping",
                self.tab_label, watched.remote_path
            );
            return SyncOutcome::Ignored;
        }
        let guard = PromptGuard(&self.prompting);

        let question = format!(
            "{} was modified locally. Upload it to {}?",
            file_name(&watched.remote_path),
            watched.remote_path
        );
        let confirmed = self.prompt.confirm(&question).await;
        drop(guard);

        if !confirmed {
            debug!("[{}] Upload of {} declined", self.tab_label, watched.remote_path);
            return SyncOutcome::Declined;
        }

        let remote_dir = parent_of(&watched.remote_path);
        match self
            .bridge
            .upload_file(&watched.session_id, &watched.local_path, &remote_dir)
            .await
        {
            Ok(()) => {
                info!("[{}] Uploaded {}", self.tab_label, watched.remote_path);
                self.prompt.notify(
                    NoticeLevel::Success,
                    &format!("Uploaded {}", watched.remote_path),
                );
                SyncOutcome::Uploaded
            }
            Err(e) => {
                warn!("[{}] Upload of {} failed: {}", self.tab_label, watched.remote_path, e);
                self.prompt.notify(
                    NoticeLevel::Error,
                    &format!("Failed to upload {}: {}", watched.remote_path, e),
                );
                SyncOutcome::Failed
            }
        }
    }

    /// Drop the current watch, if any, and unregister it with the bridge.
    ///
    /// Waits for an `open_for_edit` in flight, then releases what it registered.
    pub async fn release(&self) {
        let _slot = self.slot_lock.lock().await;
        self.release_slot().await;
    }

    async fn release_slot(&self) {
        let previous = self.watched.write().take();
        if let Some(watched) = previous {
            self.unwatch(&watched).await;
        }
    }

    async fn unwatch(&self, watched: &WatchedFile) {
        debug!("[{}] Releasing watch on {}", self.tab_label, watched.remote_path);
        if let Err(e) = self
            .bridge
            .unwatch_file(&watched.remote_path, &watched.local_path)
            .await
        {
            warn!(
                "[{}] Failed to unwatch {}: {}",
                self.tab_label, watched.local_path, e
            );
        }
    }
}
