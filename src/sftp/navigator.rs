//! Remote file navigator
//!
//! One navigator per tab. It owns the current remote directory, its latest
//! listing and the visited-path history, and it drives the path bar's
//! transient feedback.
//!
//! Every listing request takes a token from a per-navigator counter. Only the
//! response carrying the most recent token may commit, so a slow listing
//! that resolves after a newer one is dropped instead of overwriting it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::error::SftpError;
use super::history::PathHistory;
use super::names::{checked_name, validate_entry_name};
use super::path_utils::{
    expand_shortcuts, join_remote_path, normalize_remote_path, parent_of, resolve_input,
    split_for_completion,
};
use super::sync::{FileSyncWatcher, WatchedFile};
use super::types::{
    directories_first, Completion, DisplayEntry, FileEntry, LoadOutcome, MutationOutcome,
    MutationRequest,
};
use crate::bridge::HostBridge;
use crate::config::Settings;
use crate::prompt::{NoticeLevel, UserPrompt};

/// Data state of the listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum LoadState {
    Idle,
    Loading,
    Success,
    Error(String),
}

/// Path bar highlight, independent of the listing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputStatus {
    Normal,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathInput {
    pub text: String,
    pub status: InputStatus,
}

/// Everything the file pane renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigatorState {
    pub current_path: String,
    pub entries: Vec<FileEntry>,
    pub history: PathHistory,
    pub load_state: LoadState,
    pub input: PathInput,
}

impl NavigatorState {
    fn new(history_limit: usize) -> Self {
        Self {
            current_path: "/".to_string(),
            entries: Vec::new(),
            history: PathHistory::new(history_limit),
            load_state: LoadState::Idle,
            input: PathInput {
                text: "/".to_string(),
                status: InputStatus::Normal,
            },
        }
    }

    /// Listing with the synthetic `..` row when not at the root.
    pub fn display_entries(&self) -> Vec<DisplayEntry> {
        let mut rows = Vec::with_capacity(self.entries.len() + 1);
        if self.current_path != "/" {
            rows.push(DisplayEntry::Parent);
        }
        rows.extend(self.entries.iter().cloned().map(DisplayEntry::Entry));
        rows
    }
}

pub struct RemoteFileNavigator {
    tab_label: String,
    bridge: Arc<dyn HostBridge>,
    prompt: Arc<dyn UserPrompt>,
    sync: Arc<FileSyncWatcher>,
    settings: Arc<Settings>,
    session_id: RwLock<Option<String>>,
    state: watch::Sender<NavigatorState>,
    /// Latest issued listing token
    request_seq: AtomicU64,
    /// Latest path-bar navigation, guards the delayed status reset
    status_seq: AtomicU64,
}

impl RemoteFileNavigator {
    pub fn new(
        tab_label: impl Into<String>,
        bridge: Arc<dyn HostBridge>,
        prompt: Arc<dyn UserPrompt>,
        sync: Arc<FileSyncWatcher>,
        settings: Arc<Settings>,
    ) -> Self {
        let (state, _) = watch::channel(NavigatorState::new(settings.history_limit));
        Self {
            tab_label: tab_label.into(),
            bridge,
            prompt,
            sync,
            settings,
            session_id: RwLock::new(None),
            state,
            request_seq: AtomicU64::new(0),
            status_seq: AtomicU64::new(0),
        }
    }

    // ========================================================================
    // Session binding
    // ========================================================================

    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Bind to a connected session. In-flight requests for a previous
    /// session are invalidated.
    pub fn attach_session(&self, session_id: &str) {
        let mut current = self.session_id.write();
        if current.as_deref() != Some(session_id) {
            self.request_seq.fetch_add(1, Ordering::SeqCst);
            *current = Some(session_id.to_string());
            debug!("[{}] Navigator attached to {}", self.tab_label, session_id);
        }
    }

    /// Forget the session and drop the cached listing.
    pub fn detach_session(&self) {
        self.request_seq.fetch_add(1, Ordering::SeqCst);
        self.status_seq.fetch_add(1, Ordering::SeqCst);
        if self.session_id.write().take().is_some() {
            debug!("[{}] Navigator detached", self.tab_label);
        }
        self.state.send_modify(|s| {
            s.entries.clear();
            s.load_state = LoadState::Idle;
            s.input.text = s.current_path.clone();
            s.input.status = InputStatus::Normal;
        });
    }

    pub fn is_attached(&self) -> bool {
        self.session_id.read().is_some()
    }

    // ========================================================================
    // Read access
    // ========================================================================

    pub fn snapshot(&self) -> NavigatorState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NavigatorState> {
        self.state.subscribe()
    }

    pub fn current_path(&self) -> String {
        self.state.borrow().current_path.clone()
    }

    pub fn entries(&self) -> Vec<FileEntry> {
        self.state.borrow().entries.clone()
    }

    pub fn display_entries(&self) -> Vec<DisplayEntry> {
        self.state.borrow().display_entries()
    }

    pub fn input(&self) -> PathInput {
        self.state.borrow().input.clone()
    }

    pub fn entry(&self, name: &str) -> Option<FileEntry> {
        self.state
            .borrow()
            .entries
            .iter()
            .find(|e| e.name == name)
            .cloned()
    }

    pub fn sync(&self) -> &Arc<FileSyncWatcher> {
        &self.sync
    }

    /// Replace the path bar text without navigating.
    pub fn set_input_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.send_modify(|s| s.input.text = text);
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// List `path` and make it the current directory.
    pub async fn load(&self, path: &str) -> Result<LoadOutcome, SftpError> {
        let session_id = self.session_id().ok_or(SftpError::NoSession)?;
        let path = normalize_remote_path(path);
        let token = self.request_seq.fetch_add(1, Ordering::SeqCst) + 1;

        self.state.send_modify(|s| s.load_state = LoadState::Loading);
        debug!("[{}] Listing {} (request {})", self.tab_label, path, token);

        let result = self.bridge.list_directory(&session_id, &path).await;

        if self.request_seq.load(Ordering::SeqCst) != token {
            debug!(
                "[{}] Discarding stale listing of {} (request {})",
                self.tab_label, path, token
            );
            return Ok(LoadOutcome::Superseded);
        }

        match result {
            Ok(entries) => {
                let entries = directories_first(entries);
                debug!("[{}] {} entries in {}", self.tab_label, entries.len(), path);
                self.state.send_modify(|s| {
                    s.current_path = path.clone();
                    s.entries = entries;
                    s.history.push(&path);
                    s.load_state = LoadState::Success;
                    s.input.text = path.clone();
                });
                Ok(LoadOutcome::Applied)
            }
            Err(e) => {
                warn!("[{}] Failed to list {}: {}", self.tab_label, path, e);
                let message = e.to_string();
                self.state
                    .send_modify(|s| s.load_state = LoadState::Error(message));
                self.prompt.notify(
                    NoticeLevel::Error,
                    &format!("Failed to open {}: {}", path, e),
                );
                Err(e.into())
            }
        }
    }

    /// Load the configured start directory after a connect.
    pub async fn initialize(&self) -> Result<LoadOutcome, SftpError> {
        let start = self.settings.default_path.clone();
        info!("[{}] Initializing file browser at {}", self.tab_label, start);
        self.load(&start).await
    }

    /// Reload the current directory.
    pub async fn refresh(&self) -> Result<LoadOutcome, SftpError> {
        let cwd = self.current_path();
        self.load(&cwd).await
    }

    /// Navigate to what the user typed in the path bar.
    ///
    /// The path bar shows `Loading`, then `Success` for the configured delay,
    /// or `Error` until the next navigation. On failure its text goes back to
    /// the current directory.
    pub async fn navigate_to_path(self: &Arc<Self>, raw: &str) -> Result<LoadOutcome, SftpError> {
        if raw.trim().is_empty() {
            self.prompt
                .notify(NoticeLevel::Warning, "Enter a path to navigate to");
            return Err(SftpError::EmptyInput);
        }

        let target = resolve_input(raw, &self.current_path(), &self.settings.shortcuts);
        let status_token = self.status_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|s| {
            s.input.text = target.clone();
            s.input.status = InputStatus::Loading;
        });

        let result = self.load(&target).await;
        let latest = self.status_seq.load(Ordering::SeqCst) == status_token;

        match result {
            Ok(LoadOutcome::Applied) => {
                if latest {
                    self.state.send_modify(|s| s.input.status = InputStatus::Success);
                    self.schedule_status_reset(status_token);
                }
                Ok(LoadOutcome::Applied)
            }
            Ok(LoadOutcome::Superseded) => {
                // Replaced by a plain load; nothing else will clear the indicator
                if latest {
                    self.state.send_modify(|s| s.input.status = InputStatus::Normal);
                }
                Ok(LoadOutcome::Superseded)
            }
            Err(e) => {
                if latest {
                    self.state.send_modify(|s| {
                        s.input.text = s.current_path.clone();
                        s.input.status = InputStatus::Error;
                    });
                }
                Err(e)
            }
        }
    }

    fn schedule_status_reset(self: &Arc<Self>, status_token: u64) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!("[{}] No runtime for status reset, resetting now", self.tab_label);
                self.state.send_modify(|s| s.input.status = InputStatus::Normal);
                return;
            }
        };
        let navigator = Arc::downgrade(self);
        let delay = self.settings.status_reset_delay();
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(navigator) = navigator.upgrade() {
                if navigator.status_seq.load(Ordering::SeqCst) == status_token {
                    navigator.state.send_modify(|s| {
                        if s.input.status == InputStatus::Success {
                            s.input.status = InputStatus::Normal;
                        }
                    });
                }
            }
        });
    }

    /// Tab-complete a directory name in the path bar.
    ///
    /// Failures are swallowed: completion must never interrupt typing.
    pub async fn complete_path(&self, partial: &str) -> Completion {
        let session_id = match self.session_id() {
            Some(id) => id,
            None => return Completion::NoMatch,
        };

        let expanded = expand_shortcuts(partial.trim(), &self.settings.shortcuts);
        let (dir, fragment) = split_for_completion(&expanded, &self.current_path());

        let entries = match self.bridge.list_directory(&session_id, &dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("[{}] Completion listing of {} failed: {}", self.tab_label, dir, e);
                return Completion::NoMatch;
            }
        };

        let mut matches: Vec<String> = entries
            .into_iter()
            .filter(|e| e.is_dir() && e.name.starts_with(&fragment))
            .map(|e| e.name)
            .collect();

        match matches.len() {
            0 => Completion::NoMatch,
            1 => {
                let name = matches.remove(0);
                let text = format!("{}/", join_remote_path(&dir, &name));
                self.set_input_text(text.clone());
                Completion::Completed(text)
            }
            _ => Completion::Candidates(matches),
        }
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Step back through history. Only the path bar text changes.
    pub fn history_back(&self) -> Option<String> {
        self.step_history(PathHistory::back)
    }

    /// Step forward through history. Only the path bar text changes.
    pub fn history_forward(&self) -> Option<String> {
        self.step_history(PathHistory::forward)
    }

    fn step_history(&self, step: fn(&mut PathHistory) -> Option<String>) -> Option<String> {
        let mut selected = None;
        self.state.send_modify(|s| {
            if let Some(path) = step(&mut s.history) {
                s.input.text = path.clone();
                selected = Some(path);
            }
        });
        selected
    }

    // ========================================================================
    // Entries
    // ========================================================================

    /// Activate a row: enter directories, go up on `..`, open files for edit.
    pub async fn open_entry(&self, row: &DisplayEntry) -> Result<Option<WatchedFile>, SftpError> {
        let cwd = self.current_path();
        match row {
            DisplayEntry::Parent => {
                self.load(&parent_of(&cwd)).await?;
                Ok(None)
            }
            DisplayEntry::Entry(entry) if entry.is_dir() => {
                validate_entry_name(&entry.name)?;
                self.load(&join_remote_path(&cwd, &entry.name)).await?;
                Ok(None)
            }
            DisplayEntry::Entry(entry) => {
                validate_entry_name(&entry.name)?;
                let session_id = self.session_id().ok_or(SftpError::NoSession)?;
                let remote_path = join_remote_path(&cwd, &entry.name);
                let watched = self.sync.open_for_edit(&session_id, &remote_path).await?;
                Ok(Some(watched))
            }
        }
    }

    /// Create, delete or rename an entry of the current directory.
    ///
    /// Names are validated before anything is sent; deletes need the user's
    /// confirmation. A successful operation is followed by a reload of the
    /// current directory.
    pub async fn mutate(&self, request: MutationRequest) -> Result<MutationOutcome, SftpError> {
        let session_id = self.session_id().ok_or(SftpError::NoSession)?;
        let cwd = self.current_path();

        let name = match self.checked_request_name(&request) {
            Ok(name) => name,
            Err(e) => {
                self.prompt.notify(NoticeLevel::Warning, &e.to_string());
                return Err(e);
            }
        };

        match &request {
            MutationRequest::Delete { entry } => {
                let kind = if entry.is_dir() { "folder" } else { "file" };
                let question = format!(
                    "Delete {} \"{}\"? This cannot be undone.",
                    kind, entry.name
                );
                if !self.prompt.confirm(&question).await {
                    info!("[{}] Delete of {} cancelled", self.tab_label, entry.name);
                    return Ok(MutationOutcome::Cancelled);
                }
            }
            MutationRequest::Rename { entry, .. } if entry.name == name => {
                return Ok(MutationOutcome::Unchanged);
            }
            _ => {}
        }

        let op = request.to_operation(&cwd, &name);
        info!("[{}] Applying {:?} to {}", self.tab_label, op, op.target());

        if let Err(e) = self.bridge.apply(&session_id, op.clone()).await {
            warn!("[{}] {:?} failed: {}", self.tab_label, op, e);
            self.prompt
                .notify(NoticeLevel::Error, &format!("Operation failed: {}", e));
            return Err(e.into());
        }

        self.prompt.notify(NoticeLevel::Success, &op.describe());
        // The user may have moved on while the confirmation was open
        if self.current_path() != cwd {
            debug!("[{}] Left {} during mutation, skipping refresh", self.tab_label, cwd);
        } else if let Err(e) = self.load(&cwd).await {
            debug!("[{}] Refresh after mutation failed: {}", self.tab_label, e);
        }
        Ok(MutationOutcome::Applied)
    }

    /// The name the operation will use, validated.
    fn checked_request_name(&self, request: &MutationRequest) -> Result<String, SftpError> {
        let name = match request {
            MutationRequest::CreateFile { name } | MutationRequest::CreateDirectory { name } => {
                checked_name(name)?.to_string()
            }
            MutationRequest::Delete { entry } => {
                validate_entry_name(&entry.name)?;
                entry.name.clone()
            }
            MutationRequest::Rename { entry, new_name } => {
                validate_entry_name(&entry.name)?;
                checked_name(new_name)?.to_string()
            }
        };
        Ok(name)
    }
}
