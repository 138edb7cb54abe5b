//! Session Tab Registry
//!
//! Owns every open tab and the surface paired with it. The registry is the
//! single source of truth for which tabs exist and which one is active, and
//! it never lets the tab count drop to zero.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::events::{TabEvent, TabEventEmitter, TabEventEnvelope};
use super::types::{SessionData, Tab, TabId, TabSurface};
use crate::bridge::{FileChangeEvent, HostBridge};
use crate::config::Settings;
use crate::prompt::{NoticeLevel, UserPrompt};
use crate::sftp::{FileSyncWatcher, RemoteFileNavigator, SyncOutcome};

struct TabSlot {
    tab: Tab,
    surface: Arc<TabSurface>,
}

/// Result of [`SessionTabRegistry::close_tab`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CloseOutcome {
    Closed { switched_to: Option<TabId> },
    /// Refused: closing would leave no tabs
    Rejected { warning: String },
    NotFound,
}

pub struct SessionTabRegistry {
    tabs: DashMap<TabId, TabSlot>,
    active: parking_lot::RwLock<Option<TabId>>,
    /// Counter for generating tab ids
    id_counter: AtomicU64,
    /// Serializes create/close so the "last tab" check cannot race an insert
    lifecycle_lock: parking_lot::Mutex<()>,
    bridge: Arc<dyn HostBridge>,
    prompt: Arc<dyn UserPrompt>,
    settings: Arc<Settings>,
    events: TabEventEmitter,
}

impl SessionTabRegistry {
    /// Create a registry holding one unconnected tab.
    pub fn new(
        bridge: Arc<dyn HostBridge>,
        prompt: Arc<dyn UserPrompt>,
        settings: Settings,
    ) -> Self {
        let registry = Self {
            tabs: DashMap::new(),
            active: parking_lot::RwLock::new(None),
            id_counter: AtomicU64::new(0),
            lifecycle_lock: parking_lot::Mutex::new(()),
            bridge,
            prompt,
            settings: Arc::new(settings),
            events: TabEventEmitter::new(),
        };
        registry.insert_tab(None);
        registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    pub fn tab(&self, id: TabId) -> Option<Tab> {
        self.tabs.get(&id).map(|slot| slot.tab.clone())
    }

    /// All tabs in creation order
    pub fn tabs(&self) -> Vec<Tab> {
        let mut tabs: Vec<Tab> = self.tabs.iter().map(|slot| slot.tab.clone()).collect();
        tabs.sort_by_key(|tab| tab.id);
        tabs
    }

    pub fn surface(&self, id: TabId) -> Option<Arc<TabSurface>> {
        self.tabs.get(&id).map(|slot| Arc::clone(&slot.surface))
    }

    pub fn active_id(&self) -> Option<TabId> {
        *self.active.read()
    }

    pub fn active_tab(&self) -> Option<Tab> {
        self.active_id().and_then(|id| self.tab(id))
    }

    pub fn active_surface(&self) -> Option<Arc<TabSurface>> {
        self.active_id().and_then(|id| self.surface(id))
    }

    /// Tab currently bound to `session_id`, if any
    pub fn find_by_session(&self, session_id: &str) -> Option<TabId> {
        self.tabs
            .iter()
            .filter(|slot| slot.tab.session_id.as_deref() == Some(session_id))
            .map(|slot| slot.tab.id)
            .min()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TabEventEnvelope> {
        self.events.subscribe()
    }

    /// Generation of the last emitted tab event
    pub fn generation(&self) -> u64 {
        self.events.current()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    fn build_surface(&self, id: TabId) -> Arc<TabSurface> {
        let label = id.to_string();
        let sync = Arc::new(FileSyncWatcher::new(
            label.clone(),
            Arc::clone(&self.bridge),
            Arc::clone(&self.prompt),
        ));
        let navigator = Arc::new(RemoteFileNavigator::new(
            label,
            Arc::clone(&self.bridge),
            Arc::clone(&self.prompt),
            Arc::clone(&sync),
            Arc::clone(&self.settings),
        ));
        Arc::new(TabSurface::new(navigator, sync))
    }

    /// Insert a tab and make it active. Synchronous part of `create_tab`.
    fn insert_tab(&self, session: Option<SessionData>) -> (TabId, Arc<TabSurface>) {
        let _guard = self.lifecycle_lock.lock();

        let id = TabId(self.id_counter.fetch_add(1, Ordering::SeqCst) + 1);
        let tab = Tab::new(id, session, &self.settings.placeholder_name);
        let surface = self.build_surface(id);

        if let (true, Some(session_id)) = (tab.is_connected, tab.session_id.as_deref()) {
            surface.navigator.attach_session(session_id);
            surface.set_terminal_input(true);
        }

        info!(
            "Creating {} ({}, session: {:?})",
            id, tab.session_name, tab.session_id
        );

        self.tabs.insert(
            id,
            TabSlot {
                tab: tab.clone(),
                surface: Arc::clone(&surface),
            },
        );
        self.events.emit(TabEvent::Created { tab });
        self.switch_tab(id);

        (id, surface)
    }

    /// Open a new tab, optionally already bound to a session, and switch to it.
    pub async fn create_tab(&self, session: Option<SessionData>) -> TabId {
        let (id, surface) = self.insert_tab(session);
        if surface.navigator.is_attached() {
            if let Err(e) = surface.navigator.initialize().await {
                debug!("{}: initial listing failed: {}", id, e);
            }
        }
        id
    }

    /// Make `id` the active tab. Unknown ids are ignored.
    pub fn switch_tab(&self, id: TabId) -> bool {
        let tab = match self.tab(id) {
            Some(tab) => tab,
            None => {
                debug!("switch_tab: {} not found", id);
                return false;
            }
        };

        *self.active.write() = Some(id);
        debug!("Switched to {}", id);
        self.events.emit(TabEvent::Switched { tab_id: id, tab });
        true
    }

    /// Close a tab.
    ///
    /// The bound session is disconnected in the background; a failed
    /// disconnect is only logged and the tab is removed regardless.
    /// Outside a Tokio runtime the tab is still removed, but its watch and
    /// session are left for the host to tear down.
    pub fn close_tab(&self, id: TabId) -> CloseOutcome {
        let _guard = self.lifecycle_lock.lock();

        if !self.tabs.contains_key(&id) {
            debug!("close_tab: {} not found", id);
            return CloseOutcome::NotFound;
        }

        if self.tabs.len() <= 1 {
            let warning = "At least one tab must stay open".to_string();
            warn!("Refusing to close {}: last tab", id);
            self.prompt.notify(NoticeLevel::Warning, &warning);
            return CloseOutcome::Rejected { warning };
        }

        let slot = match self.tabs.remove(&id) {
            Some((_, slot)) => slot,
            None => return CloseOutcome::NotFound,
        };

        slot.surface.set_terminal_input(false);
        slot.surface.navigator.detach_session();

        let sync = Arc::clone(&slot.surface.sync);
        let bridge = Arc::clone(&self.bridge);
        let session_id = slot.tab.session_id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    sync.release().await;
                    if let Some(session_id) = session_id {
                        if let Err(e) = bridge.disconnect(&session_id).await {
                            warn!("Disconnect of {} after tab close failed: {}", session_id, e);
                        }
                    }
                });
            }
            Err(_) => warn!(
                "No runtime to tear down {} (session: {:?})",
                id, session_id
            ),
        }

        info!("Closed {} ({})", id, slot.tab.session_name);
        self.events.emit(TabEvent::Closed { tab_id: id });

        let was_active = self.active_id() == Some(id);
        let switched_to = if was_active {
            let next = self.tabs.iter().map(|slot| slot.tab.id).min();
            match next {
                Some(next) => {
                    self.switch_tab(next);
                }
                None => *self.active.write() = None,
            }
            next
        } else {
            None
        };

        CloseOutcome::Closed { switched_to }
    }

    /// Apply a connection-state change to a tab.
    ///
    /// `session`, when given, rebinds the tab. Going connected attaches the
    /// file browser and lists the start directory; going disconnected clears
    /// the listing and disables terminal input.
    pub async fn update_tab_connection(
        &self,
        id: TabId,
        is_connected: bool,
        session: Option<SessionData>,
    ) -> Result<Tab, RegistryError> {
        let (tab, surface, needs_listing) = {
            let mut slot = self
                .tabs
                .get_mut(&id)
                .ok_or(RegistryError::TabNotFound(id))?;

            let previous_session = slot.tab.session_id.clone();
            let was_connected = slot.tab.is_connected;
            if let Some(session) = session {
                slot.tab.bind(session);
            }
            slot.tab.is_connected = is_connected;

            let needs_listing = is_connected
                && (!was_connected || previous_session != slot.tab.session_id);
            (slot.tab.clone(), Arc::clone(&slot.surface), needs_listing)
        };

        match (is_connected, tab.session_id.as_deref()) {
            (true, Some(session_id)) => {
                surface.navigator.attach_session(session_id);
                surface.set_terminal_input(true);
            }
            (true, None) => {
                warn!("{} marked connected without a session", id);
                surface.set_terminal_input(false);
            }
            (false, _) => {
                surface.navigator.detach_session();
                surface.set_terminal_input(false);
            }
        }

        info!(
            "{} connection -> {} (session: {:?})",
            id, is_connected, tab.session_id
        );
        self.events.emit(TabEvent::ConnectionChanged {
            tab_id: id,
            is_connected,
        });

        if needs_listing && surface.navigator.is_attached() {
            if let Err(e) = surface.navigator.initialize().await {
                debug!("{}: initial listing failed: {}", id, e);
            }
        }

        Ok(tab)
    }

    /// Focus the tab bound to `session.id`, creating one only if none exists.
    ///
    /// An active placeholder tab is reused instead of opening a second tab.
    /// The lookup and the binding happen before the first await, so two
    /// calls for the same session cannot both create a tab.
    pub async fn create_or_switch_to_session_tab(&self, session: SessionData) -> TabId {
        if let Some(id) = self.find_by_session(&session.id) {
            debug!("Session {} already open in {}", session.id, id);
            self.switch_tab(id);
            return id;
        }

        let placeholder = self
            .active_tab()
            .filter(|tab| tab.is_placeholder())
            .map(|tab| tab.id);

        if let Some(id) = placeholder {
            if self
                .update_tab_connection(id, true, Some(session.clone()))
                .await
                .is_ok()
            {
                self.switch_tab(id);
                return id;
            }
        }

        self.create_tab(Some(session)).await
    }

    // ========================================================================
    // File change routing
    // ========================================================================

    /// Hand a change notification to every tab's watcher.
    ///
    /// Returns how many tabs acted on it.
    pub async fn dispatch_file_change(&self, event: FileChangeEvent) -> usize {
        let watchers: Vec<Arc<FileSyncWatcher>> = self
            .tabs
            .iter()
            .map(|slot| Arc::clone(&slot.surface.sync))
            .collect();

        let mut handled = 0;
        for watcher in watchers {
            if watcher.handle_change(&event).await != SyncOutcome::Ignored {
                handled += 1;
            }
        }
        handled
    }

    /// Forward the bridge's change notifications until the registry is dropped.
    pub fn spawn_change_pump(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.bridge.file_changes();
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let registry = match registry.upgrade() {
                            Some(registry) => registry,
                            None => break,
                        };
                        tokio::spawn(async move {
                            registry.dispatch_file_change(event).await;
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("File change pump lagged, {} events dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("File change pump stopped");
        })
    }
}

/// Registry error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Tab not found: {0}")]
    TabNotFound(TabId),
}

impl Serialize for RegistryError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MemoryBridge;
    use crate::prompt::RecordingPrompt;

    fn setup() -> (Arc<MemoryBridge>, Arc<RecordingPrompt>, SessionTabRegistry) {
        let bridge = Arc::new(MemoryBridge::new());
        bridge.add_session("s1");
        bridge.add_session("s2");
        bridge.add_dir("/home/alice");
        bridge.add_file("/etc/hosts", "127.0.0.1 localhost");
        let prompt = Arc::new(RecordingPrompt::new(true));
        let registry = SessionTabRegistry::new(bridge.clone(), prompt.clone(), Settings::default());
        (bridge, prompt, registry)
    }

    #[tokio::test]
    async fn test_starts_with_one_placeholder_tab() {
        let (_bridge, _prompt, registry) = setup();
        assert_eq!(registry.tab_count(), 1);
        let tab = registry.active_tab().unwrap();
        assert_eq!(tab.id, TabId(1));
        assert!(tab.is_placeholder());
        assert_eq!(tab.session_name, "New Tab");
    }

    #[tokio::test]
    async fn test_create_tab_switches_to_it() {
        let (_bridge, _prompt, registry) = setup();
        let mut events = registry.subscribe();

        let id = registry.create_tab(None).await;
        assert_eq!(id, TabId(2));
        assert_eq!(registry.active_id(), Some(id));

        let created = events.recv().await.unwrap();
        assert!(matches!(created.event, TabEvent::Created { .. }));
        let switched = events.recv().await.unwrap();
        assert_eq!(
            switched.event,
            TabEvent::Switched {
                tab_id: id,
                tab: registry.tab(id).unwrap()
            }
        );
        assert!(switched.generation > created.generation);
    }

    #[tokio::test]
    async fn test_ids_are_monotonic_after_close() {
        let (_bridge, _prompt, registry) = setup();
        let second = registry.create_tab(None).await;
        registry.close_tab(second);
        let third = registry.create_tab(None).await;
        assert!(third > second);
    }

    #[tokio::test]
    async fn test_switch_unknown_is_noop() {
        let (_bridge, _prompt, registry) = setup();
        let generation = registry.generation();
        assert!(!registry.switch_tab(TabId(42)));
        assert_eq!(registry.active_id(), Some(TabId(1)));
        assert_eq!(registry.generation(), generation);
    }

    #[tokio::test]
    async fn test_close_last_tab_rejected() {
        let (_bridge, prompt, registry) = setup();
        let outcome = registry.close_tab(TabId(1));
        assert!(matches!(outcome, CloseOutcome::Rejected { .. }));
        assert_eq!(registry.tab_count(), 1);
        assert_eq!(prompt.notices_at(NoticeLevel::Warning).len(), 1);
    }

    #[tokio::test]
    async fn test_close_unknown_tab() {
        let (_bridge, _prompt, registry) = setup();
        assert_eq!(registry.close_tab(TabId(9)), CloseOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_close_active_switches_and_disconnects() {
        let (bridge, _prompt, registry) = setup();
        let id = registry
            .create_tab(Some(SessionData::new("s1", "srv1")))
            .await;
        assert_eq!(registry.active_id(), Some(id));

        let outcome = registry.close_tab(id);
        assert_eq!(
            outcome,
            CloseOutcome::Closed {
                switched_to: Some(TabId(1))
            }
        );
        assert_eq!(registry.active_id(), Some(TabId(1)));
        assert!(registry.tab(id).is_none());

        // Disconnect runs in the background
        for _ in 0..10 {
            if !bridge.disconnected().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(bridge.disconnected(), vec!["s1".to_string()]);
    }

    #[test]
    fn test_close_without_runtime_still_removes_tab() {
        let (bridge, _prompt, registry) = setup();
        let (id, _surface) = registry.insert_tab(Some(SessionData::new("s1", "srv1")));

        assert_eq!(
            registry.close_tab(id),
            CloseOutcome::Closed {
                switched_to: Some(TabId(1))
            }
        );
        assert_eq!(registry.tab_count(), 1);
        assert!(bridge.disconnected().is_empty());
    }

    #[tokio::test]
    async fn test_close_inactive_keeps_active() {
        let (_bridge, _prompt, registry) = setup();
        let second = registry.create_tab(None).await;
        registry.switch_tab(TabId(1));

        assert_eq!(
            registry.close_tab(second),
            CloseOutcome::Closed { switched_to: None }
        );
        assert_eq!(registry.active_id(), Some(TabId(1)));
    }

    #[tokio::test]
    async fn test_close_succeeds_even_if_disconnect_fails() {
        let (_bridge, _prompt, registry) = setup();
        let id = registry
            .create_tab(Some(SessionData::new("ghost", "gone")))
            .await;
        assert!(matches!(registry.close_tab(id), CloseOutcome::Closed { .. }));
        assert_eq!(registry.tab_count(), 1);
    }

    #[tokio::test]
    async fn test_connection_updates_drive_surface() {
        let (_bridge, _prompt, registry) = setup();
        let surface = registry.surface(TabId(1)).unwrap();
        assert!(!surface.terminal_input_enabled());

        let tab = registry
            .update_tab_connection(TabId(1), true, Some(SessionData::new("s1", "srv1")))
            .await
            .unwrap();
        assert!(tab.is_connected);
        assert_eq!(tab.session_name, "srv1");
        assert!(surface.terminal_input_enabled());
        assert_eq!(surface.navigator.current_path(), "/");
        assert!(!surface.navigator.entries().is_empty());

        registry
            .update_tab_connection(TabId(1), false, None)
            .await
            .unwrap();
        assert!(!surface.terminal_input_enabled());
        assert!(surface.navigator.entries().is_empty());
        // Binding survives a disconnect
        assert_eq!(registry.tab(TabId(1)).unwrap().session_id.as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn test_update_unknown_tab() {
        let (_bridge, _prompt, registry) = setup();
        assert_eq!(
            registry.update_tab_connection(TabId(5), true, None).await,
            Err(RegistryError::TabNotFound(TabId(5)))
        );
    }

    #[tokio::test]
    async fn test_create_or_switch_dedups_by_session() {
        let (_bridge, _prompt, registry) = setup();
        let session = SessionData::new("s1", "srv1");

        let first = registry.create_or_switch_to_session_tab(session.clone()).await;
        assert_eq!(first, TabId(1));
        assert_eq!(registry.tab_count(), 1);

        let second = registry.create_or_switch_to_session_tab(session).await;
        assert_eq!(second, first);
        assert_eq!(registry.tab_count(), 1);

        let other = registry
            .create_or_switch_to_session_tab(SessionData::new("s2", "srv2"))
            .await;
        assert_ne!(other, first);
        assert_eq!(registry.tab_count(), 2);

        registry
            .create_or_switch_to_session_tab(SessionData::new("s1", "srv1"))
            .await;
        assert_eq!(registry.active_id(), Some(first));
        assert_eq!(registry.tab_count(), 2);
    }

    #[tokio::test]
    async fn test_tabs_are_independent() {
        let (bridge, _prompt, registry) = setup();
        let a = registry
            .create_or_switch_to_session_tab(SessionData::new("s1", "srv1"))
            .await;
        let b = registry
            .create_or_switch_to_session_tab(SessionData::new("s2", "srv2"))
            .await;

        let nav_a = registry.surface(a).unwrap().navigator.clone();
        let nav_b = registry.surface(b).unwrap().navigator.clone();
        nav_a.load("/home/alice").await.unwrap();

        assert_eq!(nav_a.current_path(), "/home/alice");
        assert_eq!(nav_b.current_path(), "/");
        assert_eq!(nav_b.snapshot().history.entries(), &["/"]);
        assert!(bridge.listings().contains(&"/home/alice".to_string()));
    }

    #[tokio::test]
    async fn test_dispatch_file_change_reaches_owning_tab() {
        let (bridge, prompt, registry) = setup();
        let id = registry
            .create_or_switch_to_session_tab(SessionData::new("s1", "srv1"))
            .await;
        let surface = registry.surface(id).unwrap();
        let watched = surface.sync.open_for_edit("s1", "/etc/hosts").await.unwrap();
        bridge.write_local(&watched.local_path, "::1 localhost");

        let handled = registry
            .dispatch_file_change(FileChangeEvent {
                remote_path: watched.remote_path.clone(),
                local_path: watched.local_path.clone(),
            })
            .await;
        assert_eq!(handled, 1);
        assert_eq!(bridge.read_remote("/etc/hosts"), Some(b"::1 localhost".to_vec()));
        assert_eq!(prompt.questions().len(), 1);
    }

    #[tokio::test]
    async fn test_close_releases_watch() {
        let (bridge, _prompt, registry) = setup();
        let id = registry.create_tab(Some(SessionData::new("s1", "srv1"))).await;
        let surface = registry.surface(id).unwrap();
        surface.sync.open_for_edit("s1", "/etc/hosts").await.unwrap();
        assert_eq!(bridge.watch_count(), 1);

        registry.close_tab(id);
        for _ in 0..10 {
            if bridge.watch_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(bridge.watch_count(), 0);
    }
}
