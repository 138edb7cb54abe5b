//! Tab Types and Data Structures

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::sftp::{FileSyncWatcher, RemoteFileNavigator};

/// Tab identifier, allocated in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

/// Remote session handed over by whoever opened the connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub id: String,
    pub name: String,
    /// Connection settings, forwarded untouched
    #[serde(default)]
    pub config: serde_json::Value,
}

impl SessionData {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            config: serde_json::Value::Null,
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }
}

/// Tab metadata as seen by the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tab {
    pub id: TabId,
    pub session_id: Option<String>,
    pub session_name: String,
    pub is_connected: bool,
    pub connection_config: serde_json::Value,
}

impl Tab {
    pub(crate) fn new(id: TabId, session: Option<SessionData>, placeholder: &str) -> Self {
        let mut tab = Self {
            id,
            session_id: None,
            session_name: placeholder.to_string(),
            is_connected: false,
            connection_config: serde_json::Value::Null,
        };
        if let Some(session) = session {
            tab.bind(session);
            tab.is_connected = true;
        }
        tab
    }

    pub(crate) fn bind(&mut self, session: SessionData) {
        self.session_id = Some(session.id);
        self.session_name = session.name;
        self.connection_config = session.config;
    }

    /// Unconnected tab that was never bound to a session
    pub fn is_placeholder(&self) -> bool {
        self.session_id.is_none() && !self.is_connected
    }
}

/// Per-tab working surface: file browser, edit sync and terminal input gate
pub struct TabSurface {
    pub navigator: Arc<RemoteFileNavigator>,
    pub sync: Arc<FileSyncWatcher>,
    terminal_input: AtomicBool,
}

impl TabSurface {
    pub(crate) fn new(navigator: Arc<RemoteFileNavigator>, sync: Arc<FileSyncWatcher>) -> Self {
        Self {
            navigator,
            sync,
            terminal_input: AtomicBool::new(false),
        }
    }

    pub fn terminal_input_enabled(&self) -> bool {
        self.terminal_input.load(Ordering::SeqCst)
    }

    pub(crate) fn set_terminal_input(&self, enabled: bool) {
        self.terminal_input.store(enabled, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_defaults_to_placeholder() {
        let tab = Tab::new(TabId(1), None, "New Tab");
        assert!(tab.is_placeholder());
        assert_eq!(tab.session_name, "New Tab");
        assert_eq!(tab.id.to_string(), "tab-1");
    }

    #[test]
    fn test_tab_with_session_is_bound() {
        let session = SessionData::new("s1", "srv1")
            .with_config(serde_json::json!({ "host": "srv1.example.com", "port": 22 }));
        let tab = Tab::new(TabId(7), Some(session), "New Tab");
        assert_eq!(tab.session_id.as_deref(), Some("s1"));
        assert_eq!(tab.session_name, "srv1");
        assert!(tab.is_connected);
        assert_eq!(tab.connection_config["port"], 22);
    }
}
