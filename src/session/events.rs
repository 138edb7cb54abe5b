//! Tab event emission
//!
//! Every registry change is pushed to subscribers as a [`TabEventEnvelope`].
//! Each envelope carries a strictly increasing `generation`, so a UI that
//! takes a snapshot first can drop events it has already seen.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use super::types::{Tab, TabId};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TabEvent {
    Created { tab: Tab },
    Switched { tab_id: TabId, tab: Tab },
    Closed { tab_id: TabId },
    ConnectionChanged { tab_id: TabId, is_connected: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabEventEnvelope {
    pub generation: u64,
    #[serde(flatten)]
    pub event: TabEvent,
}

pub struct TabEventEmitter {
    tx: broadcast::Sender<TabEventEnvelope>,
    generation: AtomicU64,
}

impl TabEventEmitter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tx,
            generation: AtomicU64::new(0),
        }
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn emit(&self, event: TabEvent) -> u64 {
        // Starts at 1; 0 means "nothing emitted yet"
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("TabEvent #{}: {:?}", generation, event);
        let _ = self.tx.send(TabEventEnvelope { generation, event });
        generation
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TabEventEnvelope> {
        self.tx.subscribe()
    }

    /// Generation of the last emitted event
    pub fn current(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Default for TabEventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
