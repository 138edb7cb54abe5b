//! Session Tab Module
//!
//! Provides the tab registry with:
//! - Monotonic tab ids and an always-non-empty tab set
//! - One tab per remote session (`create_or_switch_to_session_tab`)
//! - Per-tab file browser and edit sync surfaces
//! - Generation-stamped events for UI state sync

pub mod events;
mod registry;
pub mod types;

pub use events::{TabEvent, TabEventEmitter, TabEventEnvelope};
pub use registry::{CloseOutcome, RegistryError, SessionTabRegistry};
pub use types::{SessionData, Tab, TabId, TabSurface};
