//! In-process host bridge
//!
//! Keeps a remote directory tree in memory and records every request, with
//! hooks to inject listing failures and to hold a listing until released.
//! Used by the test suite and the demo console.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, Notify};
use tracing::debug;

use super::{BridgeError, FileChangeEvent, HostBridge};
use crate::sftp::path_utils::{file_name, join_remote_path, normalize_remote_path, parent_of};
use crate::sftp::types::{FileEntry, FileType, FsOperation};

const DEFAULT_LOCAL_ROOT: &str = "/tmp/sshtabs";

#[derive(Debug, Clone)]
struct MemoryNode {
    file_type: FileType,
    content: Vec<u8>,
    modify_time: i64,
}

impl MemoryNode {
    fn directory() -> Self {
        Self {
            file_type: FileType::Directory,
            content: Vec::new(),
            modify_time: now(),
        }
    }

    fn file(content: Vec<u8>) -> Self {
        Self {
            file_type: FileType::File,
            content,
            modify_time: now(),
        }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Upload recorded by [`MemoryBridge`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub session_id: String,
    pub local_path: String,
    pub remote_dir: String,
}

pub struct MemoryBridge {
    sessions: RwLock<HashSet<String>>,
    /// Normalized absolute path → node. `/` always exists.
    nodes: RwLock<BTreeMap<String, MemoryNode>>,
    local_files: RwLock<HashMap<String, Vec<u8>>>,
    local_root: String,
    watches: RwLock<HashSet<(String, String)>>,
    listing_failures: Mutex<HashMap<String, String>>,
    listing_gates: Mutex<HashMap<String, Arc<Notify>>>,
    listings: Mutex<Vec<String>>,
    operations: Mutex<Vec<FsOperation>>,
    uploads: Mutex<Vec<RecordedUpload>>,
    opened: Mutex<Vec<String>>,
    disconnected: Mutex<Vec<String>>,
    changes: broadcast::Sender<FileChangeEvent>,
}

impl Default for MemoryBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBridge {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), MemoryNode::directory());
        let (changes, _) = broadcast::channel(64);

        Self {
            sessions: RwLock::new(HashSet::new()),
            nodes: RwLock::new(nodes),
            local_files: RwLock::new(HashMap::new()),
            local_root: DEFAULT_LOCAL_ROOT.to_string(),
            watches: RwLock::new(HashSet::new()),
            listing_failures: Mutex::new(HashMap::new()),
            listing_gates: Mutex::new(HashMap::new()),
            listings: Mutex::new(Vec::new()),
            operations: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
            disconnected: Mutex::new(Vec::new()),
            changes,
        }
    }

    // ========================================================================
    // Seeding
    // ========================================================================

    pub fn add_session(&self, session_id: impl Into<String>) {
        self.sessions.write().insert(session_id.into());
    }

    /// Create a directory and any missing ancestors.
    pub fn add_dir(&self, path: &str) {
        let path = normalize_remote_path(path);
        let mut nodes = self.nodes.write();
        let mut current = String::from("/");
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = join_remote_path(&current, segment);
            nodes
                .entry(current.clone())
                .or_insert_with(MemoryNode::directory);
        }
    }

    /// Create (or overwrite) a file, creating missing ancestors.
    pub fn add_file(&self, path: &str, content: impl Into<Vec<u8>>) {
        let path = normalize_remote_path(path);
        self.add_dir(&parent_of(&path));
        self.nodes
            .write()
            .insert(path, MemoryNode::file(content.into()));
    }

    // ========================================================================
    // Fault injection
    // ========================================================================

    /// Make the next listing of `path` fail with `message`.
    pub fn fail_next_listing(&self, path: &str, message: impl Into<String>) {
        self.listing_failures
            .lock()
            .insert(normalize_remote_path(path), message.into());
    }

    /// Block listings of `path` until [`MemoryBridge::release_listing`] is called.
    pub fn hold_listing(&self, path: &str) {
        self.listing_gates
            .lock()
            .insert(normalize_remote_path(path), Arc::new(Notify::new()));
    }

    pub fn release_listing(&self, path: &str) {
        if let Some(gate) = self.listing_gates.lock().remove(&normalize_remote_path(path)) {
            gate.notify_one();
        }
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn exists(&self, path: &str) -> bool {
        self.nodes.read().contains_key(&normalize_remote_path(path))
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.nodes
            .read()
            .get(&normalize_remote_path(path))
            .map(|node| node.file_type == FileType::Directory)
            .unwrap_or(false)
    }

    pub fn read_remote(&self, path: &str) -> Option<Vec<u8>> {
        self.nodes
            .read()
            .get(&normalize_remote_path(path))
            .filter(|node| node.file_type == FileType::File)
            .map(|node| node.content.clone())
    }

    pub fn read_local(&self, local_path: &str) -> Option<Vec<u8>> {
        self.local_files.read().get(local_path).cloned()
    }

    pub fn listings(&self) -> Vec<String> {
        self.listings.lock().clone()
    }

    pub fn applied_operations(&self) -> Vec<FsOperation> {
        self.operations.lock().clone()
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    pub fn disconnected(&self) -> Vec<String> {
        self.disconnected.lock().clone()
    }

    pub fn is_watching(&self, remote_path: &str, local_path: &str) -> bool {
        self.watches
            .read()
            .contains(&(remote_path.to_string(), local_path.to_string()))
    }

    pub fn watch_count(&self) -> usize {
        self.watches.read().len()
    }

    /// Simulate an external editor saving the local copy.
    ///
    /// Emits a change event for every watch registered on `local_path`.
    pub fn write_local(&self, local_path: &str, content: impl Into<Vec<u8>>) -> usize {
        self.local_files
            .write()
            .insert(local_path.to_string(), content.into());

        let events: Vec<FileChangeEvent> = self
            .watches
            .read()
            .iter()
            .filter(|(_, local)| local == local_path)
            .map(|(remote, local)| FileChangeEvent {
                remote_path: remote.clone(),
                local_path: local.clone(),
            })
            .collect();

        for event in &events {
            let _ = self.changes.send(event.clone());
        }
        events.len()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn check_session(&self, session_id: &str) -> Result<(), BridgeError> {
        if self.sessions.read().contains(session_id) {
            Ok(())
        } else {
            Err(BridgeError::SessionNotFound(session_id.to_string()))
        }
    }

    fn local_path_for(&self, session_id: &str, remote_path: &str) -> String {
        format!("{}/{}/{}", self.local_root, session_id, file_name(remote_path))
    }

    fn require_dir(nodes: &BTreeMap<String, MemoryNode>, path: &str) -> Result<(), BridgeError> {
        match nodes.get(path) {
            Some(node) if node.file_type == FileType::Directory => Ok(()),
            Some(_) => Err(BridgeError::NotADirectory(path.to_string())),
            None => Err(BridgeError::NotFound(path.to_string())),
        }
    }

    fn children<'a>(
        nodes: &'a BTreeMap<String, MemoryNode>,
        dir: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a MemoryNode)> + 'a {
        let prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{}/", dir)
        };
        nodes.iter().filter(move |(path, _)| {
            path.len() > prefix.len()
                && path.starts_with(&prefix)
                && !path[prefix.len()..].contains('/')
        })
    }

    fn has_descendants(nodes: &BTreeMap<String, MemoryNode>, dir: &str) -> bool {
        Self::children(nodes, dir).next().is_some()
    }

    fn descendant_keys(nodes: &BTreeMap<String, MemoryNode>, dir: &str) -> Vec<String> {
        let prefix = format!("{}/", dir);
        nodes
            .keys()
            .filter(|path| path.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn apply_locked(
        nodes: &mut BTreeMap<String, MemoryNode>,
        op: &FsOperation,
    ) -> Result<(), BridgeError> {
        match op {
            FsOperation::CreateFile { path } => {
                let path = normalize_remote_path(path);
                Self::require_dir(nodes, &parent_of(&path))?;
                match nodes.get_mut(&path) {
                    // touch semantics
                    Some(node) => node.modify_time = now(),
                    None => {
                        nodes.insert(path, MemoryNode::file(Vec::new()));
                    }
                }
                Ok(())
            }
            FsOperation::CreateDirectory { path } => {
                let path = normalize_remote_path(path);
                if nodes.contains_key(&path) {
                    return Err(BridgeError::AlreadyExists(path));
                }
                Self::require_dir(nodes, &parent_of(&path))?;
                nodes.insert(path, MemoryNode::directory());
                Ok(())
            }
            FsOperation::Remove { path, recursive } => {
                let path = normalize_remote_path(path);
                if path == "/" {
                    return Err(BridgeError::PermissionDenied(path));
                }
                let is_dir = match nodes.get(&path) {
                    Some(node) => node.file_type == FileType::Directory,
                    None => return Err(BridgeError::NotFound(path)),
                };
                if is_dir {
                    if Self::has_descendants(nodes, &path) && !recursive {
                        return Err(BridgeError::DirectoryNotEmpty(path));
                    }
                    for key in Self::descendant_keys(nodes, &path) {
                        nodes.remove(&key);
                    }
                }
                nodes.remove(&path);
                Ok(())
            }
            FsOperation::Rename { from, to } => {
                let from = normalize_remote_path(from);
                let to = normalize_remote_path(to);
                if !nodes.contains_key(&from) {
                    return Err(BridgeError::NotFound(from));
                }
                if nodes.contains_key(&to) {
                    return Err(BridgeError::AlreadyExists(to));
                }
                if to.starts_with(&format!("{}/", from)) {
                    return Err(BridgeError::Remote(format!(
                        "cannot move {} into itself",
                        from
                    )));
                }
                Self::require_dir(nodes, &parent_of(&to))?;

                let mut moved = vec![from.clone()];
                moved.extend(Self::descendant_keys(nodes, &from));
                for old in moved {
                    if let Some(node) = nodes.remove(&old) {
                        let new = format!("{}{}", to, &old[from.len()..]);
                        nodes.insert(new, node);
                    }
                }
                Ok(())
            }
        }
    }

    fn fetch(&self, session_id: &str, remote_path: &str) -> Result<String, BridgeError> {
        self.check_session(session_id)?;
        let remote_path = normalize_remote_path(remote_path);
        let content = match self.nodes.read().get(&remote_path) {
            Some(node) if node.file_type == FileType::File => node.content.clone(),
            Some(_) => return Err(BridgeError::Transfer(format!("{} is a directory", remote_path))),
            None => return Err(BridgeError::NotFound(remote_path)),
        };
        let local_path = self.local_path_for(session_id, &remote_path);
        self.local_files.write().insert(local_path.clone(), content);
        Ok(local_path)
    }
}

#[async_trait]
impl HostBridge for MemoryBridge {
    async fn list_directory(
        &self,
        session_id: &str,
        path: &str,
    ) -> Result<Vec<FileEntry>, BridgeError> {
        self.check_session(session_id)?;
        let path = normalize_remote_path(path);
        self.listings.lock().push(path.clone());

        let gate = self.listing_gates.lock().get(&path).cloned();
        if let Some(gate) = gate {
            debug!("MemoryBridge: holding listing of {}", path);
            gate.notified().await;
        }

        if let Some(message) = self.listing_failures.lock().remove(&path) {
            return Err(BridgeError::Remote(message));
        }

        let nodes = self.nodes.read();
        Self::require_dir(&nodes, &path)?;
        let entries = Self::children(&nodes, &path)
            .map(|(child, node)| FileEntry {
                name: file_name(child).to_string(),
                file_type: node.file_type,
                size: node.content.len() as u64,
                modify_time: node.modify_time,
            })
            .collect();
        Ok(entries)
    }

    async fn apply(&self, session_id: &str, op: FsOperation) -> Result<(), BridgeError> {
        self.check_session(session_id)?;
        Self::apply_locked(&mut self.nodes.write(), &op)?;
        self.operations.lock().push(op);
        Ok(())
    }

    async fn upload_file(
        &self,
        session_id: &str,
        local_path: &str,
        remote_dir: &str,
    ) -> Result<(), BridgeError> {
        self.check_session(session_id)?;
        let content = self
            .local_files
            .read()
            .get(local_path)
            .cloned()
            .ok_or_else(|| BridgeError::Transfer(format!("local file missing: {}", local_path)))?;

        let remote_dir = normalize_remote_path(remote_dir);
        {
            let mut nodes = self.nodes.write();
            Self::require_dir(&nodes, &remote_dir)?;
            let target = join_remote_path(&remote_dir, file_name(local_path));
            nodes.insert(target, MemoryNode::file(content));
        }

        self.uploads.lock().push(RecordedUpload {
            session_id: session_id.to_string(),
            local_path: local_path.to_string(),
            remote_dir,
        });
        Ok(())
    }

    async fn download_file(
        &self,
        session_id: &str,
        remote_path: &str,
    ) -> Result<String, BridgeError> {
        self.fetch(session_id, remote_path)
    }

    async fn download_and_open(
        &self,
        session_id: &str,
        remote_path: &str,
    ) -> Result<String, BridgeError> {
        let local_path = self.fetch(session_id, remote_path)?;
        // Suspend once like a real transfer, so overlapping opens interleave
        tokio::task::yield_now().await;
        self.opened.lock().push(local_path.clone());
        Ok(local_path)
    }

    async fn watch_file(&self, remote_path: &str, local_path: &str) -> Result<(), BridgeError> {
        self.watches
            .write()
            .insert((remote_path.to_string(), local_path.to_string()));
        Ok(())
    }

    async fn unwatch_file(&self, remote_path: &str, local_path: &str) -> Result<(), BridgeError> {
        self.watches
            .write()
            .remove(&(remote_path.to_string(), local_path.to_string()));
        Ok(())
    }

    fn file_changes(&self) -> broadcast::Receiver<FileChangeEvent> {
        self.changes.subscribe()
    }

    async fn disconnect(&self, session_id: &str) -> Result<(), BridgeError> {
        let removed = self.sessions.write().remove(session_id);
        self.disconnected.lock().push(session_id.to_string());
        if removed {
            Ok(())
        } else {
            Err(BridgeError::SessionNotFound(session_id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryBridge {
        let bridge = MemoryBridge::new();
        bridge.add_session("s1");
        bridge.add_dir("/var/log");
        bridge.add_dir("/var/lib");
        bridge.add_file("/var/readme", "hello");
        bridge
    }

    #[tokio::test]
    async fn test_list_directory() {
        let bridge = seeded();
        let entries = bridge.list_directory("s1", "/var").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["lib", "log", "readme"]);
        assert_eq!(entries[2].size, 5);

        let root = bridge.list_directory("s1", "/").await.unwrap();
        assert_eq!(root.len(), 1);
        assert!(root[0].is_dir());
    }

    #[tokio::test]
    async fn test_list_errors() {
        let bridge = seeded();
        assert_eq!(
            bridge.list_directory("nope", "/").await,
            Err(BridgeError::SessionNotFound("nope".to_string()))
        );
        assert!(matches!(
            bridge.list_directory("s1", "/missing").await,
            Err(BridgeError::NotFound(_))
        ));
        assert!(matches!(
            bridge.list_directory("s1", "/var/readme").await,
            Err(BridgeError::NotADirectory(_))
        ));

        bridge.fail_next_listing("/var", "boom");
        assert_eq!(
            bridge.list_directory("s1", "/var").await,
            Err(BridgeError::Remote("boom".to_string()))
        );
        // one-shot
        assert!(bridge.list_directory("s1", "/var").await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_requires_recursive_for_non_empty_dir() {
        let bridge = seeded();
        bridge.add_file("/var/log/syslog", "x");
        let err = bridge
            .apply(
                "s1",
                FsOperation::Remove {
                    path: "/var/log".to_string(),
                    recursive: false,
                },
            )
            .await;
        assert!(matches!(err, Err(BridgeError::DirectoryNotEmpty(_))));

        bridge
            .apply(
                "s1",
                FsOperation::Remove {
                    path: "/var/log".to_string(),
                    recursive: true,
                },
            )
            .await
            .unwrap();
        assert!(!bridge.exists("/var/log"));
        assert!(!bridge.exists("/var/log/syslog"));
        assert!(bridge.exists("/var/lib"));
    }

    #[tokio::test]
    async fn test_rename_moves_subtree() {
        let bridge = seeded();
        bridge.add_file("/var/log/syslog", "x");
        bridge
            .apply(
                "s1",
                FsOperation::Rename {
                    from: "/var/log".to_string(),
                    to: "/var/logs".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(bridge.exists("/var/logs/syslog"));
        assert!(!bridge.exists("/var/log"));

        let err = bridge
            .apply(
                "s1",
                FsOperation::Rename {
                    from: "/var/lib".to_string(),
                    to: "/var/lib/inner".to_string(),
                },
            )
            .await;
        assert!(matches!(err, Err(BridgeError::Remote(_))));
    }

    #[tokio::test]
    async fn test_create_directory_twice_fails() {
        let bridge = seeded();
        let op = FsOperation::CreateDirectory {
            path: "/srv".to_string(),
        };
        bridge.apply("s1", op.clone()).await.unwrap();
        assert!(matches!(
            bridge.apply("s1", op).await,
            Err(BridgeError::AlreadyExists(_))
        ));
        assert_eq!(bridge.applied_operations().len(), 1);
    }

    #[tokio::test]
    async fn test_download_edit_upload() {
        let bridge = seeded();
        let local = bridge.download_and_open("s1", "/var/readme").await.unwrap();
        assert_eq!(local, "/tmp/sshtabs/s1/readme");
        assert_eq!(bridge.read_local(&local), Some(b"hello".to_vec()));

        let mut changes = bridge.file_changes();
        bridge.watch_file("/var/readme", &local).await.unwrap();
        assert_eq!(bridge.write_local(&local, "edited"), 1);
        let event = changes.recv().await.unwrap();
        assert_eq!(event.remote_path, "/var/readme");

        bridge.upload_file("s1", &local, "/var").await.unwrap();
        assert_eq!(bridge.read_remote("/var/readme"), Some(b"edited".to_vec()));
    }

    #[tokio::test]
    async fn test_disconnect_forgets_session() {
        let bridge = seeded();
        bridge.disconnect("s1").await.unwrap();
        assert!(bridge.list_directory("s1", "/").await.is_err());
        assert_eq!(bridge.disconnected(), vec!["s1".to_string()]);
    }
}
