//! Remote file browser data types

use serde::{Deserialize, Serialize};

use super::path_utils::join_remote_path;

/// Directory entry as returned by the host bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name (not full path)
    pub name: String,
    /// File type
    pub file_type: FileType,
    /// File size in bytes
    pub size: u64,
    /// Last modified time (Unix timestamp)
    pub modify_time: i64,
}

impl FileEntry {
    pub fn file(name: impl Into<String>, size: u64, modify_time: i64) -> Self {
        Self {
            name: name.into(),
            file_type: FileType::File,
            size,
            modify_time,
        }
    }

    pub fn directory(name: impl Into<String>, modify_time: i64) -> Self {
        Self {
            name: name.into(),
            file_type: FileType::Directory,
            size: 0,
            modify_time,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Directory,
}

impl FileType {
    /// Get icon name for UI
    pub fn icon(&self) -> &'static str {
        match self {
            FileType::File => "file",
            FileType::Directory => "folder",
        }
    }
}

/// Row of the rendered file list.
///
/// `Parent` is the synthetic `..` row; it never comes from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DisplayEntry {
    Parent,
    Entry(FileEntry),
}

impl DisplayEntry {
    pub fn name(&self) -> &str {
        match self {
            DisplayEntry::Parent => "..",
            DisplayEntry::Entry(entry) => &entry.name,
        }
    }
}

/// Stable partition: directories first, backend order kept within each group.
pub fn directories_first(mut entries: Vec<FileEntry>) -> Vec<FileEntry> {
    entries.sort_by_key(|entry| !entry.is_dir());
    entries
}

/// Structured remote filesystem request.
///
/// The bridge maps each variant onto its own primitive (SFTP calls, argv
/// without a shell, ...); paths are never spliced into command strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FsOperation {
    CreateFile { path: String },
    CreateDirectory { path: String },
    Remove { path: String, recursive: bool },
    Rename { from: String, to: String },
}

impl FsOperation {
    /// Path the operation acts on (source path for renames).
    pub fn target(&self) -> &str {
        match self {
            FsOperation::CreateFile { path }
            | FsOperation::CreateDirectory { path }
            | FsOperation::Remove { path, .. } => path,
            FsOperation::Rename { from, .. } => from,
        }
    }

    /// Short human-readable summary for notices and logs.
    pub fn describe(&self) -> String {
        match self {
            FsOperation::CreateFile { path } => format!("Created file {}", path),
            FsOperation::CreateDirectory { path } => format!("Created directory {}", path),
            FsOperation::Remove { path, .. } => format!("Deleted {}", path),
            FsOperation::Rename { from, to } => format!("Renamed {} to {}", from, to),
        }
    }
}

/// Mutation requested from the file browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRequest {
    CreateFile { name: String },
    CreateDirectory { name: String },
    Delete { entry: FileEntry },
    Rename { entry: FileEntry, new_name: String },
}

impl MutationRequest {
    /// Build the remote operation against `cwd`. Names must already be validated.
    pub(crate) fn to_operation(&self, cwd: &str, name: &str) -> FsOperation {
        match self {
            MutationRequest::CreateFile { .. } => FsOperation::CreateFile {
                path: join_remote_path(cwd, name),
            },
            MutationRequest::CreateDirectory { .. } => FsOperation::CreateDirectory {
                path: join_remote_path(cwd, name),
            },
            MutationRequest::Delete { entry } => FsOperation::Remove {
                path: join_remote_path(cwd, &entry.name),
                recursive: entry.is_dir(),
            },
            MutationRequest::Rename { entry, .. } => FsOperation::Rename {
                from: join_remote_path(cwd, &entry.name),
                to: join_remote_path(cwd, name),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOutcome {
    /// The bridge applied the operation and the listing was refreshed
    Applied,
    /// The user declined the confirmation; nothing was sent
    Cancelled,
    /// Rename to the same name; nothing to do
    Unchanged,
}

/// Result of a directory listing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadOutcome {
    Applied,
    /// A newer request was issued while this one was in flight; its result was dropped
    Superseded,
}

/// Result of path-bar tab completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Completion {
    /// Exactly one directory matched; the input now holds this text
    Completed(String),
    /// Several directories matched; input left untouched
    Candidates(Vec<String>),
    NoMatch,
}
