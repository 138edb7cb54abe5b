//! Remote path utilities
//!
//! Pure helpers for the remote file browser. Remote paths always use `/` as
//! separator regardless of the local or remote OS, so nothing here touches
//! `std::path`.

use serde::{Deserialize, Serialize};

/// A leading token that expands to an absolute remote prefix (`~` → `/root`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathShortcut {
    pub token: String,
    pub prefix: String,
}

impl PathShortcut {
    pub fn new(token: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            prefix: prefix.into(),
        }
    }
}

/// Built-in shortcut table used when the settings file does not override it.
pub fn default_shortcuts() -> Vec<PathShortcut> {
    [
        ("~", "/root"),
        ("~root", "/root"),
        ("home", "/home"),
        ("etc", "/etc"),
        ("var", "/var"),
        ("tmp", "/tmp"),
        ("usr", "/usr"),
        ("opt", "/opt"),
        ("log", "/var/log"),
    ]
    .into_iter()
    .map(|(token, prefix)| PathShortcut::new(token, prefix))
    .collect()
}

/// Check if a remote path is absolute.
pub fn is_absolute_remote_path(path: &str) -> bool {
    path.starts_with('/')
}

/// Join remote path components using `/` separator.
pub fn join_remote_path(base: &str, component: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, component)
    } else {
        format!("{}/{}", base, component)
    }
}

/// Expand a leading shortcut token.
///
/// A token matches either the whole input (`etc`) or a `<token>/` prefix
/// (`etc/nginx`). The first matching entry of `table` wins; unmatched input is
/// returned unchanged.
pub fn expand_shortcuts(input: &str, table: &[PathShortcut]) -> String {
    for shortcut in table {
        if input == shortcut.token {
            return shortcut.prefix.clone();
        }
        if let Some(rest) = input
            .strip_prefix(shortcut.token.as_str())
            .filter(|rest| rest.starts_with('/'))
        {
            return format!("{}{}", shortcut.prefix.trim_end_matches('/'), rest);
        }
    }
    input.to_string()
}

/// Normalize a remote path.
///
/// Empty and `.` segments are dropped, `..` pops the previous segment (and is a
/// no-op at the root). The result always has exactly one leading `/` and no
/// trailing slash unless it is the root itself.
///
/// ```
/// use sshtabs_lib::sftp::path_utils::normalize_remote_path;
/// assert_eq!(normalize_remote_path("/a/b/../c"), "/a/c");
/// assert_eq!(normalize_remote_path("/../../x"), "/x");
/// assert_eq!(normalize_remote_path(""), "/");
/// ```
pub fn normalize_remote_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Parent directory of a remote path. The parent of `/` is `/`.
pub fn parent_of(path: &str) -> String {
    let normalized = normalize_remote_path(path);
    match normalized.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => normalized[..idx].to_string(),
    }
}

/// Final segment of a remote path (empty for `/`).
pub fn file_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Turn raw path-bar input into a normalized absolute path.
///
/// Shortcuts are expanded first; input that is still relative is anchored at
/// `cwd` so that `../bob` typed in `/home/alice` lands in `/home/bob`.
pub fn resolve_input(raw: &str, cwd: &str, shortcuts: &[PathShortcut]) -> String {
    let expanded = expand_shortcuts(raw.trim(), shortcuts);
    if is_absolute_remote_path(&expanded) {
        normalize_remote_path(&expanded)
    } else {
        normalize_remote_path(&join_remote_path(cwd, &expanded))
    }
}

/// Split tab-completion input into the directory to list and the name fragment.
///
/// The split happens at the last `/`; input without any `/` completes inside
/// `cwd`.
pub fn split_for_completion(input: &str, cwd: &str) -> (String, String) {
    match input.rfind('/') {
        Some(idx) => {
            let dir_part = &input[..idx];
            let fragment = input[idx + 1..].to_string();
            let dir = if dir_part.is_empty() {
                "/".to_string()
            } else if is_absolute_remote_path(dir_part) {
                normalize_remote_path(dir_part)
            } else {
                normalize_remote_path(&join_remote_path(cwd, dir_part))
            };
            (dir, fragment)
        }
        None => (normalize_remote_path(cwd), input.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_remote_path() {
        assert_eq!(normalize_remote_path("/a/b/../c"), "/a/c");
        assert_eq!(normalize_remote_path("/../../x"), "/x");
        assert_eq!(normalize_remote_path(""), "/");
        assert_eq!(normalize_remote_path("/"), "/");
        assert_eq!(normalize_remote_path("../.."), "/");
        assert_eq!(normalize_remote_path("//usr///local/./bin/"), "/usr/local/bin");
        assert_eq!(normalize_remote_path("relative/dir"), "/relative/dir");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "",
            "/",
            "..",
            "/a/./b/../../c/",
            "x/y/z/../../..",
            "/home//alice/",
            "/.../..../.",
            "/with space/and..dots",
        ];
        for sample in samples {
            let once = normalize_remote_path(sample);
            assert_eq!(normalize_remote_path(&once), once, "input: {:?}", sample);
        }
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of("/a/b"), "/a");
        assert_eq!(parent_of("/a"), "/");
        assert_eq!(parent_of("/"), "/");
        assert_eq!(parent_of("/a/b/"), "/a");
    }

    #[test]
    fn test_expand_shortcuts() {
        let table = default_shortcuts();
        assert_eq!(expand_shortcuts("~", &table), "/root");
        assert_eq!(expand_shortcuts("~/projects", &table), "/root/projects");
        assert_eq!(expand_shortcuts("~root", &table), "/root");
        assert_eq!(expand_shortcuts("etc/nginx", &table), "/etc/nginx");
        assert_eq!(expand_shortcuts("log", &table), "/var/log");
        // Tokens only match whole segments
        assert_eq!(expand_shortcuts("etcetera", &table), "etcetera");
        assert_eq!(expand_shortcuts("/etc", &table), "/etc");
        assert_eq!(expand_shortcuts("../bob", &table), "../bob");
    }

    #[test]
    fn test_resolve_input() {
        let table = default_shortcuts();
        assert_eq!(resolve_input("../bob", "/home/alice", &table), "/home/bob");
        assert_eq!(resolve_input("  /var/log/ ", "/", &table), "/var/log");
        assert_eq!(resolve_input("home/alice/..", "/tmp", &table), "/home");
        assert_eq!(resolve_input("docs", "/srv", &table), "/srv/docs");
        assert_eq!(resolve_input("../../../..", "/a", &table), "/");
    }

    #[test]
    fn test_split_for_completion() {
        assert_eq!(
            split_for_completion("/var/lo", "/"),
            ("/var".to_string(), "lo".to_string())
        );
        assert_eq!(
            split_for_completion("/us", "/home"),
            ("/".to_string(), "us".to_string())
        );
        assert_eq!(
            split_for_completion("/etc/", "/"),
            ("/etc".to_string(), String::new())
        );
        assert_eq!(
            split_for_completion("pro", "/home/alice"),
            ("/home/alice".to_string(), "pro".to_string())
        );
        assert_eq!(
            split_for_completion("src/ma", "/repo"),
            ("/repo/src".to_string(), "ma".to_string())
        );
    }

    #[test]
    fn test_join_remote_path() {
        assert_eq!(join_remote_path("/home", "file.txt"), "/home/file.txt");
        assert_eq!(join_remote_path("/home/", "file.txt"), "/home/file.txt");
        assert_eq!(join_remote_path("/", "home"), "/home");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("/etc/hosts"), "hosts");
        assert_eq!(file_name("/var/log/"), "log");
        assert_eq!(file_name("/"), "");
    }
}
