//! Per-tab navigation history

use serde::Serialize;

/// Visited paths with a browse cursor.
///
/// New entries go to the tail; once `limit` is exceeded the oldest entry is
/// evicted. The cursor always stays within `[0, len - 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathHistory {
    entries: Vec<String>,
    index: usize,
    limit: usize,
}

impl PathHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: 0,
            limit: limit.max(1),
        }
    }

    /// Record a successful visit and move the cursor to the tail.
    /// A path equal to the current tail is not duplicated.
    pub fn push(&mut self, path: &str) {
        if self.entries.last().map(String::as_str) != Some(path) {
            self.entries.push(path.to_string());
            if self.entries.len() > self.limit {
                let overflow = self.entries.len() - self.limit;
                self.entries.drain(..overflow);
            }
        }
        self.index = self.entries.len().saturating_sub(1);
    }

    /// Step the cursor back and return the entry under it.
    pub fn back(&mut self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        self.index = self.index.saturating_sub(1);
        self.current()
    }

    /// Step the cursor forward and return the entry under it.
    pub fn forward(&mut self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        self.index = (self.index + 1).min(self.entries.len() - 1);
        self.current()
    }

    pub fn current(&self) -> Option<String> {
        self.entries.get(self.index).cloned()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_skips_duplicate_tail() {
        let mut history = PathHistory::new(50);
        history.push("/");
        history.push("/home");
        history.push("/home");
        assert_eq!(history.entries(), &["/", "/home"]);
        assert_eq!(history.index(), 1);

        // Revisiting an older path still appends
        history.push("/");
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_eviction_at_limit() {
        let mut history = PathHistory::new(3);
        for path in ["/a", "/b", "/c", "/d", "/e"] {
            history.push(path);
        }
        assert_eq!(history.entries(), &["/c", "/d", "/e"]);
        assert_eq!(history.index(), 2);
    }

    #[test]
    fn test_cursor_is_clamped() {
        let mut history = PathHistory::new(50);
        assert_eq!(history.back(), None);
        assert_eq!(history.forward(), None);

        history.push("/a");
        history.push("/b");
        assert_eq!(history.back().as_deref(), Some("/a"));
        assert_eq!(history.back().as_deref(), Some("/a"));
        assert_eq!(history.index(), 0);
        assert_eq!(history.forward().as_deref(), Some("/b"));
        assert_eq!(history.forward().as_deref(), Some("/b"));
        assert_eq!(history.index(), 1);
    }

    #[test]
    fn test_push_resets_cursor_to_tail() {
        let mut history = PathHistory::new(50);
        history.push("/a");
        history.push("/b");
        history.push("/c");
        history.back();
        history.back();
        history.push("/c");
        assert_eq!(history.index(), 2);
        assert_eq!(history.current().as_deref(), Some("/c"));
    }
}
