//! User prompt surface
//!
//! Confirmation dialogs and toast notices are rendered by the UI layer; the
//! core only talks to this trait.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// Ask a yes/no question. `false` when the user declines or dismisses.
    async fn confirm(&self, message: &str) -> bool;

    /// Show a transient notice.
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Headless prompt: notices go to the log, confirmations get a fixed answer.
pub struct LogPrompt {
    auto_confirm: bool,
}

impl LogPrompt {
    pub fn new(auto_confirm: bool) -> Self {
        Self { auto_confirm }
    }
}

impl Default for LogPrompt {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl UserPrompt for LogPrompt {
    async fn confirm(&self, message: &str) -> bool {
        info!("Confirm ({}): {}", self.auto_confirm, message);
        self.auto_confirm
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info | NoticeLevel::Success => info!("{}", message),
            NoticeLevel::Warning => warn!("{}", message),
            NoticeLevel::Error => error!("{}", message),
        }
    }
}

/// Prompt that replays scripted answers and records everything it was asked.
///
/// Once the script runs out every confirmation gets `default_answer`.
pub struct RecordingPrompt {
    answers: Mutex<VecDeque<bool>>,
    default_answer: bool,
    questions: Mutex<Vec<String>>,
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingPrompt {
    pub fn new(default_answer: bool) -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
            default_answer,
            questions: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
        }
    }

    pub fn push_answer(&self, answer: bool) {
        self.answers.lock().push_back(answer);
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().clone()
    }

    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().clone()
    }

    pub fn notices_at(&self, level: NoticeLevel) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

#[async_trait]
impl UserPrompt for RecordingPrompt {
    async fn confirm(&self, message: &str) -> bool {
        self.questions.lock().push(message.to_string());
        self.answers
            .lock()
            .pop_front()
            .unwrap_or(self.default_answer)
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().push((level, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_prompt_replays_script() {
        let prompt = RecordingPrompt::new(false);
        prompt.push_answer(true);

        assert!(prompt.confirm("first?").await);
        assert!(!prompt.confirm("second?").await);
        assert_eq!(prompt.questions(), vec!["first?", "second?"]);

        prompt.notify(NoticeLevel::Warning, "careful");
        prompt.notify(NoticeLevel::Error, "broken");
        assert_eq!(prompt.notices_at(NoticeLevel::Warning), vec!["careful"]);
        assert_eq!(prompt.notices().len(), 2);
    }

    #[tokio::test]
    async fn test_log_prompt_answers_fixed() {
        assert!(!LogPrompt::default().confirm("delete?").await);
        assert!(LogPrompt::new(true).confirm("delete?").await);
    }
}
