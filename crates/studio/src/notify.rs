//! User-facing notices (toasts).

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::StudioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One human-readable message for the notification area
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// What the user can do about it
    pub hint: Option<String>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            hint: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
            hint: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
            hint: None,
        }
    }

    /// Error message verbatim, plus the kind-specific hint
    pub fn error(err: &StudioError) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: err.to_string(),
            hint: Some(err.hint().to_string()),
        }
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notice: Notice) {
        let hint = notice.hint.as_deref().unwrap_or("");
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => {
                tracing::info!(target: "studio::notice", "{} {}", notice.message, hint)
            }
            NoticeLevel::Warning => tracing::warn!(target: "studio::notice", "{} {}", notice.message, hint),
            NoticeLevel::Error => tracing::error!(target: "studio::notice", "{} {}", notice.message, hint),
        }
    }
}

/// Keeps every notice; handy for tests and for UIs that drain a queue
#[derive(Debug, Default)]
pub struct CollectingSink {
    notices: Mutex<Vec<Notice>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices.lock().iter().filter(|n| n.level == level).count()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices.lock().last().cloned()
    }

    /// Remove and return everything collected so far
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock())
    }
}

impl NotificationSink for CollectingSink {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
