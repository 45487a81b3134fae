use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

pub const NOTIFICATION_LOG_FILE: &str = "notifications.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Error,
    Warning,
    Success,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Error => write!(f, "ERROR"),
            NotificationKind::Warning => write!(f, "WARNING"),
            NotificationKind::Success => write!(f, "SUCCESS"),
        }
    }
}

/// A user facing message.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub text: String,
    pub kind: NotificationKind,
    pub timestamp: DateTime<Local>,
}

impl Notification {
    pub fn new(kind: NotificationKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            timestamp: Local::now(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, text)
    }
}

/// Wherever notifications end up; the core does not care how they are shown.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Bounded in-memory queue for a UI to poll. The oldest notification is
/// dropped when full.
pub struct NotificationQueue {
    items: Mutex<VecDeque<Notification>>,
    limit: usize,
}

impl NotificationQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            limit,
        }
    }

    pub fn drain(&self) -> Vec<Notification> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new(50)
    }
}

impl NotificationSink for NotificationQueue {
    fn notify(&self, notification: Notification) {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.push_back(notification);
        while items.len() > self.limit {
            items.pop_front();
        }
    }
}

/// Appends every notification to a log file.
pub struct ToastLogSink {
    path: PathBuf,
}

impl ToastLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl NotificationSink for ToastLogSink {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Error => tracing::error!(text = %notification.text, "notification"),
            NotificationKind::Warning => tracing::warn!(text = %notification.text, "notification"),
            NotificationKind::Success => tracing::info!(text = %notification.text, "notification"),
        }
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            let _ = writeln!(
                file,
                "{} - {} - {}",
                notification.timestamp.to_rfc3339(),
                notification.kind,
                notification.text
            );
        }
    }
}

/// Sink that discards everything, used when notifications are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _notification: Notification) {}
}
