//! User-visible notifications.
//!
//! Storage and codec failures never reach the caller as errors once a mutation has
//! been applied in memory. They surface here instead: a [`Notice`] names the action
//! that failed in plain words, carries no internal detail, and expires on its own.
//! The underlying error goes to the log.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::commands::MessageLevel;
use crate::error::PortalError;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Notice {
    pub level: MessageLevel,
    /// What the user was doing, e.g. "save document".
    pub action: String,
    pub message: String,
    created: Instant,
    ttl: Duration,
}

impl Notice {
    pub fn new(
        level: MessageLevel,
        action: impl Into<String>,
        message: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            level,
            action: action.into(),
            message: message.into(),
            created: Instant::now(),
            ttl,
        }
    }

    /// A failure notice. The text depends only on the kind of error.
    pub fn failure(action: impl Into<String>, err: &PortalError, ttl: Duration) -> Self {
        let action = action.into();
        let message = format!("Could not {}: {}", action, user_reason(err));
        Self::new(MessageLevel::Error, action, message, ttl)
    }

    pub fn warning(action: impl Into<String>, message: impl Into<String>, ttl: Duration) -> Self {
        Self::new(MessageLevel::Warning, action, message, ttl)
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.duration_since(self.created) >= self.ttl
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

fn user_reason(err: &PortalError) -> &'static str {
    match err {
        PortalError::QuotaExceeded { .. } => "storage is full",
        PortalError::Unavailable(_) => "storage is not available right now",
        PortalError::NotFound(_) => "the document no longer exists",
        PortalError::ReadTimeout { .. } => "reading the file took too long",
        PortalError::UnsupportedEncoding(_) => "the file could not be read",
        PortalError::InvalidUpload(_) => "the file was not accepted",
        PortalError::CorruptSnapshot { .. } => "saved data is damaged",
        PortalError::FeatureDisabled(_) => "this feature is turned off",
        _ => "an unexpected error occurred",
    }
}

/// Receives notices from the registry and the commands.
pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Keeps notices until they expire or are dismissed.
#[derive(Debug, Default)]
pub struct NoticeLog {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices that have not expired yet, oldest first. Expired ones are dropped.
    pub fn active(&self) -> Vec<Notice> {
        let now = Instant::now();
        let mut notices = self.notices.lock().unwrap_or_else(|p| p.into_inner());
        notices.retain(|n| !n.is_expired_at(now));
        notices.clone()
    }

    /// Removes the `index`-th active notice. Returns false if there is none.
    pub fn dismiss(&self, index: usize) -> bool {
        let now = Instant::now();
        let mut notices = self.notices.lock().unwrap_or_else(|p| p.into_inner());
        notices.retain(|n| !n.is_expired_at(now));
        if index < notices.len() {
            notices.remove(index);
            true
        } else {
            false
        }
    }

    /// Takes every notice, expired or not.
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

impl NoticeSink for NoticeLog {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(notice);
    }
}

/// Forwards notices to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NoticeSink for TracingSink {
    fn notify(&self, notice: Notice) {
        match notice.level {
            MessageLevel::Error => {
                tracing::error!(action = %notice.action, "{}", notice.message)
            }
            MessageLevel::Warning => {
                tracing::warn!(action = %notice.action, "{}", notice.message)
            }
            _ => tracing::info!(action = %notice.action, "{}", notice.message),
        }
    }
}

/// Sends every notice to each inner sink.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NoticeSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn NoticeSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl NoticeSink for FanoutSink {
    fn notify(&self, notice: Notice) {
        for sink in &self.sinks {
            sink.notify(notice.clone());
        }
    }
}
