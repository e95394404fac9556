//! Transient user notices
//!
//! Non-fatal failures (duplicate link attempts, backend errors) surface as
//! [`Notice`]s on a broadcast channel. The hosting UI renders them as
//! toast-style transient notifications; nothing in the engine blocks or
//! crashes on them.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeLevel {
    /// Informational, e.g. a rejected duplicate link.
    Info,
    /// Something persisted differently than requested, or not at all.
    Warning,
    /// A backend call failed; local state may be ahead of the backend.
    Error,
}

/// A transient, non-blocking user notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Shared notice publisher handed to every service.
#[derive(Clone)]
pub struct NoticeSink {
    tx: broadcast::Sender<Notice>,
}

impl NoticeSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    /// Publish a notice; dropped silently when nobody listens.
    pub fn publish(&self, notice: Notice) {
        tracing::debug!(level = ?notice.level, message = %notice.message, "notice");
        let _ = self.tx.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let sink = NoticeSink::new(8);
        let mut rx = sink.subscribe();

        sink.publish(Notice::info("a link already exists between these cards"));

        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Info);
        assert!(notice.message.contains("already exists"));
    }

    #[test]
    fn test_publish_without_subscribers_does_not_panic() {
        let sink = NoticeSink::new(8);
        sink.publish(Notice::error("backend unreachable"));
    }
}
