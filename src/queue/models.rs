use chrono::{DateTime, Utc};
use serde::Serialize;

/// Post meta key holding an item's queue status.
pub const STATUS_META_KEY: &str = "_stc_notifier_status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Outbox,
    Blocked,
    Sent,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Outbox => "outbox",
            QueueStatus::Blocked => "blocked",
            QueueStatus::Sent => "sent",
        }
    }

    /// A missing tag, or any tag other than outbox and blocked, means the
    /// item is no longer pending.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("outbox") => QueueStatus::Outbox,
            Some("blocked") => QueueStatus::Blocked,
            _ => QueueStatus::Sent,
        }
    }

    pub fn is_pending(&self) -> bool {
        *self == QueueStatus::Outbox
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueItem {
    pub id: i64,
    pub status: QueueStatus,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
