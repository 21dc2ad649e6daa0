use chrono::{DateTime, Utc};
use serde::Serialize;

/// Regular content posts, the items the notifier queues.
pub const POST_TYPE_POST: &str = "post";
/// Subscriber records: the title holds the subscriber's email address and the
/// categories are the ones they subscribed to.
pub const POST_TYPE_SUBSCRIBER: &str = "stc";
pub const POST_STATUS_PUBLISH: &str = "publish";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: i64,
    pub post_type: String,
    pub post_status: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub post_type: String,
    pub post_status: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub category_ids: Vec<i64>,
}

impl NewPost {
    pub fn published(post_type: &str, title: &str, content: &str) -> Self {
        NewPost {
            post_type: post_type.to_string(),
            post_status: POST_STATUS_PUBLISH.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
            category_ids: Vec::new(),
        }
    }

    pub fn in_categories(mut self, category_ids: &[i64]) -> Self {
        self.category_ids = category_ids.to_vec();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i64,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobRunStatus {
    Running,
    Completed,
    Failed,
}

impl JobRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobRunStatus::Running => "running",
            JobRunStatus::Completed => "completed",
            JobRunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(JobRunStatus::Running),
            "completed" => Some(JobRunStatus::Completed),
            "failed" => Some(JobRunStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRun {
    pub id: i64,
    pub job_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: JobRunStatus,
    pub error_message: Option<String>,
    /// "schedule" or "manual"
    pub triggered_by: String,
}
