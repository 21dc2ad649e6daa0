use super::models::QueueItem;
use super::store::{QueueError, QueueStore};
use crate::schedule::ScheduleStore;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use std::fmt::Write;
use tracing::warn;

/// How due times are shown to the operator: a `strftime` pattern and the
/// site's offset from UTC.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DisplayFormat {
    pub pattern: String,
    pub utc_offset_seconds: i32,
}

impl Default for DisplayFormat {
    fn default() -> Self {
        DisplayFormat {
            pattern: "%Y-%m-%d %H:%M:%S".to_string(),
            utc_offset_seconds: 0,
        }
    }
}

impl DisplayFormat {
    /// Whether every specifier in the pattern is one chrono understands.
    pub fn is_valid_pattern(pattern: &str) -> bool {
        !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
    }

    /// `None` for an out of range offset or a pattern chrono cannot render.
    pub fn render(&self, at: DateTime<Utc>) -> Option<String> {
        let offset = FixedOffset::east_opt(self.utc_offset_seconds)?;
        let mut rendered = String::new();
        write!(rendered, "{}", at.with_timezone(&offset).format(&self.pattern)).ok()?;
        Some(rendered)
    }
}

/// Read side of the admin page: what is waiting and when it goes out next.
#[derive(Clone)]
pub struct QueueInspector {
    queue: QueueStore,
    schedule: ScheduleStore,
}

impl QueueInspector {
    pub fn new(queue: QueueStore, schedule: ScheduleStore) -> Self {
        Self { queue, schedule }
    }

    pub fn list_pending(&self) -> Result<Vec<QueueItem>, QueueError> {
        self.queue.list_pending()
    }

    pub fn count_pending(&self) -> Result<usize, QueueError> {
        self.queue.count_pending()
    }

    /// `None` when the job is not scheduled or the table cannot be read.
    pub fn next_run(&self, job_name: &str) -> Option<DateTime<Utc>> {
        match self.schedule.get_due_time(job_name) {
            Ok(due) => due,
            Err(err) => {
                warn!("Cannot read next run of {}: {}", job_name, err);
                None
            }
        }
    }

    pub fn next_run_display(&self, job_name: &str, format: &DisplayFormat) -> Option<String> {
        let due = self.next_run(job_name)?;
        let rendered = format.render(due);
        if rendered.is_none() {
            warn!(
                "Cannot render next run with pattern {:?} at offset {}s",
                format.pattern, format.utc_offset_seconds
            );
        }
        rendered
    }
}
