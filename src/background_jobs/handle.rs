use super::job::BackgroundJob;
use super::runner::JobRunner;
use crate::schedule::ScheduleStore;
use crate::site_store::{JobRun, SiteStore};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

/// Information about the scheduled job for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
    pub is_running: bool,
    pub last_run: Option<JobRunInfo>,
    pub next_run_at: Option<String>,
}

/// Serializable job run information.
#[derive(Debug, Clone, Serialize)]
pub struct JobRunInfo {
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub triggered_by: String,
}

impl From<JobRun> for JobRunInfo {
    fn from(run: JobRun) -> Self {
        JobRunInfo {
            started_at: run.started_at.to_rfc3339(),
            finished_at: run.finished_at.map(|dt| dt.to_rfc3339()),
            status: run.status.as_str().to_string(),
            error_message: run.error_message,
            triggered_by: run.triggered_by,
        }
    }
}

/// Read access to the scheduled job's state from HTTP handlers.
#[derive(Clone)]
pub struct SchedulerHandle {
    job: Arc<dyn BackgroundJob>,
    runner: JobRunner,
    schedule: ScheduleStore,
    site_store: Arc<dyn SiteStore>,
}

impl SchedulerHandle {
    pub fn new(
        job: Arc<dyn BackgroundJob>,
        runner: JobRunner,
        schedule: ScheduleStore,
        site_store: Arc<dyn SiteStore>,
    ) -> Self {
        Self {
            job,
            runner,
            schedule,
            site_store,
        }
    }

    pub fn job_info(&self) -> Result<JobInfo> {
        let job_id = self.job.id();
        let table = self.schedule.table()?;
        let entry = table.entry(job_id);
        let next_run_at = entry
            .and_then(|(due_at, _)| chrono::DateTime::from_timestamp(due_at, 0))
            .map(|dt| dt.to_rfc3339());

        Ok(JobInfo {
            id: job_id.to_string(),
            name: self.job.name().to_string(),
            description: self.job.description().to_string(),
            schedule: entry.and_then(|(_, d)| d.schedule.clone()),
            interval_secs: entry.and_then(|(_, d)| d.interval_seconds),
            is_running: self.runner.is_running(job_id),
            last_run: self
                .site_store
                .get_last_run(job_id)?
                .map(JobRunInfo::from),
            next_run_at,
        })
    }

    pub fn job_history(&self, limit: usize) -> Result<Vec<JobRunInfo>> {
        Ok(self
            .site_store
            .get_job_history(self.job.id(), limit)?
            .into_iter()
            .map(JobRunInfo::from)
            .collect())
    }
}
