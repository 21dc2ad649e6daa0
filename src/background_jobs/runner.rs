use super::job::JobError;
use crate::server::metrics;
use crate::site_store::{JobRunStatus, SiteStore};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, warn};

/// Runs jobs synchronously while recording each run in the job history, and
/// refuses to start a job that is already running, whoever started it.
#[derive(Clone)]
pub struct JobRunner {
    site_store: Arc<dyn SiteStore>,
    running: Arc<Mutex<HashSet<String>>>,
}

/// Clears the running flag even if the job panics.
struct RunningGuard {
    running: Arc<Mutex<HashSet<String>>>,
    job_id: String,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running.lock().unwrap().remove(&self.job_id);
        metrics::set_background_job_running(&self.job_id, false);
    }
}

impl JobRunner {
    pub fn new(site_store: Arc<dyn SiteStore>) -> Self {
        Self {
            site_store,
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn is_running(&self, job_id: &str) -> bool {
        self.running.lock().unwrap().contains(job_id)
    }

    /// Blocking; call from `spawn_blocking` when on the async runtime.
    pub fn run<F>(&self, job_id: &str, triggered_by: &str, work: F) -> Result<(), JobError>
    where
        F: FnOnce() -> Result<(), JobError>,
    {
        if !self.running.lock().unwrap().insert(job_id.to_string()) {
            warn!("Not starting {} ({}): already running", job_id, triggered_by);
            metrics::record_background_job_execution(job_id, triggered_by, "skipped", 0.0);
            return Err(JobError::AlreadyRunning);
        }
        let _guard = RunningGuard {
            running: Arc::clone(&self.running),
            job_id: job_id.to_string(),
        };
        metrics::set_background_job_running(job_id, true);

        let run_id = match self.site_store.record_job_start(job_id, triggered_by) {
            Ok(id) => Some(id),
            Err(e) => {
                error!("Failed to record job start for {}: {}", job_id, e);
                None
            }
        };
        info!(
            "Starting job: {} (run_id: {:?}, triggered_by: {})",
            job_id, run_id, triggered_by
        );

        let start_time = Instant::now();
        let result = work();
        let elapsed = start_time.elapsed();

        let (status, error_message, status_label) = match &result {
            Ok(()) => {
                info!("Job {} completed successfully in {:?}", job_id, elapsed);
                (JobRunStatus::Completed, None, "success")
            }
            Err(JobError::Cancelled) => {
                info!("Job {} was cancelled after {:?}", job_id, elapsed);
                (JobRunStatus::Failed, Some("Cancelled".to_string()), "cancelled")
            }
            Err(e) => {
                error!("Job {} failed after {:?}: {}", job_id, elapsed, e);
                (JobRunStatus::Failed, Some(e.to_string()), "failed")
            }
        };

        if let Some(run_id) = run_id {
            if let Err(e) = self
                .site_store
                .record_job_finish(run_id, status, error_message)
            {
                error!("Failed to record job finish for {}: {}", job_id, e);
            }
        }
        metrics::record_background_job_execution(
            job_id,
            triggered_by,
            status_label,
            elapsed.as_secs_f64(),
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site_store::SqliteSiteStore;
    use tempfile::TempDir;

    fn create_runner() -> (JobRunner, Arc<SqliteSiteStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let site_store = Arc::new(SqliteSiteStore::new(temp_dir.path().join("site.db")).unwrap());
        (JobRunner::new(site_store.clone()), site_store, temp_dir)
    }

    #[test]
    fn successful_and_failed_runs_are_recorded() {
        let (runner, site_store, _dir) = create_runner();

        runner.run("digest", "schedule", || Ok(())).unwrap();
        let err = runner
            .run("digest", "manual", || {
                Err(JobError::ExecutionFailed("smtp down".to_string()))
            })
            .unwrap_err();
        assert_eq!(err, JobError::ExecutionFailed("smtp down".to_string()));

        let history = site_store.get_job_history("digest", 10).unwrap();
        assert_eq!(history.len(), 2);
        let manual = history.iter().find(|r| r.triggered_by == "manual").unwrap();
        assert_eq!(manual.status, JobRunStatus::Failed);
        assert_eq!(
            manual.error_message.as_deref(),
            Some("Execution failed: smtp down")
        );
        assert!(!runner.is_running("digest"));
    }

    #[test]
    fn overlapping_runs_are_refused() {
        let (runner, site_store, _dir) = create_runner();
        let inner = runner.clone();

        runner
            .run("digest", "schedule", || {
                assert!(inner.is_running("digest"));
                assert_eq!(
                    inner.run("digest", "manual", || Ok(())),
                    Err(JobError::AlreadyRunning)
                );
                Ok(())
            })
            .unwrap();

        assert_eq!(site_store.get_job_history("digest", 10).unwrap().len(), 1);
        assert!(!runner.is_running("digest"));
    }
}
