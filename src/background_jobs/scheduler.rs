use super::context::JobContext;
use super::job::{BackgroundJob, JobError, ShutdownBehavior};
use super::runner::JobRunner;
use crate::schedule::ScheduleStore;
use crate::site_store::SiteStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Fires the recurring job whenever its entry in the schedule table falls due.
///
/// The schedule table is the only source of truth for when the job runs: the
/// scheduler sleeps until the entry's due time (capped at `check_interval`,
/// so relocations made meanwhile are noticed), then claims the entry, which
/// re-registers it one interval later, and only runs the job if the claim
/// succeeded.
pub struct JobScheduler {
    job: Arc<dyn BackgroundJob>,
    schedule: ScheduleStore,
    runner: JobRunner,
    site_store: Arc<dyn SiteStore>,
    shutdown_token: CancellationToken,
    check_interval: Duration,
}

impl JobScheduler {
    pub fn new(
        job: Arc<dyn BackgroundJob>,
        schedule: ScheduleStore,
        runner: JobRunner,
        site_store: Arc<dyn SiteStore>,
        shutdown_token: CancellationToken,
        check_interval: Duration,
    ) -> Self {
        Self {
            job,
            schedule,
            runner,
            site_store,
            shutdown_token,
            check_interval,
        }
    }

    /// Main scheduler loop.
    pub async fn run(self) {
        info!(
            "Starting job scheduler for {} (checking at least every {:?})",
            self.job.id(),
            self.check_interval
        );

        match self.site_store.mark_stale_jobs_failed() {
            Ok(count) if count > 0 => {
                info!("Marked {} stale jobs as failed from previous run", count);
            }
            Ok(_) => {}
            Err(e) => {
                error!("Failed to mark stale jobs: {}", e);
            }
        }

        loop {
            let sleep_duration = self.time_until_due();
            debug!("Scheduler sleeping for {:?}", sleep_duration);

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.tick().await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    fn time_until_due(&self) -> Duration {
        match self.schedule.get_due_time(self.job.id()) {
            Ok(Some(due)) => (due - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(self.check_interval),
            Ok(None) => self.check_interval,
            Err(e) => {
                warn!("Cannot read schedule of {}: {}", self.job.id(), e);
                self.check_interval
            }
        }
    }

    /// Runs the job if its entry is due now. Returns whether it ran.
    pub async fn tick(&self) -> bool {
        if let Err(e) = self.site_store.purge_expired_transients() {
            warn!("Failed to purge expired transients: {}", e);
        }

        let job_id = self.job.id();
        match self.schedule.claim_due_at(job_id, Utc::now()) {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!("{} is not due yet", job_id);
                return false;
            }
            Err(e) => {
                error!("Failed to claim {} for execution: {}", job_id, e);
                return false;
            }
        }

        let job = Arc::clone(&self.job);
        let runner = self.runner.clone();
        let ctx = JobContext::new(
            self.shutdown_token.child_token(),
            Arc::clone(&self.site_store),
        );
        let mut task = tokio::task::spawn_blocking(move || {
            runner.run(job.id(), "schedule", || job.execute(&ctx))
        });

        let wait_on_shutdown = self.job.shutdown_behavior() == ShutdownBehavior::WaitForCompletion;
        tokio::select! {
            result = &mut task => match result {
                Ok(Ok(())) | Ok(Err(JobError::ExecutionFailed(_))) | Ok(Err(JobError::Cancelled)) => {}
                Ok(Err(JobError::AlreadyRunning)) => {
                    warn!("{} was still running, this period is skipped", job_id);
                }
                Err(e) => {
                    error!("Job {} panicked: {}", job_id, e);
                }
            },
            _ = self.shutdown_token.cancelled(), if !wait_on_shutdown => {
                warn!("Shutdown requested while {} was running, not waiting for it", job_id);
            }
        }
        true
    }
}
