//! Notification digest job.
//!
//! Mails the pending queue to category subscribers. Fired by the scheduler
//! whenever the job's entry in the schedule table falls due.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, ShutdownBehavior},
};
use crate::schedule::NOTIFICATION_JOB;
use crate::send::SendRoutine;
use std::sync::Arc;
use tracing::info;

pub struct NotificationDigestJob {
    send_routine: Arc<dyn SendRoutine>,
}

impl NotificationDigestJob {
    pub fn new(send_routine: Arc<dyn SendRoutine>) -> Self {
        Self { send_routine }
    }
}

impl BackgroundJob for NotificationDigestJob {
    fn id(&self) -> &'static str {
        NOTIFICATION_JOB
    }

    fn name(&self) -> &'static str {
        "Notification Digest"
    }

    fn description(&self) -> &'static str {
        "Email subscribers the posts queued since the last digest"
    }

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        ShutdownBehavior::WaitForCompletion
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            info!("Shutdown requested, skipping notification digest");
            return Err(JobError::Cancelled);
        }
        self.send_routine.send_due_notifications()?;
        Ok(())
    }
}
