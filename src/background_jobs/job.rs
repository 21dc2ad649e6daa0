use super::context::JobContext;
use crate::send::SendError;

/// How a job should be handled during server shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownBehavior {
    /// Job can be cancelled immediately
    #[default]
    Cancellable,
    /// Wait for job to complete before shutdown
    WaitForCompletion,
}

/// Errors that can occur during job execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    AlreadyRunning,
    ExecutionFailed(String),
    Cancelled,
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::AlreadyRunning => write!(f, "Job is already running"),
            JobError::ExecutionFailed(msg) => write!(f, "Execution failed: {}", msg),
            JobError::Cancelled => write!(f, "Job was cancelled"),
        }
    }
}

impl std::error::Error for JobError {}

impl From<SendError> for JobError {
    fn from(err: SendError) -> Self {
        JobError::ExecutionFailed(err.to_string())
    }
}

/// Trait for background jobs.
///
/// Jobs are executed synchronously in a blocking context.
pub trait BackgroundJob: Send + Sync {
    /// Unique identifier, also the job's key in the schedule table.
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        ShutdownBehavior::Cancellable
    }

    /// Called from `spawn_blocking`. Implementations should return
    /// `JobError::Cancelled` early once `ctx.is_cancelled()`.
    fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_errors_fail_the_job() {
        assert_eq!(
            JobError::from(SendError::Transport("connection refused".to_string())),
            JobError::ExecutionFailed("mail transport failed: connection refused".to_string())
        );
        assert_eq!(
            JobError::from(SendError::Storage("disk full".to_string())),
            JobError::ExecutionFailed("notification storage failed: disk full".to_string())
        );
    }
}
