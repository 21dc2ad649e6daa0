//! Background execution of the notification job.
//!
//! The scheduler fires the job from the persisted schedule table; manual runs
//! go through the same [`JobRunner`], so the two never overlap and both end up
//! in the job run history.

mod context;
mod handle;
mod job;
pub mod jobs;
mod runner;
mod scheduler;

pub use context::JobContext;
pub use handle::{JobInfo, JobRunInfo, SchedulerHandle};
pub use job::{BackgroundJob, JobError, ShutdownBehavior};
pub use runner::JobRunner;
pub use scheduler::JobScheduler;
