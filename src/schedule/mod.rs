//! The persisted table of recurring jobs and the operations that keep the
//! notification job registered exactly once in it.

mod recurrence;
mod rescheduler;
mod store;
mod table;

pub use recurrence::Recurrence;
pub use rescheduler::{RescheduleOutcome, Rescheduler};
pub use store::{ScheduleStore, StoreError, SCHEDULE_OPTION};
pub use table::{JobDescriptor, ScheduleTable, Slot};

/// Name of the recurring job that sends notification digests.
pub const NOTIFICATION_JOB: &str = "stc_schedule_email";
