use super::recurrence::Recurrence;
use super::store::{ScheduleStore, StoreError};
use chrono::{DateTime, Utc};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescheduleOutcome {
    /// The submitted recurrence equals the stored one; the due time was kept.
    Unchanged,
    Relocated { due_at: DateTime<Utc> },
}

/// Turns a submitted recurrence into a relocation of the job's schedule entry.
#[derive(Clone)]
pub struct Rescheduler {
    schedule_store: ScheduleStore,
    job_name: String,
}

impl Rescheduler {
    pub fn new(schedule_store: ScheduleStore, job_name: &str) -> Self {
        Self {
            schedule_store,
            job_name: job_name.to_string(),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Parses `raw_interval` (unknown values mean hourly) and relocates the
    /// job when it differs from `current`. On success returns the recurrence
    /// to persist.
    pub fn apply(
        &self,
        raw_interval: &str,
        current: Recurrence,
    ) -> Result<(Recurrence, RescheduleOutcome), StoreError> {
        self.apply_at(raw_interval, current, Utc::now())
    }

    pub fn apply_at(
        &self,
        raw_interval: &str,
        current: Recurrence,
        now: DateTime<Utc>,
    ) -> Result<(Recurrence, RescheduleOutcome), StoreError> {
        let requested = Recurrence::parse_or_hourly(raw_interval);
        if requested == current {
            debug!("Recurrence of {} unchanged ({})", self.job_name, current);
            return Ok((requested, RescheduleOutcome::Unchanged));
        }
        let due_at =
            self.schedule_store
                .relocate_at(&self.job_name, requested.interval_seconds(), now)?;
        Ok((requested, RescheduleOutcome::Relocated { due_at }))
    }
}
