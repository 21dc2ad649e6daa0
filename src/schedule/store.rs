use super::recurrence::Recurrence;
use super::table::{JobDescriptor, ScheduleTable};
use crate::server::metrics;
use crate::site_store::SiteStore;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Option under which the schedule table is persisted.
pub const SCHEDULE_OPTION: &str = "cron";

/// Concurrent writers retry on a fresh read at most this many times.
const MAX_WRITE_ATTEMPTS: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no schedule entry for job {0}")]
    NotFound(String),
    #[error("schedule table could not be written: {0}")]
    WriteFailed(String),
    #[error("schedule table could not be read: {0}")]
    Unreadable(String),
    #[error("interval of {0}s is out of range")]
    IntervalOutOfRange(u64),
}

/// Reads and rewrites the persisted schedule table. Every mutation is a
/// compare-and-swap of the whole serialized document, so two writers racing
/// on the same job can never leave it registered twice.
#[derive(Clone)]
pub struct ScheduleStore {
    site_store: Arc<dyn SiteStore>,
}

impl ScheduleStore {
    pub fn new(site_store: Arc<dyn SiteStore>) -> Self {
        Self { site_store }
    }

    fn load(&self) -> Result<(Option<String>, ScheduleTable), StoreError> {
        let raw = self
            .site_store
            .get_option(SCHEDULE_OPTION)
            .map_err(|e| StoreError::Unreadable(e.to_string()))?;
        let table = match raw.as_deref() {
            Some(raw) => {
                ScheduleTable::parse(raw).map_err(|e| StoreError::Unreadable(e.to_string()))?
            }
            None => ScheduleTable::default(),
        };
        Ok((raw, table))
    }

    /// Applies `change` to the current table and persists the result, retrying
    /// from a fresh read when another writer changed the table meanwhile.
    /// Nothing is written when `change` fails or reports the table unmodified.
    fn update_table<T>(
        &self,
        mut change: impl FnMut(&mut ScheduleTable) -> Result<(T, bool), StoreError>,
    ) -> Result<T, StoreError> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let (raw, mut table) = self.load()?;
            let (output, modified) = change(&mut table)?;
            if !modified {
                return Ok(output);
            }

            let serialized = table
                .to_json()
                .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
            match self
                .site_store
                .compare_and_swap_option(SCHEDULE_OPTION, raw.as_deref(), &serialized)
            {
                Ok(true) => return Ok(output),
                Ok(false) => {
                    debug!(
                        "Schedule table changed concurrently (attempt {}/{})",
                        attempt, MAX_WRITE_ATTEMPTS
                    );
                }
                Err(err) => {
                    error!("Failed to persist schedule table: {:#}", err);
                    return Err(StoreError::WriteFailed(err.to_string()));
                }
            }
        }
        error!(
            "Giving up on schedule table write after {} concurrent modifications",
            MAX_WRITE_ATTEMPTS
        );
        Err(StoreError::WriteFailed(
            "too many concurrent modifications".to_string(),
        ))
    }

    pub fn table(&self) -> Result<ScheduleTable, StoreError> {
        Ok(self.load()?.1)
    }

    pub fn get_due_time(&self, job_name: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .table()?
            .due_time(job_name)
            .and_then(|due_at| Utc.timestamp_opt(due_at, 0).single()))
    }

    /// Moves the job's single entry to `now + new_interval_seconds`. Fails with
    /// [`StoreError::NotFound`] rather than creating a missing entry.
    pub fn relocate(
        &self,
        job_name: &str,
        new_interval_seconds: u64,
    ) -> Result<DateTime<Utc>, StoreError> {
        self.relocate_at(job_name, new_interval_seconds, Utc::now())
    }

    pub fn relocate_at(
        &self,
        job_name: &str,
        new_interval_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StoreError> {
        let new_due_at = match due_after(now, new_interval_seconds) {
            Ok(due_at) => due_at,
            Err(err) => {
                error!("Cannot relocate {}: {}", job_name, err);
                metrics::record_schedule_relocation("failed");
                return Err(err);
            }
        };
        let result = self.update_table(|table| {
            let old_due_at = table
                .move_job(job_name, new_due_at.timestamp(), |descriptor| {
                    with_interval(descriptor, new_interval_seconds)
                })
                .ok_or_else(|| StoreError::NotFound(job_name.to_string()))?;
            Ok((old_due_at, true))
        });

        match &result {
            Ok(old_due_at) => {
                info!(
                    "Relocated {} from {} to {} (every {}s)",
                    job_name,
                    old_due_at,
                    new_due_at.timestamp(),
                    new_interval_seconds
                );
                metrics::record_schedule_relocation("relocated");
            }
            Err(StoreError::NotFound(_)) => {
                warn!("Cannot relocate {}: not scheduled", job_name);
                metrics::record_schedule_relocation("not_found");
            }
            Err(err) => {
                error!("Cannot relocate {}: {}", job_name, err);
                metrics::record_schedule_relocation("failed");
            }
        }
        result.map(|_| new_due_at)
    }

    /// Registers the job at `now + interval` unless it already has an entry.
    /// Returns true when an entry was created.
    pub fn ensure_registered(
        &self,
        job_name: &str,
        recurrence: Recurrence,
    ) -> Result<bool, StoreError> {
        self.ensure_registered_at(job_name, recurrence, Utc::now())
    }

    pub fn ensure_registered_at(
        &self,
        job_name: &str,
        recurrence: Recurrence,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let due_at = due_after(now, recurrence.interval_seconds())?;
        let created = self.update_table(|table| {
            if table.due_time(job_name).is_some() {
                return Ok((false, false));
            }
            table.insert(
                due_at.timestamp(),
                job_name,
                JobDescriptor::recurring(recurrence.as_str(), recurrence.interval_seconds()),
            );
            Ok((true, true))
        })?;
        if created {
            info!("Registered {} to run {}", job_name, recurrence);
        }
        Ok(created)
    }

    /// Claims the job for execution if its entry is due at `now`: the entry is
    /// re-registered one interval after `now` in the same write, and the
    /// descriptor that was due is returned. `None` when nothing is due yet or
    /// the job is not scheduled.
    pub fn claim_due_at(
        &self,
        job_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<JobDescriptor>, StoreError> {
        self.update_table(|table| {
            let Some((due_at, descriptor)) = table.entry(job_name) else {
                return Ok((None, false));
            };
            if due_at > now.timestamp() {
                return Ok((None, false));
            }
            let claimed = descriptor.clone();
            let interval = claimed
                .interval_seconds
                .unwrap_or(Recurrence::Hourly.interval_seconds());
            let next_due_at = due_after(now, interval)?;
            table.move_job(job_name, next_due_at.timestamp(), |d| d);
            Ok((Some(claimed), true))
        })
    }
}

fn due_after(now: DateTime<Utc>, interval_seconds: u64) -> Result<DateTime<Utc>, StoreError> {
    i64::try_from(interval_seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|interval| now.checked_add_signed(interval))
        .ok_or(StoreError::IntervalOutOfRange(interval_seconds))
}

fn with_interval(mut descriptor: JobDescriptor, interval_seconds: u64) -> JobDescriptor {
    descriptor.interval_seconds = Some(interval_seconds);
    descriptor.schedule = Recurrence::from_interval_seconds(interval_seconds)
        .map(|recurrence| recurrence.as_str().to_string());
    descriptor
}
