//! Typed view of the persisted schedule table.
//!
//! The table is stored as one JSON document mapping a due time (unix seconds,
//! as a string key) to the jobs due at that time, each with its descriptor:
//!
//! ```json
//! {"1700000000": {"stc_schedule_email": {"schedule": "hourly", "interval": 3600}}}
//! ```
//!
//! Keys that are not timestamps and descriptor fields this crate does not
//! know about are carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Name of the recurrence, when the job recurs under a named period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(rename = "interval", default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobDescriptor {
    pub fn recurring(schedule: &str, interval_seconds: u64) -> Self {
        JobDescriptor {
            schedule: Some(schedule.to_string()),
            interval_seconds: Some(interval_seconds),
            extra: Map::new(),
        }
    }
}

pub type Slot = BTreeMap<String, JobDescriptor>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleTable {
    slots: BTreeMap<i64, Slot>,
    other: Map<String, Value>,
}

impl ScheduleTable {
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        let document: Map<String, Value> = serde_json::from_str(raw)?;
        let mut table = ScheduleTable::default();
        for (key, value) in document {
            match key.parse::<i64>() {
                Ok(due_at) => {
                    let slot: Slot = serde_json::from_value(value)?;
                    table.slots.insert(due_at, slot);
                }
                Err(_) => {
                    table.other.insert(key, value);
                }
            }
        }
        Ok(table)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut document = self.other.clone();
        for (due_at, slot) in &self.slots {
            document.insert(due_at.to_string(), serde_json::to_value(slot)?);
        }
        serde_json::to_string(&document)
    }

    /// True when no job is scheduled, even if empty slots remain.
    pub fn is_empty(&self) -> bool {
        self.slots.values().all(|slot| slot.is_empty())
    }

    pub fn slot(&self, due_at: i64) -> Option<&Slot> {
        self.slots.get(&due_at)
    }

    /// Earliest entry of `job_name`.
    pub fn entry(&self, job_name: &str) -> Option<(i64, &JobDescriptor)> {
        self.slots
            .iter()
            .find_map(|(due_at, slot)| slot.get(job_name).map(|d| (*due_at, d)))
    }

    pub fn due_time(&self, job_name: &str) -> Option<i64> {
        self.entry(job_name).map(|(due_at, _)| due_at)
    }

    pub fn count_entries(&self, job_name: &str) -> usize {
        self.slots
            .values()
            .filter(|slot| slot.contains_key(job_name))
            .count()
    }

    pub fn insert(&mut self, due_at: i64, job_name: &str, descriptor: JobDescriptor) {
        self.slots
            .entry(due_at)
            .or_default()
            .insert(job_name.to_string(), descriptor);
    }

    /// Removes every entry of `job_name`, dropping the slots this empties,
    /// and returns the earliest removed entry. Slots that were already empty
    /// are kept.
    pub fn remove_job(&mut self, job_name: &str) -> Option<(i64, JobDescriptor)> {
        let mut earliest = None;
        self.slots.retain(|due_at, slot| {
            let Some(descriptor) = slot.remove(job_name) else {
                return true;
            };
            if earliest.is_none() {
                earliest = Some((*due_at, descriptor));
            }
            !slot.is_empty()
        });
        earliest
    }

    /// Moves `job_name` to `new_due_at`, passing its current descriptor
    /// through `update`. Returns the previous due time, or `None` (with the
    /// table unchanged) when the job has no entry.
    pub fn move_job(
        &mut self,
        job_name: &str,
        new_due_at: i64,
        update: impl FnOnce(JobDescriptor) -> JobDescriptor,
    ) -> Option<i64> {
        let (old_due_at, descriptor) = self.remove_job(job_name)?;
        self.insert(new_due_at, job_name, update(descriptor));
        Some(old_due_at)
    }
}
