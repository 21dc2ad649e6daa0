use serde::{Deserialize, Serialize};
use std::fmt;

/// Firing periods offered for the notification job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    #[default]
    Hourly,
    TwiceDaily,
    Daily,
}

impl Recurrence {
    pub const ALL: [Recurrence; 3] = [Recurrence::Hourly, Recurrence::TwiceDaily, Recurrence::Daily];

    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::Hourly => "hourly",
            Recurrence::TwiceDaily => "twicedaily",
            Recurrence::Daily => "daily",
        }
    }

    pub fn interval_seconds(&self) -> u64 {
        match self {
            Recurrence::Hourly => 3600,
            Recurrence::TwiceDaily => 43_200,
            Recurrence::Daily => 86_400,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "hourly" => Some(Recurrence::Hourly),
            "twicedaily" => Some(Recurrence::TwiceDaily),
            "daily" => Some(Recurrence::Daily),
            _ => None,
        }
    }

    /// Unknown or empty values fall back to hourly.
    pub fn parse_or_hourly(s: &str) -> Self {
        Self::parse(s).unwrap_or(Recurrence::Hourly)
    }

    pub fn from_interval_seconds(seconds: u64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|recurrence| recurrence.interval_seconds() == seconds)
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
