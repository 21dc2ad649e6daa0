use crate::site_store::SiteStore;
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const NOTICE_TRANSIENT_PREFIX: &str = "stc_manual_run_notice";

/// Unread notices disappear after this long.
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(3600);

/// Outcome of a manual run, carried across the redirect that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeFlag {
    Failure,
    Success,
}

impl NoticeFlag {
    pub fn from_success(success: bool) -> Self {
        if success {
            NoticeFlag::Success
        } else {
            NoticeFlag::Failure
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            NoticeFlag::Failure => 0,
            NoticeFlag::Success => 1,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "0" => Some(NoticeFlag::Failure),
            "1" => Some(NoticeFlag::Success),
            _ => None,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            NoticeFlag::Success => "Scheduled event successfully executed",
            NoticeFlag::Failure => "Scheduled event failed",
        }
    }
}

/// Single-read notices, one slot per operator, kept as expiring transients.
#[derive(Clone)]
pub struct NoticeStore {
    site_store: Arc<dyn SiteStore>,
    ttl: Duration,
}

impl NoticeStore {
    pub fn new(site_store: Arc<dyn SiteStore>, ttl: Duration) -> Self {
        Self { site_store, ttl }
    }

    fn key(user_id: usize) -> String {
        format!("{}_{}", NOTICE_TRANSIENT_PREFIX, user_id)
    }

    pub fn post(&self, user_id: usize, flag: NoticeFlag) -> Result<()> {
        self.site_store
            .set_transient(&Self::key(user_id), &flag.value().to_string(), self.ttl)
    }

    /// Reads and deletes the notice; later calls return `None`.
    pub fn take(&self, user_id: usize) -> Result<Option<NoticeFlag>> {
        let raw = self.site_store.take_transient(&Self::key(user_id))?;
        Ok(raw.and_then(|raw| {
            let flag = NoticeFlag::parse(&raw);
            if flag.is_none() {
                warn!("Discarding unreadable notice {:?}", raw);
            }
            flag
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site_store::SqliteSiteStore;
    use tempfile::TempDir;

    fn create_notices(ttl: Duration) -> (NoticeStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let site_store = Arc::new(SqliteSiteStore::new(temp_dir.path().join("site.db")).unwrap());
        (NoticeStore::new(site_store, ttl), temp_dir)
    }

    #[test]
    fn notice_is_read_exactly_once() {
        let (notices, _dir) = create_notices(DEFAULT_NOTICE_TTL);
        notices.post(1, NoticeFlag::Failure).unwrap();

        assert_eq!(notices.take(1).unwrap(), Some(NoticeFlag::Failure));
        assert_eq!(notices.take(1).unwrap(), None);
    }

    #[test]
    fn notices_belong_to_their_operator() {
        let (notices, _dir) = create_notices(DEFAULT_NOTICE_TTL);
        notices.post(1, NoticeFlag::Success).unwrap();

        assert_eq!(notices.take(2).unwrap(), None);
        assert_eq!(notices.take(1).unwrap(), Some(NoticeFlag::Success));
    }

    #[test]
    fn expired_notice_is_gone() {
        let (notices, _dir) = create_notices(Duration::ZERO);
        notices.post(1, NoticeFlag::Success).unwrap();
        assert_eq!(notices.take(1).unwrap(), None);
    }

    #[test]
    fn flag_values() {
        assert_eq!(NoticeFlag::from_success(true).value(), 1);
        assert_eq!(NoticeFlag::from_success(false).value(), 0);
        assert_eq!(NoticeFlag::parse("2"), None);
    }
}
