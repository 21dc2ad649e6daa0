use super::models::{QueueItem, QueueStatus, STATUS_META_KEY};
use crate::server::metrics;
use crate::site_store::{Post, SiteStore, POST_STATUS_PUBLISH, POST_TYPE_POST};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue item {0} not found")]
    NotFound(i64),
    #[error("queue storage failure: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for QueueError {
    fn from(err: anyhow::Error) -> Self {
        QueueError::Storage(format!("{:#}", err))
    }
}

/// Status tags of queue-eligible posts.
#[derive(Clone)]
pub struct QueueStore {
    site_store: Arc<dyn SiteStore>,
}

impl QueueStore {
    pub fn new(site_store: Arc<dyn SiteStore>) -> Self {
        Self { site_store }
    }

    fn to_item(post: Post) -> QueueItem {
        QueueItem {
            id: post.id,
            status: QueueStatus::Outbox,
            title: post.title,
            content: post.content,
            created_at: post.created_at,
        }
    }

    /// Published posts tagged outbox, in storage order (newest first).
    pub fn list_pending(&self) -> Result<Vec<QueueItem>, QueueError> {
        let posts = self.site_store.posts_with_meta(
            POST_TYPE_POST,
            POST_STATUS_PUBLISH,
            STATUS_META_KEY,
            QueueStatus::Outbox.as_str(),
        )?;
        Ok(posts.into_iter().map(Self::to_item).collect())
    }

    pub fn count_pending(&self) -> Result<usize, QueueError> {
        Ok(self.site_store.count_posts_with_meta(
            POST_TYPE_POST,
            POST_STATUS_PUBLISH,
            STATUS_META_KEY,
            QueueStatus::Outbox.as_str(),
        )?)
    }

    pub fn status(&self, item_id: i64) -> Result<QueueStatus, QueueError> {
        if self.site_store.get_post(item_id)?.is_none() {
            return Err(QueueError::NotFound(item_id));
        }
        let tag = self.site_store.get_post_meta(item_id, STATUS_META_KEY)?;
        Ok(QueueStatus::from_tag(tag.as_deref()))
    }

    fn set_status(&self, item_id: i64, status: QueueStatus) -> Result<(), QueueError> {
        if !self
            .site_store
            .set_post_meta(item_id, STATUS_META_KEY, status.as_str())?
        {
            return Err(QueueError::NotFound(item_id));
        }
        debug!("Queue item {} is now {}", item_id, status.as_str());
        Ok(())
    }

    /// Tags a freshly published post for the next digest.
    pub fn enqueue(&self, item_id: i64) -> Result<(), QueueError> {
        self.set_status(item_id, QueueStatus::Outbox)
    }

    /// Takes the item out of the queue for good. Blocking an already blocked
    /// item succeeds without changing anything.
    pub fn block(&self, item_id: i64) -> Result<(), QueueError> {
        self.set_status(item_id, QueueStatus::Blocked)?;
        info!("Removed post {} from the sending queue", item_id);
        metrics::record_queue_block();
        Ok(())
    }

    pub fn mark_sent(&self, item_id: i64) -> Result<(), QueueError> {
        self.set_status(item_id, QueueStatus::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site_store::{NewPost, SqliteSiteStore};
    use tempfile::TempDir;

    struct TestQueue {
        queue: QueueStore,
        site_store: Arc<SqliteSiteStore>,
        _temp_dir: TempDir,
    }

    fn create_test_queue() -> TestQueue {
        let temp_dir = TempDir::new().unwrap();
        let site_store = Arc::new(SqliteSiteStore::new(temp_dir.path().join("site.db")).unwrap());
        TestQueue {
            queue: QueueStore::new(site_store.clone()),
            site_store,
            _temp_dir: temp_dir,
        }
    }

    fn add_post(test: &TestQueue, title: &str) -> i64 {
        test.site_store
            .insert_post(&NewPost::published(POST_TYPE_POST, title, "body"))
            .unwrap()
    }

    #[test]
    fn only_outbox_items_are_pending() {
        let test = create_test_queue();
        let a = add_post(&test, "A");
        let b = add_post(&test, "B");
        let c = add_post(&test, "C");
        add_post(&test, "untagged");

        test.queue.enqueue(a).unwrap();
        test.queue.enqueue(b).unwrap();
        test.queue.block(b).unwrap();
        test.queue.enqueue(c).unwrap();
        test.queue.mark_sent(c).unwrap();

        let pending = test.queue.list_pending().unwrap();
        assert_eq!(pending.iter().map(|i| i.id).collect::<Vec<_>>(), vec![a]);
        assert_eq!(pending[0].title, "A");
        assert_eq!(test.queue.count_pending().unwrap(), 1);
    }

    #[test]
    fn count_matches_list_for_mixed_queues() {
        let test = create_test_queue();
        for i in 0..12 {
            let id = add_post(&test, &format!("post {}", i));
            test.queue.enqueue(id).unwrap();
            match i % 3 {
                0 => test.queue.block(id).unwrap(),
                1 => test.queue.mark_sent(id).unwrap(),
                _ => {}
            }
            assert_eq!(
                test.queue.count_pending().unwrap(),
                test.queue.list_pending().unwrap().len()
            );
        }
        assert_eq!(test.queue.count_pending().unwrap(), 4);
    }

    #[test]
    fn blocking_is_idempotent() {
        let test = create_test_queue();
        let id = add_post(&test, "A");
        test.queue.enqueue(id).unwrap();

        test.queue.block(id).unwrap();
        let after_once = test.queue.list_pending().unwrap();
        test.queue.block(id).unwrap();

        assert_eq!(test.queue.list_pending().unwrap(), after_once);
        assert_eq!(test.queue.status(id).unwrap(), QueueStatus::Blocked);
    }

    #[test]
    fn unknown_items_are_not_found() {
        let test = create_test_queue();
        assert_eq!(test.queue.block(999), Err(QueueError::NotFound(999)));
        assert_eq!(test.queue.status(999), Err(QueueError::NotFound(999)));
    }

    #[test]
    fn unrecognized_tags_read_as_sent() {
        let test = create_test_queue();
        let id = add_post(&test, "A");
        assert_eq!(test.queue.status(id).unwrap(), QueueStatus::Sent);

        test.site_store
            .set_post_meta(id, STATUS_META_KEY, "archived")
            .unwrap();
        assert_eq!(test.queue.status(id).unwrap(), QueueStatus::Sent);
        assert!(test.queue.list_pending().unwrap().is_empty());
    }
}
