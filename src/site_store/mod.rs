mod models;
mod schema;
mod sqlite_site_store;

#[cfg(test)]
pub(crate) mod failing_cas;

pub use models::*;
pub use schema::SITE_VERSIONED_SCHEMAS;
pub use sqlite_site_store::SqliteSiteStore;

use anyhow::Result;
use std::time::Duration;

/// Object store of the site: options, transients, the post/category
/// directory with its per-post meta, and job run history.
pub trait SiteStore: Send + Sync {
    // Options
    fn get_option(&self, name: &str) -> Result<Option<String>>;
    fn set_option(&self, name: &str, value: &str) -> Result<()>;
    fn delete_option(&self, name: &str) -> Result<()>;
    /// Writes `new_value` only if the stored value is still `expected`
    /// (`None` meaning "no such option"). Returns false when another writer
    /// got there first and nothing was written.
    fn compare_and_swap_option(
        &self,
        name: &str,
        expected: Option<&str>,
        new_value: &str,
    ) -> Result<bool>;

    // Transients
    fn set_transient(&self, name: &str, value: &str, ttl: Duration) -> Result<()>;
    fn get_transient(&self, name: &str) -> Result<Option<String>>;
    /// Reads and deletes in one step; expired values read as absent.
    fn take_transient(&self, name: &str) -> Result<Option<String>>;
    fn purge_expired_transients(&self) -> Result<usize>;

    // Post meta
    fn get_post_meta(&self, post_id: i64, key: &str) -> Result<Option<String>>;
    /// Returns false when the post does not exist.
    fn set_post_meta(&self, post_id: i64, key: &str, value: &str) -> Result<bool>;
    fn delete_post_meta(&self, post_id: i64, key: &str) -> Result<()>;
    /// Posts of the given type and status whose `key` meta equals `value`,
    /// newest first.
    fn posts_with_meta(
        &self,
        post_type: &str,
        post_status: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<Post>>;
    fn count_posts_with_meta(
        &self,
        post_type: &str,
        post_status: &str,
        key: &str,
        value: &str,
    ) -> Result<usize>;

    // Posts and categories
    fn insert_post(&self, post: &NewPost) -> Result<i64>;
    fn get_post(&self, id: i64) -> Result<Option<Post>>;
    /// An empty `in_categories` means no category filter.
    fn list_posts(
        &self,
        post_type: &str,
        post_status: &str,
        in_categories: &[i64],
    ) -> Result<Vec<Post>>;
    fn insert_category(&self, slug: &str, name: &str) -> Result<i64>;
    fn get_category(&self, id: i64) -> Result<Option<Category>>;
    fn list_categories(&self) -> Result<Vec<Category>>;
    fn get_post_categories(&self, post_id: i64) -> Result<Vec<Category>>;

    // Job runs
    fn record_job_start(&self, job_id: &str, triggered_by: &str) -> Result<i64>;
    fn record_job_finish(
        &self,
        run_id: i64,
        status: JobRunStatus,
        error_message: Option<String>,
    ) -> Result<()>;
    fn get_job_history(&self, job_id: &str, limit: usize) -> Result<Vec<JobRun>>;
    fn get_last_run(&self, job_id: &str) -> Result<Option<JobRun>>;
    fn mark_stale_jobs_failed(&self) -> Result<usize>;
}
