use super::*;
use anyhow::bail;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasFailure {
    /// Every compare-and-swap errors out.
    Error,
    /// Every compare-and-swap loses to a (pretend) concurrent writer.
    AlwaysStale,
}

/// Delegates to a real store, except that option compare-and-swap never
/// succeeds.
pub struct FailingCasSiteStore {
    inner: Arc<SqliteSiteStore>,
    failure: CasFailure,
}

impl FailingCasSiteStore {
    pub fn new(inner: Arc<SqliteSiteStore>, failure: CasFailure) -> Self {
        Self { inner, failure }
    }
}

impl SiteStore for FailingCasSiteStore {
    fn get_option(&self, name: &str) -> Result<Option<String>> {
        self.inner.get_option(name)
    }
    fn set_option(&self, name: &str, value: &str) -> Result<()> {
        self.inner.set_option(name, value)
    }
    fn delete_option(&self, name: &str) -> Result<()> {
        self.inner.delete_option(name)
    }
    fn compare_and_swap_option(
        &self,
        _name: &str,
        _expected: Option<&str>,
        _new_value: &str,
    ) -> Result<bool> {
        match self.failure {
            CasFailure::Error => bail!("database is locked"),
            CasFailure::AlwaysStale => Ok(false),
        }
    }

    fn set_transient(&self, name: &str, value: &str, ttl: Duration) -> Result<()> {
        self.inner.set_transient(name, value, ttl)
    }
    fn get_transient(&self, name: &str) -> Result<Option<String>> {
        self.inner.get_transient(name)
    }
    fn take_transient(&self, name: &str) -> Result<Option<String>> {
        self.inner.take_transient(name)
    }
    fn purge_expired_transients(&self) -> Result<usize> {
        self.inner.purge_expired_transients()
    }

    fn get_post_meta(&self, post_id: i64, key: &str) -> Result<Option<String>> {
        self.inner.get_post_meta(post_id, key)
    }
    fn set_post_meta(&self, post_id: i64, key: &str, value: &str) -> Result<bool> {
        self.inner.set_post_meta(post_id, key, value)
    }
    fn delete_post_meta(&self, post_id: i64, key: &str) -> Result<()> {
        self.inner.delete_post_meta(post_id, key)
    }
    fn posts_with_meta(
        &self,
        post_type: &str,
        post_status: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<Post>> {
        self.inner.posts_with_meta(post_type, post_status, key, value)
    }
    fn count_posts_with_meta(
        &self,
        post_type: &str,
        post_status: &str,
        key: &str,
        value: &str,
    ) -> Result<usize> {
        self.inner
            .count_posts_with_meta(post_type, post_status, key, value)
    }

    fn insert_post(&self, post: &NewPost) -> Result<i64> {
        self.inner.insert_post(post)
    }
    fn get_post(&self, id: i64) -> Result<Option<Post>> {
        self.inner.get_post(id)
    }
    fn list_posts(
        &self,
        post_type: &str,
        post_status: &str,
        in_categories: &[i64],
    ) -> Result<Vec<Post>> {
        self.inner.list_posts(post_type, post_status, in_categories)
    }
    fn insert_category(&self, slug: &str, name: &str) -> Result<i64> {
        self.inner.insert_category(slug, name)
    }
    fn get_category(&self, id: i64) -> Result<Option<Category>> {
        self.inner.get_category(id)
    }
    fn list_categories(&self) -> Result<Vec<Category>> {
        self.inner.list_categories()
    }
    fn get_post_categories(&self, post_id: i64) -> Result<Vec<Category>> {
        self.inner.get_post_categories(post_id)
    }

    fn record_job_start(&self, job_id: &str, triggered_by: &str) -> Result<i64> {
        self.inner.record_job_start(job_id, triggered_by)
    }
    fn record_job_finish(
        &self,
        run_id: i64,
        status: JobRunStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        self.inner.record_job_finish(run_id, status, error_message)
    }
    fn get_job_history(&self, job_id: &str, limit: usize) -> Result<Vec<JobRun>> {
        self.inner.get_job_history(job_id, limit)
    }
    fn get_last_run(&self, job_id: &str) -> Result<Option<JobRun>> {
        self.inner.get_last_run(job_id)
    }
    fn mark_stale_jobs_failed(&self) -> Result<usize> {
        self.inner.mark_stale_jobs_failed()
    }
}
