use super::models::{Category, JobRun, JobRunStatus, NewPost, Post};
use super::schema::SITE_VERSIONED_SCHEMAS;
use super::SiteStore;
use crate::sqlite_persistence::open_versioned_db;
use crate::user::{
    AuthToken, AuthTokenValue, PasswordCredentials, PasswordHasherKind, Permission, UserStore,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

const POST_COLUMNS: &str = "p.id, p.post_type, p.post_status, p.title, p.content, p.created_at";

pub struct SqliteSiteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSiteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_db(db_path, SITE_VERSIONED_SCHEMAS, "site")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339()
    }

    fn parse_datetime(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn format_system_time(time: SystemTime) -> String {
        Self::format_datetime(&DateTime::<Utc>::from(time))
    }

    fn category_filter(in_categories: &[i64]) -> String {
        if in_categories.is_empty() {
            return String::new();
        }
        let ids = in_categories
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            " AND p.id IN (SELECT post_id FROM post_categories WHERE category_id IN ({}))",
            ids
        )
    }

    fn row_to_post(row: &rusqlite::Row) -> rusqlite::Result<Post> {
        let created_at: String = row.get("created_at")?;
        Ok(Post {
            id: row.get("id")?,
            post_type: row.get("post_type")?,
            post_status: row.get("post_status")?,
            title: row.get("title")?,
            content: row.get("content")?,
            created_at: Self::parse_datetime(&created_at),
        })
    }

    fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
        Ok(Category {
            id: row.get("id")?,
            slug: row.get("slug")?,
            name: row.get("name")?,
        })
    }

    fn row_to_job_run(row: &rusqlite::Row) -> rusqlite::Result<JobRun> {
        let status: String = row.get("status")?;
        let started_at: String = row.get("started_at")?;
        let finished_at: Option<String> = row.get("finished_at")?;

        Ok(JobRun {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            started_at: Self::parse_datetime(&started_at),
            finished_at: finished_at.as_deref().map(Self::parse_datetime),
            status: JobRunStatus::parse(&status).unwrap_or(JobRunStatus::Failed),
            error_message: row.get("error_message")?,
            triggered_by: row.get("triggered_by")?,
        })
    }
}

impl SiteStore for SqliteSiteStore {
    // =========================================================================
    // Options
    // =========================================================================

    fn get_option(&self, name: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM options WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_option(&self, name: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO options (name, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![name, value],
        )
        .with_context(|| format!("Failed to write option {}", name))?;
        Ok(())
    }

    fn delete_option(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM options WHERE name = ?1", params![name])?;
        Ok(())
    }

    fn compare_and_swap_option(
        &self,
        name: &str,
        expected: Option<&str>,
        new_value: &str,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = match expected {
            Some(expected) => conn.execute(
                "UPDATE options SET value = ?1, updated_at = datetime('now')
                 WHERE name = ?2 AND value = ?3",
                params![new_value, name, expected],
            )?,
            None => conn.execute(
                "INSERT OR IGNORE INTO options (name, value) VALUES (?1, ?2)",
                params![name, new_value],
            )?,
        };
        if changed == 0 {
            debug!("Option {} changed concurrently, swap rejected", name);
        }
        Ok(changed == 1)
    }

    // =========================================================================
    // Transients
    // =========================================================================

    fn set_transient(&self, name: &str, value: &str, ttl: Duration) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let expires_at = Utc::now().timestamp() + ttl.as_secs() as i64;
        conn.execute(
            "INSERT INTO transients (name, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            params![name, value, expires_at],
        )?;
        Ok(())
    }

    fn get_transient(&self, name: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM transients WHERE name = ?1 AND expires_at > ?2",
                params![name, Utc::now().timestamp()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn take_transient(&self, name: &str) -> Result<Option<String>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let value: Option<String> = tx
            .query_row(
                "SELECT value FROM transients WHERE name = ?1 AND expires_at > ?2",
                params![name, Utc::now().timestamp()],
                |row| row.get(0),
            )
            .optional()?;
        tx.execute("DELETE FROM transients WHERE name = ?1", params![name])?;
        tx.commit()?;
        Ok(value)
    }

    fn purge_expired_transients(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM transients WHERE expires_at <= ?1",
            params![Utc::now().timestamp()],
        )?;
        Ok(deleted)
    }

    // =========================================================================
    // Post meta
    // =========================================================================

    fn get_post_meta(&self, post_id: i64, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT meta_value FROM post_meta WHERE post_id = ?1 AND meta_key = ?2",
                params![post_id, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_post_meta(&self, post_id: i64, key: &str, value: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
            params![post_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(false);
        }
        conn.execute(
            "INSERT INTO post_meta (post_id, meta_key, meta_value) VALUES (?1, ?2, ?3)
             ON CONFLICT(post_id, meta_key) DO UPDATE SET meta_value = excluded.meta_value",
            params![post_id, key, value],
        )?;
        Ok(true)
    }

    fn delete_post_meta(&self, post_id: i64, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM post_meta WHERE post_id = ?1 AND meta_key = ?2",
            params![post_id, key],
        )?;
        Ok(())
    }

    fn posts_with_meta(
        &self,
        post_type: &str,
        post_status: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<Post>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM posts p JOIN post_meta m ON m.post_id = p.id
             WHERE p.post_type = ?1 AND p.post_status = ?2 AND m.meta_key = ?3 AND m.meta_value = ?4
             ORDER BY p.created_at DESC, p.id DESC",
            POST_COLUMNS
        ))?;
        let posts = stmt
            .query_map(params![post_type, post_status, key, value], Self::row_to_post)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }

    fn count_posts_with_meta(
        &self,
        post_type: &str,
        post_status: &str,
        key: &str,
        value: &str,
    ) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts p JOIN post_meta m ON m.post_id = p.id
             WHERE p.post_type = ?1 AND p.post_status = ?2 AND m.meta_key = ?3 AND m.meta_value = ?4",
            params![post_type, post_status, key, value],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // =========================================================================
    // Posts and categories
    // =========================================================================

    fn insert_post(&self, post: &NewPost) -> Result<i64> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO posts (post_type, post_status, title, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                post.post_type,
                post.post_status,
                post.title,
                post.content,
                Self::format_datetime(&post.created_at)
            ],
        )?;
        let post_id = tx.last_insert_rowid();
        for category_id in &post.category_ids {
            tx.execute(
                "INSERT OR IGNORE INTO post_categories (post_id, category_id) VALUES (?1, ?2)",
                params![post_id, category_id],
            )?;
        }
        tx.commit()?;
        Ok(post_id)
    }

    fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let conn = self.conn.lock().unwrap();
        let post = conn
            .query_row(
                &format!("SELECT {} FROM posts p WHERE p.id = ?1", POST_COLUMNS),
                params![id],
                Self::row_to_post,
            )
            .optional()?;
        Ok(post)
    }

    fn list_posts(
        &self,
        post_type: &str,
        post_status: &str,
        in_categories: &[i64],
    ) -> Result<Vec<Post>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM posts p WHERE p.post_type = ?1 AND p.post_status = ?2{}
             ORDER BY p.created_at DESC, p.id DESC",
            POST_COLUMNS,
            Self::category_filter(in_categories)
        ))?;
        let posts = stmt
            .query_map(params![post_type, post_status], Self::row_to_post)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }

    fn insert_category(&self, slug: &str, name: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO categories (slug, name) VALUES (?1, ?2)",
            params![slug, name],
        )
        .with_context(|| format!("Failed to insert category {}", slug))?;
        Ok(conn.last_insert_rowid())
    }

    fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let conn = self.conn.lock().unwrap();
        let category = conn
            .query_row(
                "SELECT id, slug, name FROM categories WHERE id = ?1",
                params![id],
                Self::row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, slug, name FROM categories ORDER BY name")?;
        let categories = stmt
            .query_map([], Self::row_to_category)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }

    fn get_post_categories(&self, post_id: i64) -> Result<Vec<Category>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.slug, c.name FROM categories c
             JOIN post_categories pc ON pc.category_id = c.id
             WHERE pc.post_id = ?1 ORDER BY c.name",
        )?;
        let categories = stmt
            .query_map(params![post_id], Self::row_to_category)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }

    // =========================================================================
    // Job runs
    // =========================================================================

    fn record_job_start(&self, job_id: &str, triggered_by: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO job_runs (job_id, started_at, status, triggered_by)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                job_id,
                Self::format_datetime(&Utc::now()),
                JobRunStatus::Running.as_str(),
                triggered_by
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn record_job_finish(
        &self,
        run_id: i64,
        status: JobRunStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE job_runs SET finished_at = ?1, status = ?2, error_message = ?3 WHERE id = ?4",
            params![
                Self::format_datetime(&Utc::now()),
                status.as_str(),
                error_message,
                run_id
            ],
        )?;
        Ok(())
    }

    fn get_job_history(&self, job_id: &str, limit: usize) -> Result<Vec<JobRun>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, job_id, started_at, finished_at, status, error_message, triggered_by
             FROM job_runs WHERE job_id = ?1 ORDER BY started_at DESC, id DESC LIMIT ?2",
        )?;
        let runs = stmt
            .query_map(params![job_id, limit as i64], Self::row_to_job_run)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }

    fn get_last_run(&self, job_id: &str) -> Result<Option<JobRun>> {
        let conn = self.conn.lock().unwrap();
        let run = conn
            .query_row(
                "SELECT id, job_id, started_at, finished_at, status, error_message, triggered_by
                 FROM job_runs WHERE job_id = ?1 ORDER BY started_at DESC, id DESC LIMIT 1",
                params![job_id],
                Self::row_to_job_run,
            )
            .optional()?;
        Ok(run)
    }

    fn mark_stale_jobs_failed(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE job_runs SET status = ?1, finished_at = ?2, error_message = ?3
             WHERE status = ?4",
            params![
                JobRunStatus::Failed.as_str(),
                Self::format_datetime(&Utc::now()),
                "Interrupted by server shutdown",
                JobRunStatus::Running.as_str()
            ],
        )?;
        if updated > 0 {
            info!("Marked {} interrupted job runs as failed", updated);
        }
        Ok(updated)
    }
}

impl UserStore for SqliteSiteStore {
    fn create_user(&self, user_handle: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (handle, created_at) VALUES (?1, ?2)",
            params![user_handle, Self::format_datetime(&Utc::now())],
        )
        .with_context(|| format!("Failed to create user {}", user_handle))?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>> {
        let conn = self.conn.lock().unwrap();
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM users WHERE handle = ?1",
                params![user_handle],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(|id| id as usize))
    }

    fn get_user_handle(&self, user_id: usize) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let handle = conn
            .query_row(
                "SELECT handle FROM users WHERE id = ?1",
                params![user_id as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(handle)
    }

    fn get_password_credentials(&self, user_id: usize) -> Result<Option<PasswordCredentials>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, String, String, String)> = conn
            .query_row(
                "SELECT hasher, salt, hash, created_at FROM user_passwords WHERE user_id = ?1",
                params![user_id as i64],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        let Some((hasher, salt, hash, created_at)) = row else {
            return Ok(None);
        };
        Ok(Some(PasswordCredentials {
            user_id,
            salt,
            hash,
            hasher: hasher.parse::<PasswordHasherKind>()?,
            created: Self::parse_datetime(&created_at).into(),
        }))
    }

    fn set_password_credentials(&self, credentials: &PasswordCredentials) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_passwords (user_id, hasher, salt, hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET hasher = excluded.hasher, salt = excluded.salt,
                 hash = excluded.hash, created_at = excluded.created_at",
            params![
                credentials.user_id as i64,
                credentials.hasher.to_string(),
                credentials.salt,
                credentials.hash,
                Self::format_system_time(credentials.created)
            ],
        )?;
        Ok(())
    }

    fn add_auth_token(&self, token: &AuthToken) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_tokens (value, user_id, created_at, last_used) VALUES (?1, ?2, ?3, ?4)",
            params![
                token.value.0,
                token.user_id as i64,
                Self::format_system_time(token.created),
                token.last_used.map(Self::format_system_time)
            ],
        )?;
        Ok(())
    }

    fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = self.conn.lock().unwrap();
        let token = conn
            .query_row(
                "SELECT value, user_id, created_at, last_used FROM auth_tokens WHERE value = ?1",
                params![value.0],
                |row| {
                    let created_at: String = row.get(2)?;
                    let last_used: Option<String> = row.get(3)?;
                    Ok(AuthToken {
                        value: AuthTokenValue(row.get(0)?),
                        user_id: row.get::<_, i64>(1)? as usize,
                        created: Self::parse_datetime(&created_at).into(),
                        last_used: last_used
                            .as_deref()
                            .map(|s| Self::parse_datetime(s).into()),
                    })
                },
            )
            .optional()?;
        Ok(token)
    }

    fn touch_auth_token(&self, value: &AuthTokenValue) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE auth_tokens SET last_used = ?1 WHERE value = ?2",
            params![Self::format_datetime(&Utc::now()), value.0],
        )?;
        Ok(())
    }

    fn delete_auth_token(&self, value: &AuthTokenValue) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM auth_tokens WHERE value = ?1", params![value.0])?;
        Ok(deleted > 0)
    }

    fn grant_permission(&self, user_id: usize, permission: Permission) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO user_permissions (user_id, permission) VALUES (?1, ?2)",
            params![user_id as i64, permission.as_int()],
        )?;
        Ok(())
    }

    fn get_user_permissions(&self, user_id: usize) -> Result<Vec<Permission>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT permission FROM user_permissions WHERE user_id = ?1 ORDER BY permission",
        )?;
        let permissions = stmt
            .query_map(params![user_id as i64], |row| row.get::<_, i32>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .filter_map(Permission::from_int)
            .collect();
        Ok(permissions)
    }
}
