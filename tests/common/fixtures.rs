//! Test fixture creation for the site database

use super::constants::*;
use anyhow::Result;
use stc_notifier::queue::QueueStore;
use stc_notifier::site_store::{NewPost, POST_TYPE_POST, POST_TYPE_SUBSCRIBER};
use stc_notifier::{SiteStore, SqliteSiteStore, UserManager, UserRole};
use std::sync::Arc;
use tempfile::TempDir;

/// Ids of the content seeded into every test site.
#[derive(Debug, Clone, Copy)]
pub struct SiteFixture {
    pub news_category: i64,
    pub recipes_category: i64,
    pub soup_post: i64,
    pub election_post: i64,
}

/// Creates a temporary site database with two users, two categories,
/// two queued posts and two subscribers.
/// Returns (temp_dir, site_store, fixture)
pub fn create_test_site() -> Result<(TempDir, Arc<SqliteSiteStore>, SiteFixture)> {
    let dir = TempDir::new()?;
    let site_store = Arc::new(SqliteSiteStore::new(dir.path().join("site.db"))?);

    let user_manager = UserManager::new(site_store.clone());
    user_manager.ensure_user(ADMIN_USER, ADMIN_PASS, UserRole::Administrator)?;
    user_manager.ensure_user(EDITOR_USER, EDITOR_PASS, UserRole::Editor)?;

    let news_category = site_store.insert_category("news", NEWS_CATEGORY)?;
    let recipes_category = site_store.insert_category("recipes", RECIPES_CATEGORY)?;

    let queue = QueueStore::new(site_store.clone());
    let soup_post = site_store.insert_post(
        &NewPost::published(POST_TYPE_POST, SOUP_TITLE, "<p>Slow roasted tomatoes</p>")
            .in_categories(&[recipes_category]),
    )?;
    queue.enqueue(soup_post)?;
    let election_post = site_store.insert_post(
        &NewPost::published(POST_TYPE_POST, ELECTION_TITLE, "Turnout was high")
            .in_categories(&[news_category]),
    )?;
    queue.enqueue(election_post)?;

    site_store.insert_post(
        &NewPost::published(POST_TYPE_SUBSCRIBER, COOK_EMAIL, "")
            .in_categories(&[recipes_category]),
    )?;
    site_store.insert_post(
        &NewPost::published(POST_TYPE_SUBSCRIBER, READER_EMAIL, "")
            .in_categories(&[news_category, recipes_category]),
    )?;

    Ok((
        dir,
        site_store,
        SiteFixture {
            news_category,
            recipes_category,
            soup_post,
            election_post,
        },
    ))
}
