//! End-to-end tests for the notifier settings page

mod common;

use common::{TestClient, TestServer, ELECTION_TITLE, SITE_URL, SOUP_TITLE};
use reqwest::StatusCode;
use stc_notifier::schedule::{ScheduleStore, NOTIFICATION_JOB};
use stc_notifier::settings::SettingsRepository;

#[tokio::test]
async fn test_settings_view_lists_pending_posts() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let view = client.settings_view_json().await;
    assert_eq!(view["pending_count"], 2);
    assert_eq!(view["developer_mode_warning"], false);
    assert!(view["notice"].is_null());
    assert!(view["next_run"].is_string());

    let pending = view["pending"].as_array().unwrap();
    let titles: Vec<&str> = pending
        .iter()
        .map(|item| item["title"].as_str().unwrap())
        .collect();
    assert!(titles.contains(&SOUP_TITLE));
    assert!(titles.contains(&ELECTION_TITLE));

    let soup = pending
        .iter()
        .find(|item| item["id"] == server.fixture.soup_post)
        .unwrap();
    assert_eq!(
        soup["view_link"],
        format!("{}/?p={}", SITE_URL, server.fixture.soup_post)
    );
    assert_eq!(
        soup["edit_link"],
        format!(
            "{}/wp-admin/post.php?post={}&action=edit",
            SITE_URL, server.fixture.soup_post
        )
    );

    assert!(!view["tokens"]["force_run"].as_str().unwrap().is_empty());
    assert!(!view["tokens"]["queue_remove"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_valid_submission_is_stored_and_reschedules() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let response = client
        .post_settings(&[
            ("cron_recurrence", "daily"),
            ("email_from", "news@kitchen.example"),
            ("email_content_length", "120"),
            ("title", "Fresh from the kitchen"),
            ("developer_mode", "1"),
        ])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let accepted: serde_json::Value = response.json().await.unwrap();
    assert_eq!(accepted["cron_recurrence"], "daily");
    assert_eq!(accepted["email_content_length"], 120);

    let stored = SettingsRepository::new(server.site_store.clone())
        .load()
        .unwrap();
    assert_eq!(stored.email_from, "news@kitchen.example");
    assert!(stored.developer_mode);

    let table = ScheduleStore::new(server.site_store.clone()).table().unwrap();
    assert_eq!(table.count_entries(NOTIFICATION_JOB), 1);
    let (_, descriptor) = table.entry(NOTIFICATION_JOB).unwrap();
    assert_eq!(descriptor.interval_seconds, Some(86_400));

    let view = client.settings_view_json().await;
    assert_eq!(view["developer_mode_warning"], true);
}

#[tokio::test]
async fn test_invalid_email_is_rejected_and_nothing_is_stored() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;
    let schedule = ScheduleStore::new(server.site_store.clone());
    let due_before = schedule.get_due_time(NOTIFICATION_JOB).unwrap();

    let response = client
        .post_settings(&[
            ("cron_recurrence", "daily"),
            ("email_from", "not an address"),
        ])
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: serde_json::Value = response.json().await.unwrap();
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["field"], "email_from");
    assert_eq!(errors[0]["message"], "You have entered an invalid email.");

    let stored = SettingsRepository::new(server.site_store.clone())
        .load()
        .unwrap();
    assert_eq!(stored.email_from, "");
    assert_eq!(schedule.get_due_time(NOTIFICATION_JOB).unwrap(), due_before);
}

#[tokio::test]
async fn test_categories_are_listed_for_admins() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let response = client.get_categories().await;
    assert_eq!(response.status(), StatusCode::OK);
    let categories: Vec<serde_json::Value> = response.json().await.unwrap();
    let ids: Vec<i64> = categories
        .iter()
        .map(|c| c["id"].as_i64().unwrap())
        .collect();
    assert!(ids.contains(&server.fixture.news_category));
    assert!(ids.contains(&server.fixture.recipes_category));
}
