//! End-to-end tests for manual runs of the notification job

mod common;

use common::{TestClient, TestServer, COOK_EMAIL, READER_EMAIL};
use reqwest::StatusCode;
use stc_notifier::schedule::{ScheduleStore, NOTIFICATION_JOB};
use stc_notifier::site_store::SiteStore;

#[tokio::test]
async fn test_run_now_sends_pending_digests() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;
    let (force_run, _) = client.action_tokens().await;

    let response = client.post_run(&force_run).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.text().await.unwrap(),
        "Scheduled event successfully executed"
    );
    assert_eq!(server.send_calls(), 1);

    let mut recipients: Vec<String> = server
        .transport
        .delivered()
        .into_iter()
        .map(|email| email.to)
        .collect();
    recipients.sort();
    assert_eq!(recipients, vec![COOK_EMAIL, READER_EMAIL]);

    let view = client.settings_view_json().await;
    assert_eq!(view["pending_count"], 0);
    // Async runs report inline and leave no notice behind
    assert!(view["notice"].is_null());

    let history = server
        .site_store
        .get_job_history("stc_schedule_email", 10)
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].triggered_by, "manual");
}

#[tokio::test]
async fn test_run_now_reports_failure_inline() {
    let server = TestServer::spawn().await;
    server.set_sending_fails(true);
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;
    let (force_run, _) = client.action_tokens().await;

    let response = client.post_run(&force_run).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "Scheduled event failed");
    assert!(server.transport.delivered().is_empty());
    assert_eq!(client.settings_view_json().await["pending_count"], 2);
}

#[tokio::test]
async fn test_unauthenticated_run_never_invokes_sender() {
    let server = TestServer::spawn().await;
    let admin = TestClient::authenticated_admin(server.base_url.clone()).await;
    let (force_run, _) = admin.action_tokens().await;

    let anonymous = TestClient::new(server.base_url.clone());
    let response = anonymous.post_run(&force_run).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = anonymous.get_run_redirect(&force_run).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert_eq!(server.send_calls(), 0);
}

#[tokio::test]
async fn test_tokens_are_bound_to_their_user() {
    let server = TestServer::spawn().await;
    let admin = TestClient::authenticated_admin(server.base_url.clone()).await;
    let (force_run, _) = admin.action_tokens().await;

    let editor = TestClient::authenticated_editor(server.base_url.clone()).await;
    let response = editor.post_run(&force_run).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(server.send_calls(), 0);
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;
    let (_, queue_remove) = client.action_tokens().await;

    let response = client.post_run("forged-token").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        response.text().await.unwrap(),
        "The link you followed has expired."
    );

    // A token issued for another action does not authorize a run
    let response = client.post_run(&queue_remove).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert_eq!(server.send_calls(), 0);
}

#[tokio::test]
async fn test_redirect_run_leaves_a_single_read_notice() {
    let server = TestServer::spawn().await;
    server.set_sending_fails(true);
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;
    let (force_run, _) = client.action_tokens().await;

    let response = client.get_run_redirect(&force_run).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()["location"].to_str().unwrap(),
        "/v1/admin/notifier"
    );
    assert_eq!(server.send_calls(), 1);

    let view = client.settings_view_json().await;
    assert_eq!(view["notice"]["value"], 0);
    assert_eq!(view["notice"]["message"], "Scheduled event failed");

    let view = client.settings_view_json().await;
    assert!(view["notice"].is_null());
}

#[tokio::test]
async fn test_successful_redirect_run_notice() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;
    let (force_run, _) = client.action_tokens().await;

    let response = client.get_run_redirect(&force_run).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let view = client.settings_view_json().await;
    assert_eq!(view["notice"]["value"], 1);
    assert_eq!(
        view["notice"]["message"],
        "Scheduled event successfully executed"
    );
    assert_eq!(view["pending_count"], 0);
}

#[tokio::test]
async fn test_manual_runs_keep_the_next_scheduled_run() {
    let server = TestServer::spawn().await;
    let schedule = ScheduleStore::new(server.site_store.clone());
    let due_before = schedule.get_due_time(NOTIFICATION_JOB).unwrap();
    assert!(due_before.is_some());

    let client = TestClient::authenticated_admin(server.base_url.clone()).await;
    let (force_run, _) = client.action_tokens().await;

    let response = client.post_run(&force_run).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(schedule.get_due_time(NOTIFICATION_JOB).unwrap(), due_before);

    let response = client.get_run_redirect(&force_run).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(schedule.get_due_time(NOTIFICATION_JOB).unwrap(), due_before);

    assert_eq!(server.send_calls(), 2);
    let table = schedule.table().unwrap();
    assert_eq!(table.count_entries(NOTIFICATION_JOB), 1);
}
