//! End-to-end tests for authentication endpoints
//!
//! Tests login, logout and which callers reach the notifier admin pages.

mod common;

use common::{TestClient, TestServer, ADMIN_PASS, ADMIN_USER, EDITOR_PASS, EDITOR_USER};
use reqwest::StatusCode;

#[tokio::test]
async fn test_login_with_valid_credentials() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.login(ADMIN_USER, ADMIN_PASS).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().contains_key("set-cookie"));

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(!body["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_with_invalid_password() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.login(ADMIN_USER, "wrong_password").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_login_with_nonexistent_user() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.login("nonexistent_user", "password").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_home_reports_session_state() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let stats: serde_json::Value = client.get_home().await.json().await.unwrap();
    assert_eq!(stats["logged_in"], false);

    client.login(EDITOR_USER, EDITOR_PASS).await;
    let stats: serde_json::Value = client.get_home().await.json().await.unwrap();
    assert_eq!(stats["logged_in"], true);
}

#[tokio::test]
async fn test_logout_clears_session() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let response = client.get_settings_view().await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client.logout().await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client.get_settings_view().await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_pages_require_authentication() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.get_settings_view().await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        response.text().await.unwrap(),
        "Sorry, you are not allowed to access this page."
    );

    assert_eq!(client.get_categories().await.status(), StatusCode::FORBIDDEN);
    assert_eq!(client.export(&[]).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_editor_cannot_manage_notifier() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_editor(server.base_url.clone()).await;

    assert_eq!(
        client.get_settings_view().await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        client
            .post_settings(&[("email_from", "news@kitchen.example")])
            .await
            .status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(client.export(&[]).await.status(), StatusCode::FORBIDDEN);
}
