//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for the auth and notifier admin endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

const ADMIN_BASE: &str = "/v1/admin/notifier";

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client
    ///
    /// Redirects are not followed so tests can inspect `Location`.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    async fn logged_in_as(base_url: String, handle: &str, password: &str) -> Self {
        let client = Self::new(base_url);

        let response = client.login(handle, password).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Authentication of {} failed: {:?}",
            handle,
            response.text().await
        );

        client
    }

    /// Creates a client logged in as the administrator
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated_admin(base_url: String) -> Self {
        Self::logged_in_as(base_url, ADMIN_USER, ADMIN_PASS).await
    }

    /// Creates a client logged in as an editor, who may not manage options
    pub async fn authenticated_editor(base_url: String) -> Self {
        Self::logged_in_as(base_url, EDITOR_USER, EDITOR_PASS).await
    }

    fn admin_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, ADMIN_BASE, path)
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /v1/auth/login
    pub async fn login(&self, handle: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/v1/auth/login", self.base_url))
            .json(&json!({
                "user_handle": handle,
                "password": password,
            }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.client
            .get(format!("{}/v1/auth/logout", self.base_url))
            .send()
            .await
            .expect("Logout request failed")
    }

    /// GET /
    pub async fn get_home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    // ========================================================================
    // Notifier Admin Endpoints
    // ========================================================================

    /// GET /v1/admin/notifier
    pub async fn get_settings_view(&self) -> Response {
        self.client
            .get(self.admin_url(""))
            .send()
            .await
            .expect("Settings view request failed")
    }

    /// Loads the settings view and returns its JSON body
    ///
    /// # Panics
    ///
    /// Panics unless the view loads with 200.
    pub async fn settings_view_json(&self) -> Value {
        let response = self.get_settings_view().await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Settings view is not JSON")
    }

    /// Action tokens handed out by the settings view: (force_run, queue_remove)
    pub async fn action_tokens(&self) -> (String, String) {
        let view = self.settings_view_json().await;
        let token = |name: &str| {
            view["tokens"][name]
                .as_str()
                .expect("Missing action token")
                .to_string()
        };
        (token("force_run"), token("queue_remove"))
    }

    /// POST /v1/admin/notifier/settings
    pub async fn post_settings(&self, fields: &[(&str, &str)]) -> Response {
        self.client
            .post(self.admin_url("/settings"))
            .form(fields)
            .send()
            .await
            .expect("Settings submission failed")
    }

    /// POST /v1/admin/notifier/run
    pub async fn post_run(&self, nonce: &str) -> Response {
        self.client
            .post(self.admin_url("/run"))
            .form(&[("nonce", nonce)])
            .send()
            .await
            .expect("Run request failed")
    }

    /// GET /v1/admin/notifier/run-redirect
    pub async fn get_run_redirect(&self, nonce: &str) -> Response {
        self.client
            .get(self.admin_url("/run-redirect"))
            .query(&[("nonce", nonce)])
            .send()
            .await
            .expect("Run redirect request failed")
    }

    /// POST /v1/admin/notifier/queue/remove
    pub async fn remove_from_queue(&self, post_id: i64, nonce: &str) -> Response {
        self.client
            .post(self.admin_url("/queue/remove"))
            .form(&[("post_id", post_id.to_string().as_str()), ("nonce", nonce)])
            .send()
            .await
            .expect("Queue removal request failed")
    }

    /// GET /v1/admin/notifier/export
    pub async fn export(&self, category_ids: &[i64]) -> Response {
        let mut request = self.client.get(self.admin_url("/export"));
        if !category_ids.is_empty() {
            let ids = category_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            request = request.query(&[("categories", ids)]);
        }
        request.send().await.expect("Export request failed")
    }

    /// GET /v1/admin/notifier/categories
    pub async fn get_categories(&self) -> Response {
        self.client
            .get(self.admin_url("/categories"))
            .send()
            .await
            .expect("Categories request failed")
    }
}
