//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own site database.

use super::constants::*;
use super::fixtures::{create_test_site, SiteFixture};
use stc_notifier::queue::DisplayFormat;
use stc_notifier::send::{
    LogTransport, NotificationSender, SendError, SendRoutine, SiteInfo,
};
use stc_notifier::server::{server::make_app, RequestsLoggingLevel, ServerConfig};
use stc_notifier::{Notifier, NotifierOptions, SqliteSiteStore, UserManager};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Wraps the real sender, counting invocations and optionally failing
/// before anything is sent.
pub struct CountingRoutine {
    inner: NotificationSender,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl SendRoutine for CountingRoutine {
    fn send_due_notifications(&self) -> Result<(), SendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SendError::Transport("mail server unreachable".to_string()));
        }
        self.inner.send_due_notifications()
    }
}

/// Test server instance with an isolated site database
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Site store for direct database access in tests
    pub site_store: Arc<SqliteSiteStore>,

    /// Ids of the seeded content
    pub fixture: SiteFixture,

    /// Captures every digest the sender delivers
    pub transport: Arc<LogTransport>,

    routine: Arc<CountingRoutine>,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if fixture creation or port binding fails, or if the server
    /// doesn't become ready within timeout.
    pub async fn spawn() -> Self {
        let (temp_dir, site_store, fixture) =
            create_test_site().expect("Failed to create test site");

        let site = SiteInfo {
            name: SITE_NAME.to_string(),
            url: SITE_URL.to_string(),
            admin_email: "admin@kitchen.example".to_string(),
        };
        let transport = Arc::new(LogTransport::new());
        let routine = Arc::new(CountingRoutine {
            inner: NotificationSender::new(site_store.clone(), transport.clone(), site.clone()),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        });

        let notifier = Notifier::new(
            site_store.clone(),
            routine.clone(),
            NotifierOptions {
                site,
                display_format: DisplayFormat::default(),
                notice_ttl: Duration::from_secs(3600),
                nonce_secret: Some("e2e-nonce-secret".to_string()),
            },
        )
        .expect("Failed to create notifier");
        notifier.install().expect("Failed to install notifier");

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            ..Default::default()
        };

        let app = make_app(
            config,
            UserManager::new(site_store.clone()),
            Arc::new(notifier),
            None, // scheduler_handle
        );

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            site_store,
            fixture,
            transport,
            routine,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// How many times the send routine has been invoked
    pub fn send_calls(&self) -> usize {
        self.routine.calls.load(Ordering::SeqCst)
    }

    /// Makes subsequent sends fail with a transport error
    pub fn set_sending_fails(&self, failing: bool) {
        self.routine.failing.store(failing, Ordering::SeqCst);
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
