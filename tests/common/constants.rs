//! Shared constants for end-to-end tests
//!
//! When test data changes (user credentials, site identity, etc.),
//! update only this file.

// ============================================================================
// Test User Credentials
// ============================================================================

/// Administrator handle, may manage the notifier
pub const ADMIN_USER: &str = "admin";

/// Administrator password
pub const ADMIN_PASS: &str = "adminpass123";

/// Editor handle, logged in but without ManageOptions
pub const EDITOR_USER: &str = "editor";

/// Editor password
pub const EDITOR_PASS: &str = "editorpass123";

// ============================================================================
// Test Site Content
// ============================================================================

pub const SITE_NAME: &str = "Kitchen Notes";

pub const SITE_URL: &str = "https://kitchen.example";

pub const NEWS_CATEGORY: &str = "News";

pub const RECIPES_CATEGORY: &str = "Recipes";

/// Queued post in Recipes
pub const SOUP_TITLE: &str = "Tomato soup";

/// Queued post in News
pub const ELECTION_TITLE: &str = "Election results";

/// Subscriber of Recipes only
pub const COOK_EMAIL: &str = "cook@example.com";

/// Subscriber of News and Recipes
pub const READER_EMAIL: &str = "reader@example.com";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
