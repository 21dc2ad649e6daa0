//! Category subscription notifier.
//!
//! This library exposes the internal modules for the binary and for testing.

pub mod background_jobs;
pub mod config;
pub mod export;
pub mod notifier;
pub mod queue;
pub mod schedule;
pub mod send;
pub mod server;
pub mod settings;
pub mod site_store;
pub mod sqlite_persistence;
pub mod trigger;
pub mod user;

// Re-export commonly used types for convenience
pub use notifier::{Notifier, NotifierOptions};
pub use server::{run_server, RequestsLoggingLevel};
pub use site_store::{SiteStore, SqliteSiteStore};
pub use user::{UserManager, UserRole, UserStore};
