//! Delivery of notification digests to category subscribers.

mod sender;
mod transport;

pub use sender::{NotificationSender, SiteInfo};
pub use transport::{LogTransport, MailTransport, OutgoingEmail};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("mail transport failed: {0}")]
    Transport(String),
    #[error("notification storage failed: {0}")]
    Storage(String),
}

/// Sends every due notification. Called by the scheduled job and by manual
/// runs alike.
pub trait SendRoutine: Send + Sync {
    fn send_due_notifications(&self) -> Result<(), SendError>;
}
