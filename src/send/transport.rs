use super::SendError;
use serde::Serialize;
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait MailTransport: Send + Sync {
    fn send(&self, email: &OutgoingEmail) -> Result<(), SendError>;
}

/// Writes each message to the log instead of delivering it, keeping a copy of
/// everything it was handed.
#[derive(Default)]
pub struct LogTransport {
    delivered: Mutex<Vec<OutgoingEmail>>,
}

impl LogTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<OutgoingEmail> {
        self.delivered.lock().unwrap().clone()
    }
}

impl MailTransport for LogTransport {
    fn send(&self, email: &OutgoingEmail) -> Result<(), SendError> {
        info!(
            "Mail from {} to {}: \"{}\" ({} bytes)",
            email.from,
            email.to,
            email.subject,
            email.body.len()
        );
        self.delivered.lock().unwrap().push(email.clone());
        Ok(())
    }
}
