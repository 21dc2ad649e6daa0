mod notification_digest;

pub use notification_digest::NotificationDigestJob;
