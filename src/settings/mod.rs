//! Notifier settings: the typed document persisted in the options table, the
//! raw form submission, and the validation that turns one into the other.

mod validation;

pub use validation::{is_email, sanitize_email, validate_submission, FieldError};

use crate::schedule::Recurrence;
use crate::site_store::SiteStore;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Option under which [`Settings`] are persisted.
pub const SETTINGS_OPTION: &str = "stc_settings";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cron_recurrence: Recurrence,
    /// Sender address; empty means the site admin address.
    pub email_from: String,
    /// Maximum excerpt length per post, in characters.
    pub email_content_length: Option<u32>,
    pub email_template: String,
    /// Digest subject; empty means the post title.
    pub title: String,
    // The next four flags are kept for the admin form to display and edit.
    // Delivery does not read them.
    /// Allow a post to be notified again after an update.
    pub resend_option: bool,
    /// Offer authors a per-post opt-out of notification.
    pub exclude_from_send_option: bool,
    /// Send digests without inline styles.
    pub exclude_css: bool,
    /// Drop subscriber records when the notifier is uninstalled.
    pub deactivation_remove_subscribers: bool,
    /// Compose digests without delivering them.
    pub developer_mode: bool,
}

/// Settings as posted by the admin form. Checkboxes are present only when
/// ticked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsSubmission {
    pub cron_recurrence: Option<String>,
    pub email_from: Option<String>,
    pub email_content_length: Option<String>,
    pub email_template: Option<String>,
    pub title: Option<String>,
    pub resend_option: Option<String>,
    pub exclude_from_send_option: Option<String>,
    pub exclude_css: Option<String>,
    pub deactivation_remove_subscribers: Option<String>,
    pub developer_mode: Option<String>,
}

#[derive(Clone)]
pub struct SettingsRepository {
    site_store: Arc<dyn SiteStore>,
}

impl SettingsRepository {
    pub fn new(site_store: Arc<dyn SiteStore>) -> Self {
        Self { site_store }
    }

    /// Stored settings, or the defaults when none were saved yet.
    pub fn load(&self) -> Result<Settings> {
        match self.site_store.get_option(SETTINGS_OPTION)? {
            Some(raw) => serde_json::from_str(&raw).context("Stored settings are corrupt"),
            None => Ok(Settings::default()),
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        let raw = serde_json::to_string(settings)?;
        self.site_store.set_option(SETTINGS_OPTION, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site_store::SqliteSiteStore;
    use tempfile::TempDir;

    #[test]
    fn repository_returns_defaults_then_saved_values() {
        let temp_dir = TempDir::new().unwrap();
        let site_store = Arc::new(SqliteSiteStore::new(temp_dir.path().join("site.db")).unwrap());
        let repository = SettingsRepository::new(site_store.clone());

        assert_eq!(repository.load().unwrap(), Settings::default());

        let settings = Settings {
            cron_recurrence: Recurrence::Daily,
            email_from: "news@example.com".to_string(),
            email_content_length: Some(200),
            developer_mode: true,
            ..Settings::default()
        };
        repository.save(&settings).unwrap();
        assert_eq!(repository.load().unwrap(), settings);

        site_store.set_option(SETTINGS_OPTION, "{oops").unwrap();
        assert!(repository.load().is_err());
    }

    #[test]
    fn missing_fields_in_stored_document_take_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"cron_recurrence":"twicedaily"}"#).unwrap();
        assert_eq!(settings.cron_recurrence, Recurrence::TwiceDaily);
        assert!(!settings.developer_mode);
        assert_eq!(settings.email_content_length, None);
    }

    #[test]
    fn form_only_flags_are_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let site_store = Arc::new(SqliteSiteStore::new(temp_dir.path().join("site.db")).unwrap());
        let repository = SettingsRepository::new(site_store);

        let settings = Settings {
            resend_option: true,
            exclude_from_send_option: true,
            exclude_css: true,
            deactivation_remove_subscribers: true,
            ..Settings::default()
        };
        repository.save(&settings).unwrap();

        let loaded = repository.load().unwrap();
        assert!(loaded.resend_option);
        assert!(loaded.exclude_from_send_option);
        assert!(loaded.exclude_css);
        assert!(loaded.deactivation_remove_subscribers);
        assert!(!loaded.developer_mode);
    }
}
