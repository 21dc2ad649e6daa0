use super::{Settings, SettingsSubmission};
use crate::schedule::{RescheduleOutcome, Rescheduler};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~.-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)+$"
    )
    .unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub code: &'static str,
    pub message: String,
}

/// Trims the address and drops every character that cannot appear in one.
pub fn sanitize_email(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.@-".contains(*c))
        .collect()
}

pub fn is_email(candidate: &str) -> bool {
    candidate.len() >= 6 && EMAIL_REGEX.is_match(candidate)
}

fn is_checked(flag: &Option<String>) -> bool {
    match flag.as_deref().map(str::trim) {
        None | Some("") | Some("0") => false,
        Some(value) => !value.eq_ignore_ascii_case("false") && !value.eq_ignore_ascii_case("off"),
    }
}

/// Validates a submission against the currently stored settings.
///
/// Field checks run first; only a submission without field errors reaches the
/// rescheduler, which relocates the notification job before anything is
/// persisted. Returns the settings to store, or every field error found.
pub fn validate_submission(
    submission: &SettingsSubmission,
    current: &Settings,
    rescheduler: &Rescheduler,
) -> Result<Settings, Vec<FieldError>> {
    let mut errors = Vec::new();

    let email_from = sanitize_email(submission.email_from.as_deref().unwrap_or_default());
    if !email_from.is_empty() && !is_email(&email_from) {
        errors.push(FieldError {
            field: "email_from",
            code: "invalid-email",
            message: "You have entered an invalid email.".to_string(),
        });
    }

    let email_content_length = match submission.email_content_length.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match raw.parse::<u32>() {
            Ok(length) => Some(length),
            Err(_) => {
                errors.push(FieldError {
                    field: "email_content_length",
                    code: "invalid-number",
                    message: "Email content length must be a whole number.".to_string(),
                });
                None
            }
        },
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    let raw_interval = submission.cron_recurrence.as_deref().unwrap_or_default();
    let cron_recurrence = match rescheduler.apply(raw_interval, current.cron_recurrence) {
        Ok((recurrence, RescheduleOutcome::Relocated { due_at })) => {
            info!("Notification job now runs {}, next at {}", recurrence, due_at);
            recurrence
        }
        Ok((recurrence, RescheduleOutcome::Unchanged)) => recurrence,
        Err(err) => {
            warn!("Keeping {} recurrence: {}", current.cron_recurrence, err);
            return Err(vec![FieldError {
                field: "cron_recurrence",
                code: "reschedule-failed",
                message: format!("The notification schedule could not be updated: {}", err),
            }]);
        }
    };

    Ok(Settings {
        cron_recurrence,
        email_from,
        email_content_length,
        email_template: submission.email_template.clone().unwrap_or_default(),
        title: submission
            .title
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        resend_option: is_checked(&submission.resend_option),
        exclude_from_send_option: is_checked(&submission.exclude_from_send_option),
        exclude_css: is_checked(&submission.exclude_css),
        deactivation_remove_subscribers: is_checked(&submission.deactivation_remove_subscribers),
        developer_mode: is_checked(&submission.developer_mode),
    })
}
