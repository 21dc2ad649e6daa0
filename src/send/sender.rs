use super::transport::{MailTransport, OutgoingEmail};
use super::{SendError, SendRoutine};
use crate::queue::{QueueItem, QueueStore};
use crate::settings::{is_email, Settings, SettingsRepository};
use crate::site_store::{SiteStore, POST_STATUS_PUBLISH, POST_TYPE_SUBSCRIBER};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

lazy_static! {
    static ref TAG_REGEX: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// Site identity used in digests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteInfo {
    pub name: String,
    pub url: String,
    pub admin_email: String,
}

impl SiteInfo {
    pub fn post_link(&self, post_id: i64) -> String {
        format!("{}/?p={}", self.url.trim_end_matches('/'), post_id)
    }

    pub fn edit_link(&self, post_id: i64) -> String {
        format!(
            "{}/wp-admin/post.php?post={}&action=edit",
            self.url.trim_end_matches('/'),
            post_id
        )
    }
}

fn storage_error(err: impl std::fmt::Display) -> SendError {
    SendError::Storage(err.to_string())
}

fn excerpt(content: &str, max_chars: Option<u32>) -> String {
    let text = TAG_REGEX.replace_all(content, "");
    let text = text.trim();
    match max_chars {
        Some(max) if text.chars().count() > max as usize => {
            let cut: String = text.chars().take(max as usize).collect();
            format!("{}...", cut.trim_end())
        }
        _ => text.to_string(),
    }
}

/// Mails each subscriber one digest of the pending posts in the categories
/// they follow, then marks the queue as sent.
pub struct NotificationSender {
    site_store: Arc<dyn SiteStore>,
    queue: QueueStore,
    settings: SettingsRepository,
    transport: Arc<dyn MailTransport>,
    site: SiteInfo,
}

impl NotificationSender {
    pub fn new(
        site_store: Arc<dyn SiteStore>,
        transport: Arc<dyn MailTransport>,
        site: SiteInfo,
    ) -> Self {
        Self {
            queue: QueueStore::new(site_store.clone()),
            settings: SettingsRepository::new(site_store.clone()),
            site_store,
            transport,
            site,
        }
    }

    /// One message per subscriber sharing at least one category with the
    /// pending posts.
    pub fn compose_digests(
        &self,
        settings: &Settings,
        pending: &[QueueItem],
    ) -> Result<Vec<OutgoingEmail>, SendError> {
        let mut post_categories: HashMap<i64, HashSet<i64>> = HashMap::new();
        for item in pending {
            let categories = self
                .site_store
                .get_post_categories(item.id)
                .map_err(storage_error)?;
            post_categories.insert(item.id, categories.into_iter().map(|c| c.id).collect());
        }

        let subscribers = self
            .site_store
            .list_posts(POST_TYPE_SUBSCRIBER, POST_STATUS_PUBLISH, &[])
            .map_err(storage_error)?;

        let from = if settings.email_from.is_empty() {
            self.site.admin_email.clone()
        } else {
            settings.email_from.clone()
        };

        let mut digests = Vec::new();
        for subscriber in subscribers {
            let address = subscriber.title.trim();
            if !is_email(address) {
                warn!(
                    "Skipping subscriber {} with invalid address {:?}",
                    subscriber.id, address
                );
                continue;
            }
            let subscribed: HashSet<i64> = self
                .site_store
                .get_post_categories(subscriber.id)
                .map_err(storage_error)?
                .into_iter()
                .map(|c| c.id)
                .collect();

            let included: Vec<&QueueItem> = pending
                .iter()
                .filter(|item| {
                    post_categories
                        .get(&item.id)
                        .is_some_and(|categories| !categories.is_disjoint(&subscribed))
                })
                .collect();
            if included.is_empty() {
                continue;
            }

            digests.push(OutgoingEmail {
                from: from.clone(),
                to: address.to_string(),
                subject: self.subject(settings, &included),
                body: self.body(settings, &included),
            });
        }
        Ok(digests)
    }

    fn subject(&self, settings: &Settings, included: &[&QueueItem]) -> String {
        if !settings.title.is_empty() {
            return settings.title.clone();
        }
        match included {
            [single] => single.title.clone(),
            _ => format!("{} new posts on {}", included.len(), self.site.name),
        }
    }

    fn body(&self, settings: &Settings, included: &[&QueueItem]) -> String {
        let mut body = String::new();
        if !settings.email_template.is_empty() {
            body.push_str(&settings.email_template);
            body.push_str("\n\n");
        }
        for item in included {
            body.push_str(&format!(
                "{}\n{}\n\n{}\n\n",
                item.title,
                self.site.post_link(item.id),
                excerpt(&item.content, settings.email_content_length)
            ));
        }
        body.push_str(&format!(
            "You are receiving this email because you subscribed to {} ({}).\n",
            self.site.name, self.site.url
        ));
        body
    }
}

impl SendRoutine for NotificationSender {
    fn send_due_notifications(&self) -> Result<(), SendError> {
        let settings = self.settings.load().map_err(storage_error)?;
        let pending = self.queue.list_pending().map_err(storage_error)?;
        if pending.is_empty() {
            debug!("No pending posts, nothing to send");
            return Ok(());
        }

        let digests = self.compose_digests(&settings, &pending)?;
        if settings.developer_mode {
            for digest in &digests {
                info!(
                    "Developer mode, not sending \"{}\" to {}",
                    digest.subject, digest.to
                );
            }
            return Ok(());
        }

        for digest in &digests {
            self.transport.send(digest)?;
        }
        for item in &pending {
            self.queue.mark_sent(item.id).map_err(storage_error)?;
        }
        info!(
            "Sent {} digests covering {} posts",
            digests.len(),
            pending.len()
        );
        Ok(())
    }
}
