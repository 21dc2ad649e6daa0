//! Subscriber export as a spreadsheet-friendly tab separated document.

use crate::site_store::{SiteStore, POST_STATUS_PUBLISH, POST_TYPE_SUBSCRIBER};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const EXPORT_CONTENT_TYPE: &str = "application/vnd.ms-excel";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub id: i64,
    pub email: String,
    /// Comma separated names of the subscribed categories.
    pub user_categories: String,
    pub subscription_date: String,
}

impl ExportRow {
    pub const COLUMNS: [&'static str; 4] = ["id", "email", "user_categories", "subscription_date"];

    fn values(&self) -> [String; 4] {
        [
            self.id.to_string(),
            self.email.clone(),
            self.user_categories.clone(),
            self.subscription_date.clone(),
        ]
    }
}

/// Category filter applied to an export, by display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportFilter {
    pub category_names: Vec<String>,
}

pub trait ExportSerializer {
    fn content_type(&self) -> &'static str;
    fn serialize(&self, filter: &ExportFilter, rows: &[ExportRow]) -> String;
}

pub struct TabSeparatedExport;

impl TabSeparatedExport {
    fn clean(value: &str) -> String {
        value
            .replace('\t', "\\t")
            .replace("\r\n", "\\n")
            .replace('\n', "\\n")
    }
}

impl ExportSerializer for TabSeparatedExport {
    fn content_type(&self) -> &'static str {
        EXPORT_CONTENT_TYPE
    }

    fn serialize(&self, filter: &ExportFilter, rows: &[ExportRow]) -> String {
        let mut out = String::new();
        if !filter.category_names.is_empty() {
            out.push_str("\r\nFiltered by: ");
            out.push_str(&filter.category_names.join(", "));
        }
        out.push_str("\r\n");
        out.push_str(&ExportRow::COLUMNS.join("\t"));
        out.push_str("\r\n");
        for row in rows {
            let cells: Vec<String> = row.values().iter().map(|v| Self::clean(v)).collect();
            out.push_str(&cells.join("\t"));
            out.push_str("\r\n");
        }
        out
    }
}

/// Published subscribers, limited to those in any of `category_ids` when
/// it is not empty. Unknown category ids are left out of the filter names.
pub fn collect_rows(
    site_store: &Arc<dyn SiteStore>,
    category_ids: &[i64],
) -> Result<(ExportFilter, Vec<ExportRow>)> {
    let mut filter = ExportFilter::default();
    for id in category_ids {
        if let Some(category) = site_store.get_category(*id)? {
            filter.category_names.push(category.name);
        }
    }

    let subscribers =
        site_store.list_posts(POST_TYPE_SUBSCRIBER, POST_STATUS_PUBLISH, category_ids)?;
    let mut rows = Vec::with_capacity(subscribers.len());
    for subscriber in subscribers {
        let names: Vec<String> = site_store
            .get_post_categories(subscriber.id)?
            .into_iter()
            .map(|c| c.name)
            .collect();
        rows.push(ExportRow {
            id: subscriber.id,
            email: subscriber.title,
            user_categories: names.join(", "),
            subscription_date: subscriber.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        });
    }
    Ok((filter, rows))
}

pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("stc-notifier_{}.xls", now.format("%Y%m%d_%H%M%S"))
}
