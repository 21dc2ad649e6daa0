//! Wires the notifier's stores, scheduler and trigger around one site store.

use crate::background_jobs::jobs::NotificationDigestJob;
use crate::background_jobs::{BackgroundJob, JobRunner, JobScheduler, SchedulerHandle};
use crate::export::{collect_rows, export_filename, ExportSerializer, TabSeparatedExport};
use crate::queue::{DisplayFormat, QueueError, QueueInspector, QueueStore};
use crate::schedule::{Rescheduler, ScheduleStore, NOTIFICATION_JOB};
use crate::send::{SendRoutine, SiteInfo};
use crate::settings::{validate_submission, FieldError, Settings, SettingsRepository, SettingsSubmission};
use crate::site_store::{Category, SiteStore};
use crate::trigger::{
    load_or_create_secret, AdminGate, AuthError, Caller, ManualTrigger, NonceIssuer, NoticeFlag,
    NoticeStore, ACTION_FORCE_RUN, ACTION_QUEUE_REMOVE,
};
use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone)]
pub struct NotifierOptions {
    pub site: SiteInfo,
    pub display_format: DisplayFormat,
    pub notice_ttl: Duration,
    /// Generated and persisted in the options table when unset.
    pub nonce_secret: Option<String>,
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("settings rejected: {} field errors", .0.len())]
    Invalid(Vec<FieldError>),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum RemoveError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingPostView {
    pub id: i64,
    pub title: String,
    pub edit_link: String,
    pub view_link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoticeView {
    pub value: u8,
    pub message: &'static str,
}

impl From<NoticeFlag> for NoticeView {
    fn from(flag: NoticeFlag) -> Self {
        NoticeView {
            value: flag.value(),
            message: flag.message(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionTokens {
    pub force_run: String,
    pub queue_remove: String,
}

/// Everything the admin settings page shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsView {
    pub settings: Settings,
    pub developer_mode_warning: bool,
    pub pending_count: usize,
    pub pending: Vec<PendingPostView>,
    pub next_run: Option<String>,
    pub notice: Option<NoticeView>,
    pub tokens: ActionTokens,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub filename: String,
    pub content_type: &'static str,
    pub body: String,
}

#[derive(Clone)]
pub struct Notifier {
    site_store: Arc<dyn SiteStore>,
    settings: SettingsRepository,
    schedule: ScheduleStore,
    rescheduler: Rescheduler,
    queue: QueueStore,
    inspector: QueueInspector,
    runner: JobRunner,
    trigger: ManualTrigger,
    send_routine: Arc<dyn SendRoutine>,
    site: SiteInfo,
    display_format: DisplayFormat,
}

impl Notifier {
    pub fn new(
        site_store: Arc<dyn SiteStore>,
        send_routine: Arc<dyn SendRoutine>,
        options: NotifierOptions,
    ) -> Result<Self> {
        let secret = load_or_create_secret(&site_store, options.nonce_secret.as_deref())?;
        let nonces = Arc::new(NonceIssuer::new(secret)?);
        let schedule = ScheduleStore::new(site_store.clone());
        let queue = QueueStore::new(site_store.clone());
        let runner = JobRunner::new(site_store.clone());
        let trigger = ManualTrigger::new(
            send_routine.clone(),
            runner.clone(),
            AdminGate::new(nonces),
            NoticeStore::new(site_store.clone(), options.notice_ttl),
        );

        Ok(Self {
            settings: SettingsRepository::new(site_store.clone()),
            rescheduler: Rescheduler::new(schedule.clone(), NOTIFICATION_JOB),
            inspector: QueueInspector::new(queue.clone(), schedule.clone()),
            schedule,
            queue,
            runner,
            trigger,
            send_routine,
            site: options.site,
            display_format: options.display_format,
            site_store,
        })
    }

    pub fn trigger(&self) -> &ManualTrigger {
        &self.trigger
    }

    pub fn schedule(&self) -> &ScheduleStore {
        &self.schedule
    }

    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    /// Registers the notification job with the stored recurrence when it has
    /// no schedule entry yet.
    pub fn install(&self) -> Result<bool> {
        let settings = self.settings.load()?;
        Ok(self
            .schedule
            .ensure_registered(NOTIFICATION_JOB, settings.cron_recurrence)?)
    }

    pub fn job_scheduler(
        &self,
        shutdown_token: CancellationToken,
        check_interval: Duration,
    ) -> (JobScheduler, SchedulerHandle) {
        let job: Arc<dyn BackgroundJob> =
            Arc::new(NotificationDigestJob::new(self.send_routine.clone()));
        let handle = SchedulerHandle::new(
            job.clone(),
            self.runner.clone(),
            self.schedule.clone(),
            self.site_store.clone(),
        );
        let scheduler = JobScheduler::new(
            job,
            self.schedule.clone(),
            self.runner.clone(),
            self.site_store.clone(),
            shutdown_token,
            check_interval,
        );
        (scheduler, handle)
    }

    fn require_admin<'a>(&self, caller: Option<&'a Caller>) -> Result<&'a Caller, AuthError> {
        caller
            .filter(|caller| caller.can_manage_options())
            .ok_or(AuthError::Unauthenticated)
    }

    /// Builds the settings page, consuming the caller's pending run notice.
    pub fn settings_view(&self, caller: Option<&Caller>) -> Result<SettingsView, AdminError> {
        let caller = self.require_admin(caller)?;
        let settings = self.settings.load()?;
        let pending = self.inspector.list_pending().map_err(anyhow::Error::from)?;
        let pending_count = self.inspector.count_pending().map_err(anyhow::Error::from)?;
        crate::server::metrics::set_pending_items(pending_count);

        let tokens = ActionTokens {
            force_run: self.trigger.gate().issue(caller, ACTION_FORCE_RUN).unwrap_or_default(),
            queue_remove: self
                .trigger
                .gate()
                .issue(caller, ACTION_QUEUE_REMOVE)
                .unwrap_or_default(),
        };

        Ok(SettingsView {
            developer_mode_warning: settings.developer_mode,
            pending_count,
            pending: pending
                .into_iter()
                .map(|item| PendingPostView {
                    edit_link: self.site.edit_link(item.id),
                    view_link: self.site.post_link(item.id),
                    id: item.id,
                    title: item.title,
                })
                .collect(),
            next_run: self
                .inspector
                .next_run_display(NOTIFICATION_JOB, &self.display_format),
            notice: self.trigger.take_notice(caller.user_id).map(NoticeView::from),
            tokens,
            settings,
        })
    }

    /// Validates and stores a settings submission. Nothing is persisted when
    /// any field is rejected.
    pub fn submit_settings(
        &self,
        caller: Option<&Caller>,
        submission: &SettingsSubmission,
    ) -> Result<Settings, AdminError> {
        self.require_admin(caller)?;
        let current = self.settings.load()?;
        let accepted = validate_submission(submission, &current, &self.rescheduler)
            .map_err(AdminError::Invalid)?;
        self.settings.save(&accepted)?;
        info!("Notifier settings updated");
        Ok(accepted)
    }

    pub fn remove_from_queue(
        &self,
        caller: Option<&Caller>,
        post_id: i64,
        token: &str,
    ) -> Result<(), RemoveError> {
        self.trigger
            .gate()
            .authorize(caller, ACTION_QUEUE_REMOVE, token)?;
        self.queue.block(post_id)?;
        Ok(())
    }

    pub fn categories(&self, caller: Option<&Caller>) -> Result<Vec<Category>, AdminError> {
        self.require_admin(caller)?;
        Ok(self.site_store.list_categories()?)
    }

    pub fn export(
        &self,
        caller: Option<&Caller>,
        category_ids: &[i64],
    ) -> Result<ExportDocument, AdminError> {
        self.require_admin(caller)?;
        let (filter, rows) = collect_rows(&self.site_store, category_ids)?;
        let serializer = TabSeparatedExport;
        info!("Exporting {} subscribers", rows.len());
        Ok(ExportDocument {
            filename: export_filename(Utc::now()),
            content_type: serializer.content_type(),
            body: serializer.serialize(&filter, &rows),
        })
    }
}
