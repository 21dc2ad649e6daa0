use super::nonce::{NonceIssuer, ACTION_FORCE_RUN};
use super::notice::{NoticeFlag, NoticeStore};
use crate::background_jobs::{JobError, JobRunner};
use crate::schedule::NOTIFICATION_JOB;
use crate::send::SendRoutine;
use crate::server::metrics;
use crate::user::Permission;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Sorry, you are not allowed to access this page.")]
    Unauthenticated,
    #[error("The link you followed has expired.")]
    InvalidToken,
}

/// The authenticated user behind an admin request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: usize,
    pub permissions: Vec<Permission>,
}

impl Caller {
    pub fn can_manage_options(&self) -> bool {
        self.permissions.contains(&Permission::ManageOptions)
    }
}

/// Capability and anti-replay check shared by every admin action.
#[derive(Clone)]
pub struct AdminGate {
    nonces: Arc<NonceIssuer>,
}

impl AdminGate {
    pub fn new(nonces: Arc<NonceIssuer>) -> Self {
        Self { nonces }
    }

    pub fn authorize(
        &self,
        caller: Option<&Caller>,
        action: &str,
        token: &str,
    ) -> Result<usize, AuthError> {
        let caller = match caller {
            Some(caller) if caller.can_manage_options() => caller,
            Some(caller) => {
                warn!("User {} lacks ManageOptions for {}", caller.user_id, action);
                return Err(AuthError::Unauthenticated);
            }
            None => return Err(AuthError::Unauthenticated),
        };
        if !self.nonces.verify(token, action, caller.user_id) {
            warn!("Rejected stale or forged {} token for user {}", action, caller.user_id);
            return Err(AuthError::InvalidToken);
        }
        Ok(caller.user_id)
    }

    /// A fresh token for `action`, or `None` when the caller may not perform it.
    pub fn issue(&self, caller: &Caller, action: &str) -> Option<String> {
        if !caller.can_manage_options() {
            return None;
        }
        match self.nonces.issue(action, caller.user_id) {
            Ok(token) => Some(token),
            Err(e) => {
                error!("Failed to issue {} token: {}", action, e);
                None
            }
        }
    }
}

/// Fires the notification job on demand, outside its schedule.
///
/// Runs go through the same [`JobRunner`] as scheduled firings, so a manual
/// run never overlaps a scheduled one. The schedule table is left alone.
#[derive(Clone)]
pub struct ManualTrigger {
    send_routine: Arc<dyn SendRoutine>,
    runner: JobRunner,
    gate: AdminGate,
    notices: NoticeStore,
}

impl ManualTrigger {
    pub fn new(
        send_routine: Arc<dyn SendRoutine>,
        runner: JobRunner,
        gate: AdminGate,
        notices: NoticeStore,
    ) -> Self {
        Self {
            send_routine,
            runner,
            gate,
            notices,
        }
    }

    pub fn gate(&self) -> &AdminGate {
        &self.gate
    }

    /// Plain-status entry point. Writes no notice.
    pub async fn run_now(&self, caller: Option<&Caller>, token: &str) -> Result<NoticeFlag, AuthError> {
        let user_id = self.authorize(caller, token, "async")?;
        let flag = self.execute().await;
        info!("Manual run by user {} finished: {:?}", user_id, flag);
        metrics::record_manual_trigger("async", flag_label(flag));
        Ok(flag)
    }

    /// Redirect entry point. The outcome is stored as a one-shot notice for
    /// the caller's next settings view.
    pub async fn run_and_notify(
        &self,
        caller: Option<&Caller>,
        token: &str,
    ) -> Result<NoticeFlag, AuthError> {
        let user_id = self.authorize(caller, token, "redirect")?;
        let flag = self.execute().await;
        if let Err(e) = self.notices.post(user_id, flag) {
            error!("Failed to store run notice for user {}: {}", user_id, e);
        }
        metrics::record_manual_trigger("redirect", flag_label(flag));
        Ok(flag)
    }

    /// Reads and clears the caller's pending notice.
    pub fn take_notice(&self, user_id: usize) -> Option<NoticeFlag> {
        match self.notices.take(user_id) {
            Ok(flag) => flag,
            Err(e) => {
                error!("Failed to read run notice for user {}: {}", user_id, e);
                None
            }
        }
    }

    fn authorize(
        &self,
        caller: Option<&Caller>,
        token: &str,
        entry_point: &str,
    ) -> Result<usize, AuthError> {
        self.gate
            .authorize(caller, ACTION_FORCE_RUN, token)
            .inspect_err(|_| metrics::record_manual_trigger(entry_point, "rejected"))
    }

    async fn execute(&self) -> NoticeFlag {
        let runner = self.runner.clone();
        let send_routine = Arc::clone(&self.send_routine);
        let result = tokio::task::spawn_blocking(move || {
            runner.run(NOTIFICATION_JOB, "manual", || {
                send_routine
                    .send_due_notifications()
                    .map_err(JobError::from)
            })
        })
        .await;

        let succeeded = match result {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Manual run failed: {}", e);
                false
            }
            Err(e) => {
                error!("Manual run task panicked: {}", e);
                false
            }
        };
        NoticeFlag::from_success(succeeded)
    }
}

fn flag_label(flag: NoticeFlag) -> &'static str {
    match flag {
        NoticeFlag::Success => "success",
        NoticeFlag::Failure => "failure",
    }
}
