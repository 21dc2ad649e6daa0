//! Admin endpoints of the notifier, mounted under `/v1/admin/notifier`.

use super::metrics;
use super::session::Session;
use super::state::{GuardedNotifier, OptionalSchedulerHandle, ServerState};
use crate::notifier::{AdminError, RemoveError};
use crate::queue::QueueError;
use crate::settings::SettingsSubmission;
use crate::trigger::{AuthError, ACTION_QUEUE_REMOVE};
use crate::user::Permission;

use axum::{
    extract::{rejection::FormRejection, Form, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

pub const SETTINGS_VIEW_PATH: &str = "/v1/admin/notifier";
const JOB_HISTORY_LIMIT: usize = 20;

#[derive(Deserialize, Debug)]
struct NonceParams {
    #[serde(default)]
    nonce: String,
}

#[derive(Deserialize, Debug)]
struct QueueRemoveForm {
    post_id: i64,
    #[serde(default)]
    nonce: String,
}

#[derive(Deserialize, Debug, Default)]
struct ExportParams {
    /// Comma separated category ids.
    categories: Option<String>,
}

impl ExportParams {
    fn category_ids(&self) -> Vec<i64> {
        self.categories
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|id| id.trim().parse().ok())
            .collect()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::FORBIDDEN, self.to_string()).into_response()
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        match self {
            AdminError::Invalid(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": errors })),
            )
                .into_response(),
            AdminError::Auth(err) => err.into_response(),
            AdminError::Storage(err) => {
                error!("Notifier storage failure: {:#}", err);
                metrics::record_error("storage", "admin");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl IntoResponse for RemoveError {
    fn into_response(self) -> Response {
        match self {
            RemoveError::Auth(err) => err.into_response(),
            RemoveError::Queue(err @ QueueError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, err.to_string()).into_response()
            }
            RemoveError::Queue(err) => {
                error!("Queue removal failed: {}", err);
                metrics::record_error("storage", "queue_remove");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

async fn get_settings_view(
    session: Option<Session>,
    State(notifier): State<GuardedNotifier>,
) -> Response {
    let caller = session.map(|s| s.caller());
    match notifier.settings_view(caller.as_ref()) {
        Ok(view) => Json(view).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn post_settings(
    session: Option<Session>,
    State(notifier): State<GuardedNotifier>,
    Form(submission): Form<SettingsSubmission>,
) -> Response {
    let caller = session.map(|s| s.caller());
    match notifier.submit_settings(caller.as_ref(), &submission) {
        Ok(settings) => Json(settings).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn post_run(
    session: Option<Session>,
    State(notifier): State<GuardedNotifier>,
    params: Result<Form<NonceParams>, FormRejection>,
) -> Response {
    let caller = session.map(|s| s.caller());
    let nonce = params.map(|Form(params)| params.nonce).unwrap_or_default();
    match notifier.trigger().run_now(caller.as_ref(), &nonce).await {
        Ok(flag) => (StatusCode::OK, flag.message()).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_run_redirect(
    session: Option<Session>,
    State(notifier): State<GuardedNotifier>,
    Query(params): Query<NonceParams>,
) -> Response {
    let caller = session.map(|s| s.caller());
    match notifier
        .trigger()
        .run_and_notify(caller.as_ref(), &params.nonce)
        .await
    {
        Ok(_) => (StatusCode::FOUND, [(header::LOCATION, SETTINGS_VIEW_PATH)]).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn post_queue_remove(
    session: Option<Session>,
    State(notifier): State<GuardedNotifier>,
    form: Result<Form<QueueRemoveForm>, FormRejection>,
) -> Response {
    let caller = session.map(|s| s.caller());
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            // Callers are authorized before a malformed body is reported.
            if let Err(err) = notifier
                .trigger()
                .gate()
                .authorize(caller.as_ref(), ACTION_QUEUE_REMOVE, "")
            {
                return err.into_response();
            }
            return rejection.into_response();
        }
    };
    match notifier.remove_from_queue(caller.as_ref(), form.post_id, &form.nonce) {
        Ok(()) => (StatusCode::OK, "Post removed from queue of sending").into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_export(
    session: Option<Session>,
    State(notifier): State<GuardedNotifier>,
    Query(params): Query<ExportParams>,
) -> Response {
    let caller = session.map(|s| s.caller());
    match notifier.export(caller.as_ref(), &params.category_ids()) {
        Ok(document) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, document.content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", document.filename),
                ),
            ],
            document.body,
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_categories(
    session: Option<Session>,
    State(notifier): State<GuardedNotifier>,
) -> Response {
    let caller = session.map(|s| s.caller());
    match notifier.categories(caller.as_ref()) {
        Ok(categories) => Json(categories).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Serialize)]
struct JobStatus {
    info: crate::background_jobs::JobInfo,
    history: Vec<crate::background_jobs::JobRunInfo>,
}

async fn get_job(
    session: Session,
    State(scheduler_handle): State<OptionalSchedulerHandle>,
) -> Response {
    if !session.has_permission(Permission::ManageOptions) {
        return AuthError::Unauthenticated.into_response();
    }
    let Some(handle) = scheduler_handle else {
        return (StatusCode::NOT_FOUND, "Scheduler is not running").into_response();
    };
    let status = handle
        .job_info()
        .and_then(|info| Ok((info, handle.job_history(JOB_HISTORY_LIMIT)?)));
    match status {
        Ok((info, history)) => Json(JobStatus { info, history }).into_response(),
        Err(err) => {
            error!("Failed to read job status: {:#}", err);
            metrics::record_error("storage", "job");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn make_admin_routes(state: ServerState) -> Router {
    Router::new()
        .route("/", get(get_settings_view))
        .route("/settings", post(post_settings))
        .route("/run", post(post_run))
        .route("/run-redirect", get(get_run_redirect))
        .route("/queue/remove", post(post_queue_remove))
        .route("/export", get(get_export))
        .route("/categories", get(get_categories))
        .route("/job", get(get_job))
        .with_state(state)
}
