use crate::site_store::SiteStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs during execution.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    pub site_store: Arc<dyn SiteStore>,
}

impl JobContext {
    pub fn new(cancellation_token: CancellationToken, site_store: Arc<dyn SiteStore>) -> Self {
        Self {
            cancellation_token,
            site_store,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
