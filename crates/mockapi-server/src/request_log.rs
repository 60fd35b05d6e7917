//! Fire-and-forget persistence of request audit records.

use crate::metrics;
use crate::model::RequestLog;
use crate::store::RequestLogStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::error;

#[derive(Clone)]
pub struct RequestLogger {
    store: Arc<dyn RequestLogStore>,
}

impl RequestLogger {
    pub fn new(store: Arc<dyn RequestLogStore>) -> Self {
        Self { store }
    }

    /// Persist `entry` on a detached task.
    ///
    /// The task outlives the connection that produced the entry. Failures are
    /// logged locally and never reach the caller.
    pub fn log(&self, entry: RequestLog) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let status = entry.status;
            let url = entry.url.clone();
            if let Err(e) = store.append(entry).await {
                metrics::record_request_log_failure();
                error!(status, url = %url, "Failed to persist request log: {}", e);
            }
        })
    }
}
