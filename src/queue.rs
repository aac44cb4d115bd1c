use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::Backend;
use crate::error::ApiError;
use crate::models::{QueueItem, QueueStatus};
use crate::notify::Notifier;

/// Read-only window onto the server-owned publish queue, plus the two actions
/// the server allows on queued items.
#[derive(Clone)]
pub struct QueueView {
    backend: Arc<dyn Backend>,
    notifier: Notifier,
}

impl QueueView {
    pub fn new(backend: Arc<dyn Backend>, notifier: Notifier) -> Self {
        Self { backend, notifier }
    }

    pub async fn list(&self, status: Option<QueueStatus>) -> Result<Vec<QueueItem>, ApiError> {
        self.backend.get_publish_queue(status).await
    }

    pub async fn retry(&self, item_id: &str) -> bool {
        match self.backend.retry_publish(item_id).await {
            Ok(()) => {
                self.notifier.success(format!("Retry queued for {item_id}"));
                true
            }
            Err(e) => {
                self.notifier.error(format!("Failed to retry {item_id}: {e}"));
                false
            }
        }
    }

    pub async fn cancel(&self, item_id: &str) -> bool {
        match self.backend.cancel_publish(item_id).await {
            Ok(()) => {
                self.notifier.success(format!("Cancelled {item_id}"));
                true
            }
            Err(e) => {
                self.notifier.error(format!("Failed to cancel {item_id}: {e}"));
                false
            }
        }
    }
}

/// Items whose status differs from the previous snapshot (new items included).
pub fn status_changes(previous: &HashMap<String, QueueStatus>, items: &[QueueItem]) -> Vec<(String, QueueStatus)> {
    items
        .iter()
        .filter(|item| previous.get(&item.id) != Some(&item.status))
        .map(|item| (item.id.clone(), item.status))
        .collect()
}

/// Queue polling loop. Fetches immediately, then every `interval`, reporting status changes.
pub async fn watch_loop(
    view: QueueView,
    status: Option<QueueStatus>,
    interval: Duration,
    cancel: CancellationToken,
    mut on_change: impl FnMut(&QueueItem),
) {
    info!(interval_secs = interval.as_secs(), "queue watcher started");
    let mut last_seen: HashMap<String, QueueStatus> = HashMap::new();
    let mut first = true;

    loop {
        if !first {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("queue watcher shutting down");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
        first = false;

        let items = match view.list(status).await {
            Ok(items) => items,
            Err(e) => {
                error!(error = %e, "failed to fetch publish queue");
                continue;
            }
        };

        let changed = status_changes(&last_seen, &items);
        if changed.is_empty() {
            debug!(items = items.len(), "queue unchanged");
        }
        for (id, new_status) in &changed {
            if let Some(item) = items.iter().find(|i| &i.id == id) {
                if *new_status == QueueStatus::Failed {
                    warn!(item = %id, error = ?item.error, "publish failed");
                } else {
                    info!(item = %id, status = %new_status, "queue item updated");
                }
                on_change(item);
            }
        }

        last_seen = items.into_iter().map(|i| (i.id, i.status)).collect();
    }
}
