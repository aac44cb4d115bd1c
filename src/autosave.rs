use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::Backend;
use crate::notify::Notifier;
use crate::store::SharedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// No version loaded for the active platform; nothing was sent.
    Skipped,
    Failed,
}

/// Holds `is_saving` for the duration of a save and releases it on every exit path.
struct SavingGuard {
    store: SharedStore,
}

impl SavingGuard {
    fn acquire(store: &SharedStore) -> Self {
        store.lock().set_is_saving(true);
        Self { store: store.clone() }
    }
}

impl Drop for SavingGuard {
    fn drop(&mut self) {
        self.store.lock().set_is_saving(false);
    }
}

struct Persister {
    store: SharedStore,
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    // One save at a time per editor.
    serial: tokio::sync::Mutex<()>,
}

impl Persister {
    async fn persist(&self) -> SaveOutcome {
        let _serial = self.serial.lock().await;

        let snapshot = {
            let store = self.store.lock();
            store
                .active_version()
                .map(|v| (v.id.clone(), v.content.clone(), v.metadata.clone(), store.edit_generation()))
        };
        let Some((version_id, content, metadata, generation)) = snapshot else {
            debug!("no active version at save time, skipping");
            return SaveOutcome::Skipped;
        };

        let _saving = SavingGuard::acquire(&self.store);
        debug!(version_id = %version_id, platform = %metadata.platform(), bytes = content.len(), "saving content");

        match self.backend.update_content_version(&version_id, &content, &metadata).await {
            Ok(()) => {
                {
                    let mut store = self.store.lock();
                    if store.edit_generation() == generation {
                        store.set_unsaved_changes(false);
                    } else {
                        debug!(version_id = %version_id, "edits landed during save, still dirty");
                    }
                }
                info!(version_id = %version_id, "content saved");
                self.notifier.success("Changes saved");
                SaveOutcome::Saved
            }
            Err(e) => {
                warn!(version_id = %version_id, error = %e, "content save failed");
                self.notifier.error(format!("Failed to save changes: {e}"));
                SaveOutcome::Failed
            }
        }
    }
}

/// Trailing-edge debounced autosave for one editor.
///
/// Every [`Autosave::request_save`] restarts the quiet period; once the
/// requests stop for that long, the active version's content *at that moment*
/// is persisted once.
pub struct Autosave {
    persister: Arc<Persister>,
    requests: mpsc::UnboundedSender<()>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Autosave {
    pub fn spawn(store: SharedStore, backend: Arc<dyn Backend>, notifier: Notifier, quiet_period: Duration) -> Self {
        let persister = Arc::new(Persister {
            store,
            backend,
            notifier,
            serial: tokio::sync::Mutex::new(()),
        });
        let (requests, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(debounce_loop(persister.clone(), rx, quiet_period, cancel.clone()));
        Self {
            persister,
            requests,
            cancel,
            handle,
        }
    }

    /// Ask for a save once edits go quiet.
    pub fn request_save(&self) {
        if self.requests.send(()).is_err() {
            debug!("autosave task gone, dropping save request");
        }
    }

    /// Persist immediately, bypassing the quiet period.
    pub async fn save_now(&self) -> SaveOutcome {
        self.persister.persist().await
    }

    /// Stop the debounce task. A pending, not yet fired save is discarded.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "autosave task ended abnormally");
        }
    }
}

async fn debounce_loop(
    persister: Arc<Persister>,
    mut requests: mpsc::UnboundedReceiver<()>,
    quiet_period: Duration,
    cancel: CancellationToken,
) {
    debug!(quiet_ms = quiet_period.as_millis() as u64, "autosave started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            req = requests.recv() => {
                if req.is_none() {
                    return;
                }
            }
        }

        // Each new request restarts the quiet period.
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("autosave shutting down, pending save dropped");
                    return;
                }
                req = requests.recv() => {
                    if req.is_none() {
                        break;
                    }
                }
                _ = tokio::time::sleep(quiet_period) => break,
            }
        }

        persister.persist().await;
    }
}
