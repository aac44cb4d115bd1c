use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::api::Backend;
use crate::autosave::{Autosave, SaveOutcome};
use crate::guardrail::GuardrailFixer;
use crate::models::{Platform, SessionDetails, VersionMetadata};
use crate::notify::Notifier;
use crate::store::SharedStore;

/// An open editor for one session. Owns its store; the store lives exactly as
/// long as the editor and is reset on close.
pub struct Editor {
    store: SharedStore,
    autosave: Autosave,
    fixer: GuardrailFixer,
}

impl Editor {
    /// Load a session with its versions and current violations, and start autosave.
    pub async fn open(
        backend: Arc<dyn Backend>,
        notifier: Notifier,
        session_id: &str,
        quiet_period: Duration,
    ) -> Result<Self> {
        let details = backend
            .get_session(session_id)
            .await
            .with_context(|| format!("loading session '{session_id}'"))?;

        let store = SharedStore::new();
        load_details(&store, details);

        let fixer = GuardrailFixer::new(backend.clone(), notifier.clone());
        for platform in Platform::ALL {
            if let Err(e) = fixer.refresh_violations(&store, platform).await {
                warn!(%platform, error = %e, "failed to load guardrail violations");
            }
        }

        let autosave = Autosave::spawn(store.clone(), backend, notifier, quiet_period);
        info!(session_id = %session_id, active = %store.lock().active_platform(), "editor opened");

        Ok(Self {
            store,
            autosave,
            fixer,
        })
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn fixer(&self) -> &GuardrailFixer {
        &self.fixer
    }

    /// Replace the active version's content and schedule a debounced save.
    /// Word and character counts follow the new content.
    pub fn edit(&self, content: impl Into<String>) -> bool {
        let content = content.into();
        let updated = {
            let mut store = self.store.lock();
            let platform = store.active_platform();
            let updated = store.update_version_content(platform, content.as_str());
            if updated {
                store.update_version_metadata(platform, |metadata| {
                    metadata.refresh_counts(&content);
                    true
                });
            }
            updated
        };
        if updated {
            self.autosave.request_save();
        }
        updated
    }

    /// Append a tweet to the active Twitter thread.
    pub fn add_tweet(&self, content: &str) -> bool {
        self.change_metadata(|metadata| match metadata {
            VersionMetadata::Twitter(thread) => {
                thread.add_tweet(content);
                true
            }
            _ => false,
        })
    }

    /// Delete a tweet from the active Twitter thread. Refused for the last tweet.
    pub fn delete_tweet(&self, tweet_id: &str) -> bool {
        self.change_metadata(|metadata| match metadata {
            VersionMetadata::Twitter(thread) => thread.delete_tweet(tweet_id),
            _ => false,
        })
    }

    /// Set a scene duration on the active reel, clamped to the allowed range.
    pub fn set_scene_duration(&self, scene_id: &str, secs: u32) -> bool {
        self.change_metadata(|metadata| match metadata {
            VersionMetadata::Reel(reel) => reel.set_scene_duration(scene_id, secs),
            _ => false,
        })
    }

    fn change_metadata(&self, change: impl FnOnce(&mut VersionMetadata) -> bool) -> bool {
        let changed = {
            let mut store = self.store.lock();
            let platform = store.active_platform();
            store.update_version_metadata(platform, change)
        };
        if changed {
            self.autosave.request_save();
        }
        changed
    }

    /// Change the active platform. Autosave always persists the active
    /// version, so unsaved edits are flushed before leaving their platform.
    pub async fn switch_platform(&self, platform: Platform) {
        let (from, dirty) = {
            let store = self.store.lock();
            (store.active_platform(), store.unsaved_changes())
        };
        if dirty && from != platform {
            debug!(%from, to = %platform, "flushing unsaved edits before switching platform");
            if self.save_now().await == SaveOutcome::Failed {
                warn!(%from, to = %platform, "unsaved edits could not be saved before switching platform");
            }
        }
        debug!(%platform, "switching active platform");
        self.store.lock().set_active_platform(platform);
    }

    pub async fn save_now(&self) -> SaveOutcome {
        self.autosave.save_now().await
    }

    /// Stop autosave and discard editor state. Unsaved edits not yet flushed are dropped.
    pub async fn close(self) {
        self.autosave.shutdown().await;
        let mut store = self.store.lock();
        if store.unsaved_changes() {
            warn!("editor closed with unsaved changes");
        }
        store.reset();
    }
}

/// Put a freshly fetched session into an empty store: one version per
/// platform, first session platform active.
pub fn load_details(store: &SharedStore, details: SessionDetails) {
    let mut store = store.lock();
    let active = details
        .session
        .platforms
        .first()
        .copied()
        .unwrap_or(Platform::Article);
    for version in details.versions {
        store.set_content_version(version.platform(), Some(version));
    }
    store.set_current_session(Some(details.session));
    store.set_active_platform(active);
}
