use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::models::{ContentSession, ContentVersion, GuardrailViolation, Platform, VersionMetadata};

/// In-memory state of one open editor: the session, one version per platform,
/// the active platform, dirty/saving flags and per-platform guardrail violations.
///
/// Every setter is synchronous and infallible. The store records what callers
/// give it and does not validate stage transitions or platform membership.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStore {
    current_session: Option<ContentSession>,
    versions: HashMap<Platform, ContentVersion>,
    active_platform: Platform,
    unsaved_changes: bool,
    is_saving: bool,
    violations: HashMap<Platform, Vec<GuardrailViolation>>,
    edit_generation: u64,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self {
            current_session: None,
            versions: HashMap::new(),
            active_platform: Platform::Article,
            unsaved_changes: false,
            is_saving: false,
            violations: HashMap::new(),
            edit_generation: 0,
        }
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_session(&self) -> Option<&ContentSession> {
        self.current_session.as_ref()
    }

    pub fn version(&self, platform: Platform) -> Option<&ContentVersion> {
        self.versions.get(&platform)
    }

    pub fn active_platform(&self) -> Platform {
        self.active_platform
    }

    pub fn active_version(&self) -> Option<&ContentVersion> {
        self.version(self.active_platform)
    }

    pub fn violations(&self, platform: Platform) -> &[GuardrailViolation] {
        self.violations.get(&platform).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn unsaved_changes(&self) -> bool {
        self.unsaved_changes
    }

    pub fn is_saving(&self) -> bool {
        self.is_saving
    }

    /// Bumped on every successful content edit.
    pub fn edit_generation(&self) -> u64 {
        self.edit_generation
    }

    pub fn set_current_session(&mut self, session: Option<ContentSession>) {
        self.current_session = session;
    }

    /// Replace exactly one platform's version. Other platforms are untouched.
    pub fn set_content_version(&mut self, platform: Platform, version: Option<ContentVersion>) {
        match version {
            Some(v) => {
                self.versions.insert(platform, v);
            }
            None => {
                self.versions.remove(&platform);
            }
        }
    }

    pub fn set_active_platform(&mut self, platform: Platform) {
        self.active_platform = platform;
    }

    /// Replace the content of one platform's version and mark the editor dirty.
    ///
    /// No-op (returns `false`) when that platform has no version loaded.
    pub fn update_version_content(&mut self, platform: Platform, content: impl Into<String>) -> bool {
        let Some(version) = self.versions.get_mut(&platform) else {
            debug!(%platform, "no version loaded, ignoring content update");
            return false;
        };
        version.content = content.into();
        self.unsaved_changes = true;
        self.edit_generation += 1;
        true
    }

    /// Apply `change` to one platform's metadata. The editor is marked dirty
    /// only when `change` reports that it modified something.
    pub fn update_version_metadata(
        &mut self,
        platform: Platform,
        change: impl FnOnce(&mut VersionMetadata) -> bool,
    ) -> bool {
        let Some(version) = self.versions.get_mut(&platform) else {
            debug!(%platform, "no version loaded, ignoring metadata update");
            return false;
        };
        if !change(&mut version.metadata) {
            return false;
        }
        self.unsaved_changes = true;
        self.edit_generation += 1;
        true
    }

    pub fn set_unsaved_changes(&mut self, unsaved: bool) {
        self.unsaved_changes = unsaved;
    }

    pub fn set_is_saving(&mut self, saving: bool) {
        self.is_saving = saving;
    }

    pub fn set_guardrail_violations(&mut self, platform: Platform, violations: Vec<GuardrailViolation>) {
        self.violations.insert(platform, violations);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Store handle shared between an editor and its background tasks.
#[derive(Debug, Clone)]
pub struct SharedStore(Arc<Mutex<SessionStore>>);

impl SharedStore {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(SessionStore::new())))
    }

    /// Lock the store. A poisoned lock still holds consistent data since no setter can panic midway.
    pub fn lock(&self) -> MutexGuard<'_, SessionStore> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{session, version, violation};

    fn loaded() -> SessionStore {
        let mut store = SessionStore::new();
        store.set_current_session(Some(session(&[Platform::Article, Platform::Twitter])));
        store.set_content_version(Platform::Article, Some(version(Platform::Article, "draft")));
        store.set_content_version(Platform::Twitter, Some(version(Platform::Twitter, "tweet")));
        store
    }

    #[test]
    fn update_sets_content_and_dirty_flag() {
        let mut store = loaded();
        assert!(store.update_version_content(Platform::Article, "draft v2"));
        assert!(store.unsaved_changes());
        assert_eq!(store.version(Platform::Article).unwrap().content, "draft v2");
        assert_eq!(store.edit_generation(), 1);
    }

    #[test]
    fn update_without_version_is_noop() {
        let mut store = loaded();
        let before = store.clone();
        for platform in [Platform::LinkedIn, Platform::Reel] {
            assert!(!store.update_version_content(platform, "anything"));
        }
        assert!(!store.unsaved_changes());
        assert_eq!(store, before);
    }

    #[test]
    fn update_leaves_other_platforms_untouched() {
        let mut store = loaded();
        let twitter_before = store.version(Platform::Twitter).cloned();
        store.update_version_content(Platform::Article, "changed");
        assert_eq!(store.version(Platform::Twitter).cloned(), twitter_before);

        assert_eq!(
            store.version(Platform::Article),
            Some(&version(Platform::Article, "changed"))
        );
    }

    #[test]
    fn metadata_update_marks_dirty_only_when_changed() {
        let mut store = loaded();
        assert!(!store.update_version_metadata(Platform::Twitter, |_| false));
        assert!(!store.unsaved_changes());

        let changed = store.update_version_metadata(Platform::Twitter, |m| match m {
            VersionMetadata::Twitter(t) => {
                t.add_tweet("first");
                true
            }
            _ => false,
        });
        assert!(changed);
        assert!(store.unsaved_changes());
        assert_eq!(store.edit_generation(), 1);
        assert_eq!(store.version(Platform::Twitter).unwrap().content, "tweet");
    }

    #[test]
    fn metadata_update_without_version_is_noop() {
        let mut store = loaded();
        let mut called = false;
        assert!(!store.update_version_metadata(Platform::Reel, |_| {
            called = true;
            true
        }));
        assert!(!called);
        assert!(!store.unsaved_changes());
    }

    #[test]
    fn switching_platform_never_mutates_versions() {
        let mut store = loaded();
        let versions_before = store.versions.clone();
        store.set_active_platform(Platform::Twitter);
        assert_eq!(store.active_version().unwrap().content, "tweet");
        assert_eq!(store.versions, versions_before);
        assert!(!store.unsaved_changes());
    }

    #[test]
    fn set_content_version_replaces_one_platform() {
        let mut store = loaded();
        store.set_content_version(Platform::Article, None);
        assert!(store.version(Platform::Article).is_none());
        assert!(store.version(Platform::Twitter).is_some());
    }

    #[test]
    fn session_replacement_has_no_effect_on_versions() {
        let mut store = loaded();
        store.set_current_session(None);
        assert!(store.current_session().is_none());
        assert!(store.version(Platform::Article).is_some());
    }

    #[test]
    fn violations_are_per_platform() {
        let mut store = loaded();
        store.set_guardrail_violations(Platform::Twitter, vec![violation("v1", true)]);
        assert_eq!(store.violations(Platform::Twitter).len(), 1);
        assert!(store.violations(Platform::Article).is_empty());

        store.set_guardrail_violations(Platform::Twitter, vec![]);
        assert!(store.violations(Platform::Twitter).is_empty());
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut store = loaded();
        store.set_active_platform(Platform::Reel);
        store.update_version_content(Platform::Article, "x");
        store.set_is_saving(true);
        store.set_guardrail_violations(Platform::Article, vec![violation("v1", false)]);

        store.reset();

        assert!(store.current_session().is_none());
        for platform in Platform::ALL {
            assert!(store.version(platform).is_none());
            assert!(store.violations(platform).is_empty());
        }
        assert!(!store.unsaved_changes());
        assert!(!store.is_saving());
        assert_eq!(store.active_platform(), Platform::Article);
        assert_eq!(store, SessionStore::new());
    }

    #[test]
    fn shared_store_handles_see_the_same_state() {
        let shared = SharedStore::new();
        let other = shared.clone();
        shared.lock().set_unsaved_changes(true);
        assert!(other.lock().unsaved_changes());
    }
}
