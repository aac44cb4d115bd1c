use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::api::Backend;
use crate::error::ApiError;
use crate::models::{GuardrailViolation, Platform, Severity};
use crate::notify::Notifier;
use crate::store::SharedStore;

/// Shown when a version has no violations. Placeholder copy, not the result of any check.
pub const PASSED_CHECKS: [&str; 3] = ["Character limit OK", "Has call-to-action", "Has strong hook"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Passed,
    Failed(Severity),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistRow {
    pub violation_id: Option<String>,
    pub label: String,
    pub state: CheckState,
    pub fixable: bool,
}

/// One row per violation, or the fixed passed-checks list when there are none.
pub fn checklist(violations: &[GuardrailViolation]) -> Vec<ChecklistRow> {
    if violations.is_empty() {
        return PASSED_CHECKS
            .iter()
            .map(|label| ChecklistRow {
                violation_id: None,
                label: (*label).to_string(),
                state: CheckState::Passed,
                fixable: false,
            })
            .collect();
    }

    violations
        .iter()
        .map(|v| ChecklistRow {
            violation_id: Some(v.id.clone()),
            label: v.message.clone(),
            state: CheckState::Failed(v.severity),
            fixable: v.can_auto_fix,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    /// The backend accepted the fix. The violation list must be refreshed to see it.
    Requested,
    /// A fix for this violation is still running; nothing was sent.
    AlreadyInFlight,
    Failed,
}

/// RAII guard that removes a violation ID from the in-flight set on drop.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    violation_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().unwrap().remove(&self.violation_id);
    }
}

/// Drives auto-fix requests. In-flight state is tracked per violation, so
/// different violations fix concurrently while the same one never runs twice.
#[derive(Clone)]
pub struct GuardrailFixer {
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl GuardrailFixer {
    pub fn new(backend: Arc<dyn Backend>, notifier: Notifier) -> Self {
        Self {
            backend,
            notifier,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn is_fixing(&self, violation_id: &str) -> bool {
        self.in_flight.lock().unwrap().contains(violation_id)
    }

    pub async fn fix(&self, violation_id: &str) -> FixOutcome {
        let inserted = self.in_flight.lock().unwrap().insert(violation_id.to_string());
        if !inserted {
            debug!(violation_id = %violation_id, "fix already in progress, skipping");
            return FixOutcome::AlreadyInFlight;
        }
        let _guard = InFlightGuard {
            set: self.in_flight.clone(),
            violation_id: violation_id.to_string(),
        };

        match self.backend.auto_fix_violation(violation_id).await {
            Ok(()) => {
                info!(violation_id = %violation_id, "auto-fix applied");
                self.notifier.success("Fix applied");
                FixOutcome::Requested
            }
            Err(e) => {
                warn!(violation_id = %violation_id, error = %e, "auto-fix failed");
                self.notifier.error(format!("Failed to apply fix: {e}"));
                FixOutcome::Failed
            }
        }
    }

    /// Fix several violations, at most `max_concurrent` at a time.
    pub async fn fix_all(&self, violation_ids: Vec<String>, max_concurrent: usize) -> Vec<(String, FixOutcome)> {
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut tasks = JoinSet::new();
        let mut outcomes = Vec::new();

        for violation_id in violation_ids {
            if self.is_fixing(&violation_id) {
                debug!(violation_id = %violation_id, "fix already in progress, not queueing");
                outcomes.push((violation_id, FixOutcome::AlreadyInFlight));
                continue;
            }
            let fixer = self.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let outcome = match semaphore.acquire().await {
                    Ok(_permit) => fixer.fix(&violation_id).await,
                    Err(_) => FixOutcome::Failed,
                };
                (violation_id, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "fix task ended abnormally"),
            }
        }
        outcomes
    }

    /// Re-read the server's evaluation of a platform's version into the store.
    ///
    /// Does nothing when the platform has no version loaded.
    pub async fn refresh_violations(&self, store: &SharedStore, platform: Platform) -> Result<usize, ApiError> {
        let version_id = store.lock().version(platform).map(|v| v.id.clone());
        let Some(version_id) = version_id else {
            return Ok(0);
        };

        let violations = self.backend.get_violations(&version_id).await?;
        let count = violations.len();
        debug!(%platform, version_id = %version_id, count, "guardrail violations refreshed");
        store.lock().set_guardrail_violations(platform, violations);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::api::fake::FakeBackend;
    use crate::models::fixtures::{version, violation};
    use crate::notify::{NoticeLevel, drain};

    async fn wait_until(cond: impl Fn() -> bool) {
        while !cond() {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn empty_violations_show_passed_placeholder() {
        let rows = checklist(&[]);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.state == CheckState::Passed && !r.fixable));
        assert_eq!(rows[0].label, PASSED_CHECKS[0]);
    }

    #[test]
    fn one_row_per_violation_with_fix_flag() {
        let mut error = violation("v2", false);
        error.severity = Severity::Error;
        let rows = checklist(&[violation("v1", true), error]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].violation_id.as_deref(), Some("v1"));
        assert!(rows[0].fixable);
        assert_eq!(rows[0].state, CheckState::Failed(Severity::Warning));
        assert!(!rows[1].fixable);
        assert_eq!(rows[1].state, CheckState::Failed(Severity::Error));
        assert_eq!(rows[1].label, "violation v2");
    }

    #[tokio::test]
    async fn fixes_track_in_flight_state_per_violation() {
        let backend = Arc::new(FakeBackend::default());
        let gate_v1 = backend.gate_fix("v1");
        let gate_v2 = backend.gate_fix("v2");
        let (notifier, _rx) = Notifier::channel();
        let fixer = GuardrailFixer::new(backend.clone(), notifier);

        let f = fixer.clone();
        let v2 = tokio::spawn(async move { f.fix("v2").await });
        wait_until(|| fixer.is_fixing("v2")).await;

        let f = fixer.clone();
        let v1 = tokio::spawn(async move { f.fix("v1").await });
        wait_until(|| fixer.is_fixing("v1")).await;

        assert!(fixer.is_fixing("v1"));
        assert!(fixer.is_fixing("v2"));

        gate_v1.notify_one();
        assert_eq!(v1.await.unwrap(), FixOutcome::Requested);
        assert!(!fixer.is_fixing("v1"));
        assert!(fixer.is_fixing("v2"));

        gate_v2.notify_one();
        assert_eq!(v2.await.unwrap(), FixOutcome::Requested);
        assert!(!fixer.is_fixing("v2"));
    }

    #[tokio::test]
    async fn same_violation_is_not_fixed_twice_concurrently() {
        let backend = Arc::new(FakeBackend::default());
        let gate = backend.gate_fix("v1");
        let (notifier, _rx) = Notifier::channel();
        let fixer = GuardrailFixer::new(backend.clone(), notifier);

        let f = fixer.clone();
        let first = tokio::spawn(async move { f.fix("v1").await });
        wait_until(|| fixer.is_fixing("v1")).await;

        assert_eq!(fixer.fix("v1").await, FixOutcome::AlreadyInFlight);
        assert_eq!(backend.fixes.lock().unwrap().len(), 1);

        gate.notify_one();
        assert_eq!(first.await.unwrap(), FixOutcome::Requested);
    }

    #[tokio::test]
    async fn failed_fix_clears_marker_and_reports() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail_fixes.store(true, Ordering::SeqCst);
        let (notifier, mut rx) = Notifier::channel();
        let fixer = GuardrailFixer::new(backend, notifier);

        assert_eq!(fixer.fix("v1").await, FixOutcome::Failed);
        assert!(!fixer.is_fixing("v1"));
        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn successful_fix_leaves_violations_until_refresh() {
        let backend = Arc::new(FakeBackend::default());
        let (notifier, _rx) = Notifier::channel();
        let fixer = GuardrailFixer::new(backend.clone(), notifier);

        let store = SharedStore::new();
        store
            .lock()
            .set_content_version(Platform::Twitter, Some(version(Platform::Twitter, "hi")));
        store
            .lock()
            .set_guardrail_violations(Platform::Twitter, vec![violation("v1", true)]);

        assert_eq!(fixer.fix("v1").await, FixOutcome::Requested);
        assert_eq!(store.lock().violations(Platform::Twitter).len(), 1);

        // Server resolved it; refreshing reflects that.
        backend.violations.lock().unwrap().insert("v-twitter".to_string(), vec![]);
        assert_eq!(fixer.refresh_violations(&store, Platform::Twitter).await.unwrap(), 0);
        assert!(store.lock().violations(Platform::Twitter).is_empty());
    }

    #[tokio::test]
    async fn refresh_without_version_changes_nothing() {
        let backend = Arc::new(FakeBackend::default());
        let (notifier, _rx) = Notifier::channel();
        let fixer = GuardrailFixer::new(backend, notifier);
        let store = SharedStore::new();
        store
            .lock()
            .set_guardrail_violations(Platform::Reel, vec![violation("v9", false)]);

        assert_eq!(fixer.refresh_violations(&store, Platform::Reel).await.unwrap(), 0);
        assert_eq!(store.lock().violations(Platform::Reel).len(), 1);
    }

    #[tokio::test]
    async fn fix_all_reports_every_violation() {
        let backend = Arc::new(FakeBackend::default());
        let (notifier, _rx) = Notifier::channel();
        let fixer = GuardrailFixer::new(backend.clone(), notifier);

        let mut outcomes = fixer
            .fix_all(vec!["a".to_string(), "b".to_string(), "c".to_string()], 2)
            .await;
        outcomes.sort_by(|x, y| x.0.cmp(&y.0));

        assert_eq!(
            outcomes,
            vec![
                ("a".to_string(), FixOutcome::Requested),
                ("b".to_string(), FixOutcome::Requested),
                ("c".to_string(), FixOutcome::Requested),
            ]
        );
        assert_eq!(backend.fixes.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn fix_all_skips_violations_already_in_flight() {
        let backend = Arc::new(FakeBackend::default());
        let gate = backend.gate_fix("a");
        let (notifier, _rx) = Notifier::channel();
        let fixer = GuardrailFixer::new(backend.clone(), notifier);

        let f = fixer.clone();
        let running = tokio::spawn(async move { f.fix("a").await });
        wait_until(|| fixer.is_fixing("a")).await;

        let mut outcomes = fixer.fix_all(vec!["a".to_string(), "b".to_string()], 4).await;
        outcomes.sort_by(|x, y| x.0.cmp(&y.0));
        assert_eq!(
            outcomes,
            vec![
                ("a".to_string(), FixOutcome::AlreadyInFlight),
                ("b".to_string(), FixOutcome::Requested),
            ]
        );

        gate.notify_one();
        assert_eq!(running.await.unwrap(), FixOutcome::Requested);
        assert_eq!(backend.fixes.lock().unwrap().len(), 2);
    }
}
