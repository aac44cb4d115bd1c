use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{info, warn};

use crate::api::Backend;
use crate::error::PublishError;
use crate::models::{
    ContentSession, Integration, IntegrationKind, IntegrationStatus, Platform, PlatformOptions, PlatformPublishOption,
    PublishOptions, Schedule, SessionStatus, WordpressStatus,
};
use crate::notify::Notifier;

/// Integration that has to be connected before a platform can be published to.
pub fn integration_key(platform: Platform) -> IntegrationKind {
    match platform {
        Platform::Article => IntegrationKind::Wordpress,
        Platform::Twitter => IntegrationKind::Twitter,
        Platform::LinkedIn => IntegrationKind::LinkedIn,
        Platform::Reel => IntegrationKind::Reel,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScheduleChoice {
    #[default]
    Now,
    /// Local date (`YYYY-MM-DD`) and time (`HH:MM`) as entered.
    Later { date: String, time: String },
}

impl ScheduleChoice {
    fn schedule(&self) -> Schedule {
        match self {
            ScheduleChoice::Now => Schedule::Now,
            ScheduleChoice::Later { .. } => Schedule::Later,
        }
    }

    /// `{date}T{time}` for later, nothing for now.
    pub fn scheduled_at(&self) -> Result<Option<String>, PublishError> {
        match self {
            ScheduleChoice::Now => Ok(None),
            ScheduleChoice::Later { date, time } => {
                NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map_err(|_| PublishError::InvalidSchedule(format!("date '{date}' is not YYYY-MM-DD")))?;
                NaiveTime::parse_from_str(time, "%H:%M")
                    .map_err(|_| PublishError::InvalidSchedule(format!("time '{time}' is not HH:MM")))?;
                Ok(Some(format!("{date}T{time}")))
            }
        }
    }
}

/// Local selections of the publish flow.
#[derive(Debug, Clone)]
pub struct PublishForm {
    platforms: Vec<Platform>,
    connected: HashMap<IntegrationKind, String>,
    enabled: BTreeSet<Platform>,
    pub wordpress_status: WordpressStatus,
    pub schedule: ScheduleChoice,
}

impl PublishForm {
    pub fn new(platforms: &[Platform], integrations: &[Integration]) -> Self {
        let mut form = Self {
            platforms: platforms.to_vec(),
            connected: HashMap::new(),
            enabled: BTreeSet::new(),
            wordpress_status: WordpressStatus::default(),
            schedule: ScheduleChoice::default(),
        };
        form.set_integrations(integrations);
        form
    }

    /// Refresh which integrations are connected. Selections are kept and re-checked on submit.
    pub fn set_integrations(&mut self, integrations: &[Integration]) {
        self.connected = integrations
            .iter()
            .filter(|i| i.status == IntegrationStatus::Connected)
            .map(|i| (i.kind, i.id.clone()))
            .collect();
    }

    pub fn is_selectable(&self, platform: Platform) -> bool {
        self.connected.contains_key(&integration_key(platform))
    }

    pub fn toggle(&mut self, platform: Platform, enabled: bool) -> Result<(), PublishError> {
        if !self.platforms.contains(&platform) {
            return Err(PublishError::PlatformNotInSession(platform));
        }
        if !enabled {
            self.enabled.remove(&platform);
            return Ok(());
        }
        if !self.is_selectable(platform) {
            return Err(PublishError::IntegrationNotConnected {
                platform,
                integration: integration_key(platform),
            });
        }
        self.enabled.insert(platform);
        Ok(())
    }

    pub fn enabled(&self) -> impl Iterator<Item = Platform> + '_ {
        self.enabled.iter().copied()
    }

    /// Check that `platforms` is non-empty and every one has a connected integration.
    fn check_targets(&self, platforms: impl IntoIterator<Item = Platform>) -> Result<(), PublishError> {
        let mut any = false;
        for platform in platforms {
            any = true;
            if !self.is_selectable(platform) {
                return Err(PublishError::IntegrationNotConnected {
                    platform,
                    integration: integration_key(platform),
                });
            }
        }
        if !any {
            return Err(PublishError::NoPlatformsEnabled);
        }
        Ok(())
    }

    /// Check a payload built elsewhere against the connected integrations.
    pub fn check_options(&self, options: &PublishOptions) -> Result<(), PublishError> {
        self.check_targets(options.platforms.iter().filter(|p| p.enabled).map(|p| p.platform))
    }

    /// Validate the selections into a publish payload.
    pub fn build_options(&self) -> Result<PublishOptions, PublishError> {
        self.check_targets(self.enabled())?;
        let scheduled_at = self.schedule.scheduled_at()?;
        let article_enabled = self.enabled.contains(&Platform::Article);

        let platforms = self
            .platforms
            .iter()
            .map(|&platform| {
                let enabled = self.enabled.contains(&platform);
                let options = (enabled && platform == Platform::Article).then(|| PlatformOptions {
                    wordpress_status: Some(self.wordpress_status),
                });
                PlatformPublishOption {
                    platform,
                    enabled,
                    integration_id: self.connected.get(&integration_key(platform)).cloned(),
                    options,
                }
            })
            .collect();

        Ok(PublishOptions {
            platforms,
            schedule: self.schedule.schedule(),
            scheduled_at,
            wordpress_status: article_enabled.then_some(self.wordpress_status),
            metadata: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted,
    /// The backend rejected or never answered; the flow stays open for a retry.
    Failed,
}

/// One publish flow for a session: collect selections, submit, close on success.
///
/// Submitting takes `&mut self`, so a flow can never have two requests in flight.
pub struct PublishOrchestrator {
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    session_id: String,
    pub form: PublishForm,
    open: bool,
}

impl PublishOrchestrator {
    pub fn open(
        backend: Arc<dyn Backend>,
        notifier: Notifier,
        session: &ContentSession,
        integrations: &[Integration],
    ) -> Self {
        if !session.status.can_advance_to(SessionStatus::Published) {
            warn!(session_id = %session.id, status = ?session.status, "session was already published");
        }
        Self {
            backend,
            notifier,
            session_id: session.id.clone(),
            form: PublishForm::new(&session.platforms, integrations),
            open: true,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Validate the form and publish. Validation errors are returned before any request.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, PublishError> {
        let options = self.form.build_options()?;
        self.publish(options).await
    }

    /// Send a prepared payload. It must enable at least one platform, each
    /// with a connected integration; otherwise nothing is sent.
    pub async fn publish(&mut self, options: PublishOptions) -> Result<SubmitOutcome, PublishError> {
        self.form.check_options(&options)?;
        let platforms: Vec<Platform> = options.platforms.iter().filter(|p| p.enabled).map(|p| p.platform).collect();
        info!(session_id = %self.session_id, ?platforms, schedule = ?options.schedule, "submitting publish request");

        match self.backend.publish(&self.session_id, &options).await {
            Ok(()) => {
                self.open = false;
                let message = match &options.scheduled_at {
                    Some(at) => format!("Scheduled for {at}"),
                    None => "Publishing started".to_string(),
                };
                self.notifier.success(message);
                Ok(SubmitOutcome::Submitted)
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "publish request failed");
                self.notifier.error(format!("Failed to publish: {e}"));
                Ok(SubmitOutcome::Failed)
            }
        }
    }
}
