use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Soft per-tweet limit. Reported to the user, never enforced.
pub const TWEET_CHAR_LIMIT: usize = 280;

pub const MIN_SCENE_SECS: u32 = 1;
pub const MAX_SCENE_SECS: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Article,
    Twitter,
    LinkedIn,
    Reel,
}

impl Platform {
    pub const ALL: [Platform; 4] = [Platform::Article, Platform::Twitter, Platform::LinkedIn, Platform::Reel];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Article => "article",
            Platform::Twitter => "twitter",
            Platform::LinkedIn => "linkedin",
            Platform::Reel => "reel",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| format!("unknown platform '{s}' (expected article, twitter, linkedin or reel)"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Url,
    Topic,
    Keywords,
    Feed,
}

/// Seed value of a session: one string for url/topic, a list for keywords/feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Single(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idea,
    Questions,
    Drafts,
    Ready,
    Published,
}

impl SessionStatus {
    /// The stage that follows this one in the creation wizard.
    pub fn next(self) -> Option<Self> {
        match self {
            SessionStatus::Idea => Some(SessionStatus::Questions),
            SessionStatus::Questions => Some(SessionStatus::Drafts),
            SessionStatus::Drafts => Some(SessionStatus::Ready),
            SessionStatus::Ready => Some(SessionStatus::Published),
            SessionStatus::Published => None,
        }
    }

    /// Stages only move forward.
    pub fn can_advance_to(self, target: Self) -> bool {
        target > self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idea {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSession {
    pub id: String,
    pub title: String,
    pub input_type: InputType,
    pub input_value: InputValue,
    pub status: SessionStatus,
    #[serde(default)]
    pub current_step: u32,
    #[serde(default)]
    pub selected_idea_id: Option<String>,
    #[serde(default)]
    pub selected_idea: Option<Idea>,
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Draft,
    Ready,
    Published,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ArticleMetadata {
    pub meta_title: String,
    pub meta_description: String,
    pub focus_keyword: String,
    pub word_count: u32,
}

impl ArticleMetadata {
    pub fn refresh_word_count(&mut self, content: &str) {
        self.word_count = content.split_whitespace().count() as u32;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub content: String,
    pub order: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TwitterMetadata {
    pub tweets: Vec<Tweet>,
    pub hashtags: Vec<String>,
}

impl TwitterMetadata {
    /// Append a tweet at the end of the thread.
    pub fn add_tweet(&mut self, content: impl Into<String>) -> &Tweet {
        let order = self.tweets.len() as u32 + 1;
        self.tweets.push(Tweet {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            order,
        });
        &self.tweets[self.tweets.len() - 1]
    }

    /// Remove a tweet and renumber the rest from 1. A thread never drops below one tweet.
    pub fn delete_tweet(&mut self, id: &str) -> bool {
        if self.tweets.len() <= 1 || !self.tweets.iter().any(|t| t.id == id) {
            return false;
        }
        self.tweets.retain(|t| t.id != id);
        for (i, tweet) in self.tweets.iter_mut().enumerate() {
            tweet.order = i as u32 + 1;
        }
        true
    }

    pub fn over_limit(&self) -> Vec<&Tweet> {
        self.tweets
            .iter()
            .filter(|t| t.content.chars().count() > TWEET_CHAR_LIMIT)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct LinkedInMetadata {
    pub hashtags: Vec<String>,
    pub character_count: u32,
}

impl LinkedInMetadata {
    pub fn refresh_character_count(&mut self, content: &str) {
        self.character_count = content.chars().count() as u32;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    pub scene_number: u32,
    pub duration: u32,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub visual_notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ReelMetadata {
    pub scenes: Vec<Scene>,
    pub total_duration: u32,
}

impl ReelMetadata {
    /// Set a scene's duration (clamped to 1..=120s) and recompute the reel total.
    pub fn set_scene_duration(&mut self, scene_id: &str, secs: u32) -> bool {
        let Some(scene) = self.scenes.iter_mut().find(|s| s.id == scene_id) else {
            return false;
        };
        scene.duration = secs.clamp(MIN_SCENE_SECS, MAX_SCENE_SECS);
        self.total_duration = self.scenes.iter().map(|s| s.duration).sum();
        true
    }
}

/// Platform-specific metadata. The variant determines the version's platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionMetadata {
    Article(ArticleMetadata),
    Twitter(TwitterMetadata),
    LinkedIn(LinkedInMetadata),
    Reel(ReelMetadata),
}

impl VersionMetadata {
    pub fn empty(platform: Platform) -> Self {
        match platform {
            Platform::Article => VersionMetadata::Article(ArticleMetadata::default()),
            Platform::Twitter => VersionMetadata::Twitter(TwitterMetadata::default()),
            Platform::LinkedIn => VersionMetadata::LinkedIn(LinkedInMetadata::default()),
            Platform::Reel => VersionMetadata::Reel(ReelMetadata::default()),
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            VersionMetadata::Article(_) => Platform::Article,
            VersionMetadata::Twitter(_) => Platform::Twitter,
            VersionMetadata::LinkedIn(_) => Platform::LinkedIn,
            VersionMetadata::Reel(_) => Platform::Reel,
        }
    }

    /// Recompute the counters derived from the version's content.
    pub fn refresh_counts(&mut self, content: &str) {
        match self {
            VersionMetadata::Article(m) => m.refresh_word_count(content),
            VersionMetadata::LinkedIn(m) => m.refresh_character_count(content),
            VersionMetadata::Twitter(_) | VersionMetadata::Reel(_) => {}
        }
    }

    fn from_json(platform: Platform, value: Option<serde_json::Value>) -> Result<Self, serde_json::Error> {
        let value = match value {
            None | Some(serde_json::Value::Null) => return Ok(Self::empty(platform)),
            Some(v) => v,
        };
        Ok(match platform {
            Platform::Article => VersionMetadata::Article(serde_json::from_value(value)?),
            Platform::Twitter => VersionMetadata::Twitter(serde_json::from_value(value)?),
            Platform::LinkedIn => VersionMetadata::LinkedIn(serde_json::from_value(value)?),
            Platform::Reel => VersionMetadata::Reel(serde_json::from_value(value)?),
        })
    }

    pub fn to_json(&self) -> Option<serde_json::Value> {
        let value = match self {
            VersionMetadata::Article(m) => serde_json::to_value(m),
            VersionMetadata::Twitter(m) => serde_json::to_value(m),
            VersionMetadata::LinkedIn(m) => serde_json::to_value(m),
            VersionMetadata::Reel(m) => serde_json::to_value(m),
        };
        value.ok()
    }
}

/// One platform-specific draft of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ContentVersionWire", into = "ContentVersionWire")]
pub struct ContentVersion {
    pub id: String,
    pub session_id: String,
    pub content: String,
    pub metadata: VersionMetadata,
    pub status: VersionStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub published_to: Option<String>,
}

impl ContentVersion {
    pub fn platform(&self) -> Platform {
        self.metadata.platform()
    }
}

/// JSON shape of a version: a `platform` discriminator beside an untyped `metadata` object.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentVersionWire {
    id: String,
    session_id: String,
    platform: Platform,
    #[serde(default)]
    content: String,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
    status: VersionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    published_to: Option<String>,
}

impl TryFrom<ContentVersionWire> for ContentVersion {
    type Error = String;

    fn try_from(wire: ContentVersionWire) -> Result<Self, Self::Error> {
        let metadata = VersionMetadata::from_json(wire.platform, wire.metadata)
            .map_err(|e| format!("version {}: invalid {} metadata: {e}", wire.id, wire.platform))?;
        Ok(ContentVersion {
            id: wire.id,
            session_id: wire.session_id,
            content: wire.content,
            metadata,
            status: wire.status,
            published_at: wire.published_at,
            published_to: wire.published_to,
        })
    }
}

impl From<ContentVersion> for ContentVersionWire {
    fn from(version: ContentVersion) -> Self {
        ContentVersionWire {
            platform: version.platform(),
            metadata: version.metadata.to_json(),
            id: version.id,
            session_id: version.session_id,
            content: version.content,
            status: version.status,
            published_at: version.published_at,
            published_to: version.published_to,
        }
    }
}

/// Response of the session details endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionDetails {
    pub session: ContentSession,
    #[serde(default)]
    pub versions: Vec<ContentVersion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    CharacterLimit,
    MissingCta,
    WeakHook,
    NoHashtags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardrailViolation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ViolationType,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub can_auto_fix: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    Now,
    Later,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordpressStatus {
    #[default]
    Publish,
    Draft,
}

impl FromStr for WordpressStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "publish" => Ok(WordpressStatus::Publish),
            "draft" => Ok(WordpressStatus::Draft),
            other => Err(format!("unknown WordPress status '{other}' (expected publish or draft)")),
        }
    }
}

/// Recognized per-platform publish options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wordpress_status: Option<WordpressStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformPublishOption {
    pub platform: Platform,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<PlatformOptions>,
}

/// Publish request payload. Built fresh per publish action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOptions {
    pub platforms: Vec<PlatformPublishOption>,
    pub schedule: Schedule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wordpress_status: Option<WordpressStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationKind {
    Wordpress,
    Twitter,
    LinkedIn,
    Reel,
}

impl IntegrationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IntegrationKind::Wordpress => "wordpress",
            IntegrationKind::Twitter => "twitter",
            IntegrationKind::LinkedIn => "linkedin",
            IntegrationKind::Reel => "reel",
        }
    }
}

impl fmt::Display for IntegrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    Connected,
    Disconnected,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: IntegrationKind,
    #[serde(default)]
    pub name: String,
    pub status: IntegrationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Published,
    Failed,
    Cancelled,
}

impl QueueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Published => "published",
            QueueStatus::Failed => "failed",
            QueueStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "processing" => Ok(QueueStatus::Processing),
            "published" => Ok(QueueStatus::Published),
            "failed" => Ok(QueueStatus::Failed),
            "cancelled" => Ok(QueueStatus::Cancelled),
            other => Err(format!("unknown queue status '{other}'")),
        }
    }
}

/// Server-owned publish queue entry. Read-only on this side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: String,
    pub session_id: String,
    pub platform: Platform,
    pub status: QueueStatus,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub error: Option<String>,
}

impl QueueItem {
    pub fn can_retry(&self) -> bool {
        self.status == QueueStatus::Failed
    }

    pub fn can_cancel(&self) -> bool {
        self.status == QueueStatus::Pending
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn session(platforms: &[Platform]) -> ContentSession {
        let now = Utc::now();
        ContentSession {
            id: "s1".to_string(),
            title: "Launch post".to_string(),
            input_type: InputType::Topic,
            input_value: InputValue::Single("launch".to_string()),
            status: SessionStatus::Drafts,
            current_step: 3,
            selected_idea_id: None,
            selected_idea: None,
            answers: BTreeMap::new(),
            platforms: platforms.to_vec(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn version(platform: Platform, content: &str) -> ContentVersion {
        ContentVersion {
            id: format!("v-{platform}"),
            session_id: "s1".to_string(),
            content: content.to_string(),
            metadata: VersionMetadata::empty(platform),
            status: VersionStatus::Draft,
            published_at: None,
            published_to: None,
        }
    }

    pub fn violation(id: &str, can_auto_fix: bool) -> GuardrailViolation {
        GuardrailViolation {
            id: id.to_string(),
            kind: ViolationType::WeakHook,
            severity: Severity::Warning,
            message: format!("violation {id}"),
            can_auto_fix,
        }
    }
}
