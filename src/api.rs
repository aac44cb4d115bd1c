use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::models::{
    GuardrailViolation, Integration, PublishOptions, QueueItem, QueueStatus, SessionDetails, VersionMetadata,
};

/// Operations of the content backend that the editor depends on.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get_session(&self, session_id: &str) -> Result<SessionDetails, ApiError>;

    /// Persist a version's editable fields: its content and platform metadata.
    async fn update_content_version(
        &self,
        version_id: &str,
        content: &str,
        metadata: &VersionMetadata,
    ) -> Result<(), ApiError>;

    /// Current guardrail evaluation of a version.
    async fn get_violations(&self, version_id: &str) -> Result<Vec<GuardrailViolation>, ApiError>;

    async fn auto_fix_violation(&self, violation_id: &str) -> Result<(), ApiError>;

    /// Submit a publish (or schedule) request. The queue item is created server-side.
    async fn publish(&self, session_id: &str, options: &PublishOptions) -> Result<(), ApiError>;

    async fn list_integrations(&self) -> Result<Vec<Integration>, ApiError>;

    async fn get_publish_queue(&self, status: Option<QueueStatus>) -> Result<Vec<QueueItem>, ApiError>;

    async fn retry_publish(&self, item_id: &str) -> Result<(), ApiError>;

    async fn cancel_publish(&self, item_id: &str) -> Result<(), ApiError>;
}

/// HTTP implementation of [`Backend`].
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl {
                url: base_url.to_string(),
                message: "not a base URL".to_string(),
            });
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| ApiError::InvalidToken)?;
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("draftdesk/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Http {
                url: base_url.to_string(),
                source: e,
            })?;

        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &ApiConfig) -> anyhow::Result<Self> {
        let timeout = humantime::parse_duration(&config.timeout)?;
        Ok(Self::new(&config.base_url, config.token.as_deref(), timeout)?)
    }

    /// Base URL plus `segments`, each percent-encoded as a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl {
                url: self.base_url.to_string(),
                message: "not a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        debug!(%method, url = %url, "backend request");
        self.http.request(method, url.clone())
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<String, ApiError> {
        let response = request.send().await.map_err(|e| ApiError::Http {
            url: url.to_string(),
            source: e,
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ApiError::Http {
            url: url.to_string(),
            source: e,
        })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status,
                body,
            });
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, url: &Url) -> Result<T, ApiError> {
        let body = self.send(request, url).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn get_session(&self, session_id: &str) -> Result<SessionDetails, ApiError> {
        let url = self.endpoint(&["sessions", session_id])?;
        self.send_json(self.request(Method::GET, &url), &url).await
    }

    async fn update_content_version(
        &self,
        version_id: &str,
        content: &str,
        metadata: &VersionMetadata,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&["versions", version_id])?;
        let request = self
            .request(Method::PATCH, &url)
            .json(&serde_json::json!({ "content": content, "metadata": metadata.to_json() }));
        self.send(request, &url).await.map(|_| ())
    }

    async fn get_violations(&self, version_id: &str) -> Result<Vec<GuardrailViolation>, ApiError> {
        let url = self.endpoint(&["versions", version_id, "violations"])?;
        self.send_json(self.request(Method::GET, &url), &url).await
    }

    async fn auto_fix_violation(&self, violation_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["violations", violation_id, "fix"])?;
        self.send(self.request(Method::POST, &url), &url).await.map(|_| ())
    }

    async fn publish(&self, session_id: &str, options: &PublishOptions) -> Result<(), ApiError> {
        let url = self.endpoint(&["sessions", session_id, "publish"])?;
        let request = self.request(Method::POST, &url).json(options);
        self.send(request, &url).await.map(|_| ())
    }

    async fn list_integrations(&self) -> Result<Vec<Integration>, ApiError> {
        let url = self.endpoint(&["integrations"])?;
        self.send_json(self.request(Method::GET, &url), &url).await
    }

    async fn get_publish_queue(&self, status: Option<QueueStatus>) -> Result<Vec<QueueItem>, ApiError> {
        let mut url = self.endpoint(&["publish-queue"])?;
        if let Some(s) = status {
            url.query_pairs_mut().append_pair("status", s.as_str());
        }
        self.send_json(self.request(Method::GET, &url), &url).await
    }

    async fn retry_publish(&self, item_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["publish-queue", item_id, "retry"])?;
        self.send(self.request(Method::POST, &url), &url).await.map(|_| ())
    }

    async fn cancel_publish(&self, item_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["publish-queue", item_id, "cancel"])?;
        self.send(self.request(Method::POST, &url), &url).await.map(|_| ())
    }
}

/// In-memory backend that records calls, for exercising the workflows without HTTP.
#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use tokio::sync::Notify;

    use super::*;

    #[derive(Default)]
    pub struct FakeBackend {
        pub details: Mutex<Option<SessionDetails>>,
        pub saves: Mutex<Vec<(String, String)>>,
        pub saved_metadata: Mutex<Vec<VersionMetadata>>,
        pub fail_saves: AtomicBool,
        pub save_gate: Mutex<Option<Arc<Notify>>>,
        pub violations: Mutex<HashMap<String, Vec<GuardrailViolation>>>,
        pub fixes: Mutex<Vec<String>>,
        pub fail_fixes: AtomicBool,
        pub fix_gates: Mutex<HashMap<String, Arc<Notify>>>,
        pub published: Mutex<Vec<(String, PublishOptions)>>,
        pub fail_publish: AtomicBool,
        pub integrations: Mutex<Vec<Integration>>,
        pub queue: Mutex<Vec<QueueItem>>,
        pub retried: Mutex<Vec<String>>,
        pub cancelled: Mutex<Vec<String>>,
    }

    fn failure(path: &str) -> ApiError {
        ApiError::Status {
            url: format!("fake://{path}"),
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".to_string(),
        }
    }

    impl FakeBackend {
        /// Make the next fix of `violation_id` wait until the returned handle is notified.
        pub fn gate_fix(&self, violation_id: &str) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            self.fix_gates
                .lock()
                .unwrap()
                .insert(violation_id.to_string(), gate.clone());
            gate
        }

        pub fn gate_saves(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.save_gate.lock().unwrap() = Some(gate.clone());
            gate
        }

        pub fn saves(&self) -> Vec<(String, String)> {
            self.saves.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn get_session(&self, session_id: &str) -> Result<SessionDetails, ApiError> {
            self.details
                .lock()
                .unwrap()
                .clone()
                .filter(|d| d.session.id == session_id)
                .ok_or_else(|| ApiError::Status {
                    url: format!("fake:///sessions/{session_id}"),
                    status: reqwest::StatusCode::NOT_FOUND,
                    body: "not found".to_string(),
                })
        }

        async fn update_content_version(
            &self,
            version_id: &str,
            content: &str,
            metadata: &VersionMetadata,
        ) -> Result<(), ApiError> {
            self.saves
                .lock()
                .unwrap()
                .push((version_id.to_string(), content.to_string()));
            self.saved_metadata.lock().unwrap().push(metadata.clone());
            let gate = self.save_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(failure("versions"));
            }
            Ok(())
        }

        async fn get_violations(&self, version_id: &str) -> Result<Vec<GuardrailViolation>, ApiError> {
            Ok(self
                .violations
                .lock()
                .unwrap()
                .get(version_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn auto_fix_violation(&self, violation_id: &str) -> Result<(), ApiError> {
            self.fixes.lock().unwrap().push(violation_id.to_string());
            let gate = self.fix_gates.lock().unwrap().get(violation_id).cloned();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if self.fail_fixes.load(Ordering::SeqCst) {
                return Err(failure("violations"));
            }
            Ok(())
        }

        async fn publish(&self, session_id: &str, options: &PublishOptions) -> Result<(), ApiError> {
            self.published
                .lock()
                .unwrap()
                .push((session_id.to_string(), options.clone()));
            if self.fail_publish.load(Ordering::SeqCst) {
                return Err(failure("publish"));
            }
            Ok(())
        }

        async fn list_integrations(&self) -> Result<Vec<Integration>, ApiError> {
            Ok(self.integrations.lock().unwrap().clone())
        }

        async fn get_publish_queue(&self, status: Option<QueueStatus>) -> Result<Vec<QueueItem>, ApiError> {
            Ok(self
                .queue
                .lock()
                .unwrap()
                .iter()
                .filter(|i| status.is_none_or(|s| i.status == s))
                .cloned()
                .collect())
        }

        async fn retry_publish(&self, item_id: &str) -> Result<(), ApiError> {
            self.retried.lock().unwrap().push(item_id.to_string());
            Ok(())
        }

        async fn cancel_publish(&self, item_id: &str) -> Result<(), ApiError> {
            if !self.queue.lock().unwrap().iter().any(|i| i.id == item_id) {
                return Err(failure("publish-queue"));
            }
            self.cancelled.lock().unwrap().push(item_id.to_string());
            Ok(())
        }
    }
}
