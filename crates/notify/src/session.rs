use std::time::Duration;

use diary_config::Settings;
use diary_models::AdvisorId;
use reqwest::RequestBuilder;

use crate::error::ClientResult;

/// Explicit per-mount session: who is watching and how to reach the backend.
///
/// Cloning is cheap; the inner `reqwest::Client` shares its connection pool
/// and cookie store.
#[derive(Debug, Clone)]
pub struct Session {
    pub advisor_id: Option<AdvisorId>,
    settings: Settings,
    client: reqwest::Client,
}

impl Session {
    pub fn new(settings: Settings) -> ClientResult<Self> {
        // No client-wide timeout: it would also cut the long-lived push stream.
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .connect_timeout(Duration::from_millis(settings.api.request_timeout_ms))
            .build()?;
        Ok(Self::with_client(settings, client))
    }

    pub fn with_client(settings: Settings, client: reqwest::Client) -> Self {
        let advisor_id = settings.api.advisor_id.and_then(AdvisorId::new);
        Self {
            advisor_id,
            settings,
            client,
        }
    }

    pub fn with_advisor(mut self, advisor_id: Option<AdvisorId>) -> Self {
        self.advisor_id = advisor_id;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Per-request deadline for one-shot calls.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.api.request_timeout_ms)
    }

    pub fn url(&self, path: &str) -> String {
        self.settings.api.url(path)
    }

    /// Attaches the bearer token, if configured, to an outgoing request.
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.settings.api.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}
