use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub reconnect: ReconnectSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub advisor_id: Option<u64>,
    pub token: Option<String>,
    pub health_path: String,
    pub stream_path: String,
    pub list_path: String,
    /// Upper bound for one-shot requests (health, list, read). The push
    /// stream only uses it as a connect timeout.
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconnectSettings {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl ApiSettings {
    /// Joins `path` onto the configured base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("DIARY"),
            )
            .set_default("api.base_url", "http://localhost:8080")?
            .set_default("api.advisor_id", None::<u64>)?
            .set_default("api.token", None::<String>)?
            .set_default("api.health_path", "/health")?
            .set_default("api.stream_path", "/api/notification/stream")?
            .set_default("api.list_path", "/api/notification/all")?
            .set_default("api.request_timeout_ms", 10000)?
            .set_default("reconnect.base_delay_ms", 1000)?
            .set_default("reconnect.max_delay_ms", 30000)?
            .set_default("reconnect.max_attempts", 10)?
            .build()?;

        config.try_deserialize()
    }

    /// Settings pointing at `base_url` with every other key at its default.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiSettings {
                base_url: base_url.into(),
                advisor_id: None,
                token: None,
                health_path: "/health".to_string(),
                stream_path: "/api/notification/stream".to_string(),
                list_path: "/api/notification/all".to_string(),
                request_timeout_ms: 10000,
            },
            reconnect: ReconnectSettings::default(),
        }
    }
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            max_attempts: 10,
        }
    }
}
