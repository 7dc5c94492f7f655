use std::time::Duration;

use serde::Deserialize;

use crate::services::poller::PollOptions;

#[derive(Debug, Deserialize)]
pub struct TrackerConfig {
    /// Hosted backend base URL (job store REST interface and edge functions)
    pub backend_url: String,

    /// Backend API key, sent as `apikey` and bearer token
    pub backend_api_key: String,

    /// Secondary pipeline endpoint used when the primary is unreachable
    #[serde(default)]
    pub fallback_pipeline_url: Option<String>,

    /// Token for the secondary pipeline. Defaults to the backend API key.
    #[serde(default)]
    pub fallback_api_token: Option<String>,

    /// WebSocket base URL for pushed job changes. Polling only when unset.
    #[serde(default)]
    pub realtime_url: Option<String>,

    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Create synthetic jobs locally instead of contacting any backend
    #[serde(default)]
    pub offline_mode: bool,
}

fn default_poll_max_attempts() -> u32 {
    60
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Edge-function endpoint used as the primary submission path.
    pub fn primary_pipeline_url(&self) -> String {
        format!("{}/functions/v1", self.backend_url.trim_end_matches('/'))
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions {
            max_attempts: self.poll_max_attempts,
            interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
