use serde::{Deserialize, Serialize};

use crate::approval::Expiration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub approvals: ApprovalConfig,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_page_size() -> usize {
    20
}

fn default_event_capacity() -> usize {
    100
}

impl GatewayConfig {
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend,
            poll: PollConfig::default(),
            approvals: ApprovalConfig::default(),
            page_size: default_page_size(),
            event_capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_jobs_path")]
    pub jobs_path: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_jobs_path() -> String {
    "/jobs".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            jobs_path: default_jobs_path(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    10
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Seconds until a pending request is dropped, or `"never"`.
    #[serde(default)]
    pub expiration: Expiration,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

fn default_tick_interval() -> u64 {
    1000
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            expiration: Expiration::default(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}
