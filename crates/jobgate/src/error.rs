use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobgateError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Approval error: {0}")]
    Approval(#[from] ApprovalError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Logging setup failed: {0}")]
    Telemetry(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Errors reported by a job backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Request to job backend failed: {0}")]
    Transport(String),

    #[error("Job backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode job backend response: {0}")]
    Decode(String),

    #[error("Invalid job backend response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Returns true if the failure is likely to clear up on a later poll.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Transport(_) => true,
            BackendError::Status { status, .. } => *status >= 500 || *status == 429,
            BackendError::Decode(_) | BackendError::InvalidResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("Expiration window must be between 1s and ten years, got {seconds}s")]
    InvalidExpiration { seconds: i64 },

    #[error("Approval description must not be empty")]
    EmptyDescription,
}

/// Write-path failures surfaced to the caller as a recoverable notice.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Approval(#[from] ApprovalError),

    #[error("Job '{0}' is not active")]
    JobNotFound(String),

    #[error("Job '{0}' already has a removal in flight")]
    AlreadyPendingRemoval(String),
}

pub type Result<T> = std::result::Result<T, JobgateError>;
