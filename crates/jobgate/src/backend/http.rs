//! HTTP/JSON implementation of [`JobBackend`].

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use super::{CreateOutcome, JobBackend};
use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::jobs::{JobDraft, JobId, JobSnapshot};

/// Maximum length for error bodies kept in errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn sanitize_error_body(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() > MAX_ERROR_BODY_LENGTH {
        let truncated: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", truncated)
    } else {
        body.to_string()
    }
}

/// Listing bodies come either bare or wrapped in `{"jobs": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody {
    Bare(Vec<JobSnapshot>),
    Wrapped { jobs: Vec<JobSnapshot> },
}

#[derive(Deserialize)]
struct CreateBody {
    #[serde(default)]
    id: Option<JobId>,
}

fn parse_list_body(body: &str) -> Result<Vec<JobSnapshot>, BackendError> {
    match serde_json::from_str::<ListBody>(body) {
        Ok(ListBody::Bare(jobs)) | Ok(ListBody::Wrapped { jobs }) => Ok(jobs),
        Err(e) => Err(BackendError::Decode(e.to_string())),
    }
}

fn parse_create_body(status: StatusCode, body: &str) -> Result<CreateOutcome, BackendError> {
    if status == StatusCode::ACCEPTED || body.trim().is_empty() {
        return Ok(CreateOutcome::Accepted);
    }
    let parsed: CreateBody =
        serde_json::from_str(body).map_err(|e| BackendError::Decode(e.to_string()))?;
    Ok(match parsed.id {
        Some(id) => CreateOutcome::Created { id },
        None => CreateOutcome::Accepted,
    })
}

/// Talks to a REST job backend at `{base_url}{jobs_path}`.
pub struct HttpJobBackend {
    client: Client,
    jobs_url: Url,
}

impl HttpJobBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BackendError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        let raw = jobs_url(&config.base_url, &config.jobs_path);
        let jobs_url = Url::parse(&raw)
            .map_err(|e| BackendError::Transport(format!("Invalid jobs URL '{}': {}", raw, e)))?;

        Ok(Self { client, jobs_url })
    }

    pub fn jobs_url(&self) -> &str {
        self.jobs_url.as_str()
    }

    /// `{jobs_url}/{id}` with the id percent-encoded as one path segment.
    fn job_url(&self, id: &JobId) -> Result<Url, BackendError> {
        let mut url = self.jobs_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                BackendError::Transport(format!("Cannot append a job id to '{}'", self.jobs_url))
            })?
            .pop_if_empty()
            .push(id.as_str());
        Ok(url)
    }

    async fn error_for(response: reqwest::Response) -> BackendError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        BackendError::Status {
            status,
            body: sanitize_error_body(&body),
        }
    }
}

fn jobs_url(base_url: &str, jobs_path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        jobs_path.trim_matches('/')
    )
}

#[async_trait]
impl JobBackend for HttpJobBackend {
    async fn list_jobs(&self) -> Result<Vec<JobSnapshot>, BackendError> {
        let response = self.client.get(self.jobs_url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        let body = response.text().await?;
        let jobs = parse_list_body(&body)?;
        debug!("Fetched {} job(s) from {}", jobs.len(), self.jobs_url);
        Ok(jobs)
    }

    async fn create_job(&self, draft: &JobDraft) -> Result<CreateOutcome, BackendError> {
        let response = self.client.post(self.jobs_url.clone()).json(draft).send().await?;
        let status = response.status();
        if !status.is_success() {
            let err = Self::error_for(response).await;
            warn!("Create job '{}' failed: {}", draft.kind, err);
            return Err(err);
        }
        let body = response.text().await?;
        parse_create_body(status, &body)
    }

    async fn delete_job(&self, id: &JobId) -> Result<(), BackendError> {
        let response = self.client.delete(self.job_url(id)?).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Job {} already absent on backend", id);
            return Ok(());
        }
        if !status.is_success() {
            return Err(Self::error_for(response).await);
        }
        Ok(())
    }
}
