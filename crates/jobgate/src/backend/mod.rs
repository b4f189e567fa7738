//! The job backend the gateway talks to.
//!
//! Only three calls are needed: a full listing, a create and a delete.
//! Implementations must return the complete job list on every call to
//! [`JobBackend::list_jobs`]; reconciliation treats it as a replacement,
//! never as a delta.

pub mod http;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::BackendError;
use crate::jobs::{JobDraft, JobId, JobSnapshot};

pub use http::HttpJobBackend;

/// How the backend answered a create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreateOutcome {
    /// The job exists and has this id.
    Created { id: JobId },
    /// Accepted without an id; the job shows up on a later poll.
    Accepted,
}

#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Fetches a full snapshot of all jobs.
    async fn list_jobs(&self) -> Result<Vec<JobSnapshot>, BackendError>;

    /// Asks the backend to create and start a job.
    async fn create_job(&self, draft: &JobDraft) -> Result<CreateOutcome, BackendError>;

    /// Asks the backend to delete (cancel) a job.
    async fn delete_job(&self, id: &JobId) -> Result<(), BackendError>;
}
