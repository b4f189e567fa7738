//! Gateway event broadcasting.
//!
//! Components that care about job starts and stops (status indicators,
//! toasts) subscribe here instead of reaching into shared state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::approval::{ApprovalId, Resolution};
use crate::jobs::JobId;

/// A non-fatal, user-visible failure notice.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<ApprovalId>,
    pub timestamp: DateTime<Utc>,
}

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            job_id: None,
            approval_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn for_job(mut self, job_id: &JobId) -> Self {
        self.job_id = Some(job_id.clone());
        self
    }

    pub fn for_approval(mut self, approval_id: &ApprovalId) -> Self {
        self.approval_id = Some(approval_id.clone());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// An approved job was handed to the backend. `job_id` is `None` when
    /// the backend accepted it without returning an id.
    JobStarted {
        approval_id: ApprovalId,
        job_id: Option<JobId>,
    },
    JobStopped {
        job_id: JobId,
    },
    ApprovalResolved {
        approval_id: ApprovalId,
        resolution: Resolution,
        #[serde(skip_serializing_if = "Option::is_none")]
        linked_job_id: Option<JobId>,
    },
    Notice(Notice),
}

#[derive(Clone)]
pub struct GatewayBroadcaster {
    sender: broadcast::Sender<GatewayEvent>,
}

impl GatewayBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn send(&self, event: GatewayEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.sender.subscribe()
    }

    pub fn notice(&self, notice: Notice) {
        self.send(GatewayEvent::Notice(notice));
    }
}

impl Default for GatewayBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
