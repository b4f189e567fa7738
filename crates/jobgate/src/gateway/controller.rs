//! Orchestration between the job store, the approval queue and the backend.
//!
//! The controller owns no jobs or requests. It reads both owners and calls
//! their operations, and it is the only place that turns an approval into a
//! backend write. Write failures come back as `Err` and as a
//! [`GatewayEvent::Notice`]; nothing is retried automatically.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use super::events::{GatewayBroadcaster, GatewayEvent, Notice};
use crate::approval::{
    ApprovalId, ApprovalPriority, ApprovalQueue, ApprovalRequestInput, ResolvedRequest,
};
use crate::backend::{CreateOutcome, JobBackend};
use crate::error::GatewayError;
use crate::jobs::{Job, JobDraft, JobId, JobStore};

const REQUESTED_BY: &str = "gateway";

/// What [`GatewayController::on_approve`] did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApproveOutcome {
    /// The gated job draft was sent to the backend.
    Created {
        approval: ResolvedRequest,
        create: CreateOutcome,
    },
    /// The request gated an existing job or no job at all; subscribers
    /// were told, no backend call was needed.
    Signalled { approval: ResolvedRequest },
    /// Someone else resolved this request first.
    AlreadyResolved,
}

pub struct GatewayController {
    store: Arc<JobStore>,
    approvals: Arc<ApprovalQueue>,
    backend: Arc<dyn JobBackend>,
    events: GatewayBroadcaster,
}

impl GatewayController {
    pub fn new(
        store: Arc<JobStore>,
        approvals: Arc<ApprovalQueue>,
        backend: Arc<dyn JobBackend>,
        events: GatewayBroadcaster,
    ) -> Self {
        Self {
            store,
            approvals,
            backend,
            events,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn approvals(&self) -> &Arc<ApprovalQueue> {
        &self.approvals
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    /// Raises an approval that creates `draft` once approved. The job does
    /// not exist until then.
    pub fn request_approval_for_job_start(
        &self,
        description: impl Into<String>,
        priority: ApprovalPriority,
        draft: JobDraft,
    ) -> Result<ApprovalId, GatewayError> {
        let input = ApprovalRequestInput::new(description, priority)
            .requested_by(REQUESTED_BY)
            .with_job_draft(draft);
        Ok(self.approvals.raise(input)?)
    }

    /// Raises an arbitrary approval, e.g. one gating an already created job.
    pub fn raise_approval(&self, input: ApprovalRequestInput) -> Result<ApprovalId, GatewayError> {
        Ok(self.approvals.raise(input)?)
    }

    fn announce_resolution(&self, resolved: &ResolvedRequest) {
        self.events.send(GatewayEvent::ApprovalResolved {
            approval_id: resolved.id().clone(),
            resolution: resolved.resolution,
            linked_job_id: resolved.linked_job_id().cloned(),
        });
    }

    /// Approves a request and starts the job it gates.
    pub async fn on_approve(&self, id: &ApprovalId) -> Result<ApproveOutcome, GatewayError> {
        let Some(approval) = self.approvals.approve(id) else {
            return Ok(ApproveOutcome::AlreadyResolved);
        };
        self.announce_resolution(&approval);

        let Some(draft) = approval.request.job_draft.clone() else {
            self.events.send(GatewayEvent::JobStarted {
                approval_id: id.clone(),
                job_id: approval.linked_job_id().cloned(),
            });
            return Ok(ApproveOutcome::Signalled { approval });
        };

        let create = match self.backend.create_job(&draft).await {
            Ok(create) => create,
            Err(e) => {
                log::error!("Failed to start job '{}' for approval {}: {}", draft.kind, id, e);
                self.events.notice(
                    Notice::new(format!("Could not start '{}': {}", draft.kind, e))
                        .for_approval(id),
                );
                return Err(e.into());
            }
        };

        let job_id = match &create {
            CreateOutcome::Created { id: job_id } => {
                self.store
                    .insert_created(Job::queued(job_id.clone(), &draft, Utc::now()));
                Some(job_id.clone())
            }
            CreateOutcome::Accepted => None,
        };
        log::info!(
            "Started job '{}' for approval {} (id: {})",
            draft.kind,
            id,
            job_id.as_ref().map(JobId::as_str).unwrap_or("pending")
        );
        self.events.send(GatewayEvent::JobStarted {
            approval_id: id.clone(),
            job_id,
        });

        Ok(ApproveOutcome::Created { approval, create })
    }

    /// Denies a request. Returns `None` if it was already resolved.
    pub async fn on_deny(&self, id: &ApprovalId) -> Result<Option<ResolvedRequest>, GatewayError> {
        let Some(denied) = self.approvals.deny(id) else {
            return Ok(None);
        };
        self.settle_unstarted(&denied).await?;
        Ok(Some(denied))
    }

    /// Handles a request the expiry clock took out of the queue.
    pub async fn on_expire(&self, expired: &ResolvedRequest) -> Result<(), GatewayError> {
        self.settle_unstarted(expired).await
    }

    /// Expires every request due at `now` and waits for each cleanup.
    pub async fn expire_due(&self, now: DateTime<Utc>) -> Vec<ResolvedRequest> {
        let expired = self.approvals.tick(now);
        for request in &expired {
            if let Err(e) = self.on_expire(request).await {
                log::error!("Cleanup after expiry of approval {} failed: {}", request.id(), e);
            }
        }
        expired
    }

    /// Expires every request due at `now` without waiting on the backend.
    ///
    /// Resolutions are announced and linked jobs hidden before returning;
    /// the backend deletes run on spawned tasks. Must be called from
    /// within a tokio runtime.
    pub fn expire_due_detached(self: &Arc<Self>, now: DateTime<Utc>) -> Vec<ResolvedRequest> {
        let expired = self.approvals.tick(now);
        for request in &expired {
            self.announce_resolution(request);
            let Some(job_id) = self.active_linked_job(request) else {
                continue;
            };
            if let Err(e) = self.store.apply_optimistic_removal(&job_id) {
                log::debug!("Skipping cleanup of job {}: {}", job_id, e);
                continue;
            }

            let controller = Arc::clone(self);
            let approval_id = request.id().clone();
            tokio::spawn(async move {
                if let Err(e) = controller.delete_removed(&job_id).await {
                    log::error!("Cleanup after expiry of approval {} failed: {}", approval_id, e);
                }
            });
        }
        expired
    }

    fn active_linked_job(&self, resolved: &ResolvedRequest) -> Option<JobId> {
        let job_id = resolved.linked_job_id()?;
        if self.store.get(job_id).is_some_and(|job| job.is_active()) {
            Some(job_id.clone())
        } else {
            log::debug!(
                "Job {} linked to approval {} is not active",
                job_id,
                resolved.id()
            );
            None
        }
    }

    /// A denied or expired request never starts anything. A job created
    /// ahead of the decision is cancelled.
    async fn settle_unstarted(&self, resolved: &ResolvedRequest) -> Result<(), GatewayError> {
        self.announce_resolution(resolved);

        match self.active_linked_job(resolved) {
            Some(job_id) => self.remove_job(&job_id).await,
            None => Ok(()),
        }
    }

    /// Cancels a job and denies every approval still pending for it.
    pub async fn cancel_job(&self, job_id: &JobId) -> Result<(), GatewayError> {
        self.store.apply_optimistic_removal(job_id)?;

        // Resolve before awaiting the backend so a stale UI cannot approve them.
        for approval_id in self.approvals.pending_for_job(job_id) {
            if let Some(denied) = self.approvals.deny(&approval_id) {
                self.announce_resolution(&denied);
            }
        }

        self.delete_removed(job_id).await
    }

    async fn remove_job(&self, job_id: &JobId) -> Result<(), GatewayError> {
        self.store.apply_optimistic_removal(job_id)?;
        self.delete_removed(job_id).await
    }

    async fn delete_removed(&self, job_id: &JobId) -> Result<(), GatewayError> {
        match self.backend.delete_job(job_id).await {
            Ok(()) => {
                self.store.confirm_removal(job_id);
                log::info!("Cancelled job {}", job_id);
                self.events.send(GatewayEvent::JobStopped {
                    job_id: job_id.clone(),
                });
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to cancel job {}: {}", job_id, e);
                self.store.rollback_removal(job_id);
                self.events
                    .notice(Notice::new(format!("Could not cancel job: {}", e)).for_job(job_id));
                Err(e.into())
            }
        }
    }
}
