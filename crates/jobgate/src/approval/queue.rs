//! Pending approval requests and their expiry.
//!
//! Every request ends in exactly one of approved, denied or expired.
//! All three paths take the same lock and remove the request, so the
//! first one in wins and the others see `None`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use super::request::{
    ApprovalId, ApprovalRequest, ApprovalRequestInput, Expiration, Resolution, ResolvedRequest,
};
use crate::error::ApprovalError;
use crate::jobs::JobId;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApprovalEvent {
    Raised { request: ApprovalRequest },
    Resolved { resolved: ResolvedRequest },
}

#[derive(Default)]
struct QueueState {
    pending: HashMap<ApprovalId, ApprovalRequest>,
    next_seq: u64,
}

pub struct ApprovalQueue {
    state: Mutex<QueueState>,
    default_expiration: Expiration,
    events: broadcast::Sender<ApprovalEvent>,
}

impl ApprovalQueue {
    pub fn new(default_expiration: Expiration, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            state: Mutex::new(QueueState::default()),
            default_expiration,
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Approval queue lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ApprovalEvent> {
        self.events.subscribe()
    }

    pub fn default_expiration(&self) -> Expiration {
        self.default_expiration
    }

    /// Admits a new pending request created now.
    pub fn raise(&self, input: ApprovalRequestInput) -> Result<ApprovalId, ApprovalError> {
        self.raise_at(input, Utc::now())
    }

    /// Admits a new pending request created at `now`.
    pub fn raise_at(
        &self,
        input: ApprovalRequestInput,
        now: DateTime<Utc>,
    ) -> Result<ApprovalId, ApprovalError> {
        if input.description.trim().is_empty() {
            return Err(ApprovalError::EmptyDescription);
        }
        let expiration = input.expiration.unwrap_or(self.default_expiration);
        if let Expiration::After(window) = expiration {
            if !expiration.is_valid() {
                return Err(ApprovalError::InvalidExpiration {
                    seconds: window.num_seconds(),
                });
            }
        }
        let expires_at = expiration.deadline(now)?;

        let request = {
            let mut state = self.lock();
            let seq = state.next_seq;
            state.next_seq += 1;

            let request = ApprovalRequest {
                id: ApprovalId::generate(),
                description: input.description,
                requested_by: input.requested_by,
                priority: input.priority,
                created_at: now,
                expires_at,
                linked_job_id: input.linked_job_id,
                job_draft: input.job_draft,
                seq,
            };
            state.pending.insert(request.id.clone(), request.clone());
            request
        };

        log::info!(
            "Approval {} raised ({:?}): {}",
            request.id,
            request.priority,
            request.description
        );
        let id = request.id.clone();
        let _ = self.events.send(ApprovalEvent::Raised { request });
        Ok(id)
    }

    fn resolve(&self, id: &ApprovalId, resolution: Resolution) -> Option<ResolvedRequest> {
        let now = Utc::now();
        let removed = {
            let mut state = self.lock();
            match state.pending.get(id) {
                // Overdue requests only leave through `tick`, which owns the
                // expiry cleanup.
                Some(request) if request.is_expired_at(now) => {
                    log::debug!("Approval {} is past its deadline, ignoring {}", id, resolution);
                    return None;
                }
                Some(_) => state.pending.remove(id),
                None => None,
            }
        };
        let Some(request) = removed else {
            log::debug!(
                "Approval {} already resolved or unknown, ignoring {}",
                id,
                resolution
            );
            return None;
        };

        let resolved = ResolvedRequest {
            request,
            resolution,
            resolved_at: now,
        };
        log::info!("Approval {} {}", id, resolution);
        let _ = self.events.send(ApprovalEvent::Resolved {
            resolved: resolved.clone(),
        });
        Some(resolved)
    }

    /// Resolves a pending request as approved. `None` means someone else
    /// already resolved it.
    pub fn approve(&self, id: &ApprovalId) -> Option<ResolvedRequest> {
        self.resolve(id, Resolution::Approved)
    }

    /// Resolves a pending request as denied. `None` means someone else
    /// already resolved it.
    pub fn deny(&self, id: &ApprovalId) -> Option<ResolvedRequest> {
        self.resolve(id, Resolution::Denied)
    }

    /// Removes every request whose deadline is at or before `now`,
    /// earliest deadline first.
    pub fn tick(&self, now: DateTime<Utc>) -> Vec<ResolvedRequest> {
        let mut expired: Vec<ApprovalRequest> = {
            let mut state = self.lock();
            let due: Vec<ApprovalId> = state
                .pending
                .values()
                .filter(|request| request.is_expired_at(now))
                .map(|request| request.id.clone())
                .collect();
            due.iter()
                .filter_map(|id| state.pending.remove(id))
                .collect()
        };
        expired.sort_by_key(|request| (request.expires_at, request.seq));

        let resolved: Vec<ResolvedRequest> = expired
            .into_iter()
            .map(|request| ResolvedRequest {
                request,
                resolution: Resolution::Expired,
                resolved_at: now,
            })
            .collect();

        for item in &resolved {
            log::info!("Approval {} expired", item.id());
            let _ = self.events.send(ApprovalEvent::Resolved {
                resolved: item.clone(),
            });
        }
        resolved
    }

    /// Pending requests, highest priority first, oldest first within a
    /// priority.
    pub fn list(&self) -> Vec<ApprovalRequest> {
        let mut requests: Vec<ApprovalRequest> = self.lock().pending.values().cloned().collect();
        requests.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.seq.cmp(&b.seq))
        });
        requests
    }

    pub fn get(&self, id: &ApprovalId) -> Option<ApprovalRequest> {
        self.lock().pending.get(id).cloned()
    }

    /// Every pending request gating `job_id`, oldest first.
    pub fn pending_for_job(&self, job_id: &JobId) -> Vec<ApprovalId> {
        let state = self.lock();
        let mut linked: Vec<&ApprovalRequest> = state
            .pending
            .values()
            .filter(|request| request.linked_job_id.as_ref() == Some(job_id))
            .collect();
        linked.sort_by_key(|request| request.seq);
        linked.into_iter().map(|request| request.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ApprovalQueue {
    fn default() -> Self {
        Self::new(Expiration::default(), 100)
    }
}
