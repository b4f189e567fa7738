//! Shared job store: the single owner of job state.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::GatewayError;
use crate::jobs::model::{Job, JobId, JobSnapshot, JobStatus};
use crate::jobs::view::{JobView, ReconcileReport};

/// Changes published to store subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobStoreEvent {
    Reconciled {
        active: usize,
        completed: usize,
        report: ReconcileReport,
    },
    Removed {
        job_id: JobId,
    },
    Restored {
        job_id: JobId,
    },
    Inserted {
        job_id: JobId,
    },
}

/// Outcome of [`JobStore::reconcile`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    pub active: Vec<Job>,
    pub completed: Vec<Job>,
    pub report: ReconcileReport,
}

/// Holds the authoritative local view of jobs.
///
/// Reads and writes go through a `std::sync::RwLock`; nothing here waits
/// on I/O, so UI reads never block on the network.
pub struct JobStore {
    view: RwLock<JobView>,
    events: Arc<broadcast::Sender<JobStoreEvent>>,
}

impl JobStore {
    /// Creates an empty store whose event channel buffers `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            view: RwLock::new(JobView::new()),
            events: Arc::new(sender),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, JobView> {
        match self.view.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, JobView> {
        match self.view.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn publish(&self, event: JobStoreEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobStoreEvent> {
        self.events.subscribe()
    }

    /// Replaces the derived state with one built from a full snapshot.
    pub fn reconcile(&self, snapshot: Vec<JobSnapshot>) -> ReconcileResult {
        let result = {
            let mut view = self.write();
            let (next, report) = view.reconcile(snapshot);
            *view = next;
            ReconcileResult {
                active: view.active().to_vec(),
                completed: view.completed().to_vec(),
                report,
            }
        };

        if !result.report.restored.is_empty() {
            log::info!(
                "Restored {} job(s) still listed after optimistic removal",
                result.report.restored.len()
            );
        }
        for job_id in &result.report.restored {
            self.publish(JobStoreEvent::Restored {
                job_id: job_id.clone(),
            });
        }
        self.publish(JobStoreEvent::Reconciled {
            active: result.active.len(),
            completed: result.completed.len(),
            report: result.report.clone(),
        });

        result
    }

    /// Removes a job from `active` before the backend confirms deletion.
    pub fn apply_optimistic_removal(&self, id: &JobId) -> Result<Job, GatewayError> {
        let job = self.write().remove_optimistically(id)?;
        log::debug!("Optimistically removed job {}", id);
        self.publish(JobStoreEvent::Removed { job_id: id.clone() });
        Ok(job)
    }

    /// Restores an optimistically removed job after a failed delete.
    ///
    /// Returns `None` when a reconcile already settled the removal.
    pub fn rollback_removal(&self, id: &JobId) -> Option<Job> {
        let restored = self.write().rollback_removal(id);
        match &restored {
            Some(_) => {
                log::info!("Rolled back optimistic removal of job {}", id);
                self.publish(JobStoreEvent::Restored { job_id: id.clone() });
            }
            None => log::debug!("No pending removal to roll back for job {}", id),
        }
        restored
    }

    /// Clears the removal marker once the backend accepted the delete.
    pub fn confirm_removal(&self, id: &JobId) -> bool {
        self.write().confirm_removal(id)
    }

    /// Inserts a job returned synchronously by a create call.
    pub fn insert_created(&self, job: Job) -> bool {
        let job_id = job.id.clone();
        let inserted = self.write().insert(job);
        if inserted {
            self.publish(JobStoreEvent::Inserted { job_id });
        }
        inserted
    }

    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.read().get(id).cloned()
    }

    pub fn active(&self) -> Vec<Job> {
        self.read().active().to_vec()
    }

    pub fn completed(&self) -> Vec<Job> {
        self.read().completed().to_vec()
    }

    pub fn page(&self, offset: usize, limit: usize) -> Vec<Job> {
        self.read().page(offset, limit).to_vec()
    }

    pub fn is_pending_removal(&self, id: &JobId) -> bool {
        self.read().is_pending_removal(id)
    }

    /// Returns (active, succeeded, failed) counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        let view = self.read();
        let succeeded = view
            .completed()
            .iter()
            .filter(|j| j.status == JobStatus::Succeeded)
            .count();
        (
            view.active().len(),
            succeeded,
            view.completed().len() - succeeded,
        )
    }

    /// Cloned copy of the whole view.
    pub fn view(&self) -> JobView {
        self.read().clone()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(id: &str, status: JobStatus) -> JobSnapshot {
        JobSnapshot {
            id: JobId::from(id),
            kind: "social_post".to_string(),
            status,
            priority: 0,
            created_at: None,
            finished_at: None,
        }
    }

    #[test]
    fn test_store_creation() {
        let store = JobStore::default();
        assert!(store.active().is_empty());
        assert_eq!(store.counts(), (0, 0, 0));
    }

    #[test]
    fn test_reconcile_result_and_counts() {
        let store = JobStore::default();
        let result = store.reconcile(vec![
            snap("a", JobStatus::Running),
            snap("b", JobStatus::Succeeded),
            snap("c", JobStatus::Failed),
            snap("d", JobStatus::Queued),
        ]);

        assert_eq!(result.active.len(), 2);
        assert_eq!(result.completed.len(), 2);
        assert_eq!(store.counts(), (2, 1, 1));
        assert_eq!(
            store.get(&JobId::from("b")).map(|j| j.status),
            Some(JobStatus::Succeeded)
        );
    }

    #[test]
    fn test_events_for_removal_and_rollback() {
        let store = JobStore::default();
        store.reconcile(vec![snap("7", JobStatus::Running)]);
        let mut rx = store.subscribe();

        store.apply_optimistic_removal(&JobId::from("7")).unwrap();
        assert!(store.active().is_empty());
        assert!(store.is_pending_removal(&JobId::from("7")));
        store.rollback_removal(&JobId::from("7")).unwrap();

        assert!(matches!(
            rx.try_recv().unwrap(),
            JobStoreEvent::Removed { job_id } if job_id.as_str() == "7"
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            JobStoreEvent::Restored { job_id } if job_id.as_str() == "7"
        ));
        assert_eq!(store.active().len(), 1);
    }

    #[test]
    fn test_reconcile_publishes_restored_for_listed_pending_id() {
        let store = JobStore::default();
        store.reconcile(vec![snap("7", JobStatus::Running)]);
        store.apply_optimistic_removal(&JobId::from("7")).unwrap();
        let mut rx = store.subscribe();

        store.reconcile(vec![snap("7", JobStatus::Running)]);

        assert!(matches!(rx.try_recv().unwrap(), JobStoreEvent::Restored { .. }));
        assert!(matches!(rx.try_recv().unwrap(), JobStoreEvent::Reconciled { active: 1, .. }));
        assert!(store.rollback_removal(&JobId::from("7")).is_none());
        assert_eq!(store.active().len(), 1);
    }

    #[test]
    fn test_insert_created_then_poll_keeps_single_copy() {
        let store = JobStore::default();
        let job = Job {
            id: JobId::from("n1"),
            kind: "email_send".to_string(),
            status: JobStatus::Queued,
            priority: 0,
            created_at: None,
            finished_at: None,
        };
        assert!(store.insert_created(job.clone()));
        assert!(!store.insert_created(job));

        store.reconcile(vec![snap("n1", JobStatus::Running)]);
        let active = store.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].status, JobStatus::Running);
    }

    #[test]
    fn test_page_through_store() {
        let store = JobStore::default();
        store.reconcile(
            ["a", "b", "c"]
                .iter()
                .map(|id| snap(id, JobStatus::Queued))
                .collect(),
        );
        let first: Vec<_> = store.page(0, 2).into_iter().map(|j| j.id).collect();
        let second: Vec<_> = store.page(2, 2).into_iter().map(|j| j.id).collect();
        assert_eq!(first, vec![JobId::from("a"), JobId::from("b")]);
        assert_eq!(second, vec![JobId::from("c")]);
    }
}
