//! Builders for test fixtures.

use std::sync::Arc;

use jobgate::gateway::GatewayBroadcaster;
use jobgate::{
    ApprovalQueue, Expiration, GatewayController, JobDraft, JobId, JobSnapshot, JobStatus,
    JobStore,
};

use super::FakeBackend;

pub fn snap(id: &str, status: JobStatus) -> JobSnapshot {
    JobSnapshot {
        id: JobId::from(id),
        kind: "email_send".to_string(),
        status,
        priority: 1,
        created_at: None,
        finished_at: None,
    }
}

pub fn draft(kind: &str) -> JobDraft {
    JobDraft::new(kind)
        .with_priority(2)
        .with_input(serde_json::json!({"audience": "newsletter"}))
}

/// A controller over fresh store/queue instances and the given backend.
pub fn controller(backend: Arc<FakeBackend>) -> GatewayController {
    GatewayController::new(
        Arc::new(JobStore::default()),
        Arc::new(ApprovalQueue::new(Expiration::default(), 100)),
        backend,
        GatewayBroadcaster::default(),
    )
}

/// Polls the fake backend once into the controller's store.
pub async fn poll(controller: &GatewayController, backend: &FakeBackend) {
    use jobgate::JobBackend;
    let snapshot = backend.list_jobs().await.expect("fake listing failed");
    controller.store().reconcile(snapshot);
}
