//! In-memory job backend with failure injection and call counters.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use jobgate::{BackendError, CreateOutcome, JobBackend, JobDraft, JobId, JobSnapshot, JobStatus};

/// Behaves like a well-formed backend unless told otherwise: creates add a
/// queued job to the listing, successful deletes remove it.
#[derive(Default)]
pub struct FakeBackend {
    snapshot: Mutex<Vec<JobSnapshot>>,
    fail_list: AtomicBool,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
    accept_without_id: AtomicBool,
    next_id: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    list_gate: Mutex<Option<Arc<Semaphore>>>,
    delete_gate: Mutex<Option<Arc<Semaphore>>>,
    created: Mutex<Vec<JobDraft>>,
    deleted: Mutex<Vec<JobId>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_jobs(jobs: Vec<JobSnapshot>) -> Arc<Self> {
        let backend = Self::default();
        *backend.snapshot.lock().unwrap() = jobs;
        Arc::new(backend)
    }

    pub fn set_jobs(&self, jobs: Vec<JobSnapshot>) {
        *self.snapshot.lock().unwrap() = jobs;
    }

    pub fn set_status(&self, id: &str, status: JobStatus) {
        let mut jobs = self.snapshot.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id.as_str() == id) {
            job.status = status;
        }
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn accept_without_id(&self, accept: bool) {
        self.accept_without_id.store(accept, Ordering::SeqCst);
    }

    /// Makes every later `list_jobs` call wait for `release_lists`.
    pub fn hold_lists(&self) {
        *self.list_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_lists(&self, count: usize) {
        if let Some(gate) = self.list_gate.lock().unwrap().as_ref() {
            gate.add_permits(count);
        }
    }

    /// Makes every later `delete_job` call wait for `release_deletes`.
    pub fn hold_deletes(&self) {
        *self.delete_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_deletes(&self, count: usize) {
        if let Some(gate) = self.delete_gate.lock().unwrap().as_ref() {
            gate.add_permits(count);
        }
    }

    pub fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<JobDraft> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<JobId> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobBackend for FakeBackend {
    async fn list_jobs(&self) -> Result<Vec<JobSnapshot>, BackendError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.list_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .expect("list gate closed")
                .forget();
        }

        if self.fail_list.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("connection refused".to_string()));
        }
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn create_job(&self, draft: &JobDraft) -> Result<CreateOutcome, BackendError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 500,
                body: "create failed".to_string(),
            });
        }
        self.created.lock().unwrap().push(draft.clone());

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = JobId::new(format!("job-{}", n));
        self.snapshot.lock().unwrap().push(JobSnapshot {
            id: id.clone(),
            kind: draft.kind.clone(),
            status: JobStatus::Queued,
            priority: draft.priority,
            created_at: None,
            finished_at: None,
        });

        if self.accept_without_id.load(Ordering::SeqCst) {
            Ok(CreateOutcome::Accepted)
        } else {
            Ok(CreateOutcome::Created { id })
        }
    }

    async fn delete_job(&self, id: &JobId) -> Result<(), BackendError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.delete_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .expect("delete gate closed")
                .forget();
        }

        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 503,
                body: "delete failed".to_string(),
            });
        }
        self.deleted.lock().unwrap().push(id.clone());
        self.snapshot.lock().unwrap().retain(|job| &job.id != id);
        Ok(())
    }
}
