//! Pure reconciliation of backend snapshots into the local job view.
//!
//! [`JobView::reconcile`] is a function of (previous view, snapshot) and
//! never touches I/O, so the rules below can be tested without a backend:
//!
//! - `active` holds queued, running and paused jobs; `completed` holds
//!   every terminal job. The two never share an id.
//! - Both keep the order the backend listed them in.
//! - A job seen as terminal keeps that record, even if a stale listing
//!   reports it as running again. The record is forgotten only after the
//!   id has been missing from [`TERMINAL_RETENTION`] consecutive snapshots.
//! - An optimistic removal lasts until the next reconcile: if the id is
//!   still listed the job is restored, otherwise the removal is confirmed.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::GatewayError;
use crate::jobs::model::{Job, JobId, JobSnapshot};

/// Consecutive snapshots a terminal id may be missing from before its
/// record is dropped. About a day at the default 10s poll interval.
pub const TERMINAL_RETENTION: u32 = 8640;

#[derive(Debug, Clone, PartialEq)]
struct TerminalRecord {
    job: Job,
    /// Snapshots in a row that did not list this id.
    absent_for: u32,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingRemoval {
    job: Job,
    /// Position in `active` at removal time.
    index: usize,
}

/// Summary of what one reconcile changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Ids whose terminal status the backend tried to change.
    pub anomalies: Vec<JobId>,
    /// Optimistically removed ids that were still listed and came back.
    pub restored: Vec<JobId>,
    /// Optimistically removed ids whose absence confirmed the delete.
    pub confirmed: Vec<JobId>,
    /// Ids listed more than once; only the first entry is used.
    pub duplicates: Vec<JobId>,
}

/// Derived local state of all known jobs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobView {
    active: Vec<Job>,
    completed: Vec<Job>,
    terminal: HashMap<JobId, TerminalRecord>,
    pending_removal: HashMap<JobId, PendingRemoval>,
}

impl JobView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the next view from a full snapshot.
    pub fn reconcile(&self, snapshot: Vec<JobSnapshot>) -> (JobView, ReconcileReport) {
        let mut report = ReconcileReport::default();
        let mut terminal = self.terminal.clone();
        let mut active = Vec::new();
        let mut completed = Vec::new();
        let mut listed: HashSet<JobId> = HashSet::with_capacity(snapshot.len());

        for entry in snapshot {
            if !listed.insert(entry.id.clone()) {
                log::warn!("Job {} listed more than once in snapshot", entry.id);
                report.duplicates.push(entry.id);
                continue;
            }

            let job = match terminal.get_mut(&entry.id) {
                Some(record) => {
                    let known = &record.job;
                    if entry.status != known.status {
                        log::warn!(
                            "Job {} reported as {} after being observed {}; keeping {}",
                            entry.id,
                            entry.status,
                            known.status,
                            known.status
                        );
                        report.anomalies.push(entry.id.clone());
                    }
                    record.absent_for = 0;
                    record.job.clone()
                }
                None => {
                    let job = Job::from(entry);
                    if job.is_terminal() {
                        terminal.insert(
                            job.id.clone(),
                            TerminalRecord {
                                job: job.clone(),
                                absent_for: 0,
                            },
                        );
                    }
                    job
                }
            };

            if job.is_terminal() {
                completed.push(job);
            } else {
                active.push(job);
            }
        }

        terminal.retain(|id, record| {
            if listed.contains(id) {
                return true;
            }
            record.absent_for += 1;
            record.absent_for <= TERMINAL_RETENTION
        });

        for id in self.pending_removal.keys() {
            if listed.contains(id) {
                report.restored.push(id.clone());
            } else {
                report.confirmed.push(id.clone());
            }
        }
        report.restored.sort();
        report.confirmed.sort();

        let next = JobView {
            active,
            completed,
            terminal,
            pending_removal: HashMap::new(),
        };
        (next, report)
    }

    /// Hides an active job ahead of the backend confirming its deletion.
    pub fn remove_optimistically(&mut self, id: &JobId) -> Result<Job, GatewayError> {
        if self.pending_removal.contains_key(id) {
            return Err(GatewayError::AlreadyPendingRemoval(id.to_string()));
        }
        let index = self
            .active
            .iter()
            .position(|job| &job.id == id)
            .ok_or_else(|| GatewayError::JobNotFound(id.to_string()))?;

        let job = self.active.remove(index);
        self.pending_removal.insert(
            id.clone(),
            PendingRemoval {
                job: job.clone(),
                index,
            },
        );
        Ok(job)
    }

    /// Puts an optimistically removed job back where it was.
    ///
    /// Returns `None` if the removal was already settled, either by an
    /// earlier rollback or by a reconcile, so a job is never inserted twice.
    pub fn rollback_removal(&mut self, id: &JobId) -> Option<Job> {
        let pending = self.pending_removal.remove(id)?;
        let index = pending.index.min(self.active.len());
        self.active.insert(index, pending.job.clone());
        Some(pending.job)
    }

    /// Drops the removal marker after the backend acknowledged the delete.
    pub fn confirm_removal(&mut self, id: &JobId) -> bool {
        self.pending_removal.remove(id).is_some()
    }

    /// Adds a freshly created job. No-op if the id is already known.
    pub fn insert(&mut self, job: Job) -> bool {
        if self.contains(&job.id) || self.pending_removal.contains_key(&job.id) {
            return false;
        }
        if job.is_terminal() {
            self.terminal.insert(
                job.id.clone(),
                TerminalRecord {
                    job: job.clone(),
                    absent_for: 0,
                },
            );
            self.completed.push(job);
        } else {
            self.active.push(job);
        }
        true
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.active
            .iter()
            .chain(self.completed.iter())
            .find(|job| &job.id == id)
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.get(id).is_some()
    }

    pub fn active(&self) -> &[Job] {
        &self.active
    }

    pub fn completed(&self) -> &[Job] {
        &self.completed
    }

    /// Slice of `active` starting at `offset`; never re-sorted.
    pub fn page(&self, offset: usize, limit: usize) -> &[Job] {
        let start = offset.min(self.active.len());
        let end = start.saturating_add(limit).min(self.active.len());
        &self.active[start..end]
    }

    pub fn is_pending_removal(&self, id: &JobId) -> bool {
        self.pending_removal.contains_key(id)
    }
}
