//! Local job state derived from backend snapshots.

pub mod model;
pub mod store;
pub mod view;

pub use model::{Job, JobDraft, JobId, JobSnapshot, JobStatus};
pub use store::{JobStore, JobStoreEvent, ReconcileResult};
pub use view::{JobView, ReconcileReport, TERMINAL_RETENTION};
