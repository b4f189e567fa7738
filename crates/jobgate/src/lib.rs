//! Job lifecycle and approval gateway.
//!
//! Polls a job backend, reconciles each full snapshot into a local view
//! and gates job starts behind human approval requests that expire on
//! their own.

pub mod approval;
pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;
pub mod jobs;
pub mod poller;
pub mod telemetry;

pub use approval::{
    ApprovalId, ApprovalPriority, ApprovalQueue, ApprovalRequest, ApprovalRequestInput,
    Expiration, Resolution, ResolvedRequest,
};
pub use backend::{CreateOutcome, HttpJobBackend, JobBackend};
pub use config::{load_config, load_config_from_str, GatewayConfig};
pub use error::{ApprovalError, BackendError, ConfigError, GatewayError, JobgateError, Result};
pub use gateway::{ApproveOutcome, GatewayController, GatewayEvent, GatewayService, Notice};
pub use jobs::{Job, JobDraft, JobId, JobSnapshot, JobStatus, JobStore, JobView};
pub use poller::{PollOutcome, Poller};
pub use telemetry::{init_logging, LogFormat};
