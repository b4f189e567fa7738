//! Human approval requests that gate job starts.

pub mod queue;
pub mod request;

pub use queue::{ApprovalEvent, ApprovalQueue};
pub use request::{
    ApprovalId, ApprovalPriority, ApprovalRequest, ApprovalRequestInput, Expiration, Resolution,
    ResolvedRequest, DEFAULT_EXPIRATION_SECS, MAX_EXPIRATION_SECS,
};
