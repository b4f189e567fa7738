//! Approval request types.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ApprovalError;
use crate::jobs::{JobDraft, JobId};

/// Default time a request stays pending.
pub const DEFAULT_EXPIRATION_SECS: i64 = 300;

/// Longest window a request may be given (ten years).
pub const MAX_EXPIRATION_SECS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalId(String);

impl ApprovalId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApprovalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Ordering is `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalPriority {
    Low,
    Medium,
    High,
}

/// How long a request may stay pending.
///
/// Serialized as a number of seconds or the string `"never"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    Never,
    After(Duration),
}

impl Expiration {
    /// Saturates at the largest representable window, which `raise` and
    /// config validation then reject.
    pub fn seconds(secs: i64) -> Self {
        let window = Duration::try_seconds(secs).unwrap_or(if secs < 0 {
            Duration::MIN
        } else {
            Duration::MAX
        });
        Expiration::After(window)
    }

    /// True for `Never` and for windows in `1..=MAX_EXPIRATION_SECS` seconds.
    pub fn is_valid(&self) -> bool {
        match self {
            Expiration::Never => true,
            Expiration::After(window) => {
                *window > Duration::zero() && window.num_seconds() <= MAX_EXPIRATION_SECS
            }
        }
    }

    /// Absolute deadline for a request created at `created_at`.
    pub fn deadline(
        &self,
        created_at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, ApprovalError> {
        match self {
            Expiration::Never => Ok(None),
            Expiration::After(window) => created_at
                .checked_add_signed(*window)
                .map(Some)
                .ok_or(ApprovalError::InvalidExpiration {
                    seconds: window.num_seconds(),
                }),
        }
    }
}

impl Default for Expiration {
    fn default() -> Self {
        Expiration::seconds(DEFAULT_EXPIRATION_SECS)
    }
}

impl Serialize for Expiration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Expiration::Never => serializer.serialize_str("never"),
            Expiration::After(window) => serializer.serialize_i64(window.num_seconds()),
        }
    }
}

impl<'de> Deserialize<'de> for Expiration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawExpiration {
            Seconds(i64),
            Word(String),
        }

        match RawExpiration::deserialize(deserializer)? {
            RawExpiration::Seconds(secs) => Duration::try_seconds(secs)
                .map(Expiration::After)
                .ok_or_else(|| {
                    serde::de::Error::custom(format!("expiration of {}s is out of range", secs))
                }),
            RawExpiration::Word(word) if word.eq_ignore_ascii_case("never") => {
                Ok(Expiration::Never)
            }
            RawExpiration::Word(word) => Err(serde::de::Error::custom(format!(
                "expected seconds or \"never\", got '{}'",
                word
            ))),
        }
    }
}

/// What a caller supplies to raise a request.
#[derive(Debug, Clone)]
pub struct ApprovalRequestInput {
    pub description: String,
    pub requested_by: String,
    pub priority: ApprovalPriority,
    /// `None` uses the queue's default window.
    pub expiration: Option<Expiration>,
    pub linked_job_id: Option<JobId>,
    /// Job to create once approved.
    pub job_draft: Option<JobDraft>,
}

impl ApprovalRequestInput {
    pub fn new(description: impl Into<String>, priority: ApprovalPriority) -> Self {
        Self {
            description: description.into(),
            requested_by: String::new(),
            priority,
            expiration: None,
            linked_job_id: None,
            job_draft: None,
        }
    }

    pub fn requested_by(mut self, requested_by: impl Into<String>) -> Self {
        self.requested_by = requested_by.into();
        self
    }

    pub fn expires(mut self, expiration: Expiration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn linked_to(mut self, job_id: JobId) -> Self {
        self.linked_job_id = Some(job_id);
        self
    }

    pub fn with_job_draft(mut self, draft: JobDraft) -> Self {
        self.job_draft = Some(draft);
        self
    }
}

/// A pending request. Only the absolute deadline is stored; the countdown
/// is derived with [`ApprovalRequest::time_remaining`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: ApprovalId,
    pub description: String,
    pub requested_by: String,
    pub priority: ApprovalPriority,
    pub created_at: DateTime<Utc>,
    /// `None` means the request never expires.
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_draft: Option<JobDraft>,
    /// Admission order, used to break ties.
    #[serde(skip)]
    pub(crate) seq: u64,
}

impl ApprovalRequest {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }

    /// Time left before expiry, floored at zero. `None` if it never expires.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at
            .map(|deadline| (deadline - now).max(Duration::zero()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Approved,
    Denied,
    Expired,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Approved => write!(f, "approved"),
            Resolution::Denied => write!(f, "denied"),
            Resolution::Expired => write!(f, "expired"),
        }
    }
}

/// A request taken out of the queue, with how and when it was resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRequest {
    pub request: ApprovalRequest,
    pub resolution: Resolution,
    pub resolved_at: DateTime<Utc>,
}

impl ResolvedRequest {
    pub fn id(&self) -> &ApprovalId {
        &self.request.id
    }

    pub fn linked_job_id(&self) -> Option<&JobId> {
        self.request.linked_job_id.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(ApprovalPriority::High > ApprovalPriority::Medium);
        assert!(ApprovalPriority::Medium > ApprovalPriority::Low);
    }

    #[test]
    fn test_expiration_serde() {
        let never: Expiration = serde_json::from_str("\"never\"").unwrap();
        let secs: Expiration = serde_json::from_str("45").unwrap();

        assert_eq!(never, Expiration::Never);
        assert_eq!(secs, Expiration::seconds(45));
        assert_eq!(serde_json::to_string(&secs).unwrap(), "45");
        assert_eq!(serde_json::to_string(&never).unwrap(), "\"never\"");
        assert!(serde_json::from_str::<Expiration>("\"soon\"").is_err());
    }

    #[test]
    fn test_out_of_range_expiration_is_an_error() {
        let err = serde_json::from_str::<Expiration>("9223372036854775807").unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let huge = Expiration::seconds(i64::MAX);
        assert!(!huge.is_valid());
        assert!(!Expiration::seconds(MAX_EXPIRATION_SECS + 1).is_valid());
        assert!(Expiration::seconds(MAX_EXPIRATION_SECS).is_valid());
        assert!(Expiration::Never.is_valid());
    }

    #[test]
    fn test_deadline_overflow_is_an_error() {
        let window = Expiration::seconds(10_000_000_000_000);
        assert_eq!(
            window.deadline(Utc::now()),
            Err(ApprovalError::InvalidExpiration {
                seconds: 10_000_000_000_000
            })
        );
    }

    #[test]
    fn test_time_remaining_is_derived() {
        let created = Utc::now();
        let request = ApprovalRequest {
            id: ApprovalId::from("r1"),
            description: "Send newsletter".to_string(),
            requested_by: "email".to_string(),
            priority: ApprovalPriority::Medium,
            created_at: created,
            expires_at: Expiration::seconds(10).deadline(created).unwrap(),
            linked_job_id: None,
            job_draft: None,
            seq: 0,
        };

        assert_eq!(
            request.time_remaining(created + Duration::seconds(4)),
            Some(Duration::seconds(6))
        );
        assert_eq!(
            request.time_remaining(created + Duration::seconds(30)),
            Some(Duration::zero())
        );
        assert!(!request.is_expired_at(created + Duration::seconds(9)));
        assert!(request.is_expired_at(created + Duration::seconds(10)));
    }
}
