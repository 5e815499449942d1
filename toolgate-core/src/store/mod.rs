//! Grant storage.
//!
//! [`PermissionStore`] is the four-method contract every backend satisfies.
//! [`MemoryPermissionStore`] ships in this crate; a durable SQLite backend
//! lives in the `toolgate-sqlite` crate. Reads are lazily evicting: an
//! expired record is removed the moment it is observed, so callers never see
//! a stale grant even when no sweep is running.

mod memory;

pub use memory::MemoryPermissionStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::policy::Expiry;

/// Errors from grant store operations.
///
/// Store failures are never masked by the gating layer: there is no safe
/// default when the backend is down, so these surface to the host, which
/// owns the failure policy.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to read a grant from storage.
    #[error("failed to read grant: {0}")]
    Read(String),

    /// Failed to write a grant to storage.
    #[error("failed to write grant: {0}")]
    Write(String),

    /// IO error during storage operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A stored permission decision.
///
/// `granted: false` with no expiry is a standing denial that holds until the
/// record is explicitly removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionInfo {
    /// Whether the decision was an approval.
    pub granted: bool,

    /// Deadline after which the record is evicted on read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// When the decision was recorded.
    pub granted_at: DateTime<Utc>,

    /// Opaque caller-supplied annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl PermissionInfo {
    /// Build the record a `set` call should persist, interpreting the expiry
    /// token.
    ///
    /// Returns `None` for `once`: such decisions are never stored, so every
    /// call at that level re-prompts. An unrecognized token stores the
    /// record without an expiry and logs a warning; the write path stays
    /// total, and [`crate::SecurityPolicy::validate`] is where malformed
    /// tokens get rejected.
    pub fn from_spec(granted: bool, expiry_spec: Option<&str>, metadata: Option<Value>) -> Option<Self> {
        let now = Utc::now();
        let expires_at = match expiry_spec {
            None => None,
            Some(token) => match Expiry::parse(token) {
                Ok(Expiry::Once) => return None,
                Ok(expiry) => expiry.deadline(now),
                Err(e) => {
                    warn!(token, error = %e, "unparseable expiry token, storing grant without expiry");
                    None
                }
            },
        };

        Some(Self {
            granted,
            expires_at,
            granted_at: now,
            metadata,
        })
    }

    /// Whether the record is past its deadline at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Contract every grant backend satisfies.
///
/// Backends are interchangeable behind this trait without touching the
/// hooks. Expired records must be evicted as a side effect of `get`;
/// `clear_expired` is the bulk sweep a host may additionally drive from a
/// background timer of its own.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Look up a live record. Expired records are removed and reported
    /// absent.
    async fn get(&self, key: &str) -> Result<Option<PermissionInfo>, StoreError>;

    /// Record a decision under `key`. An expiry of `once` stores nothing;
    /// no expiry stores a record that lives until removed. Concurrent
    /// writers for the same key race last-write-wins.
    async fn set(
        &self,
        key: &str,
        granted: bool,
        expiry: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<(), StoreError>;

    /// Drop the record under `key`, if any.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Bulk-remove every expired record.
    async fn clear_expired(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_from_spec_no_expiry() {
        let info = PermissionInfo::from_spec(true, None, None).unwrap();
        assert!(info.granted);
        assert!(info.expires_at.is_none());
    }

    #[test]
    fn test_from_spec_once_is_never_stored() {
        assert!(PermissionInfo::from_spec(true, Some("once"), None).is_none());
        assert!(PermissionInfo::from_spec(false, Some("once"), None).is_none());
    }

    #[test]
    fn test_from_spec_duration_sets_deadline() {
        let info = PermissionInfo::from_spec(true, Some("1h"), None).unwrap();
        let deadline = info.expires_at.expect("deadline set");
        assert_eq!(deadline - info.granted_at, Duration::hours(1));
    }

    #[test]
    fn test_from_spec_session_is_24h() {
        let info = PermissionInfo::from_spec(true, Some("session"), None).unwrap();
        let deadline = info.expires_at.expect("deadline set");
        assert_eq!(deadline - info.granted_at, Duration::hours(24));
    }

    #[test]
    fn test_from_spec_malformed_token_stores_without_expiry() {
        let info = PermissionInfo::from_spec(true, Some("fortnight"), None).unwrap();
        assert!(info.expires_at.is_none());
    }

    #[test]
    fn test_is_expired() {
        let now = Utc::now();
        let mut info = PermissionInfo::from_spec(true, Some("1h"), None).unwrap();
        assert!(!info.is_expired(now));
        assert!(info.is_expired(now + Duration::hours(2)));

        info.expires_at = None;
        assert!(!info.is_expired(now + Duration::days(365)));
    }
}
