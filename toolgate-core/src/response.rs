//! Structured gate payloads.
//!
//! The caller of a gated tool always receives either the tool's own result
//! or one of these payloads; errors never cross the gate boundary as
//! exceptions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::level::SecurityLevel;

/// Discriminator for [`PermissionResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// The call was held pending a human decision.
    PermissionRequired,
    /// A decision was recorded as an approval.
    Success,
    /// The wrapped tool failed.
    Error,
    /// A decision was recorded as a denial.
    Denied,
}

/// Expiry/confirmation hints a UI can show alongside a permission prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyHints {
    /// Expiry token the eventual approval will be stored with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,

    /// Whether the approval dialog should double-confirm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_confirmation: Option<bool>,
}

/// Payload describing a gated outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResponse {
    /// What happened.
    pub status: ResponseStatus,

    /// Tool the payload is about.
    pub tool_name: String,

    /// Human-readable explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Arguments of the held call (present on permission_required).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,

    /// Tool result, when a caller chooses to embed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Stringified tool failure (present on error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Effective severity of the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_level: Option<SecurityLevel>,

    /// Denial reason (present on denied).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Handling hints from the level's policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyHints>,
}

impl PermissionResponse {
    /// Bare payload with the given discriminator; every optional field unset.
    pub fn new(status: ResponseStatus, tool_name: impl Into<String>) -> Self {
        Self {
            status,
            tool_name: tool_name.into(),
            message: None,
            parameters: None,
            result: None,
            error: None,
            security_level: None,
            reason: None,
            policy: None,
        }
    }
}
