//! Interception hooks.
//!
//! [`GateHooks`] is what a tool-execution proxy calls around every
//! invocation: [`before_execution`](GateHooks::before_execution) decides
//! whether the call may run, [`after_execution`](GateHooks::after_execution)
//! forwards the result, [`on_error`](GateHooks::on_error) shapes failures,
//! and [`handle_permission_response`](GateHooks::handle_permission_response)
//! records the human decision once one arrives.
//!
//! Two invariants hold across the whole module: the same tool name and
//! arguments always resolve to the same severity and storage key, no matter
//! which entry point computes them; and `handle_permission_response` is the
//! only writer of grant records.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::events::{GateEvent, GateObserver};
use crate::key::derive_key;
use crate::policy::{LevelPolicy, SecurityPolicy, SeverityResolution};
use crate::response::{PermissionResponse, PolicyHints, ResponseStatus};
use crate::store::{MemoryPermissionStore, PermissionStore, StoreError};
use crate::tool::{ToolError, ToolResult};

/// Identifier used when the context carries none.
pub const ANONYMOUS_IDENTIFIER: &str = "anonymous";

/// Extracts the acting identifier from an opaque per-call context bag.
pub type IdentifierExtractor = Arc<dyn Fn(&Value) -> String + Send + Sync>;

fn default_extractor() -> IdentifierExtractor {
    Arc::new(|context: &Value| {
        context
            .get("resourceId")
            .and_then(Value::as_str)
            .unwrap_or(ANONYMOUS_IDENTIFIER)
            .to_string()
    })
}

/// Outcome of [`GateHooks::before_execution`].
#[derive(Debug)]
pub enum GateDecision {
    /// Run the wrapped tool.
    Proceed,

    /// Do not run the tool; hand this payload back instead.
    Halt(PermissionResponse),
}

impl GateDecision {
    /// Whether the call may run.
    pub fn is_proceed(&self) -> bool {
        matches!(self, GateDecision::Proceed)
    }

    /// The halt payload, when the call was held.
    pub fn response(&self) -> Option<&PermissionResponse> {
        match self {
            GateDecision::Proceed => None,
            GateDecision::Halt(response) => Some(response),
        }
    }

    /// Consume the decision into its halt payload.
    pub fn into_response(self) -> Option<PermissionResponse> {
        match self {
            GateDecision::Proceed => None,
            GateDecision::Halt(response) => Some(response),
        }
    }
}

/// Policy-driven gate around tool execution.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use toolgate_core::{GateHooks, SecurityLevel, SecurityPolicy, ToolMetadata};
///
/// # tokio_test::block_on(async {
/// let policy = SecurityPolicy::new()
///     .with_tool("send_email", ToolMetadata::new().with_level(SecurityLevel::Medium));
/// let hooks = GateHooks::new(policy);
///
/// // No grant yet: the call is held for approval.
/// let decision = hooks
///     .before_execution("send_email", &json!({}), &json!({"resourceId": "u1"}))
///     .await
///     .unwrap();
/// assert!(!decision.is_proceed());
///
/// // A human approves; the same call now proceeds.
/// hooks
///     .handle_permission_response("send_email", &json!({}), true, &json!({"resourceId": "u1"}))
///     .await
///     .unwrap();
/// let decision = hooks
///     .before_execution("send_email", &json!({}), &json!({"resourceId": "u1"}))
///     .await
///     .unwrap();
/// assert!(decision.is_proceed());
/// # });
/// ```
pub struct GateHooks {
    policy: SecurityPolicy,
    store: Box<dyn PermissionStore>,
    identify: IdentifierExtractor,
    observers: parking_lot::RwLock<Vec<Arc<dyn GateObserver>>>,
}

impl GateHooks {
    /// Hooks over the given policy and an in-memory store.
    pub fn new(policy: SecurityPolicy) -> Self {
        Self::with_boxed_store(policy, Box::new(MemoryPermissionStore::new()))
    }

    /// Hooks over a custom store.
    pub fn with_store(policy: SecurityPolicy, store: impl PermissionStore + 'static) -> Self {
        Self::with_boxed_store(policy, Box::new(store))
    }

    /// Hooks over a boxed store.
    pub fn with_boxed_store(policy: SecurityPolicy, store: Box<dyn PermissionStore>) -> Self {
        Self {
            policy,
            store,
            identify: default_extractor(),
            observers: parking_lot::RwLock::new(Vec::new()),
        }
    }

    /// Replace the identifier extractor.
    ///
    /// The default reads the context's `resourceId` string and falls back to
    /// [`ANONYMOUS_IDENTIFIER`].
    pub fn with_identifier_extractor(
        mut self,
        extractor: impl Fn(&Value) -> String + Send + Sync + 'static,
    ) -> Self {
        self.identify = Arc::new(extractor);
        self
    }

    /// Register an observer for gate events.
    pub fn add_observer(&self, observer: Arc<dyn GateObserver>) {
        self.observers.write().push(observer);
    }

    /// The policy driving this gate.
    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// The grant store behind this gate.
    pub fn store(&self) -> &dyn PermissionStore {
        self.store.as_ref()
    }

    /// Fan an event out to observers. A panicking observer is contained;
    /// the gating decision is already made by the time observers run.
    fn emit(&self, event: &GateEvent) {
        for observer in self.observers.read().iter() {
            if catch_unwind(AssertUnwindSafe(|| observer.on_event(event))).is_err() {
                warn!("gate observer panicked, ignoring");
            }
        }
    }

    /// Severity + level handling for one call. Shared by every entry point
    /// so they can never disagree.
    fn resolve_call(&self, tool_name: &str, params: &Value) -> (SeverityResolution, LevelPolicy) {
        let resolution = self.policy.resolve(tool_name, params);
        let level_policy = self.policy.level_policy(resolution.security_level);
        (resolution, level_policy)
    }

    /// Decide whether a call may run.
    ///
    /// Returns [`GateDecision::Proceed`] when the level's policy does not
    /// require permission, or when a live `granted: true` record exists for
    /// the derived key. Otherwise the call is held: observers see a
    /// `PermissionRequested` event and the decision carries a
    /// `permission_required` payload with the severity, a human-readable
    /// reason, and the level's expiry/confirmation hints.
    ///
    /// Store failures propagate; there is no safe default when the backend
    /// is down.
    pub async fn before_execution(
        &self,
        tool_name: &str,
        params: &Value,
        context: &Value,
    ) -> Result<GateDecision, StoreError> {
        let identifier = (self.identify)(context);
        let (resolution, level_policy) = self.resolve_call(tool_name, params);

        if !level_policy.require_permission {
            return Ok(GateDecision::Proceed);
        }

        let key = derive_key(&identifier, tool_name, params);
        if let Some(info) = self.store.get(&key).await? {
            if info.granted {
                return Ok(GateDecision::Proceed);
            }
        }

        self.emit(&GateEvent::PermissionRequested {
            tool_name: tool_name.to_string(),
            identifier,
            key,
            security_level: resolution.security_level,
            params: params.clone(),
        });

        let message = resolution.message.clone().unwrap_or_else(|| {
            format!(
                "Tool '{}' requires {} level permission",
                tool_name, resolution.security_level
            )
        });

        let mut response =
            PermissionResponse::new(ResponseStatus::PermissionRequired, tool_name);
        response.message = Some(message);
        response.parameters = Some(params.clone());
        response.security_level = Some(resolution.security_level);
        response.policy = Some(PolicyHints {
            expiry: level_policy.expiry.clone(),
            require_confirmation: level_policy.require_confirmation,
        });

        Ok(GateDecision::Halt(response))
    }

    /// Forward a completed tool result unchanged, signalling the granted
    /// side channel. The store is not consulted again.
    pub fn after_execution(&self, tool_name: &str, result: ToolResult, context: &Value) -> ToolResult {
        let identifier = (self.identify)(context);
        self.emit(&GateEvent::PermissionGranted {
            tool_name: tool_name.to_string(),
            identifier,
        });
        result
    }

    /// Shape a tool failure into a structured payload. The underlying error
    /// is stringified here and never rethrown past the gate.
    pub fn on_error(&self, tool_name: &str, error: &ToolError, _context: &Value) -> PermissionResponse {
        let mut response = PermissionResponse::new(ResponseStatus::Error, tool_name);
        response.error = Some(error.to_string());
        response.message = Some(format!("Tool '{}' execution failed", tool_name));
        response
    }

    /// Record a human decision for a held call.
    ///
    /// Severity and key are re-resolved exactly as in
    /// [`before_execution`](Self::before_execution), so a decision always
    /// lands on the key the held call consulted. Approvals are stored with
    /// the level's configured expiry; denials become standing `granted:
    /// false` records with no expiry. This is the only place grant records
    /// are written.
    pub async fn handle_permission_response(
        &self,
        tool_name: &str,
        params: &Value,
        approved: bool,
        context: &Value,
    ) -> Result<PermissionResponse, StoreError> {
        let identifier = (self.identify)(context);
        let (resolution, level_policy) = self.resolve_call(tool_name, params);
        let key = derive_key(&identifier, tool_name, params);

        if approved {
            self.store
                .set(&key, true, level_policy.expiry.as_deref(), None)
                .await?;
            self.emit(&GateEvent::PermissionGranted {
                tool_name: tool_name.to_string(),
                identifier,
            });

            let mut response = PermissionResponse::new(ResponseStatus::Success, tool_name);
            response.message = Some(format!("Permission granted for '{}'", tool_name));
            response.security_level = Some(resolution.security_level);
            Ok(response)
        } else {
            self.store.set(&key, false, None, None).await?;
            let reason = "Permission denied by user".to_string();
            self.emit(&GateEvent::PermissionDenied {
                tool_name: tool_name.to_string(),
                identifier,
                reason: reason.clone(),
            });

            let mut response = PermissionResponse::new(ResponseStatus::Denied, tool_name);
            response.reason = Some(reason);
            response.security_level = Some(resolution.security_level);
            Ok(response)
        }
    }

    /// Drop the stored decision for this exact call, if any.
    pub async fn revoke(
        &self,
        tool_name: &str,
        params: &Value,
        context: &Value,
    ) -> Result<(), StoreError> {
        let identifier = (self.identify)(context);
        let key = derive_key(&identifier, tool_name, params);
        self.store.remove(&key).await
    }
}
