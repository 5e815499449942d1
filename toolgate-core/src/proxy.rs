//! Tool execution proxy.
//!
//! Wraps callables so every invocation passes through the gate hooks. The
//! wrapper holds the original callable and delegates its descriptive
//! properties untouched; the only behavior it replaces is `execute`. There
//! are no retries and no timeout: a hung wrapped callable hangs its caller,
//! and the only cancellation is the pre-flight halt that keeps execution
//! from starting.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Error;
use crate::hooks::{GateDecision, GateHooks};
use crate::response::PermissionResponse;
use crate::tool::{DynTool, ToolResult};

/// Result of invoking a gated tool.
///
/// Callers always get one of these three shapes; the wrapped tool's own
/// error never surfaces as an `Err`.
#[derive(Debug)]
pub enum GateOutcome {
    /// The tool ran; its result passed through `after_execution` unchanged.
    Completed(ToolResult),

    /// Held before execution; the payload describes the pending approval.
    PermissionRequired(PermissionResponse),

    /// The tool ran and failed; the payload is the shaped error.
    Failed(PermissionResponse),
}

impl GateOutcome {
    /// Whether the tool ran to completion.
    pub fn is_completed(&self) -> bool {
        matches!(self, GateOutcome::Completed(_))
    }

    /// Whether the call was held pending approval.
    pub fn is_permission_required(&self) -> bool {
        matches!(self, GateOutcome::PermissionRequired(_))
    }

    /// Whether the tool ran and failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, GateOutcome::Failed(_))
    }

    /// The tool result, when completed.
    pub fn result(&self) -> Option<&ToolResult> {
        match self {
            GateOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }

    /// The structured payload, for held and failed outcomes.
    pub fn response(&self) -> Option<&PermissionResponse> {
        match self {
            GateOutcome::Completed(_) => None,
            GateOutcome::PermissionRequired(response) | GateOutcome::Failed(response) => {
                Some(response)
            }
        }
    }
}

/// A callable wrapped with permission gating.
///
/// Pass-through wrapping, not replacement: `name`, `description`, and
/// `input_schema` delegate to the original callable, which stays reachable
/// through [`inner`](ProxiedTool::inner).
pub struct ProxiedTool {
    name: String,
    inner: Box<dyn DynTool>,
    hooks: Arc<GateHooks>,
}

impl ProxiedTool {
    /// Wrap one callable under its registered name.
    pub fn new(name: impl Into<String>, inner: Box<dyn DynTool>, hooks: Arc<GateHooks>) -> Self {
        Self {
            name: name.into(),
            inner,
            hooks,
        }
    }

    /// The registered tool name (drives policy lookup and key derivation).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wrapped callable's description.
    pub fn description(&self) -> &str {
        self.inner.description()
    }

    /// The wrapped callable's input schema.
    pub fn input_schema(&self) -> Value {
        self.inner.input_schema()
    }

    /// Introspection marker distinguishing gated wrappers from bare tools.
    pub fn is_proxied_tool(&self) -> bool {
        true
    }

    /// The unwrapped callable.
    pub fn inner(&self) -> &dyn DynTool {
        self.inner.as_ref()
    }

    /// Run the wrapped callable behind the gate.
    ///
    /// `before_execution` decides; a held call returns its payload without
    /// ever invoking the callable; a completed call's result flows through
    /// `after_execution`; a thrown error is shaped by `on_error`. Only a
    /// store failure surfaces as `Err`; the host owns that failure policy.
    pub async fn execute(&self, params: Value, context: &Value) -> Result<GateOutcome, Error> {
        match self
            .hooks
            .before_execution(&self.name, &params, context)
            .await?
        {
            GateDecision::Halt(response) => Ok(GateOutcome::PermissionRequired(response)),
            GateDecision::Proceed => match self.inner.execute_raw(params).await {
                Ok(result) => Ok(GateOutcome::Completed(
                    self.hooks.after_execution(&self.name, result, context),
                )),
                Err(error) => Ok(GateOutcome::Failed(
                    self.hooks.on_error(&self.name, &error, context),
                )),
            },
        }
    }
}

/// Wrap a toolbox so every entry is gated by the same hooks.
pub fn proxy_tools(
    tools: HashMap<String, Box<dyn DynTool>>,
    hooks: Arc<GateHooks>,
) -> HashMap<String, ProxiedTool> {
    tools
        .into_iter()
        .map(|(name, tool)| {
            let proxied = ProxiedTool::new(name.clone(), tool, Arc::clone(&hooks));
            (name, proxied)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::SecurityLevel;
    use crate::policy::{SecurityPolicy, ToolMetadata};
    use crate::response::ResponseStatus;
    use crate::tool::{box_tool, Tool, ToolError};
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize, JsonSchema)]
    struct EchoInput {
        message: String,
    }

    struct EchoTool;

    impl Tool for EchoTool {
        type Input = EchoInput;

        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the input back"
        }

        async fn execute(&self, input: Self::Input) -> Result<ToolResult, ToolError> {
            Ok(input.message.into())
        }
    }

    #[derive(Deserialize, JsonSchema)]
    struct EmptyInput {}

    struct FailingTool;

    impl Tool for FailingTool {
        type Input = EmptyInput;

        fn name(&self) -> &str {
            "failing_tool"
        }

        fn description(&self) -> &str {
            "A tool that always fails"
        }

        async fn execute(&self, _input: Self::Input) -> Result<ToolResult, ToolError> {
            Err(ToolError::Custom("boom".to_string()))
        }
    }

    fn open_policy() -> SecurityPolicy {
        SecurityPolicy::new()
            .with_tool("echo", ToolMetadata::new().with_level(SecurityLevel::None))
            .with_tool(
                "failing_tool",
                ToolMetadata::new().with_level(SecurityLevel::None),
            )
    }

    #[tokio::test]
    async fn test_proxied_tool_delegates_properties() {
        let hooks = Arc::new(GateHooks::new(open_policy()));
        let proxied = ProxiedTool::new("echo", box_tool(EchoTool), hooks);

        assert_eq!(proxied.name(), "echo");
        assert_eq!(proxied.description(), "Echoes the input back");
        assert!(proxied.is_proxied_tool());
        assert!(proxied.input_schema().to_string().contains("message"));
        assert_eq!(proxied.inner().name(), "echo");
    }

    #[tokio::test]
    async fn test_execute_completes_through_gate() {
        let hooks = Arc::new(GateHooks::new(open_policy()));
        let proxied = ProxiedTool::new("echo", box_tool(EchoTool), hooks);

        let outcome = proxied
            .execute(json!({"message": "hello"}), &json!({}))
            .await
            .unwrap();
        assert!(outcome.is_completed());
        assert_eq!(outcome.result().unwrap().as_text(), "hello");
    }

    #[tokio::test]
    async fn test_execute_halts_without_grant() {
        let policy = SecurityPolicy::new()
            .with_tool("echo", ToolMetadata::new().with_level(SecurityLevel::Medium));
        let hooks = Arc::new(GateHooks::new(policy));
        let proxied = ProxiedTool::new("echo", box_tool(EchoTool), hooks);

        let outcome = proxied
            .execute(json!({"message": "hello"}), &json!({}))
            .await
            .unwrap();
        assert!(outcome.is_permission_required());
        let response = outcome.response().unwrap();
        assert_eq!(response.status, ResponseStatus::PermissionRequired);
        assert_eq!(response.parameters, Some(json!({"message": "hello"})));
    }

    #[tokio::test]
    async fn test_execute_shapes_tool_failure() {
        let hooks = Arc::new(GateHooks::new(open_policy()));
        let proxied = ProxiedTool::new("failing_tool", box_tool(FailingTool), hooks);

        let outcome = proxied.execute(json!({}), &json!({})).await.unwrap();
        assert!(outcome.is_failed());
        let response = outcome.response().unwrap();
        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(response.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_proxy_tools_wraps_whole_toolbox() {
        let hooks = Arc::new(GateHooks::new(open_policy()));
        let mut toolbox: HashMap<String, Box<dyn DynTool>> = HashMap::new();
        toolbox.insert("echo".to_string(), box_tool(EchoTool));
        toolbox.insert("failing_tool".to_string(), box_tool(FailingTool));

        let gated = proxy_tools(toolbox, hooks);
        assert_eq!(gated.len(), 2);
        assert!(gated.values().all(|t| t.is_proxied_tool()));

        let outcome = gated["echo"]
            .execute(json!({"message": "hi"}), &json!({}))
            .await
            .unwrap();
        assert!(outcome.is_completed());
    }

    #[tokio::test]
    async fn test_registered_name_drives_policy_not_inner_name() {
        // The toolbox key, not the callable's own name, is what policy
        // lookup and key derivation use.
        let policy = SecurityPolicy::new()
            .with_tool("renamed", ToolMetadata::new().with_level(SecurityLevel::Medium));
        let hooks = Arc::new(GateHooks::new(policy));
        let proxied = ProxiedTool::new("renamed", box_tool(EchoTool), hooks);

        let outcome = proxied
            .execute(json!({"message": "x"}), &json!({}))
            .await
            .unwrap();
        assert!(outcome.is_permission_required());
        assert_eq!(outcome.response().unwrap().tool_name, "renamed");
    }
}
