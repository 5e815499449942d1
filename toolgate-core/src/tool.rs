//! Tool trait and type-erased callables.
//!
//! A [`Tool`] is the unit the gate wraps: a named callable with a typed,
//! schema-described input. [`DynTool`] is its object-safe erasure so
//! heterogeneous tools can live in one toolbox.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result types a tool can return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolResult {
    /// Plain text response.
    Text(String),

    /// Structured JSON data.
    Json(Value),
}

impl ToolResult {
    /// Create a text result.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Create a JSON result from any serializable type.
    pub fn json<T: Serialize>(value: T) -> Result<Self, serde_json::Error> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Text content, or the JSON text for structured results.
    pub fn as_text(&self) -> String {
        match self {
            ToolResult::Text(s) => s.clone(),
            ToolResult::Json(v) => v.to_string(),
        }
    }

    /// Reference to the text content, if this is a `Text` result.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ToolResult::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for ToolResult {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for ToolResult {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Errors a tool can raise during execution.
///
/// The gate never lets these escape to the caller of a gated tool; they are
/// shaped into a structured error payload at the proxy boundary.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input deserialization or result serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything else.
    #[error("{0}")]
    Custom(String),
}

impl From<String> for ToolError {
    fn from(s: String) -> Self {
        Self::Custom(s)
    }
}

impl From<&str> for ToolError {
    fn from(s: &str) -> Self {
        Self::Custom(s.to_string())
    }
}

/// Trait for implementing a callable tool with typed input.
///
/// # Example
///
/// ```rust
/// use toolgate_core::{Tool, ToolError, ToolResult};
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct EchoInput {
///     message: String,
/// }
///
/// struct EchoTool;
///
/// impl Tool for EchoTool {
///     type Input = EchoInput;
///
///     fn name(&self) -> &str { "echo" }
///     fn description(&self) -> &str { "Echoes the input back" }
///
///     async fn execute(&self, input: Self::Input) -> Result<ToolResult, ToolError> {
///         Ok(input.message.into())
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// The input type. Must implement `Deserialize` and `JsonSchema`.
    type Input: DeserializeOwned + JsonSchema;

    /// The tool's name (e.g. "send_email").
    fn name(&self) -> &str;

    /// What the tool does.
    fn description(&self) -> &str;

    /// Execute the tool with typed input.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl std::future::Future<Output = Result<ToolResult, ToolError>> + Send;

    /// JSON schema for the input type, generated from `Input`.
    fn input_schema(&self) -> Value {
        let schema = schemars::schema_for!(Self::Input);
        serde_json::to_value(schema).expect("schema serializes")
    }
}

/// Object-safe trait for dynamic tool dispatch.
///
/// Implement [`Tool`] instead and convert with [`box_tool`].
pub trait DynTool: Send + Sync {
    /// The tool's name.
    fn name(&self) -> &str;

    /// What the tool does.
    fn description(&self) -> &str;

    /// JSON schema for the input.
    fn input_schema(&self) -> Value;

    /// Execute with an untyped argument bag.
    fn execute_raw(
        &self,
        input: Value,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<ToolResult, ToolError>> + Send + '_>,
    >;
}

/// Convert a [`Tool`] into a type-erased `Box<dyn DynTool>`.
pub fn box_tool<T: Tool + 'static>(tool: T) -> Box<dyn DynTool> {
    Box::new(ToolAdapter(tool))
}

/// Internal adapter implementing [`DynTool`] for any [`Tool`].
struct ToolAdapter<T>(T);

impl<T: Tool + 'static> DynTool for ToolAdapter<T> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn description(&self) -> &str {
        self.0.description()
    }

    fn input_schema(&self) -> Value {
        self.0.input_schema()
    }

    fn execute_raw(
        &self,
        input: Value,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<ToolResult, ToolError>> + Send + '_>,
    > {
        Box::pin(async move {
            let typed: T::Input = serde_json::from_value(input)
                .map_err(|e| ToolError::Custom(format!("failed to deserialize input: {}", e)))?;
            self.0.execute(typed).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct AddInput {
        a: f64,
        b: f64,
    }

    struct AddTool;

    impl Tool for AddTool {
        type Input = AddInput;

        fn name(&self) -> &str {
            "add"
        }

        fn description(&self) -> &str {
            "Adds two numbers"
        }

        async fn execute(&self, input: Self::Input) -> Result<ToolResult, ToolError> {
            Ok(format!("{}", input.a + input.b).into())
        }
    }

    #[test]
    fn test_tool_result_text() {
        let result = ToolResult::text("hello");
        assert_eq!(result.as_text(), "hello");
        assert_eq!(result.as_str(), Some("hello"));
    }

    #[test]
    fn test_tool_result_json() {
        let result = ToolResult::json(serde_json::json!({"ok": true})).unwrap();
        assert!(result.as_str().is_none());
        assert!(result.as_text().contains("ok"));
    }

    #[tokio::test]
    async fn test_box_tool_dispatches_typed_input() {
        let tool = box_tool(AddTool);
        assert_eq!(tool.name(), "add");
        assert_eq!(tool.description(), "Adds two numbers");

        let result = tool
            .execute_raw(serde_json::json!({"a": 2, "b": 3}))
            .await
            .unwrap();
        assert_eq!(result.as_text(), "5");
    }

    #[tokio::test]
    async fn test_box_tool_rejects_bad_input() {
        let tool = box_tool(AddTool);
        let result = tool.execute_raw(serde_json::json!({"a": "x"})).await;
        assert!(matches!(result, Err(ToolError::Custom(_))));
    }

    #[test]
    fn test_input_schema_describes_fields() {
        let tool = box_tool(AddTool);
        let schema = tool.input_schema();
        let text = schema.to_string();
        assert!(text.contains("\"a\""));
        assert!(text.contains("\"b\""));
    }
}
