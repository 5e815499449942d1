//! # toolgate
//!
//! Policy-driven permission gating for agent tool execution.
//!
//! toolgate sits in front of callable tools and decides, per invocation,
//! whether a call may proceed immediately, must be held pending human
//! approval, or is denied, based on a declarative security policy,
//! parameter-level rules, and a time-bounded grant cache.
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use toolgate_core::{GateHooks, SecurityLevel, SecurityPolicy, ToolMetadata};
//!
//! # tokio_test::block_on(async {
//! let policy = SecurityPolicy::new()
//!     .with_tool("send_email", ToolMetadata::new().with_level(SecurityLevel::Medium));
//! let hooks = GateHooks::new(policy);
//!
//! // No grant yet: the call is held for approval.
//! let params = json!({"to": "a@example.com"});
//! let context = json!({"resourceId": "u1"});
//! let decision = hooks.before_execution("send_email", &params, &context).await.unwrap();
//! assert!(!decision.is_proceed());
//!
//! // A human approves; the identical call now runs.
//! hooks.handle_permission_response("send_email", &params, true, &context).await.unwrap();
//! let decision = hooks.before_execution("send_email", &params, &context).await.unwrap();
//! assert!(decision.is_proceed());
//! # });
//! ```
//!
//! ## Features
//!
//! - **Declarative policy**: per-tool and per-category severity levels with
//!   a per-level handling table (require permission, expiry, confirmation)
//! - **Parameter rules**: argument-level conditions that escalate a call's
//!   severity (never lower it)
//! - **Grant cache**: approvals stored under a deterministic
//!   actor/tool/arguments key with `once` / `session` / custom expiry
//! - **Interception protocol**: `before_execution` / `after_execution` /
//!   `on_error` hooks plus a [`ProxiedTool`] wrapper that gates a whole
//!   toolbox
//! - **Pluggable storage**: any [`PermissionStore`] backend; in-memory here,
//!   SQLite in the `toolgate-sqlite` crate
//!
//! ## Wrapping tools
//!
//! Implement the [`Tool`] trait for typed callables and wrap them with
//! [`proxy_tools`]:
//!
//! ```ignore
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use toolgate_core::{box_tool, proxy_tools, DynTool, GateHooks, SecurityPolicy};
//!
//! let hooks = Arc::new(GateHooks::new(policy));
//! let mut toolbox: HashMap<String, Box<dyn DynTool>> = HashMap::new();
//! toolbox.insert("send_email".to_string(), box_tool(SendEmailTool));
//! let gated = proxy_tools(toolbox, hooks);
//!
//! let outcome = gated["send_email"].execute(params, &context).await?;
//! ```

pub mod error;
pub mod events;
pub mod hooks;
pub mod key;
pub mod level;
pub mod policy;
pub mod proxy;
pub mod response;
pub mod rule;
pub mod store;
pub mod tool;

pub use error::{Error, Result};
pub use events::{GateEvent, GateObserver};
pub use hooks::{GateDecision, GateHooks, IdentifierExtractor, ANONYMOUS_IDENTIFIER};
pub use key::{derive_key, hash_params};
pub use level::{compare, higher, rank, SecurityLevel, UnknownLevelError};
pub use policy::{
    CategoryPolicy, Expiry, ExpiryParseError, LevelPolicy, PolicyValidation, SecurityPolicy,
    SeverityResolution, ToolMetadata, SESSION_EXPIRY_HOURS,
};
pub use proxy::{proxy_tools, GateOutcome, ProxiedTool};
pub use response::{PermissionResponse, PolicyHints, ResponseStatus};
pub use rule::{evaluate, evaluate_all, Condition, ParameterRule, RuleEvaluation};
pub use store::{MemoryPermissionStore, PermissionInfo, PermissionStore, StoreError};
pub use tool::{box_tool, DynTool, Tool, ToolError, ToolResult};
