//! Declarative security policy.
//!
//! A policy maps tool names (and categories of tools) to required security
//! levels, attaches parameter rules that can escalate a call, and configures
//! per-level handling: whether permission is required at all, how long an
//! approval lives, and whether the approval dialog should double-confirm.
//!
//! Policies are normally loaded from a JSON document supplied by the host
//! application and are immutable once handed to the hooks; overlays go
//! through [`SecurityPolicy::merge`].

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::level::{compare, SecurityLevel};
use crate::rule::{evaluate_all, Condition, ParameterRule};

/// Hours in a `session` expiry window.
pub const SESSION_EXPIRY_HOURS: i64 = 24;

/// How long a stored approval remains valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Never stored; the action re-prompts on every call.
    Once,
    /// Fixed 24-hour window.
    Session,
    /// Custom duration from a `<n>[mhd]` token.
    After(Duration),
}

/// Error for an expiry token outside the known forms.
#[derive(Debug, Clone, Error)]
#[error("invalid expiry token '{0}' (expected 'once', 'session', or <n>m/<n>h/<n>d)")]
pub struct ExpiryParseError(pub String);

impl Expiry {
    /// Parse an expiry token, strictly.
    ///
    /// Recognized forms are `once`, `session`, and `<n>[mhd]` (minutes,
    /// hours, days). Anything else is an error here; the lenient
    /// interpretation used on the grant write path lives in
    /// [`crate::store::PermissionInfo::from_spec`].
    pub fn parse(token: &str) -> Result<Self, ExpiryParseError> {
        match token {
            "once" => return Ok(Expiry::Once),
            "session" => return Ok(Expiry::Session),
            _ => {}
        }

        let malformed = || ExpiryParseError(token.to_string());

        if token.len() < 2 || !token.is_ascii() {
            return Err(malformed());
        }
        let (digits, unit) = token.split_at(token.len() - 1);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let n: i64 = digits.parse().map_err(|_| malformed())?;

        let duration = match unit {
            "m" => Duration::try_minutes(n),
            "h" => Duration::try_hours(n),
            "d" => Duration::try_days(n),
            _ => return Err(malformed()),
        };
        duration.map(Expiry::After).ok_or_else(malformed)
    }

    /// Absolute deadline for a grant created at `now`.
    ///
    /// `Once` has no deadline because such grants are never stored at all.
    pub fn deadline(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Expiry::Once => None,
            Expiry::Session => now.checked_add_signed(Duration::hours(SESSION_EXPIRY_HOURS)),
            Expiry::After(duration) => now.checked_add_signed(duration),
        }
    }
}

/// Per-tool policy record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolMetadata {
    /// Explicit severity for this tool; takes precedence over its category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_level: Option<SecurityLevel>,

    /// Category whose level applies when the tool declares none of its own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Shown to the user when the tool needs approval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_message: Option<String>,
}

impl ToolMetadata {
    /// Empty metadata; severity resolution falls through to category/default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the explicit severity.
    pub fn with_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = Some(level);
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the approval-prompt message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.permission_message = Some(message.into());
        self
    }
}

/// Category-wide fallback severity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_level: Option<SecurityLevel>,
}

/// Handling for calls that resolve to a given severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LevelPolicy {
    /// Whether calls at this level must hold a grant before running.
    pub require_permission: bool,

    /// Expiry token for approvals at this level: `once`, `session`, or
    /// `<n>[mhd]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,

    /// Ask the user to confirm twice before approving.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_confirmation: Option<bool>,
}

impl Default for LevelPolicy {
    fn default() -> Self {
        Self {
            require_permission: true,
            expiry: None,
            require_confirmation: None,
        }
    }
}

/// Built-in per-level handling, used whenever a policy omits a level.
///
/// This is the single canonical baseline: policy resolution overlays the
/// document's `defaults` on top of this table, never on a second copy.
fn builtin_level_policy(level: SecurityLevel) -> LevelPolicy {
    match level {
        SecurityLevel::None | SecurityLevel::Low => LevelPolicy {
            require_permission: false,
            expiry: None,
            require_confirmation: None,
        },
        SecurityLevel::Medium => LevelPolicy {
            require_permission: true,
            expiry: Some("session".to_string()),
            require_confirmation: None,
        },
        SecurityLevel::High => LevelPolicy {
            require_permission: true,
            expiry: Some("1h".to_string()),
            require_confirmation: Some(true),
        },
        SecurityLevel::Critical => LevelPolicy {
            require_permission: true,
            expiry: Some("once".to_string()),
            require_confirmation: Some(true),
        },
    }
}

/// Outcome of resolving a call's effective severity.
#[derive(Debug, Clone)]
pub struct SeverityResolution {
    /// Effective severity for the call.
    pub security_level: SecurityLevel,

    /// Rule- or tool-supplied approval message, when one exists. Matching
    /// rules win over the tool's own message.
    pub message: Option<String>,

    /// Parameter rules that matched this call.
    pub matched_rules: Vec<ParameterRule>,
}

/// Result of validating a policy document.
#[derive(Debug, Clone)]
pub struct PolicyValidation {
    /// True when no errors were found (warnings do not invalidate).
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Declarative mapping from tools to required severity and handling.
///
/// # Example
///
/// ```rust
/// use toolgate_core::{ParameterRule, SecurityLevel, SecurityPolicy, ToolMetadata};
///
/// let policy = SecurityPolicy::new()
///     .with_tool("send_email", ToolMetadata::new().with_level(SecurityLevel::Medium))
///     .with_rule(
///         "pay",
///         ParameterRule::greater_than("amount", 1000).with_level(SecurityLevel::Critical),
///     );
///
/// let level = policy.resolve_severity("pay", &serde_json::json!({"amount": 2000}));
/// assert_eq!(level, SecurityLevel::Critical);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityPolicy {
    /// Per-tool metadata.
    pub tools: HashMap<String, ToolMetadata>,

    /// Category-wide fallback levels.
    pub categories: HashMap<String, CategoryPolicy>,

    /// Per-level handling; gaps fall through to the built-in baseline.
    pub defaults: HashMap<SecurityLevel, LevelPolicy>,

    /// Parameter rules keyed by tool name.
    pub parameter_rules: HashMap<String, Vec<ParameterRule>>,
}

impl SecurityPolicy {
    /// Empty policy: every call resolves to `medium` and the built-in
    /// baseline handling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register metadata for a tool.
    pub fn with_tool(mut self, name: impl Into<String>, metadata: ToolMetadata) -> Self {
        self.tools.insert(name.into(), metadata);
        self
    }

    /// Register a category-wide fallback level.
    pub fn with_category(mut self, name: impl Into<String>, level: SecurityLevel) -> Self {
        self.categories.insert(
            name.into(),
            CategoryPolicy {
                security_level: Some(level),
            },
        );
        self
    }

    /// Override the handling for one level.
    pub fn with_default(mut self, level: SecurityLevel, policy: LevelPolicy) -> Self {
        self.defaults.insert(level, policy);
        self
    }

    /// Append a parameter rule for a tool.
    pub fn with_rule(mut self, tool: impl Into<String>, rule: ParameterRule) -> Self {
        self.parameter_rules.entry(tool.into()).or_default().push(rule);
        self
    }

    /// Per-level handling with built-in fallback.
    pub fn level_policy(&self, level: SecurityLevel) -> LevelPolicy {
        self.defaults
            .get(&level)
            .cloned()
            .unwrap_or_else(|| builtin_level_policy(level))
    }

    /// Effective severity for one call.
    ///
    /// Precedence: the tool's explicit level, else its category's level,
    /// escalated (never lowered) by matching parameter rules, defaulting to
    /// `medium` when nothing classified the call.
    pub fn resolve_severity(&self, tool_name: &str, args: &Value) -> SecurityLevel {
        self.resolve(tool_name, args).security_level
    }

    /// Full severity resolution, including the approval message and the
    /// rules that matched.
    pub fn resolve(&self, tool_name: &str, args: &Value) -> SeverityResolution {
        let metadata = self.tools.get(tool_name);

        let mut candidate = metadata.and_then(|m| m.security_level);
        if candidate.is_none() {
            candidate = metadata
                .and_then(|m| m.category.as_deref())
                .and_then(|category| self.categories.get(category))
                .and_then(|c| c.security_level);
        }

        // Parameter rules only ever escalate.
        let rules = evaluate_all(tool_name, args, &self.parameter_rules);
        if rules.security_level.is_some() && compare(rules.security_level, candidate) > 0 {
            candidate = rules.security_level;
        }

        SeverityResolution {
            security_level: candidate.unwrap_or(SecurityLevel::Medium),
            message: rules
                .message
                .or_else(|| metadata.and_then(|m| m.permission_message.clone())),
            matched_rules: rules.matched_rules,
        }
    }

    /// Overlay `other` onto this policy. Entries in `other` win; a tool's
    /// rule list is replaced wholesale, not appended to.
    pub fn merge(&mut self, other: SecurityPolicy) {
        self.tools.extend(other.tools);
        self.categories.extend(other.categories);
        self.defaults.extend(other.defaults);
        self.parameter_rules.extend(other.parameter_rules);
    }

    /// Pre-deployment policy linting.
    ///
    /// Returns findings instead of failing: errors make the policy invalid
    /// (malformed expiry tokens, empty rule params), warnings are advisory
    /// (levels without a `defaults` entry, unrecognized conditions, regex
    /// patterns that will never match).
    pub fn validate(&self) -> PolicyValidation {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for (name, metadata) in &self.tools {
            if let Some(level) = metadata.security_level {
                if !self.defaults.contains_key(&level) {
                    warnings.push(format!(
                        "tool '{}' uses level '{}' which has no defaults entry (built-in baseline applies)",
                        name, level
                    ));
                }
            }
            if let Some(category) = &metadata.category {
                if !self.categories.contains_key(category) {
                    warnings.push(format!(
                        "tool '{}' references unknown category '{}'",
                        name, category
                    ));
                }
            }
        }

        for (name, category) in &self.categories {
            if let Some(level) = category.security_level {
                if !self.defaults.contains_key(&level) {
                    warnings.push(format!(
                        "category '{}' uses level '{}' which has no defaults entry (built-in baseline applies)",
                        name, level
                    ));
                }
            }
        }

        for (level, policy) in &self.defaults {
            if let Some(token) = &policy.expiry {
                if let Err(e) = Expiry::parse(token) {
                    errors.push(format!("defaults for '{}': {}", level, e));
                }
            }
        }

        for (tool, rules) in &self.parameter_rules {
            for rule in rules {
                if rule.param.is_empty() {
                    errors.push(format!("rule for '{}' has an empty param name", tool));
                }
                if rule.condition == Condition::Unknown {
                    warnings.push(format!(
                        "rule for '{}' on param '{}' has an unrecognized condition",
                        tool, rule.param
                    ));
                }
                if rule.condition == Condition::Regex {
                    if let Some(pattern) = rule.value.as_str() {
                        if Regex::new(pattern).is_err() {
                            warnings.push(format!(
                                "rule for '{}' on param '{}' has an invalid regex and will never match",
                                tool, rule.param
                            ));
                        }
                    }
                }
            }
        }

        PolicyValidation {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}
