//! Parameter rule matching.
//!
//! Rules inspect a call's argument bag and can escalate the call's severity
//! when a condition matches: an `amount` above a threshold, a path under a
//! sensitive prefix, a recipient outside the company domain. Matching is
//! deliberately forgiving: a rule that cannot be evaluated (missing
//! argument, bad regex, unrecognized condition) never blocks the call, it
//! simply does not match.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::level::{higher, SecurityLevel};

/// Comparison a [`ParameterRule`] applies to one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    /// Strict JSON value equality.
    Equals,
    /// Substring test over the stringified operands.
    Contains,
    /// Prefix test over the stringified operands.
    StartsWith,
    /// Suffix test over the stringified operands.
    EndsWith,
    /// Regular-expression test; an invalid pattern never matches.
    Regex,
    /// Numeric `>` after coercing both operands.
    GreaterThan,
    /// Numeric `<` after coercing both operands.
    LessThan,
    /// Condition string this version does not recognize; never matches.
    #[serde(other)]
    Unknown,
}

/// A declarative predicate over a call's arguments.
///
/// Rules carry no identity; they are matched in registration order against
/// each call. A rule may escalate severity (`security_level`) and supply the
/// message shown when the call is held for approval.
///
/// # Example
///
/// ```rust
/// use toolgate_core::{ParameterRule, SecurityLevel};
///
/// let rule = ParameterRule::greater_than("amount", 1000)
///     .with_level(SecurityLevel::Critical)
///     .with_message("Large transfers need explicit approval");
/// assert_eq!(rule.param, "amount");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterRule {
    /// Argument name this rule inspects.
    pub param: String,

    /// Comparison to apply.
    pub condition: Condition,

    /// Reference value the argument is compared against.
    pub value: Value,

    /// Severity the call escalates to when this rule matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_level: Option<SecurityLevel>,

    /// Explanation surfaced in the permission prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ParameterRule {
    fn new(param: impl Into<String>, condition: Condition, value: impl Into<Value>) -> Self {
        Self {
            param: param.into(),
            condition,
            value: value.into(),
            security_level: None,
            message: None,
        }
    }

    /// Rule matching when the argument equals `value` exactly.
    pub fn equals(param: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(param, Condition::Equals, value)
    }

    /// Rule matching when the stringified argument contains `value`.
    pub fn contains(param: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(param, Condition::Contains, value)
    }

    /// Rule matching when the stringified argument starts with `value`.
    pub fn starts_with(param: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(param, Condition::StartsWith, value)
    }

    /// Rule matching when the stringified argument ends with `value`.
    pub fn ends_with(param: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(param, Condition::EndsWith, value)
    }

    /// Rule matching when `pattern` matches the stringified argument.
    pub fn regex(param: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(param, Condition::Regex, pattern.into())
    }

    /// Rule matching when the argument is numerically greater than `value`.
    pub fn greater_than(param: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(param, Condition::GreaterThan, value)
    }

    /// Rule matching when the argument is numerically less than `value`.
    pub fn less_than(param: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(param, Condition::LessThan, value)
    }

    /// Set the severity this rule escalates to.
    pub fn with_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = Some(level);
        self
    }

    /// Set the approval-prompt message for this rule.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Stringify a value for the text conditions. Strings are used verbatim
/// (no surrounding quotes); everything else uses its JSON text.
fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Coerce a value to f64 for the numeric conditions.
fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Test a single rule against a call's argument bag.
///
/// An argument absent from `args` never matches, regardless of condition.
pub fn evaluate(rule: &ParameterRule, args: &Value) -> bool {
    let Some(actual) = args.get(rule.param.as_str()) else {
        return false;
    };

    match rule.condition {
        Condition::Equals => actual == &rule.value,
        Condition::Contains => text_of(actual).contains(&text_of(&rule.value)),
        Condition::StartsWith => text_of(actual).starts_with(&text_of(&rule.value)),
        Condition::EndsWith => text_of(actual).ends_with(&text_of(&rule.value)),
        Condition::Regex => match Regex::new(&text_of(&rule.value)) {
            Ok(pattern) => pattern.is_match(&text_of(actual)),
            Err(e) => {
                warn!(param = %rule.param, error = %e, "invalid regex in parameter rule, treating as non-match");
                false
            }
        },
        Condition::GreaterThan => match (number_of(actual), number_of(&rule.value)) {
            (Some(actual), Some(threshold)) => actual > threshold,
            _ => false,
        },
        Condition::LessThan => match (number_of(actual), number_of(&rule.value)) {
            (Some(actual), Some(threshold)) => actual < threshold,
            _ => false,
        },
        Condition::Unknown => {
            warn!(param = %rule.param, "unrecognized rule condition, treating as non-match");
            false
        }
    }
}

/// Aggregate outcome of matching a tool's rule list against one call.
#[derive(Debug, Clone, Default)]
pub struct RuleEvaluation {
    /// Most severe level among matching rules that declare one.
    pub security_level: Option<SecurityLevel>,

    /// Message of the last matching rule that carries one.
    pub message: Option<String>,

    /// Every rule that matched, with or without a level.
    pub matched_rules: Vec<ParameterRule>,
}

/// Match every rule registered for `tool_name` against `args`.
///
/// Severity folds upward via [`higher`] over matching rules that declare a
/// level. The message is taken from the LAST matching rule that has one;
/// registration order decides, not severity.
pub fn evaluate_all(
    tool_name: &str,
    args: &Value,
    rule_table: &HashMap<String, Vec<ParameterRule>>,
) -> RuleEvaluation {
    let mut result = RuleEvaluation::default();

    let Some(rules) = rule_table.get(tool_name) else {
        return result;
    };

    for rule in rules {
        if !evaluate(rule, args) {
            continue;
        }
        if let Some(level) = rule.security_level {
            result.security_level = Some(higher(result.security_level, Some(level)));
        }
        if rule.message.is_some() {
            result.message = rule.message.clone();
        }
        result.matched_rules.push(rule.clone());
    }

    result
}
