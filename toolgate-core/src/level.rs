//! Security level ordering.
//!
//! Every gated call resolves to one of five severity levels. Levels form a
//! total order by rank, and merging two levels always keeps the more severe
//! one. Unclassified severity is not treated as harmless: merging two absent
//! levels yields [`SecurityLevel::Medium`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity classification governing whether a gated call needs approval.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    /// No meaningful risk; never prompts.
    None,
    /// Low risk (read-only lookups, formatting).
    Low,
    /// Moderate risk; the default for unclassified tools.
    Medium,
    /// High risk (writes, outbound messages).
    High,
    /// Critical risk (payments, destructive operations).
    Critical,
}

impl SecurityLevel {
    /// Numeric rank used for ordering: none=0 through critical=4.
    pub fn rank(self) -> i32 {
        match self {
            SecurityLevel::None => 0,
            SecurityLevel::Low => 1,
            SecurityLevel::Medium => 2,
            SecurityLevel::High => 3,
            SecurityLevel::Critical => 4,
        }
    }

    /// Lowercase name, matching the policy document representation.
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityLevel::None => "none",
            SecurityLevel::Low => "low",
            SecurityLevel::Medium => "medium",
            SecurityLevel::High => "high",
            SecurityLevel::Critical => "critical",
        }
    }

    /// All levels in ascending order.
    pub fn all() -> [SecurityLevel; 5] {
        [
            SecurityLevel::None,
            SecurityLevel::Low,
            SecurityLevel::Medium,
            SecurityLevel::High,
            SecurityLevel::Critical,
        ]
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a level string outside the five known names.
#[derive(Debug, Clone, Error)]
#[error("unknown security level: '{0}'")]
pub struct UnknownLevelError(pub String);

impl std::str::FromStr for SecurityLevel {
    type Err = UnknownLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SecurityLevel::None),
            "low" => Ok(SecurityLevel::Low),
            "medium" => Ok(SecurityLevel::Medium),
            "high" => Ok(SecurityLevel::High),
            "critical" => Ok(SecurityLevel::Critical),
            other => Err(UnknownLevelError(other.to_string())),
        }
    }
}

/// Rank of an optional level. Absent sorts below every defined level (-1).
pub fn rank(level: Option<SecurityLevel>) -> i32 {
    level.map_or(-1, SecurityLevel::rank)
}

/// Three-way comparison of optional levels: negative when `a` is less
/// severe than `b`, zero on equal rank.
pub fn compare(a: Option<SecurityLevel>, b: Option<SecurityLevel>) -> i32 {
    rank(a) - rank(b)
}

/// Merge two optional levels into the more severe defined level.
///
/// Both absent resolves to [`SecurityLevel::Medium`]: a call nobody
/// classified is moderate risk, not "none". With exactly one defined level,
/// that level wins. Equal ranks return the second operand.
pub fn higher(a: Option<SecurityLevel>, b: Option<SecurityLevel>) -> SecurityLevel {
    match (a, b) {
        (None, None) => SecurityLevel::Medium,
        (Some(level), None) => level,
        (None, Some(level)) => level,
        (Some(x), Some(y)) => {
            if x.rank() > y.rank() {
                x
            } else {
                y
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_operands() -> Vec<Option<SecurityLevel>> {
        let mut operands: Vec<Option<SecurityLevel>> =
            SecurityLevel::all().into_iter().map(Some).collect();
        operands.push(None);
        operands
    }

    #[test]
    fn test_rank_ordering() {
        assert_eq!(rank(None), -1);
        assert_eq!(rank(Some(SecurityLevel::None)), 0);
        assert_eq!(rank(Some(SecurityLevel::Critical)), 4);
        assert!(SecurityLevel::Low < SecurityLevel::High);
    }

    #[test]
    fn test_compare_antisymmetry() {
        for a in all_operands() {
            for b in all_operands() {
                assert_eq!(compare(a, b), -compare(b, a), "failed for {:?} vs {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_higher_never_below_operands() {
        for a in all_operands() {
            for b in all_operands() {
                let merged = higher(a, b);
                assert!(merged.rank() >= rank(a), "failed for {:?} vs {:?}", a, b);
                assert!(merged.rank() >= rank(b), "failed for {:?} vs {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_higher_both_undefined_is_medium() {
        assert_eq!(higher(None, None), SecurityLevel::Medium);
    }

    #[test]
    fn test_higher_one_defined() {
        assert_eq!(higher(Some(SecurityLevel::None), None), SecurityLevel::None);
        assert_eq!(higher(None, Some(SecurityLevel::Low)), SecurityLevel::Low);
    }

    #[test]
    fn test_higher_tie_returns_second_operand() {
        // Equal ranks are deterministic: the second operand wins.
        let merged = higher(Some(SecurityLevel::High), Some(SecurityLevel::High));
        assert_eq!(merged, SecurityLevel::High);
        assert_eq!(
            higher(Some(SecurityLevel::Low), Some(SecurityLevel::Critical)),
            SecurityLevel::Critical
        );
        assert_eq!(
            higher(Some(SecurityLevel::Critical), Some(SecurityLevel::Low)),
            SecurityLevel::Critical
        );
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert_eq!("medium".parse::<SecurityLevel>().unwrap(), SecurityLevel::Medium);
        assert!("extreme".parse::<SecurityLevel>().is_err());
        assert!("Medium".parse::<SecurityLevel>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&SecurityLevel::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let parsed: SecurityLevel = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(parsed, SecurityLevel::Low);
        assert!(serde_json::from_str::<SecurityLevel>("\"extreme\"").is_err());
    }
}
