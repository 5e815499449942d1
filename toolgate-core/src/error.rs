//! Top-level error types for toolgate.
//!
//! The inner layers carry precise errors ([`StoreError`], [`ToolError`],
//! [`ExpiryParseError`]); this module flattens them into the categories a
//! host typically branches on at the integration boundary.

use thiserror::Error;

use crate::policy::ExpiryParseError;
use crate::store::StoreError;
use crate::tool::ToolError;

/// Flattened error for toolgate operations.
///
/// - [`Error::Store`] - the grant backend failed; no gating decision was
///   made, the host owns the failure policy
/// - [`Error::Tool`] - a wrapped callable failed outside the shaped-payload
///   path
/// - [`Error::Policy`] - a policy document or expiry token is malformed
#[derive(Debug, Error)]
pub enum Error {
    /// Grant storage failed.
    #[error("store error: {0}")]
    Store(String),

    /// A wrapped tool failed.
    #[error("tool error: {0}")]
    Tool(String),

    /// A policy document is malformed.
    #[error("policy error: {0}")]
    Policy(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Returns true if this is a store error.
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns true if this is a tool error.
    pub fn is_tool(&self) -> bool {
        matches!(self, Self::Tool(_))
    }

    /// Returns true if this is a policy error.
    pub fn is_policy(&self) -> bool {
        matches!(self, Self::Policy(_))
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<ToolError> for Error {
    fn from(err: ToolError) -> Self {
        Self::Tool(err.to_string())
    }
}

impl From<ExpiryParseError> for Error {
    fn from(err: ExpiryParseError) -> Self {
        Self::Policy(err.to_string())
    }
}

/// Result type for toolgate operations.
pub type Result<T> = std::result::Result<T, Error>;
