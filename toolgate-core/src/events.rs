//! Gate lifecycle notifications.
//!
//! Observers receive these synchronously while a gating decision is made.
//! They are a side channel for UIs and audit logs: an observer can never
//! influence the decision, and an observer that panics is contained and
//! logged by the hooks.

use serde_json::Value;

use crate::level::SecurityLevel;

/// Events emitted around gating decisions.
#[derive(Debug, Clone)]
pub enum GateEvent {
    /// A call needs approval and was held before execution.
    PermissionRequested {
        /// Tool name.
        tool_name: String,
        /// Acting identifier extracted from the call context.
        identifier: String,
        /// Storage key the eventual decision will live under.
        key: String,
        /// Effective severity of the held call.
        security_level: SecurityLevel,
        /// Arguments of the held call.
        params: Value,
    },

    /// A call was approved, whether by stored grant, human decision, or a gated
    /// call completed.
    PermissionGranted {
        /// Tool name.
        tool_name: String,
        /// Acting identifier.
        identifier: String,
    },

    /// A call was denied by a human decision.
    PermissionDenied {
        /// Tool name.
        tool_name: String,
        /// Acting identifier.
        identifier: String,
        /// Reason for denial.
        reason: String,
    },
}

/// Observer for gate events.
///
/// # Example
///
/// ```
/// use toolgate_core::{GateEvent, GateObserver};
///
/// struct AuditLog;
///
/// impl GateObserver for AuditLog {
///     fn on_event(&self, event: &GateEvent) {
///         if let GateEvent::PermissionRequested { tool_name, identifier, .. } = event {
///             println!("{} is waiting on approval for {}", identifier, tool_name);
///         }
///     }
/// }
/// ```
pub trait GateObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &GateEvent);
}

/// Blanket implementation for closures.
impl<F> GateObserver for F
where
    F: Fn(&GateEvent) + Send + Sync,
{
    fn on_event(&self, event: &GateEvent) {
        self(event)
    }
}
