use serde::Serialize;
use serde_json::Value;

use crate::policy::{Decision, PolicySource, ResourceRef};

/// Events emitted while authorizing tool calls
///
/// These events let observers follow every decision the middleware makes,
/// in the order it makes them.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AuthorizationEvent {
    /// A tool call entered the middleware
    CheckStarted {
        thread_id: String,
        agent_id: String,
        tool_call_id: String,
        tool_name: String,
    },

    /// A resource check was resolved against policy
    PolicyResolved {
        tool_call_id: String,
        resource: ResourceRef,
        decision: Decision,
        source: PolicySource,
    },

    /// The call was denied and a synthetic tool message returned
    Denied {
        tool_call_id: String,
        tool_name: String,
        /// Resource that failed, if the denial came from a resource check
        resource: Option<ResourceRef>,
        reason: String,
    },

    /// A rate limit blocked the call
    RateLimited {
        tool_call_id: String,
        resource: ResourceRef,
        retry_after_ms: u64,
    },

    /// The call needs human approval
    InterruptRequested {
        tool_call_id: String,
        tool_name: String,
        resource: ResourceRef,
        decision: Decision,
        args: Value,
    },

    /// A session grant was recorded after approval
    GrantRecorded {
        thread_id: String,
        agent_id: String,
        resource: ResourceRef,
    },

    /// Every check passed and the wrapped handler is being invoked
    Proceeded {
        tool_call_id: String,
        tool_name: String,
    },

    /// The run was cancelled while the call was being checked
    Cancelled {
        tool_call_id: String,
        tool_name: String,
    },
}

impl AuthorizationEvent {
    /// Tool-call id the event refers to, if any
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            AuthorizationEvent::CheckStarted { tool_call_id, .. }
            | AuthorizationEvent::PolicyResolved { tool_call_id, .. }
            | AuthorizationEvent::Denied { tool_call_id, .. }
            | AuthorizationEvent::RateLimited { tool_call_id, .. }
            | AuthorizationEvent::InterruptRequested { tool_call_id, .. }
            | AuthorizationEvent::Proceeded { tool_call_id, .. }
            | AuthorizationEvent::Cancelled { tool_call_id, .. } => Some(tool_call_id),
            AuthorizationEvent::GrantRecorded { .. } => None,
        }
    }
}

/// Hook for observing authorization events
///
/// # Example
/// ```
/// use toolwarden_core::events::{AuthorizationEvent, AuthorizationHook};
///
/// struct Audit;
///
/// impl AuthorizationHook for Audit {
///     fn on_event(&self, event: &AuthorizationEvent) {
///         if let AuthorizationEvent::Denied { tool_name, reason, .. } = event {
///             println!("{} denied: {}", tool_name, reason);
///         }
///     }
/// }
/// ```
pub trait AuthorizationHook: Send + Sync {
    /// Called when an event occurs
    fn on_event(&self, event: &AuthorizationEvent);
}

/// Blanket implementation for closures
impl<F> AuthorizationHook for F
where
    F: Fn(&AuthorizationEvent) + Send + Sync,
{
    fn on_event(&self, event: &AuthorizationEvent) {
        self(event)
    }
}
