//! Test helpers for code built on toolwarden.
//!
//! Enable with the `test-utils` feature.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::events::{AuthorizationEvent, AuthorizationHook};
use crate::tool::{ToolCall, ToolError, ToolHandler, ToolMessage};

pub use crate::clock::ManualClock;

/// A [`ToolHandler`] that records every call it receives.
///
/// Replies with `"ok: <tool name>"`.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    calls: Arc<Mutex<Vec<ToolCall>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ToolHandler for RecordingHandler {
    async fn invoke(&self, call: &ToolCall) -> Result<ToolMessage, ToolError> {
        self.calls.lock().push(call.clone());
        Ok(ToolMessage::new(call.id.clone(), format!("ok: {}", call.name)))
    }
}

/// Hook that collects events for later inspection.
#[derive(Debug, Clone, Default)]
pub struct EventCollector {
    events: Arc<Mutex<Vec<AuthorizationEvent>>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuthorizationEvent> {
        self.events.lock().clone()
    }

    /// Short names of the collected events, in order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(event_kind).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl AuthorizationHook for EventCollector {
    fn on_event(&self, event: &AuthorizationEvent) {
        self.events.lock().push(event.clone());
    }
}

fn event_kind(event: &AuthorizationEvent) -> &'static str {
    match event {
        AuthorizationEvent::CheckStarted { .. } => "check_started",
        AuthorizationEvent::PolicyResolved { .. } => "policy_resolved",
        AuthorizationEvent::Denied { .. } => "denied",
        AuthorizationEvent::RateLimited { .. } => "rate_limited",
        AuthorizationEvent::InterruptRequested { .. } => "interrupt_requested",
        AuthorizationEvent::GrantRecorded { .. } => "grant_recorded",
        AuthorizationEvent::Proceeded { .. } => "proceeded",
        AuthorizationEvent::Cancelled { .. } => "cancelled",
    }
}
