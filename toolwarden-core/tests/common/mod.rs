//! Common test utilities shared across test files.
//!
//! This module provides mock implementations and test helpers.
//! Items here may not be used by all test files, hence the module-level allow.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use toolwarden_core::{
    policy::PolicyStoreError, tool::ToolCategory, Action, AuthorizationEvent, AuthorizationHook,
    InterruptRequest, PolicyRule, PolicyStore, ResourceType, ToolAuthorizationMiddleware,
    ToolCall, ToolDescriptor, ToolError, ToolHandler, ToolMessage,
};

// ===== Counting Handler =====

/// Tool handler that counts invocations and echoes the tool name.
#[derive(Clone, Default)]
pub struct CountingHandler {
    calls: Arc<Mutex<Vec<ToolCall>>>,
}

impl CountingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolHandler for CountingHandler {
    async fn invoke(&self, call: &ToolCall) -> Result<ToolMessage, ToolError> {
        self.calls.lock().unwrap().push(call.clone());
        Ok(ToolMessage::new(call.id.clone(), format!("done: {}", call.name)))
    }
}

// ===== Event Log =====

/// Hook that keeps every event it sees.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<AuthorizationEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuthorizationEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_grants(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, AuthorizationEvent::GrantRecorded { .. }))
            .count()
    }
}

impl AuthorizationHook for EventLog {
    fn on_event(&self, event: &AuthorizationEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ===== Failing Policy Store =====

/// A policy store whose lookups always fail.
pub struct BrokenPolicyStore;

#[async_trait]
impl PolicyStore for BrokenPolicyStore {
    async fn rules_for(
        &self,
        _agent: &str,
        _resource_type: ResourceType,
        _action: Action,
    ) -> Result<Vec<PolicyRule>, PolicyStoreError> {
        Err(PolicyStoreError::Read("connection reset".to_string()))
    }

    async fn save(&self, _rule: PolicyRule) -> Result<(), PolicyStoreError> {
        Err(PolicyStoreError::Write("read only".to_string()))
    }

    async fn load_all(&self) -> Result<Vec<PolicyRule>, PolicyStoreError> {
        Err(PolicyStoreError::Read("connection reset".to_string()))
    }

    async fn delete(&self, _id: &str) -> Result<bool, PolicyStoreError> {
        Ok(false)
    }

    async fn clear(&self) -> Result<(), PolicyStoreError> {
        Ok(())
    }
}

// ===== Registry and Builders =====

/// A small tool registry covering each check kind.
pub fn registry() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new("read_file").with_category(ToolCategory::Filesystem),
        ToolDescriptor::new("write_file").with_category(ToolCategory::Filesystem),
        ToolDescriptor::new("web_fetch").with_action(Action::Read),
        ToolDescriptor::new("run_tests").with_action(Action::Exec),
        ToolDescriptor::new("shell").disabled(),
        ToolDescriptor::new("read_skill"),
        ToolDescriptor::new("connector__linear__create_issue"),
    ]
}

/// Middleware over `rules` with the built-in security defaults.
pub fn middleware_with_rules(rules: Vec<PolicyRule>) -> ToolAuthorizationMiddleware {
    ToolAuthorizationMiddleware::builder()
        .with_workspace_root("/workspace")
        .with_policy_store(toolwarden_core::MemoryPolicyStore::with_rules(rules))
        .add_tools(registry())
        .build()
        .expect("middleware builds")
}

pub fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, args)
}

pub fn interrupt_of(outcome: toolwarden_core::Authorization) -> InterruptRequest {
    match outcome {
        toolwarden_core::Authorization::Interrupt(request) => request,
        other => panic!("expected interrupt, got {:?}", other),
    }
}

pub fn denial_of(outcome: toolwarden_core::Authorization) -> ToolMessage {
    match outcome {
        toolwarden_core::Authorization::Deny(message) => message,
        other => panic!("expected denial, got {:?}", other),
    }
}
