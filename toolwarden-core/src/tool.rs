//! Tool-call shapes exchanged with the execution engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

use crate::policy::Action;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool-call identifier assigned by the model.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Raw JSON arguments.
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }

    /// Same call with replacement arguments.
    pub fn with_args(&self, args: Value) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            args,
        }
    }
}

/// A tool result message as the model sees it.
///
/// Denials are delivered in this shape too, so the model can read the reason
/// and adapt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolMessage {
    pub content: String,
    pub tool_call_id: String,
}

impl ToolMessage {
    pub fn new(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
        }
    }
}

/// How the registry classifies a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    #[default]
    General,
    /// Operates on workspace paths; triggers filesystem sub-checks.
    Filesystem,
    /// Talks to the network.
    Network,
    /// Calls an external connector; triggers connector sub-checks.
    Connector,
}

/// One entry of the tool registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    /// Declared action; inferred from the name when absent.
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub category: ToolCategory,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ToolDescriptor {
    /// An enabled, general-purpose tool with an inferred action.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: None,
            category: ToolCategory::General,
            enabled: true,
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_category(mut self, category: ToolCategory) -> Self {
        self.category = category;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Errors returned by wrapped tool handlers.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

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

/// The tool implementation the middleware wraps.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, call: &ToolCall) -> Result<ToolMessage, ToolError>;
}

/// Adapter turning an async closure into a [`ToolHandler`].
pub struct FnHandler<F>(F);

/// Wrap a closure as a [`ToolHandler`].
///
/// ```rust
/// use toolwarden_core::tool::{handler_fn, ToolCall, ToolMessage};
///
/// let handler = handler_fn(|call: ToolCall| async move {
///     Ok(ToolMessage::new(call.id, "done"))
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(ToolCall) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolMessage, ToolError>> + Send,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(ToolCall) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolMessage, ToolError>> + Send,
{
    async fn invoke(&self, call: &ToolCall) -> Result<ToolMessage, ToolError> {
        (self.0)(call.clone()).await
    }
}
