//! # Toolwarden
//!
//! Authorization core for autonomous agents: decides, for every tool call an
//! agent (or one of its delegated subagents) makes, whether it may run, must
//! pause for a human, or is rate limited.
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//! use toolwarden_core::middleware::{ResumeDecision, ToolAuthorizationMiddleware, ToolCallOutcome};
//! use toolwarden_core::policy::{Action, Decision, ResourceType, SecurityDefaults};
//! use toolwarden_core::tool::{handler_fn, ToolCall, ToolDescriptor, ToolMessage};
//!
//! # tokio_test::block_on(async {
//! let middleware = ToolAuthorizationMiddleware::builder()
//!     .with_workspace_root("/workspace")
//!     .with_security_defaults(SecurityDefaults::default().with(
//!         ResourceType::Tool,
//!         Action::Write,
//!         Decision::AllowInSession,
//!     ))
//!     .add_tool(ToolDescriptor::new("write_file"))
//!     .build()?;
//!
//! let handler = handler_fn(|call: ToolCall| async move {
//!     Ok(ToolMessage::new(call.id, "written"))
//! });
//! let cancel = CancellationToken::new();
//! let call = ToolCall::new("call_1", "write_file", json!({"path": "notes.txt"}));
//!
//! // First write pauses for approval
//! let ToolCallOutcome::Interrupted(pending) = middleware
//!     .wrap_tool_call("thread-1", &call, &handler, &cancel)
//!     .await?
//! else {
//!     panic!("expected an interrupt");
//! };
//!
//! // The human approves; the approval is remembered for the thread
//! let outcome = middleware
//!     .resume("thread-1", &call, &pending, ResumeDecision::Approve, &handler, &cancel)
//!     .await?;
//! assert!(matches!(outcome, ToolCallOutcome::Completed(ref m) if m.content == "written"));
//!
//! let again = ToolCall::new("call_2", "write_file", json!({"path": "notes.txt"}));
//! let outcome = middleware.wrap_tool_call("thread-1", &again, &handler, &cancel).await?;
//! assert!(matches!(outcome, ToolCallOutcome::Completed(_)));
//! # Ok::<(), toolwarden_core::Error>(())
//! # }).unwrap();
//! ```
//!
//! ## Components
//!
//! - [`policy`]: rule table, security defaults, resolver and constraints
//! - [`session`]: per-thread session grants and rate-limit windows
//! - [`middleware`]: the gate wrapped around every tool handler
//! - [`delegation`]: independent middleware for subagents
//! - [`config`]: JSON configuration with environment expansion
//! - [`events`]: observer hooks for every decision
//!
//! ## Feature Flags
//!
//! - `test-utils` - Recording tool handler, event collector and manual clock

pub mod args;
pub mod clock;
pub mod config;
pub mod delegation;
pub mod error;
pub mod events;
pub mod middleware;
pub mod policy;
pub mod session;
pub mod tool;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config_file, AuthorizationConfig, ConfigError};
pub use delegation::SubagentPolicy;
pub use error::{Error, Result};
pub use events::{AuthorizationEvent, AuthorizationHook};
pub use middleware::{
    Authorization, AuthorizationError, InterruptOnConfig, InterruptRequest, MiddlewareBuilder,
    ResumeDecision, ToolAuthorizationMiddleware, ToolCallOutcome, ToolPolicyContext,
};
pub use policy::{
    Action, Decision, FilePolicyStore, MemoryPolicyStore, PolicyResolver, PolicyRule,
    PolicyStore, ResourceRef, ResourceType, Scope, SecurityDefaults,
};
pub use session::{PolicySessionStore, RateLimiter, SessionGrants};
pub use tool::{ToolCall, ToolDescriptor, ToolError, ToolHandler, ToolMessage};
