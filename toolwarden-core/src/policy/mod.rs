//! Policy vocabulary and decision resolution.
//!
//! Every authorization check is phrased as a question about one
//! `(agent, resource type, resource key, action)` tuple. This module defines
//! that vocabulary and the pieces that answer it:
//!
//! - **[`PolicyRule`]**: one row of the flat rule table
//! - **[`PolicyStore`]**: trait for loading rules ([`MemoryPolicyStore`], [`FilePolicyStore`])
//! - **[`SecurityDefaults`]**: workspace-wide fallback when no rule matches
//! - **[`PolicyResolver`]**: exact rule, then wildcard rule, then defaults
//! - **[`PolicyConstraints`]**: typed constraints attached to a rule
//!
//! # Example
//!
//! ```rust
//! use toolwarden_core::policy::{
//!     Action, Decision, MemoryPolicyStore, PolicyResolver, PolicyRule, ResourceType, Scope,
//! };
//!
//! # tokio_test::block_on(async {
//! let store = MemoryPolicyStore::new();
//! store.insert(PolicyRule::new(ResourceType::Tool, "bash", Action::Exec, Decision::Deny));
//!
//! let resolver = PolicyResolver::new(store);
//! let resolved = resolver
//!     .resolve(None, ResourceType::Tool, "bash", Action::Exec, Scope::Workspace, None)
//!     .await;
//! assert_eq!(resolved.decision, Decision::Deny);
//! # });
//! ```

pub mod constraint;
mod defaults;
mod resolver;
mod rule;
mod store;

pub use constraint::{
    evaluate, ConstraintError, ConstraintOutcome, PolicyConstraints, RateLimit,
    ResourceConstraint,
};
pub use defaults::{ActionDefaults, SecurityDefaults};
pub use resolver::{PolicyResolver, PolicySource, ResolvedPolicy};
pub use rule::{PolicyRule, WILDCARD_RESOURCE};
pub use store::{FilePolicyStore, MemoryPolicyStore, PolicyStore, PolicyStoreError};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Agent id used when a check is made without an explicit agent.
pub const DEFAULT_AGENT_ID: &str = "default";

/// Normalize an optional agent id to the key used in rules, grants and windows.
pub fn agent_key(agent_id: Option<&str>) -> &str {
    match agent_id {
        Some(id) if !id.is_empty() => id,
        _ => DEFAULT_AGENT_ID,
    }
}

/// Kind of resource an action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// A tool, keyed by tool name.
    Tool,
    /// A filesystem location, keyed by workspace-relative path.
    Filesystem,
    /// A network destination, keyed by host.
    Network,
    /// An external connector, keyed by connector key.
    Connector,
}

impl ResourceType {
    /// All resource types, in sub-check order.
    pub const ALL: [ResourceType; 4] = [
        ResourceType::Tool,
        ResourceType::Filesystem,
        ResourceType::Network,
        ResourceType::Connector,
    ];

    /// Lowercase name as it appears in rule tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Tool => "tool",
            ResourceType::Filesystem => "filesystem",
            ResourceType::Network => "network",
            ResourceType::Connector => "connector",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the agent wants to do with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Exec,
    Post,
}

impl Action {
    /// Lowercase name as it appears in rule tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Exec => "exec",
            Action::Post => "post",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a rule or approval applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Only the current conversation thread.
    Session,
    /// The whole workspace configuration.
    #[default]
    Workspace,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Session => write!(f, "session"),
            Scope::Workspace => write!(f, "workspace"),
        }
    }
}

/// Outcome of policy resolution.
///
/// `Deny` is absorbing: once any check yields it, nothing else runs.
/// `Ask` and `AllowInSession` both require a human unless already granted;
/// only `AllowInSession` approvals are remembered for the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
    Ask,
    AllowInSession,
}

impl Decision {
    /// True for decisions that need a human unless a grant exists.
    pub fn requires_approval(&self) -> bool {
        matches!(self, Decision::Ask | Decision::AllowInSession)
    }

    /// True if the decision is [`Decision::Deny`].
    pub fn is_deny(&self) -> bool {
        matches!(self, Decision::Deny)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => write!(f, "allow"),
            Decision::Deny => write!(f, "deny"),
            Decision::Ask => write!(f, "ask"),
            Decision::AllowInSession => write!(f, "allow_in_session"),
        }
    }
}

/// A single resource addressed by a check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub resource_type: ResourceType,
    pub resource_key: String,
    pub action: Action,
}

impl ResourceRef {
    pub fn new(resource_type: ResourceType, resource_key: impl Into<String>, action: Action) -> Self {
        Self {
            resource_type,
            resource_key: resource_key.into(),
            action,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' ({})",
            self.resource_type, self.resource_key, self.action
        )
    }
}
