//! Policy rule rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Action, Decision, ResourceType, Scope};

/// Resource key that matches every resource of a type.
pub const WILDCARD_RESOURCE: &str = "*";

/// One row of the flat `(agent, resource, action)` rule table.
///
/// A rule without an `agent_id` applies to every agent; a rule naming an
/// agent wins over it at the same resource specificity.
///
/// # Example
///
/// ```rust
/// use toolwarden_core::policy::{Action, Decision, PolicyRule, ResourceType, Scope};
///
/// // Let the researcher read anything over the network, at most 10 calls a minute
/// let rule = PolicyRule::new(ResourceType::Network, "*", Action::Read, Decision::Allow)
///     .for_agent("researcher")
///     .with_constraints(serde_json::json!({
///         "rateLimit": {"maxCalls": 10, "windowMs": 60000}
///     }));
///
/// assert!(rule.is_wildcard());
/// assert_eq!(rule.scope, Scope::Workspace);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    /// Unique id of this rule (used for deletion).
    #[serde(default = "new_rule_id")]
    pub id: String,

    /// Agent this rule is scoped to, or `None` for every agent.
    #[serde(default)]
    pub agent_id: Option<String>,

    pub resource_type: ResourceType,

    /// Exact resource key, or [`WILDCARD_RESOURCE`].
    pub resource_key: String,

    pub action: Action,

    pub decision: Decision,

    #[serde(default)]
    pub scope: Scope,

    /// Raw constraint payload. Parsed and validated by the resolver.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub constraints: Value,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn new_rule_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl PolicyRule {
    /// Create a workspace-scoped rule that applies to every agent.
    pub fn new(
        resource_type: ResourceType,
        resource_key: impl Into<String>,
        action: Action,
        decision: Decision,
    ) -> Self {
        Self {
            id: new_rule_id(),
            agent_id: None,
            resource_type,
            resource_key: resource_key.into(),
            action,
            decision,
            scope: Scope::default(),
            constraints: Value::Null,
            created_at: Utc::now(),
        }
    }

    /// Restrict this rule to a single agent.
    pub fn for_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Set the scope for this rule.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Attach a raw constraint payload.
    pub fn with_constraints(mut self, constraints: Value) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn is_wildcard(&self) -> bool {
        self.resource_key == WILDCARD_RESOURCE
    }

    /// Whether this rule can apply to the given agent key.
    pub fn applies_to_agent(&self, agent: &str) -> bool {
        match &self.agent_id {
            None => true,
            Some(id) => id == agent,
        }
    }

    /// Whether this rule is visible when resolving with `scope`.
    ///
    /// Workspace rules are always visible; session rules only to session
    /// lookups.
    pub fn visible_in(&self, scope: Scope) -> bool {
        self.scope == Scope::Workspace || self.scope == scope
    }

    /// Rank among rules at the same resource specificity. Higher wins.
    pub(crate) fn precedence(&self) -> u8 {
        let agent = if self.agent_id.is_some() { 2 } else { 0 };
        let session = if self.scope == Scope::Session { 1 } else { 0 };
        agent + session
    }
}

impl PartialEq for PolicyRule {
    fn eq(&self, other: &Self) -> bool {
        self.agent_id == other.agent_id
            && self.resource_type == other.resource_type
            && self.resource_key == other.resource_key
            && self.action == other.action
            && self.decision == other.decision
            && self.scope == other.scope
            && self.constraints == other.constraints
    }
}
