//! Subagent policy propagation.
//!
//! A delegating agent hands each subagent its own tool registry and
//! allowlists. The subagent's middleware shares everything else with the
//! parent: resolver, session store, clock, hooks and workspace root. Grants
//! and rate-limit windows are keyed by agent id, so a subagent never inherits
//! the parent's approvals, while clearing the thread still clears both.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::middleware::{AuthorizationError, ToolAuthorizationMiddleware, ToolPolicyContext};
use crate::tool::ToolDescriptor;

/// What a delegated subagent may use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubagentPolicy {
    pub agent_id: String,
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    /// Connector keys the subagent may call; `None` leaves connectors to policy.
    #[serde(default)]
    pub connector_allowlist: Option<Vec<String>>,
    /// Skills the subagent may load; `None` leaves skills unrestricted.
    #[serde(default)]
    pub skill_allowlist: Option<Vec<String>>,
}

impl SubagentPolicy {
    pub fn new(agent_id: impl Into<String>, tools: impl IntoIterator<Item = ToolDescriptor>) -> Self {
        Self {
            agent_id: agent_id.into(),
            tools: tools.into_iter().collect(),
            connector_allowlist: None,
            skill_allowlist: None,
        }
    }

    pub fn with_connector_allowlist<I, S>(mut self, connectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.connector_allowlist = Some(connectors.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_skill_allowlist<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skill_allowlist = Some(skills.into_iter().map(Into::into).collect());
        self
    }
}

impl ToolAuthorizationMiddleware {
    /// Build the middleware for a delegated subagent.
    ///
    /// # Errors
    ///
    /// [`AuthorizationError::MissingIdentifier`] when the policy has no agent id.
    pub fn delegate(&self, policy: SubagentPolicy) -> Result<Self, AuthorizationError> {
        if policy.agent_id.trim().is_empty() {
            return Err(AuthorizationError::MissingIdentifier("agentId"));
        }

        log::debug!(
            "delegating from agent {} to {} with {} tools",
            self.agent_id(),
            policy.agent_id,
            policy.tools.len()
        );

        Ok(Self {
            agent_id: Some(policy.agent_id),
            context: ToolPolicyContext::from_registry(&policy.tools),
            resolver: self.resolver.clone(),
            sessions: Arc::clone(&self.sessions),
            clock: Arc::clone(&self.clock),
            hooks: Arc::clone(&self.hooks),
            workspace_root: self.workspace_root.clone(),
            scope: self.scope,
            connector_allowlist: policy
                .connector_allowlist
                .map(|keys| keys.into_iter().collect()),
            skill_allowlist: policy.skill_allowlist.map(|keys| keys.into_iter().collect()),
        })
    }
}
