//! Workspace-level fallback decisions.

use serde::{Deserialize, Serialize};

use super::{Action, Decision, ResourceType};

/// Fallback decision per action for one resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionDefaults {
    pub read: Decision,
    pub write: Decision,
    pub exec: Decision,
    pub post: Decision,
}

impl ActionDefaults {
    /// Same decision for every action.
    pub fn uniform(decision: Decision) -> Self {
        Self {
            read: decision,
            write: decision,
            exec: decision,
            post: decision,
        }
    }

    pub fn get(&self, action: Action) -> Decision {
        match action {
            Action::Read => self.read,
            Action::Write => self.write,
            Action::Exec => self.exec,
            Action::Post => self.post,
        }
    }

    pub fn set(&mut self, action: Action, decision: Decision) {
        match action {
            Action::Read => self.read = decision,
            Action::Write => self.write = decision,
            Action::Exec => self.exec = decision,
            Action::Post => self.post = decision,
        }
    }
}

/// Reads are allowed, everything else asks.
impl Default for ActionDefaults {
    fn default() -> Self {
        Self {
            read: Decision::Allow,
            write: Decision::Ask,
            exec: Decision::Ask,
            post: Decision::Ask,
        }
    }
}

/// Workspace-wide decision table consulted when no rule matches.
///
/// Deserializes from a partial JSON object; omitted resource types and
/// actions keep the built-in defaults.
///
/// ```rust
/// use toolwarden_core::policy::{Action, Decision, ResourceType, SecurityDefaults};
///
/// let defaults: SecurityDefaults = serde_json::from_str(
///     r#"{"network": {"read": "ask"}}"#,
/// ).unwrap();
///
/// assert_eq!(defaults.decision(ResourceType::Network, Action::Read), Decision::Ask);
/// assert_eq!(defaults.decision(ResourceType::Tool, Action::Read), Decision::Allow);
/// assert_eq!(defaults.decision(ResourceType::Tool, Action::Exec), Decision::Ask);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityDefaults {
    pub tool: ActionDefaults,
    pub filesystem: ActionDefaults,
    pub network: ActionDefaults,
    pub connector: ActionDefaults,
}

impl SecurityDefaults {
    /// Fallback decision for `(resource_type, action)`.
    pub fn decision(&self, resource_type: ResourceType, action: Action) -> Decision {
        self.for_type(resource_type).get(action)
    }

    pub fn for_type(&self, resource_type: ResourceType) -> &ActionDefaults {
        match resource_type {
            ResourceType::Tool => &self.tool,
            ResourceType::Filesystem => &self.filesystem,
            ResourceType::Network => &self.network,
            ResourceType::Connector => &self.connector,
        }
    }

    /// Override a single entry.
    pub fn with(mut self, resource_type: ResourceType, action: Action, decision: Decision) -> Self {
        let table = match resource_type {
            ResourceType::Tool => &mut self.tool,
            ResourceType::Filesystem => &mut self.filesystem,
            ResourceType::Network => &mut self.network,
            ResourceType::Connector => &mut self.connector,
        };
        table.set(action, decision);
        self
    }
}
