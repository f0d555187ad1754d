//! Per-runtime view of the tool registry.

use std::collections::{BTreeMap, HashSet};

use crate::policy::Action;
use crate::tool::{ToolCategory, ToolDescriptor};

/// Classify a tool name into the action it most likely performs.
///
/// Used when the registry does not declare an action. Anything unrecognized
/// is treated as a write.
pub fn infer_action(tool_name: &str) -> Action {
    let name = tool_name.to_ascii_lowercase();

    const READ: &[&str] = &["read_", "get_", "list_", "search_", "grep", "glob"];
    const EXEC: &[&str] = &["bash", "shell", "exec", "run_"];
    const POST: &[&str] = &["send_", "post_", "http_post"];

    if READ.iter().any(|p| name.starts_with(p)) {
        Action::Read
    } else if EXEC.iter().any(|p| name.starts_with(p)) {
        Action::Exec
    } else if POST.iter().any(|p| name.starts_with(p)) {
        Action::Post
    } else {
        Action::Write
    }
}

/// Tool classification consulted on every check.
///
/// Built once from the registry and never mutated; each subagent gets its own.
#[derive(Debug, Clone, Default)]
pub struct ToolPolicyContext {
    actions: BTreeMap<String, Action>,
    filesystem_tools: HashSet<String>,
    connector_tools: HashSet<String>,
    disabled_tools: HashSet<String>,
}

impl ToolPolicyContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the context from registry entries.
    pub fn from_registry<'a>(tools: impl IntoIterator<Item = &'a ToolDescriptor>) -> Self {
        let mut ctx = Self::new();
        for tool in tools {
            let action = tool.action.unwrap_or_else(|| infer_action(&tool.name));
            ctx.actions.insert(tool.name.clone(), action);
            match tool.category {
                ToolCategory::Filesystem => {
                    ctx.filesystem_tools.insert(tool.name.clone());
                }
                ToolCategory::Connector => {
                    ctx.connector_tools.insert(tool.name.clone());
                }
                ToolCategory::General | ToolCategory::Network => {}
            }
            if !tool.enabled {
                ctx.disabled_tools.insert(tool.name.clone());
            }
        }
        ctx
    }

    /// Action for `tool_name`: declared, inferred at registration, or inferred now
    /// for tools the registry does not know.
    pub fn action_for(&self, tool_name: &str) -> Action {
        self.actions
            .get(tool_name)
            .copied()
            .unwrap_or_else(|| infer_action(tool_name))
    }

    pub fn is_known(&self, tool_name: &str) -> bool {
        self.actions.contains_key(tool_name)
    }

    pub fn is_filesystem(&self, tool_name: &str) -> bool {
        self.filesystem_tools.contains(tool_name)
    }

    pub fn is_connector(&self, tool_name: &str) -> bool {
        self.connector_tools.contains(tool_name)
    }

    pub fn is_disabled(&self, tool_name: &str) -> bool {
        self.disabled_tools.contains(tool_name)
    }

    /// Enabled tool names, sorted.
    pub fn enabled_tools(&self) -> impl Iterator<Item = &str> {
        self.actions
            .keys()
            .filter(|name| !self.disabled_tools.contains(name.as_str()))
            .map(String::as_str)
    }
}
