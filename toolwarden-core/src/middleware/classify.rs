//! Derive sub-resources from a tool call.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::context::ToolPolicyContext;
use crate::args::{path_args, relative_to_root, url_args};
use crate::policy::{Action, ResourceRef, ResourceType};

/// Name of the tool that loads skills.
pub const SKILL_TOOL: &str = "read_skill";

/// Separator in `connector__<key>__<operation>` tool names.
const CONNECTOR_SEPARATOR: &str = "__";

/// A connector call inferred from a tool name and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorInvocation {
    pub connector_key: String,
    pub action: Action,
}

impl ConnectorInvocation {
    pub fn resource(&self) -> ResourceRef {
        ResourceRef::new(ResourceType::Connector, self.connector_key.clone(), self.action)
    }
}

fn operation_action(operation: &str) -> Action {
    let op = operation.to_ascii_lowercase();
    if ["get", "list", "read", "search", "fetch"]
        .iter()
        .any(|p| op.starts_with(p))
    {
        Action::Read
    } else {
        Action::Post
    }
}

fn string_arg<'a>(args: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| args.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Infer the connector a call targets, if any.
///
/// Recognized forms, in order:
/// - tool names like `connector__github__list_issues`
/// - `connector` / `connectorKey` arguments (action from `operation`, when given)
/// - tools registered in the connector category, keyed by tool name
pub fn infer_connector(
    ctx: &ToolPolicyContext,
    tool_name: &str,
    args: &Value,
) -> Option<ConnectorInvocation> {
    let mut parts = tool_name.splitn(3, CONNECTOR_SEPARATOR);
    if let (Some("connector"), Some(key), Some(op)) = (parts.next(), parts.next(), parts.next()) {
        if !key.is_empty() && !op.is_empty() {
            return Some(ConnectorInvocation {
                connector_key: key.to_string(),
                action: operation_action(op),
            });
        }
    }

    if let Some(key) = string_arg(args, &["connector", "connectorKey"]) {
        let action = match string_arg(args, &["operation", "action"]) {
            Some(op) => operation_action(op),
            None => ctx.action_for(tool_name),
        };
        return Some(ConnectorInvocation {
            connector_key: key.to_string(),
            action,
        });
    }

    if ctx.is_connector(tool_name) {
        return Some(ConnectorInvocation {
            connector_key: tool_name.to_string(),
            action: ctx.action_for(tool_name),
        });
    }

    None
}

/// Action of a network request: safe methods read, everything else posts.
pub fn network_action(args: &Value) -> Action {
    match string_arg(args, &["method"]) {
        None => Action::Read,
        Some(m) if ["GET", "HEAD", "OPTIONS"].contains(&m.to_ascii_uppercase().as_str()) => {
            Action::Read
        }
        Some(_) => Action::Post,
    }
}

/// Skill requested by a [`SKILL_TOOL`] call.
pub fn skill_name(args: &Value) -> Option<&str> {
    string_arg(args, &["name", "skill_name", "skillName", "skill"])
}

/// Filesystem resources touched by a filesystem-category tool.
///
/// Keys are workspace-relative; paths that escape the workspace keep their
/// raw form so the containment check can report them. A call without path
/// arguments addresses the workspace root (`.`).
pub fn filesystem_resources(root: &Path, action: Action, args: &Value) -> Vec<ResourceRef> {
    let paths = path_args(args);
    if paths.is_empty() {
        return vec![ResourceRef::new(ResourceType::Filesystem, ".", action)];
    }

    let mut out: Vec<ResourceRef> = Vec::new();
    for raw in paths {
        let key = match relative_to_root(root, &raw) {
            Some(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Some(rel) => rel.to_string_lossy().into_owned(),
            None => raw,
        };
        let resource = ResourceRef::new(ResourceType::Filesystem, key, action);
        if !out.contains(&resource) {
            out.push(resource);
        }
    }
    out
}

/// Network resources (one per distinct host) referenced anywhere in the args.
pub fn network_resources(args: &Value) -> Vec<ResourceRef> {
    let action = network_action(args);
    let mut out: Vec<ResourceRef> = Vec::new();
    for url in url_args(args) {
        if let Some(host) = url.host_str() {
            let resource = ResourceRef::new(ResourceType::Network, host.to_ascii_lowercase(), action);
            if !out.contains(&resource) {
                out.push(resource);
            }
        }
    }
    out
}
