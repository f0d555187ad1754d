//! Typed policy constraints and their evaluation.
//!
//! Rule rows carry constraints as raw JSON. [`PolicyConstraints::parse`]
//! validates that payload against the rule's resource type once, at the
//! boundary; anything it does not recognize is an error and the caller must
//! treat it as a denial.
//!
//! Recognized keys:
//!
//! | Key | Applies to | Shape |
//! |-----|------------|-------|
//! | `allowedPaths` | tool, filesystem | array of path prefixes or glob patterns |
//! | `allowedDomains` | tool, network, connector | array of domain patterns |
//! | `rateLimit` | any | `{"maxCalls": n, "windowMs": n}`, both > 0 |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::ResourceType;
use crate::args::{lexical_normalize, normalize_path, path_args, url_args};

/// Errors raised while validating a constraint payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstraintError {
    /// The payload was not a JSON object.
    #[error("constraint payload must be an object, got {0}")]
    NotAnObject(&'static str),

    /// The payload contained a key this evaluator does not know.
    #[error("unknown constraint '{0}'")]
    UnknownKey(String),

    /// A known key had the wrong shape.
    #[error("constraint '{key}' is malformed: {reason}")]
    Malformed { key: String, reason: String },

    /// A known key that cannot apply to this resource type.
    #[error("constraint '{key}' does not apply to {resource_type} resources")]
    Mismatch {
        key: String,
        resource_type: ResourceType,
    },
}

/// Sliding-window limit attached to a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RateLimit {
    pub max_calls: u32,
    pub window_ms: u64,
}

impl RateLimit {
    pub fn new(max_calls: u32, window_ms: u64) -> Self {
        Self {
            max_calls,
            window_ms,
        }
    }
}

/// Resource-specific restriction on tool arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceConstraint {
    /// Every path argument must lie under one of these prefixes.
    Filesystem { allowed_paths: Vec<String> },
    /// Every URL argument must match one of these domain patterns.
    Network { allowed_domains: Vec<String> },
    /// Every URL argument of a connector call must match one of these patterns.
    Connector { allowed_domains: Vec<String> },
}

impl ResourceConstraint {
    fn key(&self) -> &'static str {
        match self {
            ResourceConstraint::Filesystem { .. } => "allowedPaths",
            ResourceConstraint::Network { .. } | ResourceConstraint::Connector { .. } => {
                "allowedDomains"
            }
        }
    }

    /// Whether this constraint may be attached to rules for `resource_type`.
    ///
    /// Tool rules may carry any constraint; they restrict the tool's own
    /// arguments.
    pub fn applies_to(&self, resource_type: ResourceType) -> bool {
        matches!(
            (self, resource_type),
            (_, ResourceType::Tool)
                | (ResourceConstraint::Filesystem { .. }, ResourceType::Filesystem)
                | (ResourceConstraint::Network { .. }, ResourceType::Network)
                | (ResourceConstraint::Connector { .. }, ResourceType::Connector)
        )
    }
}

/// Validated constraints attached to a resolved policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConstraints {
    pub resource: Vec<ResourceConstraint>,
    pub rate_limit: Option<RateLimit>,
}

impl PolicyConstraints {
    /// No constraints beyond the base decision.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.resource.is_empty() && self.rate_limit.is_none()
    }

    pub fn with_resource(mut self, constraint: ResourceConstraint) -> Self {
        self.resource.push(constraint);
        self
    }

    pub fn with_rate_limit(mut self, limit: RateLimit) -> Self {
        self.rate_limit = Some(limit);
        self
    }

    /// Validate a raw payload for a rule on `resource_type`.
    ///
    /// `null` means no constraints.
    pub fn parse(resource_type: ResourceType, raw: &Value) -> Result<Self, ConstraintError> {
        let obj = match raw {
            Value::Null => return Ok(Self::none()),
            Value::Object(obj) => obj,
            other => return Err(ConstraintError::NotAnObject(json_type_name(other))),
        };

        let mut constraints = Self::none();
        for (key, value) in obj {
            match key.as_str() {
                "allowedPaths" => {
                    let allowed_paths = string_list(key, value)?;
                    constraints
                        .resource
                        .push(ResourceConstraint::Filesystem { allowed_paths });
                }
                "allowedDomains" => {
                    let allowed_domains = string_list(key, value)?;
                    let constraint = match resource_type {
                        ResourceType::Connector => {
                            ResourceConstraint::Connector { allowed_domains }
                        }
                        _ => ResourceConstraint::Network { allowed_domains },
                    };
                    constraints.resource.push(constraint);
                }
                "rateLimit" => {
                    let limit: RateLimit =
                        serde_json::from_value(value.clone()).map_err(|e| {
                            ConstraintError::Malformed {
                                key: key.clone(),
                                reason: e.to_string(),
                            }
                        })?;
                    if limit.max_calls == 0 || limit.window_ms == 0 {
                        return Err(ConstraintError::Malformed {
                            key: key.clone(),
                            reason: "maxCalls and windowMs must be positive".to_string(),
                        });
                    }
                    constraints.rate_limit = Some(limit);
                }
                other => return Err(ConstraintError::UnknownKey(other.to_string())),
            }
        }

        constraints.validate_for(resource_type)?;
        Ok(constraints)
    }

    /// Check every resource constraint can apply to `resource_type`.
    pub fn validate_for(&self, resource_type: ResourceType) -> Result<(), ConstraintError> {
        match self.resource.iter().find(|c| !c.applies_to(resource_type)) {
            Some(c) => Err(ConstraintError::Mismatch {
                key: c.key().to_string(),
                resource_type,
            }),
            None => Ok(()),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn string_list(key: &str, value: &Value) -> Result<Vec<String>, ConstraintError> {
    let items = value.as_array().ok_or_else(|| ConstraintError::Malformed {
        key: key.to_string(),
        reason: format!("expected array, got {}", json_type_name(value)),
    })?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ConstraintError::Malformed {
                    key: key.to_string(),
                    reason: "entries must be non-empty strings".to_string(),
                })
        })
        .collect()
}

/// Result of evaluating constraints against tool arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintOutcome {
    pub allowed: bool,
    pub violation: Option<String>,
}

impl ConstraintOutcome {
    pub fn ok() -> Self {
        Self {
            allowed: true,
            violation: None,
        }
    }

    pub fn violation(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            violation: Some(reason.into()),
        }
    }
}

/// Evaluate constraints for one resource against the tool's arguments.
///
/// Filesystem resources always get a workspace containment check, whether or
/// not a constraint is configured and whatever the base decision was. When
/// the arguments carry no path (or no URL), `resource_key` itself is checked.
pub fn evaluate(
    resource_type: ResourceType,
    resource_key: &str,
    constraints: &PolicyConstraints,
    args: &Value,
    workspace_root: &Path,
) -> ConstraintOutcome {
    if let Err(e) = constraints.validate_for(resource_type) {
        return ConstraintOutcome::violation(e.to_string());
    }

    let root = lexical_normalize(workspace_root);

    if resource_type == ResourceType::Filesystem {
        let paths = paths_or_key(args, resource_key);
        if let Some(v) = check_containment(&root, &paths) {
            return v;
        }
    }

    for constraint in &constraints.resource {
        let outcome = match constraint {
            ResourceConstraint::Filesystem { allowed_paths } => {
                let paths = match resource_type {
                    ResourceType::Filesystem => paths_or_key(args, resource_key),
                    _ => path_args(args),
                };
                check_containment(&root, &paths)
                    .unwrap_or_else(|| check_path_prefixes(&root, &paths, allowed_paths))
            }
            ResourceConstraint::Network { allowed_domains }
            | ResourceConstraint::Connector { allowed_domains } => {
                check_domains(resource_type, resource_key, args, allowed_domains)
            }
        };
        if !outcome.allowed {
            return outcome;
        }
    }

    ConstraintOutcome::ok()
}

/// Parse a raw payload and evaluate it, failing closed on malformed input.
pub fn evaluate_raw(
    resource_type: ResourceType,
    resource_key: &str,
    raw: &Value,
    args: &Value,
    workspace_root: &Path,
) -> ConstraintOutcome {
    match PolicyConstraints::parse(resource_type, raw) {
        Ok(constraints) => evaluate(resource_type, resource_key, &constraints, args, workspace_root),
        Err(e) => ConstraintOutcome::violation(e.to_string()),
    }
}

fn paths_or_key(args: &Value, resource_key: &str) -> Vec<String> {
    let paths = path_args(args);
    if paths.is_empty() && !resource_key.is_empty() {
        vec![resource_key.to_string()]
    } else {
        paths
    }
}

fn check_containment(root: &Path, paths: &[String]) -> Option<ConstraintOutcome> {
    for path in paths {
        let escapes = match normalize_path(root, path) {
            Some(resolved) => !resolved.starts_with(root),
            None => true,
        };
        if escapes {
            return Some(ConstraintOutcome::violation(format!(
                "Path '{}' escapes workspace root '{}'",
                path,
                root.display()
            )));
        }
    }
    None
}

fn check_path_prefixes(root: &Path, paths: &[String], allowed: &[String]) -> ConstraintOutcome {
    let allowed: Vec<AllowedPath> = allowed.iter().map(|p| AllowedPath::new(root, p)).collect();

    for path in paths {
        let Some(resolved) = normalize_path(root, path) else {
            return ConstraintOutcome::violation(format!("Path '{}' is not allowed", path));
        };
        if !allowed.iter().any(|a| a.matches(root, &resolved)) {
            return ConstraintOutcome::violation(format!(
                "Path '{}' is outside the allowed paths",
                path
            ));
        }
    }
    ConstraintOutcome::ok()
}

enum AllowedPath {
    Prefix(Option<PathBuf>),
    Pattern(Option<glob::Pattern>),
}

impl AllowedPath {
    fn new(root: &Path, raw: &str) -> Self {
        if raw.contains(['*', '?', '[']) {
            let relative = raw.trim_start_matches("./");
            AllowedPath::Pattern(glob::Pattern::new(relative).ok())
        } else {
            AllowedPath::Prefix(normalize_path(root, raw).filter(|p| p.starts_with(root)))
        }
    }

    fn matches(&self, root: &Path, resolved: &Path) -> bool {
        match self {
            AllowedPath::Prefix(Some(prefix)) => resolved.starts_with(prefix),
            AllowedPath::Pattern(Some(pattern)) => resolved
                .strip_prefix(root)
                .map(|rel| pattern.matches_path(rel))
                .unwrap_or(false),
            // Unparseable entries never match.
            AllowedPath::Prefix(None) | AllowedPath::Pattern(None) => false,
        }
    }
}

fn check_domains(
    resource_type: ResourceType,
    resource_key: &str,
    args: &Value,
    allowed: &[String],
) -> ConstraintOutcome {
    let urls = url_args(args);

    if urls.is_empty() {
        // A network resource is keyed by host; check the key itself.
        if resource_type == ResourceType::Network && !resource_key.is_empty() {
            if allowed.iter().any(|p| domain_matches(p, resource_key)) {
                return ConstraintOutcome::ok();
            }
            return ConstraintOutcome::violation(format!(
                "Domain '{}' is not in the allowlist",
                resource_key
            ));
        }
        return ConstraintOutcome::ok();
    }

    for url in urls {
        let Some(host) = url.host_str() else {
            return ConstraintOutcome::violation(format!("URL '{}' has no host", url));
        };
        if !allowed.iter().any(|p| domain_matches(p, host)) {
            return ConstraintOutcome::violation(format!(
                "Domain '{}' is not in the allowlist",
                host
            ));
        }
    }
    ConstraintOutcome::ok()
}

/// Match a host against a domain pattern.
///
/// - `*` matches every host
/// - `*.example.com` matches subdomains of `example.com` only
/// - `example.com` matches `example.com` and its subdomains
pub fn domain_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim().trim_end_matches('.').to_ascii_lowercase();
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();

    if pattern == "*" {
        return true;
    }
    if let Some(suffix) = pattern.strip_prefix("*.") {
        return host.len() > suffix.len() && host.ends_with(&format!(".{}", suffix));
    }
    host == pattern || host.ends_with(&format!(".{}", pattern))
}
