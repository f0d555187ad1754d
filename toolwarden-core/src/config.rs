//! Workspace authorization configuration.
//!
//! The configuration file is JSON:
//!
//! ```json
//! {
//!   "workspaceRoot": "~/projects/app",
//!   "policyFile": "${APP_HOME:-~/.app}/policies.json",
//!   "securityDefaults": {
//!     "filesystem": { "read": "allow", "write": "allow_in_session" },
//!     "network": { "post": "deny" }
//!   },
//!   "rules": [
//!     { "resourceType": "tool", "resourceKey": "bash", "action": "exec", "decision": "deny" }
//!   ]
//! }
//! ```
//!
//! `${VAR}` and `${VAR:-default}` are expanded in the file content before
//! parsing, and `~` is expanded in every path.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::args::lexical_normalize;
use crate::policy::{
    FilePolicyStore, MemoryPolicyStore, PolicyResolver, PolicyRule, PolicyStore,
    PolicyStoreError, SecurityDefaults,
};

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] PolicyStoreError),
}

/// Authorization settings for one workspace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationConfig {
    pub workspace_root: PathBuf,

    #[serde(default)]
    pub security_defaults: SecurityDefaults,

    /// JSON rule file backing a [`FilePolicyStore`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_file: Option<PathBuf>,

    /// Rules loaded into an in-memory store when no policy file is set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<PolicyRule>,
}

impl AuthorizationConfig {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            ..Self::default()
        }
    }

    /// Check the settings can be turned into a middleware.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workspace_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("workspaceRoot is required".to_string()));
        }
        if !self.workspace_root.is_absolute() {
            return Err(ConfigError::Invalid(format!(
                "workspaceRoot must be absolute, got '{}'",
                self.workspace_root.display()
            )));
        }
        if self.policy_file.is_some() && !self.rules.is_empty() {
            return Err(ConfigError::Invalid(
                "policyFile and inline rules are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }

    /// Open the policy store these settings describe.
    pub fn policy_store(&self) -> Arc<dyn PolicyStore> {
        match &self.policy_file {
            Some(path) => Arc::new(FilePolicyStore::new(path.clone())),
            None => Arc::new(MemoryPolicyStore::with_rules(self.rules.iter().cloned())),
        }
    }

    /// Resolver over [`policy_store`](Self::policy_store) with these defaults.
    pub fn resolver(&self) -> PolicyResolver {
        PolicyResolver::with_store(self.policy_store()).with_defaults(self.security_defaults.clone())
    }
}

/// Load and validate a configuration file.
///
/// Relative `workspaceRoot` and `policyFile` values are resolved against the
/// directory containing the file.
pub async fn load_config_file(path: impl AsRef<Path>) -> Result<AuthorizationConfig, ConfigError> {
    let path = expand_path(path.as_ref());
    let content = tokio::fs::read_to_string(&path).await?;
    let mut config: AuthorizationConfig = serde_json::from_str(&expand_env_vars(&content))?;

    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    config.workspace_root = resolve_against(&base, &config.workspace_root);
    config.policy_file = config
        .policy_file
        .as_deref()
        .map(|p| resolve_against(&base, p));

    config.validate()?;
    log::debug!(
        "loaded authorization config from {} (workspace {})",
        path.display(),
        config.workspace_root.display()
    );
    Ok(config)
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() {
        return PathBuf::new();
    }
    let expanded = expand_path(path);
    if expanded.is_absolute() {
        lexical_normalize(&expanded)
    } else {
        lexical_normalize(&base.join(expanded))
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid env var pattern")
    })
}

/// Expand `${VAR}` and `${VAR:-default}` references.
///
/// Unset variables without a default expand to the empty string.
pub fn expand_env_vars(input: &str) -> String {
    env_var_pattern()
        .replace_all(input, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1])
                .ok()
                .or_else(|| caps.get(2).map(|d| d.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}
