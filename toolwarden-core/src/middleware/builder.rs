//! MiddlewareBuilder for fluent middleware construction

use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use super::context::ToolPolicyContext;
use super::ToolAuthorizationMiddleware;
use crate::args::lexical_normalize;
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::events::AuthorizationHook;
use crate::policy::{MemoryPolicyStore, PolicyResolver, PolicyStore, Scope, SecurityDefaults};
use crate::session::PolicySessionStore;
use crate::tool::ToolDescriptor;

/// Builder for a [`ToolAuthorizationMiddleware`]
///
/// Only the workspace root is required. Everything else has a default: an
/// empty in-memory policy store, the built-in security defaults, a fresh
/// session store and the system clock.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use toolwarden_core::middleware::ToolAuthorizationMiddleware;
/// use toolwarden_core::policy::{Action, Decision, MemoryPolicyStore, PolicyRule, ResourceType};
/// use toolwarden_core::session::PolicySessionStore;
/// use toolwarden_core::tool::ToolDescriptor;
///
/// let sessions = Arc::new(PolicySessionStore::new());
/// let store = MemoryPolicyStore::new();
/// store.insert(PolicyRule::new(ResourceType::Tool, "bash", Action::Exec, Decision::Deny));
///
/// let middleware = ToolAuthorizationMiddleware::builder()
///     .with_agent_id("coder")
///     .with_workspace_root("/workspace/app")
///     .with_policy_store(store)
///     .with_session_store(Arc::clone(&sessions))
///     .add_tool(ToolDescriptor::new("bash"))
///     .with_connector_allowlist(["github"])
///     .build()
///     .unwrap();
///
/// assert_eq!(middleware.agent_id(), "coder");
/// ```
pub struct MiddlewareBuilder {
    agent_id: Option<String>,
    tools: Vec<ToolDescriptor>,
    resolver: Option<PolicyResolver>,
    security_defaults: Option<SecurityDefaults>,
    sessions: Option<Arc<PolicySessionStore>>,
    clock: Option<Arc<dyn Clock>>,
    hooks: Vec<Arc<dyn AuthorizationHook>>,
    workspace_root: Option<PathBuf>,
    scope: Scope,
    connector_allowlist: Option<HashSet<String>>,
    skill_allowlist: Option<HashSet<String>>,
}

impl Default for MiddlewareBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewareBuilder {
    /// Create a new MiddlewareBuilder with default settings
    pub fn new() -> Self {
        Self {
            agent_id: None,
            tools: Vec::new(),
            resolver: None,
            security_defaults: None,
            sessions: None,
            clock: None,
            hooks: Vec::new(),
            workspace_root: None,
            // Checks run inside a thread, so session rules are visible.
            scope: Scope::Session,
            connector_allowlist: None,
            skill_allowlist: None,
        }
    }

    /// Authorize on behalf of a named agent instead of `"default"`
    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        let agent_id = agent_id.into();
        self.agent_id = (!agent_id.is_empty()).then_some(agent_id);
        self
    }

    /// Register a tool from the registry
    pub fn add_tool(mut self, tool: ToolDescriptor) -> Self {
        self.tools.push(tool);
        self
    }

    /// Register several tools
    pub fn add_tools(mut self, tools: impl IntoIterator<Item = ToolDescriptor>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Resolve against this policy store
    pub fn with_policy_store(mut self, store: impl PolicyStore + 'static) -> Self {
        self.resolver = Some(PolicyResolver::new(store));
        self
    }

    /// Use a fully configured resolver
    pub fn with_resolver(mut self, resolver: PolicyResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Override the resolver's security defaults
    pub fn with_security_defaults(mut self, defaults: SecurityDefaults) -> Self {
        self.security_defaults = Some(defaults);
        self
    }

    /// Share grant and rate-limit state with other middleware
    pub fn with_session_store(mut self, sessions: Arc<PolicySessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Replace the system clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Add an event hook
    pub fn add_hook(mut self, hook: impl AuthorizationHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Set the workspace root. Must be absolute.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Scope passed to the resolver (default: [`Scope::Session`])
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Restrict which connectors this agent may call
    pub fn with_connector_allowlist<I, S>(mut self, connectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.connector_allowlist = Some(connectors.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict which skills this agent may load
    pub fn with_skill_allowlist<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skill_allowlist = Some(skills.into_iter().map(Into::into).collect());
        self
    }

    /// Build the middleware
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the workspace root is missing or relative.
    pub fn build(self) -> Result<ToolAuthorizationMiddleware> {
        let root = self
            .workspace_root
            .ok_or_else(|| Error::Config("workspace root is required".to_string()))?;
        if !root.is_absolute() {
            return Err(Error::Config(format!(
                "workspace root must be absolute, got '{}'",
                root.display()
            )));
        }

        let mut resolver = self
            .resolver
            .unwrap_or_else(|| PolicyResolver::new(MemoryPolicyStore::new()));
        if let Some(defaults) = self.security_defaults {
            resolver = resolver.with_defaults(defaults);
        }

        Ok(ToolAuthorizationMiddleware {
            agent_id: self.agent_id,
            context: ToolPolicyContext::from_registry(&self.tools),
            resolver,
            sessions: self.sessions.unwrap_or_default(),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            hooks: Arc::new(RwLock::new(self.hooks)),
            workspace_root: lexical_normalize(&root),
            scope: self.scope,
            connector_allowlist: self.connector_allowlist,
            skill_allowlist: self.skill_allowlist,
        })
    }
}
