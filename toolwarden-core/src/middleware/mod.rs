//! Tool-call authorization middleware.
//!
//! [`ToolAuthorizationMiddleware`] sits between the execution engine and every
//! tool handler. For each call it runs, in order:
//!
//! 1. the disabled-tool and skill gates (no policy lookup)
//! 2. the tool-level check: resolve, approval gate, constraints, rate limit
//! 3. the same pipeline for each filesystem path, network host and connector
//!    the call touches
//!
//! The first `deny` ends the call with a [`ToolMessage`] the model can read.
//! The first unapproved `ask` ends it with an [`InterruptRequest`] the engine
//! checkpoints and later hands back to [`ToolAuthorizationMiddleware::resume`].
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//! use toolwarden_core::middleware::{Authorization, ToolAuthorizationMiddleware};
//! use toolwarden_core::tool::{ToolCall, ToolCategory, ToolDescriptor};
//!
//! # tokio_test::block_on(async {
//! let middleware = ToolAuthorizationMiddleware::builder()
//!     .with_workspace_root("/workspace")
//!     .add_tool(ToolDescriptor::new("read_file").with_category(ToolCategory::Filesystem))
//!     .add_tool(ToolDescriptor::new("write_file").with_category(ToolCategory::Filesystem))
//!     .build()
//!     .unwrap();
//!
//! let cancel = CancellationToken::new();
//!
//! let read = ToolCall::new("call_1", "read_file", json!({"path": "README.md"}));
//! let outcome = middleware.authorize("thread-1", &read, &cancel).await.unwrap();
//! assert!(outcome.is_proceed());
//!
//! // Writes ask for approval by default
//! let write = ToolCall::new("call_2", "write_file", json!({"path": "notes.txt"}));
//! let outcome = middleware.authorize("thread-1", &write, &cancel).await.unwrap();
//! assert!(matches!(outcome, Authorization::Interrupt(_)));
//! # });
//! ```

mod builder;
mod classify;
mod context;
mod interrupt;

pub use builder::MiddlewareBuilder;
pub use classify::{
    filesystem_resources, infer_connector, network_action, network_resources, skill_name,
    ConnectorInvocation, SKILL_TOOL,
};
pub use context::{infer_action, ToolPolicyContext};
pub use interrupt::{AllowedDecision, InterruptOnConfig, InterruptRequest, ResumeDecision};

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::config::AuthorizationConfig;
use crate::events::{AuthorizationEvent, AuthorizationHook};
use crate::policy::constraint;
use crate::policy::{
    agent_key, Decision, PolicyConstraints, PolicyResolver, ResourceRef, ResourceType, Scope,
};
use crate::session::{PolicySessionStore, RateLimitKey, SessionError, SessionGrantKey};
use crate::tool::{ToolCall, ToolDescriptor, ToolError, ToolHandler, ToolMessage};

/// Errors returned by the middleware.
///
/// Denials are not errors; they come back as [`Authorization::Deny`].
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    /// An empty thread id or tool-call id was passed in.
    #[error("missing required identifier: {0}")]
    MissingIdentifier(&'static str),

    /// A resume did not match the interrupt it claims to answer.
    #[error("resume does not match pending call: {0}")]
    ResumeMismatch(String),

    /// The wrapped handler failed after authorization passed.
    #[error("tool handler failed: {0}")]
    Handler(#[from] ToolError),
}

impl From<SessionError> for AuthorizationError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::MissingIdentifier(id) => Self::MissingIdentifier(id),
        }
    }
}

fn require_id(value: &str, name: &'static str) -> Result<(), AuthorizationError> {
    if value.trim().is_empty() {
        Err(AuthorizationError::MissingIdentifier(name))
    } else {
        Ok(())
    }
}

/// Verdict for one tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum Authorization {
    /// Every check passed; invoke the handler.
    Proceed,
    /// Return this message to the model instead of running the tool.
    Deny(ToolMessage),
    /// Suspend the run until a human answers.
    Interrupt(InterruptRequest),
    /// The run was cancelled mid-check. Nothing was recorded.
    Cancelled,
}

impl Authorization {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Authorization::Proceed)
    }

    pub fn is_deny(&self) -> bool {
        matches!(self, Authorization::Deny(_))
    }

    pub fn is_interrupt(&self) -> bool {
        matches!(self, Authorization::Interrupt(_))
    }
}

/// Result of running a tool call through [`ToolAuthorizationMiddleware::wrap_tool_call`].
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallOutcome {
    /// The handler's result, or a synthetic denial message.
    Completed(ToolMessage),
    /// The call is waiting for a human.
    Interrupted(InterruptRequest),
    /// The run was cancelled before the handler was invoked.
    Cancelled,
}

/// State carried through one pass of the check pipeline.
struct CheckRun<'a> {
    thread_id: &'a str,
    call: &'a ToolCall,
    approved: &'a [ResourceRef],
    cancel: &'a CancellationToken,
    /// Rate-limit entries recorded so far, undone unless the call proceeds.
    charges: Vec<(RateLimitKey, u64)>,
}

/// Gatekeeper wrapped around every tool invocation of one agent.
///
/// Cheap to share behind an `Arc`; all mutable state lives in the shared
/// [`PolicySessionStore`].
pub struct ToolAuthorizationMiddleware {
    pub(crate) agent_id: Option<String>,
    pub(crate) context: ToolPolicyContext,
    pub(crate) resolver: PolicyResolver,
    pub(crate) sessions: Arc<PolicySessionStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) hooks: Arc<RwLock<Vec<Arc<dyn AuthorizationHook>>>>,
    pub(crate) workspace_root: PathBuf,
    pub(crate) scope: Scope,
    pub(crate) connector_allowlist: Option<HashSet<String>>,
    pub(crate) skill_allowlist: Option<HashSet<String>>,
}

impl ToolAuthorizationMiddleware {
    /// Create a new builder.
    pub fn builder() -> MiddlewareBuilder {
        MiddlewareBuilder::new()
    }

    /// Build a middleware for the default agent from loaded configuration.
    pub fn from_config(
        config: &AuthorizationConfig,
        tools: impl IntoIterator<Item = ToolDescriptor>,
    ) -> crate::Result<Self> {
        config.validate()?;
        Self::builder()
            .with_workspace_root(&config.workspace_root)
            .with_resolver(config.resolver())
            .add_tools(tools)
            .build()
    }

    /// Agent this middleware authorizes for (`"default"` when unnamed).
    pub fn agent_id(&self) -> &str {
        agent_key(self.agent_id.as_deref())
    }

    pub fn context(&self) -> &ToolPolicyContext {
        &self.context
    }

    pub fn resolver(&self) -> &PolicyResolver {
        &self.resolver
    }

    pub fn sessions(&self) -> &Arc<PolicySessionStore> {
        &self.sessions
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Add an event hook.
    ///
    /// Hooks are shared with every middleware delegated from this one.
    pub fn add_hook(&self, hook: impl AuthorizationHook + 'static) {
        self.hooks.write().push(Arc::new(hook));
    }

    fn emit(&self, event: AuthorizationEvent) {
        let hooks = self.hooks.read();
        for hook in hooks.iter() {
            hook.on_event(&event);
        }
    }

    /// Tools whose tool-level policy needs a human, with the answers allowed.
    ///
    /// Disabled tools are never listed.
    pub async fn interrupt_on(&self) -> BTreeMap<String, InterruptOnConfig> {
        let mut out = BTreeMap::new();
        for name in self.context.enabled_tools() {
            let resolved = self
                .resolver
                .resolve(
                    self.agent_id.as_deref(),
                    ResourceType::Tool,
                    name,
                    self.context.action_for(name),
                    self.scope,
                    None,
                )
                .await;
            if resolved.decision.requires_approval() {
                out.insert(name.to_string(), InterruptOnConfig::default());
            }
        }
        out
    }

    /// Decide whether `call` may run in `thread_id`.
    pub async fn authorize(
        &self,
        thread_id: &str,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> Result<Authorization, AuthorizationError> {
        self.run_checks(thread_id, call, &[], cancel).await
    }

    /// Authorize `call` and, if allowed, run it through `handler`.
    ///
    /// The handler's result is returned unchanged. Denied calls complete with
    /// a synthetic message carrying the original tool-call id.
    pub async fn wrap_tool_call(
        &self,
        thread_id: &str,
        call: &ToolCall,
        handler: &dyn ToolHandler,
        cancel: &CancellationToken,
    ) -> Result<ToolCallOutcome, AuthorizationError> {
        let authorization = self.authorize(thread_id, call, cancel).await?;
        self.complete(call, authorization, handler).await
    }

    /// Apply a human's answer to a pending interrupt.
    ///
    /// Returns the call as it should run (with replacement arguments after an
    /// edit) and the new verdict. Approving an `allow_in_session` interrupt
    /// records a session grant, unless the run is cancelled first.
    ///
    /// Only [`ResumeDecision::Edit`] may change the arguments: approving or
    /// rejecting with arguments other than the ones in `pending` fails with
    /// [`AuthorizationError::ResumeMismatch`]. After an edit, resume any
    /// follow-up interrupt with the returned call.
    pub async fn resume_authorization(
        &self,
        thread_id: &str,
        call: &ToolCall,
        pending: &InterruptRequest,
        decision: ResumeDecision,
        cancel: &CancellationToken,
    ) -> Result<(ToolCall, Authorization), AuthorizationError> {
        require_id(thread_id, "threadId")?;
        require_id(&call.id, "toolCallId")?;
        self.check_pending(thread_id, call, pending, &decision)?;

        let call = match decision {
            ResumeDecision::Reject { reason } => {
                let reason = match reason {
                    Some(r) if !r.trim().is_empty() => {
                        format!("User rejected {}: {}", pending.resource, r)
                    }
                    _ => format!("User rejected {}", pending.resource),
                };
                let denial = self.deny(call, Some(&pending.resource), reason);
                return Ok((call.clone(), denial));
            }
            ResumeDecision::Approve => call.clone(),
            ResumeDecision::Edit { args } => call.with_args(args),
        };

        let mut approved = pending.approved.clone();
        if !approved.contains(&pending.resource) {
            approved.push(pending.resource.clone());
        }

        let authorization = self.run_checks(thread_id, &call, &approved, cancel).await?;

        if !matches!(authorization, Authorization::Cancelled)
            && !cancel.is_cancelled()
            && pending.remembers_approval()
        {
            self.record_grant(thread_id, &pending.resource)?;
        }

        Ok((call, authorization))
    }

    /// [`resume_authorization`](Self::resume_authorization), then run the
    /// handler if the call may now proceed.
    pub async fn resume(
        &self,
        thread_id: &str,
        call: &ToolCall,
        pending: &InterruptRequest,
        decision: ResumeDecision,
        handler: &dyn ToolHandler,
        cancel: &CancellationToken,
    ) -> Result<ToolCallOutcome, AuthorizationError> {
        let (call, authorization) = self
            .resume_authorization(thread_id, call, pending, decision, cancel)
            .await?;
        self.complete(&call, authorization, handler).await
    }

    async fn complete(
        &self,
        call: &ToolCall,
        authorization: Authorization,
        handler: &dyn ToolHandler,
    ) -> Result<ToolCallOutcome, AuthorizationError> {
        Ok(match authorization {
            Authorization::Proceed => ToolCallOutcome::Completed(handler.invoke(call).await?),
            Authorization::Deny(message) => ToolCallOutcome::Completed(message),
            Authorization::Interrupt(request) => ToolCallOutcome::Interrupted(request),
            Authorization::Cancelled => ToolCallOutcome::Cancelled,
        })
    }

    fn check_pending(
        &self,
        thread_id: &str,
        call: &ToolCall,
        pending: &InterruptRequest,
        decision: &ResumeDecision,
    ) -> Result<(), AuthorizationError> {
        if pending.thread_id != thread_id {
            return Err(AuthorizationError::ResumeMismatch(format!(
                "interrupt belongs to thread '{}', not '{}'",
                pending.thread_id, thread_id
            )));
        }
        if pending.agent_id != self.agent_id() {
            return Err(AuthorizationError::ResumeMismatch(format!(
                "interrupt belongs to agent '{}', not '{}'",
                pending.agent_id,
                self.agent_id()
            )));
        }
        if pending.tool_call_id != call.id || pending.tool_name != call.name {
            return Err(AuthorizationError::ResumeMismatch(format!(
                "interrupt is for {} ({}), got {} ({})",
                pending.tool_name, pending.tool_call_id, call.name, call.id
            )));
        }
        if !matches!(decision, ResumeDecision::Edit { .. }) && call.args != pending.args {
            return Err(AuthorizationError::ResumeMismatch(format!(
                "arguments of {} ({}) differ from the ones shown for approval",
                call.name, call.id
            )));
        }
        if !pending.allows(decision) {
            return Err(AuthorizationError::ResumeMismatch(format!(
                "'{:?}' is not an allowed decision",
                decision.kind()
            )));
        }
        Ok(())
    }

    fn record_grant(&self, thread_id: &str, resource: &ResourceRef) -> Result<(), AuthorizationError> {
        let key = SessionGrantKey::for_resource(thread_id, self.agent_id.as_deref(), resource);
        self.sessions.grants().grant(&key)?;
        log::info!(
            "granted {} to agent {} for thread {}",
            resource,
            self.agent_id(),
            thread_id
        );
        self.emit(AuthorizationEvent::GrantRecorded {
            thread_id: thread_id.to_string(),
            agent_id: self.agent_id().to_string(),
            resource: resource.clone(),
        });
        Ok(())
    }

    async fn run_checks(
        &self,
        thread_id: &str,
        call: &ToolCall,
        approved: &[ResourceRef],
        cancel: &CancellationToken,
    ) -> Result<Authorization, AuthorizationError> {
        require_id(thread_id, "threadId")?;
        require_id(&call.id, "toolCallId")?;

        log::debug!(
            "authorizing {} ({}) for agent {} in thread {}",
            call.name,
            call.id,
            self.agent_id(),
            thread_id
        );
        self.emit(AuthorizationEvent::CheckStarted {
            thread_id: thread_id.to_string(),
            agent_id: self.agent_id().to_string(),
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
        });

        if cancel.is_cancelled() {
            return Ok(self.cancelled(call));
        }

        if self.context.is_disabled(&call.name) {
            return Ok(self.deny(call, None, format!("Tool '{}' is disabled", call.name)));
        }
        if let Some(reason) = self.skill_gate(call) {
            return Ok(self.deny(call, None, reason));
        }

        let mut run = CheckRun {
            thread_id,
            call,
            approved,
            cancel,
            charges: Vec::new(),
        };

        let verdict = self.check_all(&mut run).await;

        let verdict = match verdict {
            None if cancel.is_cancelled() => Some(self.cancelled(call)),
            other => other,
        };

        match verdict {
            Some(stop) => {
                self.release_charges(&mut run);
                Ok(stop)
            }
            None => {
                log::debug!("{} ({}) may proceed", call.name, call.id);
                self.emit(AuthorizationEvent::Proceeded {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                });
                Ok(Authorization::Proceed)
            }
        }
    }

    /// Tool-level check followed by every sub-check. `None` means all passed.
    async fn check_all(&self, run: &mut CheckRun<'_>) -> Option<Authorization> {
        let call = run.call;
        let action = self.context.action_for(&call.name);

        let files = if self.context.is_filesystem(&call.name) {
            filesystem_resources(&self.workspace_root, action, &call.args)
        } else {
            Vec::new()
        };
        // Escaping paths are denied before any lookup or prompt.
        for resource in &files {
            if let Some(reason) = self.containment_violation(resource) {
                return Some(self.deny(call, Some(resource), reason));
            }
        }

        let tool = ResourceRef::new(ResourceType::Tool, call.name.clone(), action);
        if let Some(stop) = self.check_resource(run, &tool).await {
            return Some(stop);
        }

        for resource in &files {
            if let Some(stop) = self.check_resource(run, resource).await {
                return Some(stop);
            }
        }

        for resource in network_resources(&call.args) {
            if let Some(stop) = self.check_resource(run, &resource).await {
                return Some(stop);
            }
        }

        if let Some(invocation) = infer_connector(&self.context, &call.name, &call.args) {
            if let Some(allowlist) = &self.connector_allowlist {
                if !allowlist.contains(&invocation.connector_key) {
                    let reason = format!(
                        "Connector '{}' is not available to agent '{}'",
                        invocation.connector_key,
                        self.agent_id()
                    );
                    return Some(self.deny(call, Some(&invocation.resource()), reason));
                }
            }
            if let Some(stop) = self.check_resource(run, &invocation.resource()).await {
                return Some(stop);
            }
        }

        None
    }

    fn containment_violation(&self, resource: &ResourceRef) -> Option<String> {
        let outcome = constraint::evaluate(
            ResourceType::Filesystem,
            &resource.resource_key,
            &PolicyConstraints::none(),
            &serde_json::Value::Null,
            &self.workspace_root,
        );
        if outcome.allowed {
            None
        } else {
            outcome.violation
        }
    }

    /// Resolve, approval gate, constraints, rate limit for one resource.
    async fn check_resource(
        &self,
        run: &mut CheckRun<'_>,
        resource: &ResourceRef,
    ) -> Option<Authorization> {
        let call = run.call;
        let resolved = self
            .resolver
            .resolve(
                self.agent_id.as_deref(),
                resource.resource_type,
                &resource.resource_key,
                resource.action,
                self.scope,
                None,
            )
            .await;

        if run.cancel.is_cancelled() {
            return Some(self.cancelled(call));
        }

        log::debug!(
            "{} resolved to {} via {:?}",
            resource,
            resolved.decision,
            resolved.source
        );
        self.emit(AuthorizationEvent::PolicyResolved {
            tool_call_id: call.id.clone(),
            resource: resource.clone(),
            decision: resolved.decision,
            source: resolved.source.clone(),
        });

        match resolved.decision {
            Decision::Deny => {
                let reason = resolved
                    .reason
                    .clone()
                    .unwrap_or_else(|| format!("Policy denies {}", resource));
                return Some(self.deny(call, Some(resource), reason));
            }
            Decision::Ask | Decision::AllowInSession => {
                if !self.is_approved(run, resource, resolved.decision) {
                    return Some(self.interrupt(run, resource, resolved.decision));
                }
            }
            Decision::Allow => {}
        }

        let outcome = constraint::evaluate(
            resource.resource_type,
            &resource.resource_key,
            &resolved.constraints,
            &call.args,
            &self.workspace_root,
        );
        if !outcome.allowed {
            let reason = outcome
                .violation
                .unwrap_or_else(|| format!("Constraint violated for {}", resource));
            return Some(self.deny(call, Some(resource), reason));
        }

        if let Some(limit) = resolved.constraints.rate_limit {
            let key =
                RateLimitKey::for_resource(run.thread_id, self.agent_id.as_deref(), resource, limit);
            let now = self.clock.now_ms();
            match self.sessions.rate_limits().consume(&key, now) {
                Ok(decision) if decision.allowed => run.charges.push((key, now)),
                Ok(decision) => {
                    let retry_after_ms = decision.retry_after_ms.unwrap_or(0);
                    self.emit(AuthorizationEvent::RateLimited {
                        tool_call_id: call.id.clone(),
                        resource: resource.clone(),
                        retry_after_ms,
                    });
                    let reason = format!(
                        "Rate limit of {} calls per {}ms reached for {}; retry after {}ms",
                        limit.max_calls, limit.window_ms, resource, retry_after_ms
                    );
                    return Some(self.deny(call, Some(resource), reason));
                }
                Err(e) => return Some(self.deny(call, Some(resource), e.to_string())),
            }
        }

        None
    }

    fn is_approved(&self, run: &CheckRun<'_>, resource: &ResourceRef, decision: Decision) -> bool {
        if run.approved.contains(resource) {
            return true;
        }
        decision == Decision::AllowInSession
            && self.sessions.grants().has_access(&SessionGrantKey::for_resource(
                run.thread_id,
                self.agent_id.as_deref(),
                resource,
            ))
    }

    fn skill_gate(&self, call: &ToolCall) -> Option<String> {
        if call.name != SKILL_TOOL {
            return None;
        }
        let allowlist = self.skill_allowlist.as_ref()?;
        match skill_name(&call.args) {
            Some(name) if allowlist.contains(name) => None,
            Some(name) => Some(format!(
                "Skill '{}' is not available to agent '{}'",
                name,
                self.agent_id()
            )),
            None => Some("Skill name is missing".to_string()),
        }
    }

    fn release_charges(&self, run: &mut CheckRun<'_>) {
        for (key, timestamp) in run.charges.drain(..) {
            self.sessions.rate_limits().release(&key, timestamp);
        }
    }

    fn deny(&self, call: &ToolCall, resource: Option<&ResourceRef>, reason: String) -> Authorization {
        log::debug!("denied {} ({}): {}", call.name, call.id, reason);
        let message = ToolMessage::new(call.id.clone(), format!("Permission denied: {}", reason));
        self.emit(AuthorizationEvent::Denied {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            resource: resource.cloned(),
            reason,
        });
        Authorization::Deny(message)
    }

    fn interrupt(
        &self,
        run: &CheckRun<'_>,
        resource: &ResourceRef,
        decision: Decision,
    ) -> Authorization {
        let call = run.call;
        let request = InterruptRequest {
            interrupt_id: uuid::Uuid::new_v4().to_string(),
            thread_id: run.thread_id.to_string(),
            agent_id: self.agent_id().to_string(),
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            args: call.args.clone(),
            resource: resource.clone(),
            decision,
            allowed_decisions: AllowedDecision::ALL.to_vec(),
            approved: run.approved.to_vec(),
            description: format!(
                "Allow '{}' to {} {} '{}'?",
                call.name, resource.action, resource.resource_type, resource.resource_key
            ),
        };
        log::info!(
            "{} ({}) needs approval for {} ({})",
            call.name,
            call.id,
            resource,
            decision
        );
        self.emit(AuthorizationEvent::InterruptRequested {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            resource: resource.clone(),
            decision,
            args: call.args.clone(),
        });
        Authorization::Interrupt(request)
    }

    fn cancelled(&self, call: &ToolCall) -> Authorization {
        log::debug!("authorization of {} ({}) cancelled", call.name, call.id);
        self.emit(AuthorizationEvent::Cancelled {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
        });
        Authorization::Cancelled
    }
}

impl std::fmt::Debug for ToolAuthorizationMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolAuthorizationMiddleware")
            .field("agent_id", &self.agent_id())
            .field("workspace_root", &self.workspace_root)
            .field("scope", &self.scope)
            .field("connector_allowlist", &self.connector_allowlist)
            .field("skill_allowlist", &self.skill_allowlist)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::policy::{
        Action, MemoryPolicyStore, PolicyRule, PolicyStore, PolicyStoreError, RateLimit,
        SecurityDefaults,
    };
    use crate::test_utils::{EventCollector, RecordingHandler};
    use crate::tool::{handler_fn, ToolCategory};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory store that counts lookups and can cancel a token mid-check.
    struct LookupCountingStore {
        inner: MemoryPolicyStore,
        lookups: Arc<AtomicUsize>,
        cancel_on: Option<(ResourceType, CancellationToken)>,
    }

    impl LookupCountingStore {
        fn new(rules: Vec<PolicyRule>) -> (Self, Arc<AtomicUsize>) {
            let lookups = Arc::new(AtomicUsize::new(0));
            let store = Self {
                inner: MemoryPolicyStore::with_rules(rules),
                lookups: Arc::clone(&lookups),
                cancel_on: None,
            };
            (store, lookups)
        }

        fn cancel_on(mut self, resource_type: ResourceType, token: CancellationToken) -> Self {
            self.cancel_on = Some((resource_type, token));
            self
        }
    }

    #[async_trait]
    impl PolicyStore for LookupCountingStore {
        async fn rules_for(
            &self,
            agent: &str,
            resource_type: ResourceType,
            action: Action,
        ) -> std::result::Result<Vec<PolicyRule>, PolicyStoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if let Some((target, token)) = &self.cancel_on {
                if *target == resource_type {
                    token.cancel();
                }
            }
            self.inner.rules_for(agent, resource_type, action).await
        }

        async fn save(&self, rule: PolicyRule) -> std::result::Result<(), PolicyStoreError> {
            self.inner.save(rule).await
        }

        async fn load_all(&self) -> std::result::Result<Vec<PolicyRule>, PolicyStoreError> {
            self.inner.load_all().await
        }

        async fn delete(&self, id: &str) -> std::result::Result<bool, PolicyStoreError> {
            self.inner.delete(id).await
        }

        async fn clear(&self) -> std::result::Result<(), PolicyStoreError> {
            self.inner.clear().await
        }
    }

    fn tools() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new("read_file").with_category(ToolCategory::Filesystem),
            ToolDescriptor::new("write_file").with_category(ToolCategory::Filesystem),
            ToolDescriptor::new("fetch").with_action(Action::Read),
            ToolDescriptor::new("http_request").with_action(Action::Read),
            ToolDescriptor::new("deploy").with_action(Action::Exec),
            ToolDescriptor::new("bash").disabled(),
            ToolDescriptor::new("read_skill"),
        ]
    }

    fn middleware(rules: Vec<PolicyRule>) -> ToolAuthorizationMiddleware {
        ToolAuthorizationMiddleware::builder()
            .with_workspace_root("/ws")
            .with_policy_store(MemoryPolicyStore::with_rules(rules))
            .add_tools(tools())
            .build()
            .unwrap()
    }

    fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall::new(id, name, args)
    }

    fn expect_interrupt(outcome: Authorization) -> InterruptRequest {
        match outcome {
            Authorization::Interrupt(request) => request,
            other => panic!("expected interrupt, got {:?}", other),
        }
    }

    fn expect_denial(outcome: Authorization) -> ToolMessage {
        match outcome {
            Authorization::Deny(message) => message,
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disabled_tool_never_touches_state() {
        let (store, lookups) = LookupCountingStore::new(Vec::new());
        let mw = ToolAuthorizationMiddleware::builder()
            .with_workspace_root("/ws")
            .with_policy_store(store)
            .add_tools(tools())
            .build()
            .unwrap();

        let outcome = mw
            .authorize("t1", &call("c1", "bash", json!({"command": "ls"})), &CancellationToken::new())
            .await
            .unwrap();

        let message = expect_denial(outcome);
        assert_eq!(message.tool_call_id, "c1");
        assert!(message.content.contains("disabled"));
        assert_eq!(lookups.load(Ordering::SeqCst), 0);
        assert!(mw.sessions().grants().is_empty());
    }

    #[tokio::test]
    async fn test_skill_gate() {
        let (store, lookups) = LookupCountingStore::new(Vec::new());
        let mw = ToolAuthorizationMiddleware::builder()
            .with_workspace_root("/ws")
            .with_policy_store(store)
            .add_tools(tools())
            .with_skill_allowlist(["pdf"])
            .build()
            .unwrap();
        let cancel = CancellationToken::new();

        let denied = mw
            .authorize("t1", &call("c1", "read_skill", json!({"name": "docx"})), &cancel)
            .await
            .unwrap();
        assert!(expect_denial(denied).content.contains("Skill 'docx'"));

        let missing = mw
            .authorize("t1", &call("c2", "read_skill", json!({})), &cancel)
            .await
            .unwrap();
        assert!(missing.is_deny());
        assert_eq!(lookups.load(Ordering::SeqCst), 0);

        let allowed = mw
            .authorize("t1", &call("c3", "read_skill", json!({"name": "pdf"})), &cancel)
            .await
            .unwrap();
        assert!(allowed.is_proceed());
    }

    #[tokio::test]
    async fn test_deny_never_invokes_handler() {
        let mw = middleware(vec![PolicyRule::new(
            ResourceType::Tool,
            "deploy",
            Action::Exec,
            Decision::Deny,
        )]);
        let handler = RecordingHandler::new();

        let outcome = mw
            .wrap_tool_call(
                "t1",
                &call("call_9", "deploy", json!({})),
                &handler,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        match outcome {
            ToolCallOutcome::Completed(message) => {
                assert_eq!(message.tool_call_id, "call_9");
                assert!(message.content.starts_with("Permission denied"));
            }
            other => panic!("expected completed denial, got {:?}", other),
        }
        assert_eq!(handler.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_identifiers() {
        let mw = middleware(Vec::new());
        let cancel = CancellationToken::new();

        let err = mw
            .authorize("", &call("c1", "fetch", json!({})), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::MissingIdentifier("threadId")));

        let err = mw
            .authorize("t1", &call("", "fetch", json!({})), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::MissingIdentifier("toolCallId")));
    }

    #[tokio::test]
    async fn test_allow_in_session_is_remembered_per_thread() {
        let mw = ToolAuthorizationMiddleware::builder()
            .with_workspace_root("/ws")
            .with_security_defaults(SecurityDefaults::default().with(
                ResourceType::Tool,
                Action::Write,
                Decision::AllowInSession,
            ))
            .add_tool(ToolDescriptor::new("write_note"))
            .build()
            .unwrap();
        let handler = RecordingHandler::new();
        let cancel = CancellationToken::new();
        let first = call("c1", "write_note", json!({"text": "hi"}));

        let pending = expect_interrupt(mw.authorize("t1", &first, &cancel).await.unwrap());
        assert_eq!(pending.decision, Decision::AllowInSession);
        assert_eq!(pending.resource.resource_key, "write_note");

        let outcome = mw
            .resume("t1", &first, &pending, ResumeDecision::Approve, &handler, &cancel)
            .await
            .unwrap();
        assert!(matches!(outcome, ToolCallOutcome::Completed(_)));
        assert_eq!(handler.call_count(), 1);

        let second = call("c2", "write_note", json!({"text": "again"}));
        assert!(mw.authorize("t1", &second, &cancel).await.unwrap().is_proceed());

        // Another thread has no grant.
        assert!(mw.authorize("t2", &second, &cancel).await.unwrap().is_interrupt());
    }

    #[tokio::test]
    async fn test_ask_approval_is_not_remembered() {
        let mw = middleware(Vec::new());
        let handler = RecordingHandler::new();
        let cancel = CancellationToken::new();
        let deploy = call("c1", "deploy", json!({"env": "staging"}));

        let pending = expect_interrupt(mw.authorize("t1", &deploy, &cancel).await.unwrap());
        assert_eq!(pending.decision, Decision::Ask);

        mw.resume("t1", &deploy, &pending, ResumeDecision::Approve, &handler, &cancel)
            .await
            .unwrap();
        assert_eq!(handler.call_count(), 1);
        assert!(mw.sessions().grants().is_empty());

        let again = call("c2", "deploy", json!({"env": "staging"}));
        assert!(mw.authorize("t1", &again, &cancel).await.unwrap().is_interrupt());
    }

    #[tokio::test]
    async fn test_reject_returns_denial() {
        let mw = middleware(Vec::new());
        let handler = RecordingHandler::new();
        let cancel = CancellationToken::new();
        let deploy = call("c1", "deploy", json!({}));

        let pending = expect_interrupt(mw.authorize("t1", &deploy, &cancel).await.unwrap());
        let outcome = mw
            .resume(
                "t1",
                &deploy,
                &pending,
                ResumeDecision::Reject {
                    reason: Some("not today".into()),
                },
                &handler,
                &cancel,
            )
            .await
            .unwrap();

        match outcome {
            ToolCallOutcome::Completed(message) => {
                assert_eq!(message.tool_call_id, "c1");
                assert!(message.content.contains("not today"));
            }
            other => panic!("expected denial, got {:?}", other),
        }
        assert_eq!(handler.call_count(), 0);
    }

    #[tokio::test]
    async fn test_edit_runs_with_new_args() {
        let mw = middleware(Vec::new());
        let handler = RecordingHandler::new();
        let cancel = CancellationToken::new();
        let deploy = call("c1", "deploy", json!({"env": "prod"}));

        let pending = expect_interrupt(mw.authorize("t1", &deploy, &cancel).await.unwrap());
        mw.resume(
            "t1",
            &deploy,
            &pending,
            ResumeDecision::Edit {
                args: json!({"env": "staging"}),
            },
            &handler,
            &cancel,
        )
        .await
        .unwrap();

        let calls = handler.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "c1");
        assert_eq!(calls[0].args, json!({"env": "staging"}));
    }

    #[tokio::test]
    async fn test_resume_must_match_pending_call() {
        let mw = middleware(Vec::new());
        let cancel = CancellationToken::new();
        let deploy = call("c1", "deploy", json!({}));
        let pending = expect_interrupt(mw.authorize("t1", &deploy, &cancel).await.unwrap());

        let err = mw
            .resume_authorization("t2", &deploy, &pending, ResumeDecision::Approve, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::ResumeMismatch(_)));

        let other = call("c2", "deploy", json!({}));
        let err = mw
            .resume_authorization("t1", &other, &pending, ResumeDecision::Approve, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::ResumeMismatch(_)));

        let mut narrowed = pending.clone();
        narrowed.allowed_decisions = vec![AllowedDecision::Approve, AllowedDecision::Reject];
        let err = mw
            .resume_authorization(
                "t1",
                &deploy,
                &narrowed,
                ResumeDecision::Edit { args: json!({}) },
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::ResumeMismatch(_)));
    }

    #[tokio::test]
    async fn test_path_traversal_is_always_denied() {
        let mw = middleware(vec![PolicyRule::new(
            ResourceType::Filesystem,
            "*",
            Action::Read,
            Decision::Allow,
        )]);
        let outcome = mw
            .authorize(
                "t1",
                &call("c1", "read_file", json!({"path": "../../etc/passwd"})),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(expect_denial(outcome).content.contains("escapes workspace"));

        let outcome = mw
            .authorize(
                "t1",
                &call("c2", "read_file", json!({"path": "src/lib.rs"})),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(outcome.is_proceed());
    }

    #[tokio::test]
    async fn test_escaping_write_is_denied_without_a_prompt() {
        let (store, lookups) = LookupCountingStore::new(Vec::new());
        let mw = ToolAuthorizationMiddleware::builder()
            .with_workspace_root("/ws")
            .with_policy_store(store)
            .with_security_defaults(
                SecurityDefaults::default()
                    .with(ResourceType::Tool, Action::Write, Decision::AllowInSession)
                    .with(ResourceType::Filesystem, Action::Write, Decision::AllowInSession),
            )
            .add_tools(tools())
            .build()
            .unwrap();
        let cancel = CancellationToken::new();

        for (id, path) in [("c1", "../../etc/passwd"), ("c2", "/etc/passwd")] {
            let write = call(id, "write_file", json!({"path": path, "content": "x"}));
            let message = expect_denial(mw.authorize("t1", &write, &cancel).await.unwrap());
            assert!(message.content.contains("escapes workspace"));
        }
        assert_eq!(lookups.load(Ordering::SeqCst), 0);
        assert!(mw.sessions().grants().is_empty());

        // A path inside the workspace still goes through approval
        let inside = call("c3", "write_file", json!({"path": "notes.txt", "content": "x"}));
        assert!(mw.authorize("t1", &inside, &cancel).await.unwrap().is_interrupt());
    }

    #[tokio::test]
    async fn test_approval_is_bound_to_the_shown_arguments() {
        let mw = middleware(Vec::new());
        let handler = RecordingHandler::new();
        let cancel = CancellationToken::new();
        let staging = call("c1", "deploy", json!({"env": "staging"}));
        let pending = expect_interrupt(mw.authorize("t1", &staging, &cancel).await.unwrap());
        assert_eq!(pending.args, json!({"env": "staging"}));

        let prod = call("c1", "deploy", json!({"env": "prod"}));
        let err = mw
            .resume("t1", &prod, &pending, ResumeDecision::Approve, &handler, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::ResumeMismatch(_)));

        let err = mw
            .resume_authorization(
                "t1",
                &prod,
                &pending,
                ResumeDecision::Reject { reason: None },
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::ResumeMismatch(_)));
        assert_eq!(handler.call_count(), 0);

        // The approved arguments are the ones that run
        mw.resume("t1", &staging, &pending, ResumeDecision::Approve, &handler, &cancel)
            .await
            .unwrap();
        let calls = handler.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, json!({"env": "staging"}));
    }

    #[tokio::test]
    async fn test_sequential_approvals_accumulate() {
        // Tool write and filesystem write both ask by default.
        let mw = middleware(Vec::new());
        let handler = RecordingHandler::new();
        let cancel = CancellationToken::new();
        let write = call("c1", "write_file", json!({"path": "./notes.txt", "content": "x"}));

        let first = expect_interrupt(mw.authorize("t1", &write, &cancel).await.unwrap());
        assert_eq!(first.resource.resource_type, ResourceType::Tool);

        let (_, next) = mw
            .resume_authorization("t1", &write, &first, ResumeDecision::Approve, &cancel)
            .await
            .unwrap();
        let second = expect_interrupt(next);
        assert_eq!(
            second.resource,
            ResourceRef::new(ResourceType::Filesystem, "notes.txt", Action::Write)
        );
        assert_eq!(second.approved, vec![first.resource.clone()]);

        let outcome = mw
            .resume("t1", &write, &second, ResumeDecision::Approve, &handler, &cancel)
            .await
            .unwrap();
        assert!(matches!(outcome, ToolCallOutcome::Completed(_)));
        assert_eq!(handler.call_count(), 1);
    }

    fn rate_limited_fetch(max_calls: u32) -> PolicyRule {
        PolicyRule::new(ResourceType::Tool, "fetch", Action::Read, Decision::Allow).with_constraints(
            json!({"rateLimit": {"maxCalls": max_calls, "windowMs": 1000}}),
        )
    }

    #[tokio::test]
    async fn test_rate_limit_denies_with_retry_after() {
        let clock = Arc::new(ManualClock::new(0));
        let events = EventCollector::new();
        let mw = ToolAuthorizationMiddleware::builder()
            .with_workspace_root("/ws")
            .with_policy_store(MemoryPolicyStore::with_rules(vec![rate_limited_fetch(2)]))
            .with_clock(clock.clone())
            .add_hook(events.clone())
            .add_tools(tools())
            .build()
            .unwrap();
        let cancel = CancellationToken::new();
        let fetch = |id: &str| call(id, "fetch", json!({"query": "rust"}));

        assert!(mw.authorize("t1", &fetch("c1"), &cancel).await.unwrap().is_proceed());
        assert!(mw.authorize("t1", &fetch("c2"), &cancel).await.unwrap().is_proceed());

        let denied = expect_denial(mw.authorize("t1", &fetch("c3"), &cancel).await.unwrap());
        assert!(denied.content.contains("retry after 1000ms"));
        assert!(events.events().iter().any(|e| matches!(
            e,
            AuthorizationEvent::RateLimited { retry_after_ms: 1000, .. }
        )));

        // Entries at exactly now - window still count.
        clock.set(1000);
        assert!(mw.authorize("t1", &fetch("c4"), &cancel).await.unwrap().is_deny());

        clock.set(1001);
        assert!(mw.authorize("t1", &fetch("c5"), &cancel).await.unwrap().is_proceed());

        // Other threads have their own window.
        assert!(mw.authorize("t2", &fetch("c6"), &cancel).await.unwrap().is_proceed());
    }

    #[tokio::test]
    async fn test_unbounded_window_denies_without_overflow() {
        let rule = PolicyRule::new(ResourceType::Tool, "fetch", Action::Read, Decision::Allow)
            .with_constraints(json!({"rateLimit": {"maxCalls": 1, "windowMs": u64::MAX}}));
        let mw = ToolAuthorizationMiddleware::builder()
            .with_workspace_root("/ws")
            .with_policy_store(MemoryPolicyStore::with_rules(vec![rule]))
            .with_clock(Arc::new(ManualClock::new(5)))
            .add_tools(tools())
            .build()
            .unwrap();
        let cancel = CancellationToken::new();

        assert!(mw
            .authorize("t1", &call("c1", "fetch", json!({})), &cancel)
            .await
            .unwrap()
            .is_proceed());
        let denied = expect_denial(
            mw.authorize("t1", &call("c2", "fetch", json!({})), &cancel)
                .await
                .unwrap(),
        );
        assert!(denied.content.contains("Rate limit of 1 calls"));
    }

    #[tokio::test]
    async fn test_interrupt_releases_rate_limit_charge() {
        let rule = PolicyRule::new(ResourceType::Tool, "http_request", Action::Read, Decision::Allow)
            .with_constraints(json!({"rateLimit": {"maxCalls": 1, "windowMs": 60000}}));
        let mw = middleware(vec![rule]);
        let cancel = CancellationToken::new();
        let post = call(
            "c1",
            "http_request",
            json!({"url": "https://api.example.com/items", "method": "POST"}),
        );
        let key = RateLimitKey::new(
            "t1",
            None,
            ResourceType::Tool,
            "http_request",
            Action::Read,
            RateLimit::new(1, 60000),
        );

        // Network post asks by default; the tool-level charge is undone.
        let pending = expect_interrupt(mw.authorize("t1", &post, &cancel).await.unwrap());
        assert_eq!(pending.resource.resource_type, ResourceType::Network);
        assert_eq!(pending.resource.resource_key, "api.example.com");
        assert_eq!(pending.resource.action, Action::Post);
        assert_eq!(mw.sessions().rate_limits().recorded(&key), 0);

        let (_, outcome) = mw
            .resume_authorization("t1", &post, &pending, ResumeDecision::Approve, &cancel)
            .await
            .unwrap();
        assert!(outcome.is_proceed());
        assert_eq!(mw.sessions().rate_limits().recorded(&key), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_check() {
        let mw = middleware(vec![rate_limited_fetch(5)]);
        let handler = RecordingHandler::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = mw
            .wrap_tool_call("t1", &call("c1", "fetch", json!({})), &handler, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, ToolCallOutcome::Cancelled);
        assert_eq!(handler.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_mid_check_releases_charges() {
        let cancel = CancellationToken::new();
        let rule = PolicyRule::new(ResourceType::Tool, "read_file", Action::Read, Decision::Allow)
            .with_constraints(json!({"rateLimit": {"maxCalls": 5, "windowMs": 1000}}));
        let (store, _) = LookupCountingStore::new(vec![rule]);
        let mw = ToolAuthorizationMiddleware::builder()
            .with_workspace_root("/ws")
            .with_policy_store(store.cancel_on(ResourceType::Filesystem, cancel.clone()))
            .add_tools(tools())
            .build()
            .unwrap();
        let handler = RecordingHandler::new();

        let outcome = mw
            .wrap_tool_call(
                "t1",
                &call("c1", "read_file", json!({"path": "a.txt"})),
                &handler,
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(outcome, ToolCallOutcome::Cancelled);
        assert_eq!(handler.call_count(), 0);
        let key = RateLimitKey::new(
            "t1",
            None,
            ResourceType::Tool,
            "read_file",
            Action::Read,
            RateLimit::new(5, 1000),
        );
        assert_eq!(mw.sessions().rate_limits().recorded(&key), 0);
    }

    #[tokio::test]
    async fn test_cancelled_resume_records_no_grant() {
        let mw = ToolAuthorizationMiddleware::builder()
            .with_workspace_root("/ws")
            .with_security_defaults(SecurityDefaults::default().with(
                ResourceType::Tool,
                Action::Exec,
                Decision::AllowInSession,
            ))
            .add_tools(tools())
            .build()
            .unwrap();
        let deploy = call("c1", "deploy", json!({}));
        let pending =
            expect_interrupt(mw.authorize("t1", &deploy, &CancellationToken::new()).await.unwrap());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let (_, outcome) = mw
            .resume_authorization("t1", &deploy, &pending, ResumeDecision::Approve, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, Authorization::Cancelled);
        assert!(mw.sessions().grants().is_empty());
    }

    #[tokio::test]
    async fn test_connector_allowlist() {
        let mw = ToolAuthorizationMiddleware::builder()
            .with_workspace_root("/ws")
            .add_tool(ToolDescriptor::new("connector__slack__post_message"))
            .add_tool(ToolDescriptor::new("connector__github__list_issues"))
            .with_security_defaults(
                SecurityDefaults::default()
                    .with(ResourceType::Tool, Action::Write, Decision::Allow)
                    .with(ResourceType::Connector, Action::Post, Decision::Allow),
            )
            .with_connector_allowlist(["github"])
            .build()
            .unwrap();
        let cancel = CancellationToken::new();

        let denied = mw
            .authorize("t1", &call("c1", "connector__slack__post_message", json!({})), &cancel)
            .await
            .unwrap();
        assert!(expect_denial(denied).content.contains("Connector 'slack'"));

        let allowed = mw
            .authorize("t1", &call("c2", "connector__github__list_issues", json!({})), &cancel)
            .await
            .unwrap();
        assert!(allowed.is_proceed());
    }

    #[tokio::test]
    async fn test_network_domain_constraint() {
        let rule = PolicyRule::new(ResourceType::Network, "*", Action::Read, Decision::Allow)
            .with_constraints(json!({"allowedDomains": ["example.com"]}));
        let mw = middleware(vec![rule]);
        let cancel = CancellationToken::new();

        let denied = mw
            .authorize("t1", &call("c1", "fetch", json!({"url": "https://evil.com/x"})), &cancel)
            .await
            .unwrap();
        assert!(expect_denial(denied).content.contains("evil.com"));

        let allowed = mw
            .authorize(
                "t1",
                &call("c2", "fetch", json!({"url": "https://api.example.com/x"})),
                &cancel,
            )
            .await
            .unwrap();
        assert!(allowed.is_proceed());
    }

    #[tokio::test]
    async fn test_malformed_constraints_fail_closed() {
        let rule = PolicyRule::new(ResourceType::Tool, "fetch", Action::Read, Decision::Allow)
            .with_constraints(json!({"maxBytes": 10}));
        let mw = middleware(vec![rule]);
        let outcome = mw
            .authorize("t1", &call("c1", "fetch", json!({})), &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.is_deny());
    }

    #[tokio::test]
    async fn test_interrupt_on() {
        let mw = middleware(vec![PolicyRule::new(
            ResourceType::Tool,
            "write_file",
            Action::Write,
            Decision::Allow,
        )]);
        let interrupt_on = mw.interrupt_on().await;
        let names: Vec<&str> = interrupt_on.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["deploy"]);
        assert_eq!(
            interrupt_on["deploy"].allowed_decisions,
            AllowedDecision::ALL.to_vec()
        );
    }

    #[tokio::test]
    async fn test_events_for_allowed_call() {
        let mw = middleware(Vec::new());
        let events = EventCollector::new();
        mw.add_hook(events.clone());

        mw.authorize("t1", &call("c1", "fetch", json!({})), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            events.kinds(),
            vec!["check_started", "policy_resolved", "proceeded"]
        );
    }

    #[tokio::test]
    async fn test_handler_error_propagates() {
        let mw = middleware(Vec::new());
        let handler =
            handler_fn(|_call: ToolCall| async move { Err(ToolError::Custom("boom".into())) });
        let err = mw
            .wrap_tool_call("t1", &call("c1", "fetch", json!({})), &handler, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::Handler(_)));
    }
}
