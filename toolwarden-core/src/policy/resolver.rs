//! Policy decision resolution.

use serde::Serialize;
use std::sync::Arc;

use super::constraint::PolicyConstraints;
use super::defaults::SecurityDefaults;
use super::rule::PolicyRule;
use super::store::PolicyStore;
use super::{agent_key, Action, Decision, ResourceType, Scope};

/// Which level of the resolution order produced a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PolicySource {
    /// A rule for the exact resource key.
    Exact { rule_id: String },
    /// A `*` rule for the resource type.
    Wildcard { rule_id: String },
    /// No rule matched; the security defaults applied.
    SecurityDefault,
    /// Lookup or validation failed; the check fails closed.
    Fault,
}

/// A decision together with the constraints that come with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPolicy {
    pub decision: Decision,
    pub constraints: PolicyConstraints,
    pub source: PolicySource,
    /// Explanation for fault-driven denials.
    pub reason: Option<String>,
}

impl ResolvedPolicy {
    fn fault(reason: String) -> Self {
        Self {
            decision: Decision::Deny,
            constraints: PolicyConstraints::none(),
            source: PolicySource::Fault,
            reason: Some(reason),
        }
    }

    pub fn is_fault(&self) -> bool {
        self.source == PolicySource::Fault
    }
}

/// Resolves `(agent, resource, action)` questions against a rule table.
///
/// Resolution order:
/// 1. rule for the exact `(resource_type, resource_key, action)`
/// 2. rule for `(resource_type, "*", action)`
/// 3. the security defaults for `(resource_type, action)`
///
/// Within a level an agent-specific rule beats an all-agent rule, and a
/// session rule beats a workspace rule. Resolution never mutates anything;
/// a failed lookup or a malformed constraint payload resolves to
/// [`Decision::Deny`] with [`PolicySource::Fault`].
#[derive(Clone)]
pub struct PolicyResolver {
    store: Arc<dyn PolicyStore>,
    defaults: SecurityDefaults,
}

impl PolicyResolver {
    /// Create a resolver over `store` with the built-in security defaults.
    pub fn new(store: impl PolicyStore + 'static) -> Self {
        Self::with_store(Arc::new(store))
    }

    /// Create a resolver over a shared store.
    pub fn with_store(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            store,
            defaults: SecurityDefaults::default(),
        }
    }

    /// Replace the workspace security defaults.
    pub fn with_defaults(mut self, defaults: SecurityDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> &SecurityDefaults {
        &self.defaults
    }

    pub fn store(&self) -> &Arc<dyn PolicyStore> {
        &self.store
    }

    /// Resolve a decision.
    ///
    /// `security_defaults` overrides the resolver's own defaults for this call.
    pub async fn resolve(
        &self,
        agent_id: Option<&str>,
        resource_type: ResourceType,
        resource_key: &str,
        action: Action,
        scope: Scope,
        security_defaults: Option<&SecurityDefaults>,
    ) -> ResolvedPolicy {
        let agent = agent_key(agent_id);

        let rules = match self.store.rules_for(agent, resource_type, action).await {
            Ok(rules) => rules,
            Err(e) => {
                log::warn!(
                    "policy lookup failed for {} {} '{}' ({}): {}",
                    agent,
                    resource_type,
                    resource_key,
                    action,
                    e
                );
                return ResolvedPolicy::fault(format!("Policy lookup failed: {}", e));
            }
        };

        let visible: Vec<&PolicyRule> = rules.iter().filter(|r| r.visible_in(scope)).collect();

        let exact = best_rule(
            visible
                .iter()
                .copied()
                .filter(|r| !r.is_wildcard() && r.resource_key == resource_key),
        );
        let resolved = if let Some(rule) = exact {
            from_rule(
                rule,
                resource_type,
                PolicySource::Exact {
                    rule_id: rule.id.clone(),
                },
            )
        } else if let Some(rule) = best_rule(visible.iter().copied().filter(|r| r.is_wildcard())) {
            from_rule(
                rule,
                resource_type,
                PolicySource::Wildcard {
                    rule_id: rule.id.clone(),
                },
            )
        } else {
            let defaults = security_defaults.unwrap_or(&self.defaults);
            ResolvedPolicy {
                decision: defaults.decision(resource_type, action),
                constraints: PolicyConstraints::none(),
                source: PolicySource::SecurityDefault,
                reason: None,
            }
        };

        log::debug!(
            "resolved {} {} '{}' ({}) -> {} via {:?}",
            agent,
            resource_type,
            resource_key,
            action,
            resolved.decision,
            resolved.source
        );
        resolved
    }
}

/// Highest-precedence rule; the earliest one wins ties.
fn best_rule<'a>(rules: impl Iterator<Item = &'a PolicyRule>) -> Option<&'a PolicyRule> {
    rules.fold(None::<&'a PolicyRule>, |best, rule| match best {
        Some(b) if b.precedence() >= rule.precedence() => Some(b),
        _ => Some(rule),
    })
}

fn from_rule(rule: &PolicyRule, resource_type: ResourceType, source: PolicySource) -> ResolvedPolicy {
    if rule.decision.is_deny() {
        return ResolvedPolicy {
            decision: Decision::Deny,
            constraints: PolicyConstraints::none(),
            source,
            reason: None,
        };
    }

    match PolicyConstraints::parse(resource_type, &rule.constraints) {
        Ok(constraints) => ResolvedPolicy {
            decision: rule.decision,
            constraints,
            source,
            reason: None,
        },
        Err(e) => {
            log::warn!("rule {} has invalid constraints: {}", rule.id, e);
            ResolvedPolicy::fault(format!("Invalid policy constraints: {}", e))
        }
    }
}
