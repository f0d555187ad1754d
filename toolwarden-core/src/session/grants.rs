//! Session grants.
//!
//! A grant records that a human approved `(agent, resource, action)` inside a
//! thread, so identical checks in the same thread skip the prompt.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::{require_thread, SessionError};
use crate::policy::{agent_key, Action, ResourceRef, ResourceType};

/// Identity of an "already approved in this session" fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrantKey {
    pub thread_id: String,
    /// Agent id, normalized to `"default"` when absent.
    pub agent_id: String,
    pub resource_type: ResourceType,
    pub resource_key: String,
    pub action: Action,
}

impl SessionGrantKey {
    pub fn new(
        thread_id: impl Into<String>,
        agent_id: Option<&str>,
        resource_type: ResourceType,
        resource_key: impl Into<String>,
        action: Action,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            agent_id: agent_key(agent_id).to_string(),
            resource_type,
            resource_key: resource_key.into(),
            action,
        }
    }

    /// Key for `resource` as seen by `agent_id` in `thread_id`.
    pub fn for_resource(thread_id: &str, agent_id: Option<&str>, resource: &ResourceRef) -> Self {
        Self::new(
            thread_id,
            agent_id,
            resource.resource_type,
            resource.resource_key.clone(),
            resource.action,
        )
    }

    fn entry(&self) -> GrantEntry {
        GrantEntry {
            agent_id: self.agent_id.clone(),
            resource_type: self.resource_type,
            resource_key: self.resource_key.clone(),
            action: self.action,
        }
    }
}

/// Grant identity inside a thread partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GrantEntry {
    agent_id: String,
    resource_type: ResourceType,
    resource_key: String,
    action: Action,
}

/// In-memory set of session grants, partitioned by thread id.
///
/// Partitioning by the whole thread id means clearing `"t1"` can never touch
/// `"t10"`.
#[derive(Debug, Default)]
pub struct SessionGrants {
    threads: Mutex<HashMap<String, HashSet<GrantEntry>>>,
}

impl SessionGrants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grant. Granting twice is a no-op.
    pub fn grant(&self, key: &SessionGrantKey) -> Result<(), SessionError> {
        require_thread(&key.thread_id)?;
        self.threads
            .lock()
            .entry(key.thread_id.clone())
            .or_default()
            .insert(key.entry());
        Ok(())
    }

    /// Whether `key` has been granted. Unknown threads have no grants.
    pub fn has_access(&self, key: &SessionGrantKey) -> bool {
        self.threads
            .lock()
            .get(&key.thread_id)
            .map(|entries| entries.contains(&key.entry()))
            .unwrap_or(false)
    }

    /// Remove a single grant. Returns `true` if it existed.
    pub fn revoke(&self, key: &SessionGrantKey) -> bool {
        let mut threads = self.threads.lock();
        let Some(entries) = threads.get_mut(&key.thread_id) else {
            return false;
        };
        let removed = entries.remove(&key.entry());
        if entries.is_empty() {
            threads.remove(&key.thread_id);
        }
        removed
    }

    /// Remove every grant in `thread_id`. Returns the number removed.
    pub fn clear_thread(&self, thread_id: &str) -> usize {
        self.threads
            .lock()
            .remove(thread_id)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    /// Remove every grant for one agent in `thread_id`.
    pub fn clear_agent(&self, thread_id: &str, agent_id: Option<&str>) -> usize {
        let agent = agent_key(agent_id);
        let mut threads = self.threads.lock();
        let Some(entries) = threads.get_mut(thread_id) else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|e| e.agent_id != agent);
        let removed = before - entries.len();
        if entries.is_empty() {
            threads.remove(thread_id);
        }
        removed
    }

    pub fn clear_all(&self) {
        self.threads.lock().clear();
    }

    /// All grants recorded for `thread_id`.
    pub fn grants_for_thread(&self, thread_id: &str) -> Vec<SessionGrantKey> {
        self.threads
            .lock()
            .get(thread_id)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| SessionGrantKey {
                        thread_id: thread_id.to_string(),
                        agent_id: e.agent_id.clone(),
                        resource_type: e.resource_type,
                        resource_key: e.resource_key.clone(),
                        action: e.action,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total number of grants across all threads.
    pub fn len(&self) -> usize {
        self.threads.lock().values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
