//! Policy rule storage trait and implementations.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::PathBuf;

use super::rule::PolicyRule;
use super::{Action, ResourceType};

/// Errors that can occur in policy store operations.
#[derive(Debug, thiserror::Error)]
pub enum PolicyStoreError {
    /// Failed to read rules from storage.
    #[error("Failed to read policy rules: {0}")]
    Read(String),

    /// Failed to write rules to storage.
    #[error("Failed to write policy rules: {0}")]
    Write(String),

    /// IO error during storage operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Trait for policy rule storage.
///
/// The resolver only ever calls [`PolicyStore::rules_for`]; the remaining
/// methods exist for the collaborators that manage the rule table.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Load every rule for `(resource_type, action)` that can apply to `agent`.
    ///
    /// Rules are returned in insertion order.
    async fn rules_for(
        &self,
        agent: &str,
        resource_type: ResourceType,
        action: Action,
    ) -> Result<Vec<PolicyRule>, PolicyStoreError>;

    /// Save a rule.
    async fn save(&self, rule: PolicyRule) -> Result<(), PolicyStoreError>;

    /// Load all rules.
    async fn load_all(&self) -> Result<Vec<PolicyRule>, PolicyStoreError>;

    /// Remove a rule by id.
    ///
    /// Returns `true` if a rule was removed, `false` if not found.
    async fn delete(&self, id: &str) -> Result<bool, PolicyStoreError>;

    /// Remove all rules.
    async fn clear(&self) -> Result<(), PolicyStoreError>;
}

fn select(
    rules: &[PolicyRule],
    agent: &str,
    resource_type: ResourceType,
    action: Action,
) -> Vec<PolicyRule> {
    rules
        .iter()
        .filter(|r| r.resource_type == resource_type && r.action == action)
        .filter(|r| r.applies_to_agent(agent))
        .cloned()
        .collect()
}

/// In-memory policy store.
#[derive(Default)]
pub struct MemoryPolicyStore {
    rules: RwLock<Vec<PolicyRule>>,
}

impl MemoryPolicyStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with rules.
    pub fn with_rules(rules: impl IntoIterator<Item = PolicyRule>) -> Self {
        Self {
            rules: RwLock::new(rules.into_iter().collect()),
        }
    }

    /// Add a rule without going through the async trait.
    pub fn insert(&self, rule: PolicyRule) {
        self.rules.write().push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn rules_for(
        &self,
        agent: &str,
        resource_type: ResourceType,
        action: Action,
    ) -> Result<Vec<PolicyRule>, PolicyStoreError> {
        Ok(select(&self.rules.read(), agent, resource_type, action))
    }

    async fn save(&self, rule: PolicyRule) -> Result<(), PolicyStoreError> {
        self.insert(rule);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<PolicyRule>, PolicyStoreError> {
        Ok(self.rules.read().clone())
    }

    async fn delete(&self, id: &str) -> Result<bool, PolicyStoreError> {
        let mut rules = self.rules.write();
        let original_len = rules.len();
        rules.retain(|r| r.id != id);
        Ok(rules.len() < original_len)
    }

    async fn clear(&self) -> Result<(), PolicyStoreError> {
        self.rules.write().clear();
        Ok(())
    }
}

/// File-based policy store.
///
/// Rules are persisted as a JSON array. The file is created when the first
/// rule is saved; a missing or empty file reads as an empty table.
pub struct FilePolicyStore {
    path: PathBuf,
    cache: RwLock<Option<Vec<PolicyRule>>>,
}

impl FilePolicyStore {
    /// Create a store backed by `path`. The file does not need to exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Load rules from file into cache if not already loaded.
    fn ensure_loaded(&self) -> Result<(), PolicyStoreError> {
        let mut cache = self.cache.write();
        if cache.is_some() {
            return Ok(());
        }

        let rules = if self.path.exists() {
            let contents = std::fs::read_to_string(&self.path)?;
            if contents.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            Vec::new()
        };

        *cache = Some(rules);
        Ok(())
    }

    /// Write cache to file.
    fn flush(&self) -> Result<(), PolicyStoreError> {
        let cache = self.cache.read();
        if let Some(ref rules) = *cache {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let json = serde_json::to_string_pretty(rules)?;
            std::fs::write(&self.path, json)?;
        }
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for FilePolicyStore {
    async fn rules_for(
        &self,
        agent: &str,
        resource_type: ResourceType,
        action: Action,
    ) -> Result<Vec<PolicyRule>, PolicyStoreError> {
        self.ensure_loaded()?;
        let cache = self.cache.read();
        Ok(cache
            .as_deref()
            .map(|rules| select(rules, agent, resource_type, action))
            .unwrap_or_default())
    }

    async fn save(&self, rule: PolicyRule) -> Result<(), PolicyStoreError> {
        self.ensure_loaded()?;
        {
            let mut cache = self.cache.write();
            if let Some(ref mut rules) = *cache {
                rules.push(rule);
            }
        }
        self.flush()
    }

    async fn load_all(&self) -> Result<Vec<PolicyRule>, PolicyStoreError> {
        self.ensure_loaded()?;
        Ok(self.cache.read().clone().unwrap_or_default())
    }

    async fn delete(&self, id: &str) -> Result<bool, PolicyStoreError> {
        self.ensure_loaded()?;
        let removed = {
            let mut cache = self.cache.write();
            match *cache {
                Some(ref mut rules) => {
                    let original_len = rules.len();
                    rules.retain(|r| r.id != id);
                    rules.len() < original_len
                }
                None => false,
            }
        };
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), PolicyStoreError> {
        self.ensure_loaded()?;
        {
            let mut cache = self.cache.write();
            if let Some(ref mut rules) = *cache {
                rules.clear();
            }
        }
        self.flush()
    }
}
