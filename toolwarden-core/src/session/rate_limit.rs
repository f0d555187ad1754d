//! Sliding-window rate limiting.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use super::{require_thread, SessionError};
use crate::policy::{agent_key, Action, RateLimit, ResourceRef, ResourceType};

/// Identity of one rate-limit window.
///
/// The limit parameters are part of the key: changing a rule's limit starts a
/// fresh window instead of reinterpreting the old one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitKey {
    pub thread_id: String,
    pub agent_id: String,
    pub resource_type: ResourceType,
    pub resource_key: String,
    pub action: Action,
    pub limit: RateLimit,
}

impl RateLimitKey {
    pub fn new(
        thread_id: impl Into<String>,
        agent_id: Option<&str>,
        resource_type: ResourceType,
        resource_key: impl Into<String>,
        action: Action,
        limit: RateLimit,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            agent_id: agent_key(agent_id).to_string(),
            resource_type,
            resource_key: resource_key.into(),
            action,
            limit,
        }
    }

    pub fn for_resource(
        thread_id: &str,
        agent_id: Option<&str>,
        resource: &ResourceRef,
        limit: RateLimit,
    ) -> Self {
        Self::new(
            thread_id,
            agent_id,
            resource.resource_type,
            resource.resource_key.clone(),
            resource.action,
            limit,
        )
    }

    fn window(&self) -> WindowKey {
        WindowKey {
            agent_id: self.agent_id.clone(),
            resource_type: self.resource_type,
            resource_key: self.resource_key.clone(),
            action: self.action,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    agent_id: String,
    resource_type: ResourceType,
    resource_key: String,
    action: Action,
    limit: RateLimit,
}

/// Result of a [`RateLimiter::consume`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Calls left in the window after this one.
    pub remaining: u32,
    /// Milliseconds until the oldest call leaves the window (denials only).
    pub retry_after_ms: Option<u64>,
}

/// Sliding-window call counter, partitioned by thread id.
///
/// Each window is an ordered list of call timestamps (milliseconds). On every
/// [`consume`](Self::consume), timestamps older than `now - window_ms` are
/// pruned from every window of the thread and windows left empty are
/// dropped; an entry exactly at `now - window_ms` is still inside the window.
/// Each consume is a single critical section, so concurrent callers never
/// lose updates.
#[derive(Debug, Default)]
pub struct RateLimiter {
    threads: Mutex<HashMap<String, HashMap<WindowKey, VecDeque<u64>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call at `now_ms` if the window has room.
    pub fn consume(&self, key: &RateLimitKey, now_ms: u64) -> Result<RateLimitDecision, SessionError> {
        require_thread(&key.thread_id)?;

        let RateLimit {
            max_calls,
            window_ms,
        } = key.limit;

        let mut threads = self.threads.lock();
        let windows = threads.entry(key.thread_id.clone()).or_default();
        windows.retain(|k, w| {
            prune(w, now_ms.saturating_sub(k.limit.window_ms));
            !w.is_empty()
        });
        let window = windows.entry(key.window()).or_default();

        if window.len() >= max_calls as usize {
            let oldest = window.front().copied().unwrap_or(now_ms);
            let retry_after_ms = oldest.saturating_add(window_ms).saturating_sub(now_ms);
            return Ok(RateLimitDecision {
                allowed: false,
                remaining: 0,
                retry_after_ms: Some(retry_after_ms),
            });
        }

        // Keep the window ordered even if the clock steps backwards.
        let at = window.partition_point(|&t| t <= now_ms);
        window.insert(at, now_ms);

        Ok(RateLimitDecision {
            allowed: true,
            remaining: max_calls.saturating_sub(window.len() as u32),
            retry_after_ms: None,
        })
    }

    /// Undo one call recorded at `timestamp_ms`. Returns `true` if found.
    pub fn release(&self, key: &RateLimitKey, timestamp_ms: u64) -> bool {
        let mut threads = self.threads.lock();
        let Some(windows) = threads.get_mut(&key.thread_id) else {
            return false;
        };
        let window_key = key.window();
        let Some(window) = windows.get_mut(&window_key) else {
            return false;
        };
        let Some(pos) = window.iter().position(|&t| t == timestamp_ms) else {
            return false;
        };
        window.remove(pos);
        if window.is_empty() {
            windows.remove(&window_key);
        }
        if windows.is_empty() {
            threads.remove(&key.thread_id);
        }
        true
    }

    /// Number of calls currently recorded for `key` (without pruning).
    pub fn recorded(&self, key: &RateLimitKey) -> usize {
        self.threads
            .lock()
            .get(&key.thread_id)
            .and_then(|w| w.get(&key.window()))
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// Drop every window in `thread_id`. Returns the number of windows removed.
    pub fn clear_thread(&self, thread_id: &str) -> usize {
        self.threads
            .lock()
            .remove(thread_id)
            .map(|w| w.len())
            .unwrap_or(0)
    }

    /// Drop every window for one agent in `thread_id`.
    pub fn clear_agent(&self, thread_id: &str, agent_id: Option<&str>) -> usize {
        let agent = agent_key(agent_id);
        let mut threads = self.threads.lock();
        let Some(windows) = threads.get_mut(thread_id) else {
            return 0;
        };
        let before = windows.len();
        windows.retain(|k, _| k.agent_id != agent);
        let removed = before - windows.len();
        if windows.is_empty() {
            threads.remove(thread_id);
        }
        removed
    }

    pub fn clear_all(&self) {
        self.threads.lock().clear();
    }
}

fn prune(window: &mut VecDeque<u64>, cutoff: u64) {
    while window.front().is_some_and(|&t| t < cutoff) {
        window.pop_front();
    }
}
