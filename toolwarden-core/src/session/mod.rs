//! Ephemeral per-thread authorization state.
//!
//! [`PolicySessionStore`] owns the two mutable structures the authorization
//! core needs: session grants ("already approved in this thread") and
//! sliding-window rate-limit state. Both are partitioned by thread id and
//! never persisted. One store is owned by the runtime and shared through an
//! `Arc` with every middleware that runtime builds, including subagent
//! middleware.
//!
//! # Example
//!
//! ```rust
//! use toolwarden_core::policy::{Action, RateLimit, ResourceType};
//! use toolwarden_core::session::{PolicySessionStore, RateLimitKey, SessionGrantKey};
//!
//! let store = PolicySessionStore::new();
//!
//! let key = SessionGrantKey::new("thread-1", None, ResourceType::Tool, "write_file", Action::Write);
//! store.grants().grant(&key).unwrap();
//! assert!(store.grants().has_access(&key));
//!
//! let limit = RateLimitKey::new(
//!     "thread-1", None, ResourceType::Tool, "fetch", Action::Read, RateLimit::new(1, 1000),
//! );
//! assert!(store.rate_limits().consume(&limit, 0).unwrap().allowed);
//! assert!(!store.rate_limits().consume(&limit, 10).unwrap().allowed);
//!
//! store.clear_thread("thread-1");
//! assert!(!store.grants().has_access(&key));
//! ```

mod grants;
mod rate_limit;

pub use grants::{SessionGrantKey, SessionGrants};
pub use rate_limit::{RateLimitDecision, RateLimitKey, RateLimiter};

/// Errors raised by session state operations.
///
/// Missing state is never an error; only missing identifiers are.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A required identifier was empty.
    #[error("missing required identifier: {0}")]
    MissingIdentifier(&'static str),
}

pub(crate) fn require_thread(thread_id: &str) -> Result<(), SessionError> {
    if thread_id.trim().is_empty() {
        Err(SessionError::MissingIdentifier("threadId"))
    } else {
        Ok(())
    }
}

/// Session grants plus rate-limit windows for one runtime.
#[derive(Debug, Default)]
pub struct PolicySessionStore {
    grants: SessionGrants,
    rate_limits: RateLimiter,
}

impl PolicySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grants(&self) -> &SessionGrants {
        &self.grants
    }

    pub fn rate_limits(&self) -> &RateLimiter {
        &self.rate_limits
    }

    /// Drop grants and rate-limit windows for every agent in `thread_id`.
    ///
    /// Called on run start, abort, or restart of a thread.
    pub fn clear_thread(&self, thread_id: &str) {
        let grants = self.grants.clear_thread(thread_id);
        let windows = self.rate_limits.clear_thread(thread_id);
        log::debug!(
            "cleared session state for thread {} ({} grants, {} windows)",
            thread_id,
            grants,
            windows
        );
    }

    /// Drop grants and rate-limit windows for one agent in one thread.
    pub fn clear_agent(&self, thread_id: &str, agent_id: Option<&str>) {
        self.grants.clear_agent(thread_id, agent_id);
        self.rate_limits.clear_agent(thread_id, agent_id);
    }

    /// Drop everything, e.g. on shutdown.
    pub fn clear_all(&self) {
        self.grants.clear_all();
        self.rate_limits.clear_all();
    }
}
