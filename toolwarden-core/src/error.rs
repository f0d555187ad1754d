//! Top-level error types for toolwarden
//!
//! Policy outcomes (deny, ask, rate limited) are never errors; they come back
//! as data. This type only covers failures a caller has to fix.

use thiserror::Error;

use crate::config::ConfigError;
use crate::middleware::AuthorizationError;
use crate::policy::{ConstraintError, PolicyStoreError};
use crate::session::SessionError;
use crate::tool::ToolError;

/// Top-level error type for toolwarden operations
///
/// - [`Error::MissingIdentifier`] - Caller passed an empty thread or tool-call id
/// - [`Error::Store`] - Policy rules could not be loaded or saved
/// - [`Error::Constraint`] - A constraint payload was rejected
/// - [`Error::Tool`] - The wrapped tool handler failed
/// - [`Error::Config`] - Fix configuration (bad file, missing workspace root)
#[derive(Debug, Error)]
pub enum Error {
    /// A required identifier was empty
    #[error("missing required identifier: {0}")]
    MissingIdentifier(String),

    /// Policy store failure
    #[error("policy store error: {0}")]
    Store(String),

    /// Malformed constraint payload
    #[error("constraint error: {0}")]
    Constraint(String),

    /// Tool execution failed
    #[error("tool error: {0}")]
    Tool(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Returns true if a required identifier was missing
    pub fn is_missing_identifier(&self) -> bool {
        matches!(self, Self::MissingIdentifier(_))
    }

    /// Returns true if this is a policy store error
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns true if this is a constraint error
    pub fn is_constraint(&self) -> bool {
        matches!(self, Self::Constraint(_))
    }

    /// Returns true if this is a tool error
    pub fn is_tool(&self) -> bool {
        matches!(self, Self::Tool(_))
    }

    /// Returns true if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::MissingIdentifier(id) => Self::MissingIdentifier(id.to_string()),
        }
    }
}

impl From<PolicyStoreError> for Error {
    fn from(err: PolicyStoreError) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<ConstraintError> for Error {
    fn from(err: ConstraintError) -> Self {
        Self::Constraint(err.to_string())
    }
}

impl From<ToolError> for Error {
    fn from(err: ToolError) -> Self {
        Self::Tool(err.to_string())
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Store(e) => e.into(),
            other => Self::Config(other.to_string()),
        }
    }
}

impl From<AuthorizationError> for Error {
    fn from(err: AuthorizationError) -> Self {
        match err {
            AuthorizationError::MissingIdentifier(id) => Self::MissingIdentifier(id.to_string()),
            AuthorizationError::Handler(e) => e.into(),
            AuthorizationError::ResumeMismatch(msg) => {
                Self::Other(format!("resume does not match pending call: {}", msg))
            }
        }
    }
}

/// Result type for toolwarden operations
pub type Result<T> = std::result::Result<T, Error>;
