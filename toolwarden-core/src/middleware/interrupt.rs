//! Human-in-the-loop approval requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::policy::{Decision, ResourceRef};

/// Responses a human may give to an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllowedDecision {
    Approve,
    Reject,
    Edit,
}

impl AllowedDecision {
    pub const ALL: [AllowedDecision; 3] = [
        AllowedDecision::Approve,
        AllowedDecision::Reject,
        AllowedDecision::Edit,
    ];
}

/// Per-tool interrupt configuration handed to the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterruptOnConfig {
    pub allowed_decisions: Vec<AllowedDecision>,
}

impl Default for InterruptOnConfig {
    fn default() -> Self {
        Self {
            allowed_decisions: AllowedDecision::ALL.to_vec(),
        }
    }
}

/// A suspended tool call waiting for a human.
///
/// The engine checkpoints this value and hands it back to
/// [`resume`](super::ToolAuthorizationMiddleware::resume) along with the
/// human's answer, possibly after a process restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterruptRequest {
    pub interrupt_id: String,
    pub thread_id: String,
    pub agent_id: String,
    pub tool_call_id: String,
    pub tool_name: String,
    pub args: Value,
    /// Resource that needs approval.
    pub resource: ResourceRef,
    /// `ask` or `allow_in_session`.
    pub decision: Decision,
    pub allowed_decisions: Vec<AllowedDecision>,
    /// Resources already approved earlier for this same call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approved: Vec<ResourceRef>,
    /// Human-readable prompt.
    pub description: String,
}

impl InterruptRequest {
    /// Whether approving this request records a session grant.
    pub fn remembers_approval(&self) -> bool {
        self.decision == Decision::AllowInSession
    }

    pub fn allows(&self, decision: &ResumeDecision) -> bool {
        self.allowed_decisions.contains(&decision.kind())
    }
}

/// A human's answer to an [`InterruptRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResumeDecision {
    /// Run the call as requested.
    Approve,
    /// Refuse the call; the model receives a denial message.
    Reject {
        #[serde(default)]
        reason: Option<String>,
    },
    /// Run the call with replacement arguments.
    Edit { args: Value },
}

impl ResumeDecision {
    pub fn kind(&self) -> AllowedDecision {
        match self {
            ResumeDecision::Approve => AllowedDecision::Approve,
            ResumeDecision::Reject { .. } => AllowedDecision::Reject,
            ResumeDecision::Edit { .. } => AllowedDecision::Edit,
        }
    }
}
