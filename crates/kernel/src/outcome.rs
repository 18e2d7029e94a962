//! Per-action results and the report a bootstrap run returns.

use std::fmt;

use serde::Serialize;

use crate::error::{ErrorKind, ProvisionError};
use crate::spec::Action;

/// What happened to one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum Status {
    /// The entity was absent and has been created.
    Success,
    /// The entity was already present as declared; nothing was changed.
    AlreadyExists,
    Failed(ErrorKind),
    /// Not attempted because an earlier action failed under halt-on-first-failure.
    Skipped,
}

impl Status {
    /// Whether this status leaves the target in the declared state.
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Success | Status::AlreadyExists)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => f.write_str("success"),
            Status::AlreadyExists => f.write_str("already_exists"),
            Status::Failed(kind) => write!(f, "failed({kind})"),
            Status::Skipped => f.write_str("skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub action: Action,
    #[serde(flatten)]
    pub status: Status,
    pub detail: String,
}

impl ExecutionResult {
    pub fn success(action: Action, detail: impl Into<String>) -> Self {
        Self {
            action,
            status: Status::Success,
            detail: detail.into(),
        }
    }

    pub fn already_exists(action: Action, detail: impl Into<String>) -> Self {
        Self {
            action,
            status: Status::AlreadyExists,
            detail: detail.into(),
        }
    }

    pub fn failed(action: Action, error: ProvisionError) -> Self {
        Self {
            action,
            status: Status::Failed(error.kind),
            detail: error.message,
        }
    }

    pub fn skipped(action: Action) -> Self {
        Self {
            action,
            status: Status::Skipped,
            detail: "not attempted after an earlier failure".to_string(),
        }
    }
}

/// Outcome of a whole bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunReport {
    /// The target was reached; one result per action, in declared order.
    Completed { results: Vec<ExecutionResult> },
    /// The target could not be reached; no action was attempted.
    ConnectionFailed { detail: String },
}

impl RunReport {
    /// Per-action results; empty when the connection failed.
    pub fn results(&self) -> &[ExecutionResult] {
        match self {
            RunReport::Completed { results } => results,
            RunReport::ConnectionFailed { .. } => &[],
        }
    }

    pub fn is_connection_failure(&self) -> bool {
        matches!(self, RunReport::ConnectionFailed { .. })
    }

    pub fn failed_count(&self) -> usize {
        self.results()
            .iter()
            .filter(|result| matches!(result.status, Status::Failed(_)))
            .count()
    }

    /// True when every action ended in `Success` or `AlreadyExists`.
    pub fn is_success(&self) -> bool {
        !self.is_connection_failure() && self.results().iter().all(|r| r.status.is_ok())
    }
}
