use crate::error::GateResult;
use async_trait::async_trait;
use std::fmt;

/// Lifecycle phase of the target, as reported by the status provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Running,
    Failed,
    Unknown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Pending => "Pending",
            Phase::Running => "Running",
            Phase::Failed => "Failed",
            Phase::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// One status-provider observation of the target
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub phase: Phase,
    pub ready: bool,
    /// Recent log tail or state description, for operator-facing output
    pub diagnostics: String,
}

/// Abstraction over the target's status signal to enable testing with mocks
///
/// Implementations are read-only: querying status must never mutate the
/// target.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    async fn query_status(&self) -> GateResult<StatusReport>;
}
