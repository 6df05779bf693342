use crate::error::{GateError, GateResult};
use crate::kube::{Phase, StatusProvider};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Emit a diagnostic snapshot every this many polls
const SNAPSHOT_EVERY: u32 = 3;

/// Terminal result of one polling session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ready {
        attempts: u32,
    },
    PermanentFailure {
        attempts: u32,
        diagnostics: String,
    },
    TimedOut {
        attempts: u32,
        diagnostics: String,
    },
    Cancelled,
}

impl Outcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready { .. })
    }
}

/// One observation of the target during polling
#[derive(Debug, Clone)]
pub struct PollAttempt {
    pub index: u32,
    pub phase: Phase,
    pub ready: bool,
    pub elapsed: Duration,
    pub diagnostics: String,
}

/// Bounded, cancellable polling loop that waits for a target to become ready
///
/// The gate observes the target through a StatusProvider at a fixed cadence,
/// up to a wall-clock budget. A Failed phase terminates immediately; a
/// transient status-query error counts as an inconclusive observation and
/// polling continues. The target is never mutated.
pub struct ReadinessGate {
    poll_interval: Duration,
    max_wait: Duration,
}

impl ReadinessGate {
    pub fn new(poll_interval: Duration, max_wait: Duration) -> GateResult<Self> {
        if poll_interval.is_zero() {
            return Err(GateError::InvalidConfig(
                "poll interval must be positive".to_string(),
            ));
        }
        if max_wait < poll_interval {
            return Err(GateError::InvalidConfig(format!(
                "max wait ({:?}) must be at least the poll interval ({:?})",
                max_wait, poll_interval
            )));
        }

        Ok(Self {
            poll_interval,
            max_wait,
        })
    }

    /// Poll until the target is ready, permanently failed, the budget is
    /// exhausted, or the caller cancels
    ///
    /// The first observation happens immediately; the elapsed budget is
    /// checked against a monotonic clock at the top of every iteration, so
    /// the loop never overshoots `max_wait` by more than one interval.
    pub async fn wait_until_ready(
        &self,
        provider: &dyn StatusProvider,
        cancel: &CancellationToken,
    ) -> Outcome {
        let started = Instant::now();
        let mut attempts: u32 = 0;
        let mut last_diagnostics = String::new();

        loop {
            let elapsed = started.elapsed();

            if elapsed >= self.max_wait {
                tracing::error!(
                    "Target not ready after {:?} ({} polls), giving up",
                    elapsed,
                    attempts
                );
                return Outcome::TimedOut {
                    attempts,
                    diagnostics: last_diagnostics,
                };
            }

            if cancel.is_cancelled() {
                tracing::warn!("Polling cancelled after {} polls", attempts);
                return Outcome::Cancelled;
            }

            attempts += 1;
            let attempt = self.observe(provider, attempts, elapsed).await;

            if !attempt.diagnostics.is_empty() {
                last_diagnostics = attempt.diagnostics.clone();
            }

            // Failed is checked before the readiness flag: a ready=true
            // observation in a Failed phase is an inconsistency
            if attempt.phase == Phase::Failed {
                tracing::error!(
                    "Target entered failed state on poll {}: {}",
                    attempt.index,
                    last_diagnostics
                );
                return Outcome::PermanentFailure {
                    attempts,
                    diagnostics: last_diagnostics,
                };
            }

            if attempt.ready {
                tracing::info!(
                    "Target ready after {:?} ({} polls)",
                    attempt.elapsed,
                    attempts
                );
                return Outcome::Ready { attempts };
            }

            if attempt.index % SNAPSHOT_EVERY == 0 {
                tracing::info!(
                    "Still waiting (poll {}, phase {}, elapsed {:?}); recent diagnostics:\n{}",
                    attempt.index,
                    attempt.phase,
                    attempt.elapsed,
                    last_diagnostics
                );
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!("Polling cancelled after {} polls", attempts);
                    return Outcome::Cancelled;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn observe(
        &self,
        provider: &dyn StatusProvider,
        index: u32,
        elapsed: Duration,
    ) -> PollAttempt {
        match provider.query_status().await {
            Ok(report) => {
                tracing::debug!(
                    "Poll {}: phase {}, ready {}",
                    index,
                    report.phase,
                    report.ready
                );
                PollAttempt {
                    index,
                    phase: report.phase,
                    ready: report.ready,
                    elapsed,
                    diagnostics: report.diagnostics,
                }
            }
            Err(e) => {
                // Transient: the provider being unreachable says nothing
                // about the target itself
                tracing::warn!("Poll {}: status query failed, treating as inconclusive: {}", index, e);
                PollAttempt {
                    index,
                    phase: Phase::Unknown,
                    ready: false,
                    elapsed,
                    diagnostics: format!("status query failed: {}", e),
                }
            }
        }
    }
}
