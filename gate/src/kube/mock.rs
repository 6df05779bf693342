use crate::error::{GateError, GateResult};
use crate::kube::traits::{Phase, StatusProvider, StatusReport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One scripted observation returned by the mock provider
#[derive(Debug, Clone)]
pub enum MockObservation {
    Report(StatusReport),
    /// Transient status-query failure (provider unreachable)
    QueryError(String),
}

/// Mock implementation of StatusProvider for unit testing
///
/// Plays back a scripted sequence of observations, one per query. When the
/// script is exhausted, the last observation repeats indefinitely.
#[derive(Clone)]
pub struct MockStatusProvider {
    script: Arc<Mutex<VecDeque<MockObservation>>>,
    last: Arc<Mutex<Option<MockObservation>>>,
    calls: Arc<Mutex<u32>>,
}

impl MockStatusProvider {
    pub fn new(script: Vec<MockObservation>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            last: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Number of times query_status has been invoked
    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }

    pub fn pending() -> MockObservation {
        MockObservation::Report(StatusReport {
            phase: Phase::Pending,
            ready: false,
            diagnostics: "pod pending".to_string(),
        })
    }

    pub fn running_not_ready() -> MockObservation {
        MockObservation::Report(StatusReport {
            phase: Phase::Running,
            ready: false,
            diagnostics: "pod running, readiness probe failing".to_string(),
        })
    }

    pub fn running_ready() -> MockObservation {
        MockObservation::Report(StatusReport {
            phase: Phase::Running,
            ready: true,
            diagnostics: "pod running and ready".to_string(),
        })
    }

    pub fn failed(diagnostics: &str) -> MockObservation {
        MockObservation::Report(StatusReport {
            phase: Phase::Failed,
            ready: false,
            diagnostics: diagnostics.to_string(),
        })
    }
}

#[async_trait]
impl StatusProvider for MockStatusProvider {
    async fn query_status(&self) -> GateResult<StatusReport> {
        *self.calls.lock().unwrap() += 1;

        let observation = {
            let mut script = self.script.lock().unwrap();
            let mut last = self.last.lock().unwrap();

            match script.pop_front() {
                Some(obs) => {
                    *last = Some(obs.clone());
                    obs
                }
                None => last
                    .clone()
                    .expect("mock script is empty and no observation was ever returned"),
            }
        };

        match observation {
            MockObservation::Report(report) => Ok(report),
            MockObservation::QueryError(msg) => Err(GateError::Kubernetes(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_plays_script_in_order() {
        let mock = MockStatusProvider::new(vec![
            MockStatusProvider::pending(),
            MockStatusProvider::running_ready(),
        ]);

        let first = mock.query_status().await.unwrap();
        assert_eq!(first.phase, Phase::Pending);
        assert!(!first.ready);

        let second = mock.query_status().await.unwrap();
        assert_eq!(second.phase, Phase::Running);
        assert!(second.ready);
    }

    #[tokio::test]
    async fn test_mock_repeats_last_observation() {
        let mock = MockStatusProvider::new(vec![MockStatusProvider::running_ready()]);

        for _ in 0..3 {
            let report = mock.query_status().await.unwrap();
            assert!(report.ready);
        }
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_query_error() {
        let mock = MockStatusProvider::new(vec![
            MockObservation::QueryError("api server unreachable".to_string()),
            MockStatusProvider::pending(),
        ]);

        let err = mock.query_status().await.unwrap_err();
        assert!(err.to_string().contains("api server unreachable"));

        let report = mock.query_status().await.unwrap();
        assert_eq!(report.phase, Phase::Pending);
    }
}
