use crate::error::GateResult;
use crate::kube::traits::{Phase, StatusProvider, StatusReport};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{ListParams, LogParams},
    Api, Client,
};

/// Waiting-container reasons that mean the pod will not recover on its own
const FATAL_WAITING_REASONS: [&str; 3] = ["CrashLoopBackOff", "ErrImagePull", "ImagePullBackOff"];

const LOG_TAIL_LINES: i64 = 20;

/// Real status provider backed by the Kubernetes API via kube-rs
///
/// Observes the first pod matching `selector` in `namespace`. The inference
/// server is deployed as a single replica, so one pod carries the whole
/// readiness signal.
pub struct KubeStatusProvider {
    client: Client,
    namespace: String,
    selector: String,
}

impl KubeStatusProvider {
    /// Create a provider using the default configuration
    /// (in-cluster config or ~/.kube/config)
    pub async fn new(namespace: String, selector: String) -> GateResult<Self> {
        let client = Client::try_default().await?;
        Ok(Self {
            client,
            namespace,
            selector,
        })
    }

    /// Create a provider from an explicit kube::Client
    pub fn from_client(client: Client, namespace: String, selector: String) -> Self {
        Self {
            client,
            namespace,
            selector,
        }
    }

    async fn log_tail(&self, pod_name: &str) -> Option<String> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let params = LogParams {
            tail_lines: Some(LOG_TAIL_LINES),
            ..Default::default()
        };

        match pods.logs(pod_name, &params).await {
            Ok(logs) if !logs.trim().is_empty() => Some(logs),
            Ok(_) => None,
            Err(e) => {
                // Logs are unavailable while containers are still creating
                tracing::debug!("Could not fetch logs for {}: {}", pod_name, e);
                None
            }
        }
    }
}

#[async_trait]
impl StatusProvider for KubeStatusProvider {
    async fn query_status(&self) -> GateResult<StatusReport> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);

        let list_params = ListParams::default().labels(&self.selector);
        let pod_list = pods.list(&list_params).await?;

        let Some(pod) = pod_list.items.first() else {
            return Ok(StatusReport {
                phase: Phase::Pending,
                ready: false,
                diagnostics: format!(
                    "no pods matching '{}' in namespace '{}'",
                    self.selector, self.namespace
                ),
            });
        };

        let mut report = classify_pod(pod);

        if let Some(name) = pod.metadata.name.as_deref() {
            if let Some(tail) = self.log_tail(name).await {
                report.diagnostics = format!("{}\n{}", report.diagnostics, tail.trim_end());
            }
        }

        Ok(report)
    }
}

/// Map a pod's status to the gate's phase/readiness model
///
/// A waiting container stuck in a fatal backoff state overrides the pod
/// phase: Kubernetes keeps such pods in phase Running/Pending indefinitely.
/// A Succeeded pod is also a failure here, since a serving process must not
/// exit.
pub(crate) fn classify_pod(pod: &Pod) -> StatusReport {
    let status = pod.status.as_ref();
    let pod_name = pod.metadata.name.as_deref().unwrap_or("<unnamed>");

    let mut phase = match status.and_then(|s| s.phase.as_deref()) {
        Some("Pending") => Phase::Pending,
        Some("Running") => Phase::Running,
        Some("Failed") | Some("Succeeded") => Phase::Failed,
        _ => Phase::Unknown,
    };

    let mut diagnostics = format!("pod {} phase {}", pod_name, phase);

    if let Some(container_statuses) = status.and_then(|s| s.container_statuses.as_ref()) {
        for cs in container_statuses {
            let waiting = cs.state.as_ref().and_then(|s| s.waiting.as_ref());
            if let Some(waiting) = waiting {
                if let Some(reason) = waiting.reason.as_deref() {
                    if FATAL_WAITING_REASONS.contains(&reason) {
                        phase = Phase::Failed;
                    }
                    diagnostics = format!(
                        "container {} waiting: {} {}",
                        cs.name,
                        reason,
                        waiting.message.as_deref().unwrap_or("")
                    );
                }
            }
        }
    }

    let ready = status
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false);

    StatusReport {
        phase,
        ready,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ContainerState, ContainerStateWaiting, ContainerStatus, PodCondition, PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod_with_status(status: PodStatus) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("vllm-0".to_string()),
                ..Default::default()
            },
            status: Some(status),
            ..Default::default()
        }
    }

    fn waiting_container(reason: &str) -> ContainerStatus {
        ContainerStatus {
            name: "server".to_string(),
            state: Some(ContainerState {
                waiting: Some(ContainerStateWaiting {
                    reason: Some(reason.to_string()),
                    message: Some("back-off restarting container".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn ready_condition(value: &str) -> PodCondition {
        PodCondition {
            type_: "Ready".to_string(),
            status: value.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_classify_pending_pod() {
        let pod = pod_with_status(PodStatus {
            phase: Some("Pending".to_string()),
            ..Default::default()
        });

        let report = classify_pod(&pod);
        assert_eq!(report.phase, Phase::Pending);
        assert!(!report.ready);
    }

    #[test]
    fn test_classify_running_ready_pod() {
        let pod = pod_with_status(PodStatus {
            phase: Some("Running".to_string()),
            conditions: Some(vec![ready_condition("True")]),
            ..Default::default()
        });

        let report = classify_pod(&pod);
        assert_eq!(report.phase, Phase::Running);
        assert!(report.ready);
    }

    #[test]
    fn test_classify_running_not_ready_pod() {
        let pod = pod_with_status(PodStatus {
            phase: Some("Running".to_string()),
            conditions: Some(vec![ready_condition("False")]),
            ..Default::default()
        });

        let report = classify_pod(&pod);
        assert_eq!(report.phase, Phase::Running);
        assert!(!report.ready);
    }

    #[test]
    fn test_classify_failed_pod() {
        let pod = pod_with_status(PodStatus {
            phase: Some("Failed".to_string()),
            ..Default::default()
        });

        let report = classify_pod(&pod);
        assert_eq!(report.phase, Phase::Failed);
    }

    #[test]
    fn test_classify_succeeded_pod_is_failed() {
        // A serving pod that ran to completion cannot serve requests
        let pod = pod_with_status(PodStatus {
            phase: Some("Succeeded".to_string()),
            ..Default::default()
        });

        let report = classify_pod(&pod);
        assert_eq!(report.phase, Phase::Failed);
    }

    #[test]
    fn test_classify_crashloop_overrides_running_phase() {
        let pod = pod_with_status(PodStatus {
            phase: Some("Running".to_string()),
            container_statuses: Some(vec![waiting_container("CrashLoopBackOff")]),
            ..Default::default()
        });

        let report = classify_pod(&pod);
        assert_eq!(report.phase, Phase::Failed);
        assert!(report.diagnostics.contains("CrashLoopBackOff"));
    }

    #[test]
    fn test_classify_image_pull_backoff() {
        let pod = pod_with_status(PodStatus {
            phase: Some("Pending".to_string()),
            container_statuses: Some(vec![waiting_container("ImagePullBackOff")]),
            ..Default::default()
        });

        let report = classify_pod(&pod);
        assert_eq!(report.phase, Phase::Failed);
    }

    #[test]
    fn test_classify_benign_waiting_reason() {
        let pod = pod_with_status(PodStatus {
            phase: Some("Pending".to_string()),
            container_statuses: Some(vec![waiting_container("ContainerCreating")]),
            ..Default::default()
        });

        let report = classify_pod(&pod);
        assert_eq!(report.phase, Phase::Pending);
        assert!(report.diagnostics.contains("ContainerCreating"));
    }

    #[test]
    fn test_classify_missing_status() {
        let pod = Pod::default();

        let report = classify_pod(&pod);
        assert_eq!(report.phase, Phase::Unknown);
        assert!(!report.ready);
    }
}
