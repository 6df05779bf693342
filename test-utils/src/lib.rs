use anyhow::{Context, Result};
/// Test utilities for integration tests
/// Manages kind cluster lifecycle and inference-server pod fixtures
use std::process::Command;

pub const CLUSTER_NAME: &str = "vllm-gate";
pub const SERVER_NAMESPACE: &str = "vllm";

/// Test fixture that manages kind cluster lifecycle
pub struct KindCluster {
    cluster_name: String,
}

impl KindCluster {
    /// Get or create the test cluster
    /// Idempotent - safe to call multiple times
    pub fn setup() -> Result<Self> {
        let cluster = Self {
            cluster_name: CLUSTER_NAME.to_string(),
        };

        if !cluster.exists()? {
            println!("Creating kind cluster: {}", CLUSTER_NAME);
            cluster.create()?;
        } else {
            println!("Using existing kind cluster: {}", CLUSTER_NAME);
        }

        // Ensure the server namespace exists and is clean
        cluster.setup_namespace()?;

        Ok(cluster)
    }

    /// Check if cluster exists
    fn exists(&self) -> Result<bool> {
        let output = Command::new("kind")
            .args(["get", "clusters"])
            .output()
            .context("Failed to execute 'kind get clusters'")?;

        if !output.status.success() {
            return Ok(false);
        }

        let clusters = String::from_utf8_lossy(&output.stdout);
        Ok(clusters
            .lines()
            .any(|line| line.trim() == self.cluster_name))
    }

    /// Create new kind cluster, exposing the server's NodePort on the host
    fn create(&self) -> Result<()> {
        let config = r#"
kind: Cluster
apiVersion: kind.x-k8s.io/v1alpha4
nodes:
- role: control-plane
  extraPortMappings:
  - containerPort: 30000
    hostPort: 30000
    protocol: TCP
- role: worker
"#;

        let mut child = Command::new("kind")
            .args([
                "create",
                "cluster",
                "--name",
                &self.cluster_name,
                "--config",
                "-",
            ])
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::inherit())
            .stderr(std::process::Stdio::inherit())
            .spawn()
            .context("Failed to spawn 'kind create cluster'")?;

        // Write config to stdin
        use std::io::Write;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(config.as_bytes())
                .context("Failed to write config to stdin")?;
        }

        // Wait for command to complete
        let status = child.wait().context("Failed to wait for kind create")?;

        if !status.success() {
            anyhow::bail!("kind create cluster failed");
        }

        // Wait for cluster to be ready
        self.wait_for_ready()?;

        Ok(())
    }

    /// Wait for cluster nodes to be ready
    fn wait_for_ready(&self) -> Result<()> {
        println!("Waiting for cluster nodes to be ready...");

        let status = Command::new("kubectl")
            .args([
                "wait",
                "--for=condition=Ready",
                "nodes",
                "--all",
                "--timeout=60s",
            ])
            .stdout(std::process::Stdio::inherit())
            .stderr(std::process::Stdio::inherit())
            .status()
            .context("Failed to wait for nodes")?;

        if !status.success() {
            anyhow::bail!("Nodes did not become ready in time");
        }

        Ok(())
    }

    /// Setup a clean server namespace
    fn setup_namespace(&self) -> Result<()> {
        // Delete the namespace if it exists (clean slate)
        let _ = self.delete_namespace(SERVER_NAMESPACE); // Ignore errors if doesn't exist

        self.create_namespace(SERVER_NAMESPACE)?;

        Ok(())
    }

    /// Create namespace
    fn create_namespace(&self, name: &str) -> Result<()> {
        println!("Creating namespace: {}", name);

        let status = Command::new("kubectl")
            .args(["create", "namespace", name])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .context("Failed to create namespace")?;

        if !status.success() {
            anyhow::bail!("Failed to create namespace: {}", name);
        }

        Ok(())
    }

    /// Delete namespace (for cleanup)
    fn delete_namespace(&self, name: &str) -> Result<()> {
        let status = Command::new("kubectl")
            .args(["delete", "namespace", name, "--ignore-not-found=true"])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .context("Failed to delete namespace")?;

        if !status.success() {
            anyhow::bail!("Failed to delete namespace: {}", name);
        }

        // Wait for namespace to be deleted
        let _ = Command::new("kubectl")
            .args([
                "wait",
                "--for=delete",
                &format!("namespace/{}", name),
                "--timeout=30s",
            ])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status();

        Ok(())
    }

    /// Get cluster name for kubectl context
    pub fn context_name(&self) -> String {
        format!("kind-{}", self.cluster_name)
    }
}

/// Delete the test cluster
/// Call this explicitly if you want to clean up
#[allow(dead_code)]
pub fn teardown_cluster() -> Result<()> {
    println!("Deleting kind cluster: {}", CLUSTER_NAME);

    let status = Command::new("kind")
        .args(["delete", "cluster", "--name", CLUSTER_NAME])
        .stdout(std::process::Stdio::inherit())
        .stderr(std::process::Stdio::inherit())
        .status()
        .context("Failed to delete cluster")?;

    if !status.success() {
        anyhow::bail!("Failed to delete cluster");
    }

    Ok(())
}

/// Create a stand-in server pod with an HTTP readiness probe
///
/// nginx substitutes for the real inference server: the gate only looks at
/// pod phase and the readiness condition, not the served content.
pub async fn create_server_pod(
    namespace: &str,
    name: &str,
    labels: std::collections::HashMap<String, String>,
) -> Result<()> {
    use k8s_openapi::api::core::v1::Pod;
    use kube::{Api, Client};

    let client = Client::try_default().await?;
    let pods: Api<Pod> = Api::namespaced(client, namespace);

    let pod = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": name,
            "labels": labels,
        },
        "spec": {
            "containers": [{
                "name": "server",
                "image": "nginx:alpine",
                "ports": [{"containerPort": 80}],
                "readinessProbe": {
                    "httpGet": {
                        "path": "/",
                        "port": 80,
                    },
                    "initialDelaySeconds": 1,
                    "periodSeconds": 1,
                },
            }],
        },
    });

    let pp = kube::api::PostParams::default();
    pods.create(&pp, &serde_json::from_value(pod)?)
        .await
        .context("Failed to create server pod")?;

    Ok(())
}

/// Create a pod whose container exits immediately, driving CrashLoopBackOff
pub async fn create_crashloop_pod(
    namespace: &str,
    name: &str,
    labels: std::collections::HashMap<String, String>,
) -> Result<()> {
    use k8s_openapi::api::core::v1::Pod;
    use kube::{Api, Client};

    let client = Client::try_default().await?;
    let pods: Api<Pod> = Api::namespaced(client, namespace);

    let pod = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": name,
            "labels": labels,
        },
        "spec": {
            "containers": [{
                "name": "server",
                "image": "busybox:1.36",
                "command": ["false"],
            }],
        },
    });

    let pp = kube::api::PostParams::default();
    pods.create(&pp, &serde_json::from_value(pod)?)
        .await
        .context("Failed to create crashloop pod")?;

    Ok(())
}

/// Helper to delete a test pod
pub async fn delete_test_pod(namespace: &str, name: &str) -> Result<()> {
    use k8s_openapi::api::core::v1::Pod;
    use kube::{Api, Client};

    let client = Client::try_default().await?;
    let pods: Api<Pod> = Api::namespaced(client, namespace);

    let dp = kube::api::DeleteParams::default();
    pods.delete(name, &dp)
        .await
        .context("Failed to delete pod")?;

    Ok(())
}

/// Helper to wait for pod to be ready
pub async fn wait_for_pod_ready(namespace: &str, name: &str) -> Result<()> {
    use k8s_openapi::api::core::v1::Pod;
    use kube::{Api, Client};
    use std::time::Duration;
    use tokio::time::sleep;

    let client = Client::try_default().await?;
    let pods: Api<Pod> = Api::namespaced(client, namespace);

    for _ in 0..30 {
        let pod = pods.get(name).await?;

        if let Some(status) = &pod.status {
            if let Some(conditions) = &status.conditions {
                if conditions
                    .iter()
                    .any(|c| c.type_ == "Ready" && c.status == "True")
                {
                    return Ok(());
                }
            }
        }

        sleep(Duration::from_secs(1)).await;
    }

    anyhow::bail!("Pod {} did not become ready in time", name)
}
