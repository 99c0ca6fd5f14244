//! Kubernetes discovery using kubectl commands.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::errors::{KubectlError, Result};
use super::models::{PodListResponse, PodResponse, PodSummary};
use crate::config::Config;
use crate::domain::{ResourceKind, ResourcePath};
use crate::ports::ClusterAccess;

/// Default paths to search for kubectl.
pub(crate) const KUBECTL_PATHS: &[&str] = &[
    "/opt/homebrew/bin/kubectl", // Apple Silicon
    "/usr/local/bin/kubectl",    // Intel Mac / Homebrew
    "/usr/bin/kubectl",          // System
];

/// Default timeout for kubectl discovery commands.
const KUBECTL_TIMEOUT: Duration = Duration::from_secs(15);

/// Kubernetes discovery service backed by the kubectl binary.
#[derive(Debug, Clone)]
pub struct KubernetesDiscovery {
    kubectl_path: Option<PathBuf>,
    context: Option<String>,
    request_timeout: Duration,
}

impl KubernetesDiscovery {
    /// Creates a new KubernetesDiscovery, searching for kubectl.
    pub fn new() -> Self {
        Self {
            kubectl_path: find_kubectl(),
            context: None,
            request_timeout: KUBECTL_TIMEOUT,
        }
    }

    /// Creates a discovery service honouring the configured kubectl path,
    /// context and request timeout.
    pub fn from_config(config: &Config) -> Self {
        Self {
            kubectl_path: config.kubectl_path.clone().or_else(find_kubectl),
            context: config.context.clone(),
            request_timeout: config.request_timeout(),
        }
    }

    /// Creates a new KubernetesDiscovery with a custom kubectl path.
    pub fn with_path(kubectl_path: Option<PathBuf>) -> Self {
        Self {
            kubectl_path,
            context: None,
            request_timeout: KUBECTL_TIMEOUT,
        }
    }

    /// Returns the kubectl path if found.
    pub fn kubectl_path(&self) -> Option<&PathBuf> {
        self.kubectl_path.as_ref()
    }

    /// Returns the kubectl context, if pinned.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns true if kubectl is available.
    pub fn is_kubectl_available(&self) -> bool {
        self.kubectl_path.is_some()
    }

    /// Fetches pods in a namespace as listing summaries, sorted by name.
    pub async fn fetch_pod_summaries(&self, namespace: &str) -> Result<Vec<PodSummary>> {
        let items = self.get_pods(namespace, None).await?;

        let mut pods = items
            .into_iter()
            .map(|item| {
                serde_json::from_value::<PodResponse>(item)
                    .map(|pod| PodSummary::from_response(pod, namespace))
                    .map_err(|e| KubectlError::ParsingFailed(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        pods.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(pods)
    }

    async fn get_resource(&self, kind: &ResourceKind, path: &ResourcePath) -> Result<Value> {
        debug!(kind = %kind, path = %path, "Fetching resource");
        let output = self
            .execute_kubectl(&[
                "get",
                kind.as_kubectl(),
                &path.name,
                "-n",
                &path.namespace,
                "-o",
                "json",
            ])
            .await?;

        serde_json::from_str(&output).map_err(|e| KubectlError::ParsingFailed(e.to_string()))
    }

    async fn get_pods(&self, namespace: &str, selector: Option<&str>) -> Result<Vec<Value>> {
        let mut args = vec!["get", "pods", "-n", namespace, "-o", "json"];
        if let Some(selector) = selector {
            args.extend(["-l", selector]);
        }

        let output = self.execute_kubectl(&args).await?;
        let response: PodListResponse = serde_json::from_str(&output)
            .map_err(|e| KubectlError::ParsingFailed(e.to_string()))?;

        Ok(response.items)
    }

    /// Executes a kubectl command and returns the output.
    async fn execute_kubectl(&self, args: &[&str]) -> Result<String> {
        let kubectl_path = self
            .kubectl_path
            .as_ref()
            .ok_or(KubectlError::KubectlNotFound)?;

        let request_timeout = format!("--request-timeout={}s", self.request_timeout.as_secs());
        let mut command = Command::new(kubectl_path);
        if let Some(context) = &self.context {
            command.args(["--context", context]);
        }
        command.args(args).arg(&request_timeout);

        // Leave kubectl its own request timeout before giving up locally
        let result = timeout(self.request_timeout + Duration::from_secs(1), async {
            let output = command.output().await?;

            Ok::<_, std::io::Error>((output.status, output.stdout, output.stderr))
        })
        .await;

        match result {
            Ok(Ok((status, stdout, stderr))) => {
                if status.success() {
                    String::from_utf8(stdout)
                        .map_err(|e| KubectlError::ParsingFailed(e.to_string()))
                } else {
                    let stderr_str = String::from_utf8_lossy(&stderr);
                    Err(KubectlError::from_kubectl_error(&stderr_str))
                }
            }
            Ok(Err(e)) => Err(KubectlError::Io(e)),
            Err(_) => Err(KubectlError::Timeout),
        }
    }
}

impl Default for KubernetesDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterAccess for KubernetesDiscovery {
    async fn fetch_resource(
        &self,
        kind: &ResourceKind,
        path: &ResourcePath,
    ) -> crate::error::Result<Value> {
        Ok(self.get_resource(kind, path).await?)
    }

    async fn list_pods(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> crate::error::Result<Vec<Value>> {
        Ok(self.get_pods(namespace, selector).await?)
    }
}

/// Finds kubectl in the well-known paths, then in `$PATH`.
pub(crate) fn find_kubectl() -> Option<PathBuf> {
    find_executable(KUBECTL_PATHS).or_else(|| {
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join("kubectl"))
            .find(|candidate| candidate.is_file())
    })
}

/// Finds an executable in the given paths.
fn find_executable(paths: &[&str]) -> Option<PathBuf> {
    for path in paths {
        let path_buf = PathBuf::from(path);
        if path_buf.exists() {
            return Some(path_buf);
        }
    }
    None
}
