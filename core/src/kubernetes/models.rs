//! Kubernetes data models decoded from `kubectl get -o json` output.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::domain::{ContainerPort, PodPorts, ResourcePath};

// ============================================================================
// Pods
// ============================================================================

/// Response structure for `kubectl get pod <name> -o json`.
#[derive(Debug, Deserialize)]
pub struct PodResponse {
    pub metadata: ObjectMetadata,
    pub spec: PodSpec,
    #[serde(default)]
    pub status: Option<PodStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ObjectMetadata {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
}

#[derive(Debug, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    #[serde(default)]
    pub ports: Vec<ContainerPort>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PodStatus {
    #[serde(default)]
    pub phase: Option<String>,
}

impl PodResponse {
    /// Pod identity, defaulting the namespace when the object omits it.
    pub fn path(&self, fallback_namespace: &str) -> ResourcePath {
        ResourcePath::new(
            self.metadata
                .namespace
                .clone()
                .unwrap_or_else(|| fallback_namespace.to_string()),
            self.metadata.name.clone(),
        )
    }

    /// Pod phase, "Unknown" when not reported.
    pub fn phase(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or("Unknown")
    }

    pub fn is_running(&self) -> bool {
        self.phase() == "Running"
    }

    /// Declared container ports keyed by container name.
    pub fn into_ports(self) -> PodPorts {
        self.spec
            .containers
            .into_iter()
            .map(|c| (c.name, c.ports))
            .collect()
    }
}

/// Summary of a pod for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodSummary {
    pub path: ResourcePath,
    pub phase: String,
    pub ports: PodPorts,
}

impl PodSummary {
    pub fn from_response(pod: PodResponse, fallback_namespace: &str) -> Self {
        let path = pod.path(fallback_namespace);
        let phase = pod.phase().to_string();
        Self {
            path,
            phase,
            ports: pod.into_ports(),
        }
    }
}

// ============================================================================
// Controllers
// ============================================================================

/// Workload objects (deployments, statefulsets, ...) carrying a label selector.
#[derive(Debug, Deserialize)]
pub struct WorkloadResponse {
    pub spec: WorkloadSpec,
}

#[derive(Debug, Deserialize)]
pub struct WorkloadSpec {
    #[serde(default)]
    pub selector: Option<LabelSelector>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

/// Service objects select pods with a plain label map.
#[derive(Debug, Deserialize)]
pub struct ServiceResponse {
    pub spec: ServiceSpec,
}

#[derive(Debug, Deserialize)]
pub struct ServiceSpec {
    #[serde(default)]
    pub selector: Option<BTreeMap<String, String>>,
}

/// Renders labels as a kubectl `-l` selector (`k1=v1,k2=v2`).
pub fn selector_string(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Response structure for `kubectl get pods -o json`.
#[derive(Debug, Deserialize)]
pub struct PodListResponse {
    pub items: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Protocol;

    const POD_JSON: &str = r#"{
        "metadata": {"name": "web-0", "namespace": "ns"},
        "spec": {"containers": [
            {"name": "app", "ports": [
                {"name": "http", "containerPort": 8080, "protocol": "TCP"},
                {"name": "dns", "containerPort": 53, "protocol": "UDP"}
            ]},
            {"name": "sidecar"}
        ]},
        "status": {"phase": "Running"}
    }"#;

    #[test]
    fn test_pod_response_parsing() {
        let pod: PodResponse = serde_json::from_str(POD_JSON).unwrap();
        assert_eq!(pod.path("default").to_string(), "ns/web-0");
        assert!(pod.is_running());

        let ports = pod.into_ports();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports["app"].len(), 2);
        assert_eq!(ports["app"][1].protocol, Protocol::Udp);
        assert!(ports["sidecar"].is_empty());
    }

    #[test]
    fn test_selector_parsing() {
        let deploy: WorkloadResponse = serde_json::from_str(
            r#"{"spec": {"selector": {"matchLabels": {"app": "web", "tier": "front"}}}}"#,
        )
        .unwrap();
        let labels = deploy.spec.selector.unwrap().match_labels;
        assert_eq!(selector_string(&labels), "app=web,tier=front");

        let svc: ServiceResponse =
            serde_json::from_str(r#"{"spec": {"selector": {"app": "web"}}}"#).unwrap();
        assert_eq!(selector_string(&svc.spec.selector.unwrap()), "app=web");
    }

    #[test]
    fn test_pod_summary_defaults() {
        let pod: PodResponse =
            serde_json::from_str(r#"{"metadata": {"name": "p"}, "spec": {}}"#).unwrap();
        let summary = PodSummary::from_response(pod, "team");
        assert_eq!(summary.path.to_string(), "team/p");
        assert_eq!(summary.phase, "Unknown");
        assert!(summary.ports.is_empty());
    }
}
