//! Resolution of a selected resource to the pod a tunnel attaches to.

use serde_json::Value;
use tracing::debug;

use crate::domain::{ResourceKind, ResourcePath, Target};
use crate::error::{Error, Result};
use crate::kubernetes::models::{selector_string, ServiceResponse, WorkloadResponse};
use crate::kubernetes::{KubectlError, PodResponse};
use crate::ports::ClusterAccess;

/// How a resource kind reaches its pods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerKind {
    Pod,
    /// Selects pods through `spec.selector.matchLabels`.
    Workload(ResourceKind),
    /// Selects pods through `spec.selector`.
    Service,
}

impl ControllerKind {
    pub fn for_kind(kind: &ResourceKind) -> Result<Self> {
        match kind {
            ResourceKind::Pod => Ok(Self::Pod),
            ResourceKind::Service => Ok(Self::Service),
            ResourceKind::Deployment
            | ResourceKind::StatefulSet
            | ResourceKind::DaemonSet
            | ResourceKind::ReplicaSet
            | ResourceKind::Job => Ok(Self::Workload(kind.clone())),
            ResourceKind::Other(name) => Err(Error::UnsupportedResourceKind(name.clone())),
        }
    }

    /// Returns true when resolution needs no cluster round-trip.
    pub fn is_pod(&self) -> bool {
        matches!(self, Self::Pod)
    }

    /// Resolves `path` to one concrete pod.
    ///
    /// Controllers pick the first running pod their selector matches, or the
    /// first listed pod when none is running.
    pub async fn resolve_to_pod<C: ClusterAccess>(
        &self,
        cluster: &C,
        path: &ResourcePath,
    ) -> Result<ResourcePath> {
        let selector = match self {
            Self::Pod => return Ok(path.clone()),
            Self::Workload(kind) => {
                let object = cluster.fetch_resource(kind, path).await?;
                let workload: WorkloadResponse = decode(object)?;
                workload
                    .spec
                    .selector
                    .map(|s| s.match_labels)
                    .unwrap_or_default()
            }
            Self::Service => {
                let object = cluster.fetch_resource(&ResourceKind::Service, path).await?;
                let service: ServiceResponse = decode(object)?;
                service.spec.selector.unwrap_or_default()
            }
        };

        if selector.is_empty() {
            return Err(KubectlError::ParsingFailed(format!("{} has no pod selector", path)).into());
        }

        let selector = selector_string(&selector);
        debug!(resource = %path, selector = %selector, "Resolving controller to pod");

        let pods = cluster
            .list_pods(&path.namespace, Some(&selector))
            .await?
            .into_iter()
            .map(decode::<PodResponse>)
            .collect::<Result<Vec<_>>>()?;

        let pod = pods
            .iter()
            .find(|p| p.is_running())
            .or_else(|| pods.first())
            .ok_or_else(|| KubectlError::NotFound(format!("no pods match {}", path)))?;

        Ok(pod.path(&path.namespace))
    }
}

/// Resolves a target in one call.
pub async fn resolve_target<C: ClusterAccess>(
    cluster: &C,
    target: &Target,
) -> Result<ResourcePath> {
    ControllerKind::for_kind(&target.kind)?
        .resolve_to_pod(cluster, &target.path)
        .await
}

fn decode<T: serde::de::DeserializeOwned>(object: Value) -> Result<T> {
    serde_json::from_value(object).map_err(|e| KubectlError::ParsingFailed(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedCluster {
        object: Option<Value>,
        pods: Vec<Value>,
        selectors: Mutex<Vec<String>>,
    }

    impl ClusterAccess for ScriptedCluster {
        async fn fetch_resource(&self, _: &ResourceKind, path: &ResourcePath) -> Result<Value> {
            self.object
                .clone()
                .ok_or_else(|| KubectlError::NotFound(path.to_string()).into())
        }

        async fn list_pods(&self, _: &str, selector: Option<&str>) -> Result<Vec<Value>> {
            self.selectors
                .lock()
                .unwrap()
                .push(selector.unwrap_or_default().to_string());
            Ok(self.pods.clone())
        }
    }

    fn pod(name: &str, phase: &str) -> Value {
        json!({
            "metadata": {"name": name, "namespace": "ns"},
            "spec": {"containers": []},
            "status": {"phase": phase}
        })
    }

    #[test]
    fn test_for_kind() {
        assert!(ControllerKind::for_kind(&ResourceKind::Pod).unwrap().is_pod());
        assert_eq!(
            ControllerKind::for_kind(&ResourceKind::Deployment).unwrap(),
            ControllerKind::Workload(ResourceKind::Deployment)
        );
        assert!(matches!(
            ControllerKind::for_kind(&ResourceKind::Other("configmaps".into())),
            Err(Error::UnsupportedResourceKind(k)) if k == "configmaps"
        ));
    }

    #[tokio::test]
    async fn test_pod_resolves_to_itself() {
        let cluster = ScriptedCluster::default();
        let path = ResourcePath::new("ns", "web-0");
        let resolved = ControllerKind::Pod.resolve_to_pod(&cluster, &path).await.unwrap();
        assert_eq!(resolved, path);
        assert!(cluster.selectors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deployment_prefers_running_pod() {
        let cluster = ScriptedCluster {
            object: Some(json!({
                "spec": {"selector": {"matchLabels": {"app": "web", "tier": "front"}}}
            })),
            pods: vec![pod("web-pending", "Pending"), pod("web-running", "Running")],
            ..Default::default()
        };

        let target = Target::new(ResourceKind::Deployment, ResourcePath::new("ns", "web"));
        let resolved = resolve_target(&cluster, &target).await.unwrap();
        assert_eq!(resolved, ResourcePath::new("ns", "web-running"));
        assert_eq!(*cluster.selectors.lock().unwrap(), vec!["app=web,tier=front"]);
    }

    #[tokio::test]
    async fn test_service_without_running_pod_takes_first() {
        let cluster = ScriptedCluster {
            object: Some(json!({"spec": {"selector": {"app": "web"}}})),
            pods: vec![pod("web-a", "Pending"), pod("web-b", "Failed")],
            ..Default::default()
        };

        let resolved = ControllerKind::Service
            .resolve_to_pod(&cluster, &ResourcePath::new("ns", "web"))
            .await
            .unwrap();
        assert_eq!(resolved.name, "web-a");
    }

    #[tokio::test]
    async fn test_controller_without_pods() {
        let cluster = ScriptedCluster {
            object: Some(json!({"spec": {"selector": {"app": "web"}}})),
            ..Default::default()
        };

        let err = ControllerKind::Service
            .resolve_to_pod(&cluster, &ResourcePath::new("ns", "web"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResourceFetch(KubectlError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_controller_without_selector() {
        let cluster = ScriptedCluster {
            object: Some(json!({"spec": {}})),
            ..Default::default()
        };

        let err = ControllerKind::Workload(ResourceKind::Job)
            .resolve_to_pod(&cluster, &ResourcePath::new("ns", "batch"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResourceFetch(KubectlError::ParsingFailed(_))));
    }
}
