//! Pod port discovery.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{PodPorts, PortCandidate, Protocol, ResourceKind, ResourcePath};
use crate::error::Result;
use crate::kubernetes::{KubectlError, PodResponse};
use crate::ports::ClusterAccess;

/// Reads the declared container ports of a pod.
pub struct PodPortDiscovery<C> {
    cluster: Arc<C>,
}

impl<C> Clone for PodPortDiscovery<C> {
    fn clone(&self) -> Self {
        Self {
            cluster: Arc::clone(&self.cluster),
        }
    }
}

impl<C: ClusterAccess> PodPortDiscovery<C> {
    pub fn new(cluster: Arc<C>) -> Self {
        Self { cluster }
    }

    /// Fetches the pod and maps container name to its declared ports.
    pub async fn fetch_pod_ports(&self, pod: &ResourcePath) -> Result<PodPorts> {
        debug!(pod = %pod, "Fetching ports on pod");
        let object = self.cluster.fetch_resource(&ResourceKind::Pod, pod).await?;

        let pod: PodResponse = serde_json::from_value(object)
            .map_err(|e| KubectlError::ParsingFailed(e.to_string()))?;

        Ok(pod.into_ports())
    }
}

/// Builds the user-selectable candidates: TCP ports only.
pub fn tcp_candidates(ports: &PodPorts) -> Vec<PortCandidate> {
    ports
        .iter()
        .flat_map(|(container, pp)| {
            pp.iter()
                .filter(|p| p.protocol == Protocol::Tcp)
                .map(move |p| PortCandidate::new(container, p))
        })
        .collect()
}
