//! Cluster resource identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Namespace used when a path carries no namespace.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Fully-qualified resource path in the form `namespace/name`.
///
/// Pod identities are resource paths of kind [`ResourceKind::Pod`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourcePath {
    pub namespace: String,
    pub name: String,
}

impl ResourcePath {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for ResourcePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = match s.split_once('/') {
            Some((ns, name)) => (ns, name),
            None => (DEFAULT_NAMESPACE, s),
        };

        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            return Err(Error::InvalidTarget(s.to_string()));
        }

        Ok(Self::new(namespace, name))
    }
}

/// Kind of cluster resource selected in the console.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Pod,
    Deployment,
    StatefulSet,
    DaemonSet,
    ReplicaSet,
    Job,
    Service,
    Other(String),
}

impl ResourceKind {
    /// Resource name as understood by `kubectl get`.
    pub fn as_kubectl(&self) -> &str {
        match self {
            Self::Pod => "pods",
            Self::Deployment => "deployments",
            Self::StatefulSet => "statefulsets",
            Self::DaemonSet => "daemonsets",
            Self::ReplicaSet => "replicasets",
            Self::Job => "jobs",
            Self::Service => "services",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_kubectl())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.to_lowercase().as_str() {
            "po" | "pod" | "pods" => Self::Pod,
            "deploy" | "deployment" | "deployments" => Self::Deployment,
            "sts" | "statefulset" | "statefulsets" => Self::StatefulSet,
            "ds" | "daemonset" | "daemonsets" => Self::DaemonSet,
            "rs" | "replicaset" | "replicasets" => Self::ReplicaSet,
            "job" | "jobs" => Self::Job,
            "svc" | "service" | "services" => Self::Service,
            "" => return Err(Error::InvalidTarget(s.to_string())),
            other => Self::Other(other.to_string()),
        };
        Ok(kind)
    }
}

/// A resource selected as the subject of a port-forward request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub kind: ResourceKind,
    pub path: ResourcePath,
}

impl Target {
    pub fn new(kind: ResourceKind, path: ResourcePath) -> Self {
        Self { kind, path }
    }

    /// Shorthand for a pod target.
    pub fn pod(path: ResourcePath) -> Self {
        Self::new(ResourceKind::Pod, path)
    }

    /// Parses `kind/name` (for example `deploy/web`) within a namespace.
    /// A bare name is taken as a pod.
    pub fn parse(spec: &str, namespace: &str) -> Result<Self, Error> {
        let (kind, name) = match spec.split_once('/') {
            Some((kind, name)) => (kind.parse()?, name),
            None => (ResourceKind::Pod, spec),
        };

        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidTarget(spec.to_string()));
        }

        Ok(Self::new(kind, ResourcePath::new(namespace, name)))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path)
    }
}
