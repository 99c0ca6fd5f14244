//! Pod port domain models.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport protocol of a declared container port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
    #[serde(other)]
    Other,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
            Self::Sctp => "SCTP",
            Self::Other => "OTHER",
        }
    }
}

/// A port declared in a container spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    #[serde(default)]
    pub name: Option<String>,
    pub container_port: u16,
    #[serde(default)]
    pub protocol: Protocol,
}

impl ContainerPort {
    pub fn tcp(name: Option<&str>, container_port: u16) -> Self {
        Self {
            name: name.map(str::to_string),
            container_port,
            protocol: Protocol::Tcp,
        }
    }
}

/// Declared ports of a pod, keyed by container name.
pub type PodPorts = BTreeMap<String, Vec<ContainerPort>>;

/// A user-selectable remote port, rendered as `container/portName:containerPort`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortCandidate {
    pub container: String,
    pub port_name: Option<String>,
    pub container_port: u16,
}

impl PortCandidate {
    pub fn new(container: &str, port: &ContainerPort) -> Self {
        Self {
            container: container.to_string(),
            port_name: port.name.clone().filter(|n| !n.is_empty()),
            container_port: port.container_port,
        }
    }
}

impl fmt::Display for PortCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.port_name {
            Some(name) => write!(f, "{}/{}:{}", self.container, name, self.container_port),
            None => write!(f, "{}:{}", self.container, self.container_port),
        }
    }
}
