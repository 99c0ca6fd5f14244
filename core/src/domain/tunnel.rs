//! Tunnel domain models: port mappings and session keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::pod::{PortCandidate, Protocol};
use super::resource::ResourcePath;
use crate::error::{Error, Result};

/// One local-to-remote port mapping of a tunnel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortTunnel {
    pub address: String,
    pub local_port: u16,
    pub container_port: u16,
    pub protocol: Protocol,
}

impl PortTunnel {
    /// Creates a TCP tunnel mapping.
    pub fn new(address: impl Into<String>, local_port: u16, container_port: u16) -> Self {
        Self {
            address: address.into(),
            local_port,
            container_port,
            protocol: Protocol::Tcp,
        }
    }
}

impl fmt::Display for PortTunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.local_port, self.container_port)
    }
}

/// Registry key of a tunnel session: pod identity plus container name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pod: ResourcePath,
    container: String,
}

impl SessionKey {
    pub fn new(pod: ResourcePath, container: impl Into<String>) -> Self {
        Self {
            pod,
            container: container.into(),
        }
    }

    pub fn pod(&self) -> &ResourcePath {
        &self.pod
    }

    pub fn container(&self) -> &str {
        &self.container
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.pod, self.container)
    }
}

/// The user's confirmed choice in the start dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSelection {
    pub container: String,
    pub tunnels: Vec<PortTunnel>,
}

impl PortSelection {
    /// Builds a selection from chosen candidates and a comma-separated list
    /// of local ports, one per candidate.
    ///
    /// An empty `local_ports` maps every candidate onto its container port.
    pub fn from_candidates(
        selected: &[PortCandidate],
        local_ports: &str,
        address: &str,
    ) -> Result<Self> {
        let first = selected
            .first()
            .ok_or_else(|| Error::InvalidPortSpec("no port selected".to_string()))?;

        if selected.iter().any(|c| c.container != first.container) {
            return Err(Error::InvalidPortSpec(
                "all selected ports must belong to one container".to_string(),
            ));
        }

        let address = address.trim();
        if address.is_empty() {
            return Err(Error::InvalidPortSpec("missing local address".to_string()));
        }

        let locals = if local_ports.trim().is_empty() {
            selected.iter().map(|c| c.container_port).collect()
        } else {
            parse_local_ports(local_ports)?
        };

        if locals.len() != selected.len() {
            return Err(Error::InvalidPortSpec(format!(
                "expected {} local port(s), got {}",
                selected.len(),
                locals.len()
            )));
        }

        let tunnels = selected
            .iter()
            .zip(locals)
            .map(|(c, local)| PortTunnel::new(address, local, c.container_port))
            .collect();

        Ok(Self {
            container: first.container.clone(),
            tunnels,
        })
    }
}

/// Parses a comma-separated list of local ports.
pub fn parse_local_ports(input: &str) -> Result<Vec<u16>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_port)
        .collect()
}

/// Parses a `local:remote` mapping, or a single port used for both sides.
pub fn parse_port_mapping(spec: &str) -> Result<(u16, u16)> {
    match spec.split_once(':') {
        Some((local, remote)) => Ok((parse_port(local)?, parse_port(remote)?)),
        None => {
            let port = parse_port(spec)?;
            Ok((port, port))
        }
    }
}

fn parse_port(s: &str) -> Result<u16> {
    match s.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::InvalidPortSpec(format!("invalid port {:?}", s))),
        Ok(port) => Ok(port),
    }
}
