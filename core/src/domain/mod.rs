//! Domain layer - Pure data models.
//!
//! This module contains the entities the tunnel lifecycle is built on.
//! These types have no I/O dependencies and can be tested in isolation.

mod pod;
mod resource;
mod tunnel;

// Re-export all domain types
pub use pod::{ContainerPort, PodPorts, PortCandidate, Protocol};
pub use resource::{ResourceKind, ResourcePath, Target, DEFAULT_NAMESPACE};
pub use tunnel::{parse_local_ports, parse_port_mapping, PortSelection, PortTunnel, SessionKey};
