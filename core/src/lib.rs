//! podfwd Core Library
//!
//! Port-forward tunnel lifecycle for an interactive cluster console.
//! Provides functionality to:
//! - Resolve a selected resource to a concrete pod
//! - Discover the pod's declared TCP ports
//! - Validate local listen ports before committing to a tunnel
//! - Track live tunnels in one registry with at most one per pod container
//! - Run each tunnel in a background task that hands UI updates back to
//!   the console loop
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Pure data models
//! - `ports`: Trait definitions (interfaces)
//! - `kubernetes`: kubectl-backed implementations of the ports
//! - `forward`: The tunnel lifecycle built on the ports

// Hexagonal architecture layers
pub mod domain;
pub mod forward;
pub mod kubernetes;
pub mod ports;

pub mod config;
pub mod error;

// Re-export domain types (primary API)
pub use domain::{
    ContainerPort, PodPorts, PortCandidate, PortSelection, PortTunnel, Protocol, ResourceKind,
    ResourcePath, SessionKey, Target,
};

// Re-export other commonly used types
pub use config::{Config, ConfigStore};
pub use error::{Error, Result};
pub use forward::{
    ControllerSettings, FlowState, ForwardSnapshot, ForwarderRegistry, SessionController,
    SessionState, TunnelSession,
};
pub use kubernetes::{KubectlTransport, KubernetesDiscovery};
pub use ports::{ForwardUi, UiQueue, UiReceiver};
