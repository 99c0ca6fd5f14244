//! Kubernetes module: kubectl-backed cluster access and tunnel transport.
//!
//! This module provides:
//! - Resource fetching and pod listing via `kubectl get`
//! - Tunnel transport via `kubectl port-forward` child processes
//! - Decoding of the JSON objects kubectl returns

pub mod discovery;
pub mod errors;
pub mod models;
pub mod transport;

// Re-export commonly used types
pub use discovery::KubernetesDiscovery;
pub use errors::{KubectlError, Result};
pub use models::{PodResponse, PodSummary};
pub use transport::{KubectlForward, KubectlTransport};
