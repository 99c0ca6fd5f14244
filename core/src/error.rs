//! Error types for the podfwd-core library.

use thiserror::Error;

use crate::domain::SessionKey;
use crate::kubernetes::errors::KubectlError;

/// Result type alias for podfwd operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while managing port-forward tunnels.
#[derive(Error, Debug)]
pub enum Error {
    /// Cluster data was unavailable, denied or malformed.
    #[error(transparent)]
    ResourceFetch(#[from] KubectlError),

    /// The selected resource cannot resolve to a concrete pod.
    #[error("expecting a controller resource for {0:?}")]
    UnsupportedResourceKind(String),

    /// A proposed local port is already bound.
    #[error("port {address}:{port} is not available: {source}")]
    PortUnavailable {
        address: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// A session already exists for the key.
    #[error("A port-forward is already active on this pod ({0})")]
    DuplicateSession(SessionKey),

    /// Failure while the tunnel was forwarding.
    #[error("port-forward failed: {0}")]
    Transport(String),

    /// No session exists for the key.
    #[error("no port-forward found for {0}")]
    NotFound(SessionKey),

    /// A port mapping could not be parsed or is inconsistent.
    #[error("Invalid port specification: {0}")]
    InvalidPortSpec(String),

    /// A resource target could not be parsed.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true for outcomes callers may ignore, such as deleting a
    /// session that is already gone.
    pub fn is_benign(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
