//! Errors reported by the kubectl adapter.

use thiserror::Error;

/// Result type alias for kubectl operations.
pub type Result<T> = std::result::Result<T, KubectlError>;

/// Errors from running kubectl or decoding what it returned.
#[derive(Error, Debug)]
pub enum KubectlError {
    /// kubectl binary could not be located.
    #[error("kubectl not found")]
    KubectlNotFound,

    /// The requested resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The current credentials may not read the resource.
    #[error("access denied: {0}")]
    Forbidden(String),

    /// The cluster could not be reached.
    #[error("cluster not connected: {0}")]
    ClusterNotConnected(String),

    /// kubectl output could not be decoded.
    #[error("failed to decode kubectl output: {0}")]
    ParsingFailed(String),

    /// kubectl did not answer in time.
    #[error("kubectl command timed out")]
    Timeout,

    /// kubectl could not be spawned or controlled.
    #[error("kubectl process error: {0}")]
    ProcessError(String),

    /// kubectl exited with an unclassified error.
    #[error("kubectl failed: {0}")]
    CommandFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KubectlError {
    /// Classifies kubectl stderr output.
    pub fn from_kubectl_error(stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        let lower = message.to_lowercase();

        if lower.contains("connection refused")
            || lower.contains("no configuration has been provided")
            || lower.contains("dial tcp")
            || lower.contains("unable to connect to the server")
        {
            KubectlError::ClusterNotConnected(message)
        } else if lower.contains("notfound") || lower.contains("not found") {
            KubectlError::NotFound(message)
        } else if lower.contains("forbidden") || lower.contains("unauthorized") {
            KubectlError::Forbidden(message)
        } else {
            KubectlError::CommandFailed(message)
        }
    }

    /// Returns true if the error means the cluster is unreachable.
    pub fn is_cluster_not_connected(&self) -> bool {
        matches!(self, KubectlError::ClusterNotConnected(_))
    }
}
