//! Cluster access port (interface).

use serde_json::Value;

use crate::domain::{ResourceKind, ResourcePath};
use crate::error::Result;

/// Port for reading cluster resources.
///
/// Implementations return raw JSON objects; projection into typed models
/// happens in the caller. Errors are passed through unchanged and never
/// retried at this layer.
pub trait ClusterAccess: Send + Sync + 'static {
    /// Fetches a single resource.
    fn fetch_resource(
        &self,
        kind: &ResourceKind,
        path: &ResourcePath,
    ) -> impl std::future::Future<Output = Result<Value>> + Send;

    /// Lists pods in a namespace, optionally narrowed by a label selector
    /// such as `app=web,tier=front`.
    fn list_pods(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Vec<Value>>> + Send;
}
