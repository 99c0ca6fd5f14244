//! Tunnel transport port (interface).

use std::sync::Arc;

use crate::domain::{PortTunnel, ResourcePath};
use crate::error::Result;

/// Closes a running transport from outside its owning runner.
///
/// Closing is how cancellation reaches a runner: the runner observes the
/// transport ending and performs its own cleanup.
pub trait TunnelCloser: Send + Sync {
    fn close(&self);
}

/// Live transport of one tunnel session, owned by its runner.
pub trait TransportHandle: Send + 'static {
    /// Resolves once every requested port is forwarding.
    fn ready(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Relays traffic until the transport closes. `Ok` means a normal close.
    fn wait(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Returns a closer usable from any thread.
    fn closer(&self) -> Arc<dyn TunnelCloser>;
}

/// Port for opening tunnels to pod containers.
pub trait Transport: Send + Sync + 'static {
    type Handle: TransportHandle;

    /// Opens a transport relaying every tunnel to `container` in `pod`.
    fn open(
        &self,
        pod: &ResourcePath,
        container: &str,
        tunnels: &[PortTunnel],
    ) -> Result<Self::Handle>;
}
