//! Local listen-port availability checks.
//!
//! A successful check only means the port was free at that instant; another
//! process may still bind it before the tunnel does.

use std::net::TcpListener;

use tracing::debug;

use crate::domain::PortTunnel;
use crate::error::{Error, Result};

/// Binds `address:port` and releases it immediately.
pub fn try_listen_port(address: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((address, port)).map_err(|source| Error::PortUnavailable {
        address: address.to_string(),
        port,
        source,
    })?;
    drop(listener);
    Ok(())
}

/// Checks every tunnel's local port, failing on the first unavailable one.
pub fn check_tunnels(tunnels: &[PortTunnel]) -> Result<()> {
    for tunnel in tunnels {
        try_listen_port(&tunnel.address, tunnel.local_port)?;
        debug!(address = %tunnel.address, port = tunnel.local_port, "Local port is free");
    }
    Ok(())
}

/// Runs [`check_tunnels`] on the blocking pool, off the UI loop.
pub async fn check_tunnels_blocking(tunnels: Vec<PortTunnel>) -> Result<()> {
    tokio::task::spawn_blocking(move || check_tunnels(&tunnels))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}
