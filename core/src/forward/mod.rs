//! Forward layer - the tunnel lifecycle.
//!
//! This module wires the ports together:
//! - `availability`: local listen-port checks
//! - `discovery`: declared pod ports and TCP candidates
//! - `target`: controller resources resolved to pods
//! - `session` / `registry`: live tunnel state
//! - `runner`: per-session background task
//! - `controller`: the start/stop flow bound to the forward key

pub mod availability;
pub mod controller;
pub mod discovery;
pub mod registry;
pub mod runner;
pub mod session;
pub mod target;

pub use availability::{check_tunnels, check_tunnels_blocking, try_listen_port};
pub use controller::{ControllerSettings, FlowState, SessionController, FORWARD_KEY_LABEL};
pub use discovery::{tcp_candidates, PodPortDiscovery};
pub use registry::ForwarderRegistry;
pub use runner::ForwardingRunner;
pub use session::{ForwardSnapshot, SessionState, TunnelSession};
pub use target::{resolve_target, ControllerKind};
