//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the interfaces the forward flow uses to reach
//! external collaborators. Implementations live in `kubernetes` and in
//! the hosting console.

mod cluster;
mod transport;
mod ui;

pub use cluster::ClusterAccess;
pub use transport::{Transport, TransportHandle, TunnelCloser};
pub use ui::{
    ConfirmDialog, ForwardUi, KeyAction, KeyActions, KeyHandler, PortSelectionDialog, UiQueue,
    UiReceiver, UiTask, KEY_SHIFT_F,
};
