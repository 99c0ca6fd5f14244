//! Forwarding runner: the background task that owns one tunnel's transport.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::registry::ForwarderRegistry;
use super::session::{SessionState, TunnelSession};
use crate::error::{Error, Result};
use crate::ports::{ForwardUi, TransportHandle, UiQueue};

/// Grace period for a transport to wind down after a failed start.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Drives one registered session from readiness to retirement.
///
/// The session must already be in the registry; the runner never adds it.
pub struct ForwardingRunner<H, A> {
    session: Arc<TunnelSession>,
    handle: H,
    registry: Arc<ForwarderRegistry>,
    ui: UiQueue<A>,
    ready_timeout: Duration,
}

impl<H, A> ForwardingRunner<H, A>
where
    H: TransportHandle,
    A: ForwardUi,
{
    pub fn new(
        session: Arc<TunnelSession>,
        handle: H,
        registry: Arc<ForwarderRegistry>,
        ui: UiQueue<A>,
        ready_timeout: Duration,
    ) -> Self {
        Self {
            session,
            handle,
            registry,
            ui,
            ready_timeout,
        }
    }

    /// Launches the runner as an independent task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until the transport ends, then retires the session.
    pub async fn run(mut self) {
        let key = self.session.key().clone();

        let outcome = match timeout(self.ready_timeout, self.handle.ready()).await {
            Ok(Ok(())) => {
                self.activate();
                match self.handle.wait().await {
                    // A close we asked for is a normal close
                    Err(e) if self.session.close_requested() => {
                        debug!(key = %key, error = %e, "Transport ended after close request");
                        Ok(())
                    }
                    other => other,
                }
            }
            Ok(Err(e)) => {
                let requested = self.session.close_requested();
                self.abort().await;
                if requested {
                    Ok(())
                } else {
                    Err(e)
                }
            }
            Err(_) => {
                self.abort().await;
                Err(Error::Transport(format!(
                    "{} did not become ready within {}s",
                    key,
                    self.ready_timeout.as_secs()
                )))
            }
        };

        match &outcome {
            Ok(()) => info!(key = %key, "Port-forward closed"),
            Err(e) => warn!(key = %key, error = %e, "Port-forward failed"),
        }

        self.session.set_state(SessionState::Terminating);
        self.retire(outcome);
    }

    async fn abort(&mut self) {
        self.session.close();
        if timeout(CLOSE_GRACE, self.handle.wait()).await.is_err() {
            warn!(key = %self.session.key(), "Transport did not exit after close");
        }
    }

    fn activate(&self) {
        let session = self.session.clone();
        info!(key = %session.key(), ports = %session.ports_summary(), "Port-forward ready");

        let queued = self.ui.run_on_ui(move |app: &mut A| {
            // Deleted or failed before the UI caught up
            if session.state() != SessionState::Starting {
                return;
            }
            session.set_active(true);
            session.set_state(SessionState::Active);
            app.flash_info(format!(
                "PortForward activated {}:{}",
                session.pod(),
                session.tunnels()[0].local_port
            ));
            app.dismiss();
        });

        if !queued && self.session.state() == SessionState::Starting {
            self.session.set_active(true);
            self.session.set_state(SessionState::Active);
        }
    }

    fn retire(&self, outcome: Result<()>) {
        let retirement = Retirement {
            registry: self.registry.clone(),
            session: self.session.clone(),
        };

        let queued = self.ui.run_on_ui({
            let retirement = retirement.clone();
            move |app: &mut A| {
                let requested = retirement.session.close_requested();
                retirement.run();
                match outcome {
                    Err(e) => app.flash_error(&e),
                    Ok(()) if !requested => {
                        app.flash_info(format!("PortForward {} closed", retirement.session.key()))
                    }
                    Ok(()) => {}
                }
                app.refresh();
            }
        });

        // No UI left to hand off to
        if !queued {
            retirement.run();
        }
    }
}

/// One-time cleanup shared by the queued and direct retirement paths.
#[derive(Clone)]
struct Retirement {
    registry: Arc<ForwarderRegistry>,
    session: Arc<TunnelSession>,
}

impl Retirement {
    fn run(&self) {
        if !self.session.retire() {
            return;
        }
        self.session.set_active(false);
        self.registry.delete_session(&self.session);
        self.session.set_state(SessionState::Terminated);
    }
}
