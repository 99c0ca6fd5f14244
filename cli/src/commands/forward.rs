//! Forward command - run one port-forward in the foreground.
//!
//! Drives the same controller as the console, with a line-oriented UI that
//! prints status messages. Runs until the tunnel ends or Ctrl-C.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use chrono::Local;
use podfwd_core::domain::parse_port_mapping;
use podfwd_core::forward::{resolve_target, tcp_candidates, PodPortDiscovery};
use podfwd_core::ports::{ConfirmDialog, PortSelectionDialog};
use podfwd_core::{
    Config, ControllerSettings, Error, FlowState, ForwardUi, ForwarderRegistry, KubectlTransport,
    KubernetesDiscovery, PodPorts, PortSelection, PortTunnel, SessionController, SessionKey,
    SessionState, Target, UiQueue,
};
use tracing::debug;

/// Status output for a foreground forward.
#[derive(Default)]
struct ConsoleUi {
    last_error: Option<String>,
}

impl ForwardUi for ConsoleUi {
    fn selected_target(&self) -> Option<Target> {
        None
    }

    fn show_selection(&mut self, dialog: PortSelectionDialog<Self>) {
        dialog.cancel(self);
    }

    fn show_confirmation(&mut self, dialog: ConfirmDialog<Self>) {
        dialog.cancel(self);
    }

    fn dismiss(&mut self) {}

    fn flash_info(&mut self, msg: String) {
        println!("{} {}", Local::now().format("%H:%M:%S"), msg);
    }

    fn flash_error(&mut self, err: &Error) {
        eprintln!("{} Error: {}", Local::now().format("%H:%M:%S"), err);
        self.last_error = Some(err.to_string());
    }

    fn refresh(&mut self) {}
}

pub async fn run(
    config: &Config,
    namespace: &str,
    target: &str,
    mappings: &[String],
    container: Option<String>,
    address: Option<String>,
) -> Result<()> {
    let target = Target::parse(target, namespace)?;
    let cluster = Arc::new(KubernetesDiscovery::from_config(config));
    let transport = Arc::new(KubectlTransport::from_config(config));
    let registry = Arc::new(ForwarderRegistry::new());
    let (queue, mut rx) = UiQueue::channel();
    let controller = SessionController::new(
        Arc::clone(&cluster),
        transport,
        Arc::clone(&registry),
        queue,
        ControllerSettings::from_config(config),
    );

    let pod = resolve_target(cluster.as_ref(), &target).await?;
    let ports = PodPortDiscovery::new(Arc::clone(&cluster))
        .fetch_pod_ports(&pod)
        .await?;
    let address = address.unwrap_or_else(|| config.default_address.clone());
    let selection = build_selection(&ports, mappings, container.as_deref(), &address)?;
    let key = SessionKey::new(pod.clone(), selection.container.clone());
    debug!(key = %key, "Forwarding from the command line");

    let mut ui = ConsoleUi::default();
    controller.start(&mut ui, pod, selection);
    if controller.pending_starts() == 0 {
        let msg = ui.last_error.take();
        bail!(msg.unwrap_or_else(|| "port-forward did not start".to_string()));
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut session = None;

    loop {
        tokio::select! {
            task = rx.recv() => match task {
                Some(task) => task(&mut ui),
                None => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if session.is_none() {
                    break;
                }
                if let Err(e) = controller.stop(&key) {
                    debug!(error = %e, "Nothing to stop");
                }
            }
        }

        if session.is_none() {
            session = registry.lookup(&key);
        }
        match &session {
            Some(s) if s.state() == SessionState::Terminated => break,
            None if controller.flow_state() == FlowState::Idle => break,
            _ => {}
        }
    }

    match ui.last_error {
        Some(msg) if !interrupted => Err(anyhow!(msg)),
        _ => Ok(()),
    }
}

/// Maps `local:remote` specs onto the pod's declared TCP ports.
///
/// Every remote port must be declared by the same container.
fn build_selection(
    ports: &PodPorts,
    mappings: &[String],
    container: Option<&str>,
    address: &str,
) -> Result<PortSelection> {
    let candidates: Vec<_> = tcp_candidates(ports)
        .into_iter()
        .filter(|c| container.map_or(true, |name| c.container == name))
        .collect();

    let mut owner: Option<String> = container.map(str::to_string);
    let mut tunnels = Vec::with_capacity(mappings.len());

    for spec in mappings {
        let (local, remote) = parse_port_mapping(spec)?;
        let candidate = candidates
            .iter()
            .find(|c| {
                c.container_port == remote && owner.as_ref().map_or(true, |o| *o == c.container)
            })
            .ok_or_else(|| anyhow!("no container declares TCP port {}", remote))?;

        owner.get_or_insert_with(|| candidate.container.clone());
        tunnels.push(PortTunnel::new(address, local, remote));
    }

    let Some(container) = owner else {
        bail!("no port mappings given");
    };

    Ok(PortSelection { container, tunnels })
}
