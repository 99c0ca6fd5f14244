//! Session controller: the user-facing start/stop flow.
//!
//! All entry points run on the UI loop and return without blocking. Cluster
//! reads and port checks run as spawned tasks whose results come back
//! through the [`UiQueue`].
//!
//! Each trigger starts a new dialog flow generation. Results belonging to an
//! older generation are dropped, so a dismissed dialog or a re-trigger never
//! lets a stale dialog act. Once a selection is confirmed the start is
//! tracked by its session key instead and always runs to a notification.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::availability::check_tunnels_blocking;
use super::discovery::{tcp_candidates, PodPortDiscovery};
use super::registry::ForwarderRegistry;
use super::runner::ForwardingRunner;
use super::session::{ForwardSnapshot, TunnelSession};
use super::target::ControllerKind;
use crate::config::Config;
use crate::domain::{PodPorts, PortSelection, ResourcePath, SessionKey, Target};
use crate::error::{Error, Result};
use crate::ports::{
    ClusterAccess, ConfirmDialog, ForwardUi, KeyAction, KeyActions, PortSelectionDialog,
    Transport, TransportHandle, UiQueue, KEY_SHIFT_F,
};

/// Label shown for the forward key binding.
pub const FORWARD_KEY_LABEL: &str = "Port-Forward";

/// Where the controller is in the current flow.
///
/// `ValidatingPorts` and `Starting` belong to confirmed starts, which are
/// tracked per session key. Session-level states (active, terminating) live
/// on the session itself; a start is done once its runner is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Resolving,
    AwaitingPortSelection,
    AwaitingDeleteConfirmation,
    ValidatingPorts,
    Starting,
}

/// Tunables the controller takes from [`Config`].
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub default_address: String,
    pub ready_timeout: Duration,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_address: config.default_address.clone(),
            ready_timeout: config.ready_timeout(),
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug)]
struct Flow {
    state: FlowState,
    generation: u64,
}

struct Inner<C, T, A> {
    cluster: Arc<C>,
    transport: Arc<T>,
    registry: Arc<ForwarderRegistry>,
    ui: UiQueue<A>,
    discovery: PodPortDiscovery<C>,
    settings: ControllerSettings,
    flow: Mutex<Flow>,
    starts: Mutex<HashMap<SessionKey, FlowState>>,
}

/// Orchestrates port-forward start and teardown for the hosting view.
pub struct SessionController<C, T, A> {
    inner: Arc<Inner<C, T, A>>,
}

impl<C, T, A> Clone for SessionController<C, T, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, T, A> SessionController<C, T, A>
where
    C: ClusterAccess,
    T: Transport,
    A: ForwardUi,
{
    pub fn new(
        cluster: Arc<C>,
        transport: Arc<T>,
        registry: Arc<ForwarderRegistry>,
        ui: UiQueue<A>,
        settings: ControllerSettings,
    ) -> Self {
        let discovery = PodPortDiscovery::new(Arc::clone(&cluster));
        Self {
            inner: Arc::new(Inner {
                cluster,
                transport,
                registry,
                ui,
                discovery,
                settings,
                flow: Mutex::new(Flow {
                    state: FlowState::Idle,
                    generation: 0,
                }),
                starts: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<ForwarderRegistry> {
        &self.inner.registry
    }

    /// Read-only view of the registry for the active-forwards listing.
    pub fn forwards(&self) -> Vec<ForwardSnapshot> {
        self.inner.registry.snapshot()
    }

    /// State of the dialog flow, or of a pending start once no dialog is
    /// in progress.
    pub fn flow_state(&self) -> FlowState {
        let dialog = self.inner.flow.lock().state;
        if dialog != FlowState::Idle {
            return dialog;
        }

        let starts = self.inner.starts.lock();
        if starts.values().any(|s| *s == FlowState::ValidatingPorts) {
            FlowState::ValidatingPorts
        } else if starts.is_empty() {
            FlowState::Idle
        } else {
            FlowState::Starting
        }
    }

    /// Number of confirmed starts that have not launched or failed yet.
    pub fn pending_starts(&self) -> usize {
        self.inner.starts.lock().len()
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.inner.settings
    }

    /// Binds Shift-F to [`trigger`](Self::trigger) on the selected resource.
    pub fn bind_keys(&self, actions: &mut KeyActions<A>) {
        let controller = self.clone();
        actions.add(
            KEY_SHIFT_F,
            KeyAction::new(
                FORWARD_KEY_LABEL,
                move |app: &mut A| match app.selected_target() {
                    Some(target) => {
                        controller.trigger(app, target);
                        true
                    }
                    None => false,
                },
                true,
            ),
        );
    }

    // ========================================================================
    // Dialog flow generations
    // ========================================================================

    fn begin(&self, state: FlowState) -> u64 {
        let mut flow = self.inner.flow.lock();
        flow.generation += 1;
        flow.state = state;
        flow.generation
    }

    /// Moves the flow to `state` if `generation` is still current.
    fn advance(&self, generation: u64, state: FlowState) -> bool {
        let mut flow = self.inner.flow.lock();
        if flow.generation != generation {
            debug!(generation, current = flow.generation, "Dropping stale forward flow");
            return false;
        }
        flow.state = state;
        true
    }

    fn finish(&self, generation: u64) {
        self.advance(generation, FlowState::Idle);
    }

    /// Surfaces `err` once and returns the flow to idle.
    fn fail(&self, app: &mut A, generation: u64, err: Error) {
        if self.advance(generation, FlowState::Idle) {
            debug!(error = %err, "Port-forward flow aborted");
            app.flash_error(&err);
        }
    }

    // ========================================================================
    // Trigger
    // ========================================================================

    /// Entry point for the forward key on `target`.
    ///
    /// Opens the teardown confirmation when the resolved pod already has
    /// live sessions, otherwise the start dialog.
    pub fn trigger(&self, app: &mut A, target: Target) {
        let generation = self.begin(FlowState::Resolving);
        debug!(target = %target, "Port-forward triggered");

        let kind = match ControllerKind::for_kind(&target.kind) {
            Ok(kind) => kind,
            Err(e) => return self.fail(app, generation, e),
        };

        if kind.is_pod() {
            return self.on_pod_resolved(app, generation, target.path);
        }

        let this = self.clone();
        tokio::spawn(async move {
            let result = kind
                .resolve_to_pod(this.inner.cluster.as_ref(), &target.path)
                .await;
            let ui = this.inner.ui.clone();
            ui.run_on_ui(move |app: &mut A| match result {
                Ok(pod) => this.on_pod_resolved(app, generation, pod),
                Err(e) => this.fail(app, generation, e),
            });
        });
    }

    fn on_pod_resolved(&self, app: &mut A, generation: u64, pod: ResourcePath) {
        let sessions = self.inner.registry.all_for_pod(&pod);
        if !sessions.is_empty() {
            return self.confirm_delete(app, generation, pod, sessions);
        }

        if !self.advance(generation, FlowState::AwaitingPortSelection) {
            return;
        }

        let this = self.clone();
        tokio::spawn(async move {
            let result = this.inner.discovery.fetch_pod_ports(&pod).await;
            let ui = this.inner.ui.clone();
            ui.run_on_ui(move |app: &mut A| this.on_ports_fetched(app, generation, pod, result));
        });
    }

    fn on_ports_fetched(
        &self,
        app: &mut A,
        generation: u64,
        pod: ResourcePath,
        result: Result<PodPorts>,
    ) {
        let ports = match result {
            Ok(ports) => ports,
            Err(e) => return self.fail(app, generation, e),
        };

        let candidates = tcp_candidates(&ports);
        if candidates.is_empty() {
            let err = Error::InvalidPortSpec(format!("no TCP ports declared on {}", pod));
            return self.fail(app, generation, err);
        }

        if !self.advance(generation, FlowState::AwaitingPortSelection) {
            return;
        }

        let on_confirm = {
            let this = self.clone();
            let pod = pod.clone();
            move |app: &mut A, selection: PortSelection| {
                if this.advance(generation, FlowState::Idle) {
                    this.validate_and_start(app, pod, selection);
                }
            }
        };
        let on_cancel = {
            let this = self.clone();
            move |_: &mut A| this.finish(generation)
        };

        app.show_selection(PortSelectionDialog::new(
            pod,
            candidates,
            self.inner.settings.default_address.clone(),
            on_confirm,
            on_cancel,
        ));
    }

    // ========================================================================
    // Start
    // ========================================================================

    /// Starts a forward for an already chosen selection, skipping the dialog.
    ///
    /// Starts for different keys run side by side. A start for a key that is
    /// live or already being started fails with [`Error::DuplicateSession`].
    pub fn start(&self, app: &mut A, pod: ResourcePath, selection: PortSelection) {
        self.validate_and_start(app, pod, selection);
    }

    fn validate_and_start(&self, app: &mut A, pod: ResourcePath, selection: PortSelection) {
        let key = SessionKey::new(pod, selection.container.clone());
        if let Err(e) = self.claim(&key) {
            debug!(key = %key, "Rejecting overlapping start");
            return app.flash_error(&e);
        }

        let this = self.clone();
        tokio::spawn(async move {
            let result = check_tunnels_blocking(selection.tunnels.clone()).await;
            let ui = this.inner.ui.clone();
            ui.run_on_ui(move |app: &mut A| match result {
                Ok(()) => this.launch(app, key, selection),
                Err(e) => {
                    this.release(&key);
                    app.flash_error(&e);
                }
            });
        });
    }

    /// Marks `key` as being started unless it is live or already claimed.
    fn claim(&self, key: &SessionKey) -> Result<()> {
        let mut starts = self.inner.starts.lock();
        if starts.contains_key(key) || self.inner.registry.lookup(key).is_some() {
            return Err(Error::DuplicateSession(key.clone()));
        }
        starts.insert(key.clone(), FlowState::ValidatingPorts);
        Ok(())
    }

    fn release(&self, key: &SessionKey) {
        self.inner.starts.lock().remove(key);
    }

    fn launch(&self, app: &mut A, key: SessionKey, selection: PortSelection) {
        if let Some(state) = self.inner.starts.lock().get_mut(&key) {
            *state = FlowState::Starting;
        }

        let result = self.open_session(key.clone(), selection);
        self.release(&key);

        match result {
            Ok(session) => {
                info!(
                    key = %session.key(),
                    ports = %session.ports_summary(),
                    "Starting port-forward"
                );
            }
            Err(e) => {
                debug!(key = %key, error = %e, "Port-forward start failed");
                app.flash_error(&e);
            }
        }
    }

    fn open_session(
        &self,
        key: SessionKey,
        selection: PortSelection,
    ) -> Result<Arc<TunnelSession>> {
        if self.inner.registry.lookup(&key).is_some() {
            return Err(Error::DuplicateSession(key));
        }

        let handle = self
            .inner
            .transport
            .open(key.pod(), key.container(), &selection.tunnels)?;
        let session = Arc::new(TunnelSession::new(key, selection.tunnels, handle.closer())?);

        if let Err(e) = self.inner.registry.add(Arc::clone(&session)) {
            session.close();
            return Err(e);
        }

        ForwardingRunner::new(
            Arc::clone(&session),
            handle,
            Arc::clone(&self.inner.registry),
            self.inner.ui.clone(),
            self.inner.settings.ready_timeout,
        )
        .spawn();

        Ok(session)
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    fn confirm_delete(
        &self,
        app: &mut A,
        generation: u64,
        pod: ResourcePath,
        sessions: Vec<Arc<TunnelSession>>,
    ) {
        if !self.advance(generation, FlowState::AwaitingDeleteConfirmation) {
            return;
        }

        let mut message = format!("Delete PortForward {}?", pod);
        for s in &sessions {
            message.push_str(&format!("\n{} {}", s.container(), s.ports_summary()));
        }

        let on_confirm = {
            let this = self.clone();
            move |app: &mut A| {
                for s in &sessions {
                    this.stop_session(s);
                }
                if this.advance(generation, FlowState::Idle) {
                    app.flash_info(format!("PortForward {} deleted!", pod));
                }
                app.refresh();
            }
        };
        let on_cancel = {
            let this = self.clone();
            move |_: &mut A| this.finish(generation)
        };

        app.show_confirmation(ConfirmDialog::new("Delete", message, on_confirm, on_cancel));
    }

    /// Removes the session for `key` and closes its transport.
    ///
    /// The runner observes the close and finishes its own cleanup. An absent
    /// key yields the benign [`Error::NotFound`].
    pub fn stop(&self, key: &SessionKey) -> Result<()> {
        let session = self.inner.registry.delete(key)?;
        session.set_active(false);
        session.close();
        info!(key = %key, "Stopped port-forward");
        Ok(())
    }

    /// Removes exactly `session` and closes its transport. A newer session
    /// that took over the key is left alone.
    fn stop_session(&self, session: &TunnelSession) {
        if !self.inner.registry.delete_session(session) {
            debug!(key = %session.key(), "Session already gone");
        }
        session.set_active(false);
        session.close();
    }

    /// Closes every registered session, e.g. on shutdown.
    pub fn stop_all(&self) -> usize {
        let sessions = self.inner.registry.sessions();
        for s in &sessions {
            s.close();
        }
        sessions.len()
    }
}
