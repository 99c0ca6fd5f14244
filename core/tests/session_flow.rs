//! End-to-end tests of the forward flow against in-memory collaborators.

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use podfwd_core::domain::{
    PortSelection, PortTunnel, ResourceKind, ResourcePath, SessionKey, Target,
};
use podfwd_core::forward::{ControllerSettings, FlowState, SessionController, SessionState};
use podfwd_core::kubernetes::KubectlError;
use podfwd_core::ports::{
    ClusterAccess, ConfirmDialog, ForwardUi, KeyActions, PortSelectionDialog, Transport,
    TransportHandle, TunnelCloser, UiQueue, UiReceiver, KEY_SHIFT_F,
};
use podfwd_core::{Error, ForwarderRegistry, Result};
use serde_json::{json, Value};
use tokio::sync::{oneshot, Notify};
use tokio::time::timeout;

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeCluster {
    objects: HashMap<(String, ResourcePath), Value>,
    pods: Vec<Value>,
}

impl FakeCluster {
    fn with_web_pod() -> Self {
        let mut cluster = Self::default();
        let pod = json!({
            "metadata": {"name": "web-0", "namespace": "ns"},
            "spec": {"containers": [
                {"name": "app", "ports": [
                    {"name": "http", "containerPort": 8080, "protocol": "TCP"},
                    {"name": "dns", "containerPort": 53, "protocol": "UDP"}
                ]},
                {"name": "sidecar", "ports": [
                    {"name": "stats", "containerPort": 9125, "protocol": "UDP"}
                ]}
            ]},
            "status": {"phase": "Running"}
        });
        cluster.insert(ResourceKind::Pod, "ns", "web-0", pod.clone());
        cluster.pods.push(pod);
        cluster
    }

    fn insert(&mut self, kind: ResourceKind, ns: &str, name: &str, object: Value) {
        self.objects
            .insert((kind.to_string(), ResourcePath::new(ns, name)), object);
    }
}

impl ClusterAccess for FakeCluster {
    async fn fetch_resource(&self, kind: &ResourceKind, path: &ResourcePath) -> Result<Value> {
        self.objects
            .get(&(kind.to_string(), path.clone()))
            .cloned()
            .ok_or_else(|| KubectlError::NotFound(format!("{} {}", kind, path)).into())
    }

    async fn list_pods(&self, _namespace: &str, _selector: Option<&str>) -> Result<Vec<Value>> {
        Ok(self.pods.clone())
    }
}

struct FakeCloser(Arc<Notify>);

impl TunnelCloser for FakeCloser {
    fn close(&self) {
        self.0.notify_one();
    }
}

struct FakeHandle {
    finish: Option<oneshot::Receiver<Result<()>>>,
    closed: Arc<Notify>,
}

impl TransportHandle for FakeHandle {
    async fn ready(&mut self) -> Result<()> {
        Ok(())
    }

    async fn wait(&mut self) -> Result<()> {
        let finish = self.finish.take();
        tokio::select! {
            _ = self.closed.notified() => Err(Error::Transport("signal: terminated".into())),
            r = async move {
                match finish {
                    Some(rx) => rx.await.unwrap_or(Ok(())),
                    None => std::future::pending().await,
                }
            } => r,
        }
    }

    fn closer(&self) -> Arc<dyn TunnelCloser> {
        Arc::new(FakeCloser(self.closed.clone()))
    }
}

/// Records every open; each opened tunnel can be ended from the test.
#[derive(Default)]
struct FakeTransport {
    opened: Mutex<Vec<String>>,
    finishers: Mutex<Vec<oneshot::Sender<Result<()>>>>,
}

impl FakeTransport {
    fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    fn end_last(&self, result: Result<()>) {
        let tx = self.finishers.lock().unwrap().pop().unwrap();
        let _ = tx.send(result);
    }
}

impl Transport for FakeTransport {
    type Handle = FakeHandle;

    fn open(
        &self,
        pod: &ResourcePath,
        container: &str,
        tunnels: &[PortTunnel],
    ) -> Result<FakeHandle> {
        assert!(!tunnels.is_empty());
        let (tx, rx) = oneshot::channel();
        self.finishers.lock().unwrap().push(tx);
        self.opened.lock().unwrap().push(format!("{}|{}", pod, container));
        Ok(FakeHandle {
            finish: Some(rx),
            closed: Arc::new(Notify::new()),
        })
    }
}

#[derive(Default)]
struct FakeUi {
    selected: Option<Target>,
    selection: Option<PortSelectionDialog<FakeUi>>,
    confirmation: Option<ConfirmDialog<FakeUi>>,
    infos: Vec<String>,
    errors: Vec<String>,
    dismissed: usize,
    refreshed: usize,
}

impl ForwardUi for FakeUi {
    fn selected_target(&self) -> Option<Target> {
        self.selected.clone()
    }

    fn show_selection(&mut self, dialog: PortSelectionDialog<Self>) {
        self.selection = Some(dialog);
    }

    fn show_confirmation(&mut self, dialog: ConfirmDialog<Self>) {
        self.confirmation = Some(dialog);
    }

    fn dismiss(&mut self) {
        self.dismissed += 1;
    }

    fn flash_info(&mut self, msg: String) {
        self.infos.push(msg);
    }

    fn flash_error(&mut self, err: &Error) {
        self.errors.push(err.to_string());
    }

    fn refresh(&mut self) {
        self.refreshed += 1;
    }
}

// ============================================================================
// Harness
// ============================================================================

type Controller = SessionController<FakeCluster, FakeTransport, FakeUi>;

struct Harness {
    controller: Controller,
    transport: Arc<FakeTransport>,
    registry: Arc<ForwarderRegistry>,
    rx: UiReceiver<FakeUi>,
    app: FakeUi,
}

impl Harness {
    fn new(cluster: FakeCluster) -> Self {
        let transport = Arc::new(FakeTransport::default());
        let registry = Arc::new(ForwarderRegistry::new());
        let (queue, rx) = UiQueue::channel();
        let controller = SessionController::new(
            Arc::new(cluster),
            transport.clone(),
            registry.clone(),
            queue,
            ControllerSettings::default(),
        );
        Self {
            controller,
            transport,
            registry,
            rx,
            app: FakeUi::default(),
        }
    }

    /// Applies queued UI tasks until `done` holds.
    async fn pump_until(&mut self, done: impl Fn(&FakeUi) -> bool) {
        let Self { rx, app, .. } = self;
        timeout(Duration::from_secs(5), async {
            while !done(&*app) {
                let task = rx.recv().await.expect("ui queue closed");
                task(&mut *app);
            }
        })
        .await
        .expect("condition not reached in time");
    }

    /// Applies queued UI tasks until the controller is idle again.
    async fn pump_until_idle(&mut self) {
        let controller = self.controller.clone();
        let Self { rx, app, .. } = self;
        timeout(Duration::from_secs(5), async {
            while controller.flow_state() != FlowState::Idle {
                let task = rx.recv().await.expect("ui queue closed");
                task(&mut *app);
            }
        })
        .await
        .expect("flow did not return to idle");
    }

    fn start(&mut self, tunnels: Vec<PortTunnel>) {
        self.start_on(web_pod(), tunnels);
    }

    fn start_on(&mut self, pod: ResourcePath, tunnels: Vec<PortTunnel>) {
        let selection = PortSelection {
            container: "app".to_string(),
            tunnels,
        };
        self.controller.start(&mut self.app, pod, selection);
    }
}

fn web_pod() -> ResourcePath {
    ResourcePath::new("ns", "web-0")
}

fn web_key() -> SessionKey {
    SessionKey::new(web_pod(), "app")
}

fn free_port() -> u16 {
    TcpListener::bind(("127.0.0.1", 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn activations(app: &FakeUi) -> usize {
    app.infos
        .iter()
        .filter(|m| m.starts_with("PortForward activated"))
        .count()
}

fn activated(app: &FakeUi) -> bool {
    activations(app) > 0
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_start_then_trigger_again_offers_delete() {
    let mut h = Harness::new(FakeCluster::with_web_pod());
    h.app.selected = Some(Target::pod(web_pod()));

    let mut keys = KeyActions::new();
    h.controller.bind_keys(&mut keys);
    assert_eq!(keys.hints(), vec![(KEY_SHIFT_F, "Port-Forward")]);
    let forward = keys.get(KEY_SHIFT_F).unwrap().handler.clone();

    assert!(forward(&mut h.app));
    h.pump_until(|app| app.selection.is_some()).await;
    assert_eq!(h.controller.flow_state(), FlowState::AwaitingPortSelection);

    let dialog = h.app.selection.take().unwrap();
    let rendered: Vec<String> = dialog.candidates.iter().map(|c| c.to_string()).collect();
    assert_eq!(rendered, vec!["app/http:8080"]);
    assert_eq!(dialog.address, "localhost");

    let local = free_port();
    let selection =
        PortSelection::from_candidates(&dialog.candidates, &local.to_string(), "127.0.0.1")
            .unwrap();
    dialog.confirm(&mut h.app, selection);

    h.pump_until(activated).await;
    assert_eq!(
        h.app.infos[0],
        format!("PortForward activated ns/web-0:{}", local)
    );
    assert_eq!(h.registry.len(), 1);
    let session = h.registry.lookup(&web_key()).unwrap();
    assert_eq!(session.key().to_string(), "ns/web-0|app");
    assert!(session.is_active());
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(h.controller.flow_state(), FlowState::Idle);

    // Same pod again: teardown instead of a new start dialog
    assert!(forward(&mut h.app));
    assert!(h.app.selection.is_none());
    let confirm = h.app.confirmation.take().unwrap();
    assert!(confirm.message.starts_with("Delete PortForward ns/web-0?"));
    assert!(confirm.message.contains(&format!("app {}:8080", local)));
    assert_eq!(h.controller.flow_state(), FlowState::AwaitingDeleteConfirmation);

    confirm.confirm(&mut h.app);
    assert!(h.registry.is_empty());
    assert!(!session.is_active());
    assert_eq!(h.app.infos.last().unwrap(), "PortForward ns/web-0 deleted!");

    h.pump_until(|_| session.state() == SessionState::Terminated).await;
    assert!(h.registry.is_empty());
    assert!(h.app.errors.is_empty());
}

#[tokio::test]
async fn test_occupied_port_then_retry() {
    let mut h = Harness::new(FakeCluster::with_web_pod());
    let occupied = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let busy = occupied.local_addr().unwrap().port();

    h.start(vec![PortTunnel::new("127.0.0.1", busy, 8080)]);
    h.pump_until(|app| !app.errors.is_empty()).await;

    assert_eq!(h.app.errors.len(), 1);
    assert!(h.app.errors[0].contains(&format!("127.0.0.1:{}", busy)));
    assert!(h.registry.is_empty());
    assert_eq!(h.transport.open_count(), 0);
    assert_eq!(h.controller.flow_state(), FlowState::Idle);

    h.start(vec![PortTunnel::new("127.0.0.1", free_port(), 8080)]);
    h.pump_until(activated).await;
    assert_eq!(h.registry.len(), 1);
    assert_eq!(h.transport.open_count(), 1);
}

#[tokio::test]
async fn test_any_busy_port_rejects_batch() {
    let mut h = Harness::new(FakeCluster::with_web_pod());
    let occupied = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let busy = occupied.local_addr().unwrap().port();

    h.start(vec![
        PortTunnel::new("127.0.0.1", free_port(), 8080),
        PortTunnel::new("127.0.0.1", free_port(), 8081),
        PortTunnel::new("127.0.0.1", busy, 8082),
    ]);
    h.pump_until_idle().await;

    assert_eq!(h.app.errors.len(), 1);
    assert!(h.registry.is_empty());
    assert_eq!(h.transport.open_count(), 0);
}

#[tokio::test]
async fn test_overlapping_starts_for_one_key_admit_one() {
    let mut h = Harness::new(FakeCluster::with_web_pod());

    // The first start is still validating when the second arrives
    h.start(vec![PortTunnel::new("127.0.0.1", free_port(), 8080)]);
    h.start(vec![PortTunnel::new("127.0.0.1", free_port(), 8080)]);
    assert_eq!(h.controller.pending_starts(), 1);

    h.pump_until(activated).await;
    h.pump_until_idle().await;

    assert_eq!(h.registry.len(), 1);
    assert_eq!(h.transport.open_count(), 1);
    assert_eq!(activations(&h.app), 1);
    assert_eq!(
        h.app.errors,
        vec!["A port-forward is already active on this pod (ns/web-0|app)"]
    );
}

#[tokio::test]
async fn test_starts_for_different_pods_run_side_by_side() {
    let mut h = Harness::new(FakeCluster::with_web_pod());
    let first = free_port();
    let second = free_port();

    h.start_on(web_pod(), vec![PortTunnel::new("127.0.0.1", first, 8080)]);
    h.start_on(
        ResourcePath::new("ns", "web-1"),
        vec![PortTunnel::new("127.0.0.1", second, 8080)],
    );
    assert_eq!(h.controller.flow_state(), FlowState::ValidatingPorts);

    h.pump_until(|app| activations(app) == 2).await;
    h.pump_until_idle().await;

    assert!(h.app.errors.is_empty());
    assert_eq!(h.transport.open_count(), 2);
    assert_eq!(h.registry.len(), 2);
    assert!(h.registry.lookup(&web_key()).unwrap().is_active());
    let other = SessionKey::new(ResourcePath::new("ns", "web-1"), "app");
    assert!(h.registry.lookup(&other).unwrap().is_active());
    assert_eq!(h.controller.pending_starts(), 0);
}

#[tokio::test]
async fn test_duplicate_start_is_rejected() {
    let mut h = Harness::new(FakeCluster::with_web_pod());

    h.start(vec![PortTunnel::new("127.0.0.1", free_port(), 8080)]);
    h.pump_until(activated).await;
    let existing = h.registry.lookup(&web_key()).unwrap();

    h.start(vec![PortTunnel::new("127.0.0.1", free_port(), 8080)]);
    h.pump_until(|app| !app.errors.is_empty()).await;

    assert_eq!(
        h.app.errors,
        vec!["A port-forward is already active on this pod (ns/web-0|app)"]
    );
    assert_eq!(h.transport.open_count(), 1);
    assert_eq!(h.registry.lookup(&web_key()).unwrap().id(), existing.id());
    assert!(existing.is_active());
}

#[tokio::test]
async fn test_delete_confirmation_spares_newer_session() {
    let mut h = Harness::new(FakeCluster::with_web_pod());
    h.start(vec![PortTunnel::new("127.0.0.1", free_port(), 8080)]);
    h.pump_until(activated).await;
    let old = h.registry.lookup(&web_key()).unwrap();

    h.controller.trigger(&mut h.app, Target::pod(web_pod()));
    let confirm = h.app.confirmation.take().unwrap();

    // The listed session ends on its own and a new one takes the key
    h.transport.end_last(Ok(()));
    h.pump_until(|_| old.state() == SessionState::Terminated).await;
    h.start(vec![PortTunnel::new("127.0.0.1", free_port(), 8080)]);
    h.pump_until(|app| activations(app) == 2).await;
    let newer = h.registry.lookup(&web_key()).unwrap();
    assert_ne!(newer.id(), old.id());

    confirm.confirm(&mut h.app);

    let current = h.registry.lookup(&web_key()).unwrap();
    assert_eq!(current.id(), newer.id());
    assert!(newer.is_active());
    assert!(!newer.close_requested());
    assert_eq!(newer.state(), SessionState::Active);
}

#[tokio::test]
async fn test_transport_error_cleans_up() {
    let mut h = Harness::new(FakeCluster::with_web_pod());
    h.start(vec![PortTunnel::new("127.0.0.1", free_port(), 8080)]);
    h.pump_until(activated).await;
    let session = h.registry.lookup(&web_key()).unwrap();

    h.transport
        .end_last(Err(Error::Transport("lost connection to pod".into())));
    h.pump_until(|app| !app.errors.is_empty()).await;

    assert_eq!(h.app.errors, vec!["port-forward failed: lost connection to pod"]);
    assert!(h.registry.is_empty());
    assert!(!session.is_active());
    assert_eq!(session.state(), SessionState::Terminated);
}

#[tokio::test]
async fn test_normal_close_cleans_up() {
    let mut h = Harness::new(FakeCluster::with_web_pod());
    h.start(vec![PortTunnel::new("127.0.0.1", free_port(), 8080)]);
    h.pump_until(activated).await;
    let session = h.registry.lookup(&web_key()).unwrap();

    h.transport.end_last(Ok(()));
    h.pump_until(|app| app.infos.len() == 2).await;

    assert_eq!(h.app.infos[1], "PortForward ns/web-0|app closed");
    assert!(h.app.errors.is_empty());
    assert!(h.registry.is_empty());
    assert!(!session.is_active());
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let mut h = Harness::new(FakeCluster::with_web_pod());
    h.start(vec![PortTunnel::new("127.0.0.1", free_port(), 8080)]);
    h.pump_until(activated).await;

    assert!(h.controller.stop(&web_key()).is_ok());
    let again = h.controller.stop(&web_key()).unwrap_err();
    assert!(again.is_benign());
    let again = h.controller.stop(&web_key()).unwrap_err();
    assert!(again.is_benign());
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_deployment_resolves_to_running_pod() {
    let mut cluster = FakeCluster::with_web_pod();
    cluster.insert(
        ResourceKind::Deployment,
        "ns",
        "web",
        json!({"spec": {"selector": {"matchLabels": {"app": "web"}}}}),
    );
    let mut h = Harness::new(cluster);

    let target = Target::new(ResourceKind::Deployment, ResourcePath::new("ns", "web"));
    h.controller.trigger(&mut h.app, target);
    h.pump_until(|app| app.selection.is_some()).await;

    let dialog = h.app.selection.take().unwrap();
    assert_eq!(dialog.pod, web_pod());
}

#[tokio::test]
async fn test_unsupported_kind_fails_before_dialog() {
    let mut h = Harness::new(FakeCluster::with_web_pod());
    let target = Target::new(
        ResourceKind::Other("configmaps".to_string()),
        ResourcePath::new("ns", "settings"),
    );

    h.controller.trigger(&mut h.app, target);

    assert_eq!(h.app.errors.len(), 1);
    assert!(h.app.selection.is_none());
    assert_eq!(h.controller.flow_state(), FlowState::Idle);
}

#[tokio::test]
async fn test_missing_pod_surfaces_fetch_error() {
    let mut h = Harness::new(FakeCluster::default());
    h.controller
        .trigger(&mut h.app, Target::pod(ResourcePath::new("ns", "gone")));
    h.pump_until_idle().await;

    assert_eq!(h.app.errors.len(), 1);
    assert!(h.app.selection.is_none());
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_cancel_returns_to_idle() {
    let mut h = Harness::new(FakeCluster::with_web_pod());
    h.controller.trigger(&mut h.app, Target::pod(web_pod()));
    h.pump_until(|app| app.selection.is_some()).await;

    let dialog = h.app.selection.take().unwrap();
    dialog.cancel(&mut h.app);

    assert_eq!(h.controller.flow_state(), FlowState::Idle);
    assert!(h.app.errors.is_empty());
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_retrigger_drops_stale_flow() {
    let mut h = Harness::new(FakeCluster::with_web_pod());
    h.controller.trigger(&mut h.app, Target::pod(web_pod()));
    h.pump_until(|app| app.selection.is_some()).await;
    let stale = h.app.selection.take().unwrap();

    h.controller.trigger(&mut h.app, Target::pod(web_pod()));
    h.pump_until(|app| app.selection.is_some()).await;

    // Confirming the abandoned dialog does nothing
    let selection = PortSelection::from_candidates(
        &stale.candidates,
        &free_port().to_string(),
        "127.0.0.1",
    )
    .unwrap();
    stale.confirm(&mut h.app, selection);
    assert_eq!(h.controller.flow_state(), FlowState::AwaitingPortSelection);
    assert_eq!(h.transport.open_count(), 0);
}
