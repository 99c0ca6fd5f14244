//! Tunnel session: one running forward and its lifecycle flags.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::{PortTunnel, ResourcePath, SessionKey};
use crate::error::{Error, Result};
use crate::ports::TunnelCloser;

/// Lifecycle of a session, observable through [`TunnelSession::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Starting,
    Active,
    Terminating,
    Terminated,
}

impl SessionState {
    /// Live sessions count towards key uniqueness.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Starting | Self::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "Starting",
            Self::Active => "Active",
            Self::Terminating => "Terminating",
            Self::Terminated => "Terminated",
        };
        f.write_str(s)
    }
}

/// One port-forward between local listeners and a pod container.
pub struct TunnelSession {
    id: Uuid,
    key: SessionKey,
    tunnels: Vec<PortTunnel>,
    started_at: Instant,
    active: AtomicBool,
    close_requested: AtomicBool,
    retired: AtomicBool,
    state: watch::Sender<SessionState>,
    closer: Arc<dyn TunnelCloser>,
}

impl TunnelSession {
    /// Creates a session in the `Starting` state. `tunnels` must be non-empty.
    pub fn new(
        key: SessionKey,
        tunnels: Vec<PortTunnel>,
        closer: Arc<dyn TunnelCloser>,
    ) -> Result<Self> {
        if tunnels.is_empty() {
            return Err(Error::InvalidPortSpec(format!("no ports to forward for {}", key)));
        }

        let (state, _) = watch::channel(SessionState::Starting);
        Ok(Self {
            id: Uuid::new_v4(),
            key,
            tunnels,
            started_at: Instant::now(),
            active: AtomicBool::new(false),
            close_requested: AtomicBool::new(false),
            retired: AtomicBool::new(false),
            state,
            closer,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn pod(&self) -> &ResourcePath {
        self.key.pod()
    }

    pub fn container(&self) -> &str {
        self.key.container()
    }

    pub fn tunnels(&self) -> &[PortTunnel] {
        &self.tunnels
    }

    pub fn age(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Waits until the session has been retired.
    pub async fn terminated(&self) {
        let mut rx = self.subscribe();
        // The sender lives in self, so wait_for cannot observe a closed channel
        let _ = rx.wait_for(|s| *s == SessionState::Terminated).await;
    }

    /// Requests the transport to close. Only the first call reaches the
    /// transport; the runner performs cleanup once it observes the close.
    pub fn close(&self) {
        if !self.close_requested.swap(true, Ordering::SeqCst) {
            self.closer.close();
        }
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested.load(Ordering::SeqCst)
    }

    /// Claims the one-time retirement. Returns true for the first caller only.
    pub(crate) fn retire(&self) -> bool {
        !self.retired.swap(true, Ordering::SeqCst)
    }

    /// Port mappings as `local:remote`, comma separated.
    pub fn ports_summary(&self) -> String {
        self.tunnels
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn snapshot(&self) -> ForwardSnapshot {
        let first = &self.tunnels[0];
        ForwardSnapshot {
            key: self.key.to_string(),
            pod: self.pod().to_string(),
            container: self.container().to_string(),
            address: first.address.clone(),
            ports: self.ports_summary(),
            state: self.state(),
            active: self.is_active(),
            age_secs: self.age().as_secs(),
        }
    }
}

impl fmt::Debug for TunnelSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelSession")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("tunnels", &self.tunnels)
            .field("state", &self.state())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Read-only view of a session for the active-forwards listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardSnapshot {
    pub key: String,
    pub pod: String,
    pub container: String,
    pub address: String,
    pub ports: String,
    pub state: SessionState,
    pub active: bool,
    pub age_secs: u64,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    pub(crate) struct CountingCloser(pub AtomicUsize);

    impl TunnelCloser for CountingCloser {
        fn close(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn session(pod: &str, container: &str, local: u16) -> TunnelSession {
        let (ns, name) = pod.split_once('/').unwrap();
        TunnelSession::new(
            SessionKey::new(ResourcePath::new(ns, name), container),
            vec![PortTunnel::new("127.0.0.1", local, 8080)],
            Arc::new(CountingCloser::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_new_session_is_starting_and_inactive() {
        let s = session("ns/web-0", "app", 9090);
        assert_eq!(s.state(), SessionState::Starting);
        assert!(!s.is_active());
        assert_eq!(s.key().to_string(), "ns/web-0|app");
        assert_eq!(s.ports_summary(), "9090:8080");
    }

    #[test]
    fn test_empty_tunnels_rejected() {
        let result = TunnelSession::new(
            SessionKey::new(ResourcePath::new("ns", "web-0"), "app"),
            Vec::new(),
            Arc::new(CountingCloser::default()),
        );
        assert!(matches!(result, Err(Error::InvalidPortSpec(_))));
    }

    #[test]
    fn test_close_reaches_transport_once() {
        let closer = Arc::new(CountingCloser::default());
        let s = TunnelSession::new(
            SessionKey::new(ResourcePath::new("ns", "web-0"), "app"),
            vec![PortTunnel::new("127.0.0.1", 9090, 8080)],
            closer.clone(),
        )
        .unwrap();

        s.close();
        s.close();
        assert!(s.close_requested());
        assert_eq!(closer.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retire_once() {
        let s = session("ns/web-0", "app", 9090);
        assert!(s.retire());
        assert!(!s.retire());
    }

    #[tokio::test]
    async fn test_terminated_wakes_waiter() {
        let s = Arc::new(session("ns/web-0", "app", 9090));
        let waiter = tokio::spawn({
            let s = s.clone();
            async move { s.terminated().await }
        });

        s.set_state(SessionState::Active);
        s.set_state(SessionState::Terminated);
        waiter.await.unwrap();
        assert!(!s.state().is_live());
    }

    #[test]
    fn test_terminated_stays_pending_while_live() {
        use tokio_test::{assert_pending, assert_ready, task};

        let s = session("ns/web-0", "app", 9090);
        let mut waiter = task::spawn(s.terminated());
        assert_pending!(waiter.poll());

        s.set_state(SessionState::Active);
        assert_pending!(waiter.poll());

        s.set_state(SessionState::Terminating);
        assert_pending!(waiter.poll());

        s.set_state(SessionState::Terminated);
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
    }
}
