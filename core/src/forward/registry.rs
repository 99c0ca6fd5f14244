//! Forwarder registry: the one shared map of live tunnel sessions.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::session::{ForwardSnapshot, TunnelSession};
use crate::domain::{ResourcePath, SessionKey};
use crate::error::{Error, Result};

/// Concurrency-safe store of tunnel sessions keyed by [`SessionKey`].
///
/// Every mutation happens under one write lock, so all callers observe a
/// single order of adds and deletes. Entries whose session is no longer
/// live are treated as absent.
#[derive(Debug, Default)]
pub struct ForwarderRegistry {
    sessions: RwLock<HashMap<SessionKey, Arc<TunnelSession>>>,
}

impl ForwarderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `session` unless a live session already holds its key.
    pub fn add(&self, session: Arc<TunnelSession>) -> Result<()> {
        let mut sessions = self.sessions.write();

        if let Some(existing) = sessions.get(session.key()) {
            if existing.state().is_live() {
                return Err(Error::DuplicateSession(session.key().clone()));
            }
        }

        debug!(key = %session.key(), id = %session.id(), "Registered port-forward");
        sessions.insert(session.key().clone(), session);
        Ok(())
    }

    /// Removes and returns the entry for `key`.
    ///
    /// An absent key yields [`Error::NotFound`], which callers may ignore.
    pub fn delete(&self, key: &SessionKey) -> Result<Arc<TunnelSession>> {
        let removed = self.sessions.write().remove(key);
        match removed {
            Some(session) => {
                debug!(key = %key, "Removed port-forward");
                Ok(session)
            }
            None => Err(Error::NotFound(key.clone())),
        }
    }

    /// Removes the entry only if it still belongs to `session`.
    ///
    /// A runner finishing late must not evict a newer session that reused
    /// the key.
    pub fn delete_session(&self, session: &TunnelSession) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(session.key()) {
            Some(current) if current.id() == session.id() => {
                sessions.remove(session.key());
                debug!(key = %session.key(), "Removed port-forward");
                true
            }
            _ => false,
        }
    }

    /// Returns the live session for `key`.
    pub fn lookup(&self, key: &SessionKey) -> Option<Arc<TunnelSession>> {
        self.sessions
            .read()
            .get(key)
            .filter(|s| s.state().is_live())
            .cloned()
    }

    /// Returns every live session on `pod`, ordered by key.
    pub fn all_for_pod(&self, pod: &ResourcePath) -> Vec<Arc<TunnelSession>> {
        let mut found: Vec<_> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.pod() == pod && s.state().is_live())
            .cloned()
            .collect();
        found.sort_by(|a, b| a.key().cmp(b.key()));
        found
    }

    /// Every registered session, ordered by key.
    pub fn sessions(&self) -> Vec<Arc<TunnelSession>> {
        let mut all: Vec<_> = self.sessions.read().values().cloned().collect();
        all.sort_by(|a, b| a.key().cmp(b.key()));
        all
    }

    /// Read-only rendering of the registry contents.
    pub fn snapshot(&self) -> Vec<ForwardSnapshot> {
        self.sessions().iter().map(|s| s.snapshot()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
