use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Result, TetherError};
use crate::mux::MuxSession;

/// Everything the registry knows about one live agent besides its session
/// handle. Kept separate from [`MuxSession`] so [`Registry::snapshot`] can
/// hand out copies without exposing the live handle.
#[derive(Debug, Clone)]
pub struct AgentMeta {
    pub external_ip: String,
    pub local_ips: Vec<String>,
}

struct AgentRecord {
    session: MuxSession,
    meta: AgentMeta,
}

/// Process-wide mapping from agent identifier to live session. Guarded by a
/// single read/write lock: lookups never block other lookups; inserts and
/// deletes block everything else briefly. No operation here ever awaits
/// while holding the lock.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<HashMap<String, AgentRecord>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a freshly accepted agent session. Fails with
    /// [`TetherError::Collision`] if the identifier is already live.
    pub fn insert(&self, id: String, session: MuxSession, meta: AgentMeta) -> Result<()> {
        let mut guard = self.inner.write().expect("registry lock poisoned");
        if guard.contains_key(&id) {
            return Err(TetherError::Collision(id));
        }
        guard.insert(id, AgentRecord { session, meta });
        Ok(())
    }

    /// Idempotent removal; does not error if the identifier is absent.
    pub fn remove(&self, id: &str) {
        self.inner.write().expect("registry lock poisoned").remove(id);
    }

    /// Returns a clone of the live session handle for `id`, or
    /// [`TetherError::NotFound`].
    pub fn session(&self, id: &str) -> Result<MuxSession> {
        let guard = self.inner.read().expect("registry lock poisoned");
        guard
            .get(id)
            .map(|rec| rec.session.clone())
            .ok_or_else(|| TetherError::NotFound(id.to_string()))
    }

    /// Point-in-time copy of every live entry's metadata.
    pub fn snapshot(&self) -> HashMap<String, AgentMeta> {
        let guard = self.inner.read().expect("registry lock poisoned");
        guard
            .iter()
            .map(|(id, rec)| (id.clone(), rec.meta.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mux::tests::dummy_session;

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let registry = Registry::new();
        let meta = AgentMeta {
            external_ip: "127.0.0.1".into(),
            local_ips: vec![],
        };
        registry
            .insert("a1".into(), dummy_session(), meta.clone())
            .unwrap();
        let err = registry.insert("a1".into(), dummy_session(), meta).unwrap_err();
        assert!(matches!(err, TetherError::Collision(_)));
        assert!(registry.session("a1").is_ok());
    }

    #[tokio::test]
    async fn remove_then_lookup_not_found() {
        let registry = Registry::new();
        let meta = AgentMeta {
            external_ip: "10.0.0.1".into(),
            local_ips: vec!["192.168.1.5".into()],
        };
        registry.insert("a2".into(), dummy_session(), meta).unwrap();
        registry.remove("a2");
        assert!(matches!(registry.session("a2"), Err(TetherError::NotFound(_))));
        // idempotent
        registry.remove("a2");
    }

    #[tokio::test]
    async fn snapshot_is_independent_copy() {
        let registry = Registry::new();
        let meta = AgentMeta {
            external_ip: "1.2.3.4".into(),
            local_ips: vec!["10.0.0.1".into(), "10.0.0.2".into()],
        };
        registry.insert("a3".into(), dummy_session(), meta).unwrap();
        let snap = registry.snapshot();
        registry.remove("a3");
        assert_eq!(snap.len(), 1);
        assert_eq!(snap["a3"].local_ips.len(), 2);
        assert!(registry.snapshot().is_empty());
    }
}
