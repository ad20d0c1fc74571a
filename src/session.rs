//! In-memory admin sessions keyed by a random id.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Authenticated admin attached to a request by the auth gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminIdentity {
    pub username: String,
}

#[derive(Clone, Debug)]
struct SessionEntry {
    admin: AdminIdentity,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    ttl: Duration,
    secure: bool,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            secure: false,
        }
    }

    /// Mark issued cookies `Secure`.
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn secure_cookies(&self) -> bool {
        self.secure
    }

    pub fn create(&self, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        let entry = SessionEntry {
            admin: AdminIdentity {
                username: username.to_string(),
            },
            expires_at: Instant::now() + self.ttl,
        };
        self.write().insert(id, entry);
        tracing::debug!(username = %username, "session created");
        id
    }

    /// Identity for a live session. Expired entries are removed on lookup.
    pub fn resolve(&self, id: &Uuid) -> Option<AdminIdentity> {
        let now = Instant::now();
        {
            let sessions = self.read();
            match sessions.get(id) {
                None => return None,
                Some(entry) if entry.expires_at > now => return Some(entry.admin.clone()),
                Some(_) => {}
            }
        }
        self.write().remove(id);
        None
    }

    pub fn revoke(&self, id: &Uuid) -> bool {
        self.write().remove(id).is_some()
    }

    /// Drop every session of `username`. Returns how many were removed.
    pub fn revoke_user(&self, username: &str) -> usize {
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, e| e.admin.username != username);
        before - sessions.len()
    }

    /// Remove expired sessions. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, e| e.expires_at > now);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, SessionEntry>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, SessionEntry>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_resolve_revoke() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.create("admin");
        assert_eq!(store.resolve(&id).map(|a| a.username), Some("admin".to_string()));
        assert!(store.resolve(&Uuid::new_v4()).is_none());
        assert!(store.revoke(&id));
        assert!(store.resolve(&id).is_none());
        assert!(!store.revoke(&id));
    }

    #[test]
    fn expired_sessions_do_not_resolve() {
        let store = SessionStore::new(Duration::ZERO);
        let id = store.create("admin");
        assert!(store.resolve(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn prune_and_revoke_user() {
        let expired = SessionStore::new(Duration::ZERO);
        expired.create("a");
        expired.create("b");
        assert_eq!(expired.prune(), 2);

        let store = SessionStore::new(Duration::from_secs(60));
        store.create("a");
        store.create("a");
        let keep = store.create("b");
        assert_eq!(store.revoke_user("a"), 2);
        assert_eq!(store.len(), 1);
        assert!(store.resolve(&keep).is_some());
    }
}
