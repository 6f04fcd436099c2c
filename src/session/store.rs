//! Session persistence: trait plus Redis and in-memory backends.
//!
//! Writes fully replace the record (last-writer-wins); callers serialize
//! load-modify-store per identity (see `bot::Bot`). Absence of a record is
//! the legitimate default state, not an error.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::SessionError;
use crate::session::model::Session;

const KEY_PREFIX: &str = "carepod:session:";

/// Durable, TTL-bounded key-value store for one active session per identity.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a session. Every read extends the TTL by the store's default.
    async fn get(&self, identity: &str) -> Result<Option<Session>, SessionError>;

    /// Store a session with the given TTL, replacing any existing record.
    async fn put(&self, identity: &str, session: &Session, ttl: Duration)
    -> Result<(), SessionError>;

    /// Remove a session.
    async fn delete(&self, identity: &str) -> Result<(), SessionError>;

    /// All currently-live sessions.
    async fn list_active(&self) -> Result<Vec<Session>, SessionError>;

    /// Drop expired sessions, returning how many were removed. Backends
    /// with native TTL expiry may report zero.
    async fn purge_expired(&self) -> Result<usize, SessionError>;
}

// ── In-memory backend ───────────────────────────────────────────────

/// In-memory session store for tests and single-process development.
pub struct MemorySessionStore {
    default_ttl: Duration,
    inner: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            inner: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, identity: &str) -> Result<Option<Session>, SessionError> {
        let mut map = self.inner.write().await;
        match map.get_mut(identity) {
            Some(session) if session.is_expired(Utc::now()) => {
                map.remove(identity);
                Ok(None)
            }
            Some(session) => {
                session.touch(self.default_ttl);
                Ok(Some(session.clone()))
            }
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        identity: &str,
        session: &Session,
        ttl: Duration,
    ) -> Result<(), SessionError> {
        let mut stored = session.clone();
        stored.touch(ttl);
        self.inner
            .write()
            .await
            .insert(identity.to_string(), stored);
        Ok(())
    }

    async fn delete(&self, identity: &str) -> Result<(), SessionError> {
        self.inner.write().await.remove(identity);
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Session>, SessionError> {
        let now = Utc::now();
        Ok(self
            .inner
            .read()
            .await
            .values()
            .filter(|s| !s.is_expired(now))
            .cloned()
            .collect())
    }

    async fn purge_expired(&self) -> Result<usize, SessionError> {
        let now = Utc::now();
        let mut map = self.inner.write().await;
        let before = map.len();
        map.retain(|_, s| !s.is_expired(now));
        Ok(before - map.len())
    }
}

// ── Redis backend ───────────────────────────────────────────────────

/// Redis-backed session store. Records are JSON under `carepod:session:*`
/// with a native TTL; reads re-arm the TTL via EXPIRE.
pub struct RedisSessionStore {
    client: redis::Client,
    default_ttl: Duration,
}

impl RedisSessionStore {
    pub fn new(redis_url: &str, default_ttl: Duration) -> Result<Self, SessionError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| SessionError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            default_ttl,
        })
    }

    async fn conn(&self) -> Result<redis::aio::Connection, SessionError> {
        self.client
            .get_async_connection()
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))
    }

    fn key(identity: &str) -> String {
        format!("{KEY_PREFIX}{identity}")
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, identity: &str) -> Result<Option<Session>, SessionError> {
        use redis::AsyncCommands;

        let mut conn = self.conn().await?;
        let key = Self::key(identity);
        let raw: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;

        let Some(raw) = raw else { return Ok(None) };

        let mut session: Session =
            serde_json::from_str(&raw).map_err(|e| SessionError::Serialization {
                identity: identity.to_string(),
                reason: e.to_string(),
            })?;
        session.touch(self.default_ttl);

        // Re-arm the native TTL to match.
        let _: () = conn
            .expire(&key, self.default_ttl.as_secs() as usize)
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;

        Ok(Some(session))
    }

    async fn put(
        &self,
        identity: &str,
        session: &Session,
        ttl: Duration,
    ) -> Result<(), SessionError> {
        use redis::AsyncCommands;

        let mut stored = session.clone();
        stored.touch(ttl);
        let json = serde_json::to_string(&stored).map_err(|e| SessionError::Serialization {
            identity: identity.to_string(),
            reason: e.to_string(),
        })?;

        let mut conn = self.conn().await?;
        let _: () = conn
            .set_ex(Self::key(identity), json, ttl.as_secs() as usize)
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, identity: &str) -> Result<(), SessionError> {
        use redis::AsyncCommands;

        let mut conn = self.conn().await?;
        let _: () = conn
            .del(Self::key(identity))
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Session>, SessionError> {
        use redis::AsyncCommands;

        let mut conn = self.conn().await?;
        let keys: Vec<String> = conn
            .keys(format!("{KEY_PREFIX}*"))
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;

        let mut sessions = Vec::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = conn
                .get(&key)
                .await
                .map_err(|e| SessionError::Backend(e.to_string()))?;
            if let Some(raw) = raw
                && let Ok(session) = serde_json::from_str::<Session>(&raw)
            {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }

    async fn purge_expired(&self) -> Result<usize, SessionError> {
        // Redis expires keys natively; nothing to do.
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemorySessionStore {
        MemorySessionStore::new(Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn absent_session_is_none() {
        assert!(store().get("+254700000001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let store = store();
        let session = Session::new("+254700000001", Duration::from_secs(3600));
        store
            .put("+254700000001", &session, Duration::from_secs(3600))
            .await
            .unwrap();

        let loaded = store.get("+254700000001").await.unwrap().unwrap();
        assert_eq!(loaded.identity, "+254700000001");
        assert_eq!(loaded.state, session.state);
    }

    #[tokio::test]
    async fn get_extends_ttl() {
        let store = store();
        let session = Session::new("+254700000001", Duration::from_secs(1));
        store
            .put("+254700000001", &session, Duration::from_secs(1))
            .await
            .unwrap();

        let loaded = store.get("+254700000001").await.unwrap().unwrap();
        // Read re-armed the expiry to the store default (1 hour).
        assert!(loaded.expires_at > Utc::now() + chrono::Duration::minutes(30));
    }

    #[tokio::test]
    async fn expired_sessions_are_purged() {
        let store = store();
        let mut session = Session::new("+254700000001", Duration::from_secs(3600));
        session.expires_at = Utc::now() - chrono::Duration::seconds(1);
        store
            .inner
            .write()
            .await
            .insert("+254700000001".into(), session);

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.get("+254700000001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_session_reads_as_absent() {
        let store = store();
        let mut session = Session::new("+254700000001", Duration::from_secs(3600));
        session.expires_at = Utc::now() - chrono::Duration::seconds(1);
        store
            .inner
            .write()
            .await
            .insert("+254700000001".into(), session);

        assert!(store.get("+254700000001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_session() {
        let store = store();
        let session = Session::new("+254700000001", Duration::from_secs(3600));
        store
            .put("+254700000001", &session, Duration::from_secs(3600))
            .await
            .unwrap();
        store.delete("+254700000001").await.unwrap();
        assert!(store.get("+254700000001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_active_skips_expired() {
        let store = store();
        let live = Session::new("+254700000001", Duration::from_secs(3600));
        store
            .put("+254700000001", &live, Duration::from_secs(3600))
            .await
            .unwrap();

        let mut dead = Session::new("+254700000002", Duration::from_secs(3600));
        dead.expires_at = Utc::now() - chrono::Duration::seconds(1);
        store
            .inner
            .write()
            .await
            .insert("+254700000002".into(), dead);

        let active = store.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].identity, "+254700000001");
    }
}
