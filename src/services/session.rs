//! Admin sign-in sessions
//!
//! A successful password sign-in is kept server-side under an opaque id that
//! travels in the session cookie. The store lives in `AppState`; listeners
//! call `subscribe` to hear about sign-ins and sign-outs and stop listening by
//! dropping the receiver.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use moka::future::Cache;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::platform::{AuthSession, AuthUser};

/// Capacity of the session event channel; slow listeners miss older events
const EVENT_CHANNEL_CAPACITY: usize = 64;
const MAX_SESSIONS: u64 = 10_000;

/// A signed-in admin
#[derive(Debug, Clone, Serialize)]
pub struct AdminSession {
    /// Opaque id carried by the cookie
    #[serde(skip)]
    pub id: String,
    #[serde(skip)]
    pub access_token: String,
    #[serde(skip)]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AdminSession {
    /// Wrap platform tokens. The session ends at the token's own expiry or
    /// after `max_ttl`, whichever comes first.
    pub fn from_auth(auth: AuthSession, max_ttl: std::time::Duration) -> Self {
        let now = Utc::now();
        let ttl = Duration::from_std(max_ttl).unwrap_or_else(|_| Duration::days(7));
        let token_ttl = auth
            .expires_in
            .filter(|s| *s > 0)
            .map(Duration::seconds)
            .unwrap_or(ttl);
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            access_token: auth.access_token,
            refresh_token: auth.refresh_token,
            user: auth.user,
            created_at: now,
            expires_at: now + token_ttl.min(ttl),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Session lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { session_id: String, user_id: String },
    SignedOut { session_id: String, user_id: String },
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Live session for a cookie id; expired sessions are dropped
    async fn get(&self, id: &str) -> Option<AdminSession>;

    async fn insert(&self, session: AdminSession);

    async fn remove(&self, id: &str) -> Option<AdminSession>;

    /// Receive future session events until the receiver is dropped
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

/// In-memory session store backed by a moka TTL cache
pub struct MemorySessionStore {
    sessions: Cache<String, AdminSession>,
    events: broadcast::Sender<SessionEvent>,
}

impl MemorySessionStore {
    pub fn new(ttl: std::time::Duration) -> Self {
        let sessions = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_live(ttl)
            .build();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sessions, events }
    }

    fn publish(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &str) -> Option<AdminSession> {
        let session = self.sessions.get(id).await?;
        if session.is_expired() {
            self.sessions.invalidate(id).await;
            return None;
        }
        Some(session)
    }

    async fn insert(&self, session: AdminSession) {
        let event = SessionEvent::SignedIn {
            session_id: session.id.clone(),
            user_id: session.user.id.clone(),
        };
        self.sessions.insert(session.id.clone(), session).await;
        self.publish(event);
    }

    async fn remove(&self, id: &str) -> Option<AdminSession> {
        let removed = self.sessions.remove(id).await?;
        self.publish(SessionEvent::SignedOut {
            session_id: removed.id.clone(),
            user_id: removed.user.id.clone(),
        });
        Some(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_session(expires_in: Option<i64>) -> AuthSession {
        AuthSession {
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            expires_in,
            user: AuthUser {
                id: "u1".into(),
                email: Some("eic@school.edu".into()),
                user_metadata: serde_json::Value::Null,
            },
        }
    }

    #[test]
    fn test_expiry_is_the_shorter_lifetime() {
        let week = std::time::Duration::from_secs(7 * 24 * 3600);
        let session = AdminSession::from_auth(auth_session(Some(3600)), week);
        let lifetime = session.expires_at - session.created_at;
        assert_eq!(lifetime, Duration::seconds(3600));

        let session = AdminSession::from_auth(auth_session(None), std::time::Duration::from_secs(60));
        assert_eq!(session.expires_at - session.created_at, Duration::seconds(60));
        assert_eq!(session.id.len(), 32);
    }

    #[tokio::test]
    async fn test_insert_get_remove_with_events() {
        let store = MemorySessionStore::new(std::time::Duration::from_secs(60));
        let mut events = store.subscribe();

        let session = AdminSession::from_auth(auth_session(Some(600)), std::time::Duration::from_secs(60));
        let id = session.id.clone();
        store.insert(session).await;

        assert_eq!(store.get(&id).await.unwrap().access_token, "at");
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::SignedIn { session_id: id.clone(), user_id: "u1".into() }
        );

        assert!(store.remove(&id).await.is_some());
        assert!(store.get(&id).await.is_none());
        assert!(store.remove(&id).await.is_none());
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::SignedOut { session_id: id, user_id: "u1".into() }
        );
    }

    #[tokio::test]
    async fn test_expired_session_is_dropped() {
        let store = MemorySessionStore::new(std::time::Duration::from_secs(60));
        let mut session =
            AdminSession::from_auth(auth_session(Some(600)), std::time::Duration::from_secs(60));
        session.expires_at = Utc::now() - Duration::seconds(1);
        let id = session.id.clone();
        store.insert(session).await;

        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_receiver_unsubscribes() {
        let store = MemorySessionStore::new(std::time::Duration::from_secs(60));
        let receiver = store.subscribe();
        assert_eq!(store.events.receiver_count(), 1);
        drop(receiver);
        assert_eq!(store.events.receiver_count(), 0);

        // Publishing with no listeners must not fail.
        store
            .insert(AdminSession::from_auth(auth_session(None), std::time::Duration::from_secs(60)))
            .await;
    }
}
