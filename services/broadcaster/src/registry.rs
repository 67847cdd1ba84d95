//! Connection registry: the set of live viewer sessions.
//!
//! The lock is held only to insert, remove, or copy membership. Pushes run on
//! a snapshot, never under the lock.

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push channel closed")]
    Closed,
    #[error("push failed: {0}")]
    Transport(#[from] axum::Error),
}

/// Server-to-viewer half of a session's transport.
pub trait PushChannel: Send + Sync {
    /// Send one UTF-8 text frame.
    fn push(&self, payload: Arc<str>) -> BoxFuture<'_, Result<(), PushError>>;
}

/// Registry entry for one viewer.
#[derive(Clone)]
pub struct SessionHandle {
    pub channel: Arc<dyn PushChannel>,
    pub joined_at: DateTime<Utc>,
    /// Cancelled when the session leaves the registry; the owning session
    /// task tears its transport down when it observes this.
    pub closed: CancellationToken,
}

impl SessionHandle {
    pub fn new(channel: Arc<dyn PushChannel>) -> Self {
        Self {
            channel,
            joined_at: Utc::now(),
            closed: CancellationToken::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    sessions: Arc<RwLock<HashMap<ConnectionId, SessionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, session: SessionHandle) -> ConnectionId {
        let id = ConnectionId::new();
        self.sessions.write().await.insert(id, session);
        id
    }

    /// Remove a session and signal its owner to close. Returns `false` if the
    /// session was already gone.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.sessions.write().await.remove(&id);
        match removed {
            Some(session) => {
                session.closed.cancel();
                true
            }
            None => false,
        }
    }

    /// Copy of current membership, safe to iterate while sessions come and go.
    pub async fn snapshot(&self) -> Vec<(ConnectionId, Arc<dyn PushChannel>)> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(id, session)| (*id, Arc::clone(&session.channel)))
            .collect()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    pub async fn joined_at(&self, id: ConnectionId) -> Option<DateTime<Utc>> {
        self.sessions.read().await.get(&id).map(|s| s.joined_at)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
