//! Advisory per-user session bookkeeping
//!
//! Sessions only record that a user has an active conversation and when
//! they were last seen. Nothing in the relay depends on an entry being
//! present, so the store may lose entries at any time (eviction, restart).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

/// A user's conversation liveness marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub conversation_started: bool,
    pub last_activity: DateTime<Utc>,
}

impl UserSession {
    fn started_now() -> Self {
        Self {
            conversation_started: true,
            last_activity: Utc::now(),
        }
    }
}

/// Key-value store mapping user ids to sessions
///
/// Implementations must tolerate concurrent calls from many requests.
pub trait SessionStore: Send + Sync {
    /// Record activity for `user_id`, creating the session if needed
    fn touch(&self, user_id: &str) -> UserSession;

    /// Get a session if it exists
    fn get(&self, user_id: &str) -> Option<UserSession>;

    /// Remove a session entirely
    fn remove(&self, user_id: &str) -> Option<UserSession>;

    /// Number of tracked sessions
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every session
    fn clear(&self);
}

/// Bounded in-memory session store using DashMap
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<String, UserSession>>,
    max_sessions: usize,
}

impl InMemorySessionStore {
    /// Create a store holding at most `max_sessions` entries
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Evict the least recently active session
    fn evict_oldest(&self) {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.value().last_activity)
            .map(|entry| entry.key().clone());

        if let Some(user_id) = oldest {
            self.sessions.remove(&user_id);
            debug!("Evicted session for {}", user_id);
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl SessionStore for InMemorySessionStore {
    fn touch(&self, user_id: &str) -> UserSession {
        if let Some(mut session) = self.sessions.get_mut(user_id) {
            session.conversation_started = true;
            session.last_activity = Utc::now();
            return session.clone();
        }

        while self.sessions.len() >= self.max_sessions {
            self.evict_oldest();
        }

        let session = UserSession::started_now();
        self.sessions.insert(user_id.to_string(), session.clone());
        session
    }

    fn get(&self, user_id: &str) -> Option<UserSession> {
        self.sessions.get(user_id).map(|s| s.clone())
    }

    fn remove(&self, user_id: &str) -> Option<UserSession> {
        self.sessions.remove(user_id).map(|(_, s)| s)
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }

    fn clear(&self) {
        self.sessions.clear();
    }
}
