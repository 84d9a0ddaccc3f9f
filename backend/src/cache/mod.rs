//! Session registry - keep editing sessions between HTTP requests
//!
//! Sessions live in memory only and are dropped after sitting idle for
//! longer than the configured TTL.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::api::logs::{log_info, log_session, LogEntry};
use crate::error::{SessionError, SessionResult};
use crate::session::Session;

/// A stored session with metadata
#[derive(Debug, Clone)]
pub struct StoredSession {
    /// Unique identifier
    pub id: String,
    /// The editing state
    pub session: Session,
    /// Last time this session was touched
    pub last_used: DateTime<Utc>,
}

/// Registry for managing editing sessions
pub struct SessionRegistry {
    /// Idle time after which sessions are evicted
    ttl: Duration,
    /// Live sessions (id -> session)
    sessions: HashMap<String, StoredSession>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: HashMap::new(),
        }
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Store a new session and return its id
    pub fn insert(&mut self, session: Session) -> String {
        self.insert_at(session, Utc::now())
    }

    fn insert_at(&mut self, session: Session, now: DateTime<Utc>) -> String {
        self.evict_expired_at(now);

        let id = Uuid::new_v4().to_string();
        log_session(
            &id,
            LogEntry::info(format!("Session opened for {}", session.file_name())),
        );
        self.sessions.insert(
            id.clone(),
            StoredSession {
                id: id.clone(),
                session,
                last_used: now,
            },
        );
        id
    }

    /// Get a session by ID, marking it as used
    pub fn get_mut(&mut self, id: &str) -> SessionResult<&mut Session> {
        self.get_mut_at(id, Utc::now())
    }

    fn get_mut_at(&mut self, id: &str, now: DateTime<Utc>) -> SessionResult<&mut Session> {
        self.evict_expired_at(now);

        let stored = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        stored.last_used = now;
        Ok(&mut stored.session)
    }

    /// Get stored session metadata without touching it
    pub fn peek(&self, id: &str) -> Option<&StoredSession> {
        self.sessions.get(id)
    }

    /// Delete a session from the registry
    pub fn remove(&mut self, id: &str) -> SessionResult<()> {
        match self.sessions.remove(id) {
            Some(_) => {
                log_session(id, LogEntry::info("Session closed"));
                Ok(())
            }
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    /// Drop sessions idle for longer than the TTL; returns how many
    pub fn evict_expired(&mut self) -> usize {
        self.evict_expired_at(Utc::now())
    }

    fn evict_expired_at(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let before = self.sessions.len();
        self.sessions.retain(|_, s| now - s.last_used <= ttl);

        let evicted = before - self.sessions.len();
        if evicted > 0 {
            log_info(format!("Evicted {} idle session(s)", evicted));
        }
        evicted
    }
}
