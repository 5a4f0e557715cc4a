//! In-process session storage.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use super::{Reclaimer, SessionBackend};
use crate::error::SessionError;
use crate::session::Session;
use crate::Result;

/// Thread-safe in-memory backend.
///
/// Sessions are kept as-is, without encoding, and are lost with the process.
#[derive(Debug)]
pub struct MemoryBackend {
    sessions: RwLock<HashMap<String, Session>>,
    reclaimer: OnceLock<Reclaimer>,
}

impl MemoryBackend {
    /// Create an empty backend swept every `interval`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(interval: Duration) -> Result<Arc<Self>> {
        let backend = Arc::new(Self::unswept());
        let reclaimer = Reclaimer::spawn(Arc::downgrade(&backend), interval)?;
        let _ = backend.reclaimer.set(reclaimer);
        Ok(backend)
    }

    /// Create an empty backend without a background sweep.
    ///
    /// Expired sessions are only removed by explicit [`SessionBackend::reclaim`] calls.
    pub fn unswept() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            reclaimer: OnceLock::new(),
        }
    }

    /// Stop the background sweep, if any.
    pub async fn shutdown(&self) {
        if let Some(reclaimer) = self.reclaimer.get() {
            reclaimer.shutdown().await;
        }
    }

    /// Number of stored sessions.
    pub fn count(&self) -> Result<usize> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| SessionError::LockPoisoned)?;
        Ok(sessions.len())
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn save(&self, session: &mut Session) -> Result<bool> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| SessionError::LockPoisoned)?;

        let emit_cookie = session.is_new;
        if emit_cookie && sessions.contains_key(&session.id) {
            return Err(SessionError::IdCollision(session.id.clone()));
        }

        session.is_new = false;
        sessions.insert(session.id.clone(), session.clone());
        tracing::debug!(session_id = %session.id, "saved session in memory");
        Ok(emit_cookie)
    }

    async fn load(&self, id: &str) -> Result<Session> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| SessionError::LockPoisoned)?;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| SessionError::LockPoisoned)?;
        if sessions.remove(id).is_some() {
            tracing::debug!(session_id = %id, "deleted session from memory");
        }
        Ok(())
    }

    async fn contains(&self, id: &str) -> Result<bool> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| SessionError::LockPoisoned)?;
        Ok(sessions.contains_key(id))
    }

    async fn reclaim(&self) -> Result<usize> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| SessionError::LockPoisoned)?;

        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        Ok(before - sessions.len())
    }
}
