//! Session manager.
//!
//! [`SessionManager`] ties a [`SessionBackend`] to the cookie transport:
//! it resolves the session cookie into a session, persists sessions and
//! emits or clears the cookie as needed.

use std::sync::Arc;

use crate::error::SessionError;
use crate::session::{id, CookieOptions, Session};
use crate::storage::SessionBackend;
use crate::transport::CookieTransport;
use crate::Result;

/// Default name of the session cookie.
pub const DEFAULT_COOKIE_NAME: &str = "WEBSESS";

/// How many fresh identifiers are tried before giving up.
const MAX_ID_ATTEMPTS: usize = 8;

/// Per-manager settings.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Name of the session cookie.
    pub cookie_name: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
        }
    }
}

impl ManagerConfig {
    pub fn with_cookie_name(name: impl Into<String>) -> Self {
        Self {
            cookie_name: name.into(),
        }
    }
}

/// Session facade bound to one backend.
#[derive(Clone)]
pub struct SessionManager {
    config: ManagerConfig,
    backend: Arc<dyn SessionBackend>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(config: ManagerConfig, backend: Arc<dyn SessionBackend>) -> Self {
        Self { config, backend }
    }

    /// Name of the session cookie.
    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    /// The bound backend.
    pub fn backend(&self) -> &Arc<dyn SessionBackend> {
        &self.backend
    }

    /// Resolve the request's session, creating a new one if needed.
    ///
    /// A missing, malformed, or unknown session cookie yields a fresh
    /// session with `is_new` set. Any other backend error is returned.
    pub async fn start(
        &self,
        transport: &impl CookieTransport,
        options: CookieOptions,
    ) -> Result<Session> {
        let cookie = transport
            .request_cookie(&self.config.cookie_name)
            .filter(|value| id::is_valid_id(value));

        if let Some(session_id) = cookie {
            match self.backend.load(&session_id).await {
                Ok(mut session) => {
                    session.is_new = false;
                    return Ok(session);
                }
                Err(e) if e.is_not_found() => {
                    tracing::debug!(%session_id, "session cookie refers to unknown session");
                }
                Err(e) => return Err(e),
            }
        }

        self.create(options).await
    }

    /// Create a fresh session with an identifier unused by the backend.
    pub async fn create(&self, options: CookieOptions) -> Result<Session> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let session_id = id::generate();
            if !self.backend.contains(&session_id).await? {
                return Ok(Session::new(session_id, options));
            }
            tracing::warn!("generated session id already in use, retrying");
        }

        Err(SessionError::IdCollision(
            "no unused session id after repeated attempts".to_string(),
        ))
    }

    /// Load a session by id, without any cookie handling.
    pub async fn load(&self, session_id: &str) -> Result<Session> {
        self.backend.load(session_id).await
    }

    /// Stamp the session as active and save it.
    ///
    /// The session cookie is written the first time a session is saved. A
    /// new session whose id was taken in the meantime gets a fresh id
    /// before the cookie is ever issued.
    pub async fn persist(
        &self,
        session: &mut Session,
        transport: &mut impl CookieTransport,
    ) -> Result<()> {
        session.touch();

        let mut attempts = 1;
        let emit_cookie = loop {
            match self.backend.save(session).await {
                Ok(emit_cookie) => break emit_cookie,
                Err(SessionError::IdCollision(_)) if attempts < MAX_ID_ATTEMPTS => {
                    tracing::warn!(session_id = %session.id, "session id collision on save, regenerating");
                    session.id = id::generate();
                    attempts += 1;
                }
                Err(e) => return Err(e),
            }
        };

        if emit_cookie {
            transport.set_cookie(session.cookie(&self.config.cookie_name));
        }
        Ok(())
    }

    /// Delete the session and clear the client's cookie.
    pub async fn destroy(
        &self,
        session: Session,
        transport: &mut impl CookieTransport,
    ) -> Result<()> {
        self.backend.delete(&session.id).await?;
        transport.set_cookie(session.removal_cookie(&self.config.cookie_name));
        tracing::debug!(session_id = %session.id, "destroyed session");
        Ok(())
    }
}
