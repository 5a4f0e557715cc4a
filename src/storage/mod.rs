//! Storage backends for sessions.
//!
//! Every backend implements [`SessionBackend`]. Three are provided:
//!
//! - [`MemoryBackend`] keeps sessions in process memory.
//! - [`FileBackend`] writes one file per session under a directory.
//! - [`RemoteBackend`] stores encoded sessions in a remote key/value
//!   service (Redis) and lets the service expire them.
//!
//! Memory and file backends run a [`Reclaimer`] that sweeps expired and
//! corrupt entries once per interval until the backend is shut down or
//! dropped.

use async_trait::async_trait;

use crate::session::Session;
use crate::Result;

mod file;
mod memory;
mod reclaim;
mod remote;

pub use file::{FileBackend, DEFAULT_FILE_PREFIX};
pub use memory::MemoryBackend;
pub use reclaim::{Reclaimer, DEFAULT_RECLAIM_INTERVAL};
pub use remote::{KvClient, RemoteBackend};

/// Persistence contract shared by all backends.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Create or overwrite the durable form of `session`.
    ///
    /// If the session is new, it is marked as not new before being written
    /// and `true` is returned: the caller must emit the session cookie.
    /// Saving a new session under an id that is already live fails with
    /// [`SessionError::IdCollision`](crate::SessionError::IdCollision).
    async fn save(&self, session: &mut Session) -> Result<bool>;

    /// Load the session stored under `id`.
    ///
    /// Missing and undecodable records both yield
    /// [`SessionError::NotFound`](crate::SessionError::NotFound); undecodable
    /// ones are deleted on the way out.
    async fn load(&self, id: &str) -> Result<Session>;

    /// Remove the session stored under `id`. Deleting an unknown id is a no-op.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Whether a session is currently stored under `id`.
    async fn contains(&self, id: &str) -> Result<bool>;

    /// Remove expired and undecodable sessions, returning how many went.
    async fn reclaim(&self) -> Result<usize>;
}
