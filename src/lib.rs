//! # websess
//!
//! Server-side HTTP sessions with interchangeable storage backends.
//!
//! A session is an opaque identifier handed to the client in a cookie,
//! paired with a key/value bag kept on the server. This crate owns the
//! bag's persistence and expiration; the HTTP layer is reached only
//! through the small [`CookieTransport`] capability.
//!
//! ## Features
//!
//! - **Backends**: in-process memory, one file per session, or Redis
//! - **Reclamation**: expired and corrupt sessions are swept in the
//!   background without any client activity
//! - **Unguessable ids**: identifiers come from the OS CSPRNG
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use axum::http::HeaderMap;
//! use websess::{CookieOptions, FileBackend, HeaderTransport, ManagerConfig, SessionManager};
//!
//! #[tokio::main]
//! async fn main() -> websess::Result<()> {
//!     websess::logging::try_init().ok();
//!
//!     let backend = FileBackend::open("/var/lib/sessions", None, Duration::from_secs(1)).await?;
//!     let manager = SessionManager::new(ManagerConfig::default(), backend);
//!
//!     let request = HeaderMap::new();
//!     let mut response = HeaderMap::new();
//!     let mut transport = HeaderTransport::new(&request, &mut response);
//!
//!     let mut session = manager.start(&transport, CookieOptions::default()).await?;
//!     session.set("user", "alice");
//!     manager.persist(&mut session, &mut transport).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod session;
pub mod storage;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SessionError};
pub use manager::{ManagerConfig, SessionManager, DEFAULT_COOKIE_NAME};
pub use session::{BagKey, CookieOptions, Session};
pub use storage::{FileBackend, KvClient, MemoryBackend, Reclaimer, RemoteBackend, SessionBackend};
pub use transport::{CookieTransport, HeaderTransport};
