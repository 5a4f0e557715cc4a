//! File-per-session storage.
//!
//! Each session lives in `<root>/<prefix><id>`. The directory is scanned
//! once when the backend is opened, so sessions written by an earlier
//! process are picked up again.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::{Reclaimer, SessionBackend};
use crate::error::SessionError;
use crate::session::{codec, Session};
use crate::Result;

/// Default file name prefix for session files.
pub const DEFAULT_FILE_PREFIX: &str = "sess_";

/// Outcome of reading one session file.
enum Record {
    Valid(Session),
    /// Missing, undecodable, or holding another session's id.
    Unreadable,
}

/// Outcome of re-checking an entry under the writer lock.
enum Recheck {
    Kept(Session),
    Removed,
    Absent,
}

/// Ids are used verbatim in file names.
fn file_safe(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Backend storing one JSON file per session.
///
/// The index and all file writes go through one read/write lock: loads
/// share it, while saves, deletes and reclaim removals take it exclusively.
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    prefix: String,
    index: RwLock<HashMap<String, PathBuf>>,
    reclaimer: OnceLock<Reclaimer>,
}

impl FileBackend {
    /// Open a backend on `root` and start sweeping it every `interval`.
    ///
    /// `prefix` defaults to [`DEFAULT_FILE_PREFIX`].
    pub async fn open(
        root: impl AsRef<Path>,
        prefix: Option<&str>,
        interval: Duration,
    ) -> Result<Arc<Self>> {
        let backend = Arc::new(Self::open_unswept(root, prefix).await?);
        let reclaimer = Reclaimer::spawn(Arc::downgrade(&backend), interval)?;
        let _ = backend.reclaimer.set(reclaimer);
        Ok(backend)
    }

    /// Open a backend on `root` without a background sweep.
    ///
    /// Fails with a configuration error if `root` is missing, is not a
    /// directory, or cannot be written to.
    pub async fn open_unswept(root: impl AsRef<Path>, prefix: Option<&str>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let prefix = prefix.unwrap_or(DEFAULT_FILE_PREFIX).to_string();

        let meta = fs::metadata(&root).await.map_err(|e| {
            SessionError::Configuration(format!("session root {}: {}", root.display(), e))
        })?;
        if !meta.is_dir() {
            return Err(SessionError::Configuration(format!(
                "session root {} is not a directory",
                root.display()
            )));
        }

        let probe = root.join(format!(".{}probe-{}", prefix, std::process::id()));
        fs::write(&probe, b"").await.map_err(|e| {
            SessionError::Configuration(format!(
                "session root {} is not writable: {}",
                root.display(),
                e
            ))
        })?;
        let _ = fs::remove_file(&probe).await;

        let index = scan(&root, &prefix).await?;
        tracing::info!(
            root = %root.display(),
            sessions = index.len(),
            "opened file session backend"
        );

        Ok(Self {
            root,
            prefix,
            index: RwLock::new(index),
            reclaimer: OnceLock::new(),
        })
    }

    /// Directory holding the session files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name prefix for session files.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of indexed sessions.
    pub async fn count(&self) -> usize {
        self.index.read().await.len()
    }

    /// Stop the background sweep, if any.
    pub async fn shutdown(&self) {
        if let Some(reclaimer) = self.reclaimer.get() {
            reclaimer.shutdown().await;
        }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}{}", self.prefix, id))
    }

    async fn read_record(&self, id: &str, path: &Path) -> Result<Record> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(session_id = %id, "session file missing");
                return Ok(Record::Unreadable);
            }
            Err(e) => return Err(e.into()),
        };

        match codec::decode(&bytes) {
            Ok(session) if session.id == id => Ok(Record::Valid(session)),
            Ok(session) => {
                tracing::warn!(session_id = %id, found = %session.id, "session file holds another id");
                Ok(Record::Unreadable)
            }
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "corrupt session file");
                Ok(Record::Unreadable)
            }
        }
    }

    /// Re-read `id` under the writer lock and remove it if it is unreadable
    /// or `stale` holds for its current content.
    async fn remove_if<F>(&self, id: &str, stale: F) -> Result<Recheck>
    where
        F: Fn(&Session) -> bool,
    {
        let mut index = self.index.write().await;
        let Some(path) = index.get(id).cloned() else {
            return Ok(Recheck::Absent);
        };

        if let Record::Valid(session) = self.read_record(id, &path).await? {
            if !stale(&session) {
                return Ok(Recheck::Kept(session));
            }
        }

        index.remove(id);
        remove_file(&path).await?;
        tracing::debug!(session_id = %id, "removed session file");
        Ok(Recheck::Removed)
    }
}

async fn scan(root: &Path, prefix: &str) -> Result<HashMap<String, PathBuf>> {
    let mut index = HashMap::new();
    let mut entries = fs::read_dir(root).await?;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(id) = name.to_str().and_then(|n| n.strip_prefix(prefix)) else {
            continue;
        };
        if file_safe(id) {
            index.insert(id.to_string(), entry.path());
        }
    }

    Ok(index)
}

async fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}

#[async_trait]
impl SessionBackend for FileBackend {
    async fn save(&self, session: &mut Session) -> Result<bool> {
        if !file_safe(&session.id) {
            return Err(SessionError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("session id {:?} cannot be used as a file name", session.id),
            )));
        }

        let mut index = self.index.write().await;
        let emit_cookie = session.is_new;
        if emit_cookie && index.contains_key(&session.id) {
            return Err(SessionError::IdCollision(session.id.clone()));
        }

        let path = self.path_for(&session.id);
        session.is_new = false;
        let written = match codec::encode(session) {
            Ok(bytes) => write_file(&path, &bytes).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            session.is_new = emit_cookie;
            return Err(e);
        }

        index.insert(session.id.clone(), path);
        tracing::debug!(session_id = %session.id, "saved session file");
        Ok(emit_cookie)
    }

    async fn load(&self, id: &str) -> Result<Session> {
        let record = {
            let index = self.index.read().await;
            let Some(path) = index.get(id) else {
                return Err(SessionError::NotFound(id.to_string()));
            };
            self.read_record(id, path).await?
        };

        match record {
            Record::Valid(session) => Ok(session),
            Record::Unreadable => match self.remove_if(id, |_| false).await? {
                Recheck::Kept(session) => Ok(session),
                Recheck::Removed | Recheck::Absent => Err(SessionError::NotFound(id.to_string())),
            },
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut index = self.index.write().await;
        let path = match index.remove(id) {
            Some(path) => path,
            None if file_safe(id) => self.path_for(id),
            None => return Ok(()),
        };
        remove_file(&path).await?;
        tracing::debug!(session_id = %id, "deleted session file");
        Ok(())
    }

    async fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.index.read().await.contains_key(id))
    }

    async fn reclaim(&self) -> Result<usize> {
        let entries: Vec<(String, PathBuf)> = self
            .index
            .read()
            .await
            .iter()
            .map(|(id, path)| (id.clone(), path.clone()))
            .collect();

        let mut removed = 0;
        for (id, path) in entries {
            let record = {
                let _index = self.index.read().await;
                self.read_record(&id, &path).await
            };
            let stale = match record {
                Ok(Record::Valid(session)) => session.is_expired(),
                Ok(Record::Unreadable) => true,
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "skipping unreadable session file");
                    continue;
                }
            };
            if !stale {
                continue;
            }

            match self.remove_if(&id, Session::is_expired).await {
                Ok(Recheck::Removed) => removed += 1,
                Ok(_) => {}
                Err(e) => tracing::warn!(session_id = %id, error = %e, "failed to remove session file"),
            }
        }

        Ok(removed)
    }
}
