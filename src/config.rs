//! Configuration for session managers and backends.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file (JSON)
//! 3. Default values

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::manager::{ManagerConfig, DEFAULT_COOKIE_NAME};
use crate::storage::{FileBackend, RemoteBackend, DEFAULT_FILE_PREFIX};
use crate::Result;

/// Library configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the session cookie.
    pub cookie_name: String,
    /// Milliseconds between reclamation sweeps.
    pub reclaim_interval_ms: u64,
    /// File backend settings.
    pub file: FileSection,
    /// Remote backend settings.
    pub remote: RemoteSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            reclaim_interval_ms: 1000,
            file: FileSection::default(),
            remote: RemoteSection::default(),
        }
    }
}

/// File backend section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSection {
    /// Directory holding session files.
    pub root: Option<PathBuf>,
    /// File name prefix.
    pub prefix: String,
}

impl Default for FileSection {
    fn default() -> Self {
        Self {
            root: None,
            prefix: DEFAULT_FILE_PREFIX.to_string(),
        }
    }
}

/// Remote backend section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    /// `tcp` or `unix`.
    pub network: String,
    /// `host:port` or socket path.
    pub address: String,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            network: "tcp".to_string(),
            address: "127.0.0.1:6379".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            SessionError::Configuration(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(name) = std::env::var("WEBSESS_COOKIE_NAME") {
            if !name.is_empty() {
                self.cookie_name = name;
            }
        }

        if let Ok(ms) = std::env::var("WEBSESS_RECLAIM_INTERVAL_MS") {
            if let Ok(ms) = ms.parse() {
                self.reclaim_interval_ms = ms;
            }
        }

        if let Ok(root) = std::env::var("WEBSESS_FILE_ROOT") {
            self.file.root = Some(PathBuf::from(root));
        }

        if let Ok(prefix) = std::env::var("WEBSESS_FILE_PREFIX") {
            self.file.prefix = prefix;
        }

        if let Ok(address) = std::env::var("WEBSESS_REMOTE_ADDR") {
            self.remote.address = address;
        }
    }

    /// Load configuration with full priority chain.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Settings for a [`SessionManager`](crate::SessionManager).
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig::with_cookie_name(self.cookie_name.clone())
    }

    /// Pause between reclamation sweeps, never below one millisecond.
    pub fn reclaim_interval(&self) -> Duration {
        Duration::from_millis(self.reclaim_interval_ms.max(1))
    }

    /// Open the configured file backend.
    pub async fn open_file_backend(&self) -> Result<Arc<FileBackend>> {
        let root = self.file.root.as_ref().ok_or_else(|| {
            SessionError::Configuration("file backend root is not set".to_string())
        })?;
        FileBackend::open(root, Some(self.file.prefix.as_str()), self.reclaim_interval()).await
    }

    /// Connect the configured remote backend.
    pub async fn connect_remote_backend(
        &self,
    ) -> Result<RemoteBackend<redis::aio::MultiplexedConnection>> {
        RemoteBackend::connect(&self.remote.network, &self.remote.address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cookie_name, "WEBSESS");
        assert_eq!(config.reclaim_interval(), Duration::from_secs(1));
        assert_eq!(config.file.prefix, "sess_");
        assert!(config.file.root.is_none());
        assert_eq!(config.remote.network, "tcp");
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "cookie_name": "sid",
            "reclaim_interval_ms": 250,
            "file": {
                "root": "/var/lib/sessions",
                "prefix": "web_"
            },
            "remote": {
                "network": "unix",
                "address": "/run/redis.sock"
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.manager_config().cookie_name, "sid");
        assert_eq!(config.reclaim_interval(), Duration::from_millis(250));
        assert_eq!(config.file.root, Some(PathBuf::from("/var/lib/sessions")));
        assert_eq!(config.file.prefix, "web_");
        assert_eq!(config.remote.network, "unix");
    }

    #[test]
    fn test_config_partial_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"file": {"root": "/tmp"}}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.cookie_name, "WEBSESS");
        assert_eq!(config.file.prefix, "sess_");
    }

    #[test]
    fn test_config_malformed_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ cookie_name: ").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, SessionError::Configuration(_)));
    }

    #[test]
    fn test_zero_interval_clamped() {
        let config = Config {
            reclaim_interval_ms: 0,
            ..Config::default()
        };
        assert_eq!(config.reclaim_interval(), Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_file_backend_requires_root() {
        let err = Config::default().open_file_backend().await.unwrap_err();
        assert!(err.to_string().contains("root"));
    }

    #[tokio::test]
    async fn test_open_file_backend() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.file.root = Some(dir.path().to_path_buf());
        config.file.prefix = "web_".to_string();

        let backend = config.open_file_backend().await.unwrap();
        assert_eq!(backend.prefix(), "web_");
        backend.shutdown().await;
    }
}
