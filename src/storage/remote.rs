//! Remote key/value session storage.
//!
//! Sessions are stored under their id with a server-side expiry equal to
//! their max-age, so the remote service does the reclamation.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use super::SessionBackend;
use crate::error::SessionError;
use crate::session::{codec, Session};
use crate::Result;

/// Minimal key/value capability consumed by [`RemoteBackend`].
#[async_trait]
pub trait KvClient: Send + Sync {
    /// Store `value` under `key`, expiring after `seconds`.
    async fn set_ex(&self, key: &str, value: Vec<u8>, seconds: u64) -> Result<()>;

    /// Store `value` under `key` only if `key` is unset, expiring after
    /// `seconds`. Returns `false` when the key already existed.
    async fn set_nx_ex(&self, key: &str, value: Vec<u8>, seconds: u64) -> Result<bool>;

    /// Fetch the value under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn del(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl KvClient for MultiplexedConnection {
    async fn set_ex(&self, key: &str, value: Vec<u8>, seconds: u64) -> Result<()> {
        let mut conn = self.clone();
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(seconds)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: Vec<u8>, seconds: u64) -> Result<bool> {
        let mut conn = self.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(seconds)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.clone();
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }
}

/// Backend storing encoded sessions in a remote key/value service.
///
/// Each operation is one round trip. Failures surface as I/O errors and
/// are not retried.
#[derive(Debug)]
pub struct RemoteBackend<C> {
    client: C,
}

impl RemoteBackend<MultiplexedConnection> {
    /// Connect to a Redis server.
    ///
    /// `network` is `"tcp"` (address `host:port`) or `"unix"` (address is a
    /// socket path). An address that already carries a URL scheme is used
    /// as-is.
    pub async fn connect(network: &str, address: &str) -> Result<Self> {
        let url = if address.contains("://") {
            address.to_string()
        } else {
            match network {
                "tcp" | "tcp4" | "tcp6" => format!("redis://{}/", address),
                "unix" => format!("redis+unix://{}", address),
                other => {
                    return Err(SessionError::Configuration(format!(
                        "unsupported network {:?}",
                        other
                    )))
                }
            }
        };

        let client = redis::Client::open(url.as_str())
            .map_err(|e| SessionError::Configuration(format!("invalid redis url {}: {}", url, e)))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| SessionError::Configuration(format!("cannot reach {}: {}", address, e)))?;

        tracing::info!(%network, %address, "connected remote session backend");
        Ok(Self::new(conn))
    }
}

impl<C: KvClient> RemoteBackend<C> {
    /// Wrap an existing client.
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Borrow the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }
}

#[async_trait]
impl<C: KvClient> SessionBackend for RemoteBackend<C> {
    async fn save(&self, session: &mut Session) -> Result<bool> {
        let emit_cookie = session.is_new;
        session.is_new = false;
        let ttl = session.options.max_age.max(1) as u64;

        // New sessions are written with NX so a live id is never overwritten.
        let written = match codec::encode(session) {
            Ok(bytes) if emit_cookie => self
                .client
                .set_nx_ex(&session.id, bytes, ttl)
                .await
                .and_then(|stored| {
                    if stored {
                        Ok(())
                    } else {
                        Err(SessionError::IdCollision(session.id.clone()))
                    }
                }),
            Ok(bytes) => self.client.set_ex(&session.id, bytes, ttl).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            session.is_new = emit_cookie;
            return Err(e);
        }

        tracing::debug!(session_id = %session.id, ttl, "saved remote session");
        Ok(emit_cookie)
    }

    async fn load(&self, id: &str) -> Result<Session> {
        let Some(bytes) = self.client.get(id).await? else {
            return Err(SessionError::NotFound(id.to_string()));
        };

        match codec::decode(&bytes) {
            Ok(session) if session.id == id => Ok(session),
            _ => {
                tracing::warn!(session_id = %id, "corrupt remote session record");
                self.client.del(id).await?;
                Err(SessionError::NotFound(id.to_string()))
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client.del(id).await?;
        tracing::debug!(session_id = %id, "deleted remote session");
        Ok(())
    }

    async fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.client.get(id).await?.is_some())
    }

    /// Expiry is left to the remote service.
    async fn reclaim(&self) -> Result<usize> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::session::CookieOptions;

    #[derive(Default)]
    struct FakeKv {
        entries: Mutex<HashMap<String, (Vec<u8>, u64)>>,
        gets: AtomicUsize,
    }

    impl FakeKv {
        fn ttl(&self, key: &str) -> Option<u64> {
            self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
        }

        fn put_raw(&self, key: &str, value: &[u8]) {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_vec(), 60));
        }
    }

    #[async_trait]
    impl KvClient for FakeKv {
        async fn set_ex(&self, key: &str, value: Vec<u8>, seconds: u64) -> Result<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value, seconds));
            Ok(())
        }

        async fn set_nx_ex(&self, key: &str, value: Vec<u8>, seconds: u64) -> Result<bool> {
            let mut entries = self.entries.lock().unwrap();
            if entries.contains_key(key) {
                return Ok(false);
            }
            entries.insert(key.to_string(), (value, seconds));
            Ok(true)
        }

        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            Ok(self.entries.lock().unwrap().get(key).map(|(v, _)| v.clone()))
        }

        async fn del(&self, key: &str) -> Result<()> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }
    }

    struct DownKv;

    #[async_trait]
    impl KvClient for DownKv {
        async fn set_ex(&self, _key: &str, _value: Vec<u8>, _seconds: u64) -> Result<()> {
            Err(std::io::Error::other("connection refused").into())
        }

        async fn set_nx_ex(&self, _key: &str, _value: Vec<u8>, _seconds: u64) -> Result<bool> {
            Err(std::io::Error::other("connection refused").into())
        }

        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(std::io::Error::other("connection refused").into())
        }

        async fn del(&self, _key: &str) -> Result<()> {
            Err(std::io::Error::other("connection refused").into())
        }
    }

    #[tokio::test]
    async fn test_save_sets_expiry() {
        let backend = RemoteBackend::new(FakeKv::default());
        let mut s = Session::new("ABC1234567", CookieOptions::with_max_age(300));
        s.set("user", "alice");

        assert!(backend.save(&mut s).await.unwrap());
        assert_eq!(backend.client().ttl("ABC1234567"), Some(300));

        let loaded = backend.load("ABC1234567").await.unwrap();
        assert!(!loaded.is_new);
        assert_eq!(loaded.get_as::<String>("user").as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_zero_max_age_still_expires() {
        let backend = RemoteBackend::new(FakeKv::default());
        let mut s = Session::new("ABC1234567", CookieOptions::with_max_age(0));
        backend.save(&mut s).await.unwrap();
        assert_eq!(backend.client().ttl("ABC1234567"), Some(1));
    }

    #[tokio::test]
    async fn test_load_missing() {
        let backend = RemoteBackend::new(FakeKv::default());
        assert!(backend.load("ABC1234567").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_corrupt_record_removed() {
        let backend = RemoteBackend::new(FakeKv::default());
        backend.client().put_raw("X", b"not json");

        assert!(backend.load("X").await.unwrap_err().is_not_found());
        assert!(!backend.contains("X").await.unwrap());
    }

    #[tokio::test]
    async fn test_collision_and_delete() {
        let backend = RemoteBackend::new(FakeKv::default());
        let mut first = Session::new("ABC1234567", CookieOptions::default());
        let mut second = Session::new("ABC1234567", CookieOptions::default());
        backend.save(&mut first).await.unwrap();

        let err = backend.save(&mut second).await.unwrap_err();
        assert!(matches!(err, SessionError::IdCollision(_)));
        assert!(second.is_new);

        backend.delete("ABC1234567").await.unwrap();
        backend.delete("ABC1234567").await.unwrap();
        assert_eq!(backend.reclaim().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_first_save_is_single_conditional_write() {
        let backend = RemoteBackend::new(FakeKv::default());
        let mut s = Session::new("ABC1234567", CookieOptions::default());

        assert!(backend.save(&mut s).await.unwrap());
        assert_eq!(backend.client().gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_saves_never_overwrite() {
        let backend = Arc::new(RemoteBackend::new(FakeKv::default()));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let backend = Arc::clone(&backend);
                tokio::spawn(async move {
                    let mut s = Session::new("ABC1234567", CookieOptions::default());
                    s.set("owner", i);
                    backend.save(&mut s).await.map(|_| i)
                })
            })
            .collect();

        let mut winners = vec![];
        for handle in handles {
            match handle.await.unwrap() {
                Ok(i) => winners.push(i),
                Err(e) => assert!(matches!(e, SessionError::IdCollision(_))),
            }
        }

        assert_eq!(winners.len(), 1);
        let stored = backend.load("ABC1234567").await.unwrap();
        assert_eq!(stored.get_as::<i32>("owner"), Some(winners[0]));
    }

    #[tokio::test]
    async fn test_failures_surface_as_io() {
        let backend = RemoteBackend::new(DownKv);
        let mut s = Session::new("ABC1234567", CookieOptions::default());

        assert!(matches!(backend.save(&mut s).await, Err(SessionError::Io(_))));
        assert!(s.is_new);
        assert!(matches!(backend.load("ABC1234567").await, Err(SessionError::Io(_))));
        assert!(matches!(backend.delete("ABC1234567").await, Err(SessionError::Io(_))));
    }

    #[tokio::test]
    async fn test_unsupported_network() {
        let err = RemoteBackend::connect("udp", "127.0.0.1:6379")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        // Port 1 is reserved and not expected to host a Redis server.
        let err = RemoteBackend::connect("tcp", "127.0.0.1:1").await.err().unwrap();
        assert!(matches!(err, SessionError::Configuration(_)));
    }
}
