//! In-memory session entity.

use std::collections::HashMap;

use chrono::Utc;
use cookie::Cookie;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::BagKey;

/// Cookie scoping attributes for a session.
///
/// Fixed at creation and copied verbatim into every Set-Cookie directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieOptions {
    /// Cookie path.
    pub path: String,
    /// Cookie domain; empty means host-only.
    pub domain: String,
    /// Lifetime in seconds, also the idle limit used for expiration.
    pub max_age: i64,
    /// Only send over HTTPS.
    pub secure: bool,
    /// Hide from client-side scripts.
    pub http_only: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: String::new(),
            max_age: 3600,
            secure: false,
            http_only: true,
        }
    }
}

impl CookieOptions {
    /// Options with the given max-age and defaults for everything else.
    pub fn with_max_age(max_age: i64) -> Self {
        Self {
            max_age,
            ..Default::default()
        }
    }
}

/// A server-side session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Opaque identifier carried in the session cookie.
    pub id: String,
    /// Key/value bag.
    pub values: HashMap<BagKey, Value>,
    /// Cookie attributes.
    pub options: CookieOptions,
    /// True until the session has been saved once.
    pub is_new: bool,
    /// Unix seconds of the last persistence call.
    pub last_active: i64,
}

impl Session {
    /// Create a fresh session with an empty bag.
    pub fn new(id: impl Into<String>, options: CookieOptions) -> Self {
        Self {
            id: id.into(),
            values: HashMap::new(),
            options,
            is_new: true,
            last_active: Utc::now().timestamp(),
        }
    }

    /// Get a value from the bag.
    pub fn get(&self, key: impl Into<BagKey>) -> Option<&Value> {
        self.values.get(&key.into())
    }

    /// Get a value and deserialize it into `T`.
    ///
    /// Returns `None` if the key is absent or the value has another shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: impl Into<BagKey>) -> Option<T> {
        self.get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Insert or replace a value, returning the previous one.
    pub fn set(&mut self, key: impl Into<BagKey>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    /// Remove a key from the bag.
    pub fn remove(&mut self, key: impl Into<BagKey>) -> Option<Value> {
        self.values.remove(&key.into())
    }

    /// Number of entries in the bag.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stamp the activity time with the current time.
    ///
    /// The timestamp never moves backwards, even if the wall clock does.
    pub fn touch(&mut self) {
        self.last_active = self.last_active.max(Utc::now().timestamp());
    }

    /// Seconds elapsed since the last persistence call.
    ///
    /// Saturates for out-of-range timestamps read back from storage.
    pub fn idle_secs(&self) -> i64 {
        Utc::now().timestamp().saturating_sub(self.last_active)
    }

    /// Whether the session has been idle longer than its max-age.
    pub fn is_expired(&self) -> bool {
        self.idle_secs() > self.options.max_age
    }

    /// Build the session cookie under `name`.
    pub fn cookie(&self, name: &str) -> Cookie<'static> {
        let mut builder = Cookie::build((name.to_string(), self.id.clone()))
            .path(self.options.path.clone())
            .max_age(cookie::time::Duration::seconds(self.options.max_age))
            .secure(self.options.secure)
            .http_only(self.options.http_only);
        if !self.options.domain.is_empty() {
            builder = builder.domain(self.options.domain.clone());
        }
        builder.build()
    }

    /// Build a cookie that clears this session on the client.
    pub fn removal_cookie(&self, name: &str) -> Cookie<'static> {
        let mut cookie = self.cookie(name);
        cookie.set_value("");
        cookie.make_removal();
        cookie
    }
}
