//! Durable encoding of sessions.
//!
//! Records are JSON objects:
//!
//! ```text
//! {"version":1,"id":"...","values":{...},"options":{...},"is_new":false,"last_active":1700000000}
//! ```
//!
//! Only string-keyed bag entries are written. Entries under integer or
//! boolean keys are silently dropped.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BagKey, CookieOptions, Session};
use crate::error::SessionError;
use crate::Result;

/// Current record version.
pub const RECORD_VERSION: u32 = 1;

#[derive(Serialize)]
struct RecordRef<'a> {
    version: u32,
    id: &'a str,
    values: BTreeMap<&'a str, &'a Value>,
    options: &'a CookieOptions,
    is_new: bool,
    last_active: i64,
}

#[derive(Deserialize)]
struct Record {
    version: u32,
    id: String,
    values: HashMap<String, Value>,
    options: CookieOptions,
    is_new: bool,
    last_active: i64,
}

/// Encode a session into its durable byte form.
pub fn encode(session: &Session) -> Result<Vec<u8>> {
    let values = session
        .values
        .iter()
        .filter_map(|(key, value)| key.as_text().map(|k| (k, value)))
        .collect();

    let record = RecordRef {
        version: RECORD_VERSION,
        id: &session.id,
        values,
        options: &session.options,
        is_new: session.is_new,
        last_active: session.last_active,
    };

    Ok(serde_json::to_vec(&record)?)
}

/// Decode a session from bytes produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Session> {
    let record: Record = serde_json::from_slice(bytes)?;

    if record.version != RECORD_VERSION {
        return Err(SessionError::Serialization(format!(
            "unsupported record version {}",
            record.version
        )));
    }

    Ok(Session {
        id: record.id,
        values: record
            .values
            .into_iter()
            .map(|(k, v)| (BagKey::Text(k), v))
            .collect(),
        options: record.options,
        is_new: record.is_new,
        last_active: record.last_active,
    })
}
