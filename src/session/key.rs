//! Bag key type.

use std::fmt;

/// Key into a session's value bag.
///
/// Any of these variants can be used while the session is in memory, but
/// only [`BagKey::Text`] survives encoding. Entries under other keys are
/// dropped by the codec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BagKey {
    /// String key; the only durable form.
    Text(String),
    /// Integer key.
    Int(i64),
    /// Boolean key.
    Bool(bool),
}

impl BagKey {
    /// Return the string form if this key is durable.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            BagKey::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for BagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BagKey::Text(s) => write!(f, "{}", s),
            BagKey::Int(i) => write!(f, "#{}", i),
            BagKey::Bool(b) => write!(f, "#{}", b),
        }
    }
}

impl From<&str> for BagKey {
    fn from(s: &str) -> Self {
        BagKey::Text(s.to_string())
    }
}

impl From<String> for BagKey {
    fn from(s: String) -> Self {
        BagKey::Text(s)
    }
}

impl From<&String> for BagKey {
    fn from(s: &String) -> Self {
        BagKey::Text(s.clone())
    }
}

impl From<i64> for BagKey {
    fn from(i: i64) -> Self {
        BagKey::Int(i)
    }
}

impl From<i32> for BagKey {
    fn from(i: i32) -> Self {
        BagKey::Int(i64::from(i))
    }
}

impl From<bool> for BagKey {
    fn from(b: bool) -> Self {
        BagKey::Bool(b)
    }
}
