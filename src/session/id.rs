//! Session identifier generation.
//!
//! Identifiers are opaque alphanumeric strings drawn from the operating
//! system's CSPRNG. No clock seeding is involved, so concurrent callers
//! cannot observe the same sequence.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

/// Length of identifiers produced by [`generate`].
pub const DEFAULT_ID_LEN: usize = 32;

/// Shortest identifier accepted from a client.
pub const MIN_ID_LEN: usize = 10;

/// Generate a new session identifier of [`DEFAULT_ID_LEN`] characters.
pub fn generate() -> String {
    generate_with_len(DEFAULT_ID_LEN)
}

/// Generate an identifier of `len` characters from `[A-Za-z0-9]`.
///
/// Lengths below [`MIN_ID_LEN`] are raised to it.
pub fn generate_with_len(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len.max(MIN_ID_LEN))
        .map(char::from)
        .collect()
}

/// Check that `id` could have been issued by this crate.
///
/// Cookie values that fail this check are never looked up in a backend,
/// which also keeps them out of file names.
pub fn is_valid_id(id: &str) -> bool {
    id.len() >= MIN_ID_LEN && id.bytes().all(|b| b.is_ascii_alphanumeric())
}
