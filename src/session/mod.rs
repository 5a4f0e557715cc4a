//! Session entity and its supporting types.
//!
//! This module provides the in-memory session representation, identifier
//! generation and the codec used by durable backends.

pub mod codec;
pub mod id;
mod entity;
mod key;

pub use entity::{CookieOptions, Session};
pub use key::BagKey;
