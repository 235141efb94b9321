//! Longitudinal view common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the lv-* crates:
//! - Client identity
//! - Decoded pings and their dynamically typed field values
//! - The unified error type and its stable error codes

pub mod error;
pub mod id;
pub mod ping;

pub use error::{Error, Result};
pub use id::ClientId;
pub use ping::{FieldValue, Ping, CLIENT_ID_FIELD, CREATION_TIMESTAMP_FIELD};
