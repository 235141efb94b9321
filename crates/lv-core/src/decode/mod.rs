//! Ping decoding from framed blobs.

pub mod frame;
pub mod message;

pub use frame::{encode_frame, encode_ping, DecodeError, FrameReader};
pub use message::{Field, Header, Message, ValueType};
