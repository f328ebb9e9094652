//! Payload codec and type tags.
//!
//! Any `Serialize + DeserializeOwned + Send + 'static` type can travel as a
//! message payload. Encoding uses `postcard` for compact binary output, and
//! every payload type carries a stable string **tag** (the short type name)
//! computed once at send time. Reaction tables dispatch on the tag, so the
//! hot path never touches runtime reflection.
//!
//! # Examples
//!
//! ```
//! use rill_core::Payload;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
//! struct Ping {
//!     id: u32,
//! }
//!
//! let ping = Ping { id: 42 };
//! let bytes = ping.encode();
//! let decoded = Ping::decode(&bytes).unwrap();
//! assert_eq!(ping, decoded);
//! assert_eq!(Ping::tag(), "Ping");
//! ```

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Error type for payload decoding failures.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Failed to deserialize the payload bytes.
    #[error("failed to decode payload: {0}")]
    Deserialize(#[from] postcard::Error),
}

/// A type that can be carried as a message payload.
///
/// Automatically implemented for any `Serialize + DeserializeOwned + Send +
/// 'static` type.
pub trait Payload: Sized + Send + 'static {
    /// The tag reaction tables dispatch on: the type name without its module
    /// path. Stable for a given type across processes built from the same
    /// source.
    fn tag() -> &'static str;

    /// Encodes this payload into bytes.
    ///
    /// # Panics
    ///
    /// Panics if serialization fails, which does not happen for well-formed
    /// `Serialize` implementations over plain data.
    fn encode(&self) -> Vec<u8>;

    /// Decodes a payload from bytes.
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError>;

    /// Encodes this payload, returning `None` on failure instead of
    /// panicking.
    fn try_encode(&self) -> Option<Vec<u8>>;
}

impl<T> Payload for T
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    fn tag() -> &'static str {
        let full = std::any::type_name::<T>();
        match full.rsplit("::").next() {
            Some(short) => short,
            None => full,
        }
    }

    fn encode(&self) -> Vec<u8> {
        postcard::to_allocvec(self).expect("payload serialization failed")
    }

    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        postcard::from_bytes(bytes).map_err(DecodeError::from)
    }

    fn try_encode(&self) -> Option<Vec<u8>> {
        postcard::to_allocvec(self).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u64,
        item: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Command {
        Start(u32),
        Halt { reason: String },
    }

    #[test]
    fn test_tag_is_short_name() {
        assert_eq!(Order::tag(), "Order");
        assert_eq!(Command::tag(), "Command");
        assert_eq!(String::tag(), "String");
        assert_eq!(u32::tag(), "u32");
    }

    #[test]
    fn test_roundtrip_struct() {
        let msg = Order {
            id: 7,
            item: "bolt".to_string(),
        };
        let decoded = Order::decode(&msg.encode()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_roundtrip_enum() {
        let msg = Command::Halt {
            reason: "done".to_string(),
        };
        let decoded = Command::decode(&msg.encode()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_decode_error() {
        let bad = vec![0xFF, 0xFF, 0xFF];
        assert!(Order::decode(&bad).is_err());
    }

    #[test]
    fn test_try_encode() {
        let msg = Order {
            id: 1,
            item: "nut".to_string(),
        };
        assert!(msg.try_encode().is_some());
    }
}
