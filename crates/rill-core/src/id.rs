//! Reactor and system identifiers.
//!
//! A [`ReactorId`] uniquely identifies a reactor within a running system; a
//! [`SystemId`] identifies the system (one per process, typically). Both pair
//! a random UUID with a human-readable name:
//!
//! - the **uuid** is the identity: equality and hashing use it exclusively
//! - the **name** is a label for logs and diagnostics, never compared
//!
//! Keeping the name out of equality means two reactors spawned with the same
//! configuration name are still distinct entities, while log lines stay
//! readable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Unique identity of a reactor.
///
/// # Examples
///
/// ```
/// use rill_core::ReactorId;
///
/// let a = ReactorId::named("worker");
/// let b = ReactorId::named("worker");
/// // Same label, different reactors.
/// assert_ne!(a, b);
/// assert_eq!(a.name(), "worker");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactorId {
    uuid: Uuid,
    name: String,
}

impl ReactorId {
    /// Creates a fresh identity with the given human-readable name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
        }
    }

    /// Rebuilds an identity from its parts.
    ///
    /// Used on the decode side of wire drivers; new reactors should go
    /// through [`ReactorId::named`].
    pub fn from_parts(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
        }
    }

    /// The UUID this identity compares by.
    #[inline]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The human-readable label.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for ReactorId {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for ReactorId {}

impl Hash for ReactorId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl fmt::Display for ReactorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, &self.uuid.simple().to_string()[..8])
    }
}

/// Identity of a reactor system.
///
/// Envelopes carry both the source and destination system ids so inbound
/// driver loops can detect messages that looped back to the wrong process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemId {
    uuid: Uuid,
    name: String,
}

impl SystemId {
    /// Creates a fresh system identity with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
        }
    }

    /// The UUID this identity compares by.
    #[inline]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The human-readable label.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for SystemId {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for SystemId {}

impl Hash for SystemId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_reactor_id_uniqueness() {
        let a = ReactorId::named("echo");
        let b = ReactorId::named("echo");
        assert_ne!(a, b);
    }

    #[test]
    fn test_equality_ignores_name() {
        let a = ReactorId::named("first");
        let b = ReactorId::from_parts(a.uuid(), "second");
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_follows_equality() {
        let a = ReactorId::named("x");
        let b = ReactorId::from_parts(a.uuid(), "y");

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_serde_roundtrip() {
        let id = ReactorId::named("router");
        let bytes = postcard::to_allocvec(&id).unwrap();
        let decoded: ReactorId = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(id, decoded);
        assert_eq!(decoded.name(), "router");
    }

    #[test]
    fn test_system_id_display() {
        let id = SystemId::named("system-a");
        assert_eq!(format!("{}", id), "system-a");
    }
}
