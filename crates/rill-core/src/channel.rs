//! Channel identifiers and properties.
//!
//! A channel is one transport instance owned by a driver. A system may expose
//! several channels at once; the pair of [`ChannelType`] and name uniquely
//! identifies one of them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The transport family a channel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    /// In-process direct mailbox deposit. Never advertised to peers.
    Direct,
    /// Journal-backed channel: egress appends to a log, ingress tails it.
    LocalJournal,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelType::Direct => f.write_str("direct"),
            ChannelType::LocalJournal => f.write_str("local-journal"),
        }
    }
}

/// Unique name of a transport instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId {
    kind: ChannelType,
    name: String,
}

impl ChannelId {
    /// Builds a channel id from its type and instance name.
    pub fn new(kind: ChannelType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// The transport family.
    #[inline]
    pub fn kind(&self) -> ChannelType {
        self.kind
    }

    /// The instance name within the family.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// String key/value metadata advertised with a channel.
///
/// Gate entries in the routing table carry these so a peer knows how to reach
/// the channel (for a journal channel, the directory to append into).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelProperties {
    entries: BTreeMap<String, String>,
}

impl ChannelProperties {
    /// An empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Inserts a property, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Looks up a property.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether any properties are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_display() {
        let id = ChannelId::new(ChannelType::LocalJournal, "main");
        assert_eq!(format!("{}", id), "local-journal:main");
    }

    #[test]
    fn test_channel_id_equality() {
        let a = ChannelId::new(ChannelType::Direct, "direct");
        let b = ChannelId::new(ChannelType::Direct, "direct");
        let c = ChannelId::new(ChannelType::LocalJournal, "direct");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_properties_roundtrip() {
        let props = ChannelProperties::new()
            .with("dir", "/tmp/journal")
            .with("durable", "true");
        let bytes = postcard::to_allocvec(&props).unwrap();
        let decoded: ChannelProperties = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.get("dir"), Some("/tmp/journal"));
        assert_eq!(decoded, props);
    }
}
