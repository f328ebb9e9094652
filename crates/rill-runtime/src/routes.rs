//! Routing table for peer channels.
//!
//! Maps `(peer system, channel)` to the gate metadata advertised through the
//! registry. Written only by the remoting root on registry events; read on
//! every non-local send.

use dashmap::DashMap;
use rill_core::{ChannelId, ChannelProperties, SystemId};

/// A peer's advertised channel entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gate {
    properties: ChannelProperties,
}

impl Gate {
    /// Builds a gate from advertised properties.
    pub fn new(properties: ChannelProperties) -> Self {
        Self { properties }
    }

    /// The reachability metadata for the peer channel.
    pub fn properties(&self) -> &ChannelProperties {
        &self.properties
    }
}

/// Single-writer, multi-reader table of peer gates.
#[derive(Default)]
pub struct RoutingTable {
    routes: DashMap<(SystemId, ChannelId), Gate>,
}

impl RoutingTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a route to a peer channel.
    pub fn register(&self, system: SystemId, channel: ChannelId, gate: Gate) {
        self.routes.insert((system, channel), gate);
    }

    /// Removes a route; returns whether it existed.
    pub fn unregister(&self, system: &SystemId, channel: &ChannelId) -> bool {
        self.routes
            .remove(&(system.clone(), channel.clone()))
            .is_some()
    }

    /// Looks up the gate for a peer channel.
    pub fn lookup(&self, system: &SystemId, channel: &ChannelId) -> Option<Gate> {
        self.routes
            .get(&(system.clone(), channel.clone()))
            .map(|entry| entry.value().clone())
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::ChannelType;

    #[test]
    fn test_register_and_lookup() {
        let table = RoutingTable::new();
        let peer = SystemId::named("peer");
        let channel = ChannelId::new(ChannelType::LocalJournal, "main");
        let gate = Gate::new(ChannelProperties::new().with("dir", "/tmp/peer"));

        table.register(peer.clone(), channel.clone(), gate.clone());
        assert_eq!(table.lookup(&peer, &channel), Some(gate));
    }

    #[test]
    fn test_reregister_replaces() {
        let table = RoutingTable::new();
        let peer = SystemId::named("peer");
        let channel = ChannelId::new(ChannelType::LocalJournal, "main");

        table.register(
            peer.clone(),
            channel.clone(),
            Gate::new(ChannelProperties::new().with("dir", "/old")),
        );
        table.register(
            peer.clone(),
            channel.clone(),
            Gate::new(ChannelProperties::new().with("dir", "/new")),
        );

        let gate = table.lookup(&peer, &channel).unwrap();
        assert_eq!(gate.properties().get("dir"), Some("/new"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let table = RoutingTable::new();
        let peer = SystemId::named("peer");
        let channel = ChannelId::new(ChannelType::LocalJournal, "main");

        assert!(!table.unregister(&peer, &channel));
        table.register(
            peer.clone(),
            channel.clone(),
            Gate::new(ChannelProperties::new()),
        );
        assert!(table.unregister(&peer, &channel));
        assert!(table.lookup(&peer, &channel).is_none());
    }
}
