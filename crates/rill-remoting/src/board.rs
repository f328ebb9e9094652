//! In-process directory registry.
//!
//! A [`DirectoryBoard`] is the shared backing store for registry drivers of
//! co-located reactor systems: a gate table, a service table, and the list
//! of subscribed driver reactors. Every mutation is broadcast to the
//! subscribers as a registry event, which each driver forwards to its own
//! remoting root.

use dashmap::DashMap;
use parking_lot::Mutex;
use rill_core::{
    Address, ChannelId, ChannelProperties, RegistryGateRemoved, RegistryGateUpserted, SystemId,
};
use rill_runtime::ReactorRef;
use std::sync::Arc;

#[derive(Default)]
struct BoardInner {
    gates: DashMap<(SystemId, ChannelId), ChannelProperties>,
    services: DashMap<String, (Address, ChannelProperties)>,
    subscribers: Mutex<Vec<ReactorRef>>,
}

/// Cloneable handle to a shared directory registry.
#[derive(Clone, Default)]
pub struct DirectoryBoard {
    inner: Arc<BoardInner>,
}

impl DirectoryBoard {
    /// An empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a registry driver to board events.
    pub fn subscribe(&self, driver: ReactorRef) {
        let mut subscribers = self.inner.subscribers.lock();
        if !subscribers.contains(&driver) {
            subscribers.push(driver);
        }
    }

    /// Removes a registry driver from the subscriber list.
    pub fn unsubscribe(&self, driver: &ReactorRef) {
        self.inner.subscribers.lock().retain(|s| s != driver);
    }

    /// Snapshot of the advertised gates.
    pub fn gates(&self) -> Vec<(SystemId, ChannelId, ChannelProperties)> {
        self.inner
            .gates
            .iter()
            .map(|entry| {
                let (system, channel) = entry.key().clone();
                (system, channel, entry.value().clone())
            })
            .collect()
    }

    /// Inserts or replaces a gate and broadcasts the upsert.
    pub fn upsert_gate(&self, system: SystemId, channel: ChannelId, properties: ChannelProperties) {
        self.inner
            .gates
            .insert((system.clone(), channel.clone()), properties.clone());
        self.broadcast(&RegistryGateUpserted {
            system,
            channel,
            properties,
        });
    }

    /// Removes a gate and broadcasts the removal.
    pub fn remove_gate(&self, system: &SystemId, channel: &ChannelId) {
        if self
            .inner
            .gates
            .remove(&(system.clone(), channel.clone()))
            .is_some()
        {
            self.broadcast(&RegistryGateRemoved {
                system: system.clone(),
                channel: channel.clone(),
            });
        }
    }

    /// Removes every gate a system advertised, broadcasting each removal.
    pub fn remove_system_gates(&self, system: &SystemId) {
        let removed: Vec<(SystemId, ChannelId)> = self
            .inner
            .gates
            .iter()
            .filter(|entry| &entry.key().0 == system)
            .map(|entry| entry.key().clone())
            .collect();
        for (system, channel) in removed {
            self.remove_gate(&system, &channel);
        }
    }

    /// Publishes a named service gate.
    pub fn publish_service(
        &self,
        name: &str,
        gate: Address,
        properties: ChannelProperties,
    ) -> Result<(), String> {
        if name.is_empty() {
            return Err("service name must not be empty".to_string());
        }
        self.inner
            .services
            .insert(name.to_string(), (gate, properties));
        Ok(())
    }

    /// Withdraws a published service.
    pub fn cancel_service(&self, name: &str) {
        self.inner.services.remove(name);
    }

    /// Looks up a published service by name.
    pub fn service(&self, name: &str) -> Option<(Address, ChannelProperties)> {
        self.inner.services.get(name).map(|e| e.value().clone())
    }

    fn broadcast<P: rill_core::Payload>(&self, event: &P) {
        let subscribers = self.inner.subscribers.lock().clone();
        for subscriber in subscribers {
            // The subscriber forwards to its own remoting root; the event is
            // nominally self-sent.
            subscriber.tell(&subscriber, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::{ChannelType, ReactorId};

    #[test]
    fn test_gate_table_roundtrip() {
        let board = DirectoryBoard::new();
        let system = SystemId::named("a");
        let channel = ChannelId::new(ChannelType::LocalJournal, "main");

        board.upsert_gate(
            system.clone(),
            channel.clone(),
            ChannelProperties::new().with("dir", "/tmp/a"),
        );
        assert_eq!(board.gates().len(), 1);

        board.remove_gate(&system, &channel);
        assert!(board.gates().is_empty());
    }

    #[test]
    fn test_remove_system_gates() {
        let board = DirectoryBoard::new();
        let a = SystemId::named("a");
        let b = SystemId::named("b");
        let main = ChannelId::new(ChannelType::LocalJournal, "main");
        let aux = ChannelId::new(ChannelType::LocalJournal, "aux");

        board.upsert_gate(a.clone(), main.clone(), ChannelProperties::new());
        board.upsert_gate(a.clone(), aux, ChannelProperties::new());
        board.upsert_gate(b.clone(), main, ChannelProperties::new());

        board.remove_system_gates(&a);
        let gates = board.gates();
        assert_eq!(gates.len(), 1);
        assert_eq!(gates[0].0, b);
    }

    #[test]
    fn test_service_publication_rules() {
        let board = DirectoryBoard::new();
        let gate = Address::new(
            ReactorId::named("svc"),
            SystemId::named("a"),
            ChannelId::new(ChannelType::Direct, "direct"),
        );

        assert!(board
            .publish_service("lookup", gate.clone(), ChannelProperties::new())
            .is_ok());
        assert!(board.service("lookup").is_some());
        assert!(board
            .publish_service("", gate, ChannelProperties::new())
            .is_err());

        board.cancel_service("lookup");
        assert!(board.service("lookup").is_none());
    }
}
