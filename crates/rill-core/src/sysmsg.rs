//! Synthetic lifecycle payloads and registry wire messages.
//!
//! Lifecycle payloads are delivered by the runtime itself: `ReactorInit` is
//! the first message every reactor handles, `ReactorStop` the last, and
//! `DeadMessage` wraps anything whose destination could not be resolved.
//!
//! The registry messages form the control-plane vocabulary between the
//! remoting root and its registry-driver children.

use crate::channel::{ChannelId, ChannelProperties};
use crate::delivery::DeliveryStatus;
use crate::envelope::Address;
use crate::id::SystemId;
use serde::{Deserialize, Serialize};

/// First message delivered to every reactor after spawn.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReactorInit;

/// Last message delivered to a reactor, after its children terminated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReactorStop;

/// An undeliverable payload rerouted to the system dead-letter reactor.
///
/// Carries the original payload verbatim; the envelope's source stays the
/// original sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadMessage {
    /// Tag of the original payload.
    pub tag: String,
    /// Encoded original payload.
    pub bytes: Vec<u8>,
}

impl DeadMessage {
    /// Wraps an undeliverable payload.
    pub fn new(tag: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            tag: tag.into(),
            bytes,
        }
    }
}

/// Driver-level delivery confirmation for acked channels.
///
/// Consumed by the inbound driver loop to resolve the matching pending ack;
/// never offered to a mailbox.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeliveryConfirmation {
    /// Sequence number of the confirmed envelope.
    pub seq: u64,
    /// How delivery went at the destination.
    pub status: DeliveryStatus,
}

// === Registry control plane ===

/// A registry driver finished its own initialization.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RegistryDriverInitComplete;

/// A registry driver is subscribed and has replayed the current gate set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RegistrySubscriptionComplete;

/// Ask a registry driver to (re)synchronize with its backing registry.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SynchronizationWithServiceRegistryRequest;

/// Publish one of this system's channels to the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelIdPublicationRequest {
    /// The publishing system.
    pub system: SystemId,
    /// The channel being advertised.
    pub channel: ChannelId,
    /// How to reach it.
    pub properties: ChannelProperties,
}

/// A peer channel appeared or changed in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryGateUpserted {
    /// The advertising system.
    pub system: SystemId,
    /// The advertised channel.
    pub channel: ChannelId,
    /// Its reachability metadata.
    pub properties: ChannelProperties,
}

/// A peer channel disappeared from the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryGateRemoved {
    /// The system whose entry was removed.
    pub system: SystemId,
    /// The removed channel.
    pub channel: ChannelId,
}

/// Publish a named service gate to the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePublicationRequest {
    /// Name the service is discovered by.
    pub service_name: String,
    /// Address answering for the service.
    pub service_gate: Address,
    /// Service metadata.
    pub properties: ChannelProperties,
}

/// Withdraw a previously published service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCancellationRequest {
    /// Name the service was published under.
    pub service_name: String,
}

/// A registry driver failed to publish a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePublicationFailed {
    /// The service that failed to publish.
    pub service_name: String,
    /// Why.
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Payload;

    #[test]
    fn test_lifecycle_tags() {
        assert_eq!(ReactorInit::tag(), "ReactorInit");
        assert_eq!(ReactorStop::tag(), "ReactorStop");
        assert_eq!(DeadMessage::tag(), "DeadMessage");
    }

    #[test]
    fn test_dead_message_preserves_payload() {
        let original = "lost".to_string();
        let dead = DeadMessage::new(String::tag(), original.encode());
        let decoded = DeadMessage::decode(&dead.encode()).unwrap();
        assert_eq!(decoded.tag, "String");
        assert_eq!(String::decode(&decoded.bytes).unwrap(), "lost");
    }

    #[test]
    fn test_registry_message_roundtrip() {
        use crate::channel::{ChannelId, ChannelType};

        let msg = RegistryGateUpserted {
            system: SystemId::named("peer"),
            channel: ChannelId::new(ChannelType::LocalJournal, "main"),
            properties: ChannelProperties::new().with("dir", "/var/rill"),
        };
        let decoded = RegistryGateUpserted::decode(&msg.encode()).unwrap();
        assert_eq!(decoded.system, msg.system);
        assert_eq!(decoded.channel, msg.channel);
        assert_eq!(decoded.properties.get("dir"), Some("/var/rill"));
    }
}
