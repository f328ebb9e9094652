//! Core types for the rill reactor runtime.
//!
//! This crate holds everything that crosses a wire or a crate boundary:
//! identifiers, channel names, delivery vocabulary, the payload codec, the
//! message envelope, and the synthetic/control-plane message set. It has no
//! runtime machinery of its own.

#![deny(missing_docs)]

mod channel;
mod delivery;
mod envelope;
mod id;
mod payload;
mod sysmsg;

pub use channel::{ChannelId, ChannelProperties, ChannelType};
pub use delivery::{AckingPolicy, DeliveryStatus};
pub use envelope::{Address, Envelope};
pub use id::{ReactorId, SystemId};
pub use payload::{DecodeError, Payload};
pub use sysmsg::{
    ChannelIdPublicationRequest, DeadMessage, DeliveryConfirmation, ReactorInit, ReactorStop,
    RegistryDriverInitComplete, RegistryGateRemoved, RegistryGateUpserted,
    RegistrySubscriptionComplete, ServiceCancellationRequest, ServicePublicationFailed,
    ServicePublicationRequest, SynchronizationWithServiceRegistryRequest,
};
