//! Delivery outcomes and acknowledgement policies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a send attempt.
///
/// Surfaced as a value on completions, never thrown into the sender's
/// handler. Only [`DeliveryStatus::Delivered`] triggers a reschedule of the
/// destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    /// The destination mailbox accepted the message.
    Delivered,
    /// A bounded mailbox was full.
    Backpressured,
    /// The destination could not be resolved or the channel refused the send.
    NotDelivered,
    /// The message was rerouted to the system dead-letter reactor.
    DeadLetter,
}

impl DeliveryStatus {
    /// `true` only for [`DeliveryStatus::Delivered`].
    #[inline]
    pub fn is_delivered(self) -> bool {
        matches!(self, DeliveryStatus::Delivered)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Backpressured => "backpressured",
            DeliveryStatus::NotDelivered => "not-delivered",
            DeliveryStatus::DeadLetter => "dead-letter",
        };
        f.write_str(s)
    }
}

/// Whether and how a sender is told about delivery.
///
/// `ChannelRequired` resolves when the destination mailbox accepts the
/// message on its side of the channel; it does not wait for a durable flush.
/// Durability is a property of the channel itself, configured on the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckingPolicy {
    /// Fire and forget; the completion resolves from the local send attempt.
    #[default]
    None,
    /// The sender wants a completion that tracks the actual delivery.
    SenderRequired,
    /// The channel must confirm acceptance at the destination.
    ChannelRequired,
}

impl AckingPolicy {
    /// Whether this policy asks for a delivery confirmation beyond the local
    /// send attempt.
    #[inline]
    pub fn requires_ack(self) -> bool {
        !matches!(self, AckingPolicy::None)
    }
}
