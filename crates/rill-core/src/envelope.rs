//! The wire envelope.
//!
//! Every message travels as an immutable [`Envelope`]: a sequence number
//! monotonic per sending system, source and destination [`Address`]es, the
//! acknowledgement policy, and the tagged payload bytes. Envelopes crossing a
//! non-direct driver are postcard-encoded as-is.

use crate::channel::ChannelId;
use crate::delivery::AckingPolicy;
use crate::id::{ReactorId, SystemId};
use crate::payload::{DecodeError, Payload};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The location-transparent part of a reactor reference: who, in which
/// system, reachable over which channel.
///
/// Equality follows the reactor id; the system and channel are routing
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    reactor: ReactorId,
    system: SystemId,
    channel: ChannelId,
}

impl Address {
    /// Builds an address from its parts.
    pub fn new(reactor: ReactorId, system: SystemId, channel: ChannelId) -> Self {
        Self {
            reactor,
            system,
            channel,
        }
    }

    /// The reactor this address points at.
    #[inline]
    pub fn reactor(&self) -> &ReactorId {
        &self.reactor
    }

    /// The system owning the reactor.
    #[inline]
    pub fn system(&self) -> &SystemId {
        &self.system
    }

    /// The channel the reactor is reachable over.
    #[inline]
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.reactor == other.reactor
    }
}

impl Eq for Address {}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.reactor, self.system)
    }
}

/// An immutable message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    seq: u64,
    source: Address,
    dest: Address,
    acking: AckingPolicy,
    tag: String,
    bytes: Vec<u8>,
}

impl Envelope {
    /// Wraps an already-encoded payload.
    pub fn from_parts(
        seq: u64,
        source: Address,
        dest: Address,
        acking: AckingPolicy,
        tag: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            seq,
            source,
            dest,
            acking,
            tag: tag.into(),
            bytes,
        }
    }

    /// Encodes a typed payload into an envelope, precomputing its tag.
    pub fn new<P: Payload>(
        seq: u64,
        source: Address,
        dest: Address,
        acking: AckingPolicy,
        payload: &P,
    ) -> Self {
        Self::from_parts(seq, source, dest, acking, P::tag(), payload.encode())
    }

    /// Sequence number, monotonic per sending system.
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Who sent this envelope.
    #[inline]
    pub fn source(&self) -> &Address {
        &self.source
    }

    /// Who this envelope is for.
    #[inline]
    pub fn dest(&self) -> &Address {
        &self.dest
    }

    /// The acknowledgement policy the sender asked for.
    #[inline]
    pub fn acking(&self) -> AckingPolicy {
        self.acking
    }

    /// The payload's type tag.
    #[inline]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The encoded payload.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the payload is of type `P`.
    #[inline]
    pub fn is<P: Payload>(&self) -> bool {
        self.tag == P::tag()
    }

    /// Decodes the payload as `P`.
    pub fn payload<P: Payload>(&self) -> Result<P, DecodeError> {
        P::decode(&self.bytes)
    }

    /// Rewrites the source's channel.
    ///
    /// Egress drivers use this so the receiving system can route replies
    /// back over a channel the sender actually advertises.
    pub fn with_reply_channel(mut self, channel: ChannelId) -> Self {
        self.source = Address::new(
            self.source.reactor().clone(),
            self.source.system().clone(),
            channel,
        );
        self
    }

    /// Serializes the whole envelope for a wire-crossing driver.
    pub fn to_wire(&self) -> Vec<u8> {
        postcard::to_allocvec(self).expect("envelope serialization failed")
    }

    /// Deserializes an envelope read back from a wire-crossing driver.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, DecodeError> {
        postcard::from_bytes(bytes).map_err(DecodeError::from)
    }
}
