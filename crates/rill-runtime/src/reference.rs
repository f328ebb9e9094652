//! Location-transparent reactor references.
//!
//! A [`ReactorRef`] pairs a serializable [`Address`] with a link to the
//! local system used for resolution. Sends always go through a reference
//! (never directly at a context), so local and remote destinations look the
//! same to callers. Only the address crosses the wire; the receiving driver
//! re-binds it to its own system.

use crate::delivery::Delivery;
use crate::system::SystemHandle;
use rill_core::{Address, AckingPolicy, ChannelId, Envelope, Payload, ReactorId, SystemId};
use std::fmt;

/// A handle for sending messages to one reactor, wherever it lives.
///
/// Two references are equal iff their reactor ids match.
#[derive(Clone)]
pub struct ReactorRef {
    addr: Address,
    link: SystemHandle,
}

impl ReactorRef {
    /// Binds an address to a local system for resolution.
    pub fn bind(addr: Address, system: &SystemHandle) -> Self {
        Self {
            addr,
            link: system.clone(),
        }
    }

    /// The serializable address.
    pub fn address(&self) -> &Address {
        &self.addr
    }

    /// The reactor's identity.
    pub fn id(&self) -> &ReactorId {
        self.addr.reactor()
    }

    /// The system owning the reactor.
    pub fn system_id(&self) -> &SystemId {
        self.addr.system()
    }

    /// The channel this reference routes over.
    pub fn channel_id(&self) -> &ChannelId {
        self.addr.channel()
    }

    /// The same reactor, addressed over a different channel.
    pub fn via(&self, channel: ChannelId) -> ReactorRef {
        ReactorRef {
            addr: Address::new(
                self.addr.reactor().clone(),
                self.addr.system().clone(),
                channel,
            ),
            link: self.link.clone(),
        }
    }

    /// Sends a payload, fire-and-forget: the completion resolves from the
    /// local send attempt.
    pub fn tell<P: Payload>(&self, sender: &ReactorRef, payload: &P) -> Delivery {
        self.tell_with_policy(sender, AckingPolicy::None, payload)
    }

    /// Sends a payload under an explicit acking policy.
    pub fn tell_with_policy<P: Payload>(
        &self,
        sender: &ReactorRef,
        acking: AckingPolicy,
        payload: &P,
    ) -> Delivery {
        let env = Envelope::new(
            self.link.next_seq(),
            sender.address().clone(),
            self.addr.clone(),
            acking,
            payload,
        );
        self.link.route(env)
    }
}

impl PartialEq for ReactorRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr.reactor() == other.addr.reactor()
    }
}

impl Eq for ReactorRef {}

impl fmt::Debug for ReactorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactorRef").field("addr", &self.addr).finish()
    }
}

impl fmt::Display for ReactorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.addr, f)
    }
}
