//! Driver abstraction: message ingress and egress for one channel.
//!
//! A driver owns exactly one channel. Egress goes through [`Driver::send`]
//! (or the ack-tracking [`Driver::async_send`]); ingress is the driver loop,
//! which hands inbound envelopes to [`DriverCore::offer_message`]. The core
//! also tracks pending acknowledgements for channels that do not natively
//! confirm delivery.

use crate::delivery::{Delivery, DeliveryTrigger};
use crate::error::DriverError;
use crate::routes::Gate;
use crate::system::SystemHandle;
use dashmap::DashMap;
use rill_core::{ChannelId, ChannelProperties, ChannelType, DeliveryStatus, Envelope};

/// One channel's ingress/egress endpoint.
pub trait Driver: Send + Sync {
    /// The channel this driver owns.
    fn channel_id(&self) -> ChannelId;

    /// Metadata advertised with the channel (how peers reach it).
    fn channel_properties(&self) -> ChannelProperties {
        ChannelProperties::new()
    }

    /// Whether this channel is advertised to the registry for cross-system
    /// traffic.
    fn is_remoting(&self) -> bool {
        false
    }

    /// Whether the channel inherently provides durable delivery acks.
    fn channel_requires_delivery_ack(&self) -> bool {
        false
    }

    /// Acquires channel resources. Called once, before the loop runs. A
    /// failure is fatal for this driver only.
    fn init_driver_loop(&self, system: SystemHandle) -> Result<(), DriverError>;

    /// The ingress loop, run by a dedicated thread. `None` for drivers with
    /// a synchronous ingress path.
    fn driver_loop(&self) -> Option<Box<dyn FnOnce() + Send>> {
        None
    }

    /// Egress: hand the envelope to the channel. Returns the egress outcome,
    /// not the remote delivery outcome.
    fn send(&self, env: Envelope) -> DeliveryStatus;

    /// Egress with ack tracking: when the envelope's policy requires an ack
    /// and the channel does not natively provide one, the returned handle
    /// resolves when the matching confirmation is observed.
    fn async_send(&self, env: Envelope) -> Delivery {
        Delivery::resolved(self.send(env))
    }

    /// Egress toward a peer's advertised gate. Drivers that cannot reach
    /// other systems refuse.
    fn send_gate(&self, _gate: &Gate, _env: &Envelope) -> DeliveryStatus {
        DeliveryStatus::NotDelivered
    }

    /// Gate egress with ack tracking, like [`Driver::async_send`].
    fn async_send_gate(&self, gate: &Gate, env: Envelope) -> Delivery {
        Delivery::resolved(self.send_gate(gate, &env))
    }

    /// Releases channel resources. Idempotent; must succeed on every exit
    /// path, including init failure and loop interruption.
    fn clean_driver_loop(&self) {}
}

/// Machinery shared by driver implementations: pending-ack tracking and the
/// inbound offer path.
#[derive(Default)]
pub struct DriverCore {
    pending_acks: DashMap<u64, DeliveryTrigger>,
}

impl DriverCore {
    /// An empty core.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pending ack for `seq`, returning the sender-side handle.
    pub fn register_pending_ack(&self, seq: u64) -> Delivery {
        let (trigger, delivery) = Delivery::pending();
        self.pending_acks.insert(seq, trigger);
        delivery
    }

    /// Resolves the pending ack for `seq`, if one is registered.
    pub fn complete_ack(&self, seq: u64, status: DeliveryStatus) {
        if let Some((_, trigger)) = self.pending_acks.remove(&seq) {
            trigger.complete(status);
        }
    }

    /// Inbound path: deposit an envelope into its destination mailbox.
    ///
    /// Resolves the destination context by reactor id. Present: deposit the
    /// envelope, and on success reschedule the destination and fan a copy
    /// out to matching intercept subscribers (observers only ever see
    /// traffic the destination actually accepted). Absent: the original
    /// payload is rerouted to the system dead-letter reactor as a
    /// `DeadMessage`.
    ///
    /// Pending acks are completed only for locally originated envelopes:
    /// sequence numbers are unique per sending system, and a remote sender's
    /// ack is resolved by a `DeliveryConfirmation` traveling back over the
    /// channel, never by this table.
    pub fn offer_message(&self, system: &SystemHandle, env: Envelope) -> DeliveryStatus {
        let seq = env.seq();
        let local_origin = env.source().system() == system.id();

        if env.dest().system() != system.id() {
            // A looped or misrouted envelope; dropping it here keeps it from
            // bouncing between systems.
            tracing::warn!(
                dest_system = %env.dest().system(),
                local_system = %system.id(),
                tag = env.tag(),
                "dropping envelope addressed to a different system"
            );
            if local_origin {
                self.complete_ack(seq, DeliveryStatus::NotDelivered);
            }
            return DeliveryStatus::NotDelivered;
        }

        match system.context(env.dest().reactor()) {
            Some(ctx) => {
                // Deliver consumes the envelope; keep a copy only if someone
                // is actually sniffing this tag.
                let sniff_copy = system.has_sniffers(env.tag()).then(|| env.clone());
                let status = ctx.mailbox().deliver(env);
                if status.is_delivered() {
                    system.dispatch(ctx);
                    if let Some(copy) = sniff_copy {
                        system.sniff(&copy);
                    }
                }
                if local_origin {
                    self.complete_ack(seq, status);
                }
                status
            }
            None => {
                // The sender's ack sees the failure; the payload itself is
                // preserved at the dead-letter reactor.
                if local_origin {
                    self.complete_ack(seq, DeliveryStatus::NotDelivered);
                }
                system.dead_letter(&env);
                DeliveryStatus::DeadLetter
            }
        }
    }
}

/// The always-present in-process channel: direct mailbox deposit, no loop
/// thread, never advertised.
pub struct DirectDriver {
    core: DriverCore,
    system: std::sync::OnceLock<SystemHandle>,
}

impl DirectDriver {
    /// Creates the direct driver.
    pub fn new() -> Self {
        Self {
            core: DriverCore::new(),
            system: std::sync::OnceLock::new(),
        }
    }

    /// The channel id every locally spawned reactor is addressed over by
    /// default.
    pub fn channel() -> ChannelId {
        ChannelId::new(ChannelType::Direct, "direct")
    }
}

impl Default for DirectDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for DirectDriver {
    fn channel_id(&self) -> ChannelId {
        Self::channel()
    }

    fn init_driver_loop(&self, system: SystemHandle) -> Result<(), DriverError> {
        let _ = self.system.set(system);
        Ok(())
    }

    fn send(&self, env: Envelope) -> DeliveryStatus {
        match self.system.get() {
            Some(system) => self.core.offer_message(system, env),
            None => DeliveryStatus::NotDelivered,
        }
    }

    fn async_send(&self, env: Envelope) -> Delivery {
        let Some(system) = self.system.get() else {
            return Delivery::resolved(DeliveryStatus::NotDelivered);
        };
        if env.acking().requires_ack() {
            // Delivery is synchronous here, so the ack resolves before this
            // call returns.
            let delivery = self.core.register_pending_ack(env.seq());
            self.core.offer_message(system, env);
            delivery
        } else {
            Delivery::resolved(self.core.offer_message(system, env))
        }
    }
}
