//! Runtime machinery for the rill reactor system.
//!
//! Reactors are isolated entities communicating only through asynchronous
//! message passing. This crate provides their execution model:
//!
//! - **Mailboxes**: ordered per-reactor queues behind a common contract
//! - **Contexts**: per-reactor state, hierarchy and scheduling flags
//! - **Dispatcher**: a fixed worker pool with per-reactor thread affinity
//! - **Drivers**: pluggable ingress/egress channels with ack tracking
//! - **References**: location-transparent handles resolving through drivers
//! - **System**: explicit construction, registry and teardown
//!
//! The single-worker guarantee is the load-bearing invariant: at any instant
//! at most one worker executes messages of a given reactor, so reaction
//! handlers are effectively single-threaded without user-side locking.

#![deny(missing_docs)]

mod completion;
mod context;
mod delivery;
mod dispatcher;
mod driver;
mod error;
mod mailbox;
mod reactions;
mod reference;
mod routes;
mod system;

pub use completion::Completion;
pub use context::{InterceptRule, ReactorContext};
pub use delivery::{Delivery, DeliveryTrigger};
pub use dispatcher::{Dispatcher, DEFAULT_BATCH_SIZE};
pub use driver::{DirectDriver, Driver, DriverCore};
pub use error::{DriverError, SpawnError};
pub use mailbox::{
    BlockingBoundedMailbox, BoundedMailbox, Mailbox, PriorityFn, PriorityMailbox,
    UnboundedMailbox,
};
pub use reactions::{Reactions, ReactionsBuilder};
pub use reference::ReactorRef;
pub use routes::{Gate, RoutingTable};
pub use system::{MailboxKind, ReactorConfig, ReactorSystem, SystemConfig, SystemHandle};
