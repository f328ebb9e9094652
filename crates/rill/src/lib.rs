//! # rill: a location-transparent reactor runtime
//!
//! Reactors are isolated entities that communicate exclusively by
//! asynchronous message passing. They are cooperatively scheduled over a
//! fixed pool of worker threads, and addressed through references that look
//! the same whether the destination lives in this process or behind a
//! journal channel advertised by a peer system.
//!
//! - **Mailboxes** order each reactor's messages; bounded variants push
//!   back on senders
//! - The **dispatcher** guarantees at most one worker runs a reactor at a
//!   time, on a consistent thread
//! - **Drivers** move envelopes in and out of channels; the journal driver
//!   reifies ordering in a persistent append-log
//! - The **remoting root** keeps the routing table converged against a
//!   service registry
//!
//! # Quick start
//!
//! ```
//! use rill::prelude::*;
//!
//! let system = ReactorSystem::new(SystemConfig::named("demo"));
//!
//! let greeter = system
//!     .spawn(
//!         ReactorConfig::named("greeter"),
//!         Reactions::builder()
//!             .on::<String>(|ctx, name: String| {
//!                 ctx.reply(&format!("hello, {name}"));
//!             })
//!             .build(),
//!     )
//!     .unwrap();
//!
//! # let _ = greeter;
//! system.shutdown();
//! ```

#![deny(missing_docs)]

pub use rill_core::{
    Address, AckingPolicy, ChannelId, ChannelProperties, ChannelType, DeadMessage, DecodeError,
    DeliveryConfirmation, DeliveryStatus, Envelope, Payload, ReactorId, ReactorInit, ReactorStop,
    SystemId,
};
pub use rill_journal::{JournalConfig, JournalDriver};
pub use rill_remoting::{attach, DirectoryBoard, Remoting};
pub use rill_runtime::{
    Completion, Delivery, DirectDriver, Dispatcher, Driver, DriverError, Gate, InterceptRule,
    Mailbox, MailboxKind, ReactorConfig, ReactorContext, ReactorRef, ReactorSystem, Reactions,
    RoutingTable, SpawnError, SystemConfig, SystemHandle,
};

/// Registry wire messages, re-exported for control-plane integrations.
pub mod registry {
    pub use rill_core::{
        ChannelIdPublicationRequest, RegistryDriverInitComplete, RegistryGateRemoved,
        RegistryGateUpserted, RegistrySubscriptionComplete, ServiceCancellationRequest,
        ServicePublicationFailed, ServicePublicationRequest,
        SynchronizationWithServiceRegistryRequest,
    };
}

/// Everything most applications need.
pub mod prelude {
    pub use rill_core::{
        AckingPolicy, ChannelId, ChannelType, DeadMessage, DeliveryStatus, Payload, ReactorId,
        ReactorInit, ReactorStop, SystemId,
    };
    pub use rill_journal::{JournalConfig, JournalDriver};
    pub use rill_remoting::{attach, DirectoryBoard};
    pub use rill_runtime::{
        InterceptRule, MailboxKind, ReactorConfig, ReactorContext, ReactorRef, ReactorSystem,
        Reactions, SystemConfig, SystemHandle,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _policy = AckingPolicy::None;
        let _status: Option<DeliveryStatus> = None;
        let _id = ReactorId::named("check");
    }
}
