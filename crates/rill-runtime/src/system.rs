//! The reactor system: registry, spawning, routing and lifecycle.
//!
//! A [`ReactorSystem`] is constructed explicitly, handed around as a
//! [`SystemHandle`], and torn down with [`ReactorSystem::shutdown`]; there
//! are no ambient singletons. It owns the context registry (the arena behind
//! every reactor reference), the dispatcher, the registered drivers and the
//! routing table.

use crate::context::{InterceptRule, ReactorContext};
use crate::delivery::Delivery;
use crate::dispatcher::{Dispatcher, DEFAULT_BATCH_SIZE};
use crate::driver::{DirectDriver, Driver};
use crate::error::{DriverError, SpawnError};
use crate::mailbox::{
    BlockingBoundedMailbox, BoundedMailbox, Mailbox, PriorityFn, PriorityMailbox,
    UnboundedMailbox,
};
use crate::reactions::Reactions;
use crate::reference::ReactorRef;
use crate::routes::RoutingTable;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rill_core::{
    Address, AckingPolicy, ChannelId, ChannelType, DeadMessage, DeliveryStatus, Envelope,
    Payload, ReactorId, ReactorInit, SystemId,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

/// How long `shutdown` waits for the hierarchy to terminate.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Which mailbox a reactor is spawned with.
#[derive(Clone)]
pub enum MailboxKind {
    /// Unbounded FIFO (the default).
    Unbounded,
    /// Bounded FIFO; overflow returns `Backpressured`.
    Bounded(usize),
    /// Bounded FIFO; overflow blocks the producer.
    BlockingBounded(usize),
    /// Unbounded, ordered by a priority function (lower first).
    Priority(PriorityFn),
}

impl MailboxKind {
    fn build(&self) -> Box<dyn Mailbox> {
        match self {
            MailboxKind::Unbounded => Box::new(UnboundedMailbox::new()),
            MailboxKind::Bounded(capacity) => Box::new(BoundedMailbox::new(*capacity)),
            MailboxKind::BlockingBounded(capacity) => {
                Box::new(BlockingBoundedMailbox::new(*capacity))
            }
            MailboxKind::Priority(priority) => Box::new(PriorityMailbox::new(priority.clone())),
        }
    }
}

/// Per-reactor spawn configuration.
#[derive(Clone)]
pub struct ReactorConfig {
    name: String,
    id: Option<ReactorId>,
    mailbox: MailboxKind,
    intercept: Vec<InterceptRule>,
}

impl ReactorConfig {
    /// A configuration with the given reactor name and defaults otherwise.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            mailbox: MailboxKind::Unbounded,
            intercept: Vec::new(),
        }
    }

    /// Spawns under an explicit identity instead of a fresh one.
    pub fn with_id(mut self, id: ReactorId) -> Self {
        self.id = Some(id);
        self
    }

    /// Selects the mailbox implementation.
    pub fn mailbox(mut self, kind: MailboxKind) -> Self {
        self.mailbox = kind;
        self
    }

    /// Installs initial intercept rules.
    pub fn intercept(mut self, rules: Vec<InterceptRule>) -> Self {
        self.intercept = rules;
        self
    }
}

/// System-wide configuration.
pub struct SystemConfig {
    name: String,
    workers: usize,
    batch_size: usize,
    drivers: Vec<Arc<dyn Driver>>,
}

impl SystemConfig {
    /// A configuration with the given system name and defaults otherwise.
    pub fn named(name: impl Into<String>) -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get().min(4))
            .unwrap_or(2);
        Self {
            name: name.into(),
            workers,
            batch_size: DEFAULT_BATCH_SIZE,
            drivers: Vec::new(),
        }
    }

    /// Number of dispatcher worker threads.
    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count;
        self
    }

    /// Messages drained per scheduling turn.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Registers a driver at boot, after the direct driver.
    pub fn driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.drivers.push(driver);
        self
    }
}

struct SystemShared {
    id: SystemId,
    registry: DashMap<ReactorId, Arc<ReactorContext>>,
    dispatcher: Dispatcher,
    drivers: RwLock<Vec<Arc<dyn Driver>>>,
    driver_threads: Mutex<Vec<thread::JoinHandle<()>>>,
    routes: RoutingTable,
    sniffers: DashMap<String, Vec<ReactorRef>>,
    seq: AtomicU64,
    root: OnceLock<ReactorRef>,
    dead_letters: OnceLock<ReactorRef>,
}

/// Cheap, cloneable handle to a running system.
#[derive(Clone)]
pub struct SystemHandle {
    shared: Arc<SystemShared>,
}

impl SystemHandle {
    /// This system's identity.
    pub fn id(&self) -> &SystemId {
        &self.shared.id
    }

    /// Next envelope sequence number, monotonic for this system.
    pub fn next_seq(&self) -> u64 {
        self.shared.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Looks up a live reactor context.
    pub fn context(&self, id: &ReactorId) -> Option<Arc<ReactorContext>> {
        self.shared.registry.get(id).map(|entry| entry.value().clone())
    }

    /// Number of live reactors.
    pub fn reactor_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Asks the dispatcher to consider a context for execution.
    pub fn dispatch(&self, ctx: Arc<ReactorContext>) {
        self.shared.dispatcher.dispatch(ctx);
    }

    /// The routing table for peer channels.
    pub fn routes(&self) -> &RoutingTable {
        &self.shared.routes
    }

    /// The system root reactor.
    pub fn root(&self) -> ReactorRef {
        self.shared
            .root
            .get()
            .expect("system root not yet spawned")
            .clone()
    }

    /// The system dead-letter reactor.
    pub fn dead_letters(&self) -> ReactorRef {
        self.shared
            .dead_letters
            .get()
            .expect("dead-letter reactor not yet spawned")
            .clone()
    }

    // === Drivers ===

    /// Registers a driver: runs its init, then spawns its loop on a
    /// dedicated thread. Init failure is fatal for this driver only.
    pub fn register_driver(&self, driver: Arc<dyn Driver>) -> Result<(), DriverError> {
        driver.init_driver_loop(self.clone())?;
        let channel = driver.channel_id();
        if let Some(driver_loop) = driver.driver_loop() {
            let handle = thread::Builder::new()
                .name(format!("rill-driver-{}", channel.name()))
                .spawn(driver_loop)
                .map_err(|e| DriverError::Io {
                    channel: channel.clone(),
                    source: e,
                })?;
            self.shared.driver_threads.lock().push(handle);
        }
        self.shared.drivers.write().push(driver);
        tracing::info!(%channel, "driver registered");
        Ok(())
    }

    /// The driver owning a channel.
    pub fn driver_for(&self, channel: &ChannelId) -> Option<Arc<dyn Driver>> {
        self.shared
            .drivers
            .read()
            .iter()
            .find(|d| &d.channel_id() == channel)
            .cloned()
    }

    /// The first registered driver of a channel type; used for egress toward
    /// peer gates of that type.
    pub fn driver_of_kind(&self, kind: ChannelType) -> Option<Arc<dyn Driver>> {
        self.shared
            .drivers
            .read()
            .iter()
            .find(|d| d.channel_id().kind() == kind)
            .cloned()
    }

    /// All drivers advertised to the registry.
    pub fn remoting_drivers(&self) -> Vec<Arc<dyn Driver>> {
        self.shared
            .drivers
            .read()
            .iter()
            .filter(|d| d.is_remoting())
            .cloned()
            .collect()
    }

    // === Send path ===

    /// Resolves an envelope to a driver and hands it over.
    ///
    /// Local destinations use the driver owning the destination channel;
    /// non-local destinations resolve through the routing table to a gate.
    /// A route miss resolves to `NotDelivered`.
    pub fn route(&self, env: Envelope) -> Delivery {
        if env.dest().system() == self.id() {
            match self.driver_for(env.dest().channel()) {
                Some(driver) => driver.async_send(env),
                None => {
                    tracing::debug!(
                        channel = %env.dest().channel(),
                        "no local driver for destination channel"
                    );
                    Delivery::resolved(DeliveryStatus::NotDelivered)
                }
            }
        } else {
            let system = env.dest().system().clone();
            let channel = env.dest().channel().clone();
            match self.shared.routes.lookup(&system, &channel) {
                Some(gate) => match self.driver_of_kind(channel.kind()) {
                    // Replies must come back over a channel this system
                    // advertises, not the sender's local direct channel.
                    Some(driver) => {
                        let env = env.with_reply_channel(driver.channel_id());
                        driver.async_send_gate(&gate, env)
                    }
                    None => {
                        tracing::debug!(
                            %channel,
                            peer = %system,
                            "no egress driver for gate channel type"
                        );
                        Delivery::resolved(DeliveryStatus::NotDelivered)
                    }
                },
                None => {
                    tracing::debug!(peer = %system, %channel, "no route to peer channel");
                    Delivery::resolved(DeliveryStatus::NotDelivered)
                }
            }
        }
    }

    /// Reroutes an undeliverable envelope to the dead-letter reactor,
    /// preserving the original sender and payload.
    pub fn dead_letter(&self, env: &Envelope) {
        let Some(dl) = self.shared.dead_letters.get() else {
            tracing::warn!(tag = env.tag(), "undeliverable message and no dead-letter reactor");
            return;
        };
        if env.dest().reactor() == dl.id() {
            tracing::warn!(tag = env.tag(), "dead-letter reactor itself unreachable");
            return;
        }
        let dead = DeadMessage::new(env.tag().to_string(), env.bytes().to_vec());
        let denv = Envelope::new(
            self.next_seq(),
            env.source().clone(),
            dl.address().clone(),
            AckingPolicy::None,
            &dead,
        );
        if let Some(driver) = self.driver_for(&DirectDriver::channel()) {
            driver.send(denv);
        }
    }

    // === Intercept rules ===

    /// Re-indexes a reactor's intercept rules. Called under the owning
    /// context's structural write lock.
    pub fn update_interceptors(
        &self,
        owner: &ReactorRef,
        old_rules: &[InterceptRule],
        new_rules: &[InterceptRule],
    ) {
        for rule in old_rules {
            if let Some(mut subs) = self.shared.sniffers.get_mut(rule.tag()) {
                subs.retain(|r| r != owner);
            }
        }
        for rule in new_rules {
            self.shared
                .sniffers
                .entry(rule.tag().to_string())
                .or_default()
                .push(owner.clone());
        }
    }

    /// Whether any intercept subscriber is registered for a tag.
    pub fn has_sniffers(&self, tag: &str) -> bool {
        self.shared
            .sniffers
            .get(tag)
            .map(|subs| !subs.value().is_empty())
            .unwrap_or(false)
    }

    /// Fans a copy of a locally delivered envelope out to every intercept
    /// subscriber matching its tag, skipping the actual destination.
    pub fn sniff(&self, env: &Envelope) {
        let subscribers: Vec<ReactorRef> = match self.shared.sniffers.get(env.tag()) {
            Some(subs) => subs.value().clone(),
            None => return,
        };
        for subscriber in subscribers {
            if subscriber.id() == env.dest().reactor() {
                continue;
            }
            if let Some(ctx) = self.context(subscriber.id()) {
                if ctx.mailbox().deliver(env.clone()).is_delivered() {
                    self.dispatch(ctx);
                }
            }
        }
    }

    // === Spawning ===

    /// Spawns a reactor under the system root.
    pub fn spawn(
        &self,
        config: ReactorConfig,
        reactions: Reactions,
    ) -> Result<ReactorRef, SpawnError> {
        let root = self.root();
        self.spawn_internal(Some(&root), config, reactions)
    }

    /// Spawns a child of an existing reactor.
    pub fn spawn_child(
        &self,
        parent: &ReactorRef,
        config: ReactorConfig,
        reactions: Reactions,
    ) -> Result<ReactorRef, SpawnError> {
        if self.context(parent.id()).is_none() {
            return Err(SpawnError::ParentNotFound(parent.id().clone()));
        }
        self.spawn_internal(Some(parent), config, reactions)
    }

    fn spawn_internal(
        &self,
        parent: Option<&ReactorRef>,
        config: ReactorConfig,
        reactions: Reactions,
    ) -> Result<ReactorRef, SpawnError> {
        let id = config
            .id
            .clone()
            .unwrap_or_else(|| ReactorId::named(&config.name));
        let addr = Address::new(id.clone(), self.id().clone(), DirectDriver::channel());
        let self_ref = ReactorRef::bind(addr, self);
        let parent_ref = parent.cloned().unwrap_or_else(|| self_ref.clone());

        let ctx = ReactorContext::create(
            self_ref.clone(),
            parent_ref.clone(),
            config.mailbox.build(),
            self.clone(),
            config.intercept.clone(),
            reactions,
        );

        match self.shared.registry.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                tracing::error!(reactor = %id, "duplicate reactor id rejected");
                return Err(SpawnError::DuplicateReactorId(id));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(ctx.clone());
            }
        }

        if parent_ref.id() != self_ref.id() {
            if let Some(parent_ctx) = self.context(parent_ref.id()) {
                parent_ctx.register_child(self_ref.clone());
            }
        }

        self.update_interceptors(&self_ref, &[], &config.intercept);

        let init = Envelope::new(
            self.next_seq(),
            parent_ref.address().clone(),
            self_ref.address().clone(),
            AckingPolicy::None,
            &ReactorInit,
        );
        if ctx.mailbox().deliver(init).is_delivered() {
            self.dispatch(ctx);
        }
        tracing::debug!(reactor = %self_ref.id(), parent = %parent_ref.id(), "reactor spawned");
        Ok(self_ref)
    }

    /// Removes a terminated context from the registry, its parent's children
    /// and the intercept index. Called by the dispatcher during finalize.
    pub(crate) fn unregister(&self, ctx: &Arc<ReactorContext>) {
        self.shared.registry.remove(ctx.id());
        let rules = ctx.intercept_rules();
        self.update_interceptors(ctx.self_ref(), &rules, &[]);
        if ctx.parent().id() != ctx.id() {
            if let Some(parent_ctx) = self.context(ctx.parent().id()) {
                parent_ctx.unregister_child(ctx.self_ref());
            }
        }
    }
}

/// A running reactor system.
pub struct ReactorSystem {
    handle: SystemHandle,
}

impl ReactorSystem {
    /// Builds the dispatcher, spawns the system reactors and registers the
    /// configured drivers. Driver init failures are logged and that driver
    /// skipped; the rest of the system keeps operating.
    pub fn new(config: SystemConfig) -> Self {
        let id = SystemId::named(&config.name);
        tracing::info!(system = %id, workers = config.workers, "starting reactor system");

        let shared = Arc::new(SystemShared {
            id,
            registry: DashMap::new(),
            dispatcher: Dispatcher::new(config.workers, config.batch_size),
            drivers: RwLock::new(Vec::new()),
            driver_threads: Mutex::new(Vec::new()),
            routes: RoutingTable::new(),
            sniffers: DashMap::new(),
            seq: AtomicU64::new(1),
            root: OnceLock::new(),
            dead_letters: OnceLock::new(),
        });
        let handle = SystemHandle { shared };

        // The direct driver is always present.
        if let Err(error) = handle.register_driver(Arc::new(DirectDriver::new())) {
            tracing::error!(%error, "direct driver failed to initialize");
        }

        let root = handle
            .spawn_internal(None, ReactorConfig::named("root"), Reactions::ignore_all())
            .expect("root reactor spawn cannot conflict");
        let _ = handle.shared.root.set(root);

        let dead_letters = handle
            .spawn(ReactorConfig::named("deadletters"), dead_letter_reactions())
            .expect("dead-letter reactor spawn cannot conflict");
        let _ = handle.shared.dead_letters.set(dead_letters);

        for driver in config.drivers {
            let channel = driver.channel_id();
            if let Err(error) = handle.register_driver(driver) {
                tracing::error!(%channel, %error, "driver failed to initialize, channel disabled");
            }
        }

        Self { handle }
    }

    /// A cloneable handle to this system.
    pub fn handle(&self) -> SystemHandle {
        self.handle.clone()
    }

    /// This system's identity.
    pub fn id(&self) -> &SystemId {
        self.handle.id()
    }

    /// Spawns a reactor under the system root.
    pub fn spawn(
        &self,
        config: ReactorConfig,
        reactions: Reactions,
    ) -> Result<ReactorRef, SpawnError> {
        self.handle.spawn(config, reactions)
    }

    /// The system dead-letter reactor.
    pub fn dead_letters(&self) -> ReactorRef {
        self.handle.dead_letters()
    }

    /// Stops the reactor hierarchy, then cleans drivers in reverse
    /// registration order and joins the workers.
    pub fn shutdown(&self) {
        tracing::info!(system = %self.handle.id(), "shutting down reactor system");
        let root = self.handle.root();
        if let Some(root_ctx) = self.handle.context(root.id()) {
            if !root_ctx.stop().wait_timeout(SHUTDOWN_GRACE) {
                tracing::warn!("hierarchy did not terminate within the shutdown grace period");
            }
        }

        let drivers: Vec<Arc<dyn Driver>> = {
            let mut guard = self.handle.shared.drivers.write();
            std::mem::take(&mut *guard)
        };
        for driver in drivers.into_iter().rev() {
            driver.clean_driver_loop();
        }
        let threads = {
            let mut guard = self.handle.shared.driver_threads.lock();
            std::mem::take(&mut *guard)
        };
        for handle in threads {
            let _ = handle.join();
        }

        self.handle.shared.dispatcher.shutdown();
    }
}

fn dead_letter_reactions() -> Reactions {
    Reactions::builder()
        .on::<DeadMessage>(|ctx, dead| {
            tracing::warn!(
                original_sender = %ctx.sender().id(),
                tag = %dead.tag,
                "message routed to dead letters"
            );
        })
        .build()
}
