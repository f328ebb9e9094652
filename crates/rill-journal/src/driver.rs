//! The journal-backed local driver.
//!
//! Egress appends wire-encoded envelopes to the channel's journal; a
//! dedicated tail thread reads them back in append order and offers them to
//! local mailboxes. The journal is the canonical ordering for reactors
//! reached over this channel, it survives restarts, and external tools can
//! observe the traffic without a network hop.
//!
//! The same driver reaches peer systems: a gate advertised through the
//! registry names the peer channel's directory, and egress appends straight
//! into the peer's journal. Acked cross-system traffic is confirmed by
//! appending a `DeliveryConfirmation` back through the symmetric gate; the
//! tail loop consumes confirmations instead of offering them.

use crate::log::{journal_path, Appender, JournalError, Tailer};
use crate::pauser::Pauser;
use dashmap::DashMap;
use parking_lot::Mutex;
use rill_core::{
    Address, AckingPolicy, ChannelId, ChannelProperties, ChannelType, DeliveryConfirmation,
    DeliveryStatus, Envelope,
};
use rill_runtime::{Delivery, Driver, DriverCore, DriverError, Gate, SystemHandle};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Configuration for a journal channel.
#[derive(Clone)]
pub struct JournalConfig {
    dir: PathBuf,
    channel_name: String,
    durable: bool,
    ack_required: bool,
    pause_floor: Duration,
    pause_ceiling: Duration,
}

impl JournalConfig {
    /// A journal channel living in `dir`, with defaults otherwise.
    pub fn new(dir: impl Into<PathBuf>, channel_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            channel_name: channel_name.into(),
            durable: false,
            ack_required: false,
            pause_floor: Duration::from_millis(1),
            pause_ceiling: Duration::from_millis(100),
        }
    }

    /// Syncs data to disk on every append.
    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Treats every send over this channel as requiring a delivery ack.
    pub fn ack_required(mut self, required: bool) -> Self {
        self.ack_required = required;
        self
    }

    /// Bounds for the tail loop's idle backoff.
    pub fn backoff(mut self, floor: Duration, ceiling: Duration) -> Self {
        self.pause_floor = floor;
        self.pause_ceiling = ceiling;
        self
    }

    /// The channel this configuration describes.
    pub fn channel_id(&self) -> ChannelId {
        ChannelId::new(ChannelType::LocalJournal, &self.channel_name)
    }

    fn properties(&self) -> ChannelProperties {
        ChannelProperties::new()
            .with("dir", self.dir.display().to_string())
            .with("durable", self.durable.to_string())
    }
}

struct Inner {
    config: JournalConfig,
    core: DriverCore,
    system: OnceLock<SystemHandle>,
    appender: Mutex<Option<Appender>>,
    tailer: Mutex<Option<Tailer>>,
    gate_appenders: DashMap<PathBuf, Arc<Appender>>,
    shutdown: AtomicBool,
}

/// Driver for one journal channel.
pub struct JournalDriver {
    inner: Arc<Inner>,
}

impl JournalDriver {
    /// Creates the driver; resources are acquired in `init_driver_loop`.
    pub fn new(config: JournalConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                core: DriverCore::new(),
                system: OnceLock::new(),
                appender: Mutex::new(None),
                tailer: Mutex::new(None),
                gate_appenders: DashMap::new(),
                shutdown: AtomicBool::new(false),
            }),
        }
    }
}

impl Driver for JournalDriver {
    fn channel_id(&self) -> ChannelId {
        self.inner.config.channel_id()
    }

    fn channel_properties(&self) -> ChannelProperties {
        self.inner.config.properties()
    }

    fn is_remoting(&self) -> bool {
        true
    }

    fn channel_requires_delivery_ack(&self) -> bool {
        self.inner.config.ack_required
    }

    fn init_driver_loop(&self, system: SystemHandle) -> Result<(), DriverError> {
        let channel = self.channel_id();
        let path = journal_path(&self.inner.config.dir, &self.inner.config.channel_name);

        std::fs::create_dir_all(&self.inner.config.dir).map_err(|source| DriverError::Io {
            channel: channel.clone(),
            source,
        })?;
        let appender = Appender::open(&path, self.inner.config.durable)
            .map_err(|e| driver_err(&channel, e))?;
        let tailer = match Tailer::open_at_end(&path) {
            Ok(tailer) => tailer,
            Err(e) => {
                // Do not hold the half-acquired appender on a failed init.
                return Err(driver_err(&channel, e));
            }
        };

        *self.inner.appender.lock() = Some(appender);
        *self.inner.tailer.lock() = Some(tailer);
        let _ = self.inner.system.set(system);
        Ok(())
    }

    fn driver_loop(&self) -> Option<Box<dyn FnOnce() + Send>> {
        let inner = self.inner.clone();
        Some(Box::new(move || tail_loop(inner)))
    }

    fn send(&self, env: Envelope) -> DeliveryStatus {
        self.inner.append_own(&env)
    }

    fn async_send(&self, env: Envelope) -> Delivery {
        let requires = env.acking().requires_ack() || self.inner.config.ack_required;
        if requires {
            let seq = env.seq();
            let delivery = self.inner.core.register_pending_ack(seq);
            let status = self.inner.append_own(&env);
            if !status.is_delivered() {
                self.inner.core.complete_ack(seq, status);
            }
            delivery
        } else {
            Delivery::resolved(self.inner.append_own(&env))
        }
    }

    fn send_gate(&self, gate: &Gate, env: &Envelope) -> DeliveryStatus {
        self.inner
            .append_to_gate(gate, env, env.dest().channel().name())
    }

    fn async_send_gate(&self, gate: &Gate, env: Envelope) -> Delivery {
        let requires = env.acking().requires_ack() || self.inner.config.ack_required;
        if requires {
            let seq = env.seq();
            let delivery = self.inner.core.register_pending_ack(seq);
            let status = self.send_gate(gate, &env);
            if !status.is_delivered() {
                self.inner.core.complete_ack(seq, status);
            }
            delivery
        } else {
            Delivery::resolved(self.send_gate(gate, &env))
        }
    }

    fn clean_driver_loop(&self) {
        if self.inner.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.appender.lock().take();
        self.inner.tailer.lock().take();
        self.inner.gate_appenders.clear();
        tracing::debug!(channel = %self.channel_id(), "journal driver cleaned");
    }
}

impl Inner {
    fn append_own(&self, env: &Envelope) -> DeliveryStatus {
        let guard = self.appender.lock();
        match guard.as_ref() {
            Some(appender) => match appender.append(&env.to_wire()) {
                Ok(()) => DeliveryStatus::Delivered,
                Err(error) => {
                    tracing::error!(
                        channel = %self.config.channel_id(),
                        %error,
                        "journal append failed"
                    );
                    DeliveryStatus::NotDelivered
                }
            },
            None => DeliveryStatus::NotDelivered,
        }
    }

    /// Appends into the peer journal named by the gate's `dir` property.
    fn append_to_gate(&self, gate: &Gate, env: &Envelope, channel_name: &str) -> DeliveryStatus {
        let Some(dir) = gate.properties().get("dir") else {
            tracing::debug!("gate has no journal directory, cannot egress");
            return DeliveryStatus::NotDelivered;
        };
        let durable = gate.properties().get("durable") == Some("true");
        let path = journal_path(Path::new(dir), channel_name);

        let appender = match self.gate_appenders.get(&path) {
            Some(existing) => existing.value().clone(),
            None => match Appender::open(&path, durable) {
                Ok(created) => {
                    let created = Arc::new(created);
                    self.gate_appenders.insert(path.clone(), created.clone());
                    created
                }
                Err(error) => {
                    tracing::error!(path = %path.display(), %error, "cannot open peer journal");
                    return DeliveryStatus::NotDelivered;
                }
            },
        };

        match appender.append(&env.to_wire()) {
            Ok(()) => DeliveryStatus::Delivered,
            Err(error) => {
                tracing::error!(path = %path.display(), %error, "peer journal append failed");
                DeliveryStatus::NotDelivered
            }
        }
    }

    fn handle_inbound(&self, system: &SystemHandle, env: Envelope) {
        if env.is::<DeliveryConfirmation>() {
            match env.payload::<DeliveryConfirmation>() {
                Ok(confirmation) => {
                    self.core.complete_ack(confirmation.seq, confirmation.status)
                }
                Err(error) => {
                    tracing::error!(%error, "skipping confirmation that failed to decode")
                }
            }
            return;
        }

        let seq = env.seq();
        let acking = env.acking();
        let source = env.source().clone();
        let receiver = env.dest().clone();
        let status = self.core.offer_message(system, env);

        if (acking.requires_ack() || self.config.ack_required) && source.system() != system.id() {
            self.confirm(system, receiver, source, seq, status);
        }
    }

    /// Appends a delivery confirmation back through the sender's symmetric
    /// gate (same channel id, advertised by the sending system).
    fn confirm(
        &self,
        system: &SystemHandle,
        receiver: Address,
        sender: Address,
        seq: u64,
        status: DeliveryStatus,
    ) {
        let Some(gate) = system.routes().lookup(sender.system(), sender.channel()) else {
            tracing::debug!(
                peer = %sender.system(),
                channel = %sender.channel(),
                "no route back to the sender to confirm delivery"
            );
            return;
        };
        let confirmation = DeliveryConfirmation { seq, status };
        let channel_name = sender.channel().name().to_string();
        let env = Envelope::new(
            system.next_seq(),
            receiver,
            sender,
            AckingPolicy::None,
            &confirmation,
        );
        if !self
            .append_to_gate(&gate, &env, &channel_name)
            .is_delivered()
        {
            tracing::debug!(peer = %env.dest().system(), "delivery confirmation not appended");
        }
    }
}

fn tail_loop(inner: Arc<Inner>) {
    let Some(mut tailer) = inner.tailer.lock().take() else {
        return;
    };
    let Some(system) = inner.system.get().cloned() else {
        return;
    };
    let channel = inner.config.channel_id();
    let mut pauser = Pauser::new(inner.config.pause_floor, inner.config.pause_ceiling);
    tracing::debug!(%channel, "journal tail loop started");

    while !inner.shutdown.load(Ordering::Relaxed) {
        match tailer.read_next() {
            Ok(Some(record)) => {
                pauser.reset();
                match Envelope::from_wire(&record) {
                    Ok(env) => inner.handle_inbound(&system, env),
                    // The tailer has already advanced; the record is lost,
                    // the loop lives on.
                    Err(error) => tracing::error!(
                        %channel,
                        %error,
                        "skipping journal record that failed to decode"
                    ),
                }
            }
            Ok(None) => pauser.pause(),
            Err(error) => {
                tracing::error!(%channel, %error, "journal tail failed, stopping ingress loop");
                break;
            }
        }
    }
    tracing::debug!(%channel, "journal tail loop stopped");
}

fn driver_err(channel: &ChannelId, err: JournalError) -> DriverError {
    match err {
        JournalError::Io(source) => DriverError::Io {
            channel: channel.clone(),
            source,
        },
        other => DriverError::Init {
            channel: channel.clone(),
            reason: other.to_string(),
        },
    }
}
