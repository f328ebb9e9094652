//! Per-reactor execution context.
//!
//! The [`ReactorContext`] is the runtime record behind one reactor: its
//! mailbox, place in the hierarchy, scheduling state, intercept rules and
//! reaction table. Handlers receive it as their window into the runtime
//! (replying, spawning children, stopping), always under the single-worker
//! guarantee enforced by the scheduling flag.

use crate::completion::Completion;
use crate::delivery::Delivery;
use crate::mailbox::Mailbox;
use crate::reactions::Reactions;
use crate::reference::ReactorRef;
use crate::system::SystemHandle;
use crate::SpawnError;
use parking_lot::{Mutex, RwLock};
use rill_core::{Address, AckingPolicy, Envelope, Payload, ReactorId};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// A passive-observation rule: match messages by payload tag.
///
/// A reactor carrying a rule receives a copy of every matching message
/// delivered locally, without altering the original delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptRule {
    tag: String,
}

impl InterceptRule {
    /// Matches payloads of type `P`.
    pub fn of<P: Payload>() -> Self {
        Self {
            tag: P::tag().to_string(),
        }
    }

    /// Matches payloads by raw tag.
    pub fn for_tag(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    /// The matched tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Whether this rule matches the envelope's payload.
    pub fn matches(&self, env: &Envelope) -> bool {
        env.tag() == self.tag
    }
}

/// Fields guarded by the structural lock: the children list and the
/// intercept rules, both traversed atomically relative to mutation.
struct Structural {
    children: Vec<ReactorRef>,
    intercept_rules: Vec<InterceptRule>,
}

/// Runtime record of one reactor.
pub struct ReactorContext {
    self_ref: ReactorRef,
    parent: ReactorRef,
    mailbox: Box<dyn Mailbox>,
    system: SystemHandle,
    structural: RwLock<Structural>,
    is_scheduled: AtomicBool,
    is_acquired: AtomicBool,
    stop_requested: AtomicBool,
    termination_started: AtomicBool,
    finalized: AtomicBool,
    pending_children: AtomicUsize,
    hierarchy_termination: Completion,
    msg_executions: AtomicU64,
    last_sender: Mutex<Address>,
    reactions: Mutex<Reactions>,
    weak_self: Weak<ReactorContext>,
}

impl ReactorContext {
    pub(crate) fn create(
        self_ref: ReactorRef,
        parent: ReactorRef,
        mailbox: Box<dyn Mailbox>,
        system: SystemHandle,
        intercept_rules: Vec<InterceptRule>,
        reactions: Reactions,
    ) -> Arc<Self> {
        let initial_sender = parent.address().clone();
        Arc::new_cyclic(|weak_self| Self {
            self_ref,
            parent,
            mailbox,
            system,
            structural: RwLock::new(Structural {
                children: Vec::new(),
                intercept_rules,
            }),
            is_scheduled: AtomicBool::new(false),
            is_acquired: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            termination_started: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
            pending_children: AtomicUsize::new(0),
            hierarchy_termination: Completion::new(),
            msg_executions: AtomicU64::new(0),
            last_sender: Mutex::new(initial_sender),
            reactions: Mutex::new(reactions),
            weak_self: weak_self.clone(),
        })
    }

    /// This reactor's identity.
    pub fn id(&self) -> &ReactorId {
        self.self_ref.id()
    }

    /// Reference to this reactor.
    pub fn self_ref(&self) -> &ReactorRef {
        &self.self_ref
    }

    /// Reference to the parent.
    pub fn parent(&self) -> &ReactorRef {
        &self.parent
    }

    /// The owning system.
    pub fn system(&self) -> &SystemHandle {
        &self.system
    }

    /// The reactor's mailbox.
    pub fn mailbox(&self) -> &dyn Mailbox {
        self.mailbox.as_ref()
    }

    /// Snapshot of the children, taken under the structural read lock.
    pub fn children(&self) -> Vec<ReactorRef> {
        self.structural.read().children.clone()
    }

    /// Snapshot of the intercept rules, taken under the structural read lock.
    pub fn intercept_rules(&self) -> Vec<InterceptRule> {
        self.structural.read().intercept_rules.clone()
    }

    /// Swaps the intercept rules wholesale and re-indexes them with the
    /// system, all under the structural write lock.
    pub fn set_intercept_rules(&self, rules: Vec<InterceptRule>) {
        let mut structural = self.structural.write();
        self.system
            .update_interceptors(&self.self_ref, &structural.intercept_rules, &rules);
        structural.intercept_rules = rules;
    }

    pub(crate) fn register_child(&self, child: ReactorRef) {
        self.structural.write().children.push(child);
    }

    pub(crate) fn unregister_child(&self, child: &ReactorRef) {
        self.structural.write().children.retain(|c| c != child);
    }

    /// Invoked by the dispatcher for each dequeued message. Records the
    /// sender, bumps the execution counter and dispatches to the reaction
    /// table.
    pub(crate) fn re_act(&self, env: &Envelope) {
        *self.last_sender.lock() = env.source().clone();
        self.msg_executions.fetch_add(1, Ordering::Relaxed);
        let mut reactions = self.reactions.lock();
        reactions.handle(self, env);
    }

    /// Sender of the message currently being handled.
    pub fn sender(&self) -> ReactorRef {
        ReactorRef::bind(self.last_sender.lock().clone(), &self.system)
    }

    /// Number of messages executed so far.
    pub fn msg_execution_count(&self) -> u64 {
        self.msg_executions.load(Ordering::Relaxed)
    }

    /// Asks the dispatcher to consider this reactor for execution.
    pub fn reschedule(&self) {
        if let Some(ctx) = self.weak_self.upgrade() {
            self.system.dispatch(ctx);
        }
    }

    /// Raises the stop flag and reschedules so the terminal messages drain.
    ///
    /// Returns the hierarchy-termination completion, signalled once this
    /// reactor and all of its children have terminated. Idempotent.
    pub fn stop(&self) -> Completion {
        self.stop_requested.store(true, Ordering::Release);
        self.reschedule();
        self.hierarchy_termination.clone()
    }

    /// Whether stop has been requested.
    pub fn is_stop(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Completion signalled when this reactor's whole hierarchy is gone.
    pub fn hierarchy_termination(&self) -> Completion {
        self.hierarchy_termination.clone()
    }

    /// Spawns a child of this reactor.
    pub fn spawn_child(
        &self,
        config: crate::system::ReactorConfig,
        reactions: Reactions,
    ) -> Result<ReactorRef, SpawnError> {
        self.system.spawn_child(&self.self_ref, config, reactions)
    }

    /// Replies to the sender of the message currently being handled.
    pub fn reply<P: Payload>(&self, payload: &P) -> Delivery {
        self.sender().tell(&self.self_ref, payload)
    }

    /// Replies with an explicit acking policy.
    pub fn reply_with_policy<P: Payload>(&self, acking: AckingPolicy, payload: &P) -> Delivery {
        self.sender()
            .tell_with_policy(&self.self_ref, acking, payload)
    }

    /// Sends a message to this reactor itself.
    pub fn self_tell<P: Payload>(&self, payload: &P) -> Delivery {
        self.self_ref.tell(&self.self_ref, payload)
    }

    // === Scheduling flags (dispatcher side) ===

    /// Atomically transitions the scheduling flag false→true; returns whether
    /// the caller now owns the flag.
    pub(crate) fn acquire_scheduling(&self) -> bool {
        self.is_scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Clears the scheduling flag.
    pub(crate) fn release_scheduling(&self) {
        self.is_scheduled.store(false, Ordering::Release);
    }

    /// Non-reentrancy guard: detects a recursive dispatch attempt by the
    /// same worker.
    pub(crate) fn acquire_coherence(&self) -> bool {
        self.is_acquired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release_coherence(&self) {
        self.is_acquired.store(false, Ordering::Release);
    }

    // === Termination protocol (dispatcher side) ===

    pub(crate) fn begin_termination(&self) -> bool {
        self.termination_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn begin_finalize(&self) -> bool {
        self.finalized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    pub(crate) fn set_pending_children(&self, count: usize) {
        self.pending_children.store(count, Ordering::Release);
    }

    /// Records one child termination; returns the number still pending.
    pub(crate) fn child_terminated(&self) -> usize {
        self.pending_children.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub(crate) fn pending_children(&self) -> usize {
        self.pending_children.load(Ordering::Acquire)
    }

    /// Whether termination has started and all children are accounted for,
    /// but the final step has not run yet.
    pub(crate) fn termination_ready(&self) -> bool {
        self.termination_started.load(Ordering::Acquire)
            && self.pending_children.load(Ordering::Acquire) == 0
            && !self.is_finalized()
    }

    pub(crate) fn arc(&self) -> Option<Arc<ReactorContext>> {
        self.weak_self.upgrade()
    }
}

impl PartialEq for ReactorContext {
    fn eq(&self, other: &Self) -> bool {
        self.self_ref == other.self_ref
    }
}

impl Eq for ReactorContext {}

impl std::fmt::Debug for ReactorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactorContext")
            .field("id", &self.self_ref.id())
            .field("stop", &self.is_stop())
            .field("mailbox_len", &self.mailbox.len())
            .finish()
    }
}
