//! Cooperative scheduling of reactors onto worker threads.
//!
//! The dispatcher owns a fixed pool of workers, each with its own ready
//! queue. A reactor is enqueued only when the caller wins its scheduling
//! flag, and always onto the worker chosen by hashing its id, so a reactor
//! executes on one thread for its whole life and handlers never need their
//! own locking.
//!
//! Workers drain a bounded batch per turn. Handler panics are caught and
//! logged; the reactor continues with the next message. When a drained
//! reactor has its stop flag raised, the worker drives the termination
//! protocol: children are stopped first, their completions chained through
//! callbacks (never blocking a worker), and only then is `ReactorStop`
//! delivered and the context unregistered.

use crate::context::ReactorContext;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rill_core::{AckingPolicy, Envelope, ReactorId, ReactorStop};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How often parked workers check the shutdown flag.
const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Default number of messages drained per scheduling turn.
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Owns the worker threads and the ready queues.
pub struct Dispatcher {
    queues: Vec<Sender<Arc<ReactorContext>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
}

impl Dispatcher {
    /// Spawns `worker_count` workers draining `batch_size` messages per turn.
    pub fn new(worker_count: usize, batch_size: usize) -> Self {
        let worker_count = worker_count.max(1);
        let batch_size = batch_size.max(1);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut queues = Vec::with_capacity(worker_count);
        let mut workers = Vec::with_capacity(worker_count);
        for idx in 0..worker_count {
            let (tx, rx) = unbounded();
            queues.push(tx);
            let shutdown = shutdown.clone();
            let handle = thread::Builder::new()
                .name(format!("rill-worker-{idx}"))
                .spawn(move || worker_loop(rx, batch_size, shutdown))
                .expect("failed to spawn worker thread");
            workers.push(handle);
        }

        Self {
            queues,
            workers: Mutex::new(workers),
            shutdown,
        }
    }

    /// Schedules a reactor for execution if it is not already scheduled.
    ///
    /// Losing the scheduling flag is a no-op: the worker currently holding
    /// it re-checks the mailbox before releasing, so the new messages are
    /// observed.
    pub fn dispatch(&self, ctx: Arc<ReactorContext>) {
        if ctx.is_finalized() {
            return;
        }
        if !ctx.acquire_scheduling() {
            return;
        }
        let idx = worker_index(ctx.id(), self.queues.len());
        if self.queues[idx].send(ctx.clone()).is_err() {
            // Dispatcher is shutting down.
            ctx.release_scheduling();
        }
    }

    /// Stops the workers and joins them. Queued reactors are abandoned.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let workers = {
            let mut guard = self.workers.lock();
            std::mem::take(&mut *guard)
        };
        for handle in workers {
            let _ = handle.join();
        }
    }
}

fn worker_index(id: &ReactorId, worker_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    (hasher.finish() as usize) % worker_count
}

fn worker_loop(
    rx: Receiver<Arc<ReactorContext>>,
    batch_size: usize,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        match rx.recv_timeout(SHUTDOWN_CHECK_INTERVAL) {
            Ok(ctx) => run_context(ctx, batch_size),
            Err(RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// One scheduling turn for one reactor: drain a batch, react to each
/// message, then either re-enqueue or progress termination.
fn run_context(ctx: Arc<ReactorContext>, batch_size: usize) {
    if ctx.is_finalized() {
        ctx.release_scheduling();
        return;
    }
    if !ctx.acquire_coherence() {
        tracing::warn!(reactor = %ctx.id(), "recursive dispatch attempt detected");
        ctx.release_scheduling();
        return;
    }

    for env in ctx.mailbox().dequeue_batch(batch_size) {
        let reaction = catch_unwind(AssertUnwindSafe(|| ctx.re_act(&env)));
        if reaction.is_err() {
            tracing::error!(
                reactor = %ctx.id(),
                tag = env.tag(),
                "reaction panicked; reactor continues with the next message"
            );
        }
    }
    ctx.release_coherence();

    if ctx.is_stop() && ctx.mailbox().is_empty() {
        progress_termination(&ctx);
    }

    ctx.release_scheduling();
    if ctx.is_finalized() {
        return;
    }
    // Re-check after releasing the flag: new mail, or a child completion
    // that raced with this turn, must not be lost.
    if !ctx.mailbox().is_empty() || (ctx.is_stop() && ctx.termination_ready()) {
        ctx.reschedule();
    }
}

fn progress_termination(ctx: &Arc<ReactorContext>) {
    if ctx.begin_termination() {
        let children = ctx.children();
        if children.is_empty() {
            finalize(ctx);
            return;
        }
        ctx.set_pending_children(children.len());
        let system = ctx.system().clone();
        for child in children {
            match system.context(child.id()) {
                Some(child_ctx) => {
                    let parent = ctx.clone();
                    child_ctx.stop().on_complete(move || {
                        if parent.child_terminated() == 0 {
                            parent.reschedule();
                        }
                    });
                }
                None => {
                    // Already gone; account for it directly.
                    if ctx.child_terminated() == 0 {
                        finalize(ctx);
                    }
                }
            }
        }
    } else if ctx.pending_children() == 0 {
        finalize(ctx);
    }
}

/// Delivers `ReactorStop`, unregisters the context and signals the
/// hierarchy termination. Runs on the owning worker, exactly once.
fn finalize(ctx: &Arc<ReactorContext>) {
    if !ctx.begin_finalize() {
        return;
    }
    let system = ctx.system().clone();
    let addr = ctx.self_ref().address().clone();
    let stop_env = Envelope::new(
        system.next_seq(),
        addr.clone(),
        addr,
        AckingPolicy::None,
        &ReactorStop,
    );
    if catch_unwind(AssertUnwindSafe(|| ctx.re_act(&stop_env))).is_err() {
        tracing::error!(reactor = %ctx.id(), "reaction to ReactorStop panicked");
    }
    system.unregister(ctx);
    ctx.hierarchy_termination().complete();
    tracing::debug!(reactor = %ctx.id(), "reactor terminated");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_index_is_stable() {
        let id = ReactorId::named("pinned");
        let first = worker_index(&id, 4);
        for _ in 0..16 {
            assert_eq!(worker_index(&id, 4), first);
        }
    }

    #[test]
    fn test_worker_index_in_range() {
        for _ in 0..64 {
            let id = ReactorId::named("r");
            assert!(worker_index(&id, 3) < 3);
        }
    }
}
