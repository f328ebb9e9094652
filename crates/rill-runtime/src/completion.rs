//! Multi-waiter completion signal.
//!
//! Used for hierarchy termination: a parent chains its children's
//! completions through callbacks, and external observers block on
//! [`Completion::wait_timeout`]. Unlike [`crate::Delivery`] it carries no
//! value and may have any number of observers.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

struct Shared {
    state: Mutex<State>,
    cond: Condvar,
}

struct State {
    done: bool,
    callbacks: Vec<Box<dyn FnOnce() + Send>>,
}

/// A one-shot, multi-observer completion signal.
#[derive(Clone)]
pub struct Completion {
    shared: Arc<Shared>,
}

impl Completion {
    /// A fresh, unsignalled completion.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    done: false,
                    callbacks: Vec::new(),
                }),
                cond: Condvar::new(),
            }),
        }
    }

    /// Signals the completion. Later calls are no-ops.
    pub fn complete(&self) {
        let callbacks = {
            let mut state = self.shared.state.lock();
            if state.done {
                return;
            }
            state.done = true;
            self.shared.cond.notify_all();
            std::mem::take(&mut state.callbacks)
        };
        for cb in callbacks {
            cb();
        }
    }

    /// Whether the completion has been signalled.
    pub fn is_complete(&self) -> bool {
        self.shared.state.lock().done
    }

    /// Blocks until signalled or the timeout elapses; returns whether it was
    /// signalled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut state = self.shared.state.lock();
        if !state.done {
            self.shared.cond.wait_for(&mut state, timeout);
        }
        state.done
    }

    /// Registers a callback; runs inline if already signalled, otherwise on
    /// the completing thread. Callbacks must not block.
    pub fn on_complete(&self, f: impl FnOnce() + Send + 'static) {
        {
            let mut state = self.shared.state.lock();
            if !state.done {
                state.callbacks.push(Box::new(f));
                return;
            }
        }
        f();
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_complete_is_idempotent() {
        let c = Completion::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        c.on_complete(move || {
            hits2.fetch_add(1, Ordering::SeqCst);
        });

        c.complete();
        c.complete();
        assert!(c.is_complete());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_after_completion_runs_inline() {
        let c = Completion::new();
        c.complete();

        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();
        c.on_complete(move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_multiple_waiters() {
        let c = Completion::new();
        let mut waiters = Vec::new();
        for _ in 0..3 {
            let c = c.clone();
            waiters.push(thread::spawn(move || {
                c.wait_timeout(Duration::from_secs(2))
            }));
        }
        c.complete();
        for w in waiters {
            assert!(w.join().unwrap());
        }
    }

    #[test]
    fn test_wait_timeout_expires() {
        let c = Completion::new();
        assert!(!c.wait_timeout(Duration::from_millis(10)));
    }
}
