//! Delivery completion handles.
//!
//! A [`Delivery`] resolves exactly once to a [`DeliveryStatus`]. Sends that
//! finish synchronously return an already-resolved handle; acked sends over a
//! wire-crossing channel resolve later, when the inbound loop observes the
//! matching confirmation. Dropping a handle merely detaches the waiter; the
//! underlying send is not revoked.

use parking_lot::{Condvar, Mutex};
use rill_core::DeliveryStatus;
use std::sync::Arc;
use std::time::Duration;

type Callback = Box<dyn FnOnce(DeliveryStatus) + Send>;

struct Shared {
    state: Mutex<State>,
    cond: Condvar,
}

struct State {
    status: Option<DeliveryStatus>,
    callbacks: Vec<Callback>,
}

fn fire(shared: &Shared, status: DeliveryStatus) {
    let callbacks = {
        let mut state = shared.state.lock();
        if state.status.is_some() {
            return;
        }
        state.status = Some(status);
        shared.cond.notify_all();
        std::mem::take(&mut state.callbacks)
    };
    for cb in callbacks {
        cb(status);
    }
}

/// A one-shot handle that resolves to the outcome of a send.
#[derive(Clone)]
pub struct Delivery {
    shared: Arc<Shared>,
}

impl Delivery {
    /// A handle that is already resolved.
    pub fn resolved(status: DeliveryStatus) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    status: Some(status),
                    callbacks: Vec::new(),
                }),
                cond: Condvar::new(),
            }),
        }
    }

    /// A pending handle plus the trigger that resolves it.
    pub fn pending() -> (DeliveryTrigger, Delivery) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                status: None,
                callbacks: Vec::new(),
            }),
            cond: Condvar::new(),
        });
        (
            DeliveryTrigger {
                shared: shared.clone(),
                fired: false,
            },
            Delivery { shared },
        )
    }

    /// The status, if already resolved.
    pub fn try_status(&self) -> Option<DeliveryStatus> {
        self.shared.state.lock().status
    }

    /// Blocks until resolved or the timeout elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<DeliveryStatus> {
        let mut state = self.shared.state.lock();
        if state.status.is_none() {
            self.shared.cond.wait_for(&mut state, timeout);
        }
        state.status
    }

    /// Registers a callback invoked once with the final status.
    ///
    /// Runs inline if the handle already resolved; otherwise runs on the
    /// thread that fires the trigger. Callbacks must not block.
    pub fn on_resolved(&self, f: impl FnOnce(DeliveryStatus) + Send + 'static) {
        let status = {
            let mut state = self.shared.state.lock();
            match state.status {
                Some(status) => status,
                None => {
                    state.callbacks.push(Box::new(f));
                    return;
                }
            }
        };
        f(status);
    }
}

/// Resolves the paired [`Delivery`].
///
/// If dropped without being fired (a cleaned-up driver, a lost channel) the
/// delivery resolves to [`DeliveryStatus::NotDelivered`].
pub struct DeliveryTrigger {
    shared: Arc<Shared>,
    fired: bool,
}

impl DeliveryTrigger {
    /// Resolves the delivery. A second resolution attempt is ignored.
    pub fn complete(mut self, status: DeliveryStatus) {
        self.fired = true;
        fire(&self.shared, status);
    }
}

impl Drop for DeliveryTrigger {
    fn drop(&mut self) {
        if !self.fired {
            fire(&self.shared, DeliveryStatus::NotDelivered);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_resolved_is_immediate() {
        let d = Delivery::resolved(DeliveryStatus::Delivered);
        assert_eq!(d.try_status(), Some(DeliveryStatus::Delivered));
        assert_eq!(
            d.wait_timeout(Duration::from_millis(1)),
            Some(DeliveryStatus::Delivered)
        );
    }

    #[test]
    fn test_pending_resolves_once() {
        let (trigger, delivery) = Delivery::pending();
        assert_eq!(delivery.try_status(), None);

        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        delivery.on_resolved(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });

        trigger.complete(DeliveryStatus::Backpressured);
        assert_eq!(delivery.try_status(), Some(DeliveryStatus::Backpressured));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wait_across_threads() {
        let (trigger, delivery) = Delivery::pending();
        let waiter = thread::spawn(move || delivery.wait_timeout(Duration::from_secs(2)));
        trigger.complete(DeliveryStatus::Delivered);
        assert_eq!(waiter.join().unwrap(), Some(DeliveryStatus::Delivered));
    }

    #[test]
    fn test_dropped_trigger_resolves_not_delivered() {
        let (trigger, delivery) = Delivery::pending();
        drop(trigger);
        assert_eq!(delivery.try_status(), Some(DeliveryStatus::NotDelivered));
    }

    #[test]
    fn test_timeout_leaves_pending() {
        let (_trigger, delivery) = Delivery::pending();
        assert_eq!(delivery.wait_timeout(Duration::from_millis(10)), None);
    }
}
