//! Reactor mailboxes.
//!
//! Each reactor owns exactly one mailbox, consumed only by the worker that
//! currently holds the reactor's scheduling flag. Producers may be many;
//! FIFO holds per sender, and arrival order is the tiebreak across senders.
//!
//! The dispatcher drains messages in batches through the [`Mailbox`] trait,
//! so implementations are interchangeable: unbounded, bounded with drop,
//! bounded with producer blocking, and priority-ordered.

use crate::delivery::Delivery;
use parking_lot::{Condvar, Mutex};
use rill_core::{DeliveryStatus, Envelope};
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;

/// Ordered per-reactor message queue. Single consumer.
pub trait Mailbox: Send + Sync {
    /// Deposits a message, returning the outcome synchronously.
    fn deliver(&self, env: Envelope) -> DeliveryStatus;

    /// Deposits a message, resolving the outcome through a completion
    /// handle. The default resolves from the synchronous path.
    fn async_deliver(&self, env: Envelope) -> Delivery {
        Delivery::resolved(self.deliver(env))
    }

    /// Whether the mailbox currently holds no messages.
    fn is_empty(&self) -> bool;

    /// Number of queued messages.
    fn len(&self) -> usize;

    /// Removes and returns up to `max` messages in consumption order.
    fn dequeue_batch(&self, max: usize) -> Vec<Envelope>;
}

/// Unbounded FIFO mailbox. The default.
#[derive(Default)]
pub struct UnboundedMailbox {
    queue: Mutex<VecDeque<Envelope>>,
}

impl UnboundedMailbox {
    /// Creates an empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Mailbox for UnboundedMailbox {
    fn deliver(&self, env: Envelope) -> DeliveryStatus {
        self.queue.lock().push_back(env);
        DeliveryStatus::Delivered
    }

    fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    fn len(&self) -> usize {
        self.queue.lock().len()
    }

    fn dequeue_batch(&self, max: usize) -> Vec<Envelope> {
        let mut queue = self.queue.lock();
        let take = max.min(queue.len());
        queue.drain(..take).collect()
    }
}

/// Bounded FIFO mailbox that refuses messages when full.
///
/// Overflow surfaces as [`DeliveryStatus::Backpressured`] on the sender's
/// completion; the message is dropped.
pub struct BoundedMailbox {
    capacity: usize,
    queue: Mutex<VecDeque<Envelope>>,
}

impl BoundedMailbox {
    /// Creates a mailbox holding at most `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }
}

impl Mailbox for BoundedMailbox {
    fn deliver(&self, env: Envelope) -> DeliveryStatus {
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            return DeliveryStatus::Backpressured;
        }
        queue.push_back(env);
        DeliveryStatus::Delivered
    }

    fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    fn len(&self) -> usize {
        self.queue.lock().len()
    }

    fn dequeue_batch(&self, max: usize) -> Vec<Envelope> {
        let mut queue = self.queue.lock();
        let take = max.min(queue.len());
        queue.drain(..take).collect()
    }
}

/// Bounded FIFO mailbox that blocks the producer until space is available.
///
/// Both `deliver` and `async_deliver` block the calling thread on overflow;
/// use it only where producers run on threads that may stall (never inside a
/// reaction handler on a worker).
pub struct BlockingBoundedMailbox {
    capacity: usize,
    queue: Mutex<VecDeque<Envelope>>,
    space: Condvar,
}

impl BlockingBoundedMailbox {
    /// Creates a mailbox holding at most `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            space: Condvar::new(),
        }
    }
}

impl Mailbox for BlockingBoundedMailbox {
    fn deliver(&self, env: Envelope) -> DeliveryStatus {
        let mut queue = self.queue.lock();
        while queue.len() >= self.capacity {
            self.space.wait(&mut queue);
        }
        queue.push_back(env);
        DeliveryStatus::Delivered
    }

    fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    fn len(&self) -> usize {
        self.queue.lock().len()
    }

    fn dequeue_batch(&self, max: usize) -> Vec<Envelope> {
        let mut queue = self.queue.lock();
        let take = max.min(queue.len());
        let batch: Vec<Envelope> = queue.drain(..take).collect();
        if !batch.is_empty() {
            self.space.notify_all();
        }
        batch
    }
}

/// Priority function over envelopes; lower values dequeue first.
pub type PriorityFn = Arc<dyn Fn(&Envelope) -> usize + Send + Sync>;

struct PriorityEntry {
    priority: usize,
    arrival: u64,
    env: Envelope,
}

impl PartialEq for PriorityEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.arrival == other.arrival
    }
}

impl Eq for PriorityEntry {}

impl PartialOrd for PriorityEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; invert so the lowest (priority, arrival)
        // pops first. FIFO within a priority class.
        (other.priority, other.arrival).cmp(&(self.priority, self.arrival))
    }
}

/// Unbounded mailbox ordered by a caller-supplied priority function.
pub struct PriorityMailbox {
    priority: PriorityFn,
    heap: Mutex<BinaryHeap<PriorityEntry>>,
    arrivals: std::sync::atomic::AtomicU64,
}

impl PriorityMailbox {
    /// Creates a mailbox ordered by `priority`; lower values first.
    pub fn new(priority: PriorityFn) -> Self {
        Self {
            priority,
            heap: Mutex::new(BinaryHeap::new()),
            arrivals: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

impl Mailbox for PriorityMailbox {
    fn deliver(&self, env: Envelope) -> DeliveryStatus {
        let priority = (self.priority)(&env);
        let arrival = self
            .arrivals
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.heap.lock().push(PriorityEntry {
            priority,
            arrival,
            env,
        });
        DeliveryStatus::Delivered
    }

    fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    fn len(&self) -> usize {
        self.heap.lock().len()
    }

    fn dequeue_batch(&self, max: usize) -> Vec<Envelope> {
        let mut heap = self.heap.lock();
        let take = max.min(heap.len());
        (0..take)
            .filter_map(|_| heap.pop().map(|entry| entry.env))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::{
        Address, AckingPolicy, ChannelId, ChannelType, Payload, ReactorId, SystemId,
    };

    fn envelope(seq: u64, payload: &str) -> Envelope {
        let addr = || {
            Address::new(
                ReactorId::named("t"),
                SystemId::named("sys"),
                ChannelId::new(ChannelType::Direct, "direct"),
            )
        };
        Envelope::from_parts(
            seq,
            addr(),
            addr(),
            AckingPolicy::None,
            String::tag(),
            payload.to_string().encode(),
        )
    }

    #[test]
    fn test_unbounded_fifo() {
        let mbox = UnboundedMailbox::new();
        for i in 0..5 {
            assert!(mbox.deliver(envelope(i, "m")).is_delivered());
        }
        assert_eq!(mbox.len(), 5);

        let batch = mbox.dequeue_batch(3);
        assert_eq!(
            batch.iter().map(Envelope::seq).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        let rest = mbox.dequeue_batch(10);
        assert_eq!(
            rest.iter().map(Envelope::seq).collect::<Vec<_>>(),
            vec![3, 4]
        );
        assert!(mbox.is_empty());
    }

    #[test]
    fn test_bounded_backpressure() {
        let mbox = BoundedMailbox::new(2);
        assert!(mbox.deliver(envelope(0, "a")).is_delivered());
        assert!(mbox.deliver(envelope(1, "b")).is_delivered());
        assert_eq!(
            mbox.deliver(envelope(2, "c")),
            DeliveryStatus::Backpressured
        );

        mbox.dequeue_batch(1);
        assert!(mbox.deliver(envelope(3, "d")).is_delivered());
    }

    #[test]
    fn test_blocking_bounded_unblocks_on_dequeue() {
        let mbox = Arc::new(BlockingBoundedMailbox::new(1));
        assert!(mbox.deliver(envelope(0, "a")).is_delivered());

        let producer = {
            let mbox = mbox.clone();
            std::thread::spawn(move || mbox.deliver(envelope(1, "b")))
        };
        // The producer is parked; free a slot.
        std::thread::sleep(std::time::Duration::from_millis(20));
        let drained = mbox.dequeue_batch(1);
        assert_eq!(drained.len(), 1);
        assert!(producer.join().unwrap().is_delivered());
        assert_eq!(mbox.len(), 1);
    }

    #[test]
    fn test_priority_ordering() {
        // "urgent" payloads first, FIFO within each class.
        let priority: PriorityFn =
            Arc::new(|env: &Envelope| if env.seq() % 2 == 0 { 0 } else { 1 });
        let mbox = PriorityMailbox::new(priority);
        for seq in [1, 2, 3, 4] {
            mbox.deliver(envelope(seq, "m"));
        }
        let order: Vec<u64> = mbox.dequeue_batch(10).iter().map(Envelope::seq).collect();
        assert_eq!(order, vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_async_deliver_resolves() {
        let mbox = UnboundedMailbox::new();
        let delivery = mbox.async_deliver(envelope(0, "a"));
        assert_eq!(delivery.try_status(), Some(DeliveryStatus::Delivered));
    }
}
