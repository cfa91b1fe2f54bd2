//! Cross-thread hand-off between producers and the render tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crossbeam_channel::{Receiver, Sender, select, unbounded};

/// Multi-producer / single-consumer queue with blocking and non-blocking pop.
///
/// `push` never blocks and never fails: the per-tick upload budget, not this
/// queue, bounds how much work the consumer takes on. `close` wakes any
/// thread parked in [`BoundedQueue::pop_blocking`].
#[derive(Debug)]
pub struct BoundedQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    // Dropping the sender disconnects `shutdown_rx`, which wakes `select!`.
    shutdown_tx: Mutex<Option<Sender<()>>>,
    shutdown_rx: Receiver<()>,
    closed: AtomicBool,
}

impl<T> BoundedQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = unbounded();
        Self {
            tx,
            rx,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            shutdown_rx,
            closed: AtomicBool::new(false),
        }
    }

    /// Append an item and wake one waiting consumer.
    pub fn push(&self, item: T) {
        // The queue owns a receiver, so the channel cannot be disconnected.
        let _ = self.tx.send(item);
    }

    /// Pop without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Park the calling thread until an item arrives.
    ///
    /// Returns `None` only after [`close`](Self::close) once the queue is drained.
    pub fn pop_blocking(&self) -> Option<T> {
        if let Ok(item) = self.rx.try_recv() {
            return Some(item);
        }
        select! {
            recv(self.rx) -> item => item.ok(),
            recv(self.shutdown_rx) -> _ => self.rx.try_recv().ok(),
        }
    }

    /// Stop blocking consumers. Items already queued can still be popped.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.shutdown_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Default for BoundedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn pops_in_push_order() {
        let q = BoundedQueue::new();
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.len(), 3);
        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), Some(3));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn blocking_pop_wakes_on_push() {
        let q = Arc::new(BoundedQueue::new());
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.pop_blocking())
        };
        thread::sleep(Duration::from_millis(20));
        q.push("hello");
        assert_eq!(consumer.join().unwrap(), Some("hello"));
    }

    #[test]
    fn close_unblocks_waiting_consumer() {
        let q: Arc<BoundedQueue<u32>> = Arc::new(BoundedQueue::new());
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.pop_blocking())
        };
        thread::sleep(Duration::from_millis(20));
        q.close();
        assert_eq!(consumer.join().unwrap(), None);
        assert!(q.is_closed());
    }

    #[test]
    fn close_still_drains_pending_items() {
        let q = BoundedQueue::new();
        q.push(7);
        q.close();
        assert_eq!(q.pop_blocking(), Some(7));
        assert_eq!(q.pop_blocking(), None);
    }
}
