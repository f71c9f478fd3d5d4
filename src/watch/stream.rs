//! Capacity-1, drop-oldest delivery slot
//!
//! The producer never waits: installing a value while an older one is still
//! undelivered replaces it. The consumer sees channel closure as `None`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::Notify;

/// Delivery counters for one watch session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchStats {
    /// Snapshots installed into the slot
    pub produced: u64,
    /// Snapshots replaced before the consumer took them
    pub dropped: u64,
    /// Ticks whose snapshot build failed
    pub failed: u64,
}

/// Error returned by [`SnapshotStream::try_recv`]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    /// Nothing buffered right now
    #[error("no snapshot available")]
    Empty,
    /// The session has ended and nothing is buffered
    #[error("watch session closed")]
    Closed,
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    closed: bool,
    receiver_alive: bool,
}

#[derive(Debug)]
struct Shared<T> {
    slot: Mutex<Slot<T>>,
    notify: Notify,
    produced: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats(&self) -> WatchStats {
        WatchStats {
            produced: self.produced.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Create a connected sender / stream pair
pub(crate) fn channel<T>() -> (SlotSender<T>, SnapshotStream<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot {
            value: None,
            closed: false,
            receiver_alive: true,
        }),
        notify: Notify::new(),
        produced: AtomicU64::new(0),
        dropped: AtomicU64::new(0),
        failed: AtomicU64::new(0),
    });

    (
        SlotSender {
            shared: Arc::clone(&shared),
        },
        SnapshotStream { shared },
    )
}

/// Producer half, owned by the watch loop. Closes the slot when dropped.
#[derive(Debug)]
pub(crate) struct SlotSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> SlotSender<T> {
    /// Install `value`, replacing any undelivered one. Never blocks.
    ///
    /// Returns `false` if the slot is closed or the consumer is gone.
    pub(crate) fn send_latest(&self, value: T) -> bool {
        {
            let mut slot = self.shared.lock();
            if slot.closed || !slot.receiver_alive {
                return false;
            }
            if slot.value.replace(value).is_some() {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            }
            self.shared.produced.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.notify.notify_one();
        true
    }

    /// Count a tick whose snapshot could not be built
    pub(crate) fn record_failure(&self) {
        self.shared.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether the consumer dropped its stream
    pub(crate) fn receiver_dropped(&self) -> bool {
        !self.shared.lock().receiver_alive
    }

    /// Close the slot. A buffered value stays available to the consumer.
    pub(crate) fn close(&self) {
        self.shared.lock().closed = true;
        self.shared.notify.notify_one();
    }
}

impl<T> Drop for SlotSender<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Receive side of a watch session.
///
/// Holds at most one undelivered snapshot, always the most recent one.
/// `recv` returning `None` is the only termination signal.
#[derive(Debug)]
pub struct SnapshotStream<T> {
    shared: Arc<Shared<T>>,
}

impl<T> SnapshotStream<T> {
    /// Wait for the next snapshot. Returns `None` once the session has closed
    /// and the buffered snapshot (if any) has been taken.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            {
                let mut slot = self.shared.lock();
                if let Some(value) = slot.value.take() {
                    return Some(value);
                }
                if slot.closed {
                    return None;
                }
            }
            self.shared.notify.notified().await;
        }
    }

    /// Take the buffered snapshot without waiting
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        let mut slot = self.shared.lock();
        match slot.value.take() {
            Some(value) => Ok(value),
            None if slot.closed => Err(TryRecvError::Closed),
            None => Err(TryRecvError::Empty),
        }
    }

    /// Whether the producing session has ended
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Delivery counters so far
    pub fn stats(&self) -> WatchStats {
        self.shared.stats()
    }
}

impl<T> Drop for SnapshotStream<T> {
    fn drop(&mut self) {
        let mut slot = self.shared.lock();
        slot.receiver_alive = false;
        slot.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_newest_value_wins() {
        let (tx, mut rx) = channel();
        assert!(tx.send_latest(1));
        assert!(tx.send_latest(2));
        assert!(tx.send_latest(3));

        assert_eq!(rx.try_recv(), Ok(3));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        let stats = rx.stats();
        assert_eq!(stats.produced, 3);
        assert_eq!(stats.dropped, 2);
    }

    #[test]
    fn test_buffered_value_survives_close() {
        let (tx, mut rx) = channel();
        tx.send_latest("last");
        drop(tx);

        assert!(rx.is_closed());
        assert_eq!(rx.try_recv(), Ok("last"));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
    }

    #[test]
    fn test_no_sends_after_close() {
        let (tx, mut rx) = channel();
        tx.close();
        assert!(!tx.send_latest(7));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
    }

    #[test]
    fn test_sender_sees_dropped_receiver() {
        let (tx, rx) = channel::<u32>();
        assert!(!tx.receiver_dropped());
        drop(rx);
        assert!(tx.receiver_dropped());
        assert!(!tx.send_latest(1));
    }

    #[tokio::test]
    async fn test_recv_wakes_on_send_and_close() {
        let (tx, mut rx) = channel();

        let producer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send_latest(42u32);
            tokio::time::sleep(Duration::from_millis(10)).await;
            // tx dropped here, closing the slot
        });

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert_eq!(first.unwrap(), Some(42));

        let end = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert_eq!(end.unwrap(), None);
        producer.await.unwrap();
    }
}
