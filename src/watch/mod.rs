//! Watch sessions: periodic snapshots delivered over a drop-oldest stream
//!
//! A session polls a snapshot producer once per interval on the current tokio
//! runtime and hands each result to a [`SnapshotStream`] of capacity 1. A slow
//! consumer only ever sees the newest snapshot; the producer never waits for
//! it. Failed ticks are logged and counted but do not end the session. The
//! session ends when its [`CancellationToken`] fires, when the producer
//! reports that its provider was shut down, or when the consumer drops the
//! stream. The stream then yields `None`.
//!
//! One session per provider is the supported configuration. Nothing prevents a
//! second concurrent session, but both would advance the same previous-sample
//! slot and see each other's deltas.

pub mod cancel;
pub mod stream;

pub use cancel::CancellationToken;
pub use stream::{SnapshotStream, TryRecvError, WatchStats};

use crate::core::cpu::CpuSnapshot;
use crate::core::power::PowerSnapshot;
use crate::error::{MetricsError, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use stream::SlotSender;
use tokio::time::{Instant, MissedTickBehavior};

/// Snapshots carrying a finalization timestamp
pub trait Timestamped {
    /// When the snapshot was finalized
    fn timestamp(&self) -> DateTime<Utc>;

    /// Overwrite the timestamp
    fn set_timestamp(&mut self, timestamp: DateTime<Utc>);
}

impl Timestamped for CpuSnapshot {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }
}

impl Timestamped for PowerSnapshot {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }
}

/// Why a session loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitReason {
    Cancelled,
    Shutdown,
    ConsumerDropped,
}

/// State owned by one running session
struct WatchSession<T, F> {
    interval: Duration,
    cancel: CancellationToken,
    produce: Arc<F>,
    last_timestamp: Option<DateTime<Utc>>,
    _snapshot: std::marker::PhantomData<fn() -> T>,
}

/// Validate `interval` and start a session on the current tokio runtime.
///
/// Zero intervals are rejected before anything is allocated or spawned.
pub(crate) fn spawn_session<T, F>(
    interval: Duration,
    cancel: &CancellationToken,
    produce: F,
) -> Result<SnapshotStream<T>>
where
    T: Timestamped + Send + 'static,
    F: Fn() -> Result<T> + Send + Sync + 'static,
{
    if interval.is_zero() {
        return Err(MetricsError::InvalidInterval);
    }

    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| MetricsError::Runtime(format!("watch requires a tokio runtime: {}", e)))?;

    let (tx, stream) = stream::channel();
    let session = WatchSession {
        interval,
        cancel: cancel.clone(),
        produce: Arc::new(produce),
        last_timestamp: None,
        _snapshot: std::marker::PhantomData,
    };
    runtime.spawn(session.run(tx));

    Ok(stream)
}

impl<T, F> WatchSession<T, F>
where
    T: Timestamped + Send + 'static,
    F: Fn() -> Result<T> + Send + Sync + 'static,
{
    async fn run(mut self, tx: SlotSender<T>) {
        debug!("watch session started (interval {:?})", self.interval);

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            if self.cancel.is_cancelled() {
                break ExitReason::Cancelled;
            }
            if tx.receiver_dropped() {
                break ExitReason::ConsumerDropped;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break ExitReason::Cancelled,
                _ = ticker.tick() => {}
            }

            let produce = Arc::clone(&self.produce);
            let outcome = tokio::task::spawn_blocking(move || produce()).await;

            // Cancelled while building: abandon delivery
            if self.cancel.is_cancelled() {
                break ExitReason::Cancelled;
            }

            match outcome {
                Ok(Ok(snapshot)) => {
                    let snapshot = self.stamp(snapshot);
                    if !tx.send_latest(snapshot) {
                        break ExitReason::ConsumerDropped;
                    }
                }
                Ok(Err(MetricsError::Shutdown)) => break ExitReason::Shutdown,
                Ok(Err(e)) => {
                    warn!("watch tick failed, keeping session alive: {}", e);
                    tx.record_failure();
                }
                Err(e) => {
                    warn!("watch tick task failed: {}", e);
                    tx.record_failure();
                }
            }
        };

        tx.close();
        debug!("watch session closed: {:?}", reason);
    }

    /// Keep delivered timestamps non-decreasing even if the wall clock steps back
    fn stamp(&mut self, mut snapshot: T) -> T {
        if let Some(last) = self.last_timestamp {
            if snapshot.timestamp() < last {
                snapshot.set_timestamp(last);
            }
        }
        self.last_timestamp = Some(snapshot.timestamp());
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    struct Tick {
        seq: u64,
        timestamp: DateTime<Utc>,
    }

    impl Timestamped for Tick {
        fn timestamp(&self) -> DateTime<Utc> {
            self.timestamp
        }

        fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
            self.timestamp = timestamp;
        }
    }

    fn counting_producer(counter: Arc<AtomicU64>) -> impl Fn() -> Result<Tick> + Send + Sync {
        move || {
            let seq = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Tick {
                seq,
                timestamp: Utc::now(),
            })
        }
    }

    async fn drain(stream: &mut SnapshotStream<Tick>) -> Vec<Tick> {
        let mut values = Vec::new();
        while let Some(tick) = tokio::time::timeout(Duration::from_secs(2), stream.recv())
            .await
            .expect("stream should close")
        {
            values.push(tick);
        }
        values
    }

    #[test]
    fn test_zero_interval_rejected_without_runtime() {
        let counter = Arc::new(AtomicU64::new(0));
        let result = spawn_session(
            Duration::ZERO,
            &CancellationToken::new(),
            counting_producer(Arc::clone(&counter)),
        );
        assert!(matches!(result, Err(MetricsError::InvalidInterval)));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_requires_runtime() {
        let result = spawn_session(
            Duration::from_millis(10),
            &CancellationToken::new(),
            counting_producer(Arc::new(AtomicU64::new(0))),
        );
        assert!(matches!(result, Err(MetricsError::Runtime(_))));
    }

    #[tokio::test]
    async fn test_slow_consumer_gets_only_newest() {
        let counter = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();
        let mut stream = spawn_session(
            Duration::from_millis(10),
            &cancel,
            counting_producer(Arc::clone(&counter)),
        )
        .unwrap();

        // Consumer stalls for well over 3 intervals
        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();

        let values = drain(&mut stream).await;
        let stats = stream.stats();

        assert!(stats.produced >= 3, "produced {}", stats.produced);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].seq, stats.produced);
        assert_eq!(stats.dropped, stats.produced - 1);
    }

    #[tokio::test]
    async fn test_cancel_closes_stream_without_late_values() {
        let cancel = CancellationToken::new();
        let mut stream = spawn_session(
            Duration::from_millis(10),
            &cancel,
            counting_producer(Arc::new(AtomicU64::new(0))),
        )
        .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(1), stream.recv())
            .await
            .unwrap();
        assert!(first.is_some());

        cancel.cancel();
        let _ = drain(&mut stream).await;

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(stream.recv().await, None);
        assert_eq!(stream.try_recv(), Err(TryRecvError::Closed));
    }

    #[tokio::test]
    async fn test_failed_ticks_do_not_end_session() {
        let counter = Arc::new(AtomicU64::new(0));
        let calls = Arc::clone(&counter);
        let cancel = CancellationToken::new();
        let mut stream = spawn_session(Duration::from_millis(5), &cancel, move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 {
                Err(MetricsError::HardwareAccess("transient".to_string()))
            } else {
                Ok(Tick {
                    seq: n,
                    timestamp: Utc::now(),
                })
            }
        })
        .unwrap();

        for _ in 0..3 {
            let tick = tokio::time::timeout(Duration::from_secs(1), stream.recv())
                .await
                .unwrap()
                .expect("session should stay alive");
            assert_eq!(tick.seq % 2, 1);
        }
        assert!(stream.stats().failed >= 3);
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_shutdown_error_ends_session() {
        let counter = Arc::new(AtomicU64::new(0));
        let calls = Arc::clone(&counter);
        let mut stream = spawn_session(
            Duration::from_millis(5),
            &CancellationToken::new(),
            move || {
                if calls.fetch_add(1, Ordering::SeqCst) >= 1 {
                    Err(MetricsError::Shutdown)
                } else {
                    Ok(Tick {
                        seq: 0,
                        timestamp: Utc::now(),
                    })
                }
            },
        )
        .unwrap();

        let values = drain(&mut stream).await;
        assert!(values.len() <= 1);
        assert!(stream.is_closed());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dropped_consumer_stops_sampling() {
        let counter = Arc::new(AtomicU64::new(0));
        let stream = spawn_session(
            Duration::from_millis(5),
            &CancellationToken::new(),
            counting_producer(Arc::clone(&counter)),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(stream);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let settled = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(counter.load(Ordering::SeqCst), settled);
    }

    #[tokio::test]
    async fn test_timestamps_never_go_backwards() {
        let counter = Arc::new(AtomicU64::new(0));
        let calls = Arc::clone(&counter);
        let base = Utc::now();
        let cancel = CancellationToken::new();
        // Producer clock runs backwards by one second per tick
        let mut stream = spawn_session(Duration::from_millis(5), &cancel, move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) as i64;
            Ok(Tick {
                seq: n as u64,
                timestamp: base - chrono::Duration::seconds(n),
            })
        })
        .unwrap();

        let mut last: Option<DateTime<Utc>> = None;
        for _ in 0..3 {
            let tick = tokio::time::timeout(Duration::from_secs(1), stream.recv())
                .await
                .unwrap()
                .unwrap();
            if let Some(prev) = last {
                assert!(tick.timestamp >= prev);
            }
            last = Some(tick.timestamp);
        }
        cancel.cancel();
    }
}
