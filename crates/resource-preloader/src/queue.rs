//! Load queue: the primitive the preloader issues `BeginLoad`/`EndLoad`
//! requests through.
//!
//! The original offers two interchangeable implementations behind one
//! interface: a single in-flight synchronous slot, and a threaded ring buffer
//! of [`QUEUE_SLOTS`] with a `BytesWaiting` throttle. Both map naturally onto
//! a bounded [`tokio::sync::Semaphore`] here: capacity 1 for the synchronous
//! mode, capacity [`QUEUE_SLOTS`] for the threaded mode. Rust's `Vec<u8>`
//! grows and shrinks on its own, so the original's "buffers exceeding the
//! default capacity shrink back on release" detail has no counterpart to
//! port.

use resource_factory::{Factory, FactoryResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

/// Ring-buffer slot count for the threaded queue mode.
pub const QUEUE_SLOTS: usize = 16;

/// Throttle point: once this many bytes are loaded-but-not-yet-consumed,
/// the queue stops picking up new work.
pub const BYTES_WAITING_THROTTLE: u64 = 4 * 1024 * 1024;

/// Default per-request buffer size hint carried over for documentation
/// parity; Rust's `Vec<u8>` doesn't need a starting capacity reservation
/// to behave well here.
pub const DEFAULT_BUFFER_CAPACITY: usize = 5 * 1024;

/// Which concurrency mode a queue was built in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// A single in-flight request at a time.
    Synchronous,
    /// Up to [`QUEUE_SLOTS`] concurrent requests.
    Threaded,
}

/// Issues raw byte loads on behalf of the preloader, throttling on both
/// concurrency and total bytes held.
#[derive(Clone)]
pub struct LoadQueue {
    mode: QueueMode,
    semaphore: Arc<Semaphore>,
    bytes_waiting: Arc<AtomicU64>,
    notify: Arc<Notify>,
}

impl LoadQueue {
    /// Single in-flight slot; a second load waits for the first to finish.
    #[must_use]
    pub fn synchronous() -> Self {
        Self::with_mode(QueueMode::Synchronous, 1)
    }

    /// Ring buffer of [`QUEUE_SLOTS`] concurrent loads.
    #[must_use]
    pub fn threaded() -> Self {
        Self::with_mode(QueueMode::Threaded, QUEUE_SLOTS)
    }

    fn with_mode(mode: QueueMode, permits: usize) -> Self {
        Self {
            mode,
            semaphore: Arc::new(Semaphore::new(permits)),
            bytes_waiting: Arc::new(AtomicU64::new(0)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Which mode this queue was constructed in.
    #[must_use]
    pub fn mode(&self) -> QueueMode {
        self.mode
    }

    /// Current `BytesWaiting` count.
    #[must_use]
    pub fn bytes_waiting(&self) -> u64 {
        self.bytes_waiting.load(Ordering::Acquire)
    }

    /// `BeginLoad` + `EndLoad` fused into one call: waits for the
    /// throttle and a free slot, then reads `path` through `factory`'s
    /// raw load path.
    pub async fn load(&self, factory: &Factory, path: &str) -> FactoryResult<Vec<u8>> {
        loop {
            if self.bytes_waiting.load(Ordering::Acquire) < BYTES_WAITING_THROTTLE {
                break;
            }
            self.notify.notified().await;
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("queue semaphore is never closed");
        let result = factory.get_raw(path).await;
        if let Ok(buf) = &result {
            self.bytes_waiting.fetch_add(buf.len() as u64, Ordering::AcqRel);
        }
        result
    }

    /// Mark `size` bytes as consumed, releasing throttle pressure.
    pub fn release(&self, size: u64) {
        self.bytes_waiting.fetch_sub(size, Ordering::AcqRel);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synchronous_queue_has_one_permit() {
        let queue = LoadQueue::synchronous();
        assert_eq!(queue.mode(), QueueMode::Synchronous);
        assert_eq!(queue.semaphore.available_permits(), 1);
    }

    #[test]
    fn threaded_queue_has_full_ring() {
        let queue = LoadQueue::threaded();
        assert_eq!(queue.mode(), QueueMode::Threaded);
        assert_eq!(queue.semaphore.available_permits(), QUEUE_SLOTS);
    }

    #[test]
    fn release_decrements_bytes_waiting() {
        let queue = LoadQueue::synchronous();
        queue.bytes_waiting.store(1024, Ordering::Release);
        queue.release(1024);
        assert_eq!(queue.bytes_waiting(), 0);
    }
}
