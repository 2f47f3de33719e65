//! Admission gate bounding simultaneous fetches.
//!
//! The gate is a counting semaphore with a fixed capacity. A permit is handed
//! out as a [`GatePermit`] that gives its slot back when dropped, so a fetch
//! task releases exactly once however it ends: success, failure or panic.
//!
//! The gate also keeps an in-flight counter and its high-water mark. These are
//! updated inside the permit's lifetime (after acquisition, before release),
//! so `in_flight() <= capacity()` holds at every observation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting permit pool shared by the dispatch loop and every fetch task.
#[derive(Clone, Debug)]
pub struct AdmissionGate {
    inner: Arc<GateInner>,
}

#[derive(Debug)]
struct GateInner {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// One held slot of an [`AdmissionGate`]. Dropping it releases the slot.
#[derive(Debug)]
pub struct GatePermit {
    gate: Arc<GateInner>,
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    /// Create a gate admitting at most `capacity` holders at once.
    ///
    /// A capacity of zero would block forever, so it is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(GateInner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Wait until a slot is free and take it.
    pub async fn acquire(&self) -> GatePermit {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .expect("admission gate semaphore is never closed");

        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);

        GatePermit {
            gate: Arc::clone(&self.inner),
            _permit: permit,
        }
    }

    /// Fixed number of slots.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Slots free right now.
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    /// Permits currently held.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of permits ever held at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        // Runs before `_permit` is dropped, so the counter falls before the
        // semaphore can admit the next waiter.
        self.gate.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_zero_capacity_is_raised() {
        let gate = AdmissionGate::new(0);
        assert_eq!(gate.capacity(), 1);
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let gate = AdmissionGate::new(2);

        let first = gate.acquire().await;
        let second = gate.acquire().await;
        assert_eq!(gate.available(), 0);
        assert_eq!(gate.in_flight(), 2);

        drop(first);
        assert_eq!(gate.available(), 1);
        assert_eq!(gate.in_flight(), 1);

        drop(second);
        assert_eq!(gate.available(), 2);
        assert_eq!(gate.in_flight(), 0);
        assert_eq!(gate.peak_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_acquire_blocks_at_capacity() {
        let gate = AdmissionGate::new(1);
        let held = gate.acquire().await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), gate.acquire()).await;
        assert!(blocked.is_err(), "second acquire must wait while the slot is held");

        drop(held);
        let admitted = tokio::time::timeout(Duration::from_secs(1), gate.acquire()).await;
        assert!(admitted.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_capacity_never_exceeded_under_load() {
        let gate = AdmissionGate::new(3);
        let mut handles = Vec::new();

        for _ in 0..40 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire().await;
                assert!(gate.in_flight() <= gate.capacity());
                tokio::time::sleep(Duration::from_millis(5)).await;
                assert!(gate.in_flight() <= gate.capacity());
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(gate.peak_in_flight() <= 3);
        assert!(gate.peak_in_flight() >= 1);
        assert_eq!(gate.in_flight(), 0);
        assert_eq!(gate.available(), 3);
    }

    #[tokio::test]
    async fn test_permit_released_when_holder_panics() {
        let gate = AdmissionGate::new(1);

        let task_gate = gate.clone();
        let result = tokio::spawn(async move {
            let _permit = task_gate.acquire().await;
            panic!("fetch task blew up");
        })
        .await;

        assert!(result.unwrap_err().is_panic());
        assert_eq!(gate.available(), 1);
        assert_eq!(gate.in_flight(), 0);
    }
}
