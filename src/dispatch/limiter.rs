use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// Bounded count of backend sends allowed in flight.
///
/// Acquisition never blocks: a denied caller decides what to do instead.
pub struct AdmissionLimiter {
    permits: Semaphore,
    capacity: usize,
    outstanding: AtomicUsize,
    closed: AtomicBool,
}

impl AdmissionLimiter {
    /// Largest capacity the limiter can represent.
    pub const MAX_CAPACITY: usize = Semaphore::MAX_PERMITS;

    /// `capacity` is clamped to [`Self::MAX_CAPACITY`].
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.min(Self::MAX_CAPACITY);
        Arc::new(Self {
            permits: Semaphore::new(capacity),
            capacity,
            outstanding: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Takes one token if available.
    pub fn allow(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        match self.permits.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.outstanding.fetch_add(1, Ordering::AcqRel);
                true
            }
            Err(_) => false,
        }
    }

    /// Returns one token. Releases beyond what was acquired are ignored.
    pub fn release(&self) {
        let released = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if released {
            self.permits.add_permits(1);
        }
    }

    /// Refuses all further acquisitions. Outstanding tokens stay valid and
    /// may still be released.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// RAII form of [`allow`](Self::allow): the token is released on drop.
    pub fn try_admit(self: &Arc<Self>) -> Option<AdmissionToken> {
        self.allow().then(|| AdmissionToken {
            limiter: Arc::clone(self),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }
}

pub struct AdmissionToken {
    limiter: Arc<AdmissionLimiter>,
}

impl Drop for AdmissionToken {
    fn drop(&mut self) {
        self.limiter.release();
    }
}
