//! Per-frame callback scheduling.
//!
//! The host owns the display clock. Components ask it for "one callback on
//! the next frame" and may cancel that request before it fires; the host
//! later delivers the request id back together with a timestamp.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Identifier of one pending frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameRequestId(pub u64);

/// A host capable of delivering a callback on the next display frame.
pub trait FrameScheduler: Send + Sync {
    fn request_frame(&self) -> FrameRequestId;

    /// Cancel a pending request; unknown or already-fired ids are ignored.
    fn cancel_frame(&self, id: FrameRequestId);
}

#[derive(Debug, Default)]
struct Requests {
    next_id: u64,
    pending: BTreeSet<FrameRequestId>,
    requested: usize,
    cancelled: usize,
}

/// Scheduler driven by hand: requests queue up until the owner calls
/// [`take_pending`](Self::take_pending) and dispatches them.
///
/// Clones share the same queue, so one instance can serve several
/// components and the driving loop at once.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<Requests>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every pending request, oldest first.
    pub fn take_pending(&self) -> Vec<FrameRequestId> {
        let mut inner = self.inner.lock();
        std::mem::take(&mut inner.pending).into_iter().collect()
    }

    pub fn pending(&self) -> Vec<FrameRequestId> {
        self.inner.lock().pending.iter().copied().collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.lock().pending.is_empty()
    }

    /// Requests made since creation.
    pub fn request_count(&self) -> usize {
        self.inner.lock().requested
    }

    /// Cancellations of requests that were still pending.
    pub fn cancel_count(&self) -> usize {
        self.inner.lock().cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&self) -> FrameRequestId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = FrameRequestId(inner.next_id);
        inner.pending.insert(id);
        inner.requested += 1;
        id
    }

    fn cancel_frame(&self, id: FrameRequestId) {
        let mut inner = self.inner.lock();
        if inner.pending.remove(&id) {
            inner.cancelled += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_queue_until_taken() {
        let scheduler = ManualScheduler::new();
        let a = scheduler.request_frame();
        let b = scheduler.request_frame();
        assert_ne!(a, b);
        assert_eq!(scheduler.take_pending(), vec![a, b]);
        assert!(!scheduler.has_pending());
    }

    #[test]
    fn test_cancel_counts_only_pending() {
        let scheduler = ManualScheduler::new();
        let id = scheduler.request_frame();
        scheduler.cancel_frame(id);
        scheduler.cancel_frame(id);
        assert_eq!(scheduler.cancel_count(), 1);
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn test_clones_share_queue() {
        let scheduler = ManualScheduler::new();
        let other = scheduler.clone();
        let id = other.request_frame();
        assert_eq!(scheduler.pending(), vec![id]);
        assert_eq!(scheduler.request_count(), 1);
    }
}
