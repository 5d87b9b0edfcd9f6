//! Single-slot, most-recent-wins frame mailbox.
//!
//! A producer thread publishes decoded frames, readers take the latest one.
//! Frames are never queued: a slow reader silently misses the frames that
//! were replaced before it looked.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::frame::Frame;

#[derive(Debug, Default)]
pub struct LatestFrame {
    slot: Mutex<Option<Arc<Frame>>>,
    generation: AtomicU64,
}

impl LatestFrame {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame. The lock is held only for the pointer swap.
    pub fn publish(&self, frame: Frame) {
        let frame = Arc::new(frame);
        let previous = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            slot.replace(frame)
        };
        self.generation.fetch_add(1, Ordering::Release);
        // The old frame is released outside the lock
        drop(previous);
    }

    /// The most recently published frame, if any.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of frames published so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Forget the current frame, e.g. when its stream is torn down.
    pub fn clear(&self) {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}
