//! Scoped storage for detection intermediates.
//!
//! Every raster a detection pass produces (grayscale, binarized, morphology
//! stages) is parked in a [`ScratchBuffers`] guard owned by that pass. The
//! guard releases all of them when it is dropped, whichever way the pass
//! ends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::GrayImage;

/// Handle to a buffer held by a [`ScratchBuffers`] guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(usize);

/// Shared counter of scratch buffers that are currently alive.
///
/// Clones share the same count, so a tracker handed to a backend can be
/// inspected after the detection pass returns.
#[derive(Debug, Clone, Default)]
pub struct ScratchTracker {
    live: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl ScratchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers allocated and not yet released.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Buffers allocated since the tracker was created.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

/// Owner of the intermediate rasters of one detection pass.
#[derive(Debug, Default)]
pub struct ScratchBuffers {
    buffers: Vec<GrayImage>,
    tracker: Option<ScratchTracker>,
}

impl ScratchBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// A guard that reports allocations and releases to `tracker`.
    pub fn tracked(tracker: ScratchTracker) -> Self {
        Self {
            buffers: Vec::new(),
            tracker: Some(tracker),
        }
    }

    /// Take ownership of `buffer` until the guard is dropped.
    pub fn keep(&mut self, buffer: GrayImage) -> BufferId {
        if let Some(tracker) = &self.tracker {
            tracker.live.fetch_add(1, Ordering::SeqCst);
            tracker.total.fetch_add(1, Ordering::SeqCst);
        }
        self.buffers.push(buffer);
        BufferId(self.buffers.len() - 1)
    }

    pub fn get(&self, id: BufferId) -> Option<&GrayImage> {
        self.buffers.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl Drop for ScratchBuffers {
    fn drop(&mut self) {
        let released = self.buffers.len();
        self.buffers.clear();
        if let Some(tracker) = &self.tracker {
            tracker.live.fetch_sub(released, Ordering::SeqCst);
        }
    }
}
