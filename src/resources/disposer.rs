//! Reclamation of abandoned native resources.
//!
//! When a [`GraphicsResource`](super::GraphicsResource) is dropped without an
//! explicit `dispose()`, its record is parked here instead of being released
//! on whatever thread happened to drop it. The render loop calls
//! [`Disposer::clean_up`] at the end of every frame, which releases the
//! parked records on the render thread.
//!
//! ```text
//! On Drop(GraphicsResource) with a live handle:
//!   1. Don't release the native handle
//!   2. Push the record onto the abandoned list
//!
//! On clean_up() (end of frame):
//!   1. Drain the abandoned list
//!   2. Dispose each record (no-op if already released)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::NativeResourceRecord;

/// Holds abandoned records until the next sweep.
pub struct Disposer {
    abandoned: Mutex<Vec<Arc<NativeResourceRecord>>>,
    released: AtomicU64,
}

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposer")
            .field("pending_count", &self.pending_count())
            .field("released", &self.released_count())
            .finish()
    }
}

impl Disposer {
    /// Create an empty disposer.
    pub fn new() -> Self {
        Self {
            abandoned: Mutex::new(Vec::new()),
            released: AtomicU64::new(0),
        }
    }

    /// Park a record for release at the next sweep.
    pub fn add(&self, record: Arc<NativeResourceRecord>) {
        log::trace!("Disposer: parking abandoned {}", record.label());
        self.abandoned.lock().push(record);
    }

    /// Release every parked record. Returns the number of native releases performed.
    pub fn clean_up(&self) -> usize {
        let records: Vec<_> = self.abandoned.lock().drain(..).collect();
        if records.is_empty() {
            return 0;
        }

        let released = records.iter().filter(|record| record.dispose()).count();
        self.released.fetch_add(released as u64, Ordering::AcqRel);
        log::debug!(
            "Disposer: swept {} abandoned records, {} released",
            records.len(),
            released
        );
        released
    }

    /// Number of records waiting for a sweep.
    pub fn pending_count(&self) -> usize {
        self.abandoned.lock().len()
    }

    /// Total native releases performed by sweeps.
    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::Acquire)
    }
}

impl Default for Disposer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.clean_up();
    }
}

static_assertions::assert_impl_all!(Disposer: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NativeDevice;
    use crate::backend::dummy::DummyBackend;
    use crate::types::NativeTextureDescriptor;

    #[test]
    fn test_sweep_releases_parked_records() {
        let device = Arc::new(DummyBackend::new());
        let disposer = Disposer::new();
        for _ in 0..3 {
            let handle = device
                .allocate_texture(&NativeTextureDescriptor::render_target(64, 64))
                .unwrap();
            disposer.add(NativeResourceRecord::from_handle(device.clone(), handle, "test"));
        }

        assert_eq!(disposer.pending_count(), 3);
        assert_eq!(device.live_texture_count(), 3);

        assert_eq!(disposer.clean_up(), 3);
        assert_eq!(disposer.pending_count(), 0);
        assert_eq!(device.live_texture_count(), 0);
        assert_eq!(disposer.clean_up(), 0);
    }

    #[test]
    fn test_sweep_skips_already_disposed() {
        let device = Arc::new(DummyBackend::new());
        let handle = device
            .allocate_texture(&NativeTextureDescriptor::render_target(64, 64))
            .unwrap();
        let record = NativeResourceRecord::from_handle(device.clone(), handle, "test");
        let disposer = Disposer::new();
        disposer.add(record.clone());

        assert!(record.dispose());
        assert_eq!(disposer.clean_up(), 0);
        assert_eq!(device.stats().releases, 1);
        assert_eq!(device.stats().invalid_releases, 0);
    }
}
