//! Base of every object that owns a native handle.

use std::sync::Arc;

use crate::backend::NativeHandle;

use super::{Disposer, NativeResourceRecord};

/// Ties a [`NativeResourceRecord`] to the disposal tracker.
///
/// Explicit [`dispose`](Self::dispose) releases immediately. Dropping a
/// resource that still holds a handle parks its record with the [`Disposer`],
/// which releases it at the next sweep.
pub struct GraphicsResource {
    record: Arc<NativeResourceRecord>,
    disposer: Arc<Disposer>,
}

impl GraphicsResource {
    /// Attach a record to a disposer.
    pub fn new(record: Arc<NativeResourceRecord>, disposer: Arc<Disposer>) -> Self {
        Self { record, disposer }
    }

    /// The owned record.
    pub fn record(&self) -> &Arc<NativeResourceRecord> {
        &self.record
    }

    /// The live handle, or `None` after release.
    pub fn handle(&self) -> Option<NativeHandle> {
        self.record.handle()
    }

    /// Whether the handle has been released.
    pub fn is_disposed(&self) -> bool {
        self.record.is_disposed()
    }

    /// Release the native handle now. Safe to call repeatedly.
    pub fn dispose(&self) {
        self.record.dispose();
    }
}

impl Drop for GraphicsResource {
    fn drop(&mut self) {
        if !self.record.is_disposed() {
            self.disposer.add(Arc::clone(&self.record));
        }
    }
}

impl std::fmt::Debug for GraphicsResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsResource")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(GraphicsResource: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NativeDevice;
    use crate::backend::dummy::DummyBackend;
    use crate::types::NativeTextureDescriptor;

    fn resource(device: &Arc<DummyBackend>, disposer: &Arc<Disposer>) -> GraphicsResource {
        let handle = device
            .allocate_texture(&NativeTextureDescriptor::render_target(64, 64))
            .unwrap();
        let record = NativeResourceRecord::from_handle(device.clone(), handle, "test");
        GraphicsResource::new(record, disposer.clone())
    }

    #[test]
    fn test_abandoned_resource_is_swept() {
        let device = Arc::new(DummyBackend::new());
        let disposer = Arc::new(Disposer::new());

        drop(resource(&device, &disposer));
        assert_eq!(disposer.pending_count(), 1);
        assert_eq!(device.live_texture_count(), 1);

        disposer.clean_up();
        assert_eq!(device.live_texture_count(), 0);
    }

    #[test]
    fn test_disposed_resource_is_not_parked() {
        let device = Arc::new(DummyBackend::new());
        let disposer = Arc::new(Disposer::new());

        let res = resource(&device, &disposer);
        res.dispose();
        res.dispose();
        assert!(res.is_disposed());
        drop(res);

        assert_eq!(disposer.pending_count(), 0);
        assert_eq!(device.stats().releases, 1);
    }
}
