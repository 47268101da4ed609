//! Ownership record for one native handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::{NativeDevice, NativeHandle};
use crate::error::GraphicsError;

/// Owns one native handle and releases it at most once.
///
/// The handle slot is swapped to zero on release, so concurrent calls to
/// [`dispose`](Self::dispose) from an owner and from the [`Disposer`] sweep
/// result in exactly one native release. A record that is dropped while
/// still holding a handle releases it then.
///
/// [`Disposer`]: super::Disposer
pub struct NativeResourceRecord {
    handle: AtomicU64,
    device: Arc<dyn NativeDevice>,
    label: &'static str,
}

impl NativeResourceRecord {
    /// Take ownership of a raw native handle.
    ///
    /// A zero handle is a caller bug and is rejected.
    pub fn new(
        device: Arc<dyn NativeDevice>,
        raw_handle: u64,
        label: &'static str,
    ) -> Result<Arc<Self>, GraphicsError> {
        let handle = NativeHandle::new(raw_handle).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("{label}: native handle must be non-zero"))
        })?;
        Ok(Self::from_handle(device, handle, label))
    }

    /// Take ownership of a handle returned by the device.
    pub fn from_handle(
        device: Arc<dyn NativeDevice>,
        handle: NativeHandle,
        label: &'static str,
    ) -> Arc<Self> {
        log::trace!("{label}: tracking native resource {handle}");
        Arc::new(Self {
            handle: AtomicU64::new(handle.get()),
            device,
            label,
        })
    }

    /// The live handle, or `None` after release.
    pub fn handle(&self) -> Option<NativeHandle> {
        NativeHandle::new(self.handle.load(Ordering::Acquire))
    }

    /// The device the handle belongs to.
    pub fn device(&self) -> &Arc<dyn NativeDevice> {
        &self.device
    }

    /// Short description of the owning resource kind.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Whether the handle has been released.
    pub fn is_disposed(&self) -> bool {
        self.handle.load(Ordering::Acquire) == 0
    }

    /// Release the native handle.
    ///
    /// Returns true if this call performed the release.
    pub fn dispose(&self) -> bool {
        let raw = self.handle.swap(0, Ordering::AcqRel);
        match NativeHandle::new(raw) {
            Some(handle) => {
                log::trace!("{}: releasing native resource {}", self.label, handle);
                self.device.release_texture(handle);
                true
            }
            None => false,
        }
    }
}

impl Drop for NativeResourceRecord {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for NativeResourceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeResourceRecord")
            .field("label", &self.label)
            .field("handle", &self.handle())
            .field("device", &self.device.name())
            .finish()
    }
}

static_assertions::assert_impl_all!(NativeResourceRecord: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::types::NativeTextureDescriptor;

    fn allocate(device: &Arc<DummyBackend>) -> NativeHandle {
        device
            .allocate_texture(&NativeTextureDescriptor::render_target(64, 64))
            .unwrap()
    }

    #[test]
    fn test_zero_handle_rejected() {
        let device: Arc<dyn NativeDevice> = Arc::new(DummyBackend::new());
        assert!(matches!(
            NativeResourceRecord::new(device, 0, "test"),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let device = Arc::new(DummyBackend::new());
        let handle = allocate(&device);
        let record = NativeResourceRecord::from_handle(device.clone(), handle, "test");

        assert!(record.dispose());
        assert!(!record.dispose());
        assert!(record.is_disposed());
        assert_eq!(record.handle(), None);
        drop(record);

        let stats = device.stats();
        assert_eq!(stats.releases, 1);
        assert_eq!(stats.invalid_releases, 0);
    }

    #[test]
    fn test_drop_releases_live_handle() {
        let device = Arc::new(DummyBackend::new());
        let handle = allocate(&device);
        drop(NativeResourceRecord::from_handle(device.clone(), handle, "test"));
        assert!(!device.is_live(handle));
        assert_eq!(device.stats().releases, 1);
    }

    #[test]
    fn test_concurrent_dispose_releases_once() {
        let device = Arc::new(DummyBackend::new());
        let handle = allocate(&device);
        let record = NativeResourceRecord::from_handle(device.clone(), handle, "test");

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let record = record.clone();
                std::thread::spawn(move || record.dispose())
            })
            .collect();
        let released = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|&r| r)
            .count();

        assert_eq!(released, 1);
        assert_eq!(device.stats().releases, 1);
        assert_eq!(device.stats().invalid_releases, 0);
    }
}
