//! Plain GPU textures and the state shared with render targets.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{NativeDevice, NativeHandle};
use crate::error::GraphicsError;
use crate::types::{Extent2d, PixelFormat, PixelRect, UsageHint, WrapMode};

use super::GraphicsResource;

/// Native side of a texture: the handle plus a memory estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureData {
    /// Native handle.
    pub handle: NativeHandle,
    /// Estimated GPU memory in bytes.
    pub size_estimate: u64,
}

#[derive(Debug, Default)]
struct LockState {
    count: u32,
    dispose_pending: bool,
    surface_lost: bool,
}

/// Allocation, content size, and lock bookkeeping common to every texture kind.
pub(crate) struct TextureCore {
    resource: GraphicsResource,
    size_estimate: u64,
    format: PixelFormat,
    wrap: WrapMode,
    physical: Extent2d,
    content: Mutex<Extent2d>,
    state: Mutex<LockState>,
    label: &'static str,
}

impl TextureCore {
    pub(crate) fn new(
        resource: GraphicsResource,
        size_estimate: u64,
        format: PixelFormat,
        wrap: WrapMode,
        physical: Extent2d,
        content: Extent2d,
    ) -> Self {
        let label = resource.record().label();
        Self {
            resource,
            size_estimate,
            format,
            wrap,
            physical,
            content: Mutex::new(content),
            state: Mutex::new(LockState::default()),
            label,
        }
    }

    pub(crate) fn device(&self) -> &Arc<dyn NativeDevice> {
        self.resource.record().device()
    }

    pub(crate) fn handle(&self) -> Option<NativeHandle> {
        self.resource.handle()
    }

    pub(crate) fn live_handle(&self) -> Result<NativeHandle, GraphicsError> {
        self.resource.handle().ok_or(GraphicsError::Disposed)
    }

    pub(crate) fn native_data(&self) -> Option<TextureData> {
        self.handle().map(|handle| TextureData {
            handle,
            size_estimate: self.size_estimate,
        })
    }

    pub(crate) fn format(&self) -> PixelFormat {
        self.format
    }

    pub(crate) fn wrap_mode(&self) -> WrapMode {
        self.wrap
    }

    pub(crate) fn physical(&self) -> Extent2d {
        self.physical
    }

    pub(crate) fn content(&self) -> Extent2d {
        *self.content.lock()
    }

    pub(crate) fn set_content(&self, content: Extent2d) -> Result<(), GraphicsError> {
        if content.width > self.physical.width || content.height > self.physical.height {
            return Err(GraphicsError::InvalidParameter(format!(
                "content {}x{} larger than physical {}x{}",
                content.width, content.height, self.physical.width, self.physical.height
            )));
        }
        *self.content.lock() = content;
        Ok(())
    }

    pub(crate) fn lock(&self) {
        let lost = match self.handle() {
            Some(handle) => self.device().is_surface_lost(handle),
            None => true,
        };
        let mut state = self.state.lock();
        state.count += 1;
        state.surface_lost = lost;
    }

    pub(crate) fn unlock(&self) {
        let dispose_now = {
            let mut state = self.state.lock();
            if state.count == 0 {
                log::warn!("{}: unlock without matching lock", self.label);
                return;
            }
            state.count -= 1;
            state.count == 0 && std::mem::take(&mut state.dispose_pending)
        };
        if dispose_now {
            log::trace!("{}: running deferred dispose", self.label);
            self.resource.dispose();
        }
    }

    pub(crate) fn lock_count(&self) -> u32 {
        self.state.lock().count
    }

    pub(crate) fn is_surface_lost(&self) -> bool {
        self.state.lock().surface_lost
    }

    pub(crate) fn dispose(&self) {
        {
            let mut state = self.state.lock();
            if state.count > 0 {
                log::debug!(
                    "{}: dispose deferred, lock count {}",
                    self.label,
                    state.count
                );
                state.dispose_pending = true;
                return;
            }
        }
        self.resource.dispose();
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.resource.is_disposed()
    }

    pub(crate) fn fmt_fields(&self, f: &mut std::fmt::DebugStruct<'_, '_>) {
        f.field("handle", &self.handle())
            .field("format", &self.format)
            .field("physical", &self.physical)
            .field("content", &self.content())
            .field("wrap", &self.wrap)
            .field("lock_count", &self.lock_count());
    }
}

/// A sampled GPU texture.
///
/// Textures are created by [`ResourceFactory::create_texture`] at exactly the
/// requested size and are reference-counted.
///
/// [`ResourceFactory::create_texture`]: crate::ResourceFactory::create_texture
pub struct Texture {
    core: TextureCore,
    hint: UsageHint,
    use_mipmap: bool,
}

impl Texture {
    pub(crate) fn new(core: TextureCore, hint: UsageHint, use_mipmap: bool) -> Self {
        Self {
            core,
            hint,
            use_mipmap,
        }
    }

    /// Allocated width.
    pub fn physical_width(&self) -> u32 {
        self.core.physical().width
    }

    /// Allocated height.
    pub fn physical_height(&self) -> u32 {
        self.core.physical().height
    }

    /// Width of the valid content region.
    pub fn content_width(&self) -> u32 {
        self.core.content().width
    }

    /// Height of the valid content region.
    pub fn content_height(&self) -> u32 {
        self.core.content().height
    }

    /// Shrink or grow the content width within the allocation.
    pub fn set_content_width(&self, width: u32) -> Result<(), GraphicsError> {
        let content = self.core.content();
        self.core.set_content(Extent2d::new(width, content.height))
    }

    /// Shrink or grow the content height within the allocation.
    pub fn set_content_height(&self, height: u32) -> Result<(), GraphicsError> {
        let content = self.core.content();
        self.core.set_content(Extent2d::new(content.width, height))
    }

    /// Texel layout.
    pub fn pixel_format(&self) -> PixelFormat {
        self.core.format()
    }

    /// Edge sampling behavior.
    pub fn wrap_mode(&self) -> WrapMode {
        self.core.wrap_mode()
    }

    /// Update frequency hint.
    pub fn usage_hint(&self) -> UsageHint {
        self.hint
    }

    /// Whether a mip chain was allocated.
    pub fn use_mipmap(&self) -> bool {
        self.use_mipmap
    }

    /// Native handle and memory estimate, `None` once disposed.
    pub fn native_data(&self) -> Option<TextureData> {
        self.core.native_data()
    }

    /// Upload pixels into a region. `stride` is the source row pitch in bytes.
    pub fn update(&self, region: PixelRect, data: &[u8], stride: u32) -> Result<(), GraphicsError> {
        let handle = self.core.live_handle()?;
        let bounds = PixelRect::from_dimensions(self.physical_width(), self.physical_height());
        if !bounds.contains(&region) {
            return Err(GraphicsError::InvalidParameter(format!(
                "update region {:?} outside {}x{} texture",
                region, bounds.width, bounds.height
            )));
        }
        self.core.device().update_texture(handle, region, data, stride)
    }

    /// Pin the texture. Also refreshes the surface-lost flag.
    pub fn lock(&self) {
        self.core.lock();
    }

    /// Release one lock. A deferred dispose runs when the count reaches zero.
    pub fn unlock(&self) {
        self.core.unlock();
    }

    /// Current lock count.
    pub fn lock_count(&self) -> u32 {
        self.core.lock_count()
    }

    /// Whether the texture is pinned.
    pub fn is_locked(&self) -> bool {
        self.lock_count() > 0
    }

    /// Surface-lost flag as of the last [`lock`](Self::lock).
    pub fn is_surface_lost(&self) -> bool {
        self.core.is_surface_lost()
    }

    /// Release the native texture, or defer until unlocked.
    pub fn dispose(&self) {
        self.core.dispose();
    }

    /// Whether the native texture has been released.
    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Texture");
        self.core.fmt_fields(&mut s);
        s.field("hint", &self.hint)
            .field("use_mipmap", &self.use_mipmap)
            .finish()
    }
}

static_assertions::assert_impl_all!(Texture: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::resources::{Disposer, NativeResourceRecord};
    use crate::types::NativeTextureDescriptor;

    fn create_texture(device: &Arc<DummyBackend>, width: u32, height: u32) -> Texture {
        let desc = NativeTextureDescriptor::new_2d(width, height, PixelFormat::IntArgbPre);
        let handle = device.allocate_texture(&desc).unwrap();
        let record = NativeResourceRecord::from_handle(device.clone(), handle, "Texture");
        let resource = GraphicsResource::new(record, Arc::new(Disposer::new()));
        let size = Extent2d::new(width, height);
        let core = TextureCore::new(
            resource,
            desc.byte_size(),
            desc.format,
            WrapMode::ClampToEdge,
            size,
            size,
        );
        Texture::new(core, UsageHint::Default, false)
    }

    #[test]
    fn test_texture_dimensions() {
        let device = Arc::new(DummyBackend::new());
        let texture = create_texture(&device, 100, 50);
        assert_eq!(texture.physical_width(), 100);
        assert_eq!(texture.content_height(), 50);
        assert_eq!(texture.native_data().unwrap().size_estimate, 100 * 50 * 4);

        texture.set_content_width(80).unwrap();
        assert_eq!(texture.content_width(), 80);
        assert!(texture.set_content_height(51).is_err());
    }

    #[test]
    fn test_dispose_deferred_while_locked() {
        let device = Arc::new(DummyBackend::new());
        let texture = create_texture(&device, 16, 16);

        texture.lock();
        texture.lock();
        texture.dispose();
        assert!(!texture.is_disposed());

        texture.unlock();
        assert!(!texture.is_disposed());
        texture.unlock();
        assert!(texture.is_disposed());
        assert_eq!(device.stats().releases, 1);

        texture.unlock();
        assert_eq!(texture.lock_count(), 0);
    }

    #[test]
    fn test_update_after_dispose_fails() {
        let device = Arc::new(DummyBackend::new());
        let texture = create_texture(&device, 4, 4);
        let data = [0u8; 16];
        texture.update(PixelRect::new(0, 0, 2, 2), &data, 8).unwrap();
        assert!(texture.update(PixelRect::new(3, 0, 2, 2), &data, 8).is_err());

        texture.dispose();
        assert_eq!(
            texture.update(PixelRect::new(0, 0, 2, 2), &data, 8),
            Err(GraphicsError::Disposed)
        );
    }

    #[test]
    fn test_texture_debug() {
        let device = Arc::new(DummyBackend::new());
        let texture = create_texture(&device, 8, 8);
        let debug = format!("{:?}", texture);
        assert!(debug.contains("Texture"));
        assert!(debug.contains("IntArgbPre"));
    }
}
