//! Render target textures.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backend::{NativeDevice, NativeHandle};
use crate::error::GraphicsError;
use crate::types::{Color, Extent2d, PixelFormat, PixelRect, WrapMode};

use super::TextureData;
use super::texture::TextureCore;

/// A texture that can be drawn into and read back.
///
/// The physical size is the aligned allocation and never changes; a target
/// that needs a different size is disposed and replaced. Updating pixels from
/// the CPU is not supported.
pub struct RenderTargetTexture {
    core: TextureCore,
    msaa: bool,
    opaque: AtomicBool,
}

fn unsupported(op: &'static str) -> GraphicsError {
    log::error!("RenderTargetTexture: {op}");
    GraphicsError::Unsupported(op)
}

impl RenderTargetTexture {
    pub(crate) fn new(core: TextureCore, msaa: bool) -> Self {
        Self {
            core,
            msaa,
            opaque: AtomicBool::new(false),
        }
    }

    pub(crate) fn device(&self) -> &Arc<dyn NativeDevice> {
        self.core.device()
    }

    /// Native handle, `None` once disposed.
    pub fn handle(&self) -> Option<NativeHandle> {
        self.core.handle()
    }

    /// Native handle and memory estimate, `None` once disposed.
    pub fn native_data(&self) -> Option<TextureData> {
        self.core.native_data()
    }

    /// Allocated width (a multiple of the alignment).
    pub fn physical_width(&self) -> u32 {
        self.core.physical().width
    }

    /// Allocated height (a multiple of the alignment).
    pub fn physical_height(&self) -> u32 {
        self.core.physical().height
    }

    /// Requested width.
    pub fn content_width(&self) -> u32 {
        self.core.content().width
    }

    /// Requested height.
    pub fn content_height(&self) -> u32 {
        self.core.content().height
    }

    /// Requested size.
    pub fn content_size(&self) -> Extent2d {
        self.core.content()
    }

    /// Always [`PixelFormat::ByteBgraPre`].
    pub fn pixel_format(&self) -> PixelFormat {
        self.core.format()
    }

    /// Edge sampling behavior.
    pub fn wrap_mode(&self) -> WrapMode {
        self.core.wrap_mode()
    }

    /// Whether the target was allocated multisampled.
    pub fn is_msaa(&self) -> bool {
        self.msaa
    }

    /// Whether the content is known to be fully opaque.
    pub fn is_opaque(&self) -> bool {
        self.opaque.load(Ordering::Acquire)
    }

    /// Record whether the content is fully opaque.
    pub fn set_opaque(&self, opaque: bool) {
        self.opaque.store(opaque, Ordering::Release);
    }

    /// Pin the target. Also refreshes the surface-lost flag from the device.
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

    /// Whether the target is pinned.
    pub fn is_locked(&self) -> bool {
        self.lock_count() > 0
    }

    /// Surface-lost flag as of the last [`lock`](Self::lock).
    pub fn is_surface_lost(&self) -> bool {
        self.core.is_surface_lost()
    }

    /// Release the native texture, or defer until the last unlock.
    pub fn dispose(&self) {
        self.core.dispose();
    }

    /// Whether the native texture has been released.
    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    /// Fill the target, or one rectangle of it, with a color.
    pub fn clear(&self, color: Color, rect: Option<PixelRect>) -> Result<(), GraphicsError> {
        let handle = self.core.live_handle()?;
        self.device().clear_render_target(handle, color, rect)
    }

    /// Read the top-left `width` x `height` pixels into `dst`.
    ///
    /// The request is clipped to the physical size; the clipped extent is
    /// returned and rows in `dst` are packed at that width.
    pub fn read_pixels(
        &self,
        width: u32,
        height: u32,
        dst: &mut [u32],
    ) -> Result<Extent2d, GraphicsError> {
        let handle = self.core.live_handle()?;
        let clipped = Extent2d::new(
            width.min(self.physical_width()),
            height.min(self.physical_height()),
        );
        self.device()
            .read_pixels(handle, clipped.width, clipped.height, dst)?;
        Ok(clipped)
    }

    /// Region readback. Not supported.
    pub fn read_pixels_region(
        &self,
        _region: PixelRect,
        _dst: &mut [u32],
    ) -> Result<(), GraphicsError> {
        Err(unsupported("region readback not supported for render targets"))
    }

    /// CPU upload. Not supported.
    pub fn update(&self, _region: PixelRect, _data: &[u8], _stride: u32) -> Result<(), GraphicsError> {
        Err(unsupported("update() not supported for render targets"))
    }

    /// CPU upload from another texture's pixels. Not supported.
    pub fn update_from_texture(&self, _source: &super::Texture) -> Result<(), GraphicsError> {
        Err(unsupported("update_from_texture() not supported for render targets"))
    }

    /// Content resizing. Not supported.
    pub fn set_content_width(&self, _width: u32) -> Result<(), GraphicsError> {
        Err(unsupported("set_content_width() not supported for render targets"))
    }

    /// Content resizing. Not supported.
    pub fn set_content_height(&self, _height: u32) -> Result<(), GraphicsError> {
        Err(unsupported("set_content_height() not supported for render targets"))
    }

    /// Mipmapping. Not supported.
    pub fn set_use_mipmap(&self, _use_mipmap: bool) -> Result<(), GraphicsError> {
        Err(unsupported("mipmaps not supported for render targets"))
    }

    /// Sharing the allocation under a different wrap mode. Not supported.
    pub fn shared_texture(&self, _wrap: WrapMode) -> Result<Arc<RenderTargetTexture>, GraphicsError> {
        Err(unsupported("shared_texture() not supported for render targets"))
    }
}

impl std::fmt::Debug for RenderTargetTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("RenderTargetTexture");
        self.core.fmt_fields(&mut s);
        s.field("msaa", &self.msaa)
            .field("opaque", &self.is_opaque())
            .field("surface_lost", &self.is_surface_lost())
            .finish()
    }
}

static_assertions::assert_impl_all!(RenderTargetTexture: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::resources::{Disposer, GraphicsResource, NativeResourceRecord};
    use crate::types::NativeTextureDescriptor;

    fn create_target(device: &Arc<DummyBackend>, content: Extent2d, physical: Extent2d) -> RenderTargetTexture {
        let desc = NativeTextureDescriptor::render_target(physical.width, physical.height);
        let handle = device.allocate_texture(&desc).unwrap();
        let record = NativeResourceRecord::from_handle(device.clone(), handle, "RenderTargetTexture");
        let resource = GraphicsResource::new(record, Arc::new(Disposer::new()));
        let core = TextureCore::new(
            resource,
            desc.byte_size(),
            PixelFormat::ByteBgraPre,
            WrapMode::ClampNotNeeded,
            physical,
            content,
        );
        RenderTargetTexture::new(core, false)
    }

    #[test]
    fn test_unsupported_operations() {
        let device = Arc::new(DummyBackend::new());
        let rtt = create_target(&device, Extent2d::new(10, 10), Extent2d::new(64, 64));

        assert!(matches!(rtt.update(PixelRect::new(0, 0, 1, 1), &[0; 4], 4), Err(GraphicsError::Unsupported(_))));
        assert!(matches!(rtt.set_content_width(5), Err(GraphicsError::Unsupported(_))));
        assert!(matches!(rtt.set_content_height(5), Err(GraphicsError::Unsupported(_))));
        assert!(matches!(rtt.set_use_mipmap(true), Err(GraphicsError::Unsupported(_))));
        assert!(matches!(rtt.shared_texture(WrapMode::Repeat), Err(GraphicsError::Unsupported(_))));
        let mut dst = [0u32; 4];
        assert!(matches!(
            rtt.read_pixels_region(PixelRect::new(0, 0, 2, 2), &mut dst),
            Err(GraphicsError::Unsupported(_))
        ));
        assert_eq!(rtt.content_size(), Extent2d::new(10, 10));
    }

    #[test]
    fn test_read_pixels_clips_to_physical() {
        let device = Arc::new(DummyBackend::new());
        let rtt = create_target(&device, Extent2d::new(60, 60), Extent2d::new(64, 64));
        rtt.clear(Color::WHITE, None).unwrap();

        let mut dst = vec![0u32; 100 * 100];
        let read = rtt.read_pixels(100, 32, &mut dst).unwrap();
        assert_eq!(read, Extent2d::new(64, 32));
        assert!(dst[..64 * 32].iter().all(|&p| p == 0xFFFF_FFFF));
    }

    #[test]
    fn test_lock_refreshes_surface_lost() {
        let device = Arc::new(DummyBackend::new());
        let rtt = create_target(&device, Extent2d::new(64, 64), Extent2d::new(64, 64));
        rtt.lock();
        assert!(!rtt.is_surface_lost());
        rtt.unlock();

        device.lose_surface(rtt.handle().unwrap());
        assert!(!rtt.is_surface_lost());
        rtt.lock();
        assert!(rtt.is_surface_lost());
        rtt.unlock();
    }

    #[test]
    fn test_clear_after_dispose_fails() {
        let device = Arc::new(DummyBackend::new());
        let rtt = create_target(&device, Extent2d::new(64, 64), Extent2d::new(64, 64));
        rtt.dispose();
        assert_eq!(rtt.clear(Color::BLACK, None), Err(GraphicsError::Disposed));
        let mut dst = vec![0u32; 16];
        assert_eq!(rtt.read_pixels(4, 4, &mut dst), Err(GraphicsError::Disposed));
    }
}
