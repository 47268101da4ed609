//! Resource factory.
//!
//! The [`ResourceFactory`] is the only place native textures are allocated.
//! It applies the device's sizing rules, registers every new
//! [`NativeResourceRecord`] in its live-record registry, and owns the
//! [`Disposer`] that reclaims abandoned resources.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::backend::NativeDevice;
use crate::config::Settings;
use crate::error::GraphicsError;
use crate::resources::{
    Disposer, GraphicsResource, Mesh, MeshView, NativeResourceRecord, PhongMaterial,
    RenderTargetTexture, Texture, TextureCore,
};
use crate::shader::{Shader, ShaderDescriptor, stock_shader_loader};
use crate::swapchain::SwapChain;
use crate::types::{Extent2d, NativeTextureDescriptor, PixelFormat, UsageHint, WrapMode};

/// Round `val` up to the next multiple of `alignment`.
///
/// Returns `None` if `val` or the rounded value exceeds `max`.
pub fn next_aligned(val: u32, alignment: u32, max: u32) -> Option<u32> {
    if val > max {
        return None;
    }
    let aligned = val.checked_next_multiple_of(alignment.max(1))?;
    (aligned <= max).then_some(aligned)
}

/// Round `val` up to the next multiple of 64 pixels (a 256-byte BGRA row).
pub fn next_multiple_of_64(val: u32, max: u32) -> Option<u32> {
    next_aligned(val, 64, max)
}

/// Allocates textures, render targets, shaders and 3D objects for one device.
pub struct ResourceFactory {
    device: Arc<dyn NativeDevice>,
    settings: Settings,
    disposer: Arc<Disposer>,
    records: RwLock<Vec<Weak<NativeResourceRecord>>>,
    disposed: AtomicBool,
}

impl ResourceFactory {
    /// Create a factory for a device.
    pub fn new(device: Arc<dyn NativeDevice>, settings: Settings) -> Self {
        log::debug!("ResourceFactory: created for {}", device.name());
        Self {
            device,
            settings,
            disposer: Arc::new(Disposer::new()),
            records: RwLock::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }

    /// The native device.
    pub fn device(&self) -> &Arc<dyn NativeDevice> {
        &self.device
    }

    /// Sizing and hand-off settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The tracker for abandoned resources.
    pub fn disposer(&self) -> &Arc<Disposer> {
        &self.disposer
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn check_disposed(&self) -> Result<(), GraphicsError> {
        if self.is_disposed() {
            log::warn!("ResourceFactory: use after dispose");
            return Err(GraphicsError::Disposed);
        }
        Ok(())
    }

    /// Whether the device can accept work.
    pub fn is_device_ready(&self) -> bool {
        !self.is_disposed() && self.device.is_device_ready()
    }

    /// Largest plain texture dimension.
    pub fn max_texture_size(&self) -> u32 {
        self.settings.max_texture_size
    }

    /// Whether textures of `format` can be created.
    pub fn is_format_supported(&self, format: PixelFormat) -> bool {
        match format {
            PixelFormat::ByteRgb
            | PixelFormat::ByteGray
            | PixelFormat::ByteAlpha
            | PixelFormat::ByteBgraPre
            | PixelFormat::IntArgbPre
            | PixelFormat::FloatXyzw => true,
            PixelFormat::MultiYCbCr420 | PixelFormat::ByteApple422 => false,
        }
    }

    /// Whether `texture` can be drawn by this factory's pipeline without copying.
    pub fn is_compatible_texture(&self, _texture: &Texture) -> bool {
        false
    }

    /// Physical width a render target of content width `width` would get.
    pub fn rtt_width(&self, width: u32, _wrap: WrapMode) -> Option<u32> {
        next_aligned(
            width,
            self.settings.rtt_alignment,
            self.settings.max_rtt_dimension,
        )
    }

    /// Physical height a render target of content height `height` would get.
    pub fn rtt_height(&self, height: u32, _wrap: WrapMode) -> Option<u32> {
        next_aligned(
            height,
            self.settings.rtt_alignment,
            self.settings.max_rtt_dimension,
        )
    }

    fn allocate(
        &self,
        descriptor: &NativeTextureDescriptor,
        label: &'static str,
    ) -> Result<GraphicsResource, GraphicsError> {
        let handle = self.device.allocate_texture(descriptor)?;
        let record = NativeResourceRecord::from_handle(Arc::clone(&self.device), handle, label);
        {
            let mut records = self.records.write();
            records.retain(|w| w.strong_count() > 0);
            records.push(Arc::downgrade(&record));
        }
        Ok(GraphicsResource::new(record, Arc::clone(&self.disposer)))
    }

    /// Create a texture at exactly the requested size.
    pub fn create_texture(
        &self,
        format: PixelFormat,
        hint: UsageHint,
        wrap: WrapMode,
        width: u32,
        height: u32,
    ) -> Result<Arc<Texture>, GraphicsError> {
        self.create_texture_with_mipmap(format, hint, wrap, width, height, false)
    }

    /// Create a texture at exactly the requested size, optionally with mipmaps.
    pub fn create_texture_with_mipmap(
        &self,
        format: PixelFormat,
        hint: UsageHint,
        wrap: WrapMode,
        width: u32,
        height: u32,
        use_mipmap: bool,
    ) -> Result<Arc<Texture>, GraphicsError> {
        self.check_disposed()?;
        if !self.is_format_supported(format) {
            return Err(GraphicsError::Unsupported("pixel format not supported"));
        }
        if width == 0 || height == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture size {width}x{height}"
            )));
        }
        let max = self.max_texture_size();
        if width > max || height > max {
            return Err(GraphicsError::DimensionTooLarge {
                requested: width.max(height),
                max,
            });
        }

        let descriptor = NativeTextureDescriptor::new_2d(width, height, format)
            .with_label("Texture")
            .with_hint(hint)
            .with_mipmap(use_mipmap);
        let resource = self.allocate(&descriptor, "Texture").map_err(|e| {
            log::error!("ResourceFactory: texture {width}x{height} allocation failed: {e}");
            match e {
                GraphicsError::AllocationFailed(_) => e,
                other => GraphicsError::AllocationFailed(other.to_string()),
            }
        })?;

        log::trace!("ResourceFactory: created texture {width}x{height} {format:?}");
        let size = Extent2d::new(width, height);
        let core = TextureCore::new(resource, descriptor.byte_size(), format, wrap, size, size);
        Ok(Arc::new(Texture::new(core, hint, use_mipmap)))
    }

    /// Create a single-sampled render target.
    pub fn create_render_target(
        &self,
        width: u32,
        height: u32,
        wrap: WrapMode,
    ) -> Result<Arc<RenderTargetTexture>, GraphicsError> {
        self.create_render_target_msaa(width, height, wrap, false)
    }

    /// Create a render target.
    ///
    /// Both dimensions are rounded up to the alignment; a dimension above the
    /// maximum is rejected. The content size stays as requested. The target
    /// is returned locked once.
    pub fn create_render_target_msaa(
        &self,
        width: u32,
        height: u32,
        wrap: WrapMode,
        msaa: bool,
    ) -> Result<Arc<RenderTargetTexture>, GraphicsError> {
        self.check_disposed()?;
        if width == 0 || height == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "render target size {width}x{height}"
            )));
        }
        let max = self.settings.max_rtt_dimension;
        let too_large = |requested: u32| GraphicsError::DimensionTooLarge { requested, max };
        let physical_width = self.rtt_width(width, wrap).ok_or_else(|| too_large(width))?;
        let physical_height = self
            .rtt_height(height, wrap)
            .ok_or_else(|| too_large(height))?;

        log::debug!(
            "ResourceFactory: render target {}x{} -> {}x{} (msaa: {})",
            width,
            height,
            physical_width,
            physical_height,
            msaa
        );

        // Multisampled targets are allocated single-sampled; there is no resolve pass.
        let descriptor = NativeTextureDescriptor::render_target(physical_width, physical_height)
            .with_label("RenderTargetTexture");
        let resource = self.allocate(&descriptor, "RenderTargetTexture")?;
        let core = TextureCore::new(
            resource,
            descriptor.byte_size(),
            PixelFormat::ByteBgraPre,
            wrap,
            Extent2d::new(physical_width, physical_height),
            Extent2d::new(width, height),
        );
        let target = Arc::new(RenderTargetTexture::new(core, msaa));
        target.lock();
        Ok(target)
    }

    /// Create a presentable bound to a render target.
    pub fn create_presentable(
        &self,
        target: &Arc<RenderTargetTexture>,
        pixel_scale_x: f32,
        pixel_scale_y: f32,
    ) -> Option<SwapChain> {
        if self.is_disposed() {
            return None;
        }
        SwapChain::new(Arc::clone(target), pixel_scale_x, pixel_scale_y)
    }

    /// Create a shader program.
    pub fn create_shader(&self, descriptor: ShaderDescriptor) -> Result<Arc<Shader>, GraphicsError> {
        self.check_disposed()?;
        descriptor.validate()?;
        log::debug!(
            "ResourceFactory: shader {} (samplers: {:?}, params: {:?}, max tex coord: {}, pixcoord: {}, vertex color: {})",
            descriptor.name,
            descriptor.samplers,
            descriptor.params,
            descriptor.max_tex_coord_index,
            descriptor.pixcoord_used,
            descriptor.per_vertex_color_used
        );
        Ok(Arc::new(Shader::new(descriptor)))
    }

    /// Create a shader whose program name is read from `source`.
    pub fn create_shader_from_stream(
        &self,
        mut source: impl Read,
        descriptor: ShaderDescriptor,
    ) -> Result<Arc<Shader>, GraphicsError> {
        let mut name = String::new();
        source.read_to_string(&mut name).map_err(|e| {
            GraphicsError::InvalidParameter(format!("failed to read shader name: {e}"))
        })?;
        self.create_shader(ShaderDescriptor {
            name: name.trim().to_string(),
            ..descriptor
        })
    }

    /// Create one of the built-in shaders by name.
    pub fn create_stock_shader(&self, name: &str) -> Result<Arc<Shader>, GraphicsError> {
        if self.settings.verbose {
            log::info!("ResourceFactory: createStockShader {name}");
        }
        let loader = stock_shader_loader(name).ok_or_else(|| {
            log::error!("ResourceFactory: no stock shader {name:?}");
            GraphicsError::ShaderNotFound(name.to_string())
        })?;
        self.create_shader(loader())
    }

    /// Create a phong material. `None` once disposed.
    pub fn create_phong_material(&self) -> Option<Arc<PhongMaterial>> {
        self.check_disposed().ok()?;
        Some(Arc::new(PhongMaterial::new()))
    }

    /// Create an empty mesh. `None` once disposed.
    pub fn create_mesh(&self) -> Option<Arc<Mesh>> {
        self.check_disposed().ok()?;
        Some(Arc::new(Mesh::new()))
    }

    /// Create a view of a mesh. `None` once disposed.
    pub fn create_mesh_view(&self, mesh: &Arc<Mesh>) -> Option<Arc<MeshView>> {
        self.check_disposed().ok()?;
        Some(Arc::new(MeshView::new(Arc::clone(mesh))))
    }

    /// Number of records that still hold a native handle.
    pub fn live_record_count(&self) -> usize {
        self.records
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|record| !record.is_disposed())
            .count()
    }

    /// Sweep abandoned resources and prune dead registry entries.
    pub fn clean_up(&self) -> usize {
        let released = self.disposer.clean_up();
        self.records.write().retain(|w| w.strong_count() > 0);
        released
    }

    /// Release every live resource and refuse further allocation.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let records: Vec<_> = self
            .records
            .write()
            .drain(..)
            .filter_map(|w| w.upgrade())
            .collect();
        let released = records.iter().filter(|record| record.dispose()).count();
        let swept = self.disposer.clean_up();
        log::debug!(
            "ResourceFactory: disposed, released {} live and {} abandoned resources",
            released,
            swept
        );
    }
}

impl std::fmt::Debug for ResourceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceFactory")
            .field("device", &self.device.name())
            .field("live_records", &self.live_record_count())
            .field("disposer", &self.disposer)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

static_assertions::assert_impl_all!(ResourceFactory: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;

    fn create_factory() -> (Arc<DummyBackend>, ResourceFactory) {
        let device = Arc::new(DummyBackend::new());
        let factory = ResourceFactory::new(device.clone(), Settings::default());
        (device, factory)
    }

    #[test]
    fn test_next_multiple_of_64() {
        assert_eq!(next_multiple_of_64(800, 8192), Some(832));
        assert_eq!(next_multiple_of_64(832, 8192), Some(832));
        assert_eq!(next_multiple_of_64(1, 8192), Some(64));
        assert_eq!(next_multiple_of_64(8192, 8192), Some(8192));
        assert_eq!(next_multiple_of_64(8193, 8192), None);
        assert_eq!(next_aligned(8150, 100, 8192), None);
    }

    #[test]
    fn test_render_target_rounding() {
        let (_device, factory) = create_factory();
        let rtt = factory
            .create_render_target(800, 600, WrapMode::ClampNotNeeded)
            .unwrap();
        assert_eq!(rtt.physical_width(), 832);
        assert_eq!(rtt.physical_height(), 640);
        assert_eq!(rtt.content_width(), 800);
        assert_eq!(rtt.content_height(), 600);
        assert_eq!(rtt.lock_count(), 1);
    }

    #[test]
    fn test_render_target_too_large() {
        let (device, factory) = create_factory();
        let result = factory.create_render_target(9000, 500, WrapMode::ClampNotNeeded);
        assert_eq!(
            result.unwrap_err(),
            GraphicsError::DimensionTooLarge {
                requested: 9000,
                max: 8192
            }
        );
        assert_eq!(device.stats().allocations, 0);
    }

    #[test]
    fn test_plain_texture_not_rounded() {
        let (_device, factory) = create_factory();
        let texture = factory
            .create_texture(
                PixelFormat::ByteRgb,
                UsageHint::Static,
                WrapMode::ClampToEdge,
                100,
                30,
            )
            .unwrap();
        assert_eq!(texture.physical_width(), 100);
        assert_eq!(texture.physical_height(), 30);
        assert!(!texture.use_mipmap());
    }

    #[test]
    fn test_texture_allocation_failure() {
        let (device, factory) = create_factory();
        device.fail_next_allocations(1);
        let result = factory.create_texture(
            PixelFormat::ByteGray,
            UsageHint::Default,
            WrapMode::ClampToZero,
            16,
            16,
        );
        assert!(matches!(result, Err(GraphicsError::AllocationFailed(_))));
        assert_eq!(factory.live_record_count(), 0);
    }

    #[test]
    fn test_format_support() {
        let (_device, factory) = create_factory();
        let supported: Vec<_> = PixelFormat::ALL
            .iter()
            .filter(|f| factory.is_format_supported(**f))
            .collect();
        assert_eq!(supported.len(), 6);
        assert!(!factory.is_format_supported(PixelFormat::MultiYCbCr420));
        assert!(!factory.is_format_supported(PixelFormat::ByteApple422));
        assert_eq!(factory.max_texture_size(), 16384);
    }

    #[test]
    fn test_stock_shader() {
        let (_device, factory) = create_factory();
        let shader = factory.create_stock_shader("Texture_Color").unwrap();
        assert_eq!(shader.name(), "Texture_Color");
        assert_eq!(shader.sampler_unit("maskInput"), Some(0));
        assert_eq!(
            factory.create_stock_shader("NoSuchShader").unwrap_err(),
            GraphicsError::ShaderNotFound("NoSuchShader".into())
        );
    }

    #[test]
    fn test_shader_from_stream() {
        let (_device, factory) = create_factory();
        let shader = factory
            .create_shader_from_stream(
                "Solid_Custom\n".as_bytes(),
                ShaderDescriptor::default().with_param("color", 0),
            )
            .unwrap();
        assert_eq!(shader.name(), "Solid_Custom");
        assert_eq!(shader.param_index("color"), Some(0));
    }

    #[test]
    fn test_dispose_releases_live_records() {
        let (device, factory) = create_factory();
        let rtt = factory
            .create_render_target(64, 64, WrapMode::ClampNotNeeded)
            .unwrap();
        let texture = factory
            .create_texture(
                PixelFormat::IntArgbPre,
                UsageHint::Default,
                WrapMode::Repeat,
                8,
                8,
            )
            .unwrap();
        assert_eq!(factory.live_record_count(), 2);

        factory.dispose();
        assert!(rtt.is_disposed());
        assert!(texture.is_disposed());
        assert_eq!(device.live_texture_count(), 0);
        assert_eq!(device.stats().invalid_releases, 0);

        assert!(factory.create_phong_material().is_none());
        assert!(factory.create_mesh().is_none());
        assert!(!factory.is_device_ready());
        assert_eq!(
            factory
                .create_render_target(64, 64, WrapMode::ClampNotNeeded)
                .unwrap_err(),
            GraphicsError::Disposed
        );
    }

    #[test]
    fn test_abandoned_texture_swept_by_clean_up() {
        let (device, factory) = create_factory();
        let texture = factory
            .create_texture(
                PixelFormat::ByteAlpha,
                UsageHint::Dynamic,
                WrapMode::ClampToEdge,
                32,
                32,
            )
            .unwrap();
        drop(texture);
        assert_eq!(device.live_texture_count(), 1);
        assert_eq!(factory.clean_up(), 1);
        assert_eq!(device.live_texture_count(), 0);
    }

    #[test]
    fn test_mesh_view_creation() {
        let (_device, factory) = create_factory();
        let mesh = factory.create_mesh().unwrap();
        let view = factory.create_mesh_view(&mesh).unwrap();
        assert!(Arc::ptr_eq(view.mesh(), &mesh));
        view.set_material(factory.create_phong_material());
        assert!(view.material().is_some());
    }
}
