//! Native GPU device boundary.
//!
//! Every GPU allocation this crate makes goes through the [`NativeDevice`]
//! trait. A device hands out opaque [`NativeHandle`]s and takes them back
//! through [`NativeDevice::release_texture`]; nothing else in the crate sees
//! backend objects.
//!
//! # Available Backends
//!
//! - `dummy` (default): In-memory device for tests and headless runs
//! - `wgpu-backend`: GPU device using wgpu

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

pub mod dummy;

use std::num::NonZeroU64;
use std::sync::Arc;

use crate::config::{BackendType, Settings};
use crate::error::GraphicsError;
use crate::types::{Color, NativeTextureDescriptor, PixelRect};

/// Opaque handle to a native texture.
///
/// Handles are never zero, so a released slot can be represented by zero
/// without ever being confused with a live resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(NonZeroU64);

impl NativeHandle {
    /// Wrap a raw handle value. Returns `None` for zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// The raw handle value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Native texture device.
///
/// All methods take `&self`; implementations synchronize internally so a
/// device can be shared between the render thread and resource owners.
pub trait NativeDevice: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Whether the device can accept work right now.
    fn is_device_ready(&self) -> bool;

    /// Allocate a texture at exactly the descriptor's size.
    fn allocate_texture(
        &self,
        descriptor: &NativeTextureDescriptor,
    ) -> Result<NativeHandle, GraphicsError>;

    /// Release a texture. Each handle is released at most once by callers.
    fn release_texture(&self, handle: NativeHandle);

    /// Fill a render target, or one rectangle of it, with a color.
    fn clear_render_target(
        &self,
        handle: NativeHandle,
        color: Color,
        rect: Option<PixelRect>,
    ) -> Result<(), GraphicsError>;

    /// Copy the top-left `width` x `height` pixels of a render target into
    /// `dst` as packed premultiplied ARGB, tightly packed rows.
    fn read_pixels(
        &self,
        handle: NativeHandle,
        width: u32,
        height: u32,
        dst: &mut [u32],
    ) -> Result<(), GraphicsError>;

    /// Upload a region of a plain texture. `stride` is the source row pitch in bytes.
    fn update_texture(
        &self,
        handle: NativeHandle,
        region: PixelRect,
        data: &[u8],
        stride: u32,
    ) -> Result<(), GraphicsError>;

    /// Whether the surface behind a render target has been lost.
    fn is_surface_lost(&self, handle: NativeHandle) -> bool;
}

/// Selects and creates a device according to the settings.
pub fn create_backend(settings: &Settings) -> Result<Arc<dyn NativeDevice>, GraphicsError> {
    match settings.backend {
        BackendType::Dummy => {
            log::info!("Using dummy backend");
            Ok(Arc::new(dummy::DummyBackend::new()))
        }
        BackendType::Wgpu => create_wgpu_backend(),
        BackendType::Auto => {
            #[cfg(feature = "wgpu-backend")]
            {
                match wgpu_backend::WgpuBackend::new() {
                    Ok(backend) => {
                        log::info!("Using wgpu backend");
                        return Ok(Arc::new(backend));
                    }
                    Err(e) => {
                        log::warn!("Failed to create wgpu backend: {}", e);
                    }
                }
            }

            log::info!("Using dummy backend");
            Ok(Arc::new(dummy::DummyBackend::new()))
        }
    }
}

#[cfg(feature = "wgpu-backend")]
fn create_wgpu_backend() -> Result<Arc<dyn NativeDevice>, GraphicsError> {
    let backend = wgpu_backend::WgpuBackend::new()?;
    log::info!("Using wgpu backend");
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "wgpu-backend"))]
fn create_wgpu_backend() -> Result<Arc<dyn NativeDevice>, GraphicsError> {
    Err(GraphicsError::InitializationFailed(
        "built without the wgpu-backend feature".into(),
    ))
}

/// Check if a real GPU backend is available.
pub fn has_gpu_backend() -> bool {
    cfg!(feature = "wgpu-backend")
}
