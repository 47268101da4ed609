//! Presentable bound to a render target.
//!
//! Off-screen painting has no window surface. The [`SwapChain`] wraps the
//! same native handle as its render target and marks each rendered frame as
//! ready for readback.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::NativeHandle;
use crate::error::GraphicsError;
use crate::resources::RenderTargetTexture;

/// Presentable wrapping a render target.
pub struct SwapChain {
    target: Arc<RenderTargetTexture>,
    handle: NativeHandle,
    pixel_scale_x: f32,
    pixel_scale_y: f32,
    frame_count: AtomicU64,
}

impl SwapChain {
    /// Bind to a live target. Returns `None` if the target is already disposed.
    pub fn new(
        target: Arc<RenderTargetTexture>,
        pixel_scale_x: f32,
        pixel_scale_y: f32,
    ) -> Option<Self> {
        let handle = target.handle()?;
        Some(Self {
            target,
            handle,
            pixel_scale_x,
            pixel_scale_y,
            frame_count: AtomicU64::new(0),
        })
    }

    /// The render target.
    pub fn target(&self) -> &Arc<RenderTargetTexture> {
        &self.target
    }

    /// Native handle shared with the target.
    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    /// Horizontal pixel scale the chain was created for.
    pub fn pixel_scale_x(&self) -> f32 {
        self.pixel_scale_x
    }

    /// Vertical pixel scale the chain was created for.
    pub fn pixel_scale_y(&self) -> f32 {
        self.pixel_scale_y
    }

    /// Width of the presented content.
    pub fn content_width(&self) -> u32 {
        self.target.content_width()
    }

    /// Height of the presented content.
    pub fn content_height(&self) -> u32 {
        self.target.content_height()
    }

    /// Finish the frame. Fails if the target was disposed or replaced.
    pub fn prepare(&self) -> Result<(), GraphicsError> {
        if self.target.handle() != Some(self.handle) {
            return Err(GraphicsError::Disposed);
        }
        if self.target.is_surface_lost() {
            return Err(GraphicsError::SurfaceLost);
        }
        let frame = self.frame_count.fetch_add(1, Ordering::AcqRel) + 1;
        log::trace!("SwapChain: prepared frame {} on {}", frame, self.handle);
        Ok(())
    }

    /// Number of frames prepared.
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for SwapChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwapChain")
            .field("handle", &self.handle)
            .field("pixel_scale", &(self.pixel_scale_x, self.pixel_scale_y))
            .field("frame_count", &self.frame_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(SwapChain: Send, Sync);
