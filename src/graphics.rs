//! Drawing context for a render target.

use std::sync::Arc;

use crate::error::GraphicsError;
use crate::factory::ResourceFactory;
use crate::resources::RenderTargetTexture;
use crate::types::{Color, PixelRect};

/// 2D affine transform limited to scale and translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2d {
    /// Horizontal scale.
    pub scale_x: f32,
    /// Vertical scale.
    pub scale_y: f32,
    /// Horizontal offset in device pixels.
    pub translate_x: f32,
    /// Vertical offset in device pixels.
    pub translate_y: f32,
}

impl Default for Transform2d {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform2d {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        scale_x: 1.0,
        scale_y: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
    };

    /// Map a user-space point to device space.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.scale_x + self.translate_x,
            y * self.scale_y + self.translate_y,
        )
    }
}

/// Drawing context bound to one render target.
///
/// Created by the painter for each frame; every draw goes through the native
/// clear entry point on a transformed and clipped rectangle.
pub struct Graphics {
    factory: Arc<ResourceFactory>,
    target: Arc<RenderTargetTexture>,
    transform: Transform2d,
    clip: Option<PixelRect>,
}

impl Graphics {
    /// Create a context for a live target.
    pub fn new(
        factory: Arc<ResourceFactory>,
        target: Arc<RenderTargetTexture>,
    ) -> Result<Self, GraphicsError> {
        if target.is_disposed() {
            return Err(GraphicsError::Disposed);
        }
        Ok(Self {
            factory,
            target,
            transform: Transform2d::IDENTITY,
            clip: None,
        })
    }

    /// The factory that created the target.
    pub fn resource_factory(&self) -> &Arc<ResourceFactory> {
        &self.factory
    }

    /// The target being drawn.
    pub fn render_target(&self) -> &Arc<RenderTargetTexture> {
        &self.target
    }

    /// Current transform.
    pub fn transform(&self) -> Transform2d {
        self.transform
    }

    /// Concatenate a scale.
    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.transform.scale_x *= sx;
        self.transform.scale_y *= sy;
    }

    /// Concatenate a translation in user space.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.transform.translate_x += dx * self.transform.scale_x;
        self.transform.translate_y += dy * self.transform.scale_y;
    }

    /// Restrict drawing to a device-space rectangle, or lift the restriction.
    pub fn set_clip_rect(&mut self, clip: Option<PixelRect>) {
        self.clip = clip;
    }

    fn content_bounds(&self) -> PixelRect {
        let content = self.target.content_size();
        let bounds = PixelRect::from_dimensions(content.width, content.height);
        match self.clip {
            Some(clip) => bounds.intersect(&clip),
            None => bounds,
        }
    }

    /// Fill the whole target, or the clip rectangle if set.
    pub fn clear(&mut self, color: Color) -> Result<(), GraphicsError> {
        let rect = self.clip.map(|clip| {
            let physical =
                PixelRect::from_dimensions(self.target.physical_width(), self.target.physical_height());
            physical.intersect(&clip)
        });
        self.target.set_opaque(color.is_opaque());
        self.target.clear(color, rect)
    }

    /// Fill a user-space rectangle.
    pub fn fill_rect(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Color,
    ) -> Result<(), GraphicsError> {
        let (x0, y0) = self.transform.apply(x, y);
        let (x1, y1) = self.transform.apply(x + width, y + height);
        let (left, right) = (x0.min(x1).floor().max(0.0), x0.max(x1).ceil().max(0.0));
        let (top, bottom) = (y0.min(y1).floor().max(0.0), y0.max(y1).ceil().max(0.0));

        let device_rect = PixelRect::new(
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        );
        let rect = device_rect.intersect(&self.content_bounds());
        if rect.is_empty() {
            return Ok(());
        }
        self.target.clear(color, Some(rect))
    }

    /// Flush pending work. Not supported; every call completes synchronously.
    pub fn sync(&mut self) -> Result<(), GraphicsError> {
        Err(GraphicsError::Unsupported("sync() not supported"))
    }
}

impl std::fmt::Debug for Graphics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graphics")
            .field("target", &self.target.handle())
            .field("transform", &self.transform)
            .field("clip", &self.clip)
            .finish()
    }
}
