//! Common types shared across the render target layer.

// ============================================================================
// Color
// ============================================================================

/// Non-premultiplied RGBA color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    /// Red component.
    pub r: f32,
    /// Green component.
    pub g: f32,
    /// Blue component.
    pub b: f32,
    /// Alpha component.
    pub a: f32,
}

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Create a new color.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Returns true if alpha is one.
    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0
    }

    /// Pack as premultiplied `0xAARRGGBB`.
    ///
    /// This is also the little-endian layout of a BGRA8 texel, which is what
    /// render targets store.
    pub fn to_int_argb_pre(&self) -> u32 {
        let a = self.a.clamp(0.0, 1.0);
        let channel = |c: f32| -> u32 { (c.clamp(0.0, 1.0) * a * 255.0).round() as u32 };
        let alpha = (a * 255.0).round() as u32;
        (alpha << 24) | (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }
}

// ============================================================================
// Pixel Rectangle
// ============================================================================

/// Integer rectangle in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelRect {
    /// X coordinate of the top-left corner.
    pub x: u32,
    /// Y coordinate of the top-left corner.
    pub y: u32,
    /// Width of the rectangle.
    pub width: u32,
    /// Height of the rectangle.
    pub height: u32,
}

impl PixelRect {
    /// Create a new rectangle.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from dimensions with origin at (0, 0).
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Returns true if the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Intersection with another rectangle.
    pub fn intersect(&self, other: &PixelRect) -> PixelRect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 as u64 || y1 <= y0 as u64 {
            return PixelRect::new(x0, y0, 0, 0);
        }
        PixelRect::new(x0, y0, (x1 - x0 as u64) as u32, (y1 - y0 as u64) as u32)
    }

    /// Returns true if `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &PixelRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

// ============================================================================
// Extent2d
// ============================================================================

/// 2D extent for textures and pixel buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Extent2d {
    /// Create a new extent.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels covered.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_premultiply() {
        assert_eq!(Color::WHITE.to_int_argb_pre(), 0xFFFF_FFFF);
        assert_eq!(Color::TRANSPARENT.to_int_argb_pre(), 0);
        assert_eq!(Color::new(1.0, 0.0, 0.0, 0.5).to_int_argb_pre(), 0x8080_0000);
    }

    #[test]
    fn test_rect_intersect() {
        let a = PixelRect::new(0, 0, 100, 100);
        let b = PixelRect::new(50, 60, 100, 100);
        assert_eq!(a.intersect(&b), PixelRect::new(50, 60, 50, 40));

        let disjoint = PixelRect::new(200, 200, 10, 10);
        assert!(a.intersect(&disjoint).is_empty());
        assert!(a.contains(&PixelRect::new(10, 10, 90, 90)));
        assert!(!a.contains(&b));
    }

    #[test]
    fn test_rect_math_near_u32_max() {
        let bounds = PixelRect::from_dimensions(100, 100);
        let huge = PixelRect::new(10, 10, u32::MAX, u32::MAX);
        assert_eq!(bounds.intersect(&huge), PixelRect::new(10, 10, 90, 90));
        assert_eq!(huge.intersect(&bounds), PixelRect::new(10, 10, 90, 90));

        let far = PixelRect::new(u32::MAX - 1, 0, u32::MAX, 10);
        assert!(bounds.intersect(&far).is_empty());
        assert!(huge.contains(&PixelRect::new(u32::MAX - 5, 20, 5, 5)));
        assert!(!bounds.contains(&huge));
    }
}
