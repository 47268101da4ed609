//! Texture types and descriptors.

use bitflags::bitflags;

use super::Extent2d;

/// Pixel layouts a texture can be asked to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 8-bit RGB, no alpha.
    ByteRgb,
    /// 8-bit luminance.
    ByteGray,
    /// 8-bit alpha mask.
    ByteAlpha,
    /// 8-bit BGRA, premultiplied. Render targets always use this layout.
    #[default]
    ByteBgraPre,
    /// 32-bit packed ARGB, premultiplied.
    IntArgbPre,
    /// Four 32-bit float channels.
    FloatXyzw,
    /// Planar YCbCr 4:2:0 video frames.
    MultiYCbCr420,
    /// Packed 4:2:2 video frames.
    ByteApple422,
}

impl PixelFormat {
    /// All formats, in native ordinal order.
    pub const ALL: [PixelFormat; 8] = [
        Self::ByteRgb,
        Self::ByteGray,
        Self::ByteAlpha,
        Self::ByteBgraPre,
        Self::IntArgbPre,
        Self::FloatXyzw,
        Self::MultiYCbCr420,
        Self::ByteApple422,
    ];

    /// Returns the size in bytes per pixel (luma plane for planar formats).
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::ByteGray | Self::ByteAlpha | Self::MultiYCbCr420 => 1,
            Self::ByteApple422 => 2,
            Self::ByteRgb => 3,
            Self::ByteBgraPre | Self::IntArgbPre => 4,
            Self::FloatXyzw => 16,
        }
    }

    /// Returns true if the format stores multiple planes.
    pub fn is_planar(&self) -> bool {
        matches!(self, Self::MultiYCbCr420)
    }

    /// Ordinal passed across the native boundary.
    pub fn ordinal(&self) -> u32 {
        Self::ALL
            .iter()
            .position(|f| f == self)
            .map(|i| i as u32)
            .unwrap_or(0)
    }
}

/// Hint describing how often a texture's contents change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UsageHint {
    /// Let the backend decide.
    #[default]
    Default,
    /// Updated frequently.
    Dynamic,
    /// Written once.
    Static,
}

/// Edge sampling behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    /// Sampling never leaves the content area.
    #[default]
    ClampNotNeeded,
    /// Outside samples read transparent black.
    ClampToZero,
    /// Outside samples read the nearest edge texel.
    ClampToEdge,
    /// Texture coordinates wrap.
    Repeat,
}

bitflags! {
    /// Usage flags for native texture allocation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be copied from (readback).
        const COPY_SRC = 1 << 0;
        /// Texture can be copied to (upload).
        const COPY_DST = 1 << 1;
        /// Texture can be sampled in a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// Texture can be used as a render attachment.
        const RENDER_ATTACHMENT = 1 << 3;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Parameters for one native texture allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeTextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Allocated (physical) size.
    pub size: Extent2d,
    /// Texel layout.
    pub format: PixelFormat,
    /// Update frequency hint.
    pub hint: UsageHint,
    /// Usage flags.
    pub usage: TextureUsage,
    /// Sample count for multisampling.
    pub sample_count: u32,
    /// Whether a mip chain should be allocated.
    pub use_mipmap: bool,
}

impl NativeTextureDescriptor {
    /// Create a descriptor for a sampled, uploadable texture.
    pub fn new_2d(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            label: None,
            size: Extent2d::new(width, height),
            format,
            hint: UsageHint::Default,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
            sample_count: 1,
            use_mipmap: false,
        }
    }

    /// Create a descriptor for a render target that can be read back.
    pub fn render_target(width: u32, height: u32) -> Self {
        Self {
            label: None,
            size: Extent2d::new(width, height),
            format: PixelFormat::ByteBgraPre,
            hint: UsageHint::Default,
            usage: TextureUsage::RENDER_ATTACHMENT
                | TextureUsage::COPY_SRC
                | TextureUsage::COPY_DST
                | TextureUsage::TEXTURE_BINDING,
            sample_count: 1,
            use_mipmap: false,
        }
    }

    /// Returns true if the texture will be drawn into.
    pub fn is_render_target(&self) -> bool {
        self.usage.contains(TextureUsage::RENDER_ATTACHMENT)
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the usage hint.
    pub fn with_hint(mut self, hint: UsageHint) -> Self {
        self.hint = hint;
        self
    }

    /// Set the sample count for multisampling.
    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    /// Request a mip chain.
    pub fn with_mipmap(mut self, use_mipmap: bool) -> Self {
        self.use_mipmap = use_mipmap;
        self
    }

    /// Estimated allocation size in bytes (base level only).
    pub fn byte_size(&self) -> u64 {
        self.size.width as u64
            * self.size.height as u64
            * self.format.bytes_per_pixel() as u64
            * self.sample_count.max(1) as u64
    }
}
