//! Common types and descriptors for render target resources.
//!
//! This module contains format enums, usage flags, and descriptor structs
//! used throughout the crate.

mod common;
mod texture;

pub use common::{Color, Extent2d, PixelRect};
pub use texture::{NativeTextureDescriptor, PixelFormat, TextureUsage, UsageHint, WrapMode};
