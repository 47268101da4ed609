//! Off-screen render targets - resource lifecycle and an uploading painter
//!
//! This crate supports two backends:
//! - **dummy**: In-memory textures, always available (used by tests and headless runs)
//! - **wgpu**: Real GPU textures via wgpu (behind the `wgpu-backend` feature)
//!
//! # Features
//! - Native resource records released exactly once, from any thread
//! - Deferred disposal of abandoned resources on the render thread
//! - Render target allocation rounded up to a 64-pixel grid
//! - Lock counting with deferred dispose and surface-loss detection
//! - Per-frame painter that reads pixels back into a bounded queue

pub mod backend;
pub mod config;
pub mod error;
pub mod factory;
pub mod graphics;
pub mod painter;
pub mod pixel_source;
pub mod resources;
pub mod shader;
pub mod swapchain;
pub mod types;

pub use backend::{NativeDevice, NativeHandle, create_backend};
pub use config::{BackendType, Settings};
pub use error::GraphicsError;
pub use factory::{ResourceFactory, next_multiple_of_64};
pub use graphics::{Graphics, Transform2d};
pub use painter::{FactoryProvider, FrameOutcome, ScenePainter, SceneState, SkipReason, UploadPainter};
pub use pixel_source::{PixelBuffer, PixelSourceQueue, QueueStats};
pub use resources::{Disposer, GraphicsResource, NativeResourceRecord, RenderTargetTexture, Texture};
pub use swapchain::SwapChain;
pub use types::{Color, Extent2d, PixelFormat, PixelRect, WrapMode};

#[cfg(feature = "wgpu-backend")]
pub use backend::wgpu_backend::WgpuBackend;
