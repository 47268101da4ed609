//! Off-screen painter that uploads each frame through a pixel queue.
//!
//! [`UploadPainter::run`] renders one frame of a scene into a GPU render
//! target, reads the pixels back, and hands them to the presentation side
//! through a [`PixelSourceQueue`]. Each run goes through these steps:
//!
//! ```text
//! validate -> decide reset -> (rebuild) -> render -> readback
//!     \             \              \           \          \
//!      +-------------+--------------+-----------+----------+--> cleanup
//! ```
//!
//! Cleanup always runs: it unlocks the target, sweeps abandoned resources,
//! and clears the scene's painting flag. The whole frame runs under the
//! shared render lock.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::config::Settings;
use crate::error::GraphicsError;
use crate::factory::ResourceFactory;
use crate::graphics::Graphics;
use crate::pixel_source::PixelSourceQueue;
use crate::resources::{Disposer, RenderTargetTexture};
use crate::swapchain::SwapChain;
use crate::types::{Color, WrapMode};

/// What the painter needs to know about the scene it draws.
pub trait SceneState: Send + Sync {
    /// Whether the scene and its window can be painted.
    fn is_valid(&self) -> bool;

    /// Render buffer width in device pixels.
    fn render_width(&self) -> u32;

    /// Render buffer height in device pixels.
    fn render_height(&self) -> u32;

    /// Horizontal render scale.
    fn render_scale_x(&self) -> f32;

    /// Vertical render scale.
    fn render_scale_y(&self) -> f32;

    /// Current view width in logical units.
    fn view_width(&self) -> u32;

    /// Current view height in logical units.
    fn view_height(&self) -> u32;

    /// Width of the uploaded image.
    fn output_width(&self) -> u32 {
        self.render_width()
    }

    /// Height of the uploaded image.
    fn output_height(&self) -> u32 {
        self.render_height()
    }

    /// Horizontal scale of the uploaded image.
    fn output_scale_x(&self) -> f32 {
        self.render_scale_x()
    }

    /// Vertical scale of the uploaded image.
    fn output_scale_y(&self) -> f32 {
        self.render_scale_y()
    }

    /// Whether the render target should be multisampled.
    fn is_msaa(&self) -> bool {
        false
    }

    /// Everything must be repainted on the next frame.
    fn entire_scene_needs_repaint(&self);

    /// Set or clear the scene's painting flag.
    fn set_painting(&self, painting: bool);

    /// A new frame is waiting in `source`.
    fn upload_pixels(&self, source: &Arc<PixelSourceQueue>);
}

/// Paint callback for the scene content.
pub trait ScenePainter: Send + Sync {
    /// Draw the scene. `None` means the frame cannot be drawn and only
    /// bookkeeping should happen.
    fn paint(&self, graphics: Option<&mut Graphics>) -> Result<(), GraphicsError>;
}

/// Supplies the resource factory for the current device.
pub type FactoryProvider = Box<dyn Fn() -> Option<Arc<ResourceFactory>> + Send + Sync>;

/// Why a frame was not rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The scene or its window is not paintable.
    InvalidScene,
    /// No factory, or the device is not ready.
    DeviceNotReady,
}

/// Result of one [`UploadPainter::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Nothing was rendered; retry on the next frame.
    Skipped(SkipReason),
    /// The frame was rendered.
    Rendered {
        /// The render target was (re)created this frame.
        reset: bool,
        /// A pixel buffer was enqueued for presentation.
        enqueued: bool,
    },
    /// The frame was abandoned.
    Aborted(GraphicsError),
}

impl FrameOutcome {
    /// Whether the frame produced pixels for presentation.
    pub fn is_enqueued(&self) -> bool {
        matches!(self, Self::Rendered { enqueued: true, .. })
    }
}

#[derive(Default)]
struct FrameState {
    factory: Option<Arc<ResourceFactory>>,
    disposer: Option<Arc<Disposer>>,
    target: Option<Arc<RenderTargetTexture>>,
    swap_chain: Option<SwapChain>,
    pen_scale_x: f32,
    pen_scale_y: f32,
    pen_width: u32,
    pen_height: u32,
    fresh_back_buffer: bool,
}

impl FrameState {
    fn dispose_target(&mut self) {
        self.swap_chain = None;
        if let Some(target) = self.target.take() {
            if target.is_locked() {
                target.unlock();
            }
            target.dispose();
        }
    }
}

/// Runs cleanup when a frame ends, however it ends.
struct FrameGuard<'a> {
    painter: &'a UploadPainter,
    frame: MutexGuard<'a, FrameState>,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if let Some(target) = &self.frame.target {
            if target.is_locked() {
                target.unlock();
            }
        }
        match (&self.frame.factory, &self.frame.disposer) {
            (Some(factory), _) => {
                factory.clean_up();
            }
            (None, Some(disposer)) => {
                disposer.clean_up();
            }
            (None, None) => {}
        }
        self.painter.scene.set_painting(false);
    }
}

/// Paints a scene off-screen and uploads the result.
pub struct UploadPainter {
    scene: Arc<dyn SceneState>,
    content: Arc<dyn ScenePainter>,
    factory_provider: FactoryProvider,
    render_lock: Arc<Mutex<()>>,
    frame: Mutex<FrameState>,
    pixel_source: Arc<PixelSourceQueue>,
    frames_rendered: AtomicU64,
    verbose: bool,
}

impl UploadPainter {
    /// Create a painter with its own render lock.
    pub fn new(
        scene: Arc<dyn SceneState>,
        content: Arc<dyn ScenePainter>,
        factory_provider: FactoryProvider,
        settings: &Settings,
    ) -> Self {
        Self::with_render_lock(
            scene,
            content,
            factory_provider,
            settings,
            Arc::new(Mutex::new(())),
        )
    }

    /// Create a painter that shares `render_lock` with other painters.
    pub fn with_render_lock(
        scene: Arc<dyn SceneState>,
        content: Arc<dyn ScenePainter>,
        factory_provider: FactoryProvider,
        settings: &Settings,
        render_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            scene,
            content,
            factory_provider,
            render_lock,
            frame: Mutex::new(FrameState::default()),
            pixel_source: Arc::new(PixelSourceQueue::from_settings(settings)),
            frames_rendered: AtomicU64::new(0),
            verbose: settings.verbose,
        }
    }

    /// Queue the presentation side drains.
    pub fn pixel_source(&self) -> &Arc<PixelSourceQueue> {
        &self.pixel_source
    }

    /// The lock held for the duration of every frame.
    pub fn render_lock(&self) -> &Arc<Mutex<()>> {
        &self.render_lock
    }

    /// Current render target, if any.
    pub fn render_target(&self) -> Option<Arc<RenderTargetTexture>> {
        self.frame.lock().target.clone()
    }

    /// Number of frames rendered.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Acquire)
    }

    /// Horizontal pixel scale of the scene.
    pub fn pixel_scale_factor_x(&self) -> f32 {
        self.scene.render_scale_x()
    }

    /// Vertical pixel scale of the scene.
    pub fn pixel_scale_factor_y(&self) -> f32 {
        self.scene.render_scale_y()
    }

    /// Release the render target, for example when the window closes.
    pub fn dispose_render_target(&self) {
        let _render = self.render_lock.lock();
        self.frame.lock().dispose_target();
    }

    /// Render one frame.
    pub fn run(&self) -> FrameOutcome {
        let _render = self.render_lock.lock();
        let mut guard = FrameGuard {
            painter: self,
            frame: self.frame.lock(),
        };

        let result = catch_unwind(AssertUnwindSafe(|| self.paint_frame(&mut guard.frame)));
        match result {
            Ok(Ok(outcome)) => {
                if let FrameOutcome::Rendered { .. } = outcome {
                    self.frames_rendered.fetch_add(1, Ordering::AcqRel);
                }
                outcome
            }
            Ok(Err(e)) => {
                log::error!("UploadPainter: frame failed: {}", e);
                FrameOutcome::Aborted(e)
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::error!("UploadPainter: frame panicked: {}", message);
                FrameOutcome::Aborted(GraphicsError::Internal(format!("paint panicked: {message}")))
            }
        }
    }

    fn skip(&self, reason: SkipReason) -> FrameOutcome {
        if self.verbose {
            log::info!("UploadPainter: frame skipped ({:?})", reason);
        } else {
            log::debug!("UploadPainter: frame skipped ({:?})", reason);
        }
        FrameOutcome::Skipped(reason)
    }

    fn paint_frame(&self, frame: &mut FrameState) -> Result<FrameOutcome, GraphicsError> {
        let scene = &*self.scene;

        if !scene.is_valid() {
            self.content.paint(None)?;
            return Ok(self.skip(SkipReason::InvalidScene));
        }

        if frame.factory.is_none() {
            frame.factory = (self.factory_provider)();
        }
        let factory = match &frame.factory {
            Some(factory) if factory.is_device_ready() => Arc::clone(factory),
            _ => {
                frame.factory = None;
                return Ok(self.skip(SkipReason::DeviceNotReady));
            }
        };
        frame.disposer = Some(Arc::clone(factory.disposer()));

        let scale_x = scene.render_scale_x();
        let scale_y = scene.render_scale_y();
        let buf_width = scene.render_width();
        let buf_height = scene.render_height();
        let view_width = scene.view_width();
        let view_height = scene.view_height();

        let mut needs_reset = frame.pen_scale_x != scale_x
            || frame.pen_scale_y != scale_y
            || frame.pen_width != view_width
            || frame.pen_height != view_height
            || match &frame.target {
                Some(target) => {
                    target.content_width() != buf_width || target.content_height() != buf_height
                }
                None => true,
            };

        if !needs_reset {
            if let Some(target) = &frame.target {
                target.lock();
                if target.is_surface_lost() {
                    log::debug!("UploadPainter: surface lost, recreating render target");
                    target.unlock();
                    needs_reset = true;
                }
            }
        }

        if needs_reset {
            frame.dispose_target();
            let target = match factory.create_render_target_msaa(
                buf_width,
                buf_height,
                WrapMode::ClampNotNeeded,
                scene.is_msaa(),
            ) {
                Ok(target) => target,
                Err(e) => {
                    log::warn!(
                        "UploadPainter: render target {}x{} allocation failed: {}",
                        buf_width,
                        buf_height,
                        e
                    );
                    return Ok(FrameOutcome::Aborted(e));
                }
            };
            frame.target = Some(Arc::clone(&target));

            frame.swap_chain = factory.create_presentable(&target, scale_x, scale_y);
            if frame.swap_chain.is_none() {
                frame.dispose_target();
                return Ok(FrameOutcome::Aborted(GraphicsError::Internal(
                    "presentable creation failed".into(),
                )));
            }

            frame.pen_scale_x = scale_x;
            frame.pen_scale_y = scale_y;
            frame.pen_width = view_width;
            frame.pen_height = view_height;
            frame.fresh_back_buffer = true;
            scene.entire_scene_needs_repaint();
        }

        let Some(target) = frame.target.clone() else {
            return Err(GraphicsError::Internal("no render target after reset".into()));
        };

        let mut graphics = match Graphics::new(Arc::clone(&factory), Arc::clone(&target)) {
            Ok(graphics) => graphics,
            Err(e) => {
                frame.dispose_target();
                scene.entire_scene_needs_repaint();
                return Ok(FrameOutcome::Aborted(e));
            }
        };
        graphics.scale(scale_x, scale_y);
        if frame.fresh_back_buffer {
            graphics.clear(Color::TRANSPARENT)?;
        }
        self.content.paint(Some(&mut graphics))?;
        if let Some(swap_chain) = &frame.swap_chain {
            swap_chain.prepare()?;
        }
        frame.fresh_back_buffer = false;

        let out_width = scene.output_width().min(target.physical_width());
        let out_height = scene.output_height().min(target.physical_height());
        let mut pixels = self.pixel_source.get_unused_pixels(
            out_width,
            out_height,
            scene.output_scale_x(),
            scene.output_scale_y(),
        );

        let enqueued = match target.read_pixels(out_width, out_height, pixels.pixels_mut()) {
            Ok(_) => {
                target.unlock();
                self.pixel_source.enqueue_pixels(pixels);
                scene.upload_pixels(&self.pixel_source);
                true
            }
            Err(e) => {
                log::warn!("UploadPainter: readback failed: {}", e);
                scene.entire_scene_needs_repaint();
                frame.dispose_target();
                self.pixel_source.done_with_pixels(pixels);
                false
            }
        };

        Ok(FrameOutcome::Rendered {
            reset: needs_reset,
            enqueued,
        })
    }
}

impl std::fmt::Debug for UploadPainter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadPainter")
            .field("target", &self.render_target())
            .field("pixel_source", &self.pixel_source)
            .field("frames_rendered", &self.frames_rendered())
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(UploadPainter: Send, Sync);
