//! Shared fixtures for the integration tests.
//!
//! Provides a configurable scene, a recording paint callback, and a context
//! that wires both to a factory on the requested backend.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use offscreen_rtt::backend::dummy::DummyBackend;
use offscreen_rtt::{
    BackendType, Color, Graphics, GraphicsError, NativeDevice, PixelSourceQueue, ResourceFactory,
    ScenePainter, SceneState, Settings, UploadPainter, create_backend,
};

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Backends the tests can run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// In-memory device, always available.
    Dummy,
    /// wgpu device, available with the `wgpu-backend` feature and a GPU.
    Wgpu,
}

/// Create a factory on `backend`, or `None` if it is unavailable here.
pub fn factory_for(backend: Backend) -> Option<Arc<ResourceFactory>> {
    let settings = match backend {
        Backend::Dummy => Settings::default().with_backend(BackendType::Dummy),
        Backend::Wgpu => Settings::default().with_backend(BackendType::Wgpu),
    };
    let device: Arc<dyn NativeDevice> = create_backend(&settings).ok()?;
    Some(Arc::new(ResourceFactory::new(device, settings)))
}

// ============================================================================
// Scene
// ============================================================================

fn pack(width: u32, height: u32) -> u64 {
    ((width as u64) << 32) | height as u64
}

fn unpack(packed: u64) -> Option<(u32, u32)> {
    (packed != 0).then_some(((packed >> 32) as u32, packed as u32))
}

/// Scene whose size and scale can change between frames.
pub struct TestScene {
    width: AtomicU32,
    height: AtomicU32,
    scale_x: AtomicU32,
    scale_y: AtomicU32,
    render_override: AtomicU64,
    output_override: AtomicU64,
    pub valid: AtomicBool,
    pub msaa: AtomicBool,
    pub dirty: AtomicBool,
    pub painting: AtomicBool,
    pub repaint_requests: AtomicUsize,
    pub uploads: AtomicUsize,
}

impl TestScene {
    pub fn new(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            width: AtomicU32::new(width),
            height: AtomicU32::new(height),
            scale_x: AtomicU32::new(1.0f32.to_bits()),
            scale_y: AtomicU32::new(1.0f32.to_bits()),
            render_override: AtomicU64::new(0),
            output_override: AtomicU64::new(0),
            valid: AtomicBool::new(true),
            msaa: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            painting: AtomicBool::new(false),
            repaint_requests: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
        })
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.width.store(width, Ordering::SeqCst);
        self.height.store(height, Ordering::SeqCst);
    }

    pub fn set_scale(&self, scale_x: f32, scale_y: f32) {
        self.scale_x.store(scale_x.to_bits(), Ordering::SeqCst);
        self.scale_y.store(scale_y.to_bits(), Ordering::SeqCst);
    }

    /// Pin the render size so it no longer follows the view size.
    pub fn pin_render_size(&self, width: u32, height: u32) {
        self.render_override.store(pack(width, height), Ordering::SeqCst);
    }

    /// Upload a different size than the render size.
    pub fn set_output_size(&self, width: u32, height: u32) {
        self.output_override.store(pack(width, height), Ordering::SeqCst);
    }

    /// Mark a frame as scheduled, the way the toolkit does before `run`.
    pub fn begin(&self) {
        self.painting.store(true, Ordering::SeqCst);
    }
}

impl SceneState for TestScene {
    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    fn render_width(&self) -> u32 {
        if let Some((width, _)) = unpack(self.render_override.load(Ordering::SeqCst)) {
            return width;
        }
        let scale = f32::from_bits(self.scale_x.load(Ordering::SeqCst));
        (self.width.load(Ordering::SeqCst) as f32 * scale).ceil() as u32
    }

    fn render_height(&self) -> u32 {
        if let Some((_, height)) = unpack(self.render_override.load(Ordering::SeqCst)) {
            return height;
        }
        let scale = f32::from_bits(self.scale_y.load(Ordering::SeqCst));
        (self.height.load(Ordering::SeqCst) as f32 * scale).ceil() as u32
    }

    fn render_scale_x(&self) -> f32 {
        f32::from_bits(self.scale_x.load(Ordering::SeqCst))
    }

    fn render_scale_y(&self) -> f32 {
        f32::from_bits(self.scale_y.load(Ordering::SeqCst))
    }

    fn view_width(&self) -> u32 {
        self.width.load(Ordering::SeqCst)
    }

    fn view_height(&self) -> u32 {
        self.height.load(Ordering::SeqCst)
    }

    fn output_width(&self) -> u32 {
        unpack(self.output_override.load(Ordering::SeqCst))
            .map_or_else(|| self.render_width(), |(width, _)| width)
    }

    fn output_height(&self) -> u32 {
        unpack(self.output_override.load(Ordering::SeqCst))
            .map_or_else(|| self.render_height(), |(_, height)| height)
    }

    fn is_msaa(&self) -> bool {
        self.msaa.load(Ordering::SeqCst)
    }

    fn entire_scene_needs_repaint(&self) {
        self.repaint_requests.fetch_add(1, Ordering::SeqCst);
        self.dirty.store(true, Ordering::SeqCst);
    }

    fn set_painting(&self, painting: bool) {
        self.painting.store(painting, Ordering::SeqCst);
    }

    fn upload_pixels(&self, _source: &Arc<PixelSourceQueue>) {
        self.uploads.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Paint Callback
// ============================================================================

/// Paint callback that fills a square and records what it saw.
pub struct RecordingPainter {
    scene: Arc<TestScene>,
    pub color: Color,
    pub paints: AtomicUsize,
    pub null_paints: AtomicUsize,
    pub full_repaints: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub panic_next: AtomicBool,
    pub hold: Duration,
}

impl RecordingPainter {
    pub fn new(scene: Arc<TestScene>, color: Color) -> Arc<Self> {
        Self::with_hold(scene, color, Duration::ZERO)
    }

    pub fn with_hold(scene: Arc<TestScene>, color: Color, hold: Duration) -> Arc<Self> {
        Arc::new(Self {
            scene,
            color,
            paints: AtomicUsize::new(0),
            null_paints: AtomicUsize::new(0),
            full_repaints: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            panic_next: AtomicBool::new(false),
            hold,
        })
    }
}

impl ScenePainter for RecordingPainter {
    fn paint(&self, graphics: Option<&mut Graphics>) -> Result<(), GraphicsError> {
        let Some(g) = graphics else {
            self.null_paints.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.hold.is_zero() {
            std::thread::sleep(self.hold);
        }

        if self.panic_next.swap(false, Ordering::SeqCst) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            panic!("paint failed on purpose");
        }

        if self.scene.dirty.swap(false, Ordering::SeqCst) {
            self.full_repaints.fetch_add(1, Ordering::SeqCst);
        }
        let result = g.fill_rect(0.0, 0.0, 16.0, 16.0, self.color);
        self.paints.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ============================================================================
// Context
// ============================================================================

/// A painter on a dummy device, with handles to every moving part.
pub struct TestContext {
    pub device: Arc<DummyBackend>,
    pub factory: Arc<ResourceFactory>,
    pub scene: Arc<TestScene>,
    pub content: Arc<RecordingPainter>,
    pub painter: UploadPainter,
}

impl TestContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_settings(width, height, Settings::default())
    }

    pub fn with_settings(width: u32, height: u32, settings: Settings) -> Self {
        let device = Arc::new(DummyBackend::new());
        let factory = Arc::new(ResourceFactory::new(device.clone(), settings.clone()));
        let scene = TestScene::new(width, height);
        let content = RecordingPainter::new(scene.clone(), Color::WHITE);
        let provided = factory.clone();
        let painter = UploadPainter::new(
            scene.clone(),
            content.clone(),
            Box::new(move || Some(provided.clone())),
            &settings,
        );
        Self {
            device,
            factory,
            scene,
            content,
            painter,
        }
    }

    /// Schedule and run one frame.
    pub fn frame(&self) -> offscreen_rtt::FrameOutcome {
        self.scene.begin();
        self.painter.run()
    }
}

/// Enable test logging once per process.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
