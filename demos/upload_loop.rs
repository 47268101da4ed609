//! # Upload Loop Demo
//!
//! Paints a moving square off-screen and consumes the uploaded frames on a
//! second thread. Resizes the scene halfway through to show target resets.
//!
//! ```bash
//! cargo run --example upload_loop -- --frames 120 --width 640 --height 480
//! RUST_LOG=debug cargo run --example upload_loop -- --backend dummy --verbose
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use clap::Parser;

use offscreen_rtt::{
    BackendType, Color, FrameOutcome, Graphics, GraphicsError, NativeDevice, PixelSourceQueue,
    ResourceFactory, ScenePainter, SceneState, Settings, UploadPainter, create_backend,
};

/// Graphics backend selection for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliBackend {
    /// wgpu when available, otherwise dummy.
    #[default]
    Auto,
    /// GPU backend via wgpu (needs the `wgpu-backend` feature).
    Wgpu,
    /// In-memory backend.
    Dummy,
}

impl From<CliBackend> for BackendType {
    fn from(cli: CliBackend) -> Self {
        match cli {
            CliBackend::Auto => BackendType::Auto,
            CliBackend::Wgpu => BackendType::Wgpu,
            CliBackend::Dummy => BackendType::Dummy,
        }
    }
}

#[derive(Debug, Parser)]
#[command(about = "Off-screen painting with pixel upload")]
struct Args {
    /// Backend to render with.
    #[arg(long, value_enum, default_value_t = CliBackend::Auto)]
    backend: CliBackend,

    /// Number of frames to render.
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Initial view width.
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Initial view height.
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Pixel scale (for example 2.0 on a high-DPI screen).
    #[arg(long, default_value_t = 1.0)]
    scale: f32,

    /// Log skipped frames at info level.
    #[arg(long)]
    verbose: bool,
}

struct DemoScene {
    width: AtomicU32,
    height: AtomicU32,
    scale: f32,
    frame: AtomicU64,
    dirty: AtomicBool,
}

impl SceneState for DemoScene {
    fn is_valid(&self) -> bool {
        true
    }

    fn render_width(&self) -> u32 {
        (self.view_width() as f32 * self.scale).ceil() as u32
    }

    fn render_height(&self) -> u32 {
        (self.view_height() as f32 * self.scale).ceil() as u32
    }

    fn render_scale_x(&self) -> f32 {
        self.scale
    }

    fn render_scale_y(&self) -> f32 {
        self.scale
    }

    fn view_width(&self) -> u32 {
        self.width.load(Ordering::Relaxed)
    }

    fn view_height(&self) -> u32 {
        self.height.load(Ordering::Relaxed)
    }

    fn entire_scene_needs_repaint(&self) {
        self.dirty.store(true, Ordering::Relaxed);
    }

    fn set_painting(&self, _painting: bool) {}

    fn upload_pixels(&self, _source: &Arc<PixelSourceQueue>) {}
}

impl ScenePainter for DemoScene {
    fn paint(&self, graphics: Option<&mut Graphics>) -> Result<(), GraphicsError> {
        let Some(g) = graphics else {
            return Ok(());
        };
        if self.dirty.swap(false, Ordering::Relaxed) {
            log::debug!("full repaint");
        }
        let frame = self.frame.fetch_add(1, Ordering::Relaxed);
        let width = self.view_width() as f32;
        let x = (frame as f32 * 7.0) % (width - 40.0).max(1.0);

        g.clear(Color::new(0.1, 0.1, 0.15, 1.0))?;
        g.fill_rect(x, 20.0, 40.0, 40.0, Color::new(0.9, 0.4, 0.1, 1.0))
    }
}

fn main() -> Result<(), GraphicsError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let settings = Settings::from_env()
        .with_backend(args.backend.into())
        .with_verbose(args.verbose);
    let device = create_backend(&settings)?;
    log::info!("Rendering {} frames on {}", args.frames, device.name());
    let factory = Arc::new(ResourceFactory::new(device, settings.clone()));

    let scene = Arc::new(DemoScene {
        width: AtomicU32::new(args.width),
        height: AtomicU32::new(args.height),
        scale: args.scale,
        frame: AtomicU64::new(0),
        dirty: AtomicBool::new(false),
    });
    let provided = factory.clone();
    let painter = UploadPainter::new(
        scene.clone(),
        scene.clone(),
        Box::new(move || Some(provided.clone())),
        &settings,
    );

    let queue = painter.pixel_source().clone();
    let consumer = std::thread::spawn(move || {
        let mut presented = 0u64;
        while let Some(pixels) = queue.wait_for_pixels() {
            presented += 1;
            log::trace!(
                "presenting {}x{} at {}x",
                pixels.width(),
                pixels.height(),
                pixels.scale_x()
            );
            queue.done_with_pixels(pixels);
        }
        presented
    });

    let mut resets = 0;
    for frame in 0..args.frames {
        if frame == args.frames / 2 {
            scene.width.fetch_add(1, Ordering::Relaxed);
        }
        match painter.run() {
            FrameOutcome::Rendered { reset, .. } => resets += u32::from(reset),
            FrameOutcome::Skipped(reason) => log::debug!("frame {} skipped: {:?}", frame, reason),
            FrameOutcome::Aborted(e) => log::warn!("frame {} aborted: {}", frame, e),
        }
    }

    painter.pixel_source().close();
    let presented = consumer.join().unwrap_or(0);
    let stats = painter.pixel_source().stats();
    log::info!(
        "Rendered {} frames ({} resets), presented {}, dropped {}",
        painter.frames_rendered(),
        resets,
        presented,
        stats.dropped
    );

    painter.dispose_render_target();
    factory.dispose();
    Ok(())
}
