//! Runtime settings.
//!
//! [`Settings`] carries the constants that drive allocation and hand-off
//! decisions. Defaults match the Metal feature-set tables the alignment rule
//! comes from; every value can be overridden from the environment with
//! [`Settings::from_env`].

use std::str::FromStr;

/// Which native device implementation to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    /// Pick the best available backend, falling back to the dummy device.
    #[default]
    Auto,
    /// In-memory device with no GPU.
    Dummy,
    /// wgpu device (requires the `wgpu-backend` feature).
    Wgpu,
}

impl FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "dummy" => Ok(Self::Dummy),
            "wgpu" => Ok(Self::Wgpu),
            other => Err(format!("unknown backend {other:?}")),
        }
    }
}

/// Allocation and presentation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Emit skipped-frame diagnostics at info level.
    pub verbose: bool,
    /// Backend selection.
    pub backend: BackendType,
    /// Largest render target dimension the factory will allocate.
    pub max_rtt_dimension: u32,
    /// Render target dimensions are rounded up to a multiple of this.
    pub rtt_alignment: u32,
    /// Largest plain texture dimension reported by the device.
    pub max_texture_size: u32,
    /// Number of filled pixel buffers the presentation queue holds.
    pub pixel_queue_depth: usize,
    /// Number of spare pixel buffers kept for reuse.
    pub pixel_pool_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verbose: false,
            backend: BackendType::Auto,
            max_rtt_dimension: 8192,
            // 256-byte row stride at 4 bytes per pixel.
            rtt_alignment: 64,
            max_texture_size: 16384,
            pixel_queue_depth: 2,
            pixel_pool_capacity: 3,
        }
    }
}

impl Settings {
    /// Build settings from defaults overridden by `OFFSCREEN_*` environment variables.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(value) = lookup("OFFSCREEN_VERBOSE") {
            settings.verbose = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        override_parsed(&lookup, "OFFSCREEN_BACKEND", &mut settings.backend);
        override_parsed(
            &lookup,
            "OFFSCREEN_MAX_RTT_DIMENSION",
            &mut settings.max_rtt_dimension,
        );
        override_parsed(&lookup, "OFFSCREEN_RTT_ALIGNMENT", &mut settings.rtt_alignment);
        override_parsed(
            &lookup,
            "OFFSCREEN_PIXEL_QUEUE_DEPTH",
            &mut settings.pixel_queue_depth,
        );
        override_parsed(
            &lookup,
            "OFFSCREEN_PIXEL_POOL_CAPACITY",
            &mut settings.pixel_pool_capacity,
        );

        if settings.rtt_alignment == 0 {
            log::warn!("OFFSCREEN_RTT_ALIGNMENT must be non-zero, using 64");
            settings.rtt_alignment = 64;
        }
        if settings.pixel_queue_depth == 0 {
            log::warn!("OFFSCREEN_PIXEL_QUEUE_DEPTH must be non-zero, using 1");
            settings.pixel_queue_depth = 1;
        }

        settings
    }

    /// Set the backend.
    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    /// Set verbose diagnostics.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the presentation queue depth.
    pub fn with_pixel_queue_depth(mut self, depth: usize) -> Self {
        self.pixel_queue_depth = depth.max(1);
        self
    }

    /// Set the maximum render target dimension.
    pub fn with_max_rtt_dimension(mut self, max: u32) -> Self {
        self.max_rtt_dimension = max;
        self
    }
}

fn override_parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T)
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(e) => log::warn!("ignoring {key}={raw:?}: {e}"),
    }
}
