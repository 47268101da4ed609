//! Dummy native device for testing and headless runs.
//!
//! Textures live in host memory, so clears and readbacks produce real pixel
//! data. The device also exposes failure injection and release counters that
//! the lifecycle tests rely on.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::GraphicsError;
use crate::types::{Color, NativeTextureDescriptor, PixelRect};

use super::{NativeDevice, NativeHandle};

struct DummyTexture {
    descriptor: NativeTextureDescriptor,
    data: Vec<u8>,
}

impl DummyTexture {
    fn row_pitch(&self) -> usize {
        self.descriptor.size.width as usize * self.descriptor.format.bytes_per_pixel() as usize
    }

    fn bounds(&self) -> PixelRect {
        PixelRect::from_dimensions(self.descriptor.size.width, self.descriptor.size.height)
    }
}

/// Snapshot of a dummy device's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DummyStats {
    /// Successful allocations.
    pub allocations: u64,
    /// Releases of live handles.
    pub releases: u64,
    /// Releases of handles that were not live.
    pub invalid_releases: u64,
    /// Clear calls.
    pub clears: u64,
    /// Successful readbacks.
    pub readbacks: u64,
    /// Successful uploads.
    pub uploads: u64,
}

/// In-memory native device.
pub struct DummyBackend {
    textures: Mutex<HashMap<u64, DummyTexture>>,
    lost: Mutex<HashSet<u64>>,
    next_handle: AtomicU64,
    ready: AtomicBool,
    failing_allocations: AtomicU32,
    fail_next_readback: AtomicBool,
    allocations: AtomicU64,
    releases: AtomicU64,
    invalid_releases: AtomicU64,
    clears: AtomicU64,
    readbacks: AtomicU64,
    uploads: AtomicU64,
}

impl std::fmt::Debug for DummyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DummyBackend")
            .field("live_textures", &self.live_texture_count())
            .field("ready", &self.ready.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self {
            textures: Mutex::new(HashMap::new()),
            lost: Mutex::new(HashSet::new()),
            next_handle: AtomicU64::new(1),
            ready: AtomicBool::new(true),
            failing_allocations: AtomicU32::new(0),
            fail_next_readback: AtomicBool::new(false),
            allocations: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            invalid_releases: AtomicU64::new(0),
            clears: AtomicU64::new(0),
            readbacks: AtomicU64::new(0),
            uploads: AtomicU64::new(0),
        }
    }

    /// Toggle device readiness.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Make the next `count` allocations fail.
    pub fn fail_next_allocations(&self, count: u32) {
        self.failing_allocations.store(count, Ordering::Release);
    }

    /// Make the next readback fail.
    pub fn fail_next_readback(&self) {
        self.fail_next_readback.store(true, Ordering::Release);
    }

    /// Mark the surface behind `handle` as lost.
    pub fn lose_surface(&self, handle: NativeHandle) {
        self.lost.lock().insert(handle.get());
    }

    /// Mark every live render target's surface as lost.
    pub fn lose_all_surfaces(&self) {
        let textures = self.textures.lock();
        let mut lost = self.lost.lock();
        for (raw, texture) in textures.iter() {
            if texture.descriptor.is_render_target() {
                lost.insert(*raw);
            }
        }
    }

    /// Number of textures currently allocated.
    pub fn live_texture_count(&self) -> usize {
        self.textures.lock().len()
    }

    /// Whether `handle` refers to a live texture.
    pub fn is_live(&self, handle: NativeHandle) -> bool {
        self.textures.lock().contains_key(&handle.get())
    }

    /// Descriptor the texture was allocated with.
    pub fn descriptor(&self, handle: NativeHandle) -> Option<NativeTextureDescriptor> {
        self.textures
            .lock()
            .get(&handle.get())
            .map(|t| t.descriptor.clone())
    }

    /// Read a single texel of a 4-byte-per-pixel texture.
    pub fn pixel(&self, handle: NativeHandle, x: u32, y: u32) -> Option<u32> {
        let textures = self.textures.lock();
        let texture = textures.get(&handle.get())?;
        if texture.descriptor.format.bytes_per_pixel() != 4
            || x >= texture.descriptor.size.width
            || y >= texture.descriptor.size.height
        {
            return None;
        }
        let offset = y as usize * texture.row_pitch() + x as usize * 4;
        let bytes = texture.data.get(offset..offset + 4)?;
        Some(bytemuck::pod_read_unaligned::<u32>(bytes))
    }

    /// Counter snapshot.
    pub fn stats(&self) -> DummyStats {
        DummyStats {
            allocations: self.allocations.load(Ordering::Acquire),
            releases: self.releases.load(Ordering::Acquire),
            invalid_releases: self.invalid_releases.load(Ordering::Acquire),
            clears: self.clears.load(Ordering::Acquire),
            readbacks: self.readbacks.load(Ordering::Acquire),
            uploads: self.uploads.load(Ordering::Acquire),
        }
    }

    fn take_failure(&self) -> bool {
        self.failing_allocations
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl NativeDevice for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn is_device_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn allocate_texture(
        &self,
        descriptor: &NativeTextureDescriptor,
    ) -> Result<NativeHandle, GraphicsError> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}, {:?})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.format
        );
        if descriptor.size.width == 0 || descriptor.size.height == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture size {}x{}",
                descriptor.size.width, descriptor.size.height
            )));
        }
        if self.take_failure() {
            return Err(GraphicsError::AllocationFailed(
                "injected allocation failure".into(),
            ));
        }

        let raw = self.next_handle.fetch_add(1, Ordering::AcqRel);
        let handle = NativeHandle::new(raw)
            .ok_or_else(|| GraphicsError::Internal("handle counter wrapped".into()))?;
        let data = vec![0u8; descriptor.byte_size() as usize];
        self.textures.lock().insert(
            raw,
            DummyTexture {
                descriptor: descriptor.clone(),
                data,
            },
        );
        self.allocations.fetch_add(1, Ordering::AcqRel);
        Ok(handle)
    }

    fn release_texture(&self, handle: NativeHandle) {
        log::trace!("DummyBackend: releasing texture {}", handle);
        if self.textures.lock().remove(&handle.get()).is_some() {
            self.lost.lock().remove(&handle.get());
            self.releases.fetch_add(1, Ordering::AcqRel);
        } else {
            log::warn!("DummyBackend: release of unknown texture {}", handle);
            self.invalid_releases.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn clear_render_target(
        &self,
        handle: NativeHandle,
        color: Color,
        rect: Option<PixelRect>,
    ) -> Result<(), GraphicsError> {
        let mut textures = self.textures.lock();
        let texture = textures
            .get_mut(&handle.get())
            .ok_or(GraphicsError::Disposed)?;
        if !texture.descriptor.is_render_target() {
            return Err(GraphicsError::InvalidParameter(
                "clear on a texture that is not a render target".into(),
            ));
        }

        let bounds = texture.bounds();
        let area = rect.map_or(bounds, |r| r.intersect(&bounds));
        let texel = color.to_int_argb_pre().to_le_bytes();
        let pitch = texture.row_pitch();
        for y in area.y..area.y + area.height {
            let start = y as usize * pitch + area.x as usize * 4;
            let end = start + area.width as usize * 4;
            for chunk in texture.data[start..end].chunks_exact_mut(4) {
                chunk.copy_from_slice(&texel);
            }
        }
        self.clears.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn read_pixels(
        &self,
        handle: NativeHandle,
        width: u32,
        height: u32,
        dst: &mut [u32],
    ) -> Result<(), GraphicsError> {
        if self.fail_next_readback.swap(false, Ordering::AcqRel) {
            return Err(GraphicsError::Internal("injected readback failure".into()));
        }

        let textures = self.textures.lock();
        let texture = textures.get(&handle.get()).ok_or(GraphicsError::Disposed)?;
        let size = texture.descriptor.size;
        if width > size.width || height > size.height {
            return Err(GraphicsError::InvalidParameter(format!(
                "readback {}x{} from {}x{} texture",
                width, height, size.width, size.height
            )));
        }
        let row_len = width as usize;
        if dst.len() < row_len * height as usize {
            return Err(GraphicsError::InvalidParameter(
                "destination buffer too small".into(),
            ));
        }

        let pitch = texture.row_pitch();
        let dst_bytes: &mut [u8] = bytemuck::cast_slice_mut(dst);
        for y in 0..height as usize {
            let src = &texture.data[y * pitch..y * pitch + row_len * 4];
            dst_bytes[y * row_len * 4..(y + 1) * row_len * 4].copy_from_slice(src);
        }
        self.readbacks.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn update_texture(
        &self,
        handle: NativeHandle,
        region: PixelRect,
        data: &[u8],
        stride: u32,
    ) -> Result<(), GraphicsError> {
        let mut textures = self.textures.lock();
        let texture = textures
            .get_mut(&handle.get())
            .ok_or(GraphicsError::Disposed)?;
        if !texture.bounds().contains(&region) {
            return Err(GraphicsError::InvalidParameter(format!(
                "update region {:?} outside texture",
                region
            )));
        }
        if region.is_empty() {
            return Ok(());
        }

        let bpp = texture.descriptor.format.bytes_per_pixel() as usize;
        let row_bytes = region.width as usize * bpp;
        let stride = stride as usize;
        if stride < row_bytes || data.len() < stride * (region.height as usize - 1) + row_bytes {
            return Err(GraphicsError::InvalidParameter(
                "source buffer too small for region".into(),
            ));
        }

        let pitch = texture.row_pitch();
        for row in 0..region.height as usize {
            let dst_start = (region.y as usize + row) * pitch + region.x as usize * bpp;
            let src_start = row * stride;
            texture.data[dst_start..dst_start + row_bytes]
                .copy_from_slice(&data[src_start..src_start + row_bytes]);
        }
        self.uploads.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn is_surface_lost(&self, handle: NativeHandle) -> bool {
        self.lost.lock().contains(&handle.get())
    }
}

static_assertions::assert_impl_all!(DummyBackend: Send, Sync);
