//! wgpu native device.
//!
//! Textures are kept in a handle table keyed by the raw [`NativeHandle`]
//! value. Clears are encoded as single render passes and readbacks go through
//! a mapped staging buffer, so every call completes before it returns.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::GraphicsError;
use crate::types::{Color, NativeTextureDescriptor, PixelFormat, PixelRect, TextureUsage};

use super::{NativeDevice, NativeHandle};

struct WgpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    descriptor: NativeTextureDescriptor,
}

/// wgpu-based native device.
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: Mutex<HashMap<u64, WgpuTexture>>,
    next_handle: AtomicU64,
    lost: Arc<AtomicBool>,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter.get_info().name)
            .field("live_textures", &self.textures.lock().len())
            .finish()
    }
}

impl WgpuBackend {
    /// Create a new wgpu device with no presentation surface.
    pub fn new() -> Result<Self, GraphicsError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            backend_options: wgpu::BackendOptions::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| {
            GraphicsError::InitializationFailed(format!("No compatible GPU adapter: {e}"))
        })?;

        log::info!("wgpu adapter: {:?}", adapter.get_info());

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Offscreen RTT Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| GraphicsError::InitializationFailed(format!("Device creation failed: {e}")))?;

        let lost = Arc::new(AtomicBool::new(false));
        let lost_flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            log::error!("wgpu device lost ({reason:?}): {message}");
            lost_flag.store(true, Ordering::Release);
        });

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            textures: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            lost,
        })
    }

    fn convert_format(format: PixelFormat) -> Result<wgpu::TextureFormat, GraphicsError> {
        match format {
            PixelFormat::ByteBgraPre | PixelFormat::IntArgbPre => {
                Ok(wgpu::TextureFormat::Bgra8Unorm)
            }
            // No 24-bit format exists; rows are expanded on upload.
            PixelFormat::ByteRgb => Ok(wgpu::TextureFormat::Rgba8Unorm),
            PixelFormat::ByteGray | PixelFormat::ByteAlpha => Ok(wgpu::TextureFormat::R8Unorm),
            PixelFormat::FloatXyzw => Ok(wgpu::TextureFormat::Rgba32Float),
            PixelFormat::MultiYCbCr420 | PixelFormat::ByteApple422 => {
                Err(GraphicsError::Unsupported("video formats have no wgpu equivalent"))
            }
        }
    }

    fn convert_usage(usage: TextureUsage) -> wgpu::TextureUsages {
        let mut result = wgpu::TextureUsages::empty();
        if usage.contains(TextureUsage::COPY_SRC) {
            result |= wgpu::TextureUsages::COPY_SRC;
        }
        if usage.contains(TextureUsage::COPY_DST) {
            result |= wgpu::TextureUsages::COPY_DST;
        }
        if usage.contains(TextureUsage::TEXTURE_BINDING) {
            result |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if usage.contains(TextureUsage::RENDER_ATTACHMENT) {
            result |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        result
    }

    fn wait_for(&self, index: wgpu::SubmissionIndex) {
        if let Err(e) = self.device.poll(wgpu::PollType::Wait {
            submission_index: Some(index),
            timeout: Some(std::time::Duration::from_secs(10)),
        }) {
            log::warn!("wgpu: waiting for submission failed: {e}");
        }
    }

    fn clear_full(&self, view: &wgpu::TextureView, color: Color) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Render Target"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: (color.r * color.a) as f64,
                            g: (color.g * color.a) as f64,
                            b: (color.b * color.a) as f64,
                            a: color.a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }
        let index = self.queue.submit(std::iter::once(encoder.finish()));
        self.wait_for(index);
    }

    fn write_region(&self, texture: &wgpu::Texture, region: PixelRect, data: &[u8], stride: u32) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: region.x,
                    y: region.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(stride),
                rows_per_image: Some(region.height),
            },
            wgpu::Extent3d {
                width: region.width,
                height: region.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

impl NativeDevice for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu Backend"
    }

    fn is_device_ready(&self) -> bool {
        !self.lost.load(Ordering::Acquire)
    }

    fn allocate_texture(
        &self,
        descriptor: &NativeTextureDescriptor,
    ) -> Result<NativeHandle, GraphicsError> {
        let format = Self::convert_format(descriptor.format)?;
        let max = self.device.limits().max_texture_dimension_2d;
        if descriptor.size.width > max || descriptor.size.height > max {
            return Err(GraphicsError::AllocationFailed(format!(
                "{}x{} exceeds device limit {}",
                descriptor.size.width, descriptor.size.height, max
            )));
        }

        let mip_level_count = if descriptor.use_mipmap {
            32 - descriptor.size.width.max(descriptor.size.height).leading_zeros()
        } else {
            1
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size: wgpu::Extent3d {
                width: descriptor.size.width,
                height: descriptor.size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: descriptor.sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: Self::convert_usage(descriptor.usage),
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let raw = self.next_handle.fetch_add(1, Ordering::AcqRel);
        let handle = NativeHandle::new(raw)
            .ok_or_else(|| GraphicsError::Internal("handle counter wrapped".into()))?;
        log::trace!(
            "WgpuBackend: created texture {} {:?} ({}x{})",
            handle,
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height
        );
        self.textures.lock().insert(
            raw,
            WgpuTexture {
                texture,
                view,
                descriptor: descriptor.clone(),
            },
        );
        Ok(handle)
    }

    fn release_texture(&self, handle: NativeHandle) {
        match self.textures.lock().remove(&handle.get()) {
            Some(entry) => {
                log::trace!("WgpuBackend: destroying texture {}", handle);
                entry.texture.destroy();
            }
            None => log::warn!("WgpuBackend: release of unknown texture {}", handle),
        }
    }

    fn clear_render_target(
        &self,
        handle: NativeHandle,
        color: Color,
        rect: Option<PixelRect>,
    ) -> Result<(), GraphicsError> {
        let textures = self.textures.lock();
        let entry = textures.get(&handle.get()).ok_or(GraphicsError::Disposed)?;
        let bounds =
            PixelRect::from_dimensions(entry.descriptor.size.width, entry.descriptor.size.height);

        match rect {
            None => self.clear_full(&entry.view, color),
            Some(rect) if rect.contains(&bounds) => self.clear_full(&entry.view, color),
            Some(rect) => {
                let area = rect.intersect(&bounds);
                if area.is_empty() {
                    return Ok(());
                }
                let texel = color.to_int_argb_pre().to_le_bytes();
                let data = texel.repeat(area.width as usize * area.height as usize);
                self.write_region(&entry.texture, area, &data, area.width * 4);
                let index = self.queue.submit(std::iter::empty());
                self.wait_for(index);
            }
        }
        Ok(())
    }

    fn read_pixels(
        &self,
        handle: NativeHandle,
        width: u32,
        height: u32,
        dst: &mut [u32],
    ) -> Result<(), GraphicsError> {
        if dst.len() < width as usize * height as usize {
            return Err(GraphicsError::InvalidParameter(
                "destination buffer too small".into(),
            ));
        }
        if width == 0 || height == 0 {
            return Ok(());
        }

        let textures = self.textures.lock();
        let entry = textures.get(&handle.get()).ok_or(GraphicsError::Disposed)?;

        let unpadded = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;
        let size = padded as u64 * height as u64;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        let index = self.queue.submit(std::iter::once(encoder.finish()));
        drop(textures);
        self.wait_for(index);

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        if let Err(e) = self.device.poll(wgpu::PollType::wait_indefinitely()) {
            log::warn!("wgpu: waiting for readback map failed: {e}");
        }
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(GraphicsError::Internal(format!("map failed: {e}"))),
            Err(_) => return Err(GraphicsError::Internal("map callback dropped".into())),
        }

        {
            let mapped = slice.get_mapped_range();
            let dst_bytes: &mut [u8] = bytemuck::cast_slice_mut(dst);
            for row in 0..height as usize {
                let src = &mapped[row * padded as usize..row * padded as usize + unpadded as usize];
                dst_bytes[row * unpadded as usize..(row + 1) * unpadded as usize]
                    .copy_from_slice(src);
            }
        }
        staging.unmap();
        Ok(())
    }

    fn update_texture(
        &self,
        handle: NativeHandle,
        region: PixelRect,
        data: &[u8],
        stride: u32,
    ) -> Result<(), GraphicsError> {
        let textures = self.textures.lock();
        let entry = textures.get(&handle.get()).ok_or(GraphicsError::Disposed)?;

        let size = entry.descriptor.size;
        if !PixelRect::from_dimensions(size.width, size.height).contains(&region) {
            return Err(GraphicsError::InvalidParameter(format!(
                "update region {:?} outside texture",
                region
            )));
        }
        if region.is_empty() {
            return Ok(());
        }
        let row_bytes = region.width as usize * entry.descriptor.format.bytes_per_pixel() as usize;
        let stride_bytes = stride as usize;
        if stride_bytes < row_bytes
            || data.len() < stride_bytes * (region.height as usize - 1) + row_bytes
        {
            return Err(GraphicsError::InvalidParameter(
                "source buffer too small for region".into(),
            ));
        }

        if entry.descriptor.format == PixelFormat::ByteRgb {
            let mut expanded = Vec::with_capacity(region.width as usize * region.height as usize * 4);
            for row in 0..region.height as usize {
                let start = row * stride_bytes;
                for rgb in data[start..start + row_bytes].chunks_exact(3) {
                    expanded.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 0xFF]);
                }
            }
            self.write_region(&entry.texture, region, &expanded, region.width * 4);
        } else {
            self.write_region(&entry.texture, region, data, stride);
        }
        Ok(())
    }

    fn is_surface_lost(&self, handle: NativeHandle) -> bool {
        self.lost.load(Ordering::Acquire) || !self.textures.lock().contains_key(&handle.get())
    }
}

static_assertions::assert_impl_all!(WgpuBackend: Send, Sync);
