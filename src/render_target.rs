//! Offscreen render targets for buffer passes and the collision probe.

use crate::gpu::GpuContext;

/// Depth format backing every offscreen target.
///
/// No pass in this engine actually depth-tests, but targets carry a depth
/// attachment so the pass contract (clear color+depth on activation) holds.
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// An off-screen color+depth destination sized to the viewport.
///
/// Buffer-type passes render into one of these so that later passes (and the
/// collision probe) can consume the result. The color texture doubles as a
/// render attachment, a sampled channel, and a copy source for readback.
///
/// The backing storage is checked against the viewport every frame via
/// [`ensure_size`](Self::ensure_size) and recreated on mismatch, so window
/// resizes never leave a stale-sized target behind.
pub struct RenderTarget {
    /// The color texture that stores the pass's output.
    pub texture: wgpu::Texture,
    /// View of the color texture, used both as attachment and channel input.
    pub view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// Creates a target matching the current viewport dimensions.
    ///
    /// `format` is typically [`wgpu::TextureFormat::Rgba32Float`] for barrage
    /// buffers (the probe reads back float pixels) or the surface format for
    /// fixed-point intermediates.
    pub fn new(gpu: &GpuContext, format: wgpu::TextureFormat, label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: gpu.width(),
            height: gpu.height(),
            depth_or_array_layers: 1,
        };
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let depth = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("{label} Depth")),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            depth_view,
            format,
            width: gpu.width(),
            height: gpu.height(),
        }
    }

    /// Checks the target against the viewport and recreates it if needed.
    ///
    /// Called at the start of every frame for every target. Reallocation only
    /// happens when the dimensions actually changed.
    pub fn ensure_size(&mut self, gpu: &GpuContext, label: &str) {
        if self.width != gpu.width() || self.height != gpu.height() {
            *self = Self::new(gpu, self.format, label);
        }
    }

    /// Begins a render pass targeting this target's color and depth textures.
    ///
    /// With `clear` set, color is cleared to black and depth to 1.0 before any
    /// draw, so stale content from the prior frame never leaks through.
    /// Dropping the returned pass restores the encoder, so activation is
    /// always paired with deactivation even if nothing was drawn.
    pub fn begin_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        clear: bool,
        label: &str,
    ) -> wgpu::RenderPass<'e> {
        let load = if clear {
            wgpu::LoadOp::Clear(wgpu::Color::BLACK)
        } else {
            wgpu::LoadOp::Load
        };
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: if clear {
                        wgpu::LoadOp::Clear(1.0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }

    /// Color format of this target.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Current width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Current height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }
}
