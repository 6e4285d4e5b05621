//! Shader passes: the pipeline, uniforms, and channel bindings of one stage.
//!
//! A [`ShaderPass`] is one fullscreen draw. Buffer passes target an offscreen
//! [`RenderTarget`](crate::render_target::RenderTarget) in `Rgba32Float`;
//! the terminal image pass targets the screen. Every pass receives the same
//! [`FrameUniforms`] — no exceptions — plus its resolved channels bound in
//! declaration order.

use crate::channel::ResolvedChannel;
use crate::config::{PassConfig, PassId, PassKind};
use crate::gpu::GpuContext;
use crate::pipeline::PipelineError;
use crate::wgsl;
use glam::Vec2;

/// The standard uniform set injected into every pass.
///
/// Matches the generated WGSL header:
///
/// ```wgsl
/// struct FrameUniforms {
///     resolution: vec2f,
///     time: f32,
///     frame: u32,
///     mouse: vec4f,
/// }
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    /// Viewport size in pixels `[width, height]`.
    pub resolution: [f32; 2],
    /// Seconds elapsed since pipeline start.
    pub time: f32,
    /// Frame counter, one increment per frame.
    pub frame: u32,
    /// Cursor position (bottom-left origin) while a button is held, else
    /// (0,0); z/w encode button 1/2 state as -0.5 (up) or +0.5 (down).
    pub mouse: [f32; 4],
}

/// Builds the `mouse` uniform from cursor state.
///
/// `cursor` is in window coordinates (top-left origin, as winit reports);
/// the y axis is flipped into the engine's bottom-left convention. The
/// position is only exposed while a button is held.
pub fn mouse_vector(cursor: Vec2, viewport_height: f32, button1: bool, button2: bool) -> [f32; 4] {
    let pos = if button1 || button2 {
        Vec2::new(cursor.x, viewport_height - cursor.y)
    } else {
        Vec2::ZERO
    };
    let state = |held: bool| if held { 0.5 } else { -0.5 };
    [pos.x, pos.y, state(button1), state(button2)]
}

/// One shader stage of the pipeline.
pub struct ShaderPass {
    id: PassId,
    kind: PassKind,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    channels: Vec<ResolvedChannel>,
}

impl ShaderPass {
    /// Compiles a pass from its composed WGSL source and resolved channels.
    ///
    /// Shader or pipeline validation failures are caught through a wgpu error
    /// scope and reported as a setup error naming the pass; pass configuration
    /// is established once at startup, so such failures are fatal.
    pub fn new(
        gpu: &GpuContext,
        config: &PassConfig,
        channels: Vec<ResolvedChannel>,
        common: Option<&str>,
        body: &str,
    ) -> Result<Self, PipelineError> {
        let device = &gpu.device;
        let source = wgsl::compose(channels.len(), common, body);
        let label = format!("Pass {}", config.id);

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label} Uniforms")),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Channel formats include Rgba32Float, which is not filterable without
        // an extra device feature, so every slot is non-filtering.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{label} Sampler")),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        for n in 0..channels.len() as u32 {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 1 + 2 * n,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2 + 2 * n,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                count: None,
            });
        }
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label} Bind Group Layout")),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} Pipeline Layout")),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let (target_format, blend, depth_stencil) = match config.kind {
            // Float targets are not blendable without a device feature; buffer
            // passes write straight through and carry the target's depth.
            PassKind::Buffer => (
                wgpu::TextureFormat::Rgba32Float,
                None,
                Some(wgpu::DepthStencilState {
                    format: wgpu::TextureFormat::Depth24Plus,
                    depth_write_enabled: false,
                    depth_compare: wgpu::CompareFunction::Always,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
            ),
            PassKind::Image => (gpu.config.format, Some(wgpu::BlendState::REPLACE), None),
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(PipelineError::Shader {
                pass: config.id,
                message: error.to_string(),
            });
        }

        Ok(Self {
            id: config.id,
            kind: config.kind,
            pipeline,
            uniform_buffer,
            bind_group_layout,
            sampler,
            channels,
        })
    }

    /// Pass identifier.
    pub fn id(&self) -> PassId {
        self.id
    }

    /// Buffer or image.
    pub fn kind(&self) -> PassKind {
        self.kind
    }

    /// Resolved channels in binding order.
    pub fn channels(&self) -> &[ResolvedChannel] {
        &self.channels
    }

    /// Draws the fullscreen quad with this pass's program and channels.
    ///
    /// `channel_views` must match [`channels`](Self::channels) in length and
    /// order; the caller looks up current render-target views for `Target`
    /// channels. Binding state is scoped to this render pass, so nothing
    /// leaks into the next pass.
    pub fn render(
        &self,
        gpu: &GpuContext,
        render_pass: &mut wgpu::RenderPass,
        uniforms: &FrameUniforms,
        channel_views: &[&wgpu::TextureView],
    ) {
        debug_assert_eq!(channel_views.len(), self.channels.len());
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniforms]));

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: self.uniform_buffer.as_entire_binding(),
        }];
        for (n, view) in channel_views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 1 + 2 * n as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + 2 * n as u32,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &self.bind_group_layout,
            entries: &entries,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..wgsl::QUAD_VERTEX_COUNT, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_hidden_while_no_button_held() {
        let v = mouse_vector(Vec2::new(120.0, 40.0), 480.0, false, false);
        assert_eq!(v, [0.0, 0.0, -0.5, -0.5]);
    }

    #[test]
    fn mouse_flipped_to_bottom_left_while_held() {
        let v = mouse_vector(Vec2::new(120.0, 40.0), 480.0, true, false);
        assert_eq!(v, [120.0, 440.0, 0.5, -0.5]);
    }

    #[test]
    fn frame_uniforms_layout_matches_wgsl() {
        // vec2f + f32 + u32 + vec4f, 16-byte aligned, no implicit padding.
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 32);
    }
}
