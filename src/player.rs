//! Player state and the circle overlay pass.
//!
//! The player is a circular token moved along the axes by the arrow keys.
//! Movement is clamped so the collision probe's readback window around the
//! player always stays inside the viewport.

use crate::gpu::GpuContext;
use glam::{Mat4, Vec2, Vec3};

/// NDC scale of the player quad (local ±1 maps to ±this in clip space).
const QUAD_SCALE: f32 = 0.1;

/// The player-controlled circle.
pub struct Player {
    position: Vec2,
    speed: f32,
    radius: u32,
}

impl Player {
    /// Creates a player at `position` (bottom-left pixel coordinates).
    ///
    /// `speed` is in pixels per second.
    pub fn new(position: Vec2, speed: f32, radius: u32) -> Self {
        Self {
            position,
            speed,
            radius,
        }
    }

    /// Current position, bottom-left pixel coordinates.
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Circle radius in pixels.
    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Steps upward, clamped to the viewport.
    pub fn move_up(&mut self, dt: f32, viewport: Vec2) {
        self.position.y += self.speed * dt;
        self.clamp(viewport);
    }

    /// Steps downward, clamped to the viewport.
    pub fn move_down(&mut self, dt: f32, viewport: Vec2) {
        self.position.y -= self.speed * dt;
        self.clamp(viewport);
    }

    /// Steps left, clamped to the viewport.
    pub fn move_left(&mut self, dt: f32, viewport: Vec2) {
        self.position.x -= self.speed * dt;
        self.clamp(viewport);
    }

    /// Steps right, clamped to the viewport.
    pub fn move_right(&mut self, dt: f32, viewport: Vec2) {
        self.position.x += self.speed * dt;
        self.clamp(viewport);
    }

    // Inset by the radius: the probe reads a (2R+1)² window centered on the
    // player and never bounds-checks it.
    fn clamp(&mut self, viewport: Vec2) {
        let margin = self.radius as f32;
        self.position.x = self.position.x.clamp(margin, viewport.x - 1.0 - margin);
        self.position.y = self.position.y.clamp(margin, viewport.y - 1.0 - margin);
    }

    /// Model transform placing the overlay quad at the player's position in
    /// normalized device coordinates.
    pub fn model_matrix(&self, viewport: Vec2) -> Mat4 {
        let ndc = 2.0 * self.position / viewport - 1.0;
        Mat4::from_translation(Vec3::new(ndc.x, ndc.y, 0.0))
            * Mat4::from_scale(Vec3::splat(QUAD_SCALE))
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PlayerUniforms {
    model: [[f32; 4]; 4],
    half_extent: [f32; 2],
    radius: f32,
    _padding: f32,
}

/// Renders the player as a shader-drawn circle on top of the composited frame.
pub struct PlayerPass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl PlayerPass {
    /// Builds the overlay pipeline against the screen format.
    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Player Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/player.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Player Uniforms"),
            size: std::mem::size_of::<PlayerUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Player Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Player Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Player Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Player Pipeline"),
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
                    format: gpu.config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            uniform_buffer,
            bind_group,
        }
    }

    /// Draws the player circle. The render pass must load (not clear) the
    /// already-composited screen contents.
    pub fn render(&self, gpu: &GpuContext, render_pass: &mut wgpu::RenderPass, player: &Player) {
        let viewport = Vec2::new(gpu.width() as f32, gpu.height() as f32);
        let uniforms = PlayerUniforms {
            model: player.model_matrix(viewport).to_cols_array_2d(),
            half_extent: (QUAD_SCALE * viewport * 0.5).to_array(),
            radius: player.radius() as f32,
            _padding: 0.0,
        };
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.draw(0..6, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Vec2 = Vec2::new(800.0, 600.0);

    #[test]
    fn movement_steps_by_speed_times_dt() {
        let mut player = Player::new(Vec2::new(400.0, 300.0), 100.0, 5);
        player.move_right(0.5, VIEWPORT);
        assert_eq!(player.position(), Vec2::new(450.0, 300.0));
        player.move_down(0.25, VIEWPORT);
        assert_eq!(player.position(), Vec2::new(450.0, 275.0));
    }

    #[test]
    fn movement_clamped_with_probe_margin() {
        let mut player = Player::new(Vec2::new(3.0, 3.0), 1000.0, 5);
        player.move_left(10.0, VIEWPORT);
        player.move_down(10.0, VIEWPORT);
        assert_eq!(player.position(), Vec2::new(5.0, 5.0));

        player.move_right(10.0, VIEWPORT);
        player.move_up(10.0, VIEWPORT);
        assert_eq!(player.position(), Vec2::new(794.0, 594.0));
    }

    #[test]
    fn centered_player_has_identity_translation() {
        let player = Player::new(VIEWPORT * 0.5, 1.0, 5);
        let m = player.model_matrix(VIEWPORT);
        let translation = m.w_axis;
        assert!(translation.x.abs() < 1e-6);
        assert!(translation.y.abs() < 1e-6);
    }
}
