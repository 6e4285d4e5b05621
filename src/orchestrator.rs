//! Per-frame sequencing: background, barrage pipeline, player, probe.
//!
//! [`FrameOrchestrator`] owns the pieces a frame touches and runs them in a
//! fixed order every frame:
//!
//! 1. background (currently an empty slot),
//! 2. the shader pipeline (buffer passes, then the image pass to the screen),
//! 3. the player overlay on top of the composited image,
//! 4. the collision probe against the barrage pass's offscreen target.
//!
//! The probe runs after submit, so it always observes the passes rendered
//! this frame.

use crate::config::{PassId, SceneConfig};
use crate::gpu::GpuContext;
use crate::pipeline::{FrameState, PipelineError, PipelineRunner, load_sources};
use crate::player::{Player, PlayerPass};
use crate::probe::{CollisionProbe, ProbeError};
use std::path::Path;

pub struct FrameOrchestrator {
    pipeline: PipelineRunner,
    player_pass: PlayerPass,
    probe: CollisionProbe,
    collision_pass: PassId,
}

impl FrameOrchestrator {
    /// Builds the pipeline, player overlay, and probe for a scene.
    ///
    /// Fails if the scene is invalid or names a collision pass that is not a
    /// buffer pass; all construction errors here are fatal at startup.
    pub fn new(
        gpu: &GpuContext,
        scene: &SceneConfig,
        scene_dir: &Path,
        player_radius: u32,
    ) -> Result<Self, PipelineError> {
        let (sources, common) = load_sources(scene_dir, scene)?;
        let pipeline = PipelineRunner::new(gpu, sources, common.as_deref(), scene_dir)?;

        let collision_pass = scene
            .collision_pass()
            .ok_or(PipelineError::MissingCollisionPass)?;
        if pipeline.target(collision_pass).is_none() {
            return Err(PipelineError::InvalidCollisionPass {
                pass: collision_pass,
            });
        }

        Ok(Self {
            pipeline,
            player_pass: PlayerPass::new(gpu),
            probe: CollisionProbe::new(player_radius),
            collision_pass,
        })
    }

    /// Renders one frame to the window surface and returns whether the player
    /// intersects the barrage.
    ///
    /// A lost or outdated surface reconfigures and skips the frame, reporting
    /// no collision.
    pub fn render_frame(
        &mut self,
        gpu: &GpuContext,
        frame: &FrameState,
        player: &Player,
    ) -> Result<bool, ProbeError> {
        self.draw_background();

        let surface = gpu
            .surface
            .as_ref()
            .expect("render_frame requires a windowed context");
        let output = match surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("surface lost, reconfiguring");
                surface.configure(&gpu.device, &gpu.config);
                return Ok(false);
            }
            Err(e) => panic!("failed to acquire frame: {e}"),
        };
        let screen = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.pipeline.run(gpu, frame, &mut encoder, &screen);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Player Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &screen,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.player_pass.render(gpu, &mut render_pass, player);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));

        // Validated at construction, so the target is always present.
        let target = self
            .pipeline
            .target(self.collision_pass)
            .expect("collision target exists");
        let hit = self
            .probe
            .test(gpu, target, player.position(), player.radius())?;

        output.present();
        Ok(hit)
    }

    // The first slot of the frame sequence. Nothing draws here yet; a static
    // backdrop behind the barrage would.
    fn draw_background(&self) {}
}
