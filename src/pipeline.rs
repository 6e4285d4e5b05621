//! Pipeline construction and strict-order per-frame execution.
//!
//! [`PipelineRunner`] owns the compiled passes and one offscreen
//! [`RenderTarget`] per buffer pass (a pair for self-feedback passes).
//! Construction validates the configuration
//! (unique ids, exactly one terminal image pass, resolvable channels) and
//! fails with a diagnostic naming the offending pass — pass configuration is
//! fixed at startup, so setup errors are fatal.
//!
//! Execution never reorders: passes run strictly in declared order, and a
//! buffer pass must be declared before any pass that consumes its output in
//! the same frame. A channel referencing a pass that runs later (or the pass
//! itself) reads the previous frame's content — a feedback channel. A pass
//! that references itself is double-buffered, so it samples last frame's
//! texture while rendering into the other half of the pair; a texture is
//! never both a channel and the color attachment of the same render pass.

use crate::channel::{ResolvedChannel, resolve_channels};
use crate::config::{Channel, PassConfig, PassId, PassKind, SceneConfig};
use crate::gpu::GpuContext;
use crate::pass::{FrameUniforms, ShaderPass};
use crate::render_target::RenderTarget;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Frame-global state fed to every pass as uniforms.
#[derive(Debug, Clone, Copy)]
pub struct FrameState {
    /// Seconds since pipeline start.
    pub time: f32,
    /// Monotonic frame counter.
    pub frame: u32,
    /// Mouse vector, see [`crate::pass::mouse_vector`].
    pub mouse: [f32; 4],
}

/// A pass configuration paired with its loaded fragment body.
pub struct PassSource {
    /// Static configuration.
    pub config: PassConfig,
    /// WGSL fragment body defining `main_image`.
    pub body: String,
}

/// Reads the shader files a scene names, returning pass sources and the
/// optional common source.
pub fn load_sources(
    scene_dir: &Path,
    scene: &SceneConfig,
) -> Result<(Vec<PassSource>, Option<String>), PipelineError> {
    let read = |path: &Path| -> Result<String, PipelineError> {
        let full = scene_dir.join(path);
        std::fs::read_to_string(&full).map_err(|source| PipelineError::Io { path: full, source })
    };
    let common = scene
        .common_shader
        .as_deref()
        .map(read)
        .transpose()?;
    let sources = scene
        .passes
        .iter()
        .map(|config| {
            Ok(PassSource {
                body: read(&config.shader)?,
                config: config.clone(),
            })
        })
        .collect::<Result<Vec<_>, PipelineError>>()?;
    Ok((sources, common))
}

/// Checks the structural invariants of a pass list.
///
/// Pure over the configs, so it runs (and is tested) without a device.
pub fn validate_configs(configs: &[PassConfig]) -> Result<(), PipelineError> {
    let mut seen = HashSet::new();
    for config in configs {
        if !seen.insert(config.id) {
            return Err(PipelineError::DuplicatePass { pass: config.id });
        }
    }
    let mut images = configs.iter().filter(|c| c.kind == PassKind::Image);
    let image = images.next().ok_or(PipelineError::MissingImagePass)?;
    if let Some(extra) = images.next() {
        return Err(PipelineError::ExtraImagePass { pass: extra.id });
    }
    match configs.last() {
        Some(last) if last.id == image.id => Ok(()),
        _ => Err(PipelineError::ImagePassNotLast { pass: image.id }),
    }
}

/// Backing storage for one buffer pass.
///
/// Passes that sample their own previous output are double-buffered: `front`
/// holds the last completed frame (what channels and the probe read) while
/// the pass renders into `back`, and the pair swaps once the pass has run.
enum PassTarget {
    Single(RenderTarget),
    PingPong {
        front: RenderTarget,
        back: RenderTarget,
    },
}

impl PassTarget {
    /// Most recently completed output; what consumers sample.
    fn current(&self) -> &RenderTarget {
        match self {
            PassTarget::Single(target) => target,
            PassTarget::PingPong { front, .. } => front,
        }
    }

    /// Destination for this frame's draw.
    fn write(&self) -> &RenderTarget {
        match self {
            PassTarget::Single(target) => target,
            PassTarget::PingPong { back, .. } => back,
        }
    }

    fn ensure_size(&mut self, gpu: &GpuContext, label: &str) {
        match self {
            PassTarget::Single(target) => target.ensure_size(gpu, label),
            PassTarget::PingPong { front, back } => {
                front.ensure_size(gpu, &format!("{label} A"));
                back.ensure_size(gpu, &format!("{label} B"));
            }
        }
    }

    /// Publishes the back target after a draw. No-op for single targets.
    fn swap(&mut self) {
        if let PassTarget::PingPong { front, back } = self {
            std::mem::swap(front, back);
        }
    }
}

/// Orchestrates per-frame execution of an ordered pass list.
pub struct PipelineRunner {
    passes: Vec<ShaderPass>,
    targets: HashMap<PassId, PassTarget>,
}

impl PipelineRunner {
    /// Validates, resolves channels, compiles every pass, and allocates the
    /// buffer-pass targets.
    pub fn new(
        gpu: &GpuContext,
        sources: Vec<PassSource>,
        common: Option<&str>,
        scene_dir: &Path,
    ) -> Result<Self, PipelineError> {
        let configs: Vec<_> = sources.iter().map(|s| s.config.clone()).collect();
        validate_configs(&configs)?;

        let buffer_passes: HashSet<PassId> = configs
            .iter()
            .filter(|c| c.kind == PassKind::Buffer)
            .map(|c| c.id)
            .collect();

        let mut passes = Vec::with_capacity(sources.len());
        let mut targets = HashMap::new();
        for source in &sources {
            let channels = resolve_channels(gpu, scene_dir, &source.config, &buffer_passes)?;
            let pass = ShaderPass::new(gpu, &source.config, channels, common, &source.body)?;
            if source.config.kind == PassKind::Buffer {
                let id = source.config.id;
                let feeds_itself = source
                    .config
                    .channels
                    .iter()
                    .any(|c| matches!(c, Channel::Buffer { pass } if *pass == id));
                let label = format!("Pass {id} Target");
                let target = if feeds_itself {
                    PassTarget::PingPong {
                        front: RenderTarget::new(
                            gpu,
                            wgpu::TextureFormat::Rgba32Float,
                            &format!("{label} A"),
                        ),
                        back: RenderTarget::new(
                            gpu,
                            wgpu::TextureFormat::Rgba32Float,
                            &format!("{label} B"),
                        ),
                    }
                } else {
                    PassTarget::Single(RenderTarget::new(
                        gpu,
                        wgpu::TextureFormat::Rgba32Float,
                        &label,
                    ))
                };
                targets.insert(id, target);
            }
            passes.push(pass);
        }
        log::info!(
            "pipeline ready: {} passes, {} offscreen targets",
            passes.len(),
            targets.len()
        );
        Ok(Self { passes, targets })
    }

    /// The render target holding a buffer pass's most recent output.
    pub fn target(&self, pass: PassId) -> Option<&RenderTarget> {
        self.targets.get(&pass).map(PassTarget::current)
    }

    /// Executes every pass in declared order into `encoder`.
    ///
    /// Buffer passes render into their own cleared target; the terminal image
    /// pass renders into `screen` (also cleared). All GPU binding state is
    /// scoped per pass, so the encoder is left clean.
    pub fn run(
        &mut self,
        gpu: &GpuContext,
        frame: &FrameState,
        encoder: &mut wgpu::CommandEncoder,
        screen: &wgpu::TextureView,
    ) {
        for (id, target) in &mut self.targets {
            target.ensure_size(gpu, &format!("Pass {id} Target"));
        }

        let uniforms = FrameUniforms {
            resolution: [gpu.width() as f32, gpu.height() as f32],
            time: frame.time,
            frame: frame.frame,
            mouse: frame.mouse,
        };

        for pass in &self.passes {
            {
                let channel_views: Vec<&wgpu::TextureView> = pass
                    .channels()
                    .iter()
                    .map(|channel| match channel {
                        // Registry lookup; validated at setup, so the id exists.
                        ResolvedChannel::Target(id) => &self.targets[id].current().view,
                        ResolvedChannel::Loaded(texture) => texture.view(),
                    })
                    .collect();

                match pass.kind() {
                    PassKind::Buffer => {
                        let label = format!("Pass {}", pass.id());
                        let target = self.targets[&pass.id()].write();
                        let mut render_pass = target.begin_pass(encoder, true, &label);
                        pass.render(gpu, &mut render_pass, &uniforms, &channel_views);
                    }
                    PassKind::Image => {
                        let mut render_pass =
                            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                                label: Some("Image Pass"),
                                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                                    view: screen,
                                    resolve_target: None,
                                    ops: wgpu::Operations {
                                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                        store: wgpu::StoreOp::Store,
                                    },
                                    depth_slice: None,
                                })],
                                depth_stencil_attachment: None,
                                timestamp_writes: None,
                                occlusion_query_set: None,
                            });
                        pass.render(gpu, &mut render_pass, &uniforms, &channel_views);
                    }
                }
            }
            if let Some(target) = self.targets.get_mut(&pass.id()) {
                target.swap();
            }
        }
    }
}

/// Errors raised while building a pipeline.
///
/// All of these are configuration or resource errors detected at setup and
/// are fatal for initialization; there is no retry path.
#[derive(Debug)]
pub enum PipelineError {
    /// Two passes share an id.
    DuplicatePass {
        /// The repeated id.
        pass: PassId,
    },
    /// No image pass was declared.
    MissingImagePass,
    /// More than one image pass was declared.
    ExtraImagePass {
        /// The surplus image pass.
        pass: PassId,
    },
    /// The single image pass is not the terminal pass.
    ImagePassNotLast {
        /// The misplaced image pass.
        pass: PassId,
    },
    /// A buffer channel references a pass id that does not exist.
    UnknownChannel {
        /// Pass whose channel list is invalid.
        pass: PassId,
        /// Index of the offending channel.
        channel: usize,
        /// The id it tried to reference.
        referenced: PassId,
    },
    /// The scene declares no buffer pass for the collision probe to read.
    MissingCollisionPass,
    /// The configured collision pass is not a buffer pass.
    InvalidCollisionPass {
        /// The configured id.
        pass: PassId,
    },
    /// Shader compilation or pipeline validation failed for a pass.
    Shader {
        /// The offending pass.
        pass: PassId,
        /// The backend's diagnostic.
        message: String,
    },
    /// A channel's texture file failed to load.
    TextureLoad {
        /// The file that failed.
        path: PathBuf,
        /// The decoder error.
        source: image::ImageError,
    },
    /// A shader file could not be read.
    Io {
        /// The file that failed.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::DuplicatePass { pass } => {
                write!(f, "pass id {pass} declared more than once")
            }
            PipelineError::MissingImagePass => write!(f, "scene declares no image pass"),
            PipelineError::ExtraImagePass { pass } => {
                write!(f, "pass {pass}: only one image pass is allowed")
            }
            PipelineError::ImagePassNotLast { pass } => {
                write!(f, "image pass {pass} must be the last pass")
            }
            PipelineError::UnknownChannel {
                pass,
                channel,
                referenced,
            } => write!(
                f,
                "pass {pass}, channel {channel}: references unknown pass {referenced}"
            ),
            PipelineError::MissingCollisionPass => {
                write!(f, "scene has no buffer pass to probe for collisions")
            }
            PipelineError::InvalidCollisionPass { pass } => {
                write!(f, "collision pass {pass} is not a buffer pass")
            }
            PipelineError::Shader { pass, message } => {
                write!(f, "pass {pass}: shader error: {message}")
            }
            PipelineError::TextureLoad { path, source } => {
                write!(f, "loading texture {}: {}", path.display(), source)
            }
            PipelineError::Io { path, source } => {
                write!(f, "reading {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: PassId, kind: PassKind) -> PassConfig {
        PassConfig {
            id,
            kind,
            shader: "fs.wgsl".into(),
            channels: Vec::new(),
        }
    }

    #[test]
    fn accepts_buffer_passes_then_image() {
        let configs = vec![
            config(0, PassKind::Buffer),
            config(1, PassKind::Buffer),
            config(2, PassKind::Image),
        ];
        assert!(validate_configs(&configs).is_ok());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let configs = vec![config(0, PassKind::Buffer), config(0, PassKind::Image)];
        assert!(matches!(
            validate_configs(&configs),
            Err(PipelineError::DuplicatePass { pass: 0 })
        ));
    }

    #[test]
    fn rejects_missing_image_pass() {
        let configs = vec![config(0, PassKind::Buffer)];
        assert!(matches!(
            validate_configs(&configs),
            Err(PipelineError::MissingImagePass)
        ));
    }

    #[test]
    fn rejects_second_image_pass() {
        let configs = vec![config(0, PassKind::Image), config(1, PassKind::Image)];
        assert!(matches!(
            validate_configs(&configs),
            Err(PipelineError::ExtraImagePass { pass: 1 })
        ));
    }

    #[test]
    fn rejects_image_pass_before_buffers() {
        let configs = vec![config(0, PassKind::Image), config(1, PassKind::Buffer)];
        assert!(matches!(
            validate_configs(&configs),
            Err(PipelineError::ImagePassNotLast { pass: 0 })
        ));
    }
}
