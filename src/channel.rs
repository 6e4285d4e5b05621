//! Channel resolution: turning a pass's declared inputs into bindable textures.
//!
//! Resolution happens once at pipeline construction. Which texture feeds which
//! slot is fixed for the run; only the *contents* of referenced render targets
//! change frame to frame. An unknown buffer reference is a configuration
//! error reported at setup, never silently ignored.

use crate::config::{Channel, PassConfig, PassId};
use crate::gpu::GpuContext;
use crate::pipeline::PipelineError;
use crate::texture::Texture;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The pure part of resolution: which source feeds each (compacted) slot.
///
/// `Empty` channels are dropped here, so a plan entry's index *is* its binding
/// slot. Deterministic: the same config always yields the same plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingPlan {
    /// Slot is fed by a buffer pass's render target.
    Target(PassId),
    /// Slot is fed by a file texture at this path.
    File(PathBuf),
}

/// A channel binding after setup: either a live render-target reference or a
/// texture loaded once and cached for the pipeline's lifetime.
pub enum ResolvedChannel {
    /// Bind the named pass's current output texture each frame.
    Target(PassId),
    /// Bind this loaded texture.
    Loaded(Texture),
}

/// Validates a pass's channel list against the scene's buffer passes and
/// produces the slot plan.
pub fn plan_bindings(
    config: &PassConfig,
    buffer_passes: &HashSet<PassId>,
) -> Result<Vec<BindingPlan>, PipelineError> {
    let mut plan = Vec::new();
    for (index, channel) in config.channels.iter().enumerate() {
        match channel {
            Channel::Empty => {}
            Channel::Buffer { pass } => {
                if !buffer_passes.contains(pass) {
                    return Err(PipelineError::UnknownChannel {
                        pass: config.id,
                        channel: index,
                        referenced: *pass,
                    });
                }
                plan.push(BindingPlan::Target(*pass));
            }
            Channel::Texture { path } => plan.push(BindingPlan::File(path.clone())),
        }
    }
    Ok(plan)
}

/// Executes a binding plan: file channels are loaded now, buffer channels stay
/// as references looked up against the pipeline's targets each frame.
pub fn resolve_channels(
    gpu: &GpuContext,
    scene_dir: &Path,
    config: &PassConfig,
    buffer_passes: &HashSet<PassId>,
) -> Result<Vec<ResolvedChannel>, PipelineError> {
    plan_bindings(config, buffer_passes)?
        .into_iter()
        .map(|binding| match binding {
            BindingPlan::Target(id) => Ok(ResolvedChannel::Target(id)),
            BindingPlan::File(path) => {
                let full = scene_dir.join(&path);
                let texture = Texture::from_file(gpu, &full.to_string_lossy())
                    .map_err(|source| PipelineError::TextureLoad { path: full, source })?;
                log::debug!(
                    "pass {}: loaded channel texture {} ({}x{})",
                    config.id,
                    path.display(),
                    texture.width,
                    texture.height
                );
                Ok(ResolvedChannel::Loaded(texture))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PassKind;

    fn pass(channels: Vec<Channel>) -> PassConfig {
        PassConfig {
            id: 9,
            kind: PassKind::Image,
            shader: "fs.wgsl".into(),
            channels,
        }
    }

    #[test]
    fn empty_channels_compact_down() {
        let config = pass(vec![
            Channel::Empty,
            Channel::Buffer { pass: 0 },
            Channel::Empty,
            Channel::Texture {
                path: "noise.png".into(),
            },
        ]);
        let buffers = HashSet::from([0]);
        let plan = plan_bindings(&config, &buffers).unwrap();
        assert_eq!(
            plan,
            vec![
                BindingPlan::Target(0),
                BindingPlan::File("noise.png".into()),
            ]
        );
    }

    #[test]
    fn unknown_buffer_reference_is_an_error() {
        let config = pass(vec![Channel::Buffer { pass: 4 }]);
        let buffers = HashSet::from([0, 1]);
        let err = plan_bindings(&config, &buffers).unwrap_err();
        match err {
            PipelineError::UnknownChannel {
                pass,
                channel,
                referenced,
            } => {
                assert_eq!(pass, 9);
                assert_eq!(channel, 0);
                assert_eq!(referenced, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn self_reference_plans_to_own_target() {
        // A buffer pass may feed on its own previous frame; the pipeline
        // double-buffers its target so this stays legal at execution time.
        let config = PassConfig {
            id: 2,
            kind: PassKind::Buffer,
            shader: "fs.wgsl".into(),
            channels: vec![Channel::Buffer { pass: 2 }],
        };
        let buffers = HashSet::from([2]);
        let plan = plan_bindings(&config, &buffers).unwrap();
        assert_eq!(plan, vec![BindingPlan::Target(2)]);
    }

    #[test]
    fn planning_is_deterministic() {
        let config = pass(vec![
            Channel::Buffer { pass: 1 },
            Channel::Empty,
            Channel::Buffer { pass: 0 },
        ]);
        let buffers = HashSet::from([0, 1]);
        let first = plan_bindings(&config, &buffers).unwrap();
        let second = plan_bindings(&config, &buffers).unwrap();
        assert_eq!(first, second);
    }
}
