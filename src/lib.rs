//! # Barrage
//!
//! **A multi-pass shader renderer where the pixels *are* the collision data.**
//!
//! Scenes are chains of fullscreen WGSL passes in the Shadertoy mold: buffer
//! passes render into offscreen float targets and can sample each other (or
//! themselves, one frame back), and a terminal image pass composites to the
//! screen. A player-controlled circle moves over the result, and collision is
//! decided by reading back the pixels around the player from the barrage
//! buffer — whatever the shaders draw brightly enough is solid, with no
//! per-pattern collision geometry.
//!
//! ## Quick Start
//!
//! ```no_run
//! use barrage::app::{self, AppConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     env_logger::init();
//!     app::run(AppConfig::default())
//! }
//! ```
//!
//! A scene is a directory holding a `scene.json` and the WGSL files it names;
//! see [`config::SceneConfig`] for the format and `scenes/infinite` for a
//! working example.

pub mod app;
pub mod channel;
pub mod config;
pub mod gpu;
pub mod input;
pub mod orchestrator;
pub mod pass;
pub mod pipeline;
pub mod player;
pub mod probe;
pub mod render_target;
pub mod texture;
pub mod wgsl;

pub use config::{Channel, PassConfig, PassId, PassKind, SceneConfig, SceneError};
pub use gpu::GpuContext;
pub use input::Input;
pub use orchestrator::FrameOrchestrator;
pub use pass::{FrameUniforms, ShaderPass, mouse_vector};
pub use pipeline::{FrameState, PipelineError, PipelineRunner};
pub use player::{Player, PlayerPass};
pub use probe::{CollisionProbe, ProbeError};
pub use render_target::RenderTarget;
pub use texture::Texture;

// Re-export glam math types for convenience
pub use glam::{Mat4, Vec2, Vec3, Vec4};
