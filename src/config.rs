//! Scene configuration: the ordered pass list consumed at setup.
//!
//! A scene is a directory holding a `scene.json` plus the WGSL files it names.
//! The pipeline's shape is fixed for the run — there is no interface to add or
//! remove passes at runtime.
//!
//! ```json
//! {
//!   "common_shader": "common.wgsl",
//!   "collision_pass": 0,
//!   "passes": [
//!     { "id": 0, "kind": "buffer", "shader": "barrage.wgsl",
//!       "channels": [{ "kind": "empty" }] },
//!     { "id": 1, "kind": "image", "shader": "image.wgsl",
//!       "channels": [{ "kind": "buffer", "pass": 0 }] }
//!   ]
//! }
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Identifier of a pass, unique within a scene. Doubles as the target of
/// buffer-channel references.
pub type PassId = u32;

/// What a pass renders to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassKind {
    /// Renders into an offscreen target for later consumption.
    Buffer,
    /// Renders directly to the screen. Exactly one per scene, declared last.
    Image,
}

/// One input-texture slot of a pass.
///
/// Channel order is stable and determines the binding slot. `Empty` channels
/// are skipped entirely; the channels after them compact down one slot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Channel {
    /// No texture bound at this slot.
    Empty,
    /// Another pass's output texture (same frame if that pass ran earlier,
    /// previous frame otherwise — a feedback channel).
    Buffer {
        /// The referenced pass id. Must exist among the scene's buffer passes.
        pass: PassId,
    },
    /// A file-loaded texture, loaded once at setup and cached.
    Texture {
        /// Image path, relative to the scene directory.
        path: PathBuf,
    },
}

/// Static configuration of a single shader pass.
#[derive(Debug, Clone, Deserialize)]
pub struct PassConfig {
    /// Unique pass identifier, also the buffer-reference target.
    pub id: PassId,
    /// Buffer or image.
    pub kind: PassKind,
    /// Fragment body path (defines `main_image`), relative to the scene dir.
    pub shader: PathBuf,
    /// Ordered channel list.
    #[serde(default)]
    pub channels: Vec<Channel>,
}

/// A full scene: the ordered pass list plus shared options.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneConfig {
    /// Shader source concatenated ahead of every pass body.
    #[serde(default)]
    pub common_shader: Option<PathBuf>,
    /// Which buffer pass the collision probe reads. Defaults to the first
    /// buffer pass in declaration order.
    #[serde(default)]
    pub collision_pass: Option<PassId>,
    /// Passes in execution order.
    pub passes: Vec<PassConfig>,
}

impl SceneConfig {
    /// Load a scene description from `<dir>/scene.json`.
    pub fn load(dir: &Path) -> Result<Self, SceneError> {
        let path = dir.join("scene.json");
        let text = std::fs::read_to_string(&path).map_err(|e| SceneError::Io(path.clone(), e))?;
        serde_json::from_str(&text).map_err(|e| SceneError::Parse(path, e))
    }

    /// The pass the collision probe should read: the configured id, or the
    /// first buffer pass.
    pub fn collision_pass(&self) -> Option<PassId> {
        self.collision_pass.or_else(|| {
            self.passes
                .iter()
                .find(|p| p.kind == PassKind::Buffer)
                .map(|p| p.id)
        })
    }
}

/// Errors reading or parsing a scene description.
#[derive(Debug)]
pub enum SceneError {
    /// The scene file could not be read.
    Io(PathBuf, std::io::Error),
    /// The scene file was not valid JSON for the expected shape.
    Parse(PathBuf, serde_json::Error),
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneError::Io(path, e) => write!(f, "reading {}: {}", path.display(), e),
            SceneError::Parse(path, e) => write!(f, "parsing {}: {}", path.display(), e),
        }
    }
}

impl std::error::Error for SceneError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_pass_scene() {
        let json = r#"{
            "common_shader": "common.wgsl",
            "passes": [
                { "id": 0, "kind": "buffer", "shader": "a.wgsl",
                  "channels": [{ "kind": "empty" }, { "kind": "texture", "path": "noise.png" }] },
                { "id": 1, "kind": "image", "shader": "b.wgsl",
                  "channels": [{ "kind": "buffer", "pass": 0 }] }
            ]
        }"#;
        let scene: SceneConfig = serde_json::from_str(json).unwrap();
        assert_eq!(scene.passes.len(), 2);
        assert_eq!(scene.passes[0].kind, PassKind::Buffer);
        assert_eq!(scene.passes[1].kind, PassKind::Image);
        assert_eq!(scene.passes[0].channels[0], Channel::Empty);
        assert_eq!(scene.passes[1].channels[0], Channel::Buffer { pass: 0 });
    }

    #[test]
    fn channels_default_to_none() {
        let json = r#"{ "passes": [{ "id": 0, "kind": "image", "shader": "a.wgsl" }] }"#;
        let scene: SceneConfig = serde_json::from_str(json).unwrap();
        assert!(scene.passes[0].channels.is_empty());
        assert!(scene.common_shader.is_none());
    }

    #[test]
    fn collision_pass_defaults_to_first_buffer() {
        let json = r#"{ "passes": [
            { "id": 3, "kind": "buffer", "shader": "a.wgsl" },
            { "id": 1, "kind": "image", "shader": "b.wgsl" }
        ] }"#;
        let scene: SceneConfig = serde_json::from_str(json).unwrap();
        assert_eq!(scene.collision_pass(), Some(3));
    }

    #[test]
    fn explicit_collision_pass_wins() {
        let json = r#"{ "collision_pass": 7, "passes": [
            { "id": 3, "kind": "buffer", "shader": "a.wgsl" },
            { "id": 7, "kind": "buffer", "shader": "c.wgsl" },
            { "id": 1, "kind": "image", "shader": "b.wgsl" }
        ] }"#;
        let scene: SceneConfig = serde_json::from_str(json).unwrap();
        assert_eq!(scene.collision_pass(), Some(7));
    }
}
