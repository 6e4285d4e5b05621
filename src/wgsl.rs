//! WGSL composition for shader passes.
//!
//! Every pass's shader module is assembled from the same pieces, in order:
//!
//! 1. A generated header declaring [`FrameUniforms`](crate::pass::FrameUniforms)
//!    at binding 0 and one `texture_2d<f32>`/`sampler` pair per resolved
//!    channel (`channel0`/`sampler0`, `channel1`/`sampler1`, ...).
//! 2. A fullscreen-quad vertex stage (two triangles covering NDC -1..1,
//!    identical for all passes) and a fragment wrapper that converts
//!    `@builtin(position)` into a bottom-left-origin `frag_coord` before
//!    calling the user entry point.
//! 3. The scene's optional common source.
//! 4. The pass body, which must define `fn main_image(frag_coord: vec2f) -> vec4f`.
//!
//! Channel textures may be non-filterable float formats (the barrage buffer is
//! `Rgba32Float`), so samplers are non-filtering and bodies should sample with
//! `textureSampleLevel(channelN, samplerN, uv, 0.0)`.

use std::fmt::Write;

/// Vertex count of the fullscreen quad emitted by the generated vertex stage.
pub const QUAD_VERTEX_COUNT: u32 = 6;

const HEADER: &str = "\
struct FrameUniforms {
    resolution: vec2f,
    time: f32,
    frame: u32,
    mouse: vec4f,
}

@group(0) @binding(0) var<uniform> u: FrameUniforms;
";

const STAGES: &str = "
@vertex
fn vs(@builtin(vertex_index) vi: u32) -> @builtin(position) vec4f {
    var quad = array<vec2f, 6>(
        vec2f(-1.0, -1.0), vec2f(1.0, -1.0), vec2f(-1.0, 1.0),
        vec2f(-1.0, 1.0), vec2f(1.0, -1.0), vec2f(1.0, 1.0)
    );
    return vec4f(quad[vi], 0.0, 1.0);
}

@fragment
fn fs(@builtin(position) pos: vec4f) -> @location(0) vec4f {
    return main_image(vec2f(pos.x, u.resolution.y - pos.y));
}
";

/// Assembles the complete WGSL source for one pass.
///
/// `channel_count` is the number of *resolved* (non-empty) channels; binding
/// indices `1 + 2n` / `2 + 2n` hold channel `n`'s texture and sampler.
pub fn compose(channel_count: usize, common: Option<&str>, body: &str) -> String {
    let mut source = String::from(HEADER);
    for n in 0..channel_count {
        let _ = writeln!(
            source,
            "@group(0) @binding({}) var channel{n}: texture_2d<f32>;",
            1 + 2 * n
        );
        let _ = writeln!(
            source,
            "@group(0) @binding({}) var sampler{n}: sampler;",
            2 + 2 * n
        );
    }
    source.push_str(STAGES);
    if let Some(common) = common {
        source.push('\n');
        source.push_str(common);
    }
    source.push('\n');
    source.push_str(body);
    source
}
