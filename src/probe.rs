//! Pixel-readback collision probe.
//!
//! Instead of analytic geometry, collision is decided by sampling rendered
//! pixels: the barrage pass draws into an offscreen `Rgba32Float` target, the
//! probe reads back a small window around the player and tests a fixed ring of
//! points on the player's circle against a brightness threshold. Anything the
//! barrage shader draws brightly enough is therefore solid, with no
//! per-pattern collision code.
//!
//! The readback is a blocking GPU→CPU transfer and is the main latency cost of
//! a frame; it is not pipelined against the next frame.

use crate::gpu::GpuContext;
use crate::render_target::RenderTarget;
use glam::Vec2;
use std::sync::mpsc::channel;

/// Number of sample points on the circle boundary.
pub const SAMPLE_COUNT: usize = 64;

/// Brightness above which a sampled pixel counts as a hit (strictly greater).
pub const INTERSECT_THRESHOLD: f32 = 0.2;

/// Computes the ring of sample offsets for a circle of `radius` pixels.
///
/// Offsets are relative to the bottom-left corner of the `(2R+1)×(2R+1)` probe
/// window, not the circle center: `(round(cos θ·R)+R, round(sin θ·R)+R)` for
/// θ = i·2π/64. The second half of the ring is derived by mirroring the first
/// through the window center, so the set is exactly symmetric under 180°
/// rotation.
pub fn sample_offsets(radius: u32) -> Vec<[u32; 2]> {
    let r = radius as f32;
    let span = 2 * radius;
    let mut offsets = Vec::with_capacity(SAMPLE_COUNT);
    for i in 0..SAMPLE_COUNT / 2 {
        let theta = i as f32 * std::f32::consts::TAU / SAMPLE_COUNT as f32;
        let x = ((theta.cos() * r).round() + r) as u32;
        let y = ((theta.sin() * r).round() + r) as u32;
        offsets.push([x, y]);
    }
    for i in 0..SAMPLE_COUNT / 2 {
        let [x, y] = offsets[i];
        offsets.push([span - x, span - y]);
    }
    offsets
}

/// Scans the precomputed offsets over a readback window.
///
/// `window` is `4·(2R+1)²` floats in RGBA order with rows bottom-up; a sample
/// hits when any of its R/G/B channels strictly exceeds `threshold`. The scan
/// short-circuits on the first hit.
pub fn window_hit(window: &[f32], win: u32, offsets: &[[u32; 2]], threshold: f32) -> bool {
    offsets.iter().any(|&[x, y]| {
        let base = (4 * (y * win + x)) as usize;
        window[base] > threshold || window[base + 1] > threshold || window[base + 2] > threshold
    })
}

/// Readback failure during a probe test.
#[derive(Debug)]
pub struct ProbeError(wgpu::BufferAsyncError);

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "probe readback failed: {}", self.0)
    }
}

impl std::error::Error for ProbeError {}

/// The circular collision probe.
///
/// Offsets are derived from the radius and cached; if the tested radius ever
/// changes, the cache is recomputed before use, so it can never go stale.
pub struct CollisionProbe {
    radius: u32,
    offsets: Vec<[u32; 2]>,
    threshold: f32,
}

impl CollisionProbe {
    /// Builds a probe for the given radius.
    pub fn new(radius: u32) -> Self {
        Self {
            radius,
            offsets: sample_offsets(radius),
            threshold: INTERSECT_THRESHOLD,
        }
    }

    /// Current radius the cached offsets were computed for.
    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Cached sample offsets.
    pub fn offsets(&self) -> &[[u32; 2]] {
        &self.offsets
    }

    /// Recomputes the offset cache when the radius changed.
    pub fn update_radius(&mut self, radius: u32) {
        if radius != self.radius {
            self.radius = radius;
            self.offsets = sample_offsets(radius);
        }
    }

    /// Tests the player circle against the rendered barrage.
    ///
    /// Reads back the `(2R+1)×(2R+1)` float window anchored at
    /// `position - (R, R)` (bottom-left engine coordinates) from `target`,
    /// which must hold the barrage pass's output for this frame, then scans
    /// the ring offsets. The readback blocks until the GPU has produced the
    /// data; the staging buffer is scoped to this call and released on every
    /// exit path.
    ///
    /// The window is not clamped to the viewport. Callers keep the player far
    /// enough from the edges that the window stays inside; wgpu rejects
    /// out-of-bounds copies.
    pub fn test(
        &mut self,
        gpu: &GpuContext,
        target: &RenderTarget,
        position: Vec2,
        radius: u32,
    ) -> Result<bool, ProbeError> {
        self.update_radius(radius);

        let win = 2 * radius + 1;
        let bytes_per_pixel = 16; // Rgba32Float
        let row_bytes = win * bytes_per_pixel;
        let padded_bpr = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        // Window placement: engine coordinates are bottom-left origin, wgpu
        // textures are top-left, so the window's vertical position flips.
        let origin_x = (position.x as i32 - radius as i32) as u32;
        let origin_y =
            (target.height() as i32 - (position.y as i32 - radius as i32) - win as i32) as u32;

        let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Probe Readback"),
            size: u64::from(padded_bpr) * u64::from(win),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Probe Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: origin_x,
                    y: origin_y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr),
                    rows_per_image: Some(win),
                },
            },
            wgpu::Extent3d {
                width: win,
                height: win,
                depth_or_array_layers: 1,
            },
        );
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            drop(sender.send(res));
        });
        loop {
            drop(gpu.device.poll(wgpu::PollType::wait_indefinitely()));
            if let Ok(res) = receiver.try_recv() {
                res.map_err(ProbeError)?;
                break;
            }
        }

        let window = {
            let mapped = slice.get_mapped_range();
            let mut window = vec![0.0f32; (win * win * 4) as usize];
            let floats_per_row = (win * 4) as usize;
            for row in 0..win as usize {
                let src = &mapped[row * padded_bpr as usize..][..row_bytes as usize];
                // Flip rows so the window is bottom-up like the offsets.
                let dst_row = win as usize - 1 - row;
                window[dst_row * floats_per_row..][..floats_per_row]
                    .copy_from_slice(bytemuck::cast_slice(src));
            }
            window
        };
        staging.unmap();

        Ok(window_hit(&window, win, &self.offsets, self.threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_64_offsets_inside_the_window() {
        for radius in [1, 2, 3, 5, 8, 16, 50] {
            let offsets = sample_offsets(radius);
            assert_eq!(offsets.len(), SAMPLE_COUNT);
            for [x, y] in offsets {
                assert!(x <= 2 * radius, "x={x} outside window for R={radius}");
                assert!(y <= 2 * radius, "y={y} outside window for R={radius}");
            }
        }
    }

    #[test]
    fn offsets_symmetric_under_half_turn() {
        for radius in [1, 3, 5, 10, 17] {
            let offsets = sample_offsets(radius);
            let span = 2 * radius;
            for i in 0..SAMPLE_COUNT / 2 {
                let [x, y] = offsets[i];
                assert_eq!(offsets[i + SAMPLE_COUNT / 2], [span - x, span - y]);
            }
        }
    }

    #[test]
    fn first_offset_is_rightmost_point() {
        // θ = 0 lands on (2R, R) relative to the window corner.
        assert_eq!(sample_offsets(5)[0], [10, 5]);
    }

    #[test]
    fn black_window_never_hits() {
        let offsets = sample_offsets(5);
        let window = vec![0.0; 4 * 11 * 11];
        assert!(!window_hit(&window, 11, &offsets, INTERSECT_THRESHOLD));
    }

    #[test]
    fn threshold_is_strict() {
        let offsets = sample_offsets(5);
        let mut window = vec![0.0; 4 * 11 * 11];
        // Exactly the threshold on every channel of a sample point: no hit.
        let base = 4 * (5 * 11 + 10);
        window[base] = INTERSECT_THRESHOLD;
        window[base + 1] = INTERSECT_THRESHOLD;
        window[base + 2] = INTERSECT_THRESHOLD;
        assert!(!window_hit(&window, 11, &offsets, INTERSECT_THRESHOLD));

        window[base] = 0.3;
        assert!(window_hit(&window, 11, &offsets, INTERSECT_THRESHOLD));
    }

    #[test]
    fn alpha_channel_is_ignored() {
        let offsets = sample_offsets(5);
        let mut window = vec![0.0; 4 * 11 * 11];
        window[4 * (5 * 11 + 10) + 3] = 1.0;
        assert!(!window_hit(&window, 11, &offsets, INTERSECT_THRESHOLD));
    }

    #[test]
    fn lit_pixel_off_the_ring_is_ignored() {
        let offsets = sample_offsets(5);
        let mut window = vec![0.0; 4 * 11 * 11];
        // Window center (the player's own position) is not a sample point.
        window[4 * (5 * 11 + 5)] = 1.0;
        assert!(!window_hit(&window, 11, &offsets, INTERSECT_THRESHOLD));
    }

    #[test]
    fn radius_change_recomputes_offsets() {
        let mut probe = CollisionProbe::new(5);
        let before = probe.offsets().to_vec();
        probe.update_radius(9);
        assert_eq!(probe.radius(), 9);
        assert_ne!(probe.offsets(), &before[..]);
        assert_eq!(probe.offsets(), &sample_offsets(9)[..]);
    }
}
