//! Splat rasterization
//!
//! Blending policy of [`SplatRasterizer`]:
//!
//! 1. Every Gaussian is projected with `P * V`. Points with `w <= 0` or an
//!    NDC depth outside `[-1, 1]` are culled.
//! 2. Each surviving point becomes an isotropic screen-space Gaussian with
//!    `sigma = splat_scale * focal_px / depth`, clamped to `[0.5, 64]` px and
//!    truncated at `3 sigma`.
//! 3. Splats are sorted back to front by view depth. Ties keep scene order.
//! 4. Each pixel starts at the background color and composites splats with
//!    the "over" operator, `c = a * color + (1 - a) * c`, where
//!    `a = opacity * exp(-d^2 / (2 sigma^2))`. Contributions below 1/255
//!    are skipped.
//! 5. Channels are quantized to 8 bits, round to nearest.
//!
//! Rows are composited in independent bands on the rayon pool. The order of
//! operations per pixel is fixed by the sort, so output is identical for
//! any thread count.

use std::mem::size_of;
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::debug;

use aria_core::{quantize, Accelerator, AriaError, AriaResult, Color, RenderConfig, Resolution, BYTES_PER_PIXEL};

use crate::camera::{CameraPose, Projection};
use crate::frame::Frame;
use crate::scene::DeformedScene;

/// Smallest screen-space standard deviation in pixels
pub const MIN_SIGMA_PX: f32 = 0.5;
/// Largest screen-space standard deviation in pixels
pub const MAX_SIGMA_PX: f32 = 64.0;
/// Kernel support in standard deviations
const SUPPORT_SIGMAS: f32 = 3.0;
/// Contributions below this alpha are skipped
const MIN_ALPHA: f32 = 1.0 / 255.0;
/// Rows per compositing band
const BAND_ROWS: usize = 16;

/// Turns a deformed scene and a camera pose into a frame
pub trait Rasterizer: Send + Sync {
    fn render(&self, scene: &DeformedScene<'_>, pose: &CameraPose, index: u64) -> AriaResult<Frame>;

    /// Drop cached working buffers
    fn release_memory(&self);

    fn resolution(&self) -> Resolution;
}

#[derive(Debug, Clone, Copy)]
struct ProjectedSplat {
    x: f32,
    y: f32,
    radius: f32,
    inv_two_sigma2: f32,
    depth: f32,
    color: Color,
    opacity: f32,
    index: u32,
}

impl ProjectedSplat {
    fn rows(&self, height: usize) -> (usize, usize) {
        let lo = (self.y - self.radius).floor().max(0.0) as usize;
        let hi = ((self.y + self.radius).ceil().max(0.0) as usize).min(height.saturating_sub(1));
        (lo, hi)
    }

    fn cols(&self, width: usize) -> (usize, usize) {
        let lo = (self.x - self.radius).floor().max(0.0) as usize;
        let hi = ((self.x + self.radius).ceil().max(0.0) as usize).min(width.saturating_sub(1));
        (lo, hi)
    }
}

#[derive(Default)]
struct Scratch {
    splats: Vec<ProjectedSplat>,
    accum: Vec<Color>,
    bins: Vec<Vec<u32>>,
}

/// CPU splat rasterizer with device-memory accounting
pub struct SplatRasterizer {
    config: RenderConfig,
    projection: Projection,
    accelerator: Arc<dyn Accelerator>,
    scratch: Mutex<Scratch>,
}

impl SplatRasterizer {
    pub fn new(config: RenderConfig, accelerator: Arc<dyn Accelerator>) -> AriaResult<Self> {
        config.validate()?;
        Ok(Self {
            projection: Projection::from_config(&config),
            config,
            accelerator,
            scratch: Mutex::new(Scratch::default()),
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Device bytes needed to render a scene of `gaussians` points
    pub fn working_bytes(&self, gaussians: usize) -> u64 {
        let res = self.config.resolution;
        (res.pixel_count() * size_of::<Color>()
            + res.frame_bytes()
            + gaussians * (size_of::<ProjectedSplat>() + size_of::<u32>())) as u64
    }

    fn project(&self, scene: &DeformedScene<'_>, pose: &CameraPose, out: &mut Vec<ProjectedSplat>) {
        let res = self.config.resolution;
        let (w, h) = (res.width as f32, res.height as f32);
        let focal = self.projection.focal_px(res.height);
        let scale = self.config.splat_scale;
        let vp = pose.view_projection();

        let colors = scene.colors();
        let opacities = scene.opacities();

        out.clear();
        out.par_extend(scene.positions().par_iter().enumerate().filter_map(|(i, p)| {
            let opacity = opacities[i];
            if opacity < MIN_ALPHA {
                return None;
            }

            let clip = vp.transform_point(*p);
            if clip.w <= 0.0 {
                return None;
            }
            let ndc = clip.to_ndc();
            if !(-1.0..=1.0).contains(&ndc.z) {
                return None;
            }

            // perspective w is the view-space distance along the camera axis
            let depth = clip.w;
            let sigma = (scale * focal / depth).clamp(MIN_SIGMA_PX, MAX_SIGMA_PX);
            let radius = SUPPORT_SIGMAS * sigma;
            let x = (ndc.x + 1.0) * 0.5 * w;
            let y = (1.0 - ndc.y) * 0.5 * h;
            if x + radius < 0.0 || y + radius < 0.0 || x - radius > w || y - radius > h {
                return None;
            }

            Some(ProjectedSplat {
                x,
                y,
                radius,
                inv_two_sigma2: 1.0 / (2.0 * sigma * sigma),
                depth,
                color: colors[i],
                opacity,
                index: i as u32,
            })
        }));

        out.sort_by(|a, b| b.depth.total_cmp(&a.depth).then(a.index.cmp(&b.index)));
    }
}

impl Rasterizer for SplatRasterizer {
    fn render(&self, scene: &DeformedScene<'_>, pose: &CameraPose, index: u64) -> AriaResult<Frame> {
        let res = self.config.resolution;
        let (width, height) = (res.width as usize, res.height as usize);
        let background = self.config.background_color;

        if scene.len() > u32::MAX as usize {
            return Err(AriaError::Processing(format!("scene too large: {} gaussians", scene.len())));
        }

        let _working = self.accelerator.memory().reserve(self.working_bytes(scene.len()))?;

        let mut scratch = self.scratch.lock();
        let Scratch { splats, accum, bins } = &mut *scratch;

        self.project(scene, pose, splats);

        let band_count = height.div_ceil(BAND_ROWS);
        bins.resize_with(band_count, Vec::new);
        for bin in bins.iter_mut() {
            bin.clear();
        }
        for (k, splat) in splats.iter().enumerate() {
            let (lo, hi) = splat.rows(height);
            if lo > hi {
                continue;
            }
            for bin in &mut bins[lo / BAND_ROWS..=hi / BAND_ROWS] {
                bin.push(k as u32);
            }
        }

        accum.clear();
        accum.resize(res.pixel_count(), background);

        let splats = &*splats;
        accum
            .par_chunks_mut(width * BAND_ROWS)
            .zip(bins.par_iter())
            .enumerate()
            .for_each(|(band, (pixels, bin))| {
                let row0 = band * BAND_ROWS;
                for &k in bin {
                    let s = &splats[k as usize];
                    let (r_lo, r_hi) = s.rows(height);
                    let (c_lo, c_hi) = s.cols(width);
                    let r_lo = r_lo.max(row0);
                    let r_hi = r_hi.min(row0 + pixels.len() / width - 1);
                    let radius2 = s.radius * s.radius;

                    for row in r_lo..=r_hi {
                        let dy = row as f32 + 0.5 - s.y;
                        let line = &mut pixels[(row - row0) * width..(row - row0 + 1) * width];
                        for (col, px) in line.iter_mut().enumerate().take(c_hi + 1).skip(c_lo) {
                            let dx = col as f32 + 0.5 - s.x;
                            let d2 = dx * dx + dy * dy;
                            if d2 > radius2 {
                                continue;
                            }
                            let alpha = s.opacity * (-d2 * s.inv_two_sigma2).exp();
                            if alpha < MIN_ALPHA {
                                continue;
                            }
                            *px = s.color.lerp(px, 1.0 - alpha);
                        }
                    }
                }
            });

        let mut data = vec![0u8; res.frame_bytes()];
        data.par_chunks_mut(BYTES_PER_PIXEL)
            .zip(accum.par_iter())
            .for_each(|(out, c)| {
                out[0] = quantize(c.r);
                out[1] = quantize(c.g);
                out[2] = quantize(c.b);
            });

        debug!(frame = index, gaussians = scene.len(), visible = splats.len(), "Rasterized frame");
        Ok(Frame::new(res, index, data))
    }

    fn release_memory(&self) {
        let mut scratch = self.scratch.lock();
        *scratch = Scratch::default();
        debug!("Released rasterizer scratch buffers");
    }

    fn resolution(&self) -> Resolution {
        self.config.resolution
    }
}
