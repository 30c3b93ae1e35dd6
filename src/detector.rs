use ndarray as nd;

use crate::config::TrackingConfig;
use crate::stack::ImageStack;

/// A candidate object position reported by a detector, before the graph
/// assigns identity and before channel statistics are attached.
#[derive(Clone, Copy, Debug)]
pub struct RawSpot {
    pub x: f64,
    pub y: f64,
    pub quality: f64,
}

/// The detector adapter seam. Detection/segmentation itself is pluggable;
/// the pipeline only needs candidate positions with a quality value. The
/// current run configuration is passed on every call so a retuned pass
/// detects with the new parameters.
pub trait Detector {
    fn detect(
        &self,
        stack: &ImageStack,
        frame: usize,
        channel: usize,
        config: &TrackingConfig,
    ) -> Vec<RawSpot>;
}

/// Default detector: thresholded local maxima on one plane, with optional
/// 3x3 median pre-filtering and parabolic sub-pixel refinement. Stateless;
/// threshold and flags come from the run configuration.
pub struct LocalMaxDetector;

impl Detector for LocalMaxDetector {
    fn detect(
        &self,
        stack: &ImageStack,
        frame: usize,
        channel: usize,
        config: &TrackingConfig,
    ) -> Vec<RawSpot> {
        let plane = stack.plane(channel, 0, frame);
        let plane = if config.median_filter {
            median3x3(&plane)
        } else {
            plane.to_owned()
        };
        let (h, w) = plane.dim();
        let mut spots = vec![];
        if h < 3 || w < 3 {
            return spots;
        }

        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let v = plane[[y, x]];
                if (v as f64) <= config.threshold {
                    continue;
                }
                if !is_local_max(&plane, y, x) {
                    continue;
                }
                let mut fx = x as f64;
                let mut fy = y as f64;
                if config.subpixel {
                    fx += parabolic_offset(
                        plane[[y, x - 1]] as f64,
                        v as f64,
                        plane[[y, x + 1]] as f64,
                    );
                    fy += parabolic_offset(
                        plane[[y - 1, x]] as f64,
                        v as f64,
                        plane[[y + 1, x]] as f64,
                    );
                }
                spots.push(RawSpot {
                    x: fx,
                    y: fy,
                    quality: v as f64,
                });
            }
        }
        spots
    }
}

/// True when (y, x) is an 8-neighbourhood maximum. On a plateau only the
/// first pixel in raster order qualifies.
fn is_local_max(plane: &nd::Array2<u16>, y: usize, x: usize) -> bool {
    let v = plane[[y, x]];
    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            if dy == 0 && dx == 0 {
                continue;
            }
            let ny = (y as i64 + dy) as usize;
            let nx = (x as i64 + dx) as usize;
            let nv = plane[[ny, nx]];
            let after = (dy, dx) > (0, 0);
            if after {
                if nv >= v {
                    return false;
                }
            } else if nv > v {
                return false;
            }
        }
    }
    true
}

/// One-dimensional quadratic peak interpolation, clamped to half a pixel.
fn parabolic_offset(left: f64, center: f64, right: f64) -> f64 {
    let denom = left - 2. * center + right;
    if denom.abs() < 1e-12 {
        return 0.;
    }
    (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
}

fn median3x3(plane: &nd::ArrayView2<u16>) -> nd::Array2<u16> {
    let (h, w) = plane.dim();
    let mut out = plane.to_owned();
    if h < 3 || w < 3 {
        return out;
    }
    let mut window = [0u16; 9];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut k = 0;
            for dy in 0..3 {
                for dx in 0..3 {
                    window[k] = plane[[y + dy - 1, x + dx - 1]];
                    k += 1;
                }
            }
            window.sort_unstable();
            out[[y, x]] = window[4];
        }
    }
    out
}
