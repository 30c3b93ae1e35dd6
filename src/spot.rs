use num_traits::ToPrimitive;

use crate::my_types::*;
use crate::stack::ImageStack;

/// Per-channel intensity statistics of one detection, computed over the
/// detection disk. Fixed schema: one entry per stack channel, resolved when
/// the detection is analyzed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChannelStats {
    /// Mean intensity inside the detection disk.
    pub mean: f64,
    /// Standard deviation inside the detection disk.
    pub std: f64,
    /// Michelson contrast between the disk and the surrounding annulus.
    pub contrast: f64,
    /// (disk mean - annulus mean) / annulus standard deviation.
    pub snr: f64,
}

/// A detection before the graph assigns its identity.
#[derive(Clone, Debug)]
pub struct SpotCandidate {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
    pub quality: f64,
    pub radius: f64,
    pub channels: Vec<ChannelStats>,
}

/// One detection, owned by the track graph. Immutable once created.
#[derive(Clone, Debug)]
pub struct Spot {
    pub id: SpotId,
    pub frame: usize,
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
    pub quality: f64,
    pub radius: f64,
    pub channels: Vec<ChannelStats>,
}

impl Spot {
    pub fn position(&self) -> Point2d {
        Point2d::new(self.x, self.y)
    }

    /// Euclidean distance between two spot positions. The z component only
    /// contributes when both spots carry one.
    pub fn distance_to(&self, other: &Spot) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = match (self.z, other.z) {
            (Some(az), Some(bz)) => az - bz,
            _ => 0.,
        };
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Mean and standard deviation of a pixel sample.
pub(crate) fn mean_std<T: ToPrimitive + Copy>(values: &[T]) -> (f64, f64) {
    if values.is_empty() {
        return (0., 0.);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|v| v.to_f64().unwrap_or(0.)).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|v| {
            let d = v.to_f64().unwrap_or(0.) - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var.sqrt())
}

/// Compute the fixed-schema per-channel statistics for a detection at
/// (x, y) on slice `z` of frame `t`. The disk has the given radius, the
/// background annulus extends to twice that radius.
pub fn analyze_spot(stack: &ImageStack, x: f64, y: f64, z: usize, t: usize, radius: f64) -> Vec<ChannelStats> {
    let mut stats = Vec::with_capacity(stack.channels());
    for c in 0..stack.channels() {
        let (disk, annulus) = collect_disk_and_annulus(stack, c, z, t, x, y, radius);
        let (mean_in, std_in) = mean_std(&disk);
        let (mean_out, std_out) = mean_std(&annulus);
        let sum = mean_in + mean_out;
        let contrast = if sum > 0. { (mean_in - mean_out) / sum } else { 0. };
        let snr = if std_out > 0. { (mean_in - mean_out) / std_out } else { 0. };
        stats.push(ChannelStats {
            mean: mean_in,
            std: std_in,
            contrast,
            snr,
        });
    }
    stats
}

fn collect_disk_and_annulus(
    stack: &ImageStack,
    c: usize,
    z: usize,
    t: usize,
    x: f64,
    y: f64,
    radius: f64,
) -> (Vec<u16>, Vec<u16>) {
    let outer = 2. * radius;
    let r2 = radius * radius;
    let outer2 = outer * outer;
    let mut disk = vec![];
    let mut annulus = vec![];

    let x_lo = ((x - outer).floor().max(0.)) as usize;
    let x_hi = ((x + outer).ceil() as usize).min(stack.width().saturating_sub(1));
    let y_lo = ((y - outer).floor().max(0.)) as usize;
    let y_hi = ((y + outer).ceil() as usize).min(stack.height().saturating_sub(1));

    for py in y_lo..=y_hi {
        for px in x_lo..=x_hi {
            let dx = px as f64 - x;
            let dy = py as f64 - y;
            let d2 = dx * dx + dy * dy;
            if d2 <= r2 {
                disk.push(stack.value(c, z, t, py, px));
            } else if d2 <= outer2 {
                annulus.push(stack.value(c, z, t, py, px));
            }
        }
    }
    (disk, annulus)
}
