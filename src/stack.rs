use ndarray as nd;
use serde::Serialize;

/// Pixel size and frame interval of a stack, carried over to crops and used
/// to convert pixel positions into calibrated units for export.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Calibration {
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub frame_interval: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pixel_width: 1.,
            pixel_height: 1.,
            frame_interval: 1.,
        }
    }
}

/// Display palette (LUT) as RGB triplets, opaque to the core.
#[derive(Clone, Debug)]
pub struct Palette(pub Vec<[u8; 3]>);

/// Rectangular region in pixel coordinates.
#[derive(Clone, Copy, Debug)]
pub struct Roi {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// A 16-bit hyperstack ordered channel x slice x frame x row x column.
#[derive(Clone, Debug)]
pub struct ImageStack {
    data: nd::Array5<u16>,
    pub calibration: Calibration,
    pub palette: Option<Palette>,
}

impl ImageStack {
    /// Create a zero-filled stack
    pub fn zeros(channels: usize, slices: usize, frames: usize, height: usize, width: usize) -> ImageStack {
        ImageStack {
            data: nd::Array5::zeros((channels, slices, frames, height, width)),
            calibration: Calibration::default(),
            palette: None,
        }
    }

    pub fn channels(&self) -> usize {
        self.data.dim().0
    }

    pub fn slices(&self) -> usize {
        self.data.dim().1
    }

    pub fn frames(&self) -> usize {
        self.data.dim().2
    }

    pub fn height(&self) -> usize {
        self.data.dim().3
    }

    pub fn width(&self) -> usize {
        self.data.dim().4
    }

    #[inline(always)]
    pub fn value(&self, c: usize, z: usize, t: usize, y: usize, x: usize) -> u16 {
        self.data[[c, z, t, y, x]]
    }

    #[inline(always)]
    pub fn set_value(&mut self, c: usize, z: usize, t: usize, y: usize, x: usize, value: u16) {
        self.data[[c, z, t, y, x]] = value;
    }

    /// Saturating add, used when stamping synthetic content.
    #[inline(always)]
    pub fn add_value(&mut self, c: usize, z: usize, t: usize, y: usize, x: usize, value: u16) {
        let v = &mut self.data[[c, z, t, y, x]];
        *v = v.saturating_add(value);
    }

    /// 2-D view of one plane of the stack.
    pub fn plane(&self, c: usize, z: usize, t: usize) -> nd::ArrayView2<'_, u16> {
        self.data.slice(nd::s![c, z, t, .., ..])
    }

    /// Mean pixel value over a rectangular region of one plane. The region
    /// must lie inside the image.
    pub fn region_mean(&self, c: usize, z: usize, t: usize, roi: &Roi) -> f64 {
        let view = self.data.slice(nd::s![
            c,
            z,
            t,
            roi.y..roi.y + roi.height,
            roi.x..roi.x + roi.width
        ]);
        if view.is_empty() {
            return 0.;
        }
        view.iter().map(|&v| v as f64).sum::<f64>() / view.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_mean_over_uniform_block() {
        let mut stack = ImageStack::zeros(1, 1, 1, 8, 8);
        for y in 2..4 {
            for x in 2..6 {
                stack.set_value(0, 0, 0, y, x, 100);
            }
        }
        let roi = Roi { x: 2, y: 2, width: 4, height: 2 };
        assert_eq!(stack.region_mean(0, 0, 0, &roi), 100.);

        let whole = Roi { x: 0, y: 0, width: 8, height: 8 };
        let expected = 100. * 8. / 64.;
        assert!((stack.region_mean(0, 0, 0, &whole) - expected).abs() < 1e-12);
    }
}
