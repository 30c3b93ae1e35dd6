use ndarray as nd;
use tracing::warn;

use crate::config::TrackingConfig;
use crate::error::TrackingError;
use crate::graph::TrackGraph;
use crate::my_types::*;
use crate::stack::{Calibration, ImageStack, Palette};
use crate::track::Track;

/// A track-centered sub-volume: same channel/slice/frame extents as the
/// source, fixed spatial extent. Owned by the extractor until handed to the
/// caller for persistence.
#[derive(Clone, Debug)]
pub struct Crop {
    pub track_id: TrackId,
    /// channel x slice x frame x row x column, frame 0 = the track's first
    /// frame.
    pub volume: nd::Array5<u16>,
    pub calibration: Calibration,
    pub palette: Option<Palette>,
    /// Source frame the crop's frame 0 corresponds to.
    pub first_frame: usize,
}

/// Copies track-centered windows out of a stack. Edge policy: the window is
/// clipped against the source and the off-image part of the crop stays
/// zero-filled; a fully off-image window is an `OutOfBoundsCrop` error for
/// that track.
pub struct CropExtractor {
    width: usize,
    height: usize,
}

impl CropExtractor {
    pub fn new(width: usize, height: usize) -> CropExtractor {
        CropExtractor { width, height }
    }

    pub fn from_config(config: &TrackingConfig) -> CropExtractor {
        CropExtractor::new(config.crop_width, config.crop_height)
    }

    /// Extract the crop for one track. For every member detection the
    /// window centered at its rounded position is copied across all
    /// channels and slices into destination frame (t - first_frame). Gap
    /// frames and frames past the track's end stay zero-filled; nothing is
    /// interpolated.
    pub fn extract(&self, stack: &ImageStack, graph: &TrackGraph, track: &Track) -> Result<Crop, TrackingError> {
        let mut volume = nd::Array5::zeros((
            stack.channels(),
            stack.slices(),
            stack.frames(),
            self.height,
            self.width,
        ));

        for &spot_id in &track.spots {
            let spot = graph.spot(spot_id);
            let cx = spot.x.round() as i64;
            let cy = spot.y.round() as i64;
            let dst_t = spot.frame - track.first_frame;
            let copied = self.copy_window(stack, &mut volume, cx, cy, spot.frame, dst_t);
            match copied {
                WindowCopy::Full => {}
                WindowCopy::Clipped => {
                    warn!(
                        track = track.id,
                        frame = spot.frame,
                        x = cx,
                        y = cy,
                        "crop window clipped at image edge, off-image part left zero"
                    );
                }
                WindowCopy::Empty => {
                    return Err(TrackingError::OutOfBoundsCrop {
                        track: track.id,
                        frame: spot.frame,
                    });
                }
            }
        }

        Ok(Crop {
            track_id: track.id,
            volume,
            calibration: stack.calibration,
            palette: stack.palette.clone(),
            first_frame: track.first_frame,
        })
    }

    fn copy_window(
        &self,
        stack: &ImageStack,
        volume: &mut nd::Array5<u16>,
        cx: i64,
        cy: i64,
        src_t: usize,
        dst_t: usize,
    ) -> WindowCopy {
        let w = self.width as i64;
        let h = self.height as i64;
        let x0 = cx - w / 2;
        let y0 = cy - h / 2;
        let src_w = stack.width() as i64;
        let src_h = stack.height() as i64;

        // Intersection of the window with the source, in window coordinates.
        let dx_lo = (-x0).clamp(0, w) as usize;
        let dx_hi = (src_w - x0).clamp(0, w) as usize;
        let dy_lo = (-y0).clamp(0, h) as usize;
        let dy_hi = (src_h - y0).clamp(0, h) as usize;

        if dx_lo >= dx_hi || dy_lo >= dy_hi {
            return WindowCopy::Empty;
        }

        for c in 0..stack.channels() {
            for z in 0..stack.slices() {
                for dy in dy_lo..dy_hi {
                    let sy = (y0 + dy as i64) as usize;
                    for dx in dx_lo..dx_hi {
                        let sx = (x0 + dx as i64) as usize;
                        volume[[c, z, dst_t, dy, dx]] = stack.value(c, z, src_t, sy, sx);
                    }
                }
            }
        }

        if dx_lo > 0 || dy_lo > 0 || dx_hi < self.width || dy_hi < self.height {
            WindowCopy::Clipped
        } else {
            WindowCopy::Full
        }
    }
}

enum WindowCopy {
    Full,
    Clipped,
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spot::SpotCandidate;

    fn candidate(x: f64, y: f64) -> SpotCandidate {
        SpotCandidate {
            x,
            y,
            z: None,
            quality: 1.,
            radius: 1.,
            channels: vec![],
        }
    }

    /// Stack with a static per-pixel pattern so copies are easy to verify.
    fn patterned_stack(channels: usize, frames: usize, height: usize, width: usize) -> ImageStack {
        let mut stack = ImageStack::zeros(channels, 1, frames, height, width);
        for c in 0..channels {
            for t in 0..frames {
                for y in 0..height {
                    for x in 0..width {
                        let v = (c * 10000 + y * 100 + x) as u16;
                        stack.set_value(c, 0, t, y, x, v);
                    }
                }
            }
        }
        stack
    }

    fn chain_track(graph: &mut TrackGraph, positions: &[(f64, f64)]) -> Track {
        for (t, &(x, y)) in positions.iter().enumerate() {
            graph.add_detections(t, vec![candidate(x, y)]).unwrap();
        }
        for t in 0..positions.len() - 1 {
            graph.add_link(t, t + 1, 1.).unwrap();
        }
        graph.tracks().next().unwrap()
    }

    #[test]
    fn crop_has_configured_spatial_extent() {
        let stack = patterned_stack(2, 3, 40, 60);
        let mut graph = TrackGraph::new();
        let track = chain_track(&mut graph, &[(30., 20.), (30., 20.), (30., 20.)]);

        let crop = CropExtractor::new(7, 11).extract(&stack, &graph, &track).unwrap();
        assert_eq!(crop.volume.dim(), (2, 1, 3, 11, 7));
        assert_eq!(crop.first_frame, 0);
    }

    #[test]
    fn constant_position_track_reproduces_the_source_region() {
        let stack = patterned_stack(2, 4, 40, 60);
        let mut graph = TrackGraph::new();
        let track = chain_track(
            &mut graph,
            &[(30., 20.), (30., 20.), (30., 20.), (30., 20.)],
        );

        let w = 9;
        let h = 9;
        let crop = CropExtractor::new(w, h).extract(&stack, &graph, &track).unwrap();
        let x0 = 30 - w / 2;
        let y0 = 20 - h / 2;
        for c in 0..2 {
            for t in 0..4 {
                for dy in 0..h {
                    for dx in 0..w {
                        assert_eq!(
                            crop.volume[[c, 0, t, dy, dx]],
                            stack.value(c, 0, t, y0 + dy, x0 + dx),
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn left_edge_columns_are_zero_filled() {
        // width 10 crop at x=2 on a 100-wide image: columns mapping to
        // x < 0 stay zero, the rest match the source
        let stack = patterned_stack(1, 2, 50, 100);
        let mut graph = TrackGraph::new();
        let track = chain_track(&mut graph, &[(2., 25.), (2., 25.)]);

        let crop = CropExtractor::new(10, 8).extract(&stack, &graph, &track).unwrap();
        // x0 = 2 - 10/2 = -3
        for t in 0..2 {
            for dy in 0..8 {
                for dx in 0..3 {
                    assert_eq!(crop.volume[[0, 0, t, dy, dx]], 0);
                }
                for dx in 3..10 {
                    let sy = 25 - 4 + dy;
                    let sx = dx - 3;
                    assert_eq!(crop.volume[[0, 0, t, dy, dx]], stack.value(0, 0, t, sy, sx));
                }
            }
        }
    }

    #[test]
    fn gap_frames_stay_zero_filled() {
        let stack = patterned_stack(1, 3, 40, 40);
        let mut graph = TrackGraph::new();
        graph.add_detections(0, vec![candidate(20., 20.)]).unwrap();
        graph.add_detections(1, vec![]).unwrap();
        graph.add_detections(2, vec![candidate(20., 20.)]).unwrap();
        graph.add_link(0, 1, 0.).unwrap();
        let track = graph.tracks().next().unwrap();

        let crop = CropExtractor::new(5, 5).extract(&stack, &graph, &track).unwrap();
        assert!(crop.volume.slice(nd::s![0, 0, 1, .., ..]).iter().all(|&v| v == 0));
        assert!(crop.volume.slice(nd::s![0, 0, 0, .., ..]).iter().any(|&v| v != 0));
        assert!(crop.volume.slice(nd::s![0, 0, 2, .., ..]).iter().any(|&v| v != 0));
    }

    #[test]
    fn fully_off_image_window_is_an_error() {
        let stack = patterned_stack(1, 2, 40, 40);
        let mut graph = TrackGraph::new();
        let track = chain_track(&mut graph, &[(200., 200.), (200., 200.)]);

        let err = CropExtractor::new(5, 5).extract(&stack, &graph, &track).unwrap_err();
        assert!(matches!(err, TrackingError::OutOfBoundsCrop { track: 0, frame: 0 }));
    }

    #[test]
    fn track_starting_late_is_shifted_to_frame_zero() {
        let stack = patterned_stack(1, 5, 40, 40);
        let mut graph = TrackGraph::new();
        graph.add_detections(0, vec![]).unwrap();
        graph.add_detections(1, vec![]).unwrap();
        graph.add_detections(2, vec![candidate(20., 20.)]).unwrap();
        graph.add_detections(3, vec![candidate(20., 20.)]).unwrap();
        graph.add_link(0, 1, 0.).unwrap();
        let track = graph.tracks().next().unwrap();
        assert_eq!(track.first_frame, 2);

        let crop = CropExtractor::new(5, 5).extract(&stack, &graph, &track).unwrap();
        // content from source frames 2 and 3 lands in crop frames 0 and 1
        assert!(crop.volume.slice(nd::s![0, 0, 0, .., ..]).iter().any(|&v| v != 0));
        assert!(crop.volume.slice(nd::s![0, 0, 1, .., ..]).iter().any(|&v| v != 0));
        for t in 2..5 {
            assert!(crop.volume.slice(nd::s![0, 0, t, .., ..]).iter().all(|&v| v == 0));
        }
    }
}
