use serde::Serialize;

use crate::graph::TrackGraph;
use crate::my_types::*;
use crate::stack::{Calibration, ImageStack, Roi};
use crate::track::Track;

/// One exported tuple per (track, frame). Field names follow the measurement
/// table's column headers.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct MeasurementRow {
    pub track_id: TrackId,
    pub quality: f64,
    /// Position in calibrated units.
    pub position_x: f64,
    pub position_y: f64,
    pub position_t: f64,
    pub frame: usize,
    /// Mean intensity in the mask channel.
    pub mean_mask: f64,
    /// Mean intensity in the measurement channel.
    pub mean_intensity: f64,
    pub standard_deviation: f64,
    pub contrast: f64,
    pub snr: f64,
    /// Reference-region statistic supplied by the caller, one per frame.
    #[serde(rename = "REF")]
    pub reference: f64,
}

/// External collaborator computing one reference statistic per frame.
pub trait ReferenceProvider {
    fn measure_region(&self, frame: usize) -> f64;
}

/// Reference provider measuring the mean of a fixed rectangular region on
/// one channel of the source stack.
pub struct RoiMeanProvider<'a> {
    stack: &'a ImageStack,
    channel: usize,
    roi: Roi,
}

impl<'a> RoiMeanProvider<'a> {
    pub fn new(stack: &'a ImageStack, channel: usize, roi: Roi) -> Self {
        RoiMeanProvider { stack, channel, roi }
    }

    /// Provider over the whole image, the default when no region was drawn.
    pub fn full_frame(stack: &'a ImageStack, channel: usize) -> Self {
        let roi = Roi {
            x: 0,
            y: 0,
            width: stack.width(),
            height: stack.height(),
        };
        RoiMeanProvider::new(stack, channel, roi)
    }
}

impl ReferenceProvider for RoiMeanProvider<'_> {
    fn measure_region(&self, frame: usize) -> f64 {
        self.stack.region_mean(self.channel, 0, frame, &self.roi)
    }
}

/// Walk the accepted tracks in ascending track id and emit one row per
/// detection in increasing frame order. The reference statistic is resolved
/// at most once per frame.
pub fn export_measurements(
    graph: &TrackGraph,
    tracks: &[Track],
    accepted: &[TrackId],
    calibration: &Calibration,
    reference: &dyn ReferenceProvider,
    measure_channel: usize,
    mask_channel: usize,
) -> Vec<MeasurementRow> {
    let mut reference_cache: Vec<Option<f64>> = vec![None; graph.frame_count()];
    let mut rows = vec![];

    for track in tracks {
        if accepted.binary_search(&track.id).is_err() {
            continue;
        }
        for &spot_id in &track.spots {
            let spot = graph.spot(spot_id);
            let frame = spot.frame;
            let reference_mean = *reference_cache[frame]
                .get_or_insert_with(|| reference.measure_region(frame));
            let measured = spot.channels.get(measure_channel).copied().unwrap_or_default();
            let mask = spot.channels.get(mask_channel).copied().unwrap_or_default();

            rows.push(MeasurementRow {
                track_id: track.id,
                quality: spot.quality,
                position_x: spot.x * calibration.pixel_width,
                position_y: spot.y * calibration.pixel_height,
                position_t: frame as f64 * calibration.frame_interval,
                frame,
                mean_mask: mask.mean,
                mean_intensity: measured.mean,
                standard_deviation: measured.std,
                contrast: measured.contrast,
                snr: measured.snr,
                reference: reference_mean,
            });
        }
    }
    rows
}
