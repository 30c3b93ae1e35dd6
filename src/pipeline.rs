use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use crate::config::TrackingConfig;
use crate::crop::{Crop, CropExtractor};
use crate::detector::Detector;
use crate::error::TrackingError;
use crate::export::{export_measurements, MeasurementRow, ReferenceProvider};
use crate::graph::TrackGraph;
use crate::linker::Linker;
use crate::my_types::*;
use crate::spot::{analyze_spot, SpotCandidate};
use crate::stack::ImageStack;
use crate::track::{filter_tracks, Track};

/// Operator decision after inspecting a tracking pass.
#[derive(Clone, Debug)]
pub enum ReviewVerdict {
    /// Accept the tracks and produce crops and measurements.
    Continue,
    /// Terminate the run without producing any output.
    Abort,
    /// Re-run tracking with a new configuration.
    Retune(TrackingConfig),
}

/// The operator review gate, a blocking call presented after each tracking
/// pass. May be invoked any number of times per run.
pub trait ReviewGate {
    fn review_tracks(&mut self, graph: &TrackGraph, tracks: &[Track], accepted: &[TrackId]) -> ReviewVerdict;
}

/// Gate that accepts the first pass, for unattended runs and tests.
pub struct AutoAccept;

impl ReviewGate for AutoAccept {
    fn review_tracks(&mut self, _: &TrackGraph, _: &[Track], _: &[TrackId]) -> ReviewVerdict {
        ReviewVerdict::Continue
    }
}

/// Terminal outputs of a completed run.
pub struct RunOutput {
    pub tracks: Vec<Track>,
    pub accepted: Vec<TrackId>,
    pub crops: Vec<Crop>,
    pub rows: Vec<MeasurementRow>,
    /// Tracks whose crop failed and was skipped.
    pub skipped_tracks: usize,
}

pub enum RunOutcome {
    Completed(RunOutput),
    /// The operator aborted; no crops or measurements were produced.
    Aborted,
}

/// One tracking pass: the populated graph plus its derived, filtered tracks.
struct TrackingPass {
    graph: TrackGraph,
    tracks: Vec<Track>,
    accepted: Vec<TrackId>,
}

/// Run states of the review loop.
enum RunState {
    Tracking,
    AwaitingReview,
    Accepted,
    Aborted,
}

/// The tracking-and-crop-extraction engine: detection, linking, filtering,
/// operator review, then crop extraction and measurement export.
pub struct TrackAndCrop<'a> {
    detector: &'a dyn Detector,
    gate: &'a mut dyn ReviewGate,
    config: TrackingConfig,
}

impl<'a> TrackAndCrop<'a> {
    pub fn new(
        detector: &'a dyn Detector,
        gate: &'a mut dyn ReviewGate,
        config: TrackingConfig,
    ) -> Result<Self> {
        validate_config(&config)?;
        Ok(TrackAndCrop {
            detector,
            gate,
            config,
        })
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Run the full pipeline on one stack. The review gate is consulted
    /// after every tracking pass; retuning repeats detection and linking
    /// with the new parameters.
    pub fn run(&mut self, stack: &ImageStack, reference: &dyn ReferenceProvider) -> Result<RunOutcome> {
        if self.config.detection_channel >= stack.channels() {
            bail!(
                "detection channel {} out of range for a {}-channel stack",
                self.config.detection_channel,
                stack.channels()
            );
        }

        let mut state = RunState::Tracking;
        let mut pass: Option<TrackingPass> = None;

        loop {
            match state {
                RunState::Tracking => {
                    pass = Some(self.tracking_pass(stack)?);
                    state = RunState::AwaitingReview;
                }
                RunState::AwaitingReview => {
                    let Some(p) = pass.as_ref() else {
                        state = RunState::Tracking;
                        continue;
                    };
                    match self.gate.review_tracks(&p.graph, &p.tracks, &p.accepted) {
                        ReviewVerdict::Continue => state = RunState::Accepted,
                        ReviewVerdict::Abort => state = RunState::Aborted,
                        ReviewVerdict::Retune(config) => {
                            validate_config(&config)?;
                            info!("retuning requested, repeating tracking pass");
                            self.config = config;
                            state = RunState::Tracking;
                        }
                    }
                }
                RunState::Accepted => {
                    let Some(p) = pass.take() else {
                        state = RunState::Tracking;
                        continue;
                    };
                    return Ok(RunOutcome::Completed(self.finalize(stack, reference, p)?));
                }
                RunState::Aborted => {
                    info!("run aborted by operator, no outputs produced");
                    return Ok(RunOutcome::Aborted);
                }
            }
        }
    }

    /// Detect on every frame, then link. All frames are committed to the
    /// graph before the linker reads any of them.
    fn tracking_pass(&self, stack: &ImageStack) -> Result<TrackingPass> {
        let mut graph = TrackGraph::new();
        for frame in 0..stack.frames() {
            let raw = self
                .detector
                .detect(stack, frame, self.config.detection_channel, &self.config);
            debug!(frame, detections = raw.len(), "frame detected");

            let mut candidates = Vec::with_capacity(raw.len());
            for r in raw {
                let channels = analyze_spot(stack, r.x, r.y, 0, frame, self.config.radius);
                candidates.push(SpotCandidate {
                    x: r.x,
                    y: r.y,
                    z: None,
                    quality: r.quality,
                    radius: self.config.radius,
                    channels,
                });
            }
            graph.add_detections(frame, candidates)?;
        }

        Linker::from_config(&self.config).link(&mut graph)?;

        let tracks: Vec<Track> = graph.tracks().collect();
        let accepted = filter_tracks(&tracks, self.config.duration_threshold, true);
        info!(
            spots = graph.spot_count(),
            tracks = tracks.len(),
            accepted = accepted.len(),
            "tracking pass complete"
        );
        Ok(TrackingPass {
            graph,
            tracks,
            accepted,
        })
    }

    /// Crop extraction and measurement export over the accepted tracks.
    /// Per-track crop failures are isolated: the track is skipped, counted
    /// and the run continues.
    fn finalize(
        &self,
        stack: &ImageStack,
        reference: &dyn ReferenceProvider,
        pass: TrackingPass,
    ) -> Result<RunOutput> {
        if pass.accepted.is_empty() {
            warn!("{}", TrackingError::EmptyTrackSet);
            return Ok(RunOutput {
                tracks: pass.tracks,
                accepted: pass.accepted,
                crops: vec![],
                rows: vec![],
                skipped_tracks: 0,
            });
        }

        let extractor = CropExtractor::from_config(&self.config);
        let mut crops = vec![];
        let mut skipped_tracks = 0;
        for &track_id in &pass.accepted {
            let Some(track) = pass.tracks.iter().find(|t| t.id == track_id) else {
                continue;
            };
            match extractor.extract(stack, &pass.graph, track) {
                Ok(crop) => crops.push(crop),
                Err(err) => {
                    warn!(track = track_id, "skipping track: {err}");
                    skipped_tracks += 1;
                }
            }
        }
        if skipped_tracks > 0 {
            warn!(skipped_tracks, "some tracks were skipped during crop extraction");
        }

        let measure_channel = 0;
        let mask_channel = usize::min(1, stack.channels() - 1);
        let rows = export_measurements(
            &pass.graph,
            &pass.tracks,
            &pass.accepted,
            &stack.calibration,
            reference,
            measure_channel,
            mask_channel,
        );

        info!(
            crops = crops.len(),
            rows = rows.len(),
            skipped_tracks,
            "run complete"
        );
        Ok(RunOutput {
            tracks: pass.tracks,
            accepted: pass.accepted,
            crops,
            rows,
            skipped_tracks,
        })
    }
}

fn validate_config(config: &TrackingConfig) -> Result<()> {
    if config.radius <= 0. {
        bail!("object radius must be positive");
    }
    if config.max_linking_distance < 0. || config.max_gap_closing_distance < 0. {
        bail!("linking distances must be non-negative");
    }
    if config.crop_width == 0 || config.crop_height == 0 {
        bail!("crop extent must be non-zero");
    }
    if config.allow_track_splitting || config.allow_track_merging {
        bail!("track splitting and merging are not supported");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_distances() {
        let config = TrackingConfig {
            max_linking_distance: -1.,
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_split_and_merge() {
        let config = TrackingConfig {
            allow_track_splitting: true,
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn accepts_defaults() {
        assert!(validate_config(&TrackingConfig::default()).is_ok());
    }
}
