use thiserror::Error;

use crate::my_types::*;

/// Failure taxonomy for tracking and crop extraction.
///
/// Graph and linking errors mean the model is not self-consistent and abort
/// the run. `OutOfBoundsCrop` is recoverable: the affected track is skipped
/// and the run continues. `EmptyTrackSet` is reported but the run still ends
/// normally with empty outputs.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("frame {0} already has detections")]
    DuplicateFrame(usize),

    #[error("invalid link {from} -> {to}: {reason}")]
    InvalidLink {
        from: SpotId,
        to: SpotId,
        reason: String,
    },

    #[error("spot {0} would carry more than one incoming or outgoing link")]
    AmbiguousTopology(SpotId),

    #[error("assignment solver: {0}")]
    AssignmentSolver(String),

    #[error("all tracks were filtered out")]
    EmptyTrackSet,

    #[error("crop for track {track} lies fully outside the source image at frame {frame}")]
    OutOfBoundsCrop { track: TrackId, frame: usize },
}
