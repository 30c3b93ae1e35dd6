use crate::my_types::*;

/// Derived view over the track graph: one maximal chain of links. Never
/// edited directly; recomputed from the graph whenever links change.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub id: TrackId,
    /// Member spots in increasing frame order.
    pub spots: Vec<SpotId>,
    pub first_frame: usize,
    pub last_frame: usize,
}

impl Track {
    /// Track duration in frame units.
    pub fn duration(&self) -> usize {
        self.last_frame - self.first_frame
    }
}

/// Duration filter over derived tracks. Returns the accepted track ids in
/// ascending order. Pure and idempotent.
pub fn filter_tracks(tracks: &[Track], duration_threshold: f64, keep_above_or_equal: bool) -> Vec<TrackId> {
    tracks
        .iter()
        .filter(|t| {
            let d = t.duration() as f64;
            if keep_above_or_equal {
                d >= duration_threshold
            } else {
                d <= duration_threshold
            }
        })
        .map(|t| t.id)
        .collect()
}
