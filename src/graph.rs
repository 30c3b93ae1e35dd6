use crate::error::TrackingError;
use crate::my_types::*;
use crate::spot::{Spot, SpotCandidate};
use crate::track::Track;

/// A temporal connection between two detections. Created only by the
/// linker, immutable afterwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Link {
    pub source: SpotId,
    pub target: SpotId,
    pub cost: f64,
}

/// In-memory model of detections and links: a node arena with integer ids,
/// a per-frame index, and O(1) predecessor/successor lookup per node.
///
/// The graph owns the spots. Identity is assigned here and nowhere else.
#[derive(Debug, Default)]
pub struct TrackGraph {
    spots: Vec<Spot>,
    /// spot ids per frame; `None` marks a frame not yet populated.
    frames: Vec<Option<Vec<SpotId>>>,
    links: Vec<Link>,
    outgoing: Vec<Option<LinkId>>,
    incoming: Vec<Option<LinkId>>,
}

impl TrackGraph {
    pub fn new() -> TrackGraph {
        TrackGraph::default()
    }

    /// Commit all detections of one frame. Each frame may be populated at
    /// most once; an empty candidate list still marks the frame populated.
    pub fn add_detections(
        &mut self,
        frame: usize,
        candidates: Vec<SpotCandidate>,
    ) -> Result<std::ops::Range<SpotId>, TrackingError> {
        if frame >= self.frames.len() {
            self.frames.resize(frame + 1, None);
        }
        if self.frames[frame].is_some() {
            return Err(TrackingError::DuplicateFrame(frame));
        }

        let first = self.spots.len();
        let mut ids = Vec::with_capacity(candidates.len());
        for c in candidates {
            let id = self.spots.len();
            self.spots.push(Spot {
                id,
                frame,
                x: c.x,
                y: c.y,
                z: c.z,
                quality: c.quality,
                radius: c.radius,
                channels: c.channels,
            });
            self.outgoing.push(None);
            self.incoming.push(None);
            ids.push(id);
        }
        self.frames[frame] = Some(ids);
        Ok(first..self.spots.len())
    }

    /// Number of frames committed so far (highest frame index + 1).
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn spot_count(&self) -> usize {
        self.spots.len()
    }

    pub fn spot(&self, id: SpotId) -> &Spot {
        &self.spots[id]
    }

    /// Spot ids of one frame, in ascending id order. Empty for frames that
    /// were never populated.
    pub fn spots_in_frame(&self, frame: usize) -> &[SpotId] {
        self.frames
            .get(frame)
            .and_then(|f| f.as_deref())
            .unwrap_or(&[])
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn outgoing(&self, id: SpotId) -> Option<LinkId> {
        self.outgoing[id]
    }

    pub fn incoming(&self, id: SpotId) -> Option<LinkId> {
        self.incoming[id]
    }

    /// Record a link from `source` to `target`. The source must precede the
    /// target in time, both ids must exist and the cost must be a
    /// non-negative finite number. A second link into or out of a spot is an
    /// `AmbiguousTopology` error: the one-to-one linker never emits one.
    pub fn add_link(&mut self, source: SpotId, target: SpotId, cost: f64) -> Result<LinkId, TrackingError> {
        let invalid = |reason: &str| TrackingError::InvalidLink {
            from: source,
            to: target,
            reason: reason.to_string(),
        };
        if source >= self.spots.len() || target >= self.spots.len() {
            return Err(invalid("unknown spot id"));
        }
        if self.spots[source].frame >= self.spots[target].frame {
            return Err(invalid("source frame must precede target frame"));
        }
        if !cost.is_finite() || cost < 0. {
            return Err(invalid("link cost must be finite and non-negative"));
        }
        if self.outgoing[source].is_some() {
            return Err(TrackingError::AmbiguousTopology(source));
        }
        if self.incoming[target].is_some() {
            return Err(TrackingError::AmbiguousTopology(target));
        }

        let id = self.links.len();
        self.links.push(Link { source, target, cost });
        self.outgoing[source] = Some(id);
        self.incoming[target] = Some(id);
        Ok(id)
    }

    /// Frames skipped by a link (0 for adjacent-frame links).
    pub fn link_gap(&self, link: &Link) -> usize {
        self.spots[link.target].frame - self.spots[link.source].frame - 1
    }

    /// Derive the maximal link chains. Lazy and restartable: each call walks
    /// the current link set from scratch, so track ids are stable for a
    /// given set of links. A spot without links is not a track.
    pub fn tracks(&self) -> Tracks<'_> {
        Tracks {
            graph: self,
            cursor: 0,
            next_id: 0,
        }
    }
}

/// Iterator over derived tracks, ordered by the id of each track's first
/// spot.
pub struct Tracks<'a> {
    graph: &'a TrackGraph,
    cursor: SpotId,
    next_id: TrackId,
}

impl<'a> Iterator for Tracks<'a> {
    type Item = Track;

    fn next(&mut self) -> Option<Track> {
        while self.cursor < self.graph.spots.len() {
            let start = self.cursor;
            self.cursor += 1;
            if self.graph.incoming[start].is_some() || self.graph.outgoing[start].is_none() {
                continue;
            }

            let mut spots = vec![start];
            let mut current = start;
            while let Some(link_id) = self.graph.outgoing[current] {
                current = self.graph.links[link_id].target;
                spots.push(current);
            }

            let track = Track {
                id: self.next_id,
                first_frame: self.graph.spots[start].frame,
                last_frame: self.graph.spots[current].frame,
                spots,
            };
            self.next_id += 1;
            return Some(track);
        }
        None
    }
}
