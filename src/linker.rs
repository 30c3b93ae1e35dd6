use tracing::debug;

use crate::assignment;
use crate::config::TrackingConfig;
use crate::error::TrackingError;
use crate::graph::TrackGraph;
use crate::my_types::*;

/// The assignment engine: connects detections into chains by solving one
/// bipartite min-cost matching per frame pair, shorter gaps first.
pub struct Linker {
    max_linking_distance: f64,
    max_gap_closing_distance: f64,
    max_frame_gap: usize,
}

impl Linker {
    pub fn new(max_linking_distance: f64, max_gap_closing_distance: f64, max_frame_gap: usize) -> Linker {
        Linker {
            max_linking_distance,
            max_gap_closing_distance,
            max_frame_gap,
        }
    }

    pub fn from_config(config: &TrackingConfig) -> Linker {
        Linker::new(
            config.max_linking_distance,
            config.max_gap_closing_distance,
            config.max_frame_gap.max(1),
        )
    }

    /// Link all frame pairs (t, t+k) for t ascending, k ascending from 1 to
    /// the maximum frame gap. A track end consumed at gap k carries an
    /// outgoing link afterwards and is therefore never offered again at a
    /// larger k.
    pub fn link(&self, graph: &mut TrackGraph) -> Result<(), TrackingError> {
        let frame_count = graph.frame_count();
        for t in 0..frame_count {
            for k in 1..=self.max_frame_gap {
                let t2 = t + k;
                if t2 >= frame_count {
                    break;
                }
                let gate = if k == 1 {
                    self.max_linking_distance
                } else {
                    self.max_gap_closing_distance
                };
                self.link_frame_pair(graph, t, t2, gate)?;
            }
        }
        debug!(links = graph.links().len(), "linking complete");
        Ok(())
    }

    fn link_frame_pair(
        &self,
        graph: &mut TrackGraph,
        t: usize,
        t2: usize,
        gate: f64,
    ) -> Result<(), TrackingError> {
        // Open track ends at t, unclaimed detections at t2. Both lists are
        // in ascending spot id order, which fixes the tie-breaking.
        let sources: Vec<SpotId> = graph
            .spots_in_frame(t)
            .iter()
            .copied()
            .filter(|&s| graph.outgoing(s).is_none())
            .collect();
        let targets: Vec<SpotId> = graph
            .spots_in_frame(t2)
            .iter()
            .copied()
            .filter(|&s| graph.incoming(s).is_none())
            .collect();
        // Empty sets are the normal initial/terminal-frame case.
        if sources.is_empty() || targets.is_empty() {
            return Ok(());
        }

        let cost = Matrixd::from_fn(sources.len(), targets.len(), |i, j| {
            graph.spot(sources[i]).distance_to(graph.spot(targets[j]))
        });
        let assignment = assignment::solve_gated(&cost, gate)?;

        for (i, j) in assignment.pairs() {
            graph.add_link(sources[i], targets[j], cost[(i, j)])?;
        }
        debug!(
            frame = t,
            gap = t2 - t - 1,
            candidates = sources.len() * targets.len(),
            linked = assignment.num_assigned(),
            "frame pair linked"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Link;
    use crate::spot::SpotCandidate;
    use crate::track::Track;

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

    fn graph_with_frames(frames: &[&[(f64, f64)]]) -> TrackGraph {
        let mut graph = TrackGraph::new();
        for (t, positions) in frames.iter().enumerate() {
            let candidates = positions.iter().map(|&(x, y)| candidate(x, y)).collect();
            graph.add_detections(t, candidates).unwrap();
        }
        graph
    }

    #[test]
    fn links_only_within_distance() {
        // frame 0: (10,10) and (50,50); frame 1: (11,11) and (90,90)
        let mut graph = graph_with_frames(&[&[(10., 10.), (50., 50.)], &[(11., 11.), (90., 90.)]]);
        Linker::new(5., 5., 1).link(&mut graph).unwrap();

        assert_eq!(graph.links().len(), 1);
        let link = graph.links()[0];
        assert_eq!((link.source, link.target), (0, 2));
        assert!((link.cost - 2f64.sqrt()).abs() < 1e-12);
        // (50,50) stays an open end, (90,90) stays a track start
        assert!(graph.outgoing(1).is_none());
        assert!(graph.incoming(3).is_none());
    }

    #[test]
    fn gap_closing_bridges_a_missed_frame() {
        let mut graph = graph_with_frames(&[&[(10., 10.)], &[], &[(11., 10.)]]);
        Linker::new(2., 2., 2).link(&mut graph).unwrap();

        assert_eq!(graph.links().len(), 1);
        let link = graph.links()[0];
        assert_eq!((link.source, link.target), (0, 1));
        assert_eq!(graph.link_gap(&link), 1);
    }

    #[test]
    fn no_gap_closing_beyond_max_frame_gap() {
        let mut graph = graph_with_frames(&[&[(10., 10.)], &[], &[], &[(10., 10.)]]);
        Linker::new(2., 2., 2).link(&mut graph).unwrap();
        assert!(graph.links().is_empty());
    }

    #[test]
    fn gap_distance_gate_differs_from_linking_gate() {
        // distance 4 between frames 0 and 2; only the gap gate allows it
        let mut graph = graph_with_frames(&[&[(10., 10.)], &[], &[(14., 10.)]]);
        Linker::new(1., 5., 2).link(&mut graph).unwrap();
        assert_eq!(graph.links().len(), 1);

        let mut graph = graph_with_frames(&[&[(10., 10.)], &[], &[(14., 10.)]]);
        Linker::new(5., 1., 2).link(&mut graph).unwrap();
        assert!(graph.links().is_empty());
    }

    #[test]
    fn shorter_gap_wins_over_longer_gap() {
        // the end at frame 0 could link to frame 1 or frame 2; k=1 is
        // resolved first and consumes it
        let mut graph = graph_with_frames(&[&[(10., 10.)], &[(10.5, 10.)], &[(10.2, 10.)]]);
        Linker::new(2., 2., 2).link(&mut graph).unwrap();

        let links: Vec<Link> = graph.links().to_vec();
        // 0 -> 1 (adjacent), then 1 -> 2 (adjacent), nothing left for gaps
        assert_eq!(links.len(), 2);
        assert_eq!((links[0].source, links[0].target), (0, 1));
        assert_eq!((links[1].source, links[1].target), (1, 2));
    }

    #[test]
    fn assignment_is_one_to_one() {
        // two close pairs; each detection must appear in exactly one link
        let mut graph = graph_with_frames(&[
            &[(10., 10.), (12., 10.)],
            &[(10.5, 10.), (12.5, 10.)],
        ]);
        Linker::new(5., 5., 1).link(&mut graph).unwrap();

        assert_eq!(graph.links().len(), 2);
        let mut sources: Vec<SpotId> = graph.links().iter().map(|l| l.source).collect();
        let mut targets: Vec<SpotId> = graph.links().iter().map(|l| l.target).collect();
        sources.dedup();
        targets.dedup();
        assert_eq!(sources.len(), 2);
        assert_eq!(targets.len(), 2);
        // total displacement is minimised: straight pairs, not crossed ones
        assert_eq!((graph.links()[0].source, graph.links()[0].target), (0, 2));
        assert_eq!((graph.links()[1].source, graph.links()[1].target), (1, 3));
    }

    #[test]
    fn relinking_identical_graphs_is_deterministic() {
        let build = || {
            graph_with_frames(&[
                &[(10., 10.), (20., 20.), (30., 30.)],
                &[(11., 10.), (19., 21.), (31., 29.)],
                &[(12., 10.), (18., 22.)],
            ])
        };
        let mut a = build();
        let mut b = build();
        let linker = Linker::new(3., 3., 2);
        linker.link(&mut a).unwrap();
        linker.link(&mut b).unwrap();
        assert_eq!(a.links(), b.links());
        assert!(!a.links().is_empty());
    }

    #[test]
    fn derived_tracks_span_the_linked_chain() {
        let mut graph = graph_with_frames(&[
            &[(10., 10.)],
            &[(10.5, 10.)],
            &[],
            &[(11., 10.)],
        ]);
        Linker::new(2., 2., 3).link(&mut graph).unwrap();

        let tracks: Vec<Track> = graph.tracks().collect();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].spots, vec![0, 1, 2]);
        assert_eq!(tracks[0].first_frame, 0);
        assert_eq!(tracks[0].last_frame, 3);
        assert_eq!(tracks[0].duration(), 3);
    }
}
