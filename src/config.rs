use clap::Parser;

/// Immutable per-run tracking parameters.
///
/// Distances are in pixels, the duration threshold in frame units. The
/// struct derives `clap::Parser` so a binary can flatten it into its own
/// argument set; library callers construct it directly and pass it by value.
#[derive(Debug, Clone)]
#[derive(clap::Parser)]
pub struct TrackingConfig {
    /// Expected object radius in pixels, used by the detector and the
    /// per-channel spot statistics.
    #[clap(long, default_value = "3.0")]
    pub radius: f64,

    /// Minimum detector quality for a candidate to become a detection.
    #[clap(long, default_value = "100.0")]
    pub threshold: f64,

    /// Refine detection positions to sub-pixel precision.
    #[clap(long)]
    pub subpixel: bool,

    /// Apply a 3x3 median filter to the detection plane before peak search.
    #[clap(long)]
    pub median_filter: bool,

    /// Maximum distance for adjacent-frame links.
    #[clap(long, default_value = "2.0")]
    pub max_linking_distance: f64,

    /// Maximum distance for gap-closing links (frame gap > 0).
    #[clap(long, default_value = "2.0")]
    pub max_gap_closing_distance: f64,

    /// Largest number of skipped frames a gap-closing link may bridge.
    #[clap(long, default_value = "5")]
    pub max_frame_gap: usize,

    /// Tracks shorter than this duration (in frames) are filtered out.
    #[clap(long, default_value = "10.0")]
    pub duration_threshold: f64,

    #[clap(long, default_value = "17")]
    pub crop_width: usize,

    #[clap(long, default_value = "37")]
    pub crop_height: usize,

    /// Zero-based channel index the detector runs on.
    #[clap(long, default_value = "1")]
    pub detection_channel: usize,

    // Splitting and merging are not supported by the one-to-one linker;
    // both stay false.
    #[clap(skip)]
    pub allow_track_splitting: bool,
    #[clap(skip)]
    pub allow_track_merging: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            radius: 3.0,
            threshold: 100.0,
            subpixel: false,
            median_filter: false,
            max_linking_distance: 2.0,
            max_gap_closing_distance: 2.0,
            max_frame_gap: 5,
            duration_threshold: 10.0,
            crop_width: 17,
            crop_height: 37,
            detection_channel: 1,
            allow_track_splitting: false,
            allow_track_merging: false,
        }
    }
}
