use anyhow::{Context as AnyhowContext, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use indicatif::ProgressStyle;
use tracing::{info, info_span, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use track_n_crop::config::TrackingConfig;
use track_n_crop::detector::LocalMaxDetector;
use track_n_crop::export::RoiMeanProvider;
use track_n_crop::pipeline::{AutoAccept, RunOutcome, TrackAndCrop};
use track_n_crop::synth::{synthetic_stack, SyntheticCell};

#[derive(Parser)]
pub struct Args {
    #[clap(short, default_value = "./out")]
    pub output_folder: String,
    #[clap(long, default_value = "0")]
    pub seed: u64,
    #[clap(long, default_value = "20")]
    pub frames: usize,
    #[clap(flatten)]
    pub config: TrackingConfig,
}

fn main() -> Result<()> {
    // parse the config
    let args = Args::parse();

    // setup logging
    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stdout_writer()))
        .with(indicatif_layer)
        .init();

    // synthetic two-channel movie: three cells drifting over noise
    let cells = [
        SyntheticCell { x0: 12., y0: 14., vx: 0.4, vy: 0.1, peak: 2000. },
        SyntheticCell { x0: 40., y0: 20., vx: -0.2, vy: 0.3, peak: 2400. },
        SyntheticCell { x0: 24., y0: 44., vx: 0.1, vy: -0.4, peak: 1800. },
    ];
    let stack = synthetic_stack(2, args.frames, 64, 64, &cells, 40, args.seed);
    info!(
        channels = stack.channels(),
        frames = stack.frames(),
        "synthetic stack ready"
    );

    // run the pipeline with an unattended review gate
    let detector = LocalMaxDetector;
    let mut gate = AutoAccept;
    let mut engine = TrackAndCrop::new(&detector, &mut gate, args.config)?;
    let reference = RoiMeanProvider::full_frame(&stack, 0);
    let outcome = engine.run(&stack, &reference)?;

    let output = match outcome {
        RunOutcome::Completed(output) => output,
        RunOutcome::Aborted => {
            info!("aborted, nothing to write");
            return Ok(());
        }
    };

    let out_dir = Path::new(&args.output_folder);
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("cannot create output folder {}", out_dir.display()))?;

    // measurement table as JSON lines, one row per (track, frame)
    let table_path = out_dir.join("measurements.jsonl");
    let mut table = BufWriter::new(File::create(&table_path)?);
    for row in &output.rows {
        serde_json::to_writer(&mut table, row)?;
        table.write_all(b"\n")?;
    }
    table.flush()?;
    info!(rows = output.rows.len(), path = %table_path.display(), "measurements written");

    // raw crop volumes, one file per accepted track
    let header_span = info_span!("header");
    header_span.pb_set_style(&ProgressStyle::default_bar());
    header_span.pb_set_length(output.crops.len() as u64);
    let header_span_enter = header_span.enter();

    for crop in &output.crops {
        let crop_path = out_dir.join(format!("crop_track_{:03}.raw", crop.track_id));
        let mut file = BufWriter::new(File::create(&crop_path)?);
        for value in crop.volume.iter() {
            file.write_all(&value.to_le_bytes())?;
        }
        file.flush()?;
        let (c, z, t, h, w) = crop.volume.dim();
        info!(
            track = crop.track_id,
            dims = format!("{c}x{z}x{t}x{h}x{w}"),
            first_frame = crop.first_frame,
            path = %crop_path.display(),
            "crop written"
        );
        Span::current().pb_inc(1);
    }

    if output.skipped_tracks > 0 {
        info!(skipped = output.skipped_tracks, "tracks skipped during crop extraction");
    }

    std::mem::drop(header_span_enter);
    std::mem::drop(header_span);

    Ok(())
}
