//! process_frames - annotate captured stills offline, one video per device
//!
//! Walks `{root}/images/{serial}/*.jpg` in sorted order, runs the selected
//! detector over each frame, draws the boxes, and writes `{serial}.avi`.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use mvgrab::annotate::{annotate_device, device_dirs, DEFAULT_ANNOTATE_FPS};
use mvgrab::detect::create_backend;
use mvgrab::progress::Progress;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Capture root containing the images/ directory.
    #[arg(long, env = "MVGRAB_OUTPUT_ROOT", default_value = "capture")]
    root: PathBuf,
    /// Directory for the annotated videos (defaults to {root}/annotated).
    #[arg(long)]
    output: Option<PathBuf>,
    /// Detector backend name (stub, tract).
    #[arg(long, default_value = "stub")]
    backend: String,
    /// Model file for backends that need one.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Detector input size (square) for model backends.
    #[arg(long, default_value_t = 640)]
    input_size: u32,
    /// Playback rate of the annotated videos.
    #[arg(long, default_value_t = DEFAULT_ANNOTATE_FPS)]
    fps: f64,
    /// Annotate only this device directory.
    #[arg(long)]
    serial: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let images_root = args.root.join("images");
    let output_dir = args
        .output
        .unwrap_or_else(|| args.root.join("annotated"));
    let serials = match args.serial {
        Some(serial) => vec![serial],
        None => device_dirs(&images_root)?,
    };
    if serials.is_empty() {
        println!("no device directories under {}", images_root.display());
        return Ok(());
    }

    let mut backend = create_backend(
        &args.backend,
        args.model.as_deref(),
        args.input_size,
        args.input_size,
    )?;
    backend.warm_up()?;
    let is_tty = std::io::stderr().is_terminal();

    let mut total_frames = 0u64;
    for serial in &serials {
        let count = std::fs::read_dir(images_root.join(serial))
            .map(|entries| entries.count() as u64)
            .unwrap_or(0);
        let mut progress = Progress::frames(serial, count, is_tty);
        let report = annotate_device(
            &images_root,
            serial,
            &output_dir,
            args.fps,
            backend.as_mut(),
            &mut progress,
        )?;
        progress.done(&format!(
            "{}: {} frame(s), {} detection(s)",
            serial, report.frames, report.detections
        ));
        if report.frames > 0 {
            println!(
                "{} -> {} ({} frames, {} detections)",
                serial,
                report.output.display(),
                report.frames,
                report.detections
            );
        }
        total_frames += report.frames;
    }
    println!(
        "annotated {} frame(s) across {} device(s)",
        total_frames,
        serials.len()
    );
    Ok(())
}
