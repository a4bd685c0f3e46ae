//! mvgrabd - machine-vision capture daemon
//!
//! Opens one camera, applies clamped settings, then runs the acquisition
//! loop: decode each frame to RGB, dispatch to the enabled sinks (stills,
//! preview, recorder), and tear the device down in order on exit.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mvgrab::camera::CameraSession;
use mvgrab::config::CaptureConfig;
use mvgrab::sink::{SinkSet, StillImageSink, VideoSink};
use mvgrab::stream::{run_stream, StreamOptions};
use mvgrab::{DeviceProvider, SyntheticProvider};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Camera serial to open (stub://NAME selects the synthetic backend).
    #[arg(long)]
    serial: Option<String>,
    /// Root directory for stills and recordings.
    #[arg(long)]
    output_root: Option<PathBuf>,
    /// Exposure time in microseconds (clamped to the device range).
    #[arg(long)]
    exposure_us: Option<f64>,
    /// Analog gain in decibels (clamped to the device range).
    #[arg(long)]
    gain_db: Option<f64>,
    /// Disable the timestamped still sink.
    #[arg(long)]
    no_stills: bool,
    /// Disable the video recorder sink.
    #[arg(long)]
    no_video: bool,
    /// Show a live preview window.
    #[arg(long)]
    preview: bool,
}

fn make_provider(serial: &str) -> Result<Box<dyn DeviceProvider>> {
    if serial.starts_with("stub://") {
        return Ok(Box::new(SyntheticProvider::single(serial)));
    }
    #[cfg(feature = "camera-v4l2")]
    {
        Ok(Box::new(mvgrab::V4l2Provider::new()))
    }
    #[cfg(not(feature = "camera-v4l2"))]
    {
        Err(anyhow!(
            "serial '{}' needs a hardware backend; rebuild with --features camera-v4l2",
            serial
        ))
    }
}

fn build_sinks(cfg: &CaptureConfig) -> Result<SinkSet> {
    let mut sinks = SinkSet::new();
    if cfg.save_stills {
        sinks.push(Box::new(StillImageSink::new(
            &cfg.output_root,
            &cfg.camera.serial,
        )?));
    }
    if cfg.preview {
        #[cfg(feature = "preview")]
        {
            let title = format!("mvgrab - {}", cfg.camera.serial);
            sinks.push(Box::new(mvgrab::PreviewSink::new(
                &title,
                cfg.preview_scale,
            )));
        }
        #[cfg(not(feature = "preview"))]
        return Err(anyhow!("preview requested; rebuild with --features preview"));
    }
    if cfg.record_video {
        let videos = cfg.output_root.join("videos");
        std::fs::create_dir_all(&videos)?;
        let path = videos.join(format!(
            "{}.avi",
            mvgrab::sink::still::serial_dir_name(&cfg.camera.serial)
        ));
        sinks.push(Box::new(VideoSink::create(&path, cfg.video_fps)));
    }
    if sinks.is_empty() {
        return Err(anyhow!("all sinks disabled, nothing to do"));
    }
    Ok(sinks)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = CaptureConfig::load()?;
    if let Some(serial) = args.serial {
        cfg.camera.serial = serial;
    }
    if let Some(root) = args.output_root {
        cfg.output_root = root;
    }
    if let Some(exposure) = args.exposure_us {
        cfg.camera.exposure_time_us = exposure;
    }
    if let Some(gain) = args.gain_db {
        cfg.camera.gain_db = gain;
    }
    if args.no_stills {
        cfg.save_stills = false;
    }
    if args.no_video {
        cfg.record_video = false;
    }
    if args.preview {
        cfg.preview = true;
    }

    let provider = make_provider(&cfg.camera.serial)?;
    let sinks = build_sinks(&cfg)?;

    let mut session = CameraSession::open(provider.as_ref(), &cfg.camera.serial)?;
    let applied = session.configure(&cfg.camera)?;
    log::info!(
        "capturing {}x{} {:?} @ {:.1} fps",
        applied.width,
        applied.height,
        applied.format,
        applied.frame_rate
    );
    session.start()?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        log::info!("stop requested, finishing up");
        handler_stop.store(true, Ordering::SeqCst);
    })?;

    let options = StreamOptions {
        frame_timeout: cfg.frame_timeout,
        ..StreamOptions::default()
    };
    let stats = run_stream(session, sinks, &stop, &options);
    println!(
        "captured {} frame(s), skipped {}",
        stats.frames_processed, stats.frames_skipped
    );
    Ok(())
}
