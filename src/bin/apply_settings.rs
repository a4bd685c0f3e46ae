//! apply_settings - open a camera, apply clamped settings, report what stuck

use anyhow::{anyhow, Result};
use clap::Parser;

use mvgrab::camera::CameraSession;
use mvgrab::settings::CameraSettings;
use mvgrab::{DeviceProvider, SyntheticProvider};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Camera serial to open (stub://NAME selects the synthetic backend).
    #[arg(long, env = "MVGRAB_SERIAL")]
    serial: String,
    /// Exposure time in microseconds (clamped to the device range).
    #[arg(long, default_value_t = 10_000.0)]
    exposure_us: f64,
    /// Analog gain in decibels (clamped to the device range).
    #[arg(long, default_value_t = 10.0)]
    gain_db: f64,
    /// Acquisition frame rate in frames per second.
    #[arg(long, default_value_t = 30.0)]
    frame_rate: f64,
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

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let settings = CameraSettings {
        serial: args.serial.clone(),
        exposure_time_us: args.exposure_us,
        gain_db: args.gain_db,
        frame_rate: args.frame_rate,
    };

    let provider = make_provider(&args.serial)?;
    let mut session = CameraSession::open(provider.as_ref(), &args.serial)?;
    let applied = session.configure(&settings)?;

    println!("serial:     {}", args.serial);
    println!("exposure:   {:.1} us", applied.exposure_time_us);
    println!("gain:       {:.1} dB", applied.gain_db);
    println!("frame rate: {:.1} fps", applied.frame_rate);
    println!("format:     {:?}", applied.format);
    println!("size:       {}x{}", applied.width, applied.height);

    session.shutdown();
    Ok(())
}
