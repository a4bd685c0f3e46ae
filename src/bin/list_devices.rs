//! list_devices - enumerate cameras visible to the configured backend

use anyhow::Result;
use clap::Parser;

use mvgrab::{DeviceProvider, SyntheticProvider};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Emit the device list as JSON instead of a table.
    #[arg(long)]
    json: bool,
    /// Enumerate synthetic stub devices instead of hardware.
    #[arg(long)]
    stub: bool,
}

fn make_provider(stub: bool) -> Result<Box<dyn DeviceProvider>> {
    if stub {
        return Ok(Box::new(SyntheticProvider::single("stub://cam0")));
    }
    #[cfg(feature = "camera-v4l2")]
    {
        Ok(Box::new(mvgrab::V4l2Provider::new()))
    }
    #[cfg(not(feature = "camera-v4l2"))]
    {
        Err(anyhow::anyhow!(
            "no hardware backend compiled in; rebuild with --features camera-v4l2 or pass --stub"
        ))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let provider = make_provider(args.stub)?;
    let devices = provider.enumerate()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }
    if devices.is_empty() {
        println!("no devices found");
        return Ok(());
    }
    println!(
        "{:<4} {:<20} {:<16} {:<16} {}",
        "#", "SERIAL", "MODEL", "VENDOR", "VERSION"
    );
    for (index, dev) in devices.iter().enumerate() {
        println!(
            "{:<4} {:<20} {:<16} {:<16} {}",
            index + 1,
            dev.serial,
            dev.model,
            dev.vendor,
            dev.device_version
        );
    }
    Ok(())
}
