//! Still-image sink.
//!
//! Writes each frame as an individual JPEG under a per-device directory:
//! `{root}/images/{serial}/{timestamp}.jpg`. Timestamps carry microsecond
//! precision so filenames stay unique at capture rate, and filename order
//! is capture order, which the offline annotation pass relies on.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use super::{FrameSink, SinkKind};
use crate::frame::RgbFrame;

const JPEG_QUALITY: u8 = 90;
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// Replace path-hostile characters so a serial can name a directory.
pub fn serial_dir_name(serial: &str) -> String {
    serial
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

pub struct StillImageSink {
    dir: PathBuf,
}

impl StillImageSink {
    /// Create the per-device directory and the sink writing into it.
    pub fn new(root: &Path, serial: &str) -> Result<Self> {
        let dir = root.join("images").join(serial_dir_name(serial));
        fs::create_dir_all(&dir)
            .with_context(|| format!("create still directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FrameSink for StillImageSink {
    fn name(&self) -> &'static str {
        "stills"
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Still
    }

    fn accept(&mut self, frame: &RgbFrame) -> Result<()> {
        let path = self
            .dir
            .join(format!("{}.jpg", Local::now().format(TIMESTAMP_FORMAT)));
        let file = File::create(&path)
            .with_context(|| format!("create still {}", path.display()))?;
        let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), JPEG_QUALITY);
        encoder
            .encode(
                frame.as_bytes(),
                frame.width,
                frame.height,
                ExtendedColorType::Rgb8,
            )
            .with_context(|| format!("encode still {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_decodable_jpegs_under_device_directory() {
        let root = tempfile::tempdir().unwrap();
        let mut sink = StillImageSink::new(root.path(), "CCA24130001").unwrap();
        assert!(sink.dir().ends_with("images/CCA24130001"));

        let frame = RgbFrame::from_rgb_bytes(8, 6, vec![128; 8 * 6 * 3]).unwrap();
        sink.accept(&frame).unwrap();

        let entries: Vec<_> = fs::read_dir(sink.dir()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let path = entries[0].as_ref().unwrap().path();
        assert_eq!(path.extension().unwrap(), "jpg");

        let decoded = image::open(&path).unwrap();
        assert_eq!(decoded.width(), 8);
        assert_eq!(decoded.height(), 6);
    }

    #[test]
    fn stub_serials_map_to_safe_directory_names() {
        assert_eq!(serial_dir_name("stub://cam0"), "stub___cam0");
        assert_eq!(serial_dir_name("CCA24130001"), "CCA24130001");
    }
}
