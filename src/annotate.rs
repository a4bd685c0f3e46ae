//! Offline annotation: run a detector over previously captured stills and
//! write one annotated video per device directory.
//!
//! Input layout matches the still sink: `{root}/images/{serial}/*.jpg`,
//! filenames sorting in capture order.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::detect::{Detection, DetectorBackend};
use crate::progress::Progress;
use crate::sink::video::AviWriter;

pub const DEFAULT_ANNOTATE_FPS: f64 = 10.0;
const ANNOTATE_JPEG_QUALITY: u8 = 85;
const BOX_COLOR: image::Rgb<u8> = image::Rgb([255, 64, 64]);

#[derive(Debug)]
pub struct AnnotateReport {
    pub serial: String,
    pub frames: u64,
    pub detections: u64,
    pub output: PathBuf,
}

/// Device subdirectories under `{root}/images`, sorted by name.
pub fn device_dirs(images_root: &Path) -> Result<Vec<String>> {
    let mut dirs = Vec::new();
    let entries = fs::read_dir(images_root)
        .with_context(|| format!("failed to read {}", images_root.display()))?;
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn frame_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry?.path();
        let is_jpeg = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
            .unwrap_or(false);
        if is_jpeg {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn draw_detection(canvas: &mut RgbImage, det: &Detection) {
    let (w, h) = (canvas.width() as f32, canvas.height() as f32);
    let x = (det.x * w) as i32;
    let y = (det.y * h) as i32;
    let bw = ((det.w * w) as u32).max(1);
    let bh = ((det.h * h) as u32).max(1);
    draw_hollow_rect_mut(canvas, Rect::at(x, y).of_size(bw, bh), BOX_COLOR);
}

/// Annotate every still in `{images_root}/{serial}` and write
/// `{output_dir}/{serial}.avi`. A directory with no stills produces a
/// warning and a report with zero frames, not an error.
pub fn annotate_device(
    images_root: &Path,
    serial: &str,
    output_dir: &Path,
    fps: f64,
    backend: &mut dyn DetectorBackend,
    progress: &mut Progress,
) -> Result<AnnotateReport> {
    let dir = images_root.join(serial);
    let frames = frame_paths(&dir)?;
    let output = output_dir.join(format!("{}.avi", serial));
    if frames.is_empty() {
        log::warn!("no images found under {}", dir.display());
        return Ok(AnnotateReport {
            serial: serial.to_string(),
            frames: 0,
            detections: 0,
            output,
        });
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let mut writer: Option<AviWriter<BufWriter<fs::File>>> = None;
    let mut written = 0u64;
    let mut detections = 0u64;

    for path in &frames {
        let img = match image::open(path) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("skipping unreadable image {}: {}", path.display(), e);
                progress.tick();
                continue;
            }
        };
        let mut canvas = img.to_rgb8();
        let (width, height) = (canvas.width(), canvas.height());

        let result = backend
            .detect(canvas.as_raw(), width, height)
            .with_context(|| format!("detection failed on {}", path.display()))?;
        for det in &result.detections {
            draw_detection(&mut canvas, det);
        }
        detections += result.detections.len() as u64;

        if writer.is_none() {
            // Video dimensions lock to the first decodable frame.
            let file = fs::File::create(&output)
                .with_context(|| format!("failed to create {}", output.display()))?;
            writer = Some(AviWriter::new(BufWriter::new(file), width, height, fps)?);
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, ANNOTATE_JPEG_QUALITY).encode(
            canvas.as_raw(),
            width,
            height,
            ExtendedColorType::Rgb8,
        )?;
        if let Some(writer) = writer.as_mut() {
            writer.write_frame(&jpeg)?;
        }
        written += 1;
        progress.tick();
    }

    match writer.as_mut() {
        Some(writer) => writer.finish()?,
        None => return Err(anyhow!("no decodable images under {}", dir.display())),
    }
    log::info!(
        "annotated {} frame(s) for '{}' -> {}",
        written,
        serial,
        output.display()
    );
    Ok(AnnotateReport {
        serial: serial.to_string(),
        frames: written,
        detections,
        output,
    })
}
