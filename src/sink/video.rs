//! Video recording sink.
//!
//! Frames are JPEG-compressed and muxed into a minimal RIFF/AVI container
//! with an `MJPG` video stream: lossy, seekable (via the `idx1` index),
//! frames stored strictly in arrival order. The container's frame rate and
//! dimensions are fixed when the first frame arrives and never change;
//! later dimension mismatches are not validated and no resize happens
//! here.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use super::{FrameSink, SinkKind};
use crate::frame::RgbFrame;

const RECORDING_JPEG_QUALITY: u8 = 85;
const AVIF_HASINDEX: u32 = 0x0000_0010;
const AVIIF_KEYFRAME: u32 = 0x0000_0010;

/// Minimal AVI muxer for an MJPG stream.
///
/// Header sizes and frame counts are written as placeholders and patched
/// in `finish`; an unfinished file is not a valid AVI.
pub struct AviWriter<W: Write + Seek> {
    w: W,
    index: Vec<(u32, u32)>,
    pos_riff_size: u64,
    pos_total_frames: u64,
    pos_stream_length: u64,
    pos_movi_size: u64,
    movi_tag_pos: u64,
    finished: bool,
}

impl<W: Write + Seek> AviWriter<W> {
    pub fn new(mut w: W, width: u32, height: u32, fps: f64) -> Result<Self> {
        let micros_per_frame = if fps > 0.0 {
            (1_000_000.0 / fps).round() as u32
        } else {
            0
        };
        let rate = (fps * 1000.0).round() as u32;

        w.write_all(b"RIFF")?;
        let pos_riff_size = w.stream_position()?;
        w.write_all(&0u32.to_le_bytes())?;
        w.write_all(b"AVI ")?;

        // hdrl list: avih + one strl.
        w.write_all(b"LIST")?;
        w.write_all(&192u32.to_le_bytes())?;
        w.write_all(b"hdrl")?;

        w.write_all(b"avih")?;
        w.write_all(&56u32.to_le_bytes())?;
        w.write_all(&micros_per_frame.to_le_bytes())?;
        w.write_all(&0u32.to_le_bytes())?; // max bytes/sec
        w.write_all(&0u32.to_le_bytes())?; // padding granularity
        w.write_all(&AVIF_HASINDEX.to_le_bytes())?;
        let pos_total_frames = w.stream_position()?;
        w.write_all(&0u32.to_le_bytes())?; // total frames, patched
        w.write_all(&0u32.to_le_bytes())?; // initial frames
        w.write_all(&1u32.to_le_bytes())?; // streams
        w.write_all(&0u32.to_le_bytes())?; // suggested buffer size
        w.write_all(&width.to_le_bytes())?;
        w.write_all(&height.to_le_bytes())?;
        w.write_all(&[0u8; 16])?; // reserved

        w.write_all(b"LIST")?;
        w.write_all(&116u32.to_le_bytes())?;
        w.write_all(b"strl")?;

        w.write_all(b"strh")?;
        w.write_all(&56u32.to_le_bytes())?;
        w.write_all(b"vids")?;
        w.write_all(b"MJPG")?;
        w.write_all(&0u32.to_le_bytes())?; // flags
        w.write_all(&0u16.to_le_bytes())?; // priority
        w.write_all(&0u16.to_le_bytes())?; // language
        w.write_all(&0u32.to_le_bytes())?; // initial frames
        w.write_all(&1000u32.to_le_bytes())?; // scale
        w.write_all(&rate.to_le_bytes())?; // rate: frames = rate / scale
        w.write_all(&0u32.to_le_bytes())?; // start
        let pos_stream_length = w.stream_position()?;
        w.write_all(&0u32.to_le_bytes())?; // length, patched
        w.write_all(&0u32.to_le_bytes())?; // suggested buffer size
        w.write_all(&u32::MAX.to_le_bytes())?; // quality: default
        w.write_all(&0u32.to_le_bytes())?; // sample size
        w.write_all(&0u16.to_le_bytes())?; // rcFrame left
        w.write_all(&0u16.to_le_bytes())?; // rcFrame top
        w.write_all(&(width as u16).to_le_bytes())?;
        w.write_all(&(height as u16).to_le_bytes())?;

        w.write_all(b"strf")?;
        w.write_all(&40u32.to_le_bytes())?;
        w.write_all(&40u32.to_le_bytes())?; // biSize
        w.write_all(&(width as i32).to_le_bytes())?;
        w.write_all(&(height as i32).to_le_bytes())?;
        w.write_all(&1u16.to_le_bytes())?; // planes
        w.write_all(&24u16.to_le_bytes())?; // bit count
        w.write_all(b"MJPG")?;
        w.write_all(&(width * height * 3).to_le_bytes())?; // image size
        w.write_all(&[0u8; 16])?; // ppm, clr fields

        w.write_all(b"LIST")?;
        let pos_movi_size = w.stream_position()?;
        w.write_all(&0u32.to_le_bytes())?; // movi size, patched
        let movi_tag_pos = w.stream_position()?;
        w.write_all(b"movi")?;

        Ok(Self {
            w,
            index: Vec::new(),
            pos_riff_size,
            pos_total_frames,
            pos_stream_length,
            pos_movi_size,
            movi_tag_pos,
            finished: false,
        })
    }

    /// Append one JPEG-compressed frame, in arrival order.
    pub fn write_frame(&mut self, jpeg: &[u8]) -> Result<()> {
        let chunk_pos = self.w.stream_position()?;
        let offset = (chunk_pos - self.movi_tag_pos) as u32;

        self.w.write_all(b"00dc")?;
        self.w.write_all(&(jpeg.len() as u32).to_le_bytes())?;
        self.w.write_all(jpeg)?;
        if jpeg.len() % 2 == 1 {
            self.w.write_all(&[0u8])?;
        }

        self.index.push((offset, jpeg.len() as u32));
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.index.len() as u64
    }

    /// Write the index, patch sizes and counts, and flush.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }

        let idx_pos = self.w.stream_position()?;
        self.w.write_all(b"idx1")?;
        self.w
            .write_all(&((self.index.len() * 16) as u32).to_le_bytes())?;
        for &(offset, size) in &self.index {
            self.w.write_all(b"00dc")?;
            self.w.write_all(&AVIIF_KEYFRAME.to_le_bytes())?;
            self.w.write_all(&offset.to_le_bytes())?;
            self.w.write_all(&size.to_le_bytes())?;
        }
        let end = self.w.stream_position()?;

        let frames = self.index.len() as u32;
        self.patch(self.pos_riff_size, (end - 8) as u32)?;
        self.patch(self.pos_total_frames, frames)?;
        self.patch(self.pos_stream_length, frames)?;
        self.patch(self.pos_movi_size, (idx_pos - self.movi_tag_pos) as u32)?;

        self.w.seek(SeekFrom::Start(end))?;
        self.w.flush()?;
        self.finished = true;
        Ok(())
    }

    fn patch(&mut self, pos: u64, value: u32) -> Result<()> {
        self.w.seek(SeekFrom::Start(pos))?;
        self.w.write_all(&value.to_le_bytes())?;
        Ok(())
    }
}

/// Recording sink over `AviWriter`.
///
/// The container is opened lazily on the first accepted frame; that
/// frame's dimensions (and the configured frame rate) are fixed for the
/// sink's whole lifetime.
pub struct VideoSink {
    path: PathBuf,
    fps: f64,
    writer: Option<AviWriter<BufWriter<File>>>,
}

impl VideoSink {
    pub fn create(path: &Path, fps: f64) -> Self {
        Self {
            path: path.to_path_buf(),
            fps,
            writer: None,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.writer.as_ref().map_or(0, AviWriter::frames_written)
    }
}

impl FrameSink for VideoSink {
    fn name(&self) -> &'static str {
        "video"
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Recorder
    }

    fn accept(&mut self, frame: &RgbFrame) -> Result<()> {
        if self.writer.is_none() {
            let file = File::create(&self.path)
                .with_context(|| format!("create video file {}", self.path.display()))?;
            let writer =
                AviWriter::new(BufWriter::new(file), frame.width, frame.height, self.fps)?;
            log::info!(
                "recording {} ({}x{} @ {:.1} fps)",
                self.path.display(),
                frame.width,
                frame.height,
                self.fps
            );
            self.writer = Some(writer);
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, RECORDING_JPEG_QUALITY).encode(
            frame.as_bytes(),
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )?;

        // Writer is Some here: either just opened or opened on an earlier
        // frame.
        if let Some(writer) = self.writer.as_mut() {
            writer.write_frame(&jpeg)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.finish()?;
            log::info!("video saved to {}", self.path.display());
        }
        Ok(())
    }
}

impl Drop for VideoSink {
    fn drop(&mut self) {
        // Ordered teardown calls finish() explicitly; this covers panic
        // unwinds so the container still gets its index and sizes.
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.finish() {
                log::warn!("video finalize on drop failed: {e:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn container_structure_and_counts_are_patched() {
        let mut writer = AviWriter::new(Cursor::new(Vec::new()), 64, 48, 15.0).unwrap();
        // Odd-length payload checks even-byte chunk padding.
        writer.write_frame(b"\xff\xd8frame-one\xff\xd9\x00").unwrap();
        writer.write_frame(b"\xff\xd8frame-2\xff\xd9").unwrap();
        writer.finish().unwrap();
        assert_eq!(writer.frames_written(), 2);

        let bytes = writer.w.into_inner();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"AVI ");
        // Stream header: 'vids' handled by 'MJPG'.
        assert_eq!(&bytes[108..112], b"vids");
        assert_eq!(&bytes[112..116], b"MJPG");
        // avih total frames patched to 2.
        assert_eq!(u32::from_le_bytes(bytes[48..52].try_into().unwrap()), 2);
        // RIFF size covers the whole file.
        let riff_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        assert_eq!(riff_size as usize, bytes.len() - 8);
        // One idx1 entry per frame.
        let idx = bytes
            .windows(4)
            .rposition(|w| w == b"idx1")
            .expect("index present");
        let idx_size = u32::from_le_bytes(bytes[idx + 4..idx + 8].try_into().unwrap());
        assert_eq!(idx_size, 32);
    }

    #[test]
    fn first_chunk_offset_follows_movi_tag() {
        let mut writer = AviWriter::new(Cursor::new(Vec::new()), 8, 8, 10.0).unwrap();
        writer.write_frame(b"\xff\xd8x\xff\xd9\x00").unwrap();
        writer.finish().unwrap();
        assert_eq!(writer.index[0].0, 4);
    }

    #[test]
    fn finish_is_idempotent() {
        let mut writer = AviWriter::new(Cursor::new(Vec::new()), 8, 8, 10.0).unwrap();
        writer.write_frame(b"\xff\xd8x\xff\xd9\x00").unwrap();
        writer.finish().unwrap();
        let len = writer.w.get_ref().len();
        writer.finish().unwrap();
        assert_eq!(writer.w.get_ref().len(), len);
    }

    #[test]
    fn video_sink_opens_lazily_with_first_frame_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.avi");
        let mut sink = VideoSink::create(&path, 15.0);
        assert!(!path.exists());

        let frame = RgbFrame::from_rgb_bytes(16, 12, vec![200; 16 * 12 * 3]).unwrap();
        sink.accept(&frame).unwrap();
        sink.accept(&frame).unwrap();
        assert_eq!(sink.frames_written(), 2);
        sink.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        // avih dimensions match the first frame.
        assert_eq!(u32::from_le_bytes(bytes[64..68].try_into().unwrap()), 16);
        assert_eq!(u32::from_le_bytes(bytes[68..72].try_into().unwrap()), 12);
    }
}
