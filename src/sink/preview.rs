#![cfg(feature = "preview")]

//! Live preview sink.
//!
//! Shows a downscaled view of the stream in a `minifb` window. Closing the
//! window or pressing Q/Escape while it has focus requests a loop stop via
//! `poll_stop`.

use anyhow::{anyhow, Result};
use minifb::{Key, Window, WindowOptions};

use super::{FrameSink, SinkKind};
use crate::frame::RgbFrame;

pub struct PreviewSink {
    title: String,
    /// Integer downscale divisor; 5 shows the stream at 1/5 size.
    scale: u32,
    window: Option<Window>,
}

impl PreviewSink {
    pub fn new(title: &str, scale: u32) -> Self {
        Self {
            title: title.to_string(),
            scale: scale.max(1),
            window: None,
        }
    }
}

/// Nearest-neighbor downsample straight into minifb's packed ARGB layout.
fn rgb_to_argb_scaled(frame: &RgbFrame, scale: u32) -> (usize, usize, Vec<u32>) {
    let src_w = frame.width as usize;
    let out_w = (frame.width / scale).max(1) as usize;
    let out_h = (frame.height / scale).max(1) as usize;
    let bytes = frame.as_bytes();

    let mut argb = Vec::with_capacity(out_w * out_h);
    for y in 0..out_h {
        let src_y = y * scale as usize;
        for x in 0..out_w {
            let idx = (src_y * src_w + x * scale as usize) * 3;
            let r = bytes[idx] as u32;
            let g = bytes[idx + 1] as u32;
            let b = bytes[idx + 2] as u32;
            argb.push((r << 16) | (g << 8) | b);
        }
    }
    (out_w, out_h, argb)
}

impl FrameSink for PreviewSink {
    fn name(&self) -> &'static str {
        "preview"
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Preview
    }

    fn accept(&mut self, frame: &RgbFrame) -> Result<()> {
        let (w, h, argb) = rgb_to_argb_scaled(frame, self.scale);

        if self.window.is_none() {
            let window = Window::new(&self.title, w, h, WindowOptions::default())
                .map_err(|e| anyhow!("create preview window: {e}"))?;
            self.window = Some(window);
        }

        if let Some(window) = self.window.as_mut() {
            window
                .update_with_buffer(&argb, w, h)
                .map_err(|e| anyhow!("update preview window: {e}"))?;
        }
        Ok(())
    }

    fn poll_stop(&mut self) -> bool {
        match &self.window {
            Some(window) => {
                !window.is_open() || window.is_key_down(Key::Q) || window.is_key_down(Key::Escape)
            }
            None => false,
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.window = None;
        Ok(())
    }
}
