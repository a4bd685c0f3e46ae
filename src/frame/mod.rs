//! Frame types.
//!
//! A camera hands the loop one `MosaicFrame` per iteration: a single
//! channel of Bayer samples, 8-bit or 10-bit-in-16. `into_rgb` takes it
//! through the fixed decode path (depth downscale, then demosaic) and
//! produces the 8-bit interleaved `RgbFrame` that sinks consume.
//!
//! No frame outlives the loop iteration that produced it; ownership moves
//! into the decode path and the decoded frame is borrowed by sinks only
//! for the duration of dispatch.

mod demosaic;
mod depth;

pub use demosaic::demosaic_rggb;
pub use depth::downscale_to_eight_bit;

/// Raw sample buffer of a mosaic frame, one sample per pixel.
#[derive(Clone, Debug)]
pub enum Samples {
    /// 8 bits per sample.
    U8(Vec<u8>),
    /// More than 8 bits per sample, left-aligned in a 16-bit container.
    U16(Vec<u16>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::U8(v) => v.len(),
            Samples::U16(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Single-channel Bayer mosaic frame as read from the sensor.
#[derive(Clone, Debug)]
pub struct MosaicFrame {
    pub width: u32,
    pub height: u32,
    pub samples: Samples,
}

impl MosaicFrame {
    /// Decode to 8-bit RGB: downscale samples deeper than 8 bits, then
    /// reconstruct full color from the RGGB mosaic.
    pub fn into_rgb(self) -> RgbFrame {
        let eight_bit = match self.samples {
            Samples::U8(v) => v,
            Samples::U16(v) => downscale_to_eight_bit(&v),
        };
        let data = demosaic_rggb(&eight_bit, self.width as usize, self.height as usize);
        RgbFrame {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

/// Decoded full-color frame, 8 bits per channel, interleaved R, G, B.
#[derive(Clone, Debug)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

impl RgbFrame {
    /// Build from an interleaved RGB buffer of exactly `width * height * 3`
    /// bytes.
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) * 3 {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Interleaved RGB bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eight_bit_mosaic_decodes_without_depth_change() {
        let frame = MosaicFrame {
            width: 2,
            height: 2,
            samples: Samples::U8(vec![100, 100, 100, 100]),
        };
        let rgb = frame.into_rgb();
        assert_eq!(rgb.width, 2);
        assert_eq!(rgb.height, 2);
        // Uniform mosaic reconstructs to a uniform image.
        assert!(rgb.as_bytes().iter().all(|&b| b == 100));
    }

    #[test]
    fn ten_bit_mosaic_is_downscaled_before_demosaic() {
        // 100 << 8 = 25600; floor(25600 / 256) = 100.
        let frame = MosaicFrame {
            width: 2,
            height: 2,
            samples: Samples::U16(vec![25_600; 4]),
        };
        let rgb = frame.into_rgb();
        assert!(rgb.as_bytes().iter().all(|&b| b == 100));
    }

    #[test]
    fn rgb_from_bytes_rejects_wrong_length() {
        assert!(RgbFrame::from_rgb_bytes(2, 2, vec![0; 11]).is_none());
        assert!(RgbFrame::from_rgb_bytes(2, 2, vec![0; 12]).is_some());
    }
}
