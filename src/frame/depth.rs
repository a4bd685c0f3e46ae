//! Bit-depth downscale.

/// Divisor applied when reducing >8-bit samples to 8 bits.
///
/// Samples arrive left-aligned in a 16-bit container, so dividing the full
/// container value by 256 maps the high byte straight through. The
/// transform is `floor(value / 256)`, clamped to [0, 255]; it is lossy and
/// deterministic, not a calibration.
pub const DEPTH_DIVISOR: u16 = 256;

/// Reduce 16-bit-container samples to 8 bits by integer division.
pub fn downscale_to_eight_bit(samples: &[u16]) -> Vec<u8> {
    samples
        .iter()
        .map(|&v| (v / DEPTH_DIVISOR).min(255) as u8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_values_are_exact() {
        assert_eq!(downscale_to_eight_bit(&[0]), vec![0]);
        assert_eq!(downscale_to_eight_bit(&[255 * 256]), vec![255]);
        assert_eq!(downscale_to_eight_bit(&[65_535]), vec![255]);
    }

    #[test]
    fn division_floors() {
        assert_eq!(downscale_to_eight_bit(&[255]), vec![0]);
        assert_eq!(downscale_to_eight_bit(&[256]), vec![1]);
        assert_eq!(downscale_to_eight_bit(&[511]), vec![1]);
        assert_eq!(downscale_to_eight_bit(&[512]), vec![2]);
    }

    #[test]
    fn output_stays_in_byte_range() {
        let out = downscale_to_eight_bit(&[0, 1_000, 30_000, 65_535]);
        assert_eq!(out, vec![0, 3, 117, 255]);
    }
}
