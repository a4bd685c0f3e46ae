//! Bayer demosaic.
//!
//! The sensor reads out an RGGB mosaic:
//!
//! ```text
//!   R G R G ...
//!   G B G B ...
//! ```
//!
//! Missing channels are reconstructed bilinearly from the nearest
//! same-channel neighbors, with replicate clamping at the borders. Output
//! channel order is fixed: R, G, B interleaved, row-major.

/// Reconstruct full-color RGB from an 8-bit RGGB mosaic.
///
/// `mosaic` must hold exactly `width * height` samples; backends validate
/// payload sizes before a frame reaches the decode path.
pub fn demosaic_rggb(mosaic: &[u8], width: usize, height: usize) -> Vec<u8> {
    assert!(
        mosaic.len() == width * height,
        "mosaic buffer is {} samples, expected {}",
        mosaic.len(),
        width * height
    );

    let at = |x: isize, y: isize| -> u16 {
        let x = x.clamp(0, width as isize - 1) as usize;
        let y = y.clamp(0, height as isize - 1) as usize;
        mosaic[y * width + x] as u16
    };

    let mut rgb = vec![0u8; width * height * 3];
    for y in 0..height {
        for x in 0..width {
            let (xi, yi) = (x as isize, y as isize);
            let v = at(xi, yi);
            let cross =
                || (at(xi - 1, yi) + at(xi + 1, yi) + at(xi, yi - 1) + at(xi, yi + 1)) / 4;
            let diag = || {
                (at(xi - 1, yi - 1) + at(xi + 1, yi - 1) + at(xi - 1, yi + 1) + at(xi + 1, yi + 1))
                    / 4
            };
            let horiz = || (at(xi - 1, yi) + at(xi + 1, yi)) / 2;
            let vert = || (at(xi, yi - 1) + at(xi, yi + 1)) / 2;

            let (r, g, b) = match (y & 1, x & 1) {
                // Red site.
                (0, 0) => (v, cross(), diag()),
                // Green site on a red row: red left/right, blue above/below.
                (0, 1) => (horiz(), v, vert()),
                // Green site on a blue row: red above/below, blue left/right.
                (1, 0) => (vert(), v, horiz()),
                // Blue site.
                _ => (diag(), cross(), v),
            };

            let idx = (y * width + x) * 3;
            rgb[idx] = r as u8;
            rgb[idx + 1] = g as u8;
            rgb[idx + 2] = b as u8;
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_mosaic_reconstructs_uniform_rgb() {
        let rgb = demosaic_rggb(&[77; 16], 4, 4);
        assert_eq!(rgb.len(), 4 * 4 * 3);
        assert!(rgb.iter().all(|&b| b == 77));
    }

    #[test]
    fn two_by_two_block_interpolates_with_replicate_borders() {
        // R=10 G=20
        // G=30 B=40
        let rgb = demosaic_rggb(&[10, 20, 30, 40], 2, 2);
        assert_eq!(
            rgb,
            vec![
                10, 17, 25, // red site
                15, 20, 30, // green site, red row
                20, 30, 35, // green site, blue row
                25, 32, 40, // blue site
            ]
        );
    }

    #[test]
    fn channel_order_is_r_g_b() {
        // Only red sites lit: the first output channel carries the energy
        // at red sites, the third channel stays interpolated-low there.
        let mut mosaic = vec![0u8; 16];
        for y in (0..4).step_by(2) {
            for x in (0..4).step_by(2) {
                mosaic[y * 4 + x] = 200;
            }
        }
        let rgb = demosaic_rggb(&mosaic, 4, 4);
        // Interior red site (2, 2): full energy in the first channel, all
        // of its diagonal blue neighbors dark.
        let idx = (2 * 4 + 2) * 3;
        assert_eq!(rgb[idx], 200);
        assert_eq!(rgb[idx + 2], 0);
    }
}
