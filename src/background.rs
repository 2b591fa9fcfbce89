//! Background whiteness probe for source photos.

use std::path::Path;

use image::RgbaImage;

pub const WHITE_THRESHOLD: u8 = 240;

const WHITE_MAJORITY: f64 = 0.8;

/// True iff the top pixel row is mostly white.
///
/// A pixel counts as white when all of R, G and B reach `threshold`; alpha
/// is ignored. The majority test is strict (`> 0.8`), so an exactly-80%
/// white row reads as non-white.
pub fn is_white_background(img: &RgbaImage, threshold: u8) -> bool {
    let width = img.width();
    if width == 0 || img.height() == 0 {
        return false;
    }
    let mut white = 0u32;
    for x in 0..width {
        let p = img.get_pixel(x, 0);
        if p.0[0] >= threshold && p.0[1] >= threshold && p.0[2] >= threshold {
            white += 1;
        }
    }
    f64::from(white) / f64::from(width) > WHITE_MAJORITY
}

/// Probe a photo on disk. Fails closed: any read or decode error reads as
/// non-white, so the cutout still runs.
pub fn file_has_white_background(path: &Path) -> bool {
    match image::open(path) {
        Ok(img) => is_white_background(&img.to_rgba8(), WHITE_THRESHOLD),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "background probe failed, assuming non-white");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn top_row(pixels: &[Rgba<u8>]) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(pixels.len() as u32, 4, Rgba([10, 10, 10, 255]));
        for (x, p) in pixels.iter().enumerate() {
            img.put_pixel(x as u32, 0, *p);
        }
        img
    }

    #[test]
    fn all_white_row_is_white() {
        let img = top_row(&[Rgba([255, 255, 255, 255]); 10]);
        assert!(is_white_background(&img, WHITE_THRESHOLD));
    }

    #[test]
    fn all_black_row_is_not_white() {
        let img = top_row(&[Rgba([0, 0, 0, 255]); 10]);
        assert!(!is_white_background(&img, WHITE_THRESHOLD));
    }

    #[test]
    fn majority_threshold_is_strict() {
        // 8 of 10 white is exactly 0.8 and must not pass.
        let mut pixels = vec![Rgba([255, 255, 255, 255]); 8];
        pixels.extend([Rgba([0, 0, 0, 255]); 2]);
        assert!(!is_white_background(&top_row(&pixels), WHITE_THRESHOLD));

        // 9 of 10 does.
        let mut pixels = vec![Rgba([255, 255, 255, 255]); 9];
        pixels.push(Rgba([0, 0, 0, 255]));
        assert!(is_white_background(&top_row(&pixels), WHITE_THRESHOLD));
    }

    #[test]
    fn channel_threshold_applies_to_all_channels() {
        // One dim channel disqualifies the pixel even with alpha 0.
        let img = top_row(&[Rgba([255, 239, 255, 0]); 10]);
        assert!(!is_white_background(&img, WHITE_THRESHOLD));
    }
}
