use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// Per-channel tolerance used by the editor's background removal.
pub const DEFAULT_BACKGROUND_TOLERANCE: u8 = 50;

/// Naive chroma-key background removal.
///
/// Takes the top-left pixel as the background colour and makes every pixel
/// whose R, G and B each differ from it by less than `tolerance` fully
/// transparent.  Colour channels are kept; nothing is feathered.
///
/// Returns the number of pixels that were keyed out.
pub fn remove_background(pixels: &mut RgbaImage, tolerance: u8) -> usize {
    let w = pixels.width() as usize;
    if w == 0 || pixels.height() == 0 {
        return 0;
    }
    let bg = *pixels.get_pixel(0, 0);

    pixels
        .as_mut()
        .par_chunks_mut(w * 4)
        .map(|row| {
            let mut keyed = 0;
            for px in row.chunks_exact_mut(4) {
                if matches_background(px, &bg, tolerance) {
                    px[3] = 0;
                    keyed += 1;
                }
            }
            keyed
        })
        .sum()
}

#[inline]
fn matches_background(px: &[u8], bg: &Rgba<u8>, tolerance: u8) -> bool {
    px[0].abs_diff(bg[0]) < tolerance
        && px[1].abs_diff(bg[1]) < tolerance
        && px[2].abs_diff(bg[2]) < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_background_goes_transparent_foreground_stays() {
        let mut img = RgbaImage::from_fn(30, 20, |x, y| {
            if (10..20).contains(&x) && (5..15).contains(&y) {
                Rgba([20, 30, 200, 255])
            } else {
                Rgba([240, 240, 240, 255])
            }
        });
        let keyed = remove_background(&mut img, DEFAULT_BACKGROUND_TOLERANCE);
        assert_eq!(keyed, 30 * 20 - 10 * 10);
        assert_eq!(img.get_pixel(0, 19)[3], 0);
        assert_eq!(img.get_pixel(29, 0)[3], 0);
        assert_eq!(img.get_pixel(15, 10)[3], 255);
        // colour is kept under the zero alpha
        assert_eq!(img.get_pixel(3, 3)[0], 240);
    }

    #[test]
    fn tolerance_is_strict_per_channel() {
        let mut img = RgbaImage::from_fn(3, 1, |x, _| match x {
            0 => Rgba([100, 100, 100, 255]),
            1 => Rgba([149, 51, 100, 255]),
            _ => Rgba([150, 100, 100, 255]),
        });
        remove_background(&mut img, 50);
        assert_eq!(img.get_pixel(1, 0)[3], 0);
        assert_eq!(img.get_pixel(2, 0)[3], 255);
    }
}
