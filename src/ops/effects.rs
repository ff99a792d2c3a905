// ============================================================================
// EFFECTS - vignette, grain and colour temperature
// ============================================================================
//
// These run after the composable colour filters, in this order, and each
// one only when its slider is away from neutral.  All of them are
// rayon-parallelized per row and leave alpha untouched.
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Per-pixel transform.  The closure receives (x, y, r, g, b, a) as 0..255
/// floats and returns the new channels; results are rounded and clamped.
pub(crate) fn apply_per_pixel<F>(flat: &RgbaImage, transform: F) -> RgbaImage
where
    F: Fn(u32, u32, f32, f32, f32, f32) -> (f32, f32, f32, f32) + Sync,
{
    let w = flat.width() as usize;
    let h = flat.height() as usize;
    if w == 0 || h == 0 {
        return flat.clone();
    }

    let src_raw = flat.as_raw();
    let mut dst = RgbaImage::new(w as u32, h as u32);
    let stride = w * 4;

    dst.as_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &src_raw[y * stride..(y + 1) * stride];
            for x in 0..w {
                let pi = x * 4;
                let r = row_in[pi] as f32;
                let g = row_in[pi + 1] as f32;
                let b = row_in[pi + 2] as f32;
                let a = row_in[pi + 3] as f32;
                let (nr, ng, nb, na) = transform(x as u32, y as u32, r, g, b, a);
                row_out[pi] = nr.round().clamp(0.0, 255.0) as u8;
                row_out[pi + 1] = ng.round().clamp(0.0, 255.0) as u8;
                row_out[pi + 2] = nb.round().clamp(0.0, 255.0) as u8;
                row_out[pi + 3] = na.round().clamp(0.0, 255.0) as u8;
            }
        });

    dst
}

/// Simple hash for deterministic noise.
#[inline]
fn hash_u32(mut x: u32) -> u32 {
    x = x.wrapping_mul(0x9E3779B9);
    x ^= x >> 16;
    x = x.wrapping_mul(0x85EBCA6B);
    x ^= x >> 13;
    x = x.wrapping_mul(0xC2B2AE35);
    x ^= x >> 16;
    x
}

/// Hash to f32 in [0, 1).
#[inline]
fn hash_f32(x: u32, y: u32, seed: u32) -> f32 {
    let h = hash_u32(
        x.wrapping_mul(374761393)
            .wrapping_add(y.wrapping_mul(668265263))
            .wrapping_add(seed),
    );
    (h & 0x00FFFFFF) as f32 / 16777216.0
}

// ============================================================================
// VIGNETTE
// ============================================================================

/// Darken towards the corners: a black radial gradient, transparent at the
/// centre and `amount / 100` opaque at the corner distance, multiplied over
/// the image.
pub fn vignette(flat: &RgbaImage, amount: i32) -> RgbaImage {
    let strength = (amount as f32 / 100.0).clamp(0.0, 1.0);
    let cx = flat.width() as f32 / 2.0;
    let cy = flat.height() as f32 / 2.0;
    let radius = (cx * cx + cy * cy).sqrt().max(f32::EPSILON);

    apply_per_pixel(flat, |x, y, r, g, b, a| {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        let t = ((dx * dx + dy * dy).sqrt() / radius).min(1.0);
        let keep = 1.0 - strength * t;
        (r * keep, g * keep, b * keep, a)
    })
}

// ============================================================================
// GRAIN
// ============================================================================

/// Uniform film grain: every pixel gets one delta in
/// `[-0.5, 0.5) * 255 * amount / 100`, added equally to R, G and B.
/// The same `seed` always produces the same grain.
pub fn grain(flat: &RgbaImage, amount: i32, seed: u32) -> RgbaImage {
    let strength = 255.0 * amount as f32 / 100.0;
    apply_per_pixel(flat, |x, y, r, g, b, a| {
        let n = (hash_f32(x, y, seed) - 0.5) * strength;
        (r + n, g + n, b + n, a)
    })
}

// ============================================================================
// TEMPERATURE
// ============================================================================

/// Warm (positive) adds to red and green, cool (negative) adds to blue.
pub fn temperature(flat: &RgbaImage, amount: i32) -> RgbaImage {
    let t = amount as f32 / 100.0;
    apply_per_pixel(flat, |_, _, r, g, b, a| {
        if t > 0.0 {
            (r + t * 30.0, g + t * 15.0, b, a)
        } else {
            (r, g, b + t.abs() * 30.0, a)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn grey(w: u32, h: u32, v: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255]))
    }

    #[test]
    fn warm_and_cool_shift_the_right_channels() {
        let img = grey(2, 2, 100);
        assert_eq!(*temperature(&img, 100).get_pixel(0, 0), Rgba([130, 115, 100, 255]));
        assert_eq!(*temperature(&img, -50).get_pixel(1, 1), Rgba([100, 100, 115, 255]));
        let hot = grey(1, 1, 250);
        assert_eq!(*temperature(&hot, 100).get_pixel(0, 0), Rgba([255, 255, 250, 255]));
    }

    #[test]
    fn vignette_darkens_corners_more_than_centre() {
        let img = grey(101, 101, 200);
        let out = vignette(&img, 100);
        let centre = out.get_pixel(50, 50)[0];
        let corner = out.get_pixel(0, 0)[0];
        assert!(centre >= 198, "centre {centre}");
        assert!(corner < 10, "corner {corner}");
        assert_eq!(out.get_pixel(0, 0)[3], 255);
    }

    #[test]
    fn grain_is_bounded_and_seeded() {
        let img = grey(16, 16, 128);
        let a = grain(&img, 20, 7);
        let b = grain(&img, 20, 7);
        let c = grain(&img, 20, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        for px in a.pixels() {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
            assert!((102..=154).contains(&px[0]));
            assert_eq!(px[3], 255);
        }
    }
}
