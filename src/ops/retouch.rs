// ============================================================================
// RETOUCH BRUSH - local smoothing with radial falloff
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use crate::canvas::extract_region;

/// Retouch brush parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetouchParams {
    /// Brush radius in pixels.
    pub radius: f32,
    /// 0..1 blend strength at the centre of the brush.
    pub intensity: f32,
    /// Half-width of the square averaging neighbourhood.
    pub softness: u32,
}

/// Apply one retouch dab centred on (`x`, `y`).
///
/// Works on the square `[x - r, x + r)` clipped to the image.  Each pixel
/// within `r` of the centre is pulled toward the mean colour of its
/// `(2 * softness + 1)²` neighbourhood (clipped to the square) by
/// `intensity * (1 - d / r)`.  Neighbour means are read from an untouched
/// copy of the square, so the result does not depend on visiting order.
/// Alpha is left alone.
pub fn retouch_dab(img: &mut RgbaImage, x: f32, y: f32, params: RetouchParams) {
    let radius = params.radius;
    if radius < 1.0 || params.intensity <= 0.0 {
        return;
    }
    let (w, h) = (img.width() as i64, img.height() as i64);
    let cx = x.floor() as i64;
    let cy = y.floor() as i64;
    let r = radius.floor() as i64;

    let x0 = (cx - r).max(0);
    let y0 = (cy - r).max(0);
    let x1 = (cx + r).min(w);
    let y1 = (cy + r).min(h);
    if x1 <= x0 || y1 <= y0 {
        return;
    }
    let rw = (x1 - x0) as usize;
    let rh = (y1 - y0) as usize;
    let stride = w as usize * 4;
    let soft = params.softness as i64;
    let intensity = params.intensity.clamp(0.0, 1.0);

    // Untouched copy of the region
    let region = extract_region(img, x0, y0, rw as u32, rh as u32);

    // Centre in region coordinates
    let lcx = (cx - x0) as f32;
    let lcy = (cy - y0) as f32;

    img.as_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .skip(y0 as usize)
        .take(rh)
        .for_each(|(row, row_buf)| {
            let py = row as i64 - y0;
            for px in 0..rw as i64 {
                let dist = ((px as f32 - lcx).powi(2) + (py as f32 - lcy).powi(2)).sqrt();
                if dist > radius {
                    continue;
                }
                let falloff = (1.0 - dist / radius).max(0.0);
                let mix = intensity * falloff;
                if mix <= 0.0 {
                    continue;
                }

                let mut sum = [0u32; 3];
                let mut count = 0u32;
                for ny in (py - soft).max(0)..=(py + soft).min(rh as i64 - 1) {
                    for nx in (px - soft).max(0)..=(px + soft).min(rw as i64 - 1) {
                        let ni = (ny as usize * rw + nx as usize) * 4;
                        sum[0] += region[ni] as u32;
                        sum[1] += region[ni + 1] as u32;
                        sum[2] += region[ni + 2] as u32;
                        count += 1;
                    }
                }
                if count == 0 {
                    continue;
                }

                let li = (py as usize * rw + px as usize) * 4;
                let di = (x0 as usize + px as usize) * 4;
                for c in 0..3 {
                    let avg = sum[c] as f32 / count as f32;
                    let orig = region[li + c] as f32;
                    row_buf[di + c] = (orig * (1.0 - mix) + avg * mix).round().clamp(0.0, 255.0) as u8;
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn params(radius: f32, intensity: f32, softness: u32) -> RetouchParams {
        RetouchParams { radius, intensity, softness }
    }

    #[test]
    fn flat_image_is_unchanged() {
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([80, 120, 160, 255]));
        let before = img.clone();
        retouch_dab(&mut img, 10.0, 10.0, params(6.0, 1.0, 2));
        assert_eq!(img, before);
    }

    #[test]
    fn softens_a_hard_edge_near_the_centre_only() {
        // Left half black, right half white
        let mut img = RgbaImage::from_fn(40, 40, |x, _| {
            if x < 20 { Rgba([0, 0, 0, 255]) } else { Rgba([255, 255, 255, 255]) }
        });
        retouch_dab(&mut img, 20.0, 20.0, params(10.0, 1.0, 2));

        let edge = img.get_pixel(20, 20)[0];
        assert!(edge > 0 && edge < 255, "edge {edge}");
        // Outside the brush square nothing changes
        assert_eq!(img.get_pixel(20, 5)[0], 255);
        assert_eq!(img.get_pixel(5, 20)[0], 0);
        // Alpha untouched
        assert!(img.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn dab_at_the_border_is_clipped() {
        let mut img = RgbaImage::from_fn(10, 10, |x, y| Rgba([(x * 25) as u8, (y * 25) as u8, 0, 255]));
        retouch_dab(&mut img, 0.0, 0.0, params(5.0, 0.5, 3));
        retouch_dab(&mut img, 9.5, 9.5, params(5.0, 0.5, 3));
        retouch_dab(&mut img, -50.0, -50.0, params(5.0, 0.5, 3));
    }

    #[test]
    fn zero_intensity_is_a_no_op() {
        let mut img = RgbaImage::from_fn(10, 10, |x, _| Rgba([(x * 25) as u8, 0, 0, 255]));
        let before = img.clone();
        retouch_dab(&mut img, 5.0, 5.0, params(4.0, 0.0, 1));
        assert_eq!(img, before);
    }
}
