// ============================================================================
// IMAGE FILTERS - the non-destructive slider stack
// ============================================================================
//
// `FilterSettings::render` always starts again from the buffer it is handed
// (the session's `current` image) so slider changes never accumulate.
// The composable part behaves like a CSS filter chain:
//   brightness → contrast → saturate → hue-rotate → blur
// followed by vignette, grain and temperature.
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ops::effects;

/// Named slider values; 0 is neutral for every one of them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSettings {
    pub brightness: i32,
    pub contrast: i32,
    pub saturation: i32,
    pub hue: i32,
    pub blur: i32,
    pub vignette: i32,
    pub grain: i32,
    pub temperature: i32,
}

/// One slider of [`FilterSettings`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Brightness,
    Contrast,
    Saturation,
    Hue,
    Blur,
    Vignette,
    Grain,
    Temperature,
}

impl FilterKind {
    pub fn all() -> &'static [FilterKind] {
        &[
            FilterKind::Brightness,
            FilterKind::Contrast,
            FilterKind::Saturation,
            FilterKind::Hue,
            FilterKind::Blur,
            FilterKind::Vignette,
            FilterKind::Grain,
            FilterKind::Temperature,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            FilterKind::Brightness => "Brightness",
            FilterKind::Contrast => "Contrast",
            FilterKind::Saturation => "Saturation",
            FilterKind::Hue => "Hue",
            FilterKind::Blur => "Blur",
            FilterKind::Vignette => "Vignette",
            FilterKind::Grain => "Grain",
            FilterKind::Temperature => "Temperature",
        }
    }

    /// Slider range (inclusive).
    pub fn range(&self) -> (i32, i32) {
        match self {
            FilterKind::Brightness | FilterKind::Contrast | FilterKind::Saturation => (-100, 100),
            FilterKind::Hue => (-180, 180),
            FilterKind::Blur => (0, 20),
            FilterKind::Vignette | FilterKind::Grain => (0, 100),
            FilterKind::Temperature => (-100, 100),
        }
    }
}

impl FilterSettings {
    pub fn get(&self, kind: FilterKind) -> i32 {
        match kind {
            FilterKind::Brightness => self.brightness,
            FilterKind::Contrast => self.contrast,
            FilterKind::Saturation => self.saturation,
            FilterKind::Hue => self.hue,
            FilterKind::Blur => self.blur,
            FilterKind::Vignette => self.vignette,
            FilterKind::Grain => self.grain,
            FilterKind::Temperature => self.temperature,
        }
    }

    /// Set one slider, clamped to its range.
    pub fn set(&mut self, kind: FilterKind, value: i32) {
        let (lo, hi) = kind.range();
        let value = value.clamp(lo, hi);
        match kind {
            FilterKind::Brightness => self.brightness = value,
            FilterKind::Contrast => self.contrast = value,
            FilterKind::Saturation => self.saturation = value,
            FilterKind::Hue => self.hue = value,
            FilterKind::Blur => self.blur = value,
            FilterKind::Vignette => self.vignette = value,
            FilterKind::Grain => self.grain = value,
            FilterKind::Temperature => self.temperature = value,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }

    /// Render `src` through every active filter.  `grain_seed` picks the
    /// noise pattern.
    pub fn render(&self, src: &RgbaImage, grain_seed: u32) -> RgbaImage {
        let mut out = self.apply_color_chain(src);
        if self.blur > 0 {
            out = parallel_gaussian_blur(&out, self.blur as f32);
        }
        if self.vignette > 0 {
            out = effects::vignette(&out, self.vignette);
        }
        if self.grain > 0 {
            out = effects::grain(&out, self.grain, grain_seed);
        }
        if self.temperature != 0 {
            out = effects::temperature(&out, self.temperature);
        }
        out
    }

    /// brightness → contrast → saturate → hue-rotate, each clamped to
    /// [0, 255] before the next, as separate filter functions would be.
    fn apply_color_chain(&self, src: &RgbaImage) -> RgbaImage {
        let brightness = (100 + self.brightness) as f32 / 100.0;
        let contrast = (100 + self.contrast) as f32 / 100.0;
        let saturate = saturate_matrix((100 + self.saturation) as f32 / 100.0);
        let hue = hue_rotate_matrix(self.hue as f32);
        let (do_b, do_c, do_s, do_h) = (
            self.brightness != 0,
            self.contrast != 0,
            self.saturation != 0,
            self.hue != 0,
        );
        if !(do_b || do_c || do_s || do_h) {
            return src.clone();
        }

        effects::apply_per_pixel(src, |_, _, r, g, b, a| {
            let mut c = [r / 255.0, g / 255.0, b / 255.0];
            if do_b {
                c = c.map(|v| (v * brightness).clamp(0.0, 1.0));
            }
            if do_c {
                c = c.map(|v| ((v - 0.5) * contrast + 0.5).clamp(0.0, 1.0));
            }
            if do_s {
                c = apply_matrix(&saturate, c);
            }
            if do_h {
                c = apply_matrix(&hue, c);
            }
            (c[0] * 255.0, c[1] * 255.0, c[2] * 255.0, a)
        })
    }
}

fn apply_matrix(m: &[[f32; 3]; 3], c: [f32; 3]) -> [f32; 3] {
    let mut out = [0.0f32; 3];
    for (row, o) in m.iter().zip(out.iter_mut()) {
        *o = (row[0] * c[0] + row[1] * c[1] + row[2] * c[2]).clamp(0.0, 1.0);
    }
    out
}

/// Filter Effects `saturate()` matrix.
fn saturate_matrix(s: f32) -> [[f32; 3]; 3] {
    [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ]
}

/// Filter Effects `hue-rotate()` matrix.
fn hue_rotate_matrix(degrees: f32) -> [[f32; 3]; 3] {
    let (sin, cos) = degrees.to_radians().sin_cos();
    [
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
        ],
    ]
}

// ---------------------------------------------------------------------------
//  Parallel separable Gaussian blur (rayon)
// ---------------------------------------------------------------------------

/// Build a 1-D Gaussian kernel truncated at ceil(3*sigma).
fn build_gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil() as usize;
    if radius == 0 {
        return vec![1.0];
    }
    let len = radius * 2 + 1;
    let s2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..len)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / s2).exp()
        })
        .collect();
    let inv = 1.0 / kernel.iter().sum::<f32>();
    for v in &mut kernel {
        *v *= inv;
    }
    kernel
}

/// Rayon-parallelized separable Gaussian blur with clamped edges.
pub fn parallel_gaussian_blur(src: &RgbaImage, sigma: f32) -> RgbaImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 || sigma <= 0.0 {
        return src.clone();
    }

    let kernel = build_gaussian_kernel(sigma);
    let radius = kernel.len() / 2;
    let buf_in: Vec<f32> = src.as_raw().iter().map(|&b| b as f32).collect();
    let pixel_count = w * h * 4;

    // --- Horizontal pass (parallel by row) ---
    let mut buf_h = vec![0.0f32; pixel_count];
    buf_h.par_chunks_mut(w * 4).enumerate().for_each(|(y, row_out)| {
        let row_in_start = y * w * 4;
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sx = (x as isize + ki as isize - radius as isize).clamp(0, w as isize - 1) as usize;
                let idx = row_in_start + sx * 4;
                for c in 0..4 {
                    acc[c] += buf_in[idx + c] * kv;
                }
            }
            row_out[x * 4..x * 4 + 4].copy_from_slice(&acc);
        }
    });

    // --- Vertical pass (parallel by row) ---
    let mut dst = RgbaImage::new(w as u32, h as u32);
    dst.as_mut().par_chunks_mut(w * 4).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sy = (y as isize + ki as isize - radius as isize).clamp(0, h as isize - 1) as usize;
                let idx = sy * w * 4 + x * 4;
                for c in 0..4 {
                    acc[c] += buf_h[idx + c] * kv;
                }
            }
            for c in 0..4 {
                row_out[x * 4 + c] = acc[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    dst
}
