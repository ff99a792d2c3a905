use image::{Rgba, RgbaImage};

const TRANSPARENT_PIXEL: Rgba<u8> = Rgba([0, 0, 0, 0]);

// ============================================================================
// IMAGE SNAPSHOT
// ============================================================================

/// A complete copy of the pixel buffer plus its dimensions.
///
/// Snapshots handed to the history stack are never mutated again.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageSnapshot {
    pub width: u32,
    pub height: u32,
    pub pixels: RgbaImage,
}

impl ImageSnapshot {
    pub fn from_image(pixels: RgbaImage) -> Self {
        Self {
            width: pixels.width(),
            height: pixels.height(),
            pixels,
        }
    }

    pub fn memory_bytes(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

// ============================================================================
// CANVAS STATE - the drawing surface
// ============================================================================

/// The visible drawing surface: one RGBA bitmap with get/put of raw pixel
/// arrays.  Every frame the editor renders `current` + filters + shapes into
/// it and the UI uploads it as a texture whenever `generation` changes.
pub struct CanvasState {
    pub width: u32,
    pub height: u32,
    pixels: RgbaImage,
    /// Bumped on every mutation so texture uploads can be skipped when idle.
    generation: u64,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl CanvasState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: RgbaImage::new(width, height),
            generation: 0,
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        self.mark_dirty();
        &mut self.pixels
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn mark_dirty(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Resize the surface.  Like a canvas element, resizing clears it.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels = RgbaImage::new(width, height);
        self.mark_dirty();
    }

    /// Replace the whole bitmap, adopting its dimensions.
    pub fn set_image(&mut self, image: RgbaImage) {
        self.width = image.width();
        self.height = image.height();
        self.pixels = image;
        self.mark_dirty();
    }

    pub fn snapshot(&self) -> ImageSnapshot {
        ImageSnapshot::from_image(self.pixels.clone())
    }

    /// Resize to the snapshot dimensions and copy its pixels in.
    pub fn restore(&mut self, snapshot: &ImageSnapshot) {
        self.resize(snapshot.pixels.width(), snapshot.pixels.height());
        self.pixels.copy_from_slice(snapshot.pixels.as_raw());
    }

    /// Read a pixel (transparent outside the surface).
    #[inline]
    pub fn get_pixel(&self, x: i64, y: i64) -> Rgba<u8> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return TRANSPARENT_PIXEL;
        }
        *self.pixels.get_pixel(x as u32, y as u32)
    }
}

/// Copy `w × h` pixels starting at (`x`, `y`) out of `src`.  Out-of-range
/// pixels come back transparent.
pub fn extract_region(src: &RgbaImage, x: i64, y: i64, w: u32, h: u32) -> Vec<u8> {
    let mut buf = vec![0u8; (w as usize) * (h as usize) * 4];
    let (sw, sh) = (src.width() as i64, src.height() as i64);
    for dy in 0..h as i64 {
        let iy = y + dy;
        if iy < 0 || iy >= sh {
            continue;
        }
        for dx in 0..w as i64 {
            let ix = x + dx;
            if ix < 0 || ix >= sw {
                continue;
            }
            let px = src.get_pixel(ix as u32, iy as u32);
            let off = ((dy * w as i64 + dx) * 4) as usize;
            buf[off..off + 4].copy_from_slice(&px.0);
        }
    }
    buf
}

// ============================================================================
// PIXEL COMPOSITING
// ============================================================================

/// Source-over: paint `top` over `base`, with `top`'s alpha scaled by
/// `coverage` (0..1).
#[inline]
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let top_a = (top[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if top_a <= 0.0 {
        return base;
    }
    if top_a >= 1.0 {
        return Rgba([top[0], top[1], top[2], 255]);
    }

    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return TRANSPARENT_PIXEL;
    }
    let mix = |t: u8, b: u8| -> u8 {
        let c = (t as f32 * top_a + b as f32 * base_a * (1.0 - top_a)) / out_a;
        c.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        mix(top[0], base[0]),
        mix(top[1], base[1]),
        mix(top[2], base[2]),
        (out_a * 255.0).round() as u8,
    ])
}

/// Destination-out: remove `coverage` (0..1) of the pixel's alpha.
#[inline]
pub fn erase(base: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let keep = 1.0 - coverage.clamp(0.0, 1.0);
    let a = (base[3] as f32 * keep).round() as u8;
    Rgba([base[0], base[1], base[2], a])
}
