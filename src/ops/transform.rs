// ============================================================================
// TRANSFORM OPERATIONS - rotate, crop and aspect-ratio constraints
// ============================================================================

use std::fmt;
use std::str::FromStr;

use image::{RgbaImage, imageops};

/// Smallest crop (in either direction) the editor accepts.
pub const MIN_CROP_SIZE: u32 = 10;
/// Largest crop side; anything bigger is a runaway region, not a photo.
pub const MAX_CROP_SIZE: u32 = 8192;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotateDirection {
    /// +90°
    Clockwise,
    /// -90°
    CounterClockwise,
}

impl RotateDirection {
    pub fn degrees(&self) -> i32 {
        match self {
            RotateDirection::Clockwise => 90,
            RotateDirection::CounterClockwise => -90,
        }
    }
}

/// Rotate by ±90° about the centre.  Width and height swap.
pub fn rotate_90(src: &RgbaImage, dir: RotateDirection) -> RgbaImage {
    match dir {
        RotateDirection::Clockwise => imageops::rotate90(src),
        RotateDirection::CounterClockwise => imageops::rotate270(src),
    }
}

// ============================================================================
// CROP
// ============================================================================

/// Integer crop rectangle in image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// Normalise two corner points: origin = min corner, size = absolute
    /// extent (fractions truncated).
    pub fn from_corners(start_x: f32, start_y: f32, end_x: f32, end_y: f32) -> Self {
        Self {
            x: start_x.min(end_x).floor() as i64,
            y: start_y.min(end_y).floor() as i64,
            width: (end_x - start_x).abs() as u32,
            height: (end_y - start_y).abs() as u32,
        }
    }

    pub fn is_large_enough(&self) -> bool {
        self.width >= MIN_CROP_SIZE && self.height >= MIN_CROP_SIZE
    }

    pub fn is_within_limit(&self) -> bool {
        self.width <= MAX_CROP_SIZE && self.height <= MAX_CROP_SIZE
    }

    /// Whether any pixel of a `width × height` image falls inside the rect.
    pub fn intersects(&self, width: u32, height: u32) -> bool {
        let x1 = self.x.saturating_add(self.width as i64);
        let y1 = self.y.saturating_add(self.height as i64);
        self.x < width as i64 && self.y < height as i64 && x1 > 0 && y1 > 0
    }
}

/// Copy `rect` out of `src` into a new buffer of exactly the rect's size.
/// Parts of the rect outside `src` come out transparent.  Callers check
/// `is_within_limit` first; the output is allocated at the rect's size.
pub fn crop_region(src: &RgbaImage, rect: CropRect) -> RgbaImage {
    let mut out = RgbaImage::new(rect.width, rect.height);
    let (sw, sh) = (src.width() as i64, src.height() as i64);

    // Intersection with the source, in source coordinates
    let ix0 = rect.x.clamp(0, sw);
    let iy0 = rect.y.clamp(0, sh);
    let ix1 = (rect.x + rect.width as i64).clamp(0, sw);
    let iy1 = (rect.y + rect.height as i64).clamp(0, sh);
    if ix1 <= ix0 || iy1 <= iy0 {
        return out;
    }

    let sub = imageops::crop_imm(src, ix0 as u32, iy0 as u32, (ix1 - ix0) as u32, (iy1 - iy0) as u32);
    imageops::replace(&mut out, &sub.to_image(), ix0 - rect.x, iy0 - rect.y);
    out
}

// ============================================================================
// ASPECT RATIO
// ============================================================================

/// Crop/select aspect-ratio constraint, written "free" or "A:B".
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum AspectRatio {
    #[default]
    Free,
    /// Label numerator and denominator; the ratio is `a / b`.
    Fixed { a: f32, b: f32 },
}

impl AspectRatio {
    /// The presets offered in the crop panel.
    pub fn presets() -> &'static [&'static str] {
        &["free", "1:1", "4:3", "3:2", "16:9", "9:16"]
    }

    pub fn ratio(&self) -> Option<f32> {
        match self {
            AspectRatio::Free => None,
            AspectRatio::Fixed { a, b } => Some(a / b),
        }
    }

    /// Constrain a drag from the region start by (`dx`, `dy`).
    ///
    /// The larger absolute extent drives the other one, and each axis keeps
    /// the sign of the pointer's direction from the start point.
    pub fn constrain(&self, dx: f32, dy: f32) -> (f32, f32) {
        let Some(ratio) = self.ratio() else {
            return (dx, dy);
        };
        let (mut w, mut h) = (dx, dy);
        if w.abs() > h.abs() {
            h = w / ratio;
        } else {
            w = h * ratio;
        }
        if dx < 0.0 {
            w = -w.abs();
        } else {
            w = w.abs();
        }
        if dy < 0.0 {
            h = -h.abs();
        } else {
            h = h.abs();
        }
        (w, h)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AspectRatio::Free => write!(f, "free"),
            AspectRatio::Fixed { a, b } => write!(f, "{}:{}", a, b),
        }
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    /// Accepts "free" (any case) or "A:B" with finite, positive A and B.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("free") {
            return Ok(AspectRatio::Free);
        }
        let (a, b) = s
            .split_once(':')
            .ok_or_else(|| format!("\"{}\" is not of the form A:B", s))?;
        let parse = |part: &str| -> Result<f32, String> {
            let v: f32 = part
                .trim()
                .parse()
                .map_err(|_| format!("\"{}\" is not a number", part.trim()))?;
            if v.is_finite() && v > 0.0 {
                Ok(v)
            } else {
                Err(format!("\"{}\" must be a positive number", part.trim()))
            }
        };
        Ok(AspectRatio::Fixed { a: parse(a)?, b: parse(b)? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn numbered(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([x as u8, y as u8, (x * 7 + y) as u8, 255]))
    }

    #[test]
    fn two_clockwise_turns_equal_a_half_turn() {
        let img = numbered(7, 4);
        let once = rotate_90(&img, RotateDirection::Clockwise);
        assert_eq!(once.dimensions(), (4, 7));
        let twice = rotate_90(&once, RotateDirection::Clockwise);
        assert_eq!(twice, imageops::rotate180(&img));
        assert_eq!(twice.dimensions(), (7, 4));
    }

    #[test]
    fn counter_clockwise_undoes_clockwise() {
        let img = numbered(5, 3);
        let back = rotate_90(&rotate_90(&img, RotateDirection::Clockwise), RotateDirection::CounterClockwise);
        assert_eq!(back, img);
    }

    #[test]
    fn crop_rect_normalises_corners() {
        let rect = CropRect::from_corners(50.0, 40.0, 20.5, 10.0);
        assert_eq!(rect, CropRect { x: 20, y: 10, width: 29, height: 30 });
        assert!(rect.is_large_enough());
        assert!(!CropRect::from_corners(0.0, 0.0, 9.0, 50.0).is_large_enough());
    }

    #[test]
    fn runaway_and_disjoint_regions_are_detected() {
        let huge = CropRect::from_corners(0.0, 0.0, 4294967295.0, 4294967295.0);
        assert_eq!(huge.width, u32::MAX);
        assert!(!huge.is_within_limit());
        assert!(huge.intersects(50, 50));

        let rect = CropRect { x: 45, y: -5, width: 10, height: 10 };
        assert!(rect.is_within_limit());
        assert!(rect.intersects(50, 50));
        assert!(!CropRect { x: 50, y: 0, width: 10, height: 10 }.intersects(50, 50));
        assert!(!CropRect { x: -10, y: 0, width: 10, height: 10 }.intersects(50, 50));
        assert!(!CropRect { x: i64::MAX, y: 0, width: u32::MAX, height: 10 }.intersects(50, 50));
    }

    #[test]
    fn crop_copies_pixels_and_pads_outside() {
        let img = numbered(20, 20);
        let out = crop_region(&img, CropRect { x: 15, y: 2, width: 10, height: 10 });
        assert_eq!(out.dimensions(), (10, 10));
        assert_eq!(*out.get_pixel(0, 0), *img.get_pixel(15, 2));
        assert_eq!(*out.get_pixel(4, 9), *img.get_pixel(19, 11));
        assert_eq!(out.get_pixel(5, 0)[3], 0);
    }

    #[test]
    fn parses_ratios() {
        assert_eq!("free".parse::<AspectRatio>(), Ok(AspectRatio::Free));
        assert_eq!(" 16:9 ".parse::<AspectRatio>(), Ok(AspectRatio::Fixed { a: 16.0, b: 9.0 }));
        assert!("abc".parse::<AspectRatio>().is_err());
        assert!("4:0".parse::<AspectRatio>().is_err());
        assert!("4:-3".parse::<AspectRatio>().is_err());
        assert!("4:x".parse::<AspectRatio>().is_err());
        assert_eq!(AspectRatio::Fixed { a: 3.0, b: 2.0 }.to_string(), "3:2");
    }

    #[test]
    fn constrain_uses_larger_extent_and_keeps_signs() {
        let r: AspectRatio = "2:1".parse().unwrap();
        assert_eq!(r.constrain(100.0, 10.0), (100.0, 50.0));
        assert_eq!(r.constrain(-100.0, 10.0), (-100.0, 50.0));
        assert_eq!(r.constrain(10.0, -40.0), (80.0, -40.0));
        assert_eq!(AspectRatio::Free.constrain(-3.0, 4.0), (-3.0, 4.0));
    }
}
