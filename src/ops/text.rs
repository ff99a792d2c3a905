use ab_glyph::{Font, FontArc, GlyphId, OutlinedGlyph, PxScale, ScaleFont, point};
use image::{Rgba, RgbaImage};

use crate::canvas::blend_over;

/// Text tool font size relative to the brush size.
pub const FONT_SIZE_PER_BRUSH: f32 = 2.0;

/// Fill parameters for a line of text.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    /// Em size in pixels.
    pub font_size: f32,
    pub color: Rgba<u8>,
    pub opacity: f32,
}

/// Pixel scale for a font so that one em is `font_size` pixels tall
/// (ab_glyph scales by ascent-to-descent height by default).
fn em_scale(font: &FontArc, font_size: f32) -> PxScale {
    match font.units_per_em() {
        Some(upem) if upem > 0.0 => PxScale::from(font_size * font.height_unscaled() / upem),
        _ => PxScale::from(font_size),
    }
}

/// Lay out a single line of text with its baseline origin at (0, 0).
/// Returns each glyph with its pen x position, plus the total advance.
pub fn layout_line(font: &FontArc, text: &str, font_size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(em_scale(font, font_size));
    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars().filter(|c| !c.is_control()) {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }

    (glyphs, cursor_x)
}

/// Fill `text` into `img` with its alphabetic baseline starting at
/// (`x`, `y`).  Returns `false` when nothing landed on the image.
pub fn draw_text(img: &mut RgbaImage, font: &FontArc, text: &str, x: f32, y: f32, style: TextStyle) -> bool {
    if text.trim().is_empty() || style.font_size <= 0.0 {
        return false;
    }
    let scale = em_scale(font, style.font_size);
    let (glyphs, _) = layout_line(font, text, style.font_size);

    let outlined: Vec<OutlinedGlyph> = glyphs
        .into_iter()
        .filter_map(|(id, gx)| font.outline_glyph(id.with_scale_and_position(scale, point(x + gx, y))))
        .collect();
    if outlined.is_empty() {
        return false;
    }

    // Union of glyph pixel bounds, clipped to the image
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for g in &outlined {
        let b = g.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }
    let x0 = (min_x.floor() as i64).max(0);
    let y0 = (min_y.floor() as i64).max(0);
    let x1 = (max_x.ceil() as i64).min(img.width() as i64);
    let y1 = (max_y.ceil() as i64).min(img.height() as i64);
    if x1 <= x0 || y1 <= y0 {
        return false;
    }
    let buf_w = (x1 - x0) as usize;
    let buf_h = (y1 - y0) as usize;

    let mut coverage = vec![0.0f32; buf_w * buf_h];
    for g in &outlined {
        let b = g.px_bounds();
        let gx0 = b.min.x as i64;
        let gy0 = b.min.y as i64;
        g.draw(|px, py, cov| {
            let cx = gx0 + px as i64 - x0;
            let cy = gy0 + py as i64 - y0;
            if cx >= 0 && cy >= 0 && (cx as usize) < buf_w && (cy as usize) < buf_h {
                let idx = cy as usize * buf_w + cx as usize;
                coverage[idx] = coverage[idx].max(cov);
            }
        });
    }

    composite_coverage(img, &coverage, buf_w, x0 as u32, y0 as u32, style.color, style.opacity)
}

/// Source-over a single-channel coverage mask (`buf_w` wide) onto `img`
/// at (`x0`, `y0`).  Returns whether any pixel was touched.
fn composite_coverage(
    img: &mut RgbaImage,
    coverage: &[f32],
    buf_w: usize,
    x0: u32,
    y0: u32,
    color: Rgba<u8>,
    opacity: f32,
) -> bool {
    if buf_w == 0 {
        return false;
    }
    let opacity = opacity.clamp(0.0, 1.0);
    let mut touched = false;
    for (i, &cov) in coverage.iter().enumerate() {
        if cov <= 0.001 {
            continue;
        }
        let px = x0 + (i % buf_w) as u32;
        let py = y0 + (i / buf_w) as u32;
        if px >= img.width() || py >= img.height() {
            continue;
        }
        let base = *img.get_pixel(px, py);
        img.put_pixel(px, py, blend_over(base, color, cov.min(1.0) * opacity));
        touched = true;
    }
    touched
}

/// Enumerate system font families, sorted and deduplicated.
pub fn enumerate_system_fonts() -> Vec<String> {
    match font_kit::source::SystemSource::new().all_families() {
        Ok(mut families) => {
            families.sort();
            families.dedup();
            families
        }
        Err(_) => Vec::new(),
    }
}

/// Load `family` from the system, falling back to the platform's default
/// sans-serif face.
pub fn load_system_font(family: &str) -> Result<FontArc, String> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::Properties;
    use font_kit::source::SystemSource;

    let source = SystemSource::new();
    let handle = source
        .select_best_match(
            &[FamilyName::Title(family.to_string()), FamilyName::SansSerif],
            &Properties::new(),
        )
        .map_err(|e| format!("No usable font for \"{}\": {}", family, e))?;

    let font_data = handle
        .load()
        .map_err(|e| format!("Failed to load font \"{}\": {}", family, e))?;
    let bytes: Vec<u8> = font_data
        .copy_font_data()
        .map(|data| (*data).clone())
        .ok_or_else(|| format!("Font \"{}\" has no readable data", family))?;
    FontArc::try_from_vec(bytes).map_err(|e| format!("Font \"{}\" is not usable: {}", family, e))
}
