use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{blend_over, erase};

/// Side length of a resize handle square, and the hit-box half-extent.
pub const HANDLE_SIZE: f32 = 8.0;
/// Maximum distance from a line for a click to select it.
const LINE_HIT_DISTANCE: f32 = 10.0;
/// Gap between a selected shape and its dashed highlight.
const HIGHLIGHT_OFFSET: f32 = 5.0;
const HIGHLIGHT_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const HANDLE_OUTLINE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Vector overlay primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Rectangle,
    Circle,
    Line,
}

impl ShapeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "Rectangle",
            ShapeKind::Circle => "Circle",
            ShapeKind::Line => "Line",
        }
    }
}

/// Stable identity of a shape in a [`ShapeRegistry`].  Ids are never reused,
/// so a stale id simply fails lookup after the list is cleared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(u64);

/// Which defining point(s) a resize drag moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeHandle {
    /// Moves the start point (line: its first endpoint).
    TopLeft,
    /// Moves end x and start y.
    TopRight,
    /// Moves start x and end y.
    BottomLeft,
    /// Moves the end point (line: its second endpoint).
    BottomRight,
    /// One of a circle's four cardinal handles: the end point follows the
    /// pointer, so the radius becomes the pointer's distance from the centre.
    Rim,
}

/// A vector overlay drawn on top of the pixel buffer.
///
/// Rectangles span `start` to `end`.  Circles are centred on `start` with a
/// radius of `|end - start|`.  Lines run from `start` to `end`.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub kind: ShapeKind,
    pub start_x: f32,
    pub start_y: f32,
    pub end_x: f32,
    pub end_y: f32,
    pub color: Rgba<u8>,
    pub line_width: f32,
    pub opacity: f32,
}

impl Shape {
    pub fn radius(&self) -> f32 {
        (self.end_x - self.start_x).hypot(self.end_y - self.start_y)
    }

    /// Rectangle: inclusive bounding box.  Circle: centre distance within the
    /// radius.  Line: closer than 10px to the segment.
    pub fn hit(&self, x: f32, y: f32) -> bool {
        match self.kind {
            ShapeKind::Rectangle => {
                let (min_x, max_x) = min_max(self.start_x, self.end_x);
                let (min_y, max_y) = min_max(self.start_y, self.end_y);
                x >= min_x && x <= max_x && y >= min_y && y <= max_y
            }
            ShapeKind::Circle => (x - self.start_x).hypot(y - self.start_y) <= self.radius(),
            ShapeKind::Line => {
                distance_to_line(x, y, self.start_x, self.start_y, self.end_x, self.end_y)
                    < LINE_HIT_DISTANCE
            }
        }
    }

    /// Handle positions, in hit-test priority order.
    pub fn handles(&self) -> Vec<(ResizeHandle, f32, f32)> {
        match self.kind {
            ShapeKind::Rectangle => vec![
                (ResizeHandle::BottomRight, self.end_x, self.end_y),
                (ResizeHandle::TopLeft, self.start_x, self.start_y),
                (ResizeHandle::TopRight, self.end_x, self.start_y),
                (ResizeHandle::BottomLeft, self.start_x, self.end_y),
            ],
            ShapeKind::Line => vec![
                (ResizeHandle::TopLeft, self.start_x, self.start_y),
                (ResizeHandle::BottomRight, self.end_x, self.end_y),
            ],
            ShapeKind::Circle => {
                let r = self.radius();
                let (cx, cy) = (self.start_x, self.start_y);
                vec![
                    (ResizeHandle::Rim, cx + r, cy),
                    (ResizeHandle::Rim, cx - r, cy),
                    (ResizeHandle::Rim, cx, cy + r),
                    (ResizeHandle::Rim, cx, cy - r),
                ]
            }
        }
    }

    /// First handle whose 8px box contains the point (strict comparison).
    pub fn handle_at(&self, x: f32, y: f32) -> Option<ResizeHandle> {
        self.handles()
            .into_iter()
            .find(|&(_, hx, hy)| (x - hx).abs() < HANDLE_SIZE && (y - hy).abs() < HANDLE_SIZE)
            .map(|(handle, _, _)| handle)
    }

    pub fn apply_resize(&mut self, handle: ResizeHandle, x: f32, y: f32) {
        match handle {
            ResizeHandle::BottomRight | ResizeHandle::Rim => {
                self.end_x = x;
                self.end_y = y;
            }
            ResizeHandle::TopLeft => {
                self.start_x = x;
                self.start_y = y;
            }
            ResizeHandle::TopRight => {
                self.end_x = x;
                self.start_y = y;
            }
            ResizeHandle::BottomLeft => {
                self.start_x = x;
                self.end_y = y;
            }
        }
    }

    /// Translate both points so the start point lands on (`x`, `y`).
    pub fn move_start_to(&mut self, x: f32, y: f32) {
        let dx = x - self.start_x;
        let dy = y - self.start_y;
        self.start_x += dx;
        self.start_y += dy;
        self.end_x += dx;
        self.end_y += dy;
    }

    /// Stroke the shape into `img` with its colour, width and opacity.
    pub fn rasterize(&self, img: &mut RgbaImage) {
        let half = self.line_width.max(1.0) * 0.5;
        let (sx, sy, ex, ey) = (self.start_x, self.start_y, self.end_x, self.end_y);
        match self.kind {
            ShapeKind::Rectangle => {
                let (min_x, max_x) = min_max(sx, ex);
                let (min_y, max_y) = min_max(sy, ey);
                let (cx, cy) = ((min_x + max_x) * 0.5, (min_y + max_y) * 0.5);
                let (hx, hy) = ((max_x - min_x) * 0.5, (max_y - min_y) * 0.5);
                paint_coverage(
                    img,
                    (min_x - half, min_y - half, max_x + half, max_y + half),
                    |px, py| sdf_box(px - cx, py - cy, hx, hy).abs() - half,
                    self.color,
                    self.opacity,
                    PaintMode::Over,
                );
            }
            ShapeKind::Circle => {
                let r = self.radius();
                paint_coverage(
                    img,
                    (sx - r - half, sy - r - half, sx + r + half, sy + r + half),
                    |px, py| ((px - sx).hypot(py - sy) - r).abs() - half,
                    self.color,
                    self.opacity,
                    PaintMode::Over,
                );
            }
            ShapeKind::Line => {
                stroke_segment(img, sx, sy, ex, ey, half, self.color, self.opacity, PaintMode::Over);
            }
        }
    }

    /// Dashed green outline plus resize handles for the selected shape.
    fn rasterize_selection(&self, img: &mut RgbaImage) {
        match self.kind {
            ShapeKind::Rectangle => {
                let x0 = self.start_x - HIGHLIGHT_OFFSET;
                let y0 = self.start_y - HIGHLIGHT_OFFSET;
                let x1 = self.end_x + HIGHLIGHT_OFFSET;
                let y1 = self.end_y + HIGHLIGHT_OFFSET;
                let outline = [(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)];
                dashed_polyline(img, &outline, 2.0, HIGHLIGHT_COLOR);
            }
            ShapeKind::Circle => {
                let r = self.radius() + HIGHLIGHT_OFFSET;
                let steps = ((std::f32::consts::TAU * r / 4.0).ceil() as usize).max(24);
                let ring: Vec<(f32, f32)> = (0..=steps)
                    .map(|i| {
                        let a = i as f32 / steps as f32 * std::f32::consts::TAU;
                        (self.start_x + r * a.cos(), self.start_y + r * a.sin())
                    })
                    .collect();
                dashed_polyline(img, &ring, 2.0, HIGHLIGHT_COLOR);
            }
            ShapeKind::Line => {}
        }

        for (_, hx, hy) in self.handles() {
            draw_handle(img, hx, hy);
        }
    }
}

// ============================================================================
// SHAPE REGISTRY
// ============================================================================

/// Ordered list of shapes; list order is z-order (later = on top).
#[derive(Default)]
pub struct ShapeRegistry {
    shapes: Vec<(ShapeId, Shape)>,
    next_id: u64,
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, shape: Shape) -> ShapeId {
        let id = ShapeId(self.next_id);
        self.next_id += 1;
        self.shapes.push((id, shape));
        id
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|(sid, _)| *sid == id).map(|(_, s)| s)
    }

    pub fn get_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        self.shapes.iter_mut().find(|(sid, _)| *sid == id).map(|(_, s)| s)
    }

    pub fn remove_all(&mut self) {
        self.shapes.clear();
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Shapes in z-order, bottom first.
    pub fn iter(&self) -> impl Iterator<Item = (ShapeId, &Shape)> {
        self.shapes.iter().map(|(id, s)| (*id, s))
    }

    /// Topmost shape under the point.
    pub fn shape_at(&self, x: f32, y: f32) -> Option<ShapeId> {
        self.shapes
            .iter()
            .rev()
            .find(|(_, s)| s.hit(x, y))
            .map(|(id, _)| *id)
    }

    pub fn resize_handle_at(&self, id: ShapeId, x: f32, y: f32) -> Option<ResizeHandle> {
        self.get(id)?.handle_at(x, y)
    }

    /// Draw every shape in list order, then the selection highlight and
    /// handles for `selected` (if it still exists).
    pub fn render_all(&self, img: &mut RgbaImage, selected: Option<ShapeId>) {
        for (_, shape) in &self.shapes {
            shape.rasterize(img);
        }
        if let Some(shape) = selected.and_then(|id| self.get(id)) {
            shape.rasterize_selection(img);
        }
    }
}

// ============================================================================
// SDF rasterization helpers
// ============================================================================

/// How coverage is written into the destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaintMode {
    /// Source-over with the given colour.
    Over,
    /// Destination-out (the colour is ignored).
    Erase,
}

/// Paint every pixel in `bounds` (x0, y0, x1, y1, canvas coordinates)
/// whose signed distance is below zero, anti-aliased over one pixel.
/// `opacity` scales the colour's alpha.
pub fn paint_coverage<F>(
    img: &mut RgbaImage,
    bounds: (f32, f32, f32, f32),
    sdf: F,
    color: Rgba<u8>,
    opacity: f32,
    mode: PaintMode,
) where
    F: Fn(f32, f32) -> f32 + Sync,
{
    let (w, h) = img.dimensions();
    let x0 = ((bounds.0 - 1.0).floor() as i64).max(0) as usize;
    let y0 = ((bounds.1 - 1.0).floor() as i64).max(0) as usize;
    let x1 = ((bounds.2 + 1.0).ceil() as i64).min(w as i64);
    let y1 = ((bounds.3 + 1.0).ceil() as i64).min(h as i64);
    if x1 <= x0 as i64 || y1 <= y0 as i64 {
        return;
    }
    let (x1, y1) = (x1 as usize, y1 as usize);
    let row_bytes = w as usize * 4;
    let opacity = opacity.clamp(0.0, 1.0);

    img.as_mut()
        .par_chunks_mut(row_bytes)
        .enumerate()
        .skip(y0)
        .take(y1 - y0)
        .for_each(|(row, row_buf)| {
            let py = row as f32 + 0.5;
            for col in x0..x1 {
                let px = col as f32 + 0.5;
                let coverage = smoothstep(0.5, -0.5, sdf(px, py));
                if coverage <= 0.001 {
                    continue;
                }
                let idx = col * 4;
                let base = Rgba([row_buf[idx], row_buf[idx + 1], row_buf[idx + 2], row_buf[idx + 3]]);
                let out = match mode {
                    PaintMode::Over => blend_over(base, color, coverage * opacity),
                    PaintMode::Erase => erase(base, coverage * opacity),
                };
                row_buf[idx..idx + 4].copy_from_slice(&out.0);
            }
        });
}

/// Round-capped segment of half-width `half` from (ax, ay) to (bx, by).
pub fn stroke_segment(
    img: &mut RgbaImage,
    ax: f32,
    ay: f32,
    bx: f32,
    by: f32,
    half: f32,
    color: Rgba<u8>,
    opacity: f32,
    mode: PaintMode,
) {
    let bounds = (
        ax.min(bx) - half,
        ay.min(by) - half,
        ax.max(bx) + half,
        ay.max(by) + half,
    );
    paint_coverage(
        img,
        bounds,
        |px, py| sdf_line_segment(px, py, ax, ay, bx, by) - half,
        color,
        opacity,
        mode,
    );
}

/// Canvas-style `setLineDash([5, 5])` stroke along a polyline.
fn dashed_polyline(img: &mut RgbaImage, points: &[(f32, f32)], width: f32, color: Rgba<u8>) {
    const DASH: f32 = 5.0;
    const PERIOD: f32 = 10.0;
    let half = width * 0.5;
    let mut travelled = 0.0f32;
    for pair in points.windows(2) {
        let ((ax, ay), (bx, by)) = (pair[0], pair[1]);
        let len = (bx - ax).hypot(by - ay);
        if len <= f32::EPSILON {
            continue;
        }
        let (ux, uy) = ((bx - ax) / len, (by - ay) / len);
        let mut t = 0.0f32;
        while t < len {
            let phase = (travelled + t) % PERIOD;
            if phase < DASH {
                let end = (t + DASH - phase).min(len);
                stroke_segment(
                    img,
                    ax + ux * t,
                    ay + uy * t,
                    ax + ux * end,
                    ay + uy * end,
                    half,
                    color,
                    1.0,
                    PaintMode::Over,
                );
                t = end;
            } else {
                t += PERIOD - phase;
            }
        }
        travelled += len;
    }
}

/// Filled green square with a white 1px border, centred on (x, y).
fn draw_handle(img: &mut RgbaImage, x: f32, y: f32) {
    let h = HANDLE_SIZE * 0.5;
    let bounds = (x - h - 1.0, y - h - 1.0, x + h + 1.0, y + h + 1.0);
    paint_coverage(img, bounds, |px, py| sdf_box(px - x, py - y, h, h), HIGHLIGHT_COLOR, 1.0, PaintMode::Over);
    paint_coverage(
        img,
        bounds,
        |px, py| sdf_box(px - x, py - y, h, h).abs() - 0.5,
        HANDLE_OUTLINE,
        1.0,
        PaintMode::Over,
    );
}

/// Distance from (x, y) to the segment (x1, y1)–(x2, y2).  A zero-length
/// segment measures to its start point.
pub fn distance_to_line(x: f32, y: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let c = x2 - x1;
    let d = y2 - y1;
    let len_sq = c * c + d * d;
    let param = if len_sq != 0.0 {
        ((x - x1) * c + (y - y1) * d) / len_sq
    } else {
        -1.0
    };
    let (xx, yy) = if param < 0.0 {
        (x1, y1)
    } else if param > 1.0 {
        (x2, y2)
    } else {
        (x1 + param * c, y1 + param * d)
    };
    (x - xx).hypot(y - yy)
}

/// SDF for a box centred at origin with half-extents (hx, hy).
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// SDF for distance to a line segment.
#[inline]
fn sdf_line_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    distance_to_line(px, py, ax, ay, bx, by)
}

#[inline]
fn min_max(a: f32, b: f32) -> (f32, f32) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Smoothstep between edge0 and edge1.
#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(kind: ShapeKind, sx: f32, sy: f32, ex: f32, ey: f32) -> Shape {
        Shape {
            kind,
            start_x: sx,
            start_y: sy,
            end_x: ex,
            end_y: ey,
            color: Rgba([255, 0, 0, 255]),
            line_width: 4.0,
            opacity: 1.0,
        }
    }

    #[test]
    fn rectangle_corner_hits_and_one_pixel_outside_misses() {
        let mut reg = ShapeRegistry::new();
        let id = reg.append(shape(ShapeKind::Rectangle, 10.0, 10.0, 50.0, 40.0));
        assert_eq!(reg.shape_at(10.0, 10.0), Some(id));
        assert_eq!(reg.shape_at(50.0, 40.0), Some(id));
        assert_eq!(reg.shape_at(51.0, 40.0), None);
        assert_eq!(reg.shape_at(10.0, 9.0), None);
    }

    #[test]
    fn topmost_shape_wins() {
        let mut reg = ShapeRegistry::new();
        let below = reg.append(shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0));
        let above = reg.append(shape(ShapeKind::Circle, 50.0, 50.0, 60.0, 50.0));
        assert_eq!(reg.shape_at(55.0, 50.0), Some(above));
        assert_eq!(reg.shape_at(5.0, 5.0), Some(below));
    }

    #[test]
    fn circle_and_line_hit_tests() {
        let circle = shape(ShapeKind::Circle, 0.0, 0.0, 3.0, 4.0);
        assert!(circle.hit(5.0, 0.0));
        assert!(!circle.hit(5.1, 0.0));

        let line = shape(ShapeKind::Line, 0.0, 0.0, 100.0, 0.0);
        assert!(line.hit(50.0, 9.9));
        assert!(!line.hit(50.0, 10.0));
        assert!(!line.hit(111.0, 0.0));
    }

    #[test]
    fn ids_stay_stable_and_go_stale_after_clear() {
        let mut reg = ShapeRegistry::new();
        let a = reg.append(shape(ShapeKind::Line, 0.0, 0.0, 1.0, 1.0));
        reg.remove_all();
        assert!(reg.get(a).is_none());
        let b = reg.append(shape(ShapeKind::Line, 0.0, 0.0, 1.0, 1.0));
        assert_ne!(a, b);
    }

    #[test]
    fn rectangle_handles_resize_the_right_points() {
        let mut reg = ShapeRegistry::new();
        let id = reg.append(shape(ShapeKind::Rectangle, 10.0, 10.0, 50.0, 40.0));
        assert_eq!(reg.resize_handle_at(id, 47.0, 44.0), Some(ResizeHandle::BottomRight));
        assert_eq!(reg.resize_handle_at(id, 50.0, 12.0), Some(ResizeHandle::TopRight));
        assert_eq!(reg.resize_handle_at(id, 58.0, 40.0), None);

        let s = reg.get_mut(id).unwrap();
        s.apply_resize(ResizeHandle::TopRight, 70.0, 0.0);
        assert_eq!((s.start_x, s.start_y, s.end_x, s.end_y), (10.0, 0.0, 70.0, 40.0));
        s.apply_resize(ResizeHandle::BottomLeft, 5.0, 45.0);
        assert_eq!((s.start_x, s.start_y, s.end_x, s.end_y), (5.0, 0.0, 70.0, 45.0));
    }

    #[test]
    fn circle_rim_handle_sets_radius() {
        let mut c = shape(ShapeKind::Circle, 20.0, 20.0, 30.0, 20.0);
        assert_eq!(c.handle_at(20.0, 31.0), Some(ResizeHandle::Rim));
        c.apply_resize(ResizeHandle::Rim, 20.0, 45.0);
        assert_eq!(c.radius(), 25.0);
        assert_eq!((c.start_x, c.start_y), (20.0, 20.0));
    }

    #[test]
    fn move_keeps_extent() {
        let mut l = shape(ShapeKind::Line, 1.0, 2.0, 11.0, 22.0);
        l.move_start_to(5.0, 5.0);
        assert_eq!((l.start_x, l.start_y, l.end_x, l.end_y), (5.0, 5.0, 15.0, 25.0));
    }

    #[test]
    fn rasterized_rectangle_is_hollow() {
        let mut img = RgbaImage::from_pixel(40, 40, Rgba([255, 255, 255, 255]));
        shape(ShapeKind::Rectangle, 5.0, 5.0, 35.0, 35.0).rasterize(&mut img);
        assert_eq!(*img.get_pixel(5, 20), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(20, 20), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn selection_draws_green_handles() {
        let mut reg = ShapeRegistry::new();
        let id = reg.append(shape(ShapeKind::Line, 10.0, 10.0, 30.0, 10.0));
        let mut img = RgbaImage::new(40, 40);
        reg.render_all(&mut img, Some(id));
        // Handle interior, clear of both the stroke and the white border
        assert_eq!(*img.get_pixel(28, 12), HIGHLIGHT_COLOR);
    }
}
