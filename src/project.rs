use std::path::Path;

use ab_glyph::FontArc;
use image::RgbaImage;
use uuid::Uuid;

use crate::canvas::{CanvasState, ImageSnapshot};
use crate::components::history::HistoryManager;
use crate::components::tools::{CropSelection, InteractionState, Tool, ToolProperties};
use crate::io::{self, ImageIoError};
use crate::ops::color_removal::{DEFAULT_BACKGROUND_TOLERANCE, remove_background};
use crate::ops::filters::{FilterKind, FilterSettings};
use crate::ops::shapes::{ShapeId, ShapeRegistry};
use crate::ops::text::{self, FONT_SIZE_PER_BRUSH, TextStyle};
use crate::ops::transform::{self, AspectRatio, RotateDirection};
use crate::remote::{ProjectData, SaveRequest};
use crate::settings::AppSettings;

// ============================================================================
// ERRORS
// ============================================================================

/// User-facing editor errors; the UI shows them in an alert dialog.
#[derive(Debug)]
pub enum EditorError {
    NoImageLoaded,
    CropRegionEmpty,
    CropRegionTooSmall { width: u32, height: u32 },
    CropRegionTooLarge { width: u32, height: u32 },
    CropRegionOutsideImage,
    InvalidAspectRatio(String),
    Text(String),
    Image(ImageIoError),
}

impl std::fmt::Display for EditorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditorError::NoImageLoaded => write!(f, "Load an image first."),
            EditorError::CropRegionEmpty => write!(
                f,
                "No crop region selected.\n\n1. Pick the Crop tool\n2. Drag a region over the image\n3. Then press Apply Crop"
            ),
            EditorError::CropRegionTooSmall { width, height } => write!(
                f,
                "The selected region ({}×{} px) is too small to crop (minimum {}×{} px).",
                width,
                height,
                transform::MIN_CROP_SIZE,
                transform::MIN_CROP_SIZE
            ),
            EditorError::CropRegionTooLarge { width, height } => write!(
                f,
                "The selected region ({}×{} px) is too large to crop (maximum {}×{} px).",
                width,
                height,
                transform::MAX_CROP_SIZE,
                transform::MAX_CROP_SIZE
            ),
            EditorError::CropRegionOutsideImage => {
                write!(f, "The selected region does not overlap the image.")
            }
            EditorError::InvalidAspectRatio(e) => write!(f, "Invalid aspect ratio: {}", e),
            EditorError::Text(e) => write!(f, "Cannot place text: {}", e),
            EditorError::Image(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EditorError {}

impl From<ImageIoError> for EditorError {
    fn from(e: ImageIoError) -> Self {
        EditorError::Image(e)
    }
}

// ============================================================================
// PROJECT - one editing session
// ============================================================================

/// A single editing session: the surface, the three image buffers, history,
/// shapes, filters and tool state.  Nothing here is global, so sessions can
/// coexist and be driven headless.
pub struct Project {
    /// Title/description sent with "Save to server"
    pub title: String,
    pub description: String,
    /// Id assigned by the server on the first successful save
    pub server_project_id: Option<i64>,

    /// What is on screen: filters(current) + shapes (+ selection overlay)
    pub canvas: CanvasState,
    /// First load; compare view and crop source
    pub(crate) pristine: Option<RgbaImage>,
    /// Last rotate/crop baseline
    pub(crate) original: Option<RgbaImage>,
    /// Latest edited pixels, strokes included
    pub(crate) current: Option<RgbaImage>,

    pub history: HistoryManager,
    pub shapes: ShapeRegistry,
    pub selected: Option<ShapeId>,
    pub filters: FilterSettings,
    pub crop: CropSelection,

    pub tool: Tool,
    pub props: ToolProperties,
    pub(crate) interaction: InteractionState,
    /// Surface saved at pointer-down for shape previews
    pub(crate) pre_stroke: Option<RgbaImage>,

    /// Showing the pristine image instead of the edit
    pub compare_mode: bool,
    /// Edits since the last successful save
    pub is_dirty: bool,

    /// Fixed grain seed (headless/tests); `None` draws a fresh one per render
    grain_seed: Option<u32>,
    max_width: u32,
    max_height: u32,
    font_family: String,
    font: Option<FontArc>,
}

impl Default for Project {
    fn default() -> Self {
        Self::new(&AppSettings::default())
    }
}

impl Project {
    pub fn new(settings: &AppSettings) -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            server_project_id: None,
            canvas: CanvasState::default(),
            pristine: None,
            original: None,
            current: None,
            history: HistoryManager::new(settings.max_history_steps),
            shapes: ShapeRegistry::new(),
            selected: None,
            filters: FilterSettings::default(),
            crop: CropSelection::default(),
            tool: Tool::default(),
            props: ToolProperties::from_settings(settings),
            interaction: InteractionState::Idle,
            pre_stroke: None,
            compare_mode: false,
            is_dirty: false,
            grain_seed: None,
            max_width: settings.max_width,
            max_height: settings.max_height,
            font_family: settings.font_family.clone(),
            font: None,
        }
    }

    pub fn has_image(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&RgbaImage> {
        self.current.as_ref()
    }

    pub fn pristine(&self) -> Option<&RgbaImage> {
        self.pristine.as_ref()
    }

    pub fn original(&self) -> Option<&RgbaImage> {
        self.original.as_ref()
    }

    /// Closing with more than the initial history entry loses work.
    pub fn has_unsaved_edits(&self) -> bool {
        self.history.len() > 1 && self.is_dirty
    }

    /// Pin the grain noise (batch mode, tests).
    pub fn set_grain_seed(&mut self, seed: Option<u32>) {
        self.grain_seed = seed;
    }

    /// Change the bounding box used by the next load (0 = unbounded).
    pub fn set_fit_bounds(&mut self, max_width: u32, max_height: u32) {
        self.max_width = max_width;
        self.max_height = max_height;
    }

    // ========================================================================
    // LOADING
    // ========================================================================

    /// Start a new session on `img`: fit it into the bounding box, set all
    /// three buffers, drop shapes/crop/history and push the first entry.
    pub fn load_image(&mut self, img: RgbaImage) {
        let img = io::fit_image(img, self.max_width, self.max_height);
        crate::log_info!("Loaded image {}x{}", img.width(), img.height());

        self.pristine = Some(img.clone());
        self.original = Some(img.clone());
        self.current = Some(img);
        self.shapes.remove_all();
        self.selected = None;
        self.crop.clear_coords();
        self.interaction = InteractionState::Idle;
        self.pre_stroke = None;
        self.compare_mode = false;
        self.history.reset();
        self.render();
        self.history.push("Open Image", self.current_snapshot());
        self.is_dirty = false;
    }

    pub fn open_path(&mut self, path: &Path) -> Result<(), ImageIoError> {
        let img = io::load_image_sync(path)?;
        // A new file is a new server project
        self.title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        self.server_project_id = None;
        self.load_image(img);
        Ok(())
    }

    // ========================================================================
    // RENDERING
    // ========================================================================

    /// Rebuild the surface from `current`: filters, then shapes, then the
    /// selected shape's highlight.  In compare mode the pristine image is
    /// shown instead.
    pub fn render(&mut self) {
        if self.compare_mode
            && let Some(pristine) = &self.pristine
        {
            self.canvas.set_image(pristine.clone());
            return;
        }
        if let Some(img) = self.composite(self.selected) {
            self.canvas.set_image(img);
        }
    }

    /// The image as it should be exported: filters + shapes, no selection
    /// overlay and never the compare view.
    pub fn rendered_image(&self) -> Option<RgbaImage> {
        self.composite(None)
    }

    fn composite(&self, selected: Option<ShapeId>) -> Option<RgbaImage> {
        let current = self.current.as_ref()?;
        let seed = self
            .grain_seed
            .unwrap_or_else(|| Uuid::new_v4().as_u128() as u32);
        let mut out = self.filters.render(current, seed);
        self.shapes.render_all(&mut out, selected);
        Some(out)
    }

    fn current_snapshot(&self) -> ImageSnapshot {
        match &self.current {
            Some(img) => ImageSnapshot::from_image(img.clone()),
            None => ImageSnapshot::from_image(RgbaImage::new(0, 0)),
        }
    }

    pub(crate) fn push_history(&mut self, description: &str) {
        self.history.push(description, self.current_snapshot());
        self.is_dirty = true;
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    pub fn undo(&mut self) -> bool {
        let snapshot = self.history.undo().cloned();
        self.restore_snapshot(snapshot)
    }

    pub fn redo(&mut self) -> bool {
        let snapshot = self.history.redo().cloned();
        self.restore_snapshot(snapshot)
    }

    pub fn jump_to(&mut self, index: usize) -> bool {
        let snapshot = self.history.jump_to(index).cloned();
        self.restore_snapshot(snapshot)
    }

    /// Surface takes the snapshot's size and pixels, then filters and
    /// shapes are laid back on top.
    fn restore_snapshot(&mut self, snapshot: Option<ImageSnapshot>) -> bool {
        let Some(snapshot) = snapshot else { return false };
        self.canvas.restore(&snapshot);
        self.current = Some(snapshot.pixels);
        self.render();
        true
    }

    /// Collapse history to the present state.  Shapes are removed too.
    pub fn clear_history(&mut self) {
        self.shapes.remove_all();
        self.selected = None;
        self.render();
        self.history.clear(self.current_snapshot());
        crate::log_info!("History cleared");
    }

    // ========================================================================
    // FILTERS
    // ========================================================================

    pub fn set_filter(&mut self, kind: FilterKind, value: i32) {
        self.filters.set(kind, value);
        self.render();
    }

    pub fn reset_filters(&mut self) {
        self.filters.reset();
        self.render();
    }

    pub fn toggle_compare(&mut self) -> Result<bool, EditorError> {
        if self.pristine.is_none() {
            return Err(EditorError::NoImageLoaded);
        }
        self.compare_mode = !self.compare_mode;
        self.render();
        Ok(self.compare_mode)
    }

    // ========================================================================
    // PIXEL OPERATIONS
    // ========================================================================

    /// Key out the top-left colour of `current`.  Returns the number of
    /// pixels made transparent.
    pub fn remove_background(&mut self) -> Result<usize, EditorError> {
        let current = self.current.as_mut().ok_or(EditorError::NoImageLoaded)?;
        let keyed = remove_background(current, DEFAULT_BACKGROUND_TOLERANCE);
        crate::log_info!("Background removal keyed out {} pixels", keyed);
        self.render();
        self.push_history("Remove Background");
        Ok(keyed)
    }

    /// Rotate by ±90°.  All three buffers are rebased and shapes dropped.
    pub fn rotate(&mut self, direction: RotateDirection) -> Result<(), EditorError> {
        let current = self.current.as_ref().ok_or(EditorError::NoImageLoaded)?;
        let rotated = transform::rotate_90(current, direction);
        crate::log_info!(
            "Rotated {}° to {}x{}",
            direction.degrees(),
            rotated.width(),
            rotated.height()
        );
        self.rebase(rotated);
        let description = match direction {
            RotateDirection::Clockwise => "Rotate Right",
            RotateDirection::CounterClockwise => "Rotate Left",
        };
        self.push_history(description);
        Ok(())
    }

    /// Crop the pristine image to the selected region.
    pub fn apply_crop(&mut self) -> Result<(), EditorError> {
        let pristine = self.pristine.as_ref().ok_or(EditorError::NoImageLoaded)?;
        if !self.crop.has_region() {
            return Err(EditorError::CropRegionEmpty);
        }
        let rect = self.crop.rect();
        if !rect.is_large_enough() {
            return Err(EditorError::CropRegionTooSmall {
                width: rect.width,
                height: rect.height,
            });
        }
        if !rect.is_within_limit() {
            return Err(EditorError::CropRegionTooLarge {
                width: rect.width,
                height: rect.height,
            });
        }
        if !rect.intersects(pristine.width(), pristine.height()) {
            return Err(EditorError::CropRegionOutsideImage);
        }

        let cropped = transform::crop_region(pristine, rect);
        crate::log_info!(
            "Cropped to {}x{} at ({}, {})",
            rect.width,
            rect.height,
            rect.x,
            rect.y
        );
        self.crop = CropSelection::default();
        self.rebase(cropped);
        self.push_history("Crop");
        Ok(())
    }

    /// New geometry: every buffer becomes `img`, shapes are discarded.
    fn rebase(&mut self, img: RgbaImage) {
        self.pristine = Some(img.clone());
        self.original = Some(img.clone());
        self.current = Some(img);
        self.shapes.remove_all();
        self.selected = None;
        self.compare_mode = false;
        self.render();
    }

    /// Parse and apply a crop/select ratio.  On error the previous ratio
    /// stays in effect.
    pub fn set_aspect_ratio(&mut self, ratio: &str) -> Result<(), EditorError> {
        let parsed: AspectRatio = ratio.parse().map_err(EditorError::InvalidAspectRatio)?;
        self.crop.ratio = parsed;
        Ok(())
    }

    /// Fill a line of text at (`x`, `y`) (baseline) into `current`.
    /// Returns `Ok(false)` when nothing landed on the image: empty text or
    /// text placed entirely off-canvas.  No history entry is pushed then.
    pub fn insert_text(&mut self, x: f32, y: f32, content: &str) -> Result<bool, EditorError> {
        if !self.has_image() {
            return Err(EditorError::NoImageLoaded);
        }
        if content.trim().is_empty() {
            return Ok(false);
        }
        if self.font.is_none() {
            let font = text::load_system_font(&self.font_family).map_err(EditorError::Text)?;
            self.font = Some(font);
        }
        let style = TextStyle {
            font_size: self.props.brush_size * FONT_SIZE_PER_BRUSH,
            color: self.props.color,
            opacity: self.props.opacity,
        };
        let (Some(font), Some(current)) = (self.font.as_ref(), self.current.as_mut()) else {
            return Ok(false);
        };
        if !text::draw_text(current, font, content, x, y, style) {
            crate::log_info!("Text at ({}, {}) fell outside the image", x, y);
            return Ok(false);
        }
        self.render();
        self.push_history("Text");
        Ok(true)
    }

    // ========================================================================
    // EXPORT
    // ========================================================================

    pub fn download(&self, path: &Path) -> Result<(), EditorError> {
        let img = self.rendered_image().ok_or(EditorError::NoImageLoaded)?;
        io::save_png(&img, path)?;
        crate::log_info!("Downloaded {}", path.display());
        Ok(())
    }

    /// Build the `POST /api/save_project` body from the rendered view.
    pub fn save_request(&self) -> Result<SaveRequest, EditorError> {
        let img = self.rendered_image().ok_or(EditorError::NoImageLoaded)?;
        let title = match self.title.trim() {
            "" => "Untitled".to_string(),
            t => t.to_string(),
        };
        Ok(SaveRequest {
            project_id: self.server_project_id,
            title,
            description: self.description.clone(),
            width: img.width(),
            height: img.height(),
            project_data: ProjectData {
                image: io::to_data_url(&img)?,
                filters: self.filters,
                history: self.history.len(),
            },
        })
    }

    /// Record a successful save.
    pub fn mark_saved(&mut self, server_project_id: Option<i64>) {
        if server_project_id.is_some() {
            self.server_project_id = server_project_id;
        }
        self.is_dirty = false;
    }

    /// Window title, with a dirty marker.
    pub fn display_title(&self) -> String {
        let name = if self.title.is_empty() { "Untitled" } else { self.title.as_str() };
        if self.is_dirty {
            format!("{}*", name)
        } else {
            name.to_string()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgba;

    pub(crate) fn loaded_project(w: u32, h: u32) -> Project {
        let mut project = Project::new(&AppSettings::default());
        project.set_grain_seed(Some(1));
        project.load_image(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])));
        project
    }

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([(x * 3) as u8, (y * 3) as u8, 90, 255]))
    }

    fn paint(project: &mut Project, x: u32, y: u32, color: Rgba<u8>) {
        if let Some(current) = project.current.as_mut() {
            current.put_pixel(x, y, color);
        }
        project.render();
        project.push_history("Paint");
    }

    #[test]
    fn load_fits_and_starts_history() {
        let mut project = Project::new(&AppSettings::default());
        project.load_image(RgbaImage::new(1600, 1000));
        assert_eq!((project.canvas.width, project.canvas.height), (800, 500));
        assert_eq!(project.history.len(), 1);
        assert_eq!(project.history.entries()[0].description, "Open Image");
        assert_eq!(project.pristine().unwrap().dimensions(), (800, 500));
        assert!(!project.has_unsaved_edits());
    }

    #[test]
    fn n_edits_then_n_undos_round_trip() {
        let mut project = loaded_project(20, 20);
        let before = project.canvas.snapshot();
        paint(&mut project, 1, 1, Rgba([255, 0, 0, 255]));
        project.rotate(RotateDirection::Clockwise).unwrap();
        paint(&mut project, 2, 3, Rgba([0, 255, 0, 255]));
        assert!(project.has_unsaved_edits());

        for _ in 0..3 {
            assert!(project.undo());
        }
        assert!(!project.undo());
        assert_eq!(project.canvas.snapshot(), before);
        assert_eq!(project.current().unwrap(), &before.pixels);
    }

    #[test]
    fn redo_restores_the_undone_snapshot_exactly() {
        let mut project = loaded_project(10, 10);
        paint(&mut project, 4, 4, Rgba([9, 8, 7, 255]));
        let edited = project.canvas.snapshot();
        project.undo();
        assert!(project.redo());
        assert_eq!(project.canvas.snapshot(), edited);
        assert!(!project.redo());
    }

    #[test]
    fn new_edit_after_undo_discards_forward_entries() {
        let mut project = loaded_project(10, 10);
        paint(&mut project, 1, 1, Rgba([1, 1, 1, 255]));
        paint(&mut project, 2, 2, Rgba([2, 2, 2, 255]));
        project.undo();
        project.undo();
        paint(&mut project, 3, 3, Rgba([3, 3, 3, 255]));
        assert_eq!(project.history.len(), 2);
        assert!(!project.redo());
        assert_eq!(*project.current().unwrap().get_pixel(2, 2), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn undo_across_rotate_restores_dimensions() {
        let mut project = Project::new(&AppSettings::default());
        project.load_image(gradient(30, 10));
        project.rotate(RotateDirection::CounterClockwise).unwrap();
        assert_eq!((project.canvas.width, project.canvas.height), (10, 30));
        project.undo();
        assert_eq!((project.canvas.width, project.canvas.height), (30, 10));
    }

    #[test]
    fn jump_to_moves_straight_to_an_entry() {
        let mut project = loaded_project(10, 10);
        paint(&mut project, 1, 1, Rgba([1, 1, 1, 255]));
        paint(&mut project, 2, 2, Rgba([2, 2, 2, 255]));
        assert!(project.jump_to(0));
        assert_eq!(project.history.cursor(), 0);
        assert_eq!(*project.current().unwrap().get_pixel(1, 1), Rgba([255, 255, 255, 255]));
        assert!(!project.jump_to(9));
        assert_eq!(project.history.cursor(), 0);
    }

    #[test]
    fn crop_samples_the_pristine_buffer() {
        let mut project = Project::new(&AppSettings::default());
        project.load_image(gradient(50, 40));
        project.set_filter(FilterKind::Brightness, 50);
        paint(&mut project, 15, 12, Rgba([0, 0, 0, 255]));

        project.crop.start_x = 30.0;
        project.crop.start_y = 25.0;
        project.crop.end_x = 10.0;
        project.crop.end_y = 10.0;
        project.apply_crop().unwrap();

        let current = project.current().unwrap();
        assert_eq!(current.dimensions(), (20, 15));
        let expected = gradient(50, 40);
        assert_eq!(*current.get_pixel(5, 2), *expected.get_pixel(15, 12));
        assert_eq!(*current.get_pixel(0, 0), *expected.get_pixel(10, 10));
        assert_eq!(project.pristine().unwrap(), current);
        assert_eq!(project.original().unwrap(), current);
        assert_eq!(project.crop, CropSelection::default());
        assert_eq!(project.history.entries().last().unwrap().description, "Crop");
    }

    #[test]
    fn crop_requires_a_large_enough_region() {
        let mut project = loaded_project(50, 50);
        assert!(matches!(project.apply_crop(), Err(EditorError::CropRegionEmpty)));

        project.crop.start_x = 5.0;
        project.crop.start_y = 5.0;
        project.crop.end_x = 14.0;
        project.crop.end_y = 40.0;
        match project.apply_crop() {
            Err(EditorError::CropRegionTooSmall { width, height }) => assert_eq!((width, height), (9, 35)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(project.history.len(), 1);

        project.crop.start_x = 0.0;
        project.crop.start_y = 0.0;
        project.crop.end_x = 4294967295.0;
        project.crop.end_y = 4294967295.0;
        assert!(matches!(
            project.apply_crop(),
            Err(EditorError::CropRegionTooLarge { width: u32::MAX, height: u32::MAX })
        ));

        project.crop.start_x = 60.0;
        project.crop.start_y = 60.0;
        project.crop.end_x = 90.0;
        project.crop.end_y = 90.0;
        assert!(matches!(project.apply_crop(), Err(EditorError::CropRegionOutsideImage)));
        assert_eq!(project.history.len(), 1);
        assert_eq!(project.current().unwrap().dimensions(), (50, 50));

        let mut empty = Project::new(&AppSettings::default());
        assert!(matches!(empty.apply_crop(), Err(EditorError::NoImageLoaded)));
        assert!(matches!(empty.rotate(RotateDirection::Clockwise), Err(EditorError::NoImageLoaded)));
    }

    #[test]
    fn rotate_rebases_buffers_and_clears_shapes() {
        let mut project = loaded_project(40, 20);
        project.select_tool(Tool::Circle);
        project.pointer_down(20.0, 10.0);
        project.pointer_up(25.0, 10.0);
        assert_eq!(project.shapes.len(), 1);

        project.rotate(RotateDirection::Clockwise).unwrap();
        assert!(project.shapes.is_empty());
        assert!(project.selected.is_none());
        assert_eq!(project.pristine().unwrap().dimensions(), (20, 40));
        assert_eq!(project.current().unwrap().dimensions(), (20, 40));
    }

    #[test]
    fn filters_are_non_cumulative() {
        let mut project = Project::new(&AppSettings::default());
        project.set_grain_seed(Some(5));
        project.load_image(gradient(16, 16));
        project.set_filter(FilterKind::Grain, 40);
        project.set_filter(FilterKind::Contrast, 30);
        let first = project.canvas.snapshot();
        project.set_filter(FilterKind::Contrast, 30);
        assert_eq!(project.canvas.snapshot(), first);

        project.reset_filters();
        assert_eq!(project.canvas.pixels(), project.current().unwrap());
        assert!(project.filters.is_neutral());
    }

    #[test]
    fn background_removal_commits_to_current() {
        let mut project = Project::new(&AppSettings::default());
        project.load_image(RgbaImage::from_fn(20, 20, |x, y| {
            if (5..15).contains(&x) && (5..15).contains(&y) {
                Rgba([200, 10, 10, 255])
            } else {
                Rgba([10, 200, 10, 255])
            }
        }));
        let keyed = project.remove_background().unwrap();
        assert_eq!(keyed, 300);
        let current = project.current().unwrap();
        assert_eq!(current.get_pixel(0, 0)[3], 0);
        assert_eq!(current.get_pixel(10, 10)[3], 255);
        assert_eq!(project.history.len(), 2);
    }

    #[test]
    fn clear_history_keeps_present_state_and_drops_shapes() {
        let mut project = loaded_project(30, 30);
        paint(&mut project, 1, 1, Rgba([0, 0, 0, 255]));
        project.select_tool(Tool::Line);
        project.pointer_down(2.0, 2.0);
        project.pointer_up(20.0, 20.0);
        let present = project.current().unwrap().clone();

        project.clear_history();
        assert_eq!(project.history.len(), 1);
        assert!(project.shapes.is_empty());
        assert_eq!(project.history.current().unwrap().pixels, present);
        assert!(!project.undo());
    }

    #[test]
    fn malformed_ratio_keeps_previous_ratio() {
        let mut project = loaded_project(10, 10);
        project.set_aspect_ratio("16:9").unwrap();
        assert!(matches!(
            project.set_aspect_ratio("abc"),
            Err(EditorError::InvalidAspectRatio(_))
        ));
        assert_eq!(project.crop.ratio, AspectRatio::Fixed { a: 16.0, b: 9.0 });
    }

    #[test]
    fn compare_mode_shows_pristine() {
        let mut project = loaded_project(10, 10);
        paint(&mut project, 3, 3, Rgba([0, 0, 0, 255]));
        assert!(project.toggle_compare().unwrap());
        assert_eq!(project.canvas.get_pixel(3, 3), Rgba([255, 255, 255, 255]));
        assert!(!project.toggle_compare().unwrap());
        assert_eq!(project.canvas.get_pixel(3, 3), Rgba([0, 0, 0, 255]));
        assert!(Project::default().toggle_compare().is_err());
    }

    #[test]
    fn save_request_describes_the_rendered_view() {
        let mut project = loaded_project(12, 8);
        project.set_filter(FilterKind::Hue, 90);
        let request = project.save_request().unwrap();
        assert_eq!(request.title, "Untitled");
        assert_eq!((request.width, request.height), (12, 8));
        assert_eq!(request.project_data.history, 1);
        assert_eq!(request.project_data.filters.hue, 90);
        assert!(request.project_data.image.starts_with("data:image/png;base64,"));
        assert!(request.project_id.is_none());

        project.mark_saved(Some(42));
        assert_eq!(project.save_request().unwrap().project_id, Some(42));
        assert!(Project::default().save_request().is_err());
    }

    #[test]
    fn empty_text_is_a_no_op() {
        let mut project = loaded_project(10, 10);
        assert!(!project.insert_text(1.0, 5.0, "  ").unwrap());
        assert_eq!(project.history.len(), 1);
        assert!(matches!(
            Project::default().insert_text(0.0, 0.0, "hi"),
            Err(EditorError::NoImageLoaded)
        ));
    }

    #[test]
    fn off_canvas_text_adds_no_history() {
        let mut project = loaded_project(80, 40);
        // Headless CI machines may have no fonts at all
        match project.insert_text(-5000.0, -5000.0, "Hello") {
            Err(EditorError::Text(_)) => return,
            result => assert!(!result.unwrap()),
        }
        assert_eq!(project.history.len(), 1);
        assert!(!project.is_dirty);

        assert!(project.insert_text(5.0, 30.0, "Hi").unwrap());
        assert_eq!(project.history.len(), 2);
        assert_eq!(project.history.entries()[1].description, "Text");
    }

    #[test]
    fn undo_re_renders_live_filters_and_shapes() {
        let mut project = Project::new(&AppSettings::default());
        project.set_grain_seed(Some(1));
        project.load_image(gradient(40, 30));
        project.set_filter(FilterKind::Brightness, 50);
        project.select_tool(Tool::Rectangle);
        project.pointer_down(5.0, 5.0);
        project.pointer_up(25.0, 20.0);
        assert_eq!(project.shapes.len(), 1);
        let before_paint = project.current().unwrap().clone();

        paint(&mut project, 30, 25, Rgba([0, 0, 0, 255]));
        assert!(project.undo());
        assert_eq!(project.current().unwrap(), &before_paint);

        let filtered = project.filters.render(&before_paint, 1);
        let mut expected = filtered.clone();
        project.shapes.render_all(&mut expected, project.selected);
        assert_ne!(expected, filtered);
        assert_ne!(filtered, before_paint);
        assert_eq!(project.canvas.pixels(), &expected);
        assert_eq!((project.canvas.width, project.canvas.height), (40, 30));
    }

    #[test]
    fn history_cap_drops_oldest_entries() {
        let mut settings = AppSettings::default();
        settings.max_history_steps = 3;
        let mut project = Project::new(&settings);
        project.load_image(RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255])));
        for i in 0..5 {
            paint(&mut project, i % 4, 0, Rgba([i as u8, 0, 0, 255]));
        }
        assert_eq!(project.history.len(), 3);
        assert_eq!(project.history.cursor(), 2);
        assert!(!project.redo());
    }
}
