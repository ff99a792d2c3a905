use eframe::egui;
use egui::Color32;
use image::Rgba;

use crate::ops::retouch::{RetouchParams, retouch_dab};
use crate::ops::shapes::{PaintMode, ResizeHandle, Shape, ShapeId, ShapeKind, stroke_segment};
use crate::ops::transform::{AspectRatio, CropRect, RotateDirection};
use crate::project::Project;
use crate::settings::AppSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
    Retouch,
    Select,
    Crop,
    Rectangle,
    Circle,
    Line,
    Text,
}

impl Tool {
    pub fn all() -> &'static [Tool] {
        &[
            Tool::Brush,
            Tool::Eraser,
            Tool::Retouch,
            Tool::Select,
            Tool::Crop,
            Tool::Rectangle,
            Tool::Circle,
            Tool::Line,
            Tool::Text,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tool::Brush => "Brush",
            Tool::Eraser => "Eraser",
            Tool::Retouch => "Retouch",
            Tool::Select => "Select",
            Tool::Crop => "Crop",
            Tool::Rectangle => "Rectangle",
            Tool::Circle => "Circle",
            Tool::Line => "Line",
            Tool::Text => "Text",
        }
    }

    /// The shape a shape tool creates.
    pub fn shape_kind(&self) -> Option<ShapeKind> {
        match self {
            Tool::Rectangle => Some(ShapeKind::Rectangle),
            Tool::Circle => Some(ShapeKind::Circle),
            Tool::Line => Some(ShapeKind::Line),
            _ => None,
        }
    }

    pub fn is_freehand(&self) -> bool {
        matches!(self, Tool::Brush | Tool::Eraser | Tool::Retouch)
    }

    /// Select and crop share the region selection.
    pub fn uses_crop_selection(&self) -> bool {
        matches!(self, Tool::Select | Tool::Crop)
    }

    /// Pointer cursor shown over the canvas.
    pub fn cursor(&self) -> egui::CursorIcon {
        match self {
            Tool::Text => egui::CursorIcon::Text,
            _ => egui::CursorIcon::Crosshair,
        }
    }
}

// ============================================================================
// TOOL PROPERTIES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToolProperties {
    pub color: Rgba<u8>,
    /// Stroke width, retouch radius and half the text size, in pixels.
    pub brush_size: f32,
    /// 0..1, multiplies the colour alpha.
    pub opacity: f32,
    /// 0..1 blend strength of the retouch brush.
    pub retouch_intensity: f32,
    /// Half-width of the retouch averaging neighbourhood.
    pub retouch_softness: u32,
}

impl Default for ToolProperties {
    fn default() -> Self {
        Self {
            color: Rgba([0, 0, 0, 255]),
            brush_size: 10.0,
            opacity: 1.0,
            retouch_intensity: 0.5,
            retouch_softness: 3,
        }
    }
}

impl ToolProperties {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            color: settings.color,
            brush_size: settings.brush_size,
            opacity: settings.opacity,
            retouch_intensity: settings.retouch_intensity,
            retouch_softness: settings.retouch_softness,
        }
    }

    pub fn retouch_params(&self) -> RetouchParams {
        RetouchParams {
            radius: self.brush_size,
            intensity: self.retouch_intensity,
            softness: self.retouch_softness,
        }
    }
}

// ============================================================================
// INTERACTION STATE
// ============================================================================

/// What the current pointer gesture is doing.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    /// Brush/eraser/retouch; the last pointer position of the stroke.
    DrawingFreehand { last_x: f32, last_y: f32 },
    /// The shape's start point follows the pointer minus `offset`.
    DraggingShape { id: ShapeId, offset_x: f32, offset_y: f32 },
    ResizingShape { id: ShapeId, handle: ResizeHandle },
    /// Select/crop region or a shape being drawn from the crop start point.
    DefiningRegion,
}

/// Region shared by the select and crop tools (also the anchor of shapes
/// being drawn).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CropSelection {
    pub start_x: f32,
    pub start_y: f32,
    pub end_x: f32,
    pub end_y: f32,
    pub ratio: AspectRatio,
}

impl CropSelection {
    /// Forget the coordinates, keep the ratio.
    pub fn clear_coords(&mut self) {
        *self = Self { ratio: self.ratio, ..Self::default() };
    }

    /// A region counts as defined once both end coordinates are non-zero.
    pub fn has_region(&self) -> bool {
        self.end_x != 0.0 && self.end_y != 0.0
    }

    pub fn rect(&self) -> CropRect {
        CropRect::from_corners(self.start_x, self.start_y, self.end_x, self.end_y)
    }

    /// Size readout drawn next to the region, e.g. `"120 × 90 px (4:3)"`.
    pub fn info_label(&self) -> String {
        let w = (self.end_x - self.start_x).abs().round();
        let h = (self.end_y - self.start_y).abs().round();
        match self.ratio {
            AspectRatio::Free => format!("{} × {} px", w, h),
            ratio => format!("{} × {} px ({})", w, h, ratio),
        }
    }
}

/// Side effect of a pointer event that the UI has to carry out.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum PointerOutcome {
    #[default]
    None,
    /// The text tool was clicked: prompt for a string, then call
    /// `Project::insert_text(x, y, ..)`.
    RequestText { x: f32, y: f32 },
}

// ============================================================================
// POINTER HANDLING
// ============================================================================

impl Project {
    /// Switching to any tool other than select/crop drops the region
    /// coordinates (the ratio survives).
    pub fn select_tool(&mut self, tool: Tool) {
        if !tool.uses_crop_selection() {
            self.crop.clear_coords();
        }
        self.tool = tool;
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) -> PointerOutcome {
        if !self.has_image() {
            return PointerOutcome::None;
        }

        // Resize handle of the selected shape?
        if let Some(id) = self.selected
            && let Some(handle) = self.shapes.resize_handle_at(id, x, y)
        {
            self.interaction = InteractionState::ResizingShape { id, handle };
            return PointerOutcome::None;
        }

        // Existing shape? (any tool)
        if let Some(id) = self.shapes.shape_at(x, y) {
            if let Some(shape) = self.shapes.get(id) {
                self.interaction = InteractionState::DraggingShape {
                    id,
                    offset_x: x - shape.start_x,
                    offset_y: y - shape.start_y,
                };
            }
            self.selected = Some(id);
            self.render();
            return PointerOutcome::None;
        }

        if self.selected.take().is_some() {
            self.render();
        }

        match self.tool {
            Tool::Brush | Tool::Eraser | Tool::Retouch => {
                self.interaction = InteractionState::DrawingFreehand { last_x: x, last_y: y };
            }
            Tool::Select | Tool::Crop | Tool::Rectangle | Tool::Circle | Tool::Line => {
                self.pre_stroke = Some(self.canvas.pixels().clone());
                self.crop.start_x = x;
                self.crop.start_y = y;
                self.interaction = InteractionState::DefiningRegion;
            }
            Tool::Text => {
                return PointerOutcome::RequestText { x, y };
            }
        }
        PointerOutcome::None
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        match self.interaction {
            InteractionState::Idle => {}
            InteractionState::ResizingShape { id, handle } => {
                if let Some(shape) = self.shapes.get_mut(id) {
                    shape.apply_resize(handle, x, y);
                    self.render();
                }
            }
            InteractionState::DraggingShape { id, offset_x, offset_y } => {
                if let Some(shape) = self.shapes.get_mut(id) {
                    shape.move_start_to(x - offset_x, y - offset_y);
                    self.render();
                }
            }
            InteractionState::DrawingFreehand { last_x, last_y } => {
                self.freehand_segment(last_x, last_y, x, y);
                self.interaction = InteractionState::DrawingFreehand { last_x: x, last_y: y };
            }
            InteractionState::DefiningRegion => {
                if let Some(kind) = self.tool.shape_kind() {
                    self.preview_shape(kind, x, y);
                } else {
                    let (w, h) = self.crop.ratio.constrain(x - self.crop.start_x, y - self.crop.start_y);
                    self.crop.end_x = self.crop.start_x + w;
                    self.crop.end_y = self.crop.start_y + h;
                }
            }
        }
    }

    pub fn pointer_up(&mut self, x: f32, y: f32) {
        let interaction = std::mem::take(&mut self.interaction);
        match interaction {
            InteractionState::Idle => {}
            InteractionState::ResizingShape { .. } => {
                self.push_history("Resize Shape");
            }
            InteractionState::DraggingShape { .. } => {
                self.push_history("Move Shape");
            }
            InteractionState::DrawingFreehand { .. } => {
                self.render();
                let description = match self.tool {
                    Tool::Eraser => "Eraser",
                    Tool::Retouch => "Retouch",
                    _ => "Brush Stroke",
                };
                self.push_history(description);
            }
            InteractionState::DefiningRegion => {
                self.pre_stroke = None;
                if let Some(kind) = self.tool.shape_kind() {
                    let shape = self.new_shape(kind, x, y);
                    self.shapes.append(shape);
                    self.render();
                    self.push_history(kind.label());
                } else {
                    if self.crop.ratio == AspectRatio::Free {
                        self.crop.end_x = x;
                        self.crop.end_y = y;
                    }
                    self.push_history("Selection");
                }
            }
        }
    }

    /// Paint one freehand segment (or retouch dab) into `current` and onto
    /// the visible surface.
    fn freehand_segment(&mut self, ax: f32, ay: f32, bx: f32, by: f32) {
        let props = self.props;
        let tool = self.tool;
        let Some(current) = self.current.as_mut() else { return };

        if tool == Tool::Retouch {
            let params = props.retouch_params();
            retouch_dab(current, bx, by, params);
            retouch_dab(self.canvas.pixels_mut(), bx, by, params);
            return;
        }

        let mode = if tool == Tool::Eraser { PaintMode::Erase } else { PaintMode::Over };
        let half = props.brush_size.max(1.0) * 0.5;
        stroke_segment(current, ax, ay, bx, by, half, props.color, props.opacity, mode);
        stroke_segment(self.canvas.pixels_mut(), ax, ay, bx, by, half, props.color, props.opacity, mode);
    }

    /// Restore the pre-stroke surface and draw the shape being dragged out.
    fn preview_shape(&mut self, kind: ShapeKind, x: f32, y: f32) {
        let Some(pre) = self.pre_stroke.as_ref() else { return };
        let mut surface = pre.clone();
        self.new_shape(kind, x, y).rasterize(&mut surface);
        self.canvas.set_image(surface);
    }

    fn new_shape(&self, kind: ShapeKind, x: f32, y: f32) -> Shape {
        Shape {
            kind,
            start_x: self.crop.start_x,
            start_y: self.crop.start_y,
            end_x: x,
            end_y: y,
            color: self.props.color,
            line_width: self.props.brush_size,
            opacity: self.props.opacity,
        }
    }
}

// ============================================================================
// TOOLS PANEL (left side bar)
// ============================================================================

/// Action returned from the tools panel that needs the app (errors go to
/// an alert dialog).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ToolsPanelAction {
    None,
    Rotate(RotateDirection),
    ApplyCrop,
}

#[derive(Default)]
pub struct ToolsPanel {
    /// Text of the custom "A:B" field in the crop section.
    custom_ratio: String,
    /// Last parse error of the custom ratio field.
    ratio_error: Option<String>,
}

impl ToolsPanel {
    pub fn show(&mut self, ui: &mut egui::Ui, project: &mut Project) -> ToolsPanelAction {
        let mut action = ToolsPanelAction::None;

        ui.heading("Tools");
        ui.separator();

        egui::Grid::new("tool_grid").num_columns(3).show(ui, |ui| {
            for (i, &tool) in Tool::all().iter().enumerate() {
                if ui.selectable_label(project.tool == tool, tool.label()).clicked() {
                    project.select_tool(tool);
                }
                if i % 3 == 2 {
                    ui.end_row();
                }
            }
        });

        ui.separator();
        self.show_properties(ui, project);

        if project.tool == Tool::Retouch {
            ui.separator();
            ui.label(egui::RichText::new("Retouch").strong());
            ui.add(
                egui::Slider::new(&mut project.props.retouch_intensity, 0.0..=1.0).text("Intensity"),
            );
            ui.add(egui::Slider::new(&mut project.props.retouch_softness, 1..=10).text("Softness"));
        }

        if project.tool == Tool::Crop {
            ui.separator();
            action = self.show_crop_section(ui, project);
        }

        action
    }

    fn show_properties(&mut self, ui: &mut egui::Ui, project: &mut Project) {
        let props = &mut project.props;
        ui.horizontal(|ui| {
            ui.label("Color");
            let c = props.color;
            let mut color = Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3]);
            if ui.color_edit_button_srgba(&mut color).changed() {
                props.color = Rgba(color.to_srgba_unmultiplied());
            }
        });
        ui.add(egui::Slider::new(&mut props.brush_size, 1.0..=100.0).text("Size"));
        ui.add(egui::Slider::new(&mut props.opacity, 0.0..=1.0).text("Opacity"));
    }

    fn show_crop_section(&mut self, ui: &mut egui::Ui, project: &mut Project) -> ToolsPanelAction {
        let mut action = ToolsPanelAction::None;
        ui.label(egui::RichText::new("Crop").strong());

        ui.horizontal_wrapped(|ui| {
            for preset in AspectRatio::presets() {
                let active = project.crop.ratio.to_string() == *preset;
                let label = if *preset == "free" { "Free" } else { *preset };
                if ui.selectable_label(active, label).clicked()
                    && let Err(e) = project.set_aspect_ratio(preset)
                {
                    self.ratio_error = Some(e.to_string());
                }
            }
        });

        ui.horizontal(|ui| {
            ui.label("Custom");
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.custom_ratio)
                    .hint_text("A:B")
                    .desired_width(60.0),
            );
            let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Set").clicked() || submitted {
                self.ratio_error = project.set_aspect_ratio(&self.custom_ratio).err().map(|e| e.to_string());
            }
        });
        if let Some(err) = &self.ratio_error {
            ui.colored_label(Color32::from_rgb(220, 80, 80), err);
        }

        ui.horizontal(|ui| {
            if ui.button("⟲ Rotate Left").clicked() {
                action = ToolsPanelAction::Rotate(RotateDirection::CounterClockwise);
            }
            if ui.button("⟳ Rotate Right").clicked() {
                action = ToolsPanelAction::Rotate(RotateDirection::Clockwise);
            }
        });
        if ui.button("Apply Crop").clicked() {
            action = ToolsPanelAction::ApplyCrop;
        }
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::tests::loaded_project;

    #[test]
    fn pointer_events_before_a_load_do_nothing() {
        let mut project = Project::new(&AppSettings::default());
        assert_eq!(project.pointer_down(5.0, 5.0), PointerOutcome::None);
        project.pointer_move(20.0, 20.0);
        project.pointer_up(20.0, 20.0);
        assert!(project.history.is_empty());
        assert!(project.shapes.is_empty());
        assert_eq!(project.interaction, InteractionState::Idle);
    }

    #[test]
    fn switching_tools_clears_region_but_keeps_ratio() {
        let mut project = loaded_project(100, 100);
        project.select_tool(Tool::Crop);
        project.set_aspect_ratio("4:3").unwrap();
        project.pointer_down(10.0, 10.0);
        project.pointer_move(50.0, 30.0);
        project.pointer_up(50.0, 30.0);
        assert!(project.crop.has_region());

        project.select_tool(Tool::Select);
        assert!(project.crop.has_region());
        project.select_tool(Tool::Brush);
        assert!(!project.crop.has_region());
        assert_eq!(project.crop.ratio, AspectRatio::Fixed { a: 4.0, b: 3.0 });
    }

    #[test]
    fn constrained_region_keeps_ratio_and_drag_direction() {
        let mut project = loaded_project(200, 200);
        project.select_tool(Tool::Crop);
        project.set_aspect_ratio("2:1").unwrap();
        project.pointer_down(100.0, 100.0);
        project.pointer_move(40.0, 130.0);
        project.pointer_up(41.0, 131.0);
        // |dx| = 60 drives, dy keeps its positive sign
        assert_eq!((project.crop.end_x, project.crop.end_y), (40.0, 130.0));
        assert_eq!(project.crop.info_label(), "60 × 30 px (2:1)");
    }

    #[test]
    fn free_region_ends_at_release_point() {
        let mut project = loaded_project(100, 100);
        project.select_tool(Tool::Select);
        project.pointer_down(10.0, 10.0);
        project.pointer_move(40.0, 40.0);
        project.pointer_up(45.0, 60.0);
        assert_eq!((project.crop.end_x, project.crop.end_y), (45.0, 60.0));
        assert_eq!(project.history.len(), 2);
    }

    #[test]
    fn shape_tool_appends_on_release_without_accumulating_previews() {
        let mut project = loaded_project(100, 100);
        project.props.color = Rgba([255, 0, 0, 255]);
        project.props.brush_size = 2.0;
        project.select_tool(Tool::Rectangle);
        project.pointer_down(10.0, 10.0);
        project.pointer_move(80.0, 80.0);
        project.pointer_move(30.0, 30.0);
        // The abandoned 80x80 preview is gone from the surface
        assert_eq!(project.canvas.get_pixel(80, 50), Rgba([255, 255, 255, 255]));
        project.pointer_up(30.0, 30.0);

        assert_eq!(project.shapes.len(), 1);
        let (_, shape) = project.shapes.iter().next().unwrap();
        assert_eq!((shape.start_x, shape.start_y, shape.end_x, shape.end_y), (10.0, 10.0, 30.0, 30.0));
        assert_eq!(shape.line_width, 2.0);
        assert_eq!(project.history.len(), 2);
        assert_eq!(project.history.entries()[1].description, "Rectangle");
        // Shape is an overlay: `current` is untouched
        assert_eq!(*project.current().unwrap().get_pixel(10, 20), Rgba([255, 255, 255, 255]));
        assert_eq!(project.canvas.get_pixel(10, 20)[1], 0);
    }

    #[test]
    fn clicking_a_shape_selects_and_drags_it() {
        let mut project = loaded_project(100, 100);
        project.select_tool(Tool::Rectangle);
        project.pointer_down(10.0, 10.0);
        project.pointer_up(30.0, 30.0);

        // Any tool can grab a shape
        project.select_tool(Tool::Brush);
        project.pointer_down(20.0, 20.0);
        let id = project.selected.unwrap();
        project.pointer_move(50.0, 25.0);
        project.pointer_up(50.0, 25.0);

        let shape = project.shapes.get(id).unwrap();
        assert_eq!((shape.start_x, shape.start_y, shape.end_x, shape.end_y), (40.0, 15.0, 60.0, 35.0));
        assert_eq!(project.history.entries().last().unwrap().description, "Move Shape");
        // The brush did not paint while dragging
        assert_eq!(*project.current().unwrap().get_pixel(50, 25), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn selected_shape_resizes_from_its_handle() {
        let mut project = loaded_project(100, 100);
        project.select_tool(Tool::Rectangle);
        project.pointer_down(10.0, 10.0);
        project.pointer_up(40.0, 40.0);
        project.pointer_down(25.0, 25.0);
        project.pointer_up(25.0, 25.0);
        let id = project.selected.unwrap();

        // Grab the bottom-right handle within the 8px box
        project.pointer_down(45.0, 36.0);
        assert!(matches!(
            project.interaction,
            InteractionState::ResizingShape { handle: ResizeHandle::BottomRight, .. }
        ));
        project.pointer_move(70.0, 60.0);
        project.pointer_up(70.0, 60.0);
        let shape = project.shapes.get(id).unwrap();
        assert_eq!((shape.end_x, shape.end_y), (70.0, 60.0));
        assert_eq!(project.history.entries().last().unwrap().description, "Resize Shape");
    }

    #[test]
    fn clicking_empty_space_clears_selection() {
        let mut project = loaded_project(100, 100);
        project.select_tool(Tool::Line);
        project.pointer_down(10.0, 10.0);
        project.pointer_up(90.0, 10.0);
        project.pointer_down(50.0, 12.0);
        project.pointer_up(50.0, 12.0);
        assert!(project.selected.is_some());

        project.pointer_down(50.0, 80.0);
        assert!(project.selected.is_none());
    }

    #[test]
    fn brush_commits_into_current_and_eraser_clears_alpha() {
        let mut project = loaded_project(60, 60);
        project.props.color = Rgba([0, 0, 255, 255]);
        project.select_tool(Tool::Brush);
        project.pointer_down(10.0, 30.0);
        project.pointer_move(50.0, 30.0);
        project.pointer_up(50.0, 30.0);
        assert_eq!(*project.current().unwrap().get_pixel(30, 30), Rgba([0, 0, 255, 255]));
        assert_eq!(project.canvas.get_pixel(30, 30), Rgba([0, 0, 255, 255]));
        assert_eq!(project.history.entries()[1].description, "Brush Stroke");

        project.select_tool(Tool::Eraser);
        project.pointer_down(30.0, 10.0);
        project.pointer_move(30.0, 50.0);
        project.pointer_up(30.0, 50.0);
        assert_eq!(project.current().unwrap().get_pixel(30, 20)[3], 0);
        assert_eq!(project.history.len(), 3);
    }

    #[test]
    fn half_opacity_brush_blends() {
        let mut project = loaded_project(40, 40);
        project.props.color = Rgba([0, 0, 0, 255]);
        project.props.opacity = 0.5;
        project.pointer_down(5.0, 20.0);
        project.pointer_move(35.0, 20.0);
        project.pointer_up(35.0, 20.0);
        let px = project.current().unwrap().get_pixel(20, 20);
        assert!((126..=129).contains(&px[0]), "{:?}", px);
    }

    #[test]
    fn text_tool_requests_a_prompt() {
        let mut project = loaded_project(50, 50);
        project.select_tool(Tool::Text);
        assert_eq!(project.pointer_down(12.0, 30.0), PointerOutcome::RequestText { x: 12.0, y: 30.0 });
        project.pointer_up(12.0, 30.0);
        assert_eq!(project.history.len(), 1);
    }

    #[test]
    fn retouch_softens_current_on_move() {
        let mut project = loaded_project(40, 40);
        if let Some(current) = project.current.as_mut() {
            for y in 0..40 {
                for x in 20..40 {
                    current.put_pixel(x, y, Rgba([0, 0, 0, 255]));
                }
            }
        }
        project.render();
        project.props.brush_size = 8.0;
        project.props.retouch_intensity = 1.0;
        project.select_tool(Tool::Retouch);
        project.pointer_down(20.0, 20.0);
        project.pointer_move(20.0, 20.0);
        project.pointer_up(20.0, 20.0);
        let edge = project.current().unwrap().get_pixel(20, 20)[0];
        assert!(edge > 0 && edge < 255);
        assert_eq!(project.history.entries()[1].description, "Retouch");
    }
}
