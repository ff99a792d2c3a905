use crate::components::dialogs::{
    ActiveDialog, ConfirmDialog, DialogResult, SaveProjectDialog, TextPromptDialog,
};
use crate::components::history::{HistoryPanel, HistoryPanelAction};
use crate::components::tools::{InteractionState, PointerOutcome, ToolsPanel, ToolsPanelAction};
use crate::io;
use crate::ops::filters::FilterKind;
use crate::ops::transform::RotateDirection;
use crate::project::{EditorError, Project};
use crate::remote::{self, SaveError};
use crate::settings::AppSettings;
use eframe::egui;
use egui::{Color32, Pos2, Rect, Stroke, Vec2};
use std::path::PathBuf;
use std::sync::mpsc;

// ============================================================================
// CROP OVERLAY STYLE
// ============================================================================

const OVERLAY_BLUE: Color32 = Color32::from_rgb(0, 123, 255);
const OVERLAY_STROKE_WIDTH: f32 = 3.0;
const OVERLAY_DASH: f32 = 10.0;
const OVERLAY_GAP: f32 = 5.0;
const OVERLAY_CORNER: f32 = 10.0;

/// Canvas-to-screen mapping of the image drawn in the central panel.
#[derive(Clone, Copy, Debug, PartialEq)]
struct CanvasView {
    rect: Rect,
    scale: f32,
}

impl CanvasView {
    /// Fit a `width × height` image into `available`, centered, never
    /// upscaled.
    fn fit(available: Rect, width: u32, height: u32) -> Self {
        let size = Vec2::new(width.max(1) as f32, height.max(1) as f32);
        let scale = (available.width() / size.x).min(available.height() / size.y).clamp(0.05, 1.0);
        let rect = Rect::from_center_size(available.center(), size * scale);
        Self { rect, scale }
    }

    fn to_image(&self, pos: Pos2) -> (f32, f32) {
        ((pos.x - self.rect.min.x) / self.scale, (pos.y - self.rect.min.y) / self.scale)
    }

    fn to_screen(&self, x: f32, y: f32) -> Pos2 {
        Pos2::new(self.rect.min.x + x * self.scale, self.rect.min.y + y * self.scale)
    }
}

// ============================================================================
// APP
// ============================================================================

pub struct PhotoEditApp {
    project: Project,
    settings: AppSettings,

    // UI Components
    tools_panel: ToolsPanel,
    history_panel: HistoryPanel,

    // Modal dialog system (at most one open at a time)
    active_dialog: ActiveDialog,

    /// Uploaded canvas texture and the surface generation it shows.
    texture: Option<egui::TextureHandle>,
    texture_generation: u64,
    /// Pointer went down on the canvas and has not been released yet.
    pointer_captured: bool,

    // Async save pipeline
    save_receiver: Option<mpsc::Receiver<Result<Option<i64>, SaveError>>>,

    /// One-line feedback in the status bar.
    status: String,

    /// True after the user confirmed "Discard", so the next close goes through.
    force_exit: bool,

    /// File passed on the command line, opened on the first frame.
    pending_startup_file: Option<PathBuf>,
}

impl PhotoEditApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, startup_file: Option<PathBuf>) -> Self {
        let settings = AppSettings::load();
        let project = Project::new(&settings);

        Self {
            project,
            settings,
            tools_panel: ToolsPanel::default(),
            history_panel: HistoryPanel::default(),
            active_dialog: ActiveDialog::default(),
            texture: None,
            texture_generation: u64::MAX,
            pointer_captured: false,
            save_receiver: None,
            status: "Open an image to start editing".to_string(),
            force_exit: false,
            pending_startup_file: startup_file,
        }
    }

    // ========================================================================
    // ACTIONS
    // ========================================================================

    fn show_error(&mut self, title: &str, error: &dyn std::fmt::Display) {
        crate::log_warn!("{}: {}", title, error);
        self.active_dialog = ActiveDialog::alert(title, error.to_string());
    }

    fn open_file_by_path(&mut self, path: PathBuf) {
        match self.project.open_path(&path) {
            Ok(()) => {
                self.status = format!(
                    "Opened {} ({}×{})",
                    path.display(),
                    self.project.canvas.width,
                    self.project.canvas.height
                );
            }
            Err(e) => self.show_error("Open failed", &e),
        }
    }

    fn handle_open_file(&mut self) {
        if let Some(path) = io::pick_image_path() {
            self.open_file_by_path(path);
        }
    }

    fn handle_download(&mut self) {
        if !self.project.has_image() {
            self.show_error("Download", &EditorError::NoImageLoaded);
            return;
        }
        let Some(path) = io::pick_download_path() else { return };
        match self.project.download(&path) {
            Ok(()) => self.status = format!("Downloaded {}", path.display()),
            Err(e) => self.show_error("Download failed", &e),
        }
    }

    fn open_save_dialog(&mut self) {
        if !self.project.has_image() {
            self.show_error("Save Project", &EditorError::NoImageLoaded);
            return;
        }
        if self.save_receiver.is_some() {
            self.status = "A save is already in progress".to_string();
            return;
        }
        self.active_dialog = ActiveDialog::SaveProject(SaveProjectDialog::new(
            &self.project.title,
            &self.project.description,
            (self.project.canvas.width, self.project.canvas.height),
            self.project.history.len(),
            &self.settings.server_url,
        ));
    }

    fn start_save(&mut self) {
        match self.project.save_request() {
            Ok(request) => {
                self.save_receiver = Some(remote::spawn_save(self.settings.server_url.clone(), request));
                self.status = "Saving project…".to_string();
            }
            Err(e) => self.show_error("Save Project", &e),
        }
    }

    fn poll_save(&mut self) {
        let Some(rx) = &self.save_receiver else { return };
        match rx.try_recv() {
            Ok(Ok(id)) => {
                self.save_receiver = None;
                self.project.mark_saved(id);
                self.status = match id {
                    Some(id) => format!("Project saved (id {})", id),
                    None => "Project saved".to_string(),
                };
                self.active_dialog = ActiveDialog::alert("Save Project", "Project saved successfully!");
            }
            Ok(Err(e)) => {
                self.save_receiver = None;
                self.status = "Save failed".to_string();
                self.show_error("Save failed", &e);
            }
            Err(mpsc::TryRecvError::Empty) => {}
            Err(mpsc::TryRecvError::Disconnected) => {
                self.save_receiver = None;
                self.status = "Save failed".to_string();
            }
        }
    }

    fn rotate(&mut self, direction: RotateDirection) {
        if let Err(e) = self.project.rotate(direction) {
            self.show_error("Rotate", &e);
        }
    }

    fn apply_crop(&mut self) {
        match self.project.apply_crop() {
            Ok(()) => {
                self.status = format!("Cropped to {}×{}", self.project.canvas.width, self.project.canvas.height);
            }
            Err(e) => self.show_error("Crop", &e),
        }
    }

    fn remove_background(&mut self) {
        match self.project.remove_background() {
            Ok(keyed) => self.status = format!("Background removed ({} pixels)", keyed),
            Err(e) => self.show_error("Remove Background", &e),
        }
    }

    fn toggle_compare(&mut self) {
        match self.project.toggle_compare() {
            Ok(true) => self.status = "Showing the original image".to_string(),
            Ok(false) => self.status = "Showing the edited image".to_string(),
            Err(e) => self.show_error("Compare", &e),
        }
    }

    fn undo(&mut self) {
        if self.project.undo() {
            self.status = "Undo".to_string();
        }
    }

    fn redo(&mut self) {
        if self.project.redo() {
            self.status = "Redo".to_string();
        }
    }

    /// Persist the current tool defaults.
    fn persist_settings(&mut self) {
        let props = self.project.props;
        self.settings.brush_size = props.brush_size;
        self.settings.opacity = props.opacity;
        self.settings.color = props.color;
        self.settings.retouch_intensity = props.retouch_intensity;
        self.settings.retouch_softness = props.retouch_softness;
        self.settings.save();
    }

    // ========================================================================
    // INPUT
    // ========================================================================

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let cmd_shift = egui::Modifiers::COMMAND | egui::Modifiers::SHIFT;
        let redo = ctx.input_mut(|i| i.consume_key(cmd_shift, egui::Key::Z));
        let undo = ctx.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, egui::Key::Z));
        let save = ctx.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, egui::Key::S));
        if redo {
            self.redo();
        } else if undo {
            self.undo();
        }
        if save {
            self.open_save_dialog();
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped: Vec<egui::DroppedFile> = ctx.input(|i| i.raw.dropped_files.clone());
        let path = dropped
            .into_iter()
            .filter_map(|f| f.path)
            .find(|p| io::is_supported_image(p));
        if let Some(path) = path {
            self.open_file_by_path(path);
        }
    }

    /// Intercept the OS close button while there are edits to lose.
    fn handle_close_request(&mut self, ctx: &egui::Context) {
        if !ctx.input(|i| i.viewport().close_requested()) {
            return;
        }
        if !self.force_exit && self.settings.confirm_on_exit && self.project.history.len() > 1 {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.active_dialog = ActiveDialog::ConfirmClose(ConfirmDialog::unsaved_changes());
            return;
        }
        self.persist_settings();
    }

    // ========================================================================
    // DIALOGS
    // ========================================================================

    fn show_active_dialog(&mut self, ctx: &egui::Context) {
        match &mut self.active_dialog {
            ActiveDialog::None => {}
            ActiveDialog::Alert(dialog) => {
                if let DialogResult::Ok(()) = dialog.show(ctx) {
                    self.active_dialog = ActiveDialog::None;
                }
            }
            ActiveDialog::ConfirmClose(dialog) => match dialog.show(ctx) {
                DialogResult::Open => {}
                DialogResult::Ok(()) => {
                    self.active_dialog = ActiveDialog::None;
                    self.force_exit = true;
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
                DialogResult::Cancel => self.active_dialog = ActiveDialog::None,
            },
            ActiveDialog::ConfirmClearHistory(dialog) => match dialog.show(ctx) {
                DialogResult::Open => {}
                DialogResult::Ok(()) => {
                    self.active_dialog = ActiveDialog::None;
                    self.project.clear_history();
                    self.status = "History cleared".to_string();
                }
                DialogResult::Cancel => self.active_dialog = ActiveDialog::None,
            },
            ActiveDialog::SaveProject(dialog) => match dialog.show(ctx) {
                DialogResult::Open => {}
                DialogResult::Ok(details) => {
                    self.active_dialog = ActiveDialog::None;
                    self.project.title = details.title;
                    self.project.description = details.description;
                    self.start_save();
                }
                DialogResult::Cancel => self.active_dialog = ActiveDialog::None,
            },
            ActiveDialog::TextPrompt(dialog) => match dialog.show(ctx) {
                DialogResult::Open => {}
                DialogResult::Ok(text) => {
                    let (x, y) = (dialog.x, dialog.y);
                    self.active_dialog = ActiveDialog::None;
                    if let Err(e) = self.project.insert_text(x, y, &text) {
                        self.show_error("Text", &e);
                    }
                }
                DialogResult::Cancel => self.active_dialog = ActiveDialog::None,
            },
        }
    }

    // ========================================================================
    // PANELS
    // ========================================================================

    fn show_menu_bar(&mut self, ctx: &egui::Context) {
        let has_image = self.project.has_image();
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open…").clicked() {
                        self.handle_open_file();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.add_enabled(has_image, egui::Button::new("Download PNG…")).clicked() {
                        self.handle_download();
                        ui.close_menu();
                    }
                    let save = egui::Button::new("Save to Server…").shortcut_text(ctx.format_shortcut(
                        &egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::S),
                    ));
                    if ui.add_enabled(has_image, save).clicked() {
                        self.open_save_dialog();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        ui.close_menu();
                    }
                });
                ui.menu_button("Edit", |ui| {
                    let undo = egui::Button::new("Undo").shortcut_text(ctx.format_shortcut(
                        &egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::Z),
                    ));
                    if ui.add_enabled(self.project.history.can_undo(), undo).clicked() {
                        self.undo();
                        ui.close_menu();
                    }
                    let redo = egui::Button::new("Redo").shortcut_text(ctx.format_shortcut(
                        &egui::KeyboardShortcut::new(
                            egui::Modifiers::COMMAND | egui::Modifiers::SHIFT,
                            egui::Key::Z,
                        ),
                    ));
                    if ui.add_enabled(self.project.history.can_redo(), redo).clicked() {
                        self.redo();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui
                        .add_enabled(self.project.history.len() > 1, egui::Button::new("Clear History"))
                        .clicked()
                    {
                        self.active_dialog = ActiveDialog::confirm_clear_history();
                        ui.close_menu();
                    }
                });
                ui.menu_button("Image", |ui| {
                    if ui.add_enabled(has_image, egui::Button::new("Rotate Left")).clicked() {
                        self.rotate(RotateDirection::CounterClockwise);
                        ui.close_menu();
                    }
                    if ui.add_enabled(has_image, egui::Button::new("Rotate Right")).clicked() {
                        self.rotate(RotateDirection::Clockwise);
                        ui.close_menu();
                    }
                    if ui.add_enabled(has_image, egui::Button::new("Apply Crop")).clicked() {
                        self.apply_crop();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.add_enabled(has_image, egui::Button::new("Remove Background")).clicked() {
                        self.remove_background();
                        ui.close_menu();
                    }
                    let compare_label = if self.project.compare_mode { "Show Edited" } else { "Compare with Original" };
                    if ui.add_enabled(has_image, egui::Button::new(compare_label)).clicked() {
                        self.toggle_compare();
                        ui.close_menu();
                    }
                });
            });
        });
    }

    fn show_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.save_receiver.is_some() {
                    ui.spinner();
                }
                ui.label(self.status.as_str());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if self.project.has_image() {
                        ui.label(format!(
                            "{} × {} px · {}",
                            self.project.canvas.width,
                            self.project.canvas.height,
                            self.project.tool.label()
                        ));
                    }
                });
            });
        });
    }

    fn show_tools_panel(&mut self, ctx: &egui::Context) {
        let mut action = ToolsPanelAction::None;
        egui::SidePanel::left("tools_panel")
            .resizable(false)
            .exact_width(200.0)
            .show(ctx, |ui| {
                action = self.tools_panel.show(ui, &mut self.project);
            });
        match action {
            ToolsPanelAction::None => {}
            ToolsPanelAction::Rotate(direction) => self.rotate(direction),
            ToolsPanelAction::ApplyCrop => self.apply_crop(),
        }
    }

    fn show_adjustments_panel(&mut self, ctx: &egui::Context) {
        let mut history_action = None;
        egui::SidePanel::right("adjustments_panel")
            .resizable(false)
            .exact_width(240.0)
            .show(ctx, |ui| {
                let enabled = self.project.has_image();
                ui.heading("Filters");
                ui.separator();
                ui.add_enabled_ui(enabled, |ui| {
                    for &kind in FilterKind::all() {
                        let (min, max) = kind.range();
                        let mut value = self.project.filters.get(kind);
                        if ui.add(egui::Slider::new(&mut value, min..=max).text(kind.label())).changed() {
                            self.project.set_filter(kind, value);
                        }
                    }
                    ui.horizontal(|ui| {
                        if ui.button("Reset Filters").clicked() {
                            self.project.reset_filters();
                        }
                        let compare = ui.selectable_label(self.project.compare_mode, "Compare");
                        if compare.clicked() {
                            self.toggle_compare();
                        }
                    });
                    if ui.button("Remove Background").clicked() {
                        self.remove_background();
                    }
                });

                ui.add_space(12.0);
                ui.heading("History");
                ui.separator();
                history_action = self.history_panel.show(ui, &self.project.history);
            });
        match history_action {
            Some(HistoryPanelAction::JumpTo(index)) => {
                self.project.jump_to(index);
            }
            Some(HistoryPanelAction::Clear) => {
                self.active_dialog = ActiveDialog::confirm_clear_history();
            }
            None => {}
        }
    }

    fn upload_texture(&mut self, ctx: &egui::Context) {
        let generation = self.project.canvas.generation();
        if self.texture.is_some() && generation == self.texture_generation {
            return;
        }
        let pixels = self.project.canvas.pixels();
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [pixels.width() as usize, pixels.height() as usize],
            pixels.as_raw(),
        );
        match &mut self.texture {
            Some(texture) => texture.set(image, egui::TextureOptions::NEAREST),
            None => {
                self.texture = Some(ctx.load_texture("canvas", image, egui::TextureOptions::NEAREST));
            }
        }
        self.texture_generation = generation;
    }

    fn show_canvas(&mut self, ctx: &egui::Context, modal_open: bool) {
        egui::CentralPanel::default()
            .frame(egui::Frame {
                fill: Color32::from_gray(40),
                ..Default::default()
            })
            .show(ctx, |ui| {
                if !self.project.has_image() {
                    ui.centered_and_justified(|ui| {
                        ui.label(
                            egui::RichText::new("Open an image (File → Open…) or drop one here")
                                .size(16.0)
                                .color(Color32::from_gray(170)),
                        );
                    });
                    return;
                }

                self.upload_texture(ctx);
                let view = CanvasView::fit(ui.max_rect().shrink(16.0), self.project.canvas.width, self.project.canvas.height);
                let painter = ui.painter_at(ui.max_rect());
                paint_checkerboard(&painter, view.rect);
                if let Some(texture) = &self.texture {
                    painter.image(
                        texture.id(),
                        view.rect,
                        Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                        Color32::WHITE,
                    );
                }

                let response = ui.interact(view.rect, ui.id().with("canvas"), egui::Sense::click_and_drag());
                if response.hovered() && !modal_open {
                    ctx.set_cursor_icon(self.project.tool.cursor());
                }
                if !modal_open {
                    self.route_pointer(ui, &response, view);
                }

                if self.project.tool.uses_crop_selection()
                    && (self.project.crop.has_region() || self.project.interaction == InteractionState::DefiningRegion)
                {
                    paint_crop_overlay(&painter, view, &self.project);
                }
            });
    }

    /// Translate raw pointer input over the canvas into session events.
    fn route_pointer(&mut self, ui: &egui::Ui, response: &egui::Response, view: CanvasView) {
        let (pressed, released, pos) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
            )
        });
        let Some(pos) = pos else { return };
        let (x, y) = view.to_image(pos);

        if pressed && response.hovered() {
            self.pointer_captured = true;
            if let PointerOutcome::RequestText { x, y } = self.project.pointer_down(x, y) {
                self.pointer_captured = false;
                self.active_dialog = ActiveDialog::TextPrompt(TextPromptDialog::new(x, y));
            }
            return;
        }
        if !self.pointer_captured {
            return;
        }
        if released {
            self.pointer_captured = false;
            self.project.pointer_up(x, y);
        } else if ui.input(|i| i.pointer.is_moving()) {
            self.project.pointer_move(x, y);
        }
    }
}

fn paint_checkerboard(painter: &egui::Painter, rect: Rect) {
    let cell = 10.0;
    painter.rect_filled(rect, 0.0, Color32::from_gray(200));
    let cols = (rect.width() / cell).ceil() as i32;
    let rows = (rect.height() / cell).ceil() as i32;
    for y in 0..rows {
        for x in 0..cols {
            if (x + y) % 2 == 0 {
                continue;
            }
            let cell_rect = Rect::from_min_size(
                rect.min + Vec2::new(x as f32 * cell, y as f32 * cell),
                Vec2::splat(cell),
            )
            .intersect(rect);
            painter.rect_filled(cell_rect, 0.0, Color32::from_gray(160));
        }
    }
}

/// Dashed blue region with corner markers and a size label.
fn paint_crop_overlay(painter: &egui::Painter, view: CanvasView, project: &Project) {
    let crop = &project.crop;
    let a = view.to_screen(crop.start_x, crop.start_y);
    let b = view.to_screen(crop.end_x, crop.end_y);
    let rect = Rect::from_two_pos(a, b);

    painter.rect_filled(rect, 0.0, Color32::from_rgba_unmultiplied(0, 123, 255, 38));
    let stroke = Stroke::new(OVERLAY_STROKE_WIDTH, OVERLAY_BLUE);
    let outline = [
        rect.left_top(),
        rect.right_top(),
        rect.right_bottom(),
        rect.left_bottom(),
        rect.left_top(),
    ];
    painter.extend(egui::Shape::dashed_line(&outline, stroke, OVERLAY_DASH, OVERLAY_GAP));

    for corner in [rect.left_top(), rect.right_top(), rect.left_bottom(), rect.right_bottom()] {
        painter.rect_filled(Rect::from_center_size(corner, Vec2::splat(OVERLAY_CORNER)), 0.0, OVERLAY_BLUE);
    }

    painter.text(
        a + Vec2::new(10.0, 25.0),
        egui::Align2::LEFT_BOTTOM,
        crop.info_label(),
        egui::FontId::proportional(14.0),
        OVERLAY_BLUE,
    );
}

impl eframe::App for PhotoEditApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // --- Dynamic window title: "PhotoEdit - <title>[*]" ---
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(format!(
            "PhotoEdit - {}",
            self.project.display_title()
        )));

        if let Some(path) = self.pending_startup_file.take() {
            self.open_file_by_path(path);
        }

        self.handle_close_request(ctx);
        self.poll_save();
        if self.save_receiver.is_some() {
            ctx.request_repaint();
        }

        // Block all shortcuts and canvas interaction while a modal is open
        let modal_open = !self.active_dialog.is_none();
        if !modal_open {
            self.handle_dropped_files(ctx);
            self.handle_shortcuts(ctx);
        }

        self.show_menu_bar(ctx);
        self.show_status_bar(ctx);
        self.show_tools_panel(ctx);
        self.show_adjustments_panel(ctx);
        self.show_canvas(ctx, modal_open);
        self.show_active_dialog(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_view_maps_both_ways() {
        let available = Rect::from_min_size(Pos2::new(100.0, 50.0), Vec2::new(400.0, 300.0));
        let view = CanvasView::fit(available, 800, 600);
        assert_eq!(view.scale, 0.5);
        assert_eq!(view.rect, available);

        let (x, y) = view.to_image(Pos2::new(150.0, 100.0));
        assert_eq!((x, y), (100.0, 100.0));
        assert_eq!(view.to_screen(x, y), Pos2::new(150.0, 100.0));
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let available = Rect::from_min_size(Pos2::ZERO, Vec2::new(1000.0, 1000.0));
        let view = CanvasView::fit(available, 200, 100);
        assert_eq!(view.scale, 1.0);
        assert_eq!(view.rect.size(), Vec2::new(200.0, 100.0));
        assert_eq!(view.rect.center(), Pos2::new(500.0, 500.0));
    }
}
