// ============================================================================
// DIALOGS - modal windows for save, alerts, close confirmation and text entry
// ============================================================================

use eframe::egui;
use egui::{Color32, Pos2, Rect, Rounding, Sense, Vec2};

// ============================================================================
// ACTIVE-DIALOG ENUM - at most one modal dialog is open at a time
// ============================================================================

#[derive(Default)]
pub enum ActiveDialog {
    #[default]
    None,
    SaveProject(SaveProjectDialog),
    Alert(AlertDialog),
    ConfirmClose(ConfirmDialog),
    ConfirmClearHistory(ConfirmDialog),
    TextPrompt(TextPromptDialog),
}

impl ActiveDialog {
    /// Returns true if no dialog is currently open.
    pub fn is_none(&self) -> bool {
        matches!(self, ActiveDialog::None)
    }

    pub fn alert(title: impl Into<String>, message: impl Into<String>) -> Self {
        ActiveDialog::Alert(AlertDialog::new(title, message))
    }

    /// Gate for the irreversible "Clear History".
    pub fn confirm_clear_history() -> Self {
        ActiveDialog::ConfirmClearHistory(ConfirmDialog::new(
            "Clear the whole history? This cannot be undone and removes every shape.",
            "Clear",
        ))
    }
}

/// Result returned by each dialog's `show()` method every frame.
#[derive(Debug, PartialEq)]
pub enum DialogResult<T> {
    /// Dialog is still open, no action needed this frame.
    Open,
    /// User confirmed - contains the final values.
    Ok(T),
    /// User cancelled.
    Cancel,
}

// ============================================================================
// SHARED DIALOG STYLING HELPERS
// ============================================================================

/// Colors extracted from the current egui visuals for dialog rendering.
pub(crate) struct DialogColors {
    pub accent: Color32,
    pub accent_faint: Color32,
    pub text_muted: Color32,
    pub error: Color32,
}

impl DialogColors {
    pub(crate) fn from_ctx(ctx: &egui::Context) -> Self {
        let v = ctx.style().visuals.clone();
        let accent = v.selection.stroke.color;
        let alpha = if v.dark_mode { 35 } else { 25 };
        // In dark mode, boost muted text so labels stay readable
        let text_muted = if v.dark_mode {
            Color32::from_gray(160)
        } else {
            v.weak_text_color()
        };
        Self {
            accent,
            accent_faint: Color32::from_rgba_unmultiplied(accent.r(), accent.g(), accent.b(), alpha),
            text_muted,
            error: v.error_fg_color,
        }
    }
}

/// Paint the accent header bar with icon + title.
pub(crate) fn paint_dialog_header(ui: &mut egui::Ui, colors: &DialogColors, icon: &str, title: &str) {
    let header_height = 32.0;
    let (rect, _) = ui.allocate_exact_size(Vec2::new(ui.available_width(), header_height), Sense::hover());

    let painter = ui.painter();
    painter.rect_filled(rect, Rounding::ZERO, colors.accent_faint);
    painter.rect_filled(
        Rect::from_min_size(rect.min, Vec2::new(3.0, header_height)),
        Rounding::ZERO,
        colors.accent,
    );
    painter.text(
        Pos2::new(rect.min.x + 12.0, rect.center().y),
        egui::Align2::LEFT_CENTER,
        format!("{} {}", icon, title),
        egui::FontId::proportional(14.0),
        colors.accent,
    );
}

/// Styled section label.
pub(crate) fn section_label(ui: &mut egui::Ui, colors: &DialogColors, text: &str) {
    ui.add_space(6.0);
    ui.horizontal(|ui| {
        ui.add_space(2.0);
        ui.label(egui::RichText::new(text).size(11.0).color(colors.text_muted).strong());
    });
    ui.add_space(2.0);
}

/// Thin separator line using the faint accent color.
pub(crate) fn accent_separator(ui: &mut egui::Ui, colors: &DialogColors) {
    let (rect, _) = ui.allocate_exact_size(Vec2::new(ui.available_width(), 1.0), Sense::hover());
    ui.painter().rect_filled(rect, 0.0, colors.accent_faint);
}

/// Right-aligned confirm / cancel footer.  Returns (ok_clicked, cancel_clicked).
/// `cancel_label` of `None` hides the cancel button.
pub(crate) fn dialog_footer(
    ui: &mut egui::Ui,
    colors: &DialogColors,
    ok_label: &str,
    cancel_label: Option<&str>,
) -> (bool, bool) {
    let mut ok = false;
    let mut cancel = false;
    ui.add_space(4.0);
    accent_separator(ui, colors);
    ui.add_space(6.0);
    ui.horizontal(|ui| {
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if let Some(label) = cancel_label
                && ui.button(label).clicked()
            {
                cancel = true;
            }
            let ok_btn = egui::Button::new(
                egui::RichText::new(format!("  {}  ", ok_label)).color(Color32::WHITE).strong(),
            )
            .fill(colors.accent);
            if ui.add(ok_btn).clicked() {
                ok = true;
            }
        });
    });
    (ok, cancel)
}

/// Enter / Escape for the frontmost dialog.
fn consume_enter_esc(ctx: &egui::Context) -> (bool, bool) {
    let enter = ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Enter));
    let esc = ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Escape));
    (enter, esc)
}

fn modal_window(id: &str) -> egui::Window<'static> {
    egui::Window::new(id.to_string())
        .title_bar(false)
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
}

// ============================================================================
// SAVE PROJECT DIALOG
// ============================================================================

/// Values confirmed in the save dialog.
#[derive(Clone, Debug, PartialEq)]
pub struct SaveDetails {
    pub title: String,
    pub description: String,
}

pub struct SaveProjectDialog {
    title: String,
    description: String,
    width: u32,
    height: u32,
    history_len: usize,
    server_url: String,
}

impl SaveProjectDialog {
    pub fn new(title: &str, description: &str, size: (u32, u32), history_len: usize, server_url: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            width: size.0,
            height: size.1,
            history_len,
            server_url: server_url.to_string(),
        }
    }

    /// Confirmed values, with the title defaulted.
    fn details(&self) -> SaveDetails {
        let title = self.title.trim();
        SaveDetails {
            title: if title.is_empty() { "Untitled".to_string() } else { title.to_string() },
            description: self.description.trim().to_string(),
        }
    }

    pub fn show(&mut self, ctx: &egui::Context) -> DialogResult<SaveDetails> {
        let mut result = DialogResult::Open;
        // Enter stays with the multi-line description
        let esc = ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Escape));
        if esc {
            return DialogResult::Cancel;
        }

        modal_window("save_project_dialog_internal").show(ctx, |ui| {
            ui.set_min_width(380.0);
            let colors = DialogColors::from_ctx(ctx);
            paint_dialog_header(ui, &colors, "\u{2601}", "Save Project");
            ui.add_space(6.0);

            section_label(ui, &colors, "PROJECT");
            egui::Grid::new("save_project_grid")
                .num_columns(2)
                .min_col_width(80.0)
                .spacing([8.0, 6.0])
                .show(ui, |ui| {
                    ui.label("Title");
                    ui.add(egui::TextEdit::singleline(&mut self.title).hint_text("Untitled").desired_width(260.0));
                    ui.end_row();

                    ui.label("Description");
                    ui.add(egui::TextEdit::multiline(&mut self.description).desired_rows(3).desired_width(260.0));
                    ui.end_row();
                });

            accent_separator(ui, &colors);
            section_label(ui, &colors, "DETAILS");
            ui.label(
                egui::RichText::new(format!(
                    "{} × {} px · {} history steps\n→ {}",
                    self.width,
                    self.height,
                    self.history_len,
                    crate::remote::save_url(&self.server_url)
                ))
                .color(colors.text_muted),
            );

            let (ok, cancel) = dialog_footer(ui, &colors, "Save", Some("Cancel"));
            if ok {
                result = DialogResult::Ok(self.details());
            } else if cancel {
                result = DialogResult::Cancel;
            }
        });
        result
    }
}

// ============================================================================
// ALERT DIALOG
// ============================================================================

pub struct AlertDialog {
    title: String,
    message: String,
}

impl AlertDialog {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `Ok(())` once dismissed.
    pub fn show(&mut self, ctx: &egui::Context) -> DialogResult<()> {
        let mut result = DialogResult::Open;
        let (enter, esc) = consume_enter_esc(ctx);
        if enter || esc {
            return DialogResult::Ok(());
        }

        modal_window("alert_dialog_internal").show(ctx, |ui| {
            ui.set_min_width(320.0);
            ui.set_max_width(420.0);
            let colors = DialogColors::from_ctx(ctx);
            paint_dialog_header(ui, &colors, "\u{26A0}", &self.title);
            ui.add_space(8.0);
            ui.label(self.message.as_str());
            let (ok, _) = dialog_footer(ui, &colors, "OK", None);
            if ok {
                result = DialogResult::Ok(());
            }
        });
        result
    }
}

// ============================================================================
// CONFIRM DIALOG
// ============================================================================

pub struct ConfirmDialog {
    message: String,
    confirm_label: String,
}

impl ConfirmDialog {
    pub fn new(message: impl Into<String>, confirm_label: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            confirm_label: confirm_label.into(),
        }
    }

    /// The close-window guard.
    pub fn unsaved_changes() -> Self {
        Self::new(
            "You have unsaved changes. Close the editor and discard them?",
            "Discard",
        )
    }

    pub fn show(&mut self, ctx: &egui::Context) -> DialogResult<()> {
        let mut result = DialogResult::Open;
        let (enter, esc) = consume_enter_esc(ctx);
        if esc {
            return DialogResult::Cancel;
        }
        if enter {
            return DialogResult::Ok(());
        }

        modal_window("confirm_dialog_internal").show(ctx, |ui| {
            ui.set_min_width(340.0);
            let colors = DialogColors::from_ctx(ctx);
            paint_dialog_header(ui, &colors, "\u{2753}", "Are you sure?");
            ui.add_space(8.0);
            ui.label(egui::RichText::new(&self.message).color(colors.error));
            let (ok, cancel) = dialog_footer(ui, &colors, &self.confirm_label, Some("Cancel"));
            if ok {
                result = DialogResult::Ok(());
            } else if cancel {
                result = DialogResult::Cancel;
            }
        });
        result
    }
}

// ============================================================================
// TEXT PROMPT DIALOG
// ============================================================================

/// Asks for the text to stamp at an image position.
pub struct TextPromptDialog {
    pub x: f32,
    pub y: f32,
    text: String,
    focus_requested: bool,
}

impl TextPromptDialog {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            text: String::new(),
            focus_requested: false,
        }
    }

    /// Entered text; empty input counts as cancel.
    fn entered(&self) -> DialogResult<String> {
        if self.text.trim().is_empty() {
            DialogResult::Cancel
        } else {
            DialogResult::Ok(self.text.clone())
        }
    }

    pub fn show(&mut self, ctx: &egui::Context) -> DialogResult<String> {
        let mut result = DialogResult::Open;
        let (enter, esc) = consume_enter_esc(ctx);
        if esc {
            return DialogResult::Cancel;
        }
        if enter {
            return self.entered();
        }

        modal_window("text_prompt_dialog_internal").show(ctx, |ui| {
            ui.set_min_width(320.0);
            let colors = DialogColors::from_ctx(ctx);
            paint_dialog_header(ui, &colors, "T", "Insert Text");
            ui.add_space(6.0);
            section_label(ui, &colors, &format!("AT ({:.0}, {:.0})", self.x, self.y));
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.text)
                    .hint_text("Enter text")
                    .desired_width(f32::INFINITY),
            );
            if !self.focus_requested {
                response.request_focus();
                self.focus_requested = true;
            }
            let (ok, cancel) = dialog_footer(ui, &colors, "Insert", Some("Cancel"));
            if ok {
                result = self.entered();
            } else if cancel {
                result = DialogResult::Cancel;
            }
        });
        result
    }
}
