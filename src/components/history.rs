use eframe::egui;

use crate::canvas::ImageSnapshot;

// ============================================================================
// HISTORY ENTRY
// ============================================================================

/// One point in the edit history: a full-canvas snapshot plus a short
/// description for the history panel.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub description: String,
    pub snapshot: ImageSnapshot,
}

impl HistoryEntry {
    fn memory_size(&self) -> usize {
        self.snapshot.memory_bytes() + self.description.len()
    }
}

// ============================================================================
// HISTORY MANAGER - cursor-addressed snapshot stack
// ============================================================================

/// Linear undo/redo over full-canvas snapshots.
///
/// `entries[cursor]` is always the state on screen.  Pushing while the cursor
/// is not on the last entry discards everything after it.
pub struct HistoryManager {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    /// Maximum number of entries kept (0 = unbounded).
    max_entries: usize,
    /// Running memory total across all entries.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(0)
    }
}

impl HistoryManager {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            max_entries,
            total_memory: 0,
        }
    }

    pub fn push(&mut self, description: impl Into<String>, snapshot: ImageSnapshot) {
        // Drop the redo branch
        if !self.entries.is_empty() {
            for removed in self.entries.drain(self.cursor + 1..) {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }

        let entry = HistoryEntry {
            description: description.into(),
            snapshot,
        };
        self.total_memory += entry.memory_size();
        self.entries.push(entry);
        self.cursor = self.entries.len() - 1;

        self.prune();
    }

    /// Step back one entry.  Returns the snapshot to restore, or `None` at
    /// the oldest entry.
    pub fn undo(&mut self) -> Option<&ImageSnapshot> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.current()
    }

    /// Step forward one entry.  Returns the snapshot to restore, or `None`
    /// at the newest entry.
    pub fn redo(&mut self) -> Option<&ImageSnapshot> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.current()
    }

    /// Move the cursor straight to `index` (history panel click).
    pub fn jump_to(&mut self, index: usize) -> Option<&ImageSnapshot> {
        if index >= self.entries.len() {
            return None;
        }
        self.cursor = index;
        self.current()
    }

    /// Collapse the history to a single entry holding `snapshot`.
    pub fn clear(&mut self, snapshot: ImageSnapshot) {
        self.entries.clear();
        self.total_memory = 0;
        self.cursor = 0;
        self.push("Clear History", snapshot);
    }

    /// Drop every entry (used when a new image replaces the session).
    pub fn reset(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.total_memory = 0;
    }

    pub fn current(&self) -> Option<&ImageSnapshot> {
        self.entries.get(self.cursor).map(|e| &e.snapshot)
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Get the current memory usage of the history (O(1) via cached total)
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    /// Drop the oldest entries while over the cap.  Only ever called right
    /// after a push, so the cursor is on the last entry.
    fn prune(&mut self) {
        if self.max_entries == 0 {
            return;
        }
        let excess = self.entries.len().saturating_sub(self.max_entries);
        if excess == 0 {
            return;
        }
        for removed in self.entries.drain(..excess) {
            self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
        }
        self.cursor = self.cursor.saturating_sub(excess);
    }
}

// ============================================================================
// HISTORY PANEL - UI for displaying history
// ============================================================================

/// What the user asked for in the history panel this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryPanelAction {
    JumpTo(usize),
    Clear,
}

#[derive(Default)]
pub struct HistoryPanel {
    show_memory_info: bool,
}

impl HistoryPanel {
    pub fn show(&mut self, ui: &mut egui::Ui, history: &HistoryManager) -> Option<HistoryPanelAction> {
        let mut action = None;

        ui.horizontal(|ui| {
            ui.label(format!("Step {} of {}", history.cursor() + 1, history.len().max(1)));
            if ui.small_button("ℹ").on_hover_text("Show memory info").clicked() {
                self.show_memory_info = !self.show_memory_info;
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let clear = ui.add_enabled(history.len() > 1, egui::Button::new("Clear"));
                if clear.clicked() {
                    action = Some(HistoryPanelAction::Clear);
                }
            });
        });

        if self.show_memory_info {
            let mem_mb = history.memory_usage() as f64 / (1024.0 * 1024.0);
            ui.label(format!("Memory: {:.2} MB", mem_mb));
        }

        let scroll_width = ui.available_width();
        egui::ScrollArea::vertical()
            .max_height(180.0)
            .min_scrolled_width(scroll_width)
            .show(ui, |ui| {
                ui.set_min_width(scroll_width);
                if history.is_empty() {
                    ui.weak("No history yet");
                    return;
                }
                // Most recent first
                for (i, entry) in history.entries().iter().enumerate().rev() {
                    let is_current = i == history.cursor();
                    let is_undone = i > history.cursor();
                    let label = format!("{}. {}", i + 1, entry.description);
                    let text = if is_current {
                        egui::RichText::new(format!("▶ {}", label)).strong().size(11.0)
                    } else if is_undone {
                        egui::RichText::new(label).weak().italics().size(11.0)
                    } else {
                        egui::RichText::new(label).weak().size(11.0)
                    };

                    let response = ui.add(egui::Label::new(text).sense(egui::Sense::click()));
                    if !is_current {
                        let response = response.on_hover_text("Click to jump to this state");
                        if response.clicked() {
                            action = Some(HistoryPanelAction::JumpTo(i));
                        }
                    }
                }
            });

        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(w: u32, h: u32, v: u8) -> ImageSnapshot {
        ImageSnapshot::from_image(RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255])))
    }

    #[test]
    fn undo_and_redo_walk_the_cursor() {
        let mut h = HistoryManager::default();
        h.push("Load", solid(2, 2, 0));
        h.push("Brush", solid(2, 2, 1));
        h.push("Rotate", solid(2, 3, 2));

        assert_eq!(h.undo(), Some(&solid(2, 2, 1)));
        assert_eq!(h.undo(), Some(&solid(2, 2, 0)));
        assert_eq!(h.undo(), None);
        assert_eq!(h.cursor(), 0);

        assert_eq!(h.redo(), Some(&solid(2, 2, 1)));
        assert_eq!(h.redo(), Some(&solid(2, 3, 2)));
        assert_eq!(h.redo(), None);
        assert_eq!(h.cursor(), 2);
    }

    #[test]
    fn push_after_undo_truncates_forward_entries() {
        let mut h = HistoryManager::default();
        for v in 0..5 {
            h.push(format!("edit {v}"), solid(1, 1, v));
        }
        h.undo();
        h.undo();
        h.push("branch", solid(1, 1, 99));

        assert_eq!(h.len(), 4);
        assert_eq!(h.cursor(), 3);
        assert!(!h.can_redo());
        assert_eq!(h.entries()[3].description, "branch");
        assert_eq!(h.memory_usage(), h.entries().iter().map(|e| e.memory_size()).sum::<usize>());
    }

    #[test]
    fn jump_to_ignores_out_of_range() {
        let mut h = HistoryManager::default();
        h.push("a", solid(1, 1, 0));
        h.push("b", solid(1, 1, 1));
        h.push("c", solid(1, 1, 2));
        assert_eq!(h.jump_to(0), Some(&solid(1, 1, 0)));
        assert!(h.jump_to(3).is_none());
        assert_eq!(h.cursor(), 0);
        assert_eq!(h.jump_to(2), Some(&solid(1, 1, 2)));
    }

    #[test]
    fn clear_collapses_to_present_state() {
        let mut h = HistoryManager::default();
        h.push("a", solid(1, 1, 0));
        h.push("b", solid(1, 1, 1));
        h.undo();
        h.clear(solid(1, 1, 0));
        assert_eq!(h.len(), 1);
        assert_eq!(h.cursor(), 0);
        assert!(!h.can_undo() && !h.can_redo());
        assert_eq!(h.current(), Some(&solid(1, 1, 0)));
    }

    #[test]
    fn cap_drops_oldest_entries() {
        let mut h = HistoryManager::new(3);
        for v in 0..6 {
            h.push("edit", solid(1, 1, v));
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.cursor(), 2);
        assert_eq!(h.current(), Some(&solid(1, 1, 5)));
        assert_eq!(h.jump_to(0), Some(&solid(1, 1, 3)));
    }
}
