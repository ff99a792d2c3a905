// ============================================================================
// COMPONENTS - editor state machines and the panels that drive them
// ============================================================================
//
//   tools.rs    - tool selection, pointer routing, crop region, tools panel
//   history.rs  - snapshot history stack and history panel
//   dialogs.rs  - save / alert / confirm / text prompt windows
// ============================================================================

pub mod dialogs;
pub mod history;
pub mod tools;
