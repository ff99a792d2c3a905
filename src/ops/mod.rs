// ============================================================================
// OPS - pixel operations on RGBA buffers, independent of the UI
// ============================================================================
//
//   filters.rs       - the eight live filters and their render chain
//   effects.rs       - vignette, grain, temperature and per-pixel helpers
//   retouch.rs       - localized smoothing brush
//   color_removal.rs - chroma-key background removal
//   shapes.rs        - vector shape overlay, hit testing, stroke rasterizer
//   transform.rs     - rotate, crop and aspect ratios
//   text.rs          - system fonts and text rasterization
// ============================================================================

pub mod color_removal;
pub mod effects;
pub mod filters;
pub mod retouch;
pub mod shapes;
pub mod text;
pub mod transform;
